// Block resolution: the attributes shared by every member of a question block

use crate::codebook::{CodeBook, CodeBookEntry, ValueMap};
use crate::data::{Data, Responses};
use crate::error::{PlotError, Result};

/// A question block with its shared attributes taken from the first member.
///
/// The codebook guarantees that all members agree on them.
#[derive(Debug, Clone)]
pub struct ResolvedBlock<'a> {
    pub id: i64,
    pub members: Vec<&'a CodeBookEntry>,
}

impl<'a> ResolvedBlock<'a> {
    pub fn resolve(codebook: &'a CodeBook, id: i64) -> Result<Self> {
        let members = codebook.block_entries(id);
        if members.is_empty() {
            return Err(PlotError::codebook(
                &codebook.path,
                format!("block {} has no variables", id),
            ));
        }
        Ok(Self { id, members })
    }

    fn first(&self) -> &'a CodeBookEntry {
        self.members[0]
    }

    pub fn value_map(&self) -> Option<&'a ValueMap> {
        self.first().value_map.as_ref()
    }

    pub fn nbins(&self) -> usize {
        self.first().nbins
    }

    pub fn unit(&self) -> &'a str {
        &self.first().unit
    }

    pub fn color_scheme(&self) -> &'a str {
        &self.first().color_scheme
    }

    pub fn text_color(&self) -> &'a str {
        &self.first().text_color
    }

    pub fn bar_invert(&self) -> bool {
        self.first().bar_invert
    }

    pub fn line_invert(&self) -> bool {
        self.first().line_invert
    }

    /// Responses of every member, outer index variable, inner index group.
    pub fn collect(
        &self,
        data: &Data,
        codebook: &CodeBook,
        groups: &[String],
    ) -> Result<Vec<Vec<Responses>>> {
        self.members
            .iter()
            .map(|entry| {
                groups
                    .iter()
                    .map(|g| data.aggregate(codebook, self.id, &entry.variable, Some(g)))
                    .collect()
            })
            .collect()
    }
}
