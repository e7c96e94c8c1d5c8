// Histogram aggregation: one bar per code (single) or per yes/no question (multi)

use crate::codebook::{CodeBook, ValueMap};
use crate::config::Affirmative;
use crate::data::Data;
use crate::error::Result;
use crate::resolve::ResolvedBlock;
use crate::summary::Summary;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistogramType {
    /// One mapped variable, one bar per code
    Single,
    /// Several binary variables, one bar per variable
    Multi,
    Skip,
}

/// Classify a block by its member count and shared value map.
pub fn histogram_type(n_variables: usize, value_map: Option<&ValueMap>) -> HistogramType {
    match value_map {
        None => HistogramType::Skip,
        Some(_) if n_variables == 1 => HistogramType::Single,
        Some(map) if n_variables > 1 && map.len() == 2 => HistogramType::Multi,
        Some(_) => HistogramType::Skip,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistogramBlock {
    pub block: i64,
    pub kind: HistogramType,
    /// One label per bar
    pub labels: Vec<String>,
    pub groups: Vec<HistogramGroup>,
    /// Over all rows of the block's first variable
    pub summary: Summary,
    pub margin_factor: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistogramGroup {
    pub group: String,
    /// One count per bar
    pub counts: Vec<usize>,
}

impl HistogramBlock {
    pub fn n_bars(&self) -> usize {
        self.labels.len()
    }

    pub fn max_count(&self) -> usize {
        self.groups
            .iter()
            .flat_map(|g| g.counts.iter().copied())
            .max()
            .unwrap_or(0)
    }

    /// Bar lengths on `[0, 1]`, scaled so the longest bar leaves a margin.
    pub fn lengths(&self, group_idx: usize) -> Vec<f64> {
        let scale = self.max_count() as f64 * self.margin_factor;
        self.groups
            .get(group_idx)
            .map(|g| {
                g.counts
                    .iter()
                    .map(|&c| if scale > 0.0 { c as f64 / scale } else { 0.0 })
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// `Ok(None)` when the block's shape fits neither histogram type.
pub fn aggregate_histogram_block(
    data: &Data,
    codebook: &CodeBook,
    block: i64,
    groups: &[String],
    affirmative: Affirmative,
    margin_factor: f64,
) -> Result<Option<HistogramBlock>> {
    let resolved = ResolvedBlock::resolve(codebook, block)?;
    let kind = histogram_type(resolved.members.len(), resolved.value_map());
    let map = match (kind, resolved.value_map()) {
        (HistogramType::Skip, _) | (_, None) => {
            warn!(
                "Block {} ({} variables) cannot be drawn as a histogram, skipping",
                block,
                resolved.members.len()
            );
            return Ok(None);
        }
        (_, Some(map)) => map,
    };
    debug!("Block {} is a {:?} histogram", block, kind);

    let responses = resolved.collect(data, codebook, groups)?;

    let (labels, groups) = match kind {
        HistogramType::Single => {
            let labels = map.labels().map(str::to_string).collect();
            let groups = groups
                .iter()
                .zip(&responses[0])
                .map(|(g, r)| HistogramGroup {
                    group: g.clone(),
                    counts: map
                        .codes()
                        .map(|code| r.values.iter().filter(|&&v| v == code as f64).count())
                        .collect(),
                })
                .collect();
            (labels, groups)
        }
        _ => {
            let yes = match affirmative {
                Affirmative::Lower => map.first_code(),
                Affirmative::Higher => map.last_code(),
            }
            .unwrap_or_default() as f64;
            let labels = resolved.members.iter().map(|e| e.label.clone()).collect();
            let groups = groups
                .iter()
                .enumerate()
                .map(|(g_idx, g)| HistogramGroup {
                    group: g.clone(),
                    counts: responses
                        .iter()
                        .map(|per_group| {
                            per_group[g_idx]
                                .values
                                .iter()
                                .filter(|&&v| v == yes)
                                .count()
                        })
                        .collect(),
                })
                .collect();
            (labels, groups)
        }
    };

    let first = &resolved.members[0].variable;
    let summary = Summary::from_responses(&data.aggregate(codebook, block, first, None)?);

    Ok(Some(HistogramBlock {
        block,
        kind,
        labels,
        groups,
        summary,
        margin_factor,
    }))
}
