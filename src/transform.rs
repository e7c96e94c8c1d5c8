// Bar and line aggregation of one question block

use crate::codebook::CodeBook;
use crate::data::{Data, Responses};
use crate::error::Result;
use crate::resolve::ResolvedBlock;
use crate::scale::Bins;
use crate::summary::Summary;

/// Stacked-bar data for one block of one dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct BarBlock {
    pub block: i64,
    pub bins: Bins,
    /// One legend entry per bin
    pub legend: Vec<String>,
    pub color_scheme: String,
    pub text_color: String,
    /// Reverses the color ramp, never the counts
    pub invert: bool,
    pub questions: Vec<BarQuestion>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BarQuestion {
    pub variable: String,
    pub label: String,
    pub groups: Vec<BarGroup>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BarGroup {
    pub group: String,
    pub counts: Vec<usize>,
    /// Cumulative count before each bin
    pub offsets: Vec<usize>,
    pub summary: Summary,
}

/// A drawable piece of a stacked bar, in fractions of the group total.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub bin: usize,
    pub start: f64,
    pub width: f64,
    pub count: usize,
}

impl BarGroup {
    fn new(group: &str, bins: &Bins, responses: &Responses) -> Self {
        let counts = bins.histogram(&responses.values);
        let offsets = counts
            .iter()
            .scan(0, |acc, &c| {
                let start = *acc;
                *acc += c;
                Some(start)
            })
            .collect();
        Self {
            group: group.to_string(),
            counts,
            offsets,
            summary: Summary::from_responses(responses),
        }
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Per-bin share of the group total; all zero without responses.
    pub fn fractions(&self) -> Vec<f64> {
        let total = self.total();
        self.counts
            .iter()
            .map(|&c| if total == 0 { 0.0 } else { c as f64 / total as f64 })
            .collect()
    }

    /// Non-empty bins only; offsets still account for the skipped ones.
    pub fn segments(&self) -> Vec<Segment> {
        let total = self.total();
        if total == 0 {
            return Vec::new();
        }
        self.counts
            .iter()
            .zip(&self.offsets)
            .zip(self.fractions())
            .enumerate()
            .filter(|&(_, ((&count, _), _))| count > 0)
            .map(|(bin, ((&count, &offset), width))| Segment {
                bin,
                start: offset as f64 / total as f64,
                width,
                count,
            })
            .collect()
    }
}

/// Histogram every (variable, group) pair of a block on the block-wide bins.
pub fn aggregate_bar_block(
    data: &Data,
    codebook: &CodeBook,
    block: i64,
    groups: &[String],
) -> Result<BarBlock> {
    // 1. Resolve the shared attributes
    let resolved = ResolvedBlock::resolve(codebook, block)?;

    // 2. Collect responses once
    let responses = resolved.collect(data, codebook, groups)?;

    // 3. Common bins for all groups
    let bins = block_bins(&resolved, &responses);

    // 4. Histogram per question and group
    let questions = resolved
        .members
        .iter()
        .zip(&responses)
        .map(|(entry, per_group)| BarQuestion {
            variable: entry.variable.clone(),
            label: entry.label.clone(),
            groups: groups
                .iter()
                .zip(per_group)
                .map(|(g, r)| BarGroup::new(g, &bins, r))
                .collect(),
        })
        .collect();

    Ok(BarBlock {
        block,
        legend: bins.labels(resolved.value_map(), resolved.unit()),
        bins,
        color_scheme: resolved.color_scheme().to_string(),
        text_color: resolved.text_color().to_string(),
        invert: resolved.bar_invert(),
        questions,
    })
}

fn block_bins(resolved: &ResolvedBlock<'_>, responses: &[Vec<Responses>]) -> Bins {
    match resolved.value_map() {
        Some(map) => Bins::mapped(map),
        None => Bins::linear(
            responses.iter().flatten().flat_map(|r| r.values.iter()),
            resolved.nbins(),
        ),
    }
}

/// Mean positions of one block for a trend-across-questions plot.
#[derive(Debug, Clone, PartialEq)]
pub struct LineBlock {
    pub block: i64,
    pub bins: Bins,
    /// Labels of the 0 and 1 ends of the scale
    pub left_label: String,
    pub right_label: String,
    pub questions: Vec<LineQuestion>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineQuestion {
    pub variable: String,
    pub label: String,
    pub points: Vec<LinePoint>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinePoint {
    pub group: String,
    /// Normalized mean on `[0, 1]`; `None` without responses
    pub position: Option<f64>,
    pub summary: Summary,
}

impl LineBlock {
    /// Consecutive question pairs `(q, q + 1)` with positions for `group_idx`.
    pub fn segments(&self, group_idx: usize) -> Vec<((usize, f64), (usize, f64))> {
        self.questions
            .windows(2)
            .enumerate()
            .filter_map(|(q, pair)| {
                let a = pair[0].points.get(group_idx)?.position?;
                let b = pair[1].points.get(group_idx)?.position?;
                Some(((q, a), (q + 1, b)))
            })
            .collect()
    }
}

pub fn aggregate_line_block(
    data: &Data,
    codebook: &CodeBook,
    block: i64,
    groups: &[String],
) -> Result<LineBlock> {
    let resolved = ResolvedBlock::resolve(codebook, block)?;
    let responses = resolved.collect(data, codebook, groups)?;
    let bins = block_bins(&resolved, &responses);
    let invert = resolved.line_invert();

    let questions = resolved
        .members
        .iter()
        .zip(&responses)
        .map(|(entry, per_group)| LineQuestion {
            variable: entry.variable.clone(),
            label: entry.label.clone(),
            points: groups
                .iter()
                .zip(per_group)
                .map(|(g, r)| {
                    let summary = Summary::from_responses(r);
                    let position = summary.mean.map(|m| {
                        let p = bins.normalize(m);
                        if invert {
                            1.0 - p
                        } else {
                            p
                        }
                    });
                    LinePoint {
                        group: g.clone(),
                        position,
                        summary,
                    }
                })
                .collect(),
        })
        .collect();

    let (left_label, right_label) = end_labels(&resolved, &bins);
    let (left_label, right_label) = if invert {
        (right_label, left_label)
    } else {
        (left_label, right_label)
    };

    Ok(LineBlock {
        block,
        bins,
        left_label,
        right_label,
        questions,
    })
}

fn end_labels(resolved: &ResolvedBlock<'_>, bins: &Bins) -> (String, String) {
    match resolved.value_map() {
        Some(map) => {
            let label = |code: Option<i64>| {
                code.and_then(|c| map.label(c))
                    .unwrap_or_default()
                    .to_string()
            };
            (label(map.first_code()), label(map.last_code()))
        }
        None => {
            let (lo, hi) = bins.extent();
            let unit = resolved.unit();
            let fmt = |v: f64| format!("{} {}", v, unit).trim_end().to_string();
            (fmt(lo), fmt(hi))
        }
    }
}
