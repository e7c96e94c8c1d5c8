// Timeline aggregation: per-dataset summaries of a block across all datasets

use crate::codebook::CodeBook;
use crate::data::DataCollection;
use crate::error::Result;
use crate::resolve::ResolvedBlock;
use crate::scale::Bins;
use crate::summary::Summary;

#[derive(Debug, Clone, PartialEq)]
pub struct TimelineBlock {
    pub block: i64,
    /// Dataset labels, one x position each
    pub datasets: Vec<String>,
    /// Vertical data range shown for every question
    pub y_range: (f64, f64),
    /// Tick values of the vertical axis
    pub ticks: Vec<f64>,
    pub questions: Vec<TimelineQuestion>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimelineQuestion {
    pub variable: String,
    pub label: String,
    pub series: Vec<TimelineSeries>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimelineSeries {
    pub group: String,
    /// One summary per dataset, in collection order
    pub points: Vec<Summary>,
}

pub fn aggregate_timeline_block(
    collection: &DataCollection,
    codebook: &CodeBook,
    block: i64,
    groups: &[String],
) -> Result<TimelineBlock> {
    let resolved = ResolvedBlock::resolve(codebook, block)?;

    // responses[dataset][variable][group]
    let responses = collection
        .datasets
        .iter()
        .map(|data| resolved.collect(data, codebook, groups))
        .collect::<Result<Vec<_>>>()?;

    let (bins, ticks) = match resolved.value_map() {
        Some(map) => (Bins::mapped(map), map.codes().map(|c| c as f64).collect()),
        None => {
            let bins = Bins::linear(
                responses
                    .iter()
                    .flatten()
                    .flatten()
                    .flat_map(|r| r.values.iter()),
                resolved.nbins(),
            );
            let ticks = match &bins {
                Bins::Linear { edges } => edges.clone(),
                Bins::Mapped { .. } => Vec::new(),
            };
            (bins, ticks)
        }
    };
    let (lo, hi) = bins.extent();
    let pad = if hi > lo { 0.25 * (hi - lo) } else { 0.5 };

    let questions = resolved
        .members
        .iter()
        .enumerate()
        .map(|(v_idx, entry)| TimelineQuestion {
            variable: entry.variable.clone(),
            label: entry.label.clone(),
            series: groups
                .iter()
                .enumerate()
                .map(|(g_idx, g)| TimelineSeries {
                    group: g.clone(),
                    points: responses
                        .iter()
                        .map(|per_dataset| Summary::from_responses(&per_dataset[v_idx][g_idx]))
                        .collect(),
                })
                .collect(),
        })
        .collect();

    Ok(TimelineBlock {
        block,
        datasets: collection.names().map(str::to_string).collect(),
        y_range: (lo - pad, hi + pad),
        ticks,
        questions,
    })
}
