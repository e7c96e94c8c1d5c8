// Response scales: the bins shared by every group of a block

use crate::codebook::ValueMap;

/// Bin definition of one block.
#[derive(Debug, Clone, PartialEq)]
pub enum Bins {
    /// One bin per mapped code, covering `[code - 0.5, code + 0.5)`
    Mapped { codes: Vec<i64> },
    /// `nbins` equal-width bins over `[min, max]`, the last one closed
    Linear { edges: Vec<f64> },
}

impl Bins {
    pub fn mapped(map: &ValueMap) -> Self {
        Bins::Mapped {
            codes: map.codes().collect(),
        }
    }

    /// Equal-width bins over the span of `values` (all groups of a block).
    pub fn linear<'a>(values: impl IntoIterator<Item = &'a f64>, nbins: usize) -> Self {
        let (lo, hi) = span(values);
        let nbins = nbins.max(1);
        let mut edges: Vec<f64> = (0..=nbins)
            .map(|i| lo + (hi - lo) * i as f64 / nbins as f64)
            .collect();
        // rounding must not leave the observed maximum outside the last bin
        edges[nbins] = hi;
        Bins::Linear { edges }
    }

    pub fn len(&self) -> usize {
        match self {
            Bins::Mapped { codes } => codes.len(),
            Bins::Linear { edges } => edges.len().saturating_sub(1),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index of the bin holding `value`, if any
    pub fn bin_of(&self, value: f64) -> Option<usize> {
        match self {
            Bins::Mapped { codes } => codes
                .iter()
                .position(|&c| value >= c as f64 - 0.5 && value < c as f64 + 0.5),
            Bins::Linear { edges } => {
                let (lo, hi) = (*edges.first()?, *edges.last()?);
                if value < lo || value > hi {
                    return None;
                }
                let n = edges.len() - 1;
                if value == hi {
                    return Some(n - 1);
                }
                edges.windows(2).position(|w| value >= w[0] && value < w[1])
            }
        }
    }

    pub fn histogram(&self, values: &[f64]) -> Vec<usize> {
        let mut counts = vec![0; self.len()];
        for &v in values {
            if let Some(idx) = self.bin_of(v) {
                counts[idx] += 1;
            }
        }
        counts
    }

    /// The values mapped to 0 and 1 on a normalized axis
    pub fn extent(&self) -> (f64, f64) {
        match self {
            Bins::Mapped { codes } => match (codes.first(), codes.last()) {
                (Some(&a), Some(&b)) => (a as f64, b as f64),
                _ => (0.0, 1.0),
            },
            Bins::Linear { edges } => match (edges.first(), edges.last()) {
                (Some(&a), Some(&b)) => (a, b),
                _ => (0.0, 1.0),
            },
        }
    }

    /// Position of `value` on `[0, 1]`; a degenerate extent maps to the middle.
    pub fn normalize(&self, value: f64) -> f64 {
        let (lo, hi) = self.extent();
        if hi == lo {
            0.5
        } else {
            (value - lo) / (hi - lo)
        }
    }

    /// Legend entries: the mapped labels, or `lo - hi unit` ranges.
    pub fn labels(&self, map: Option<&ValueMap>, unit: &str) -> Vec<String> {
        match (self, map) {
            (Bins::Mapped { codes }, Some(map)) => codes
                .iter()
                .map(|&c| map.label(c).unwrap_or_default().to_string())
                .collect(),
            (Bins::Mapped { codes }, None) => codes.iter().map(|c| c.to_string()).collect(),
            (Bins::Linear { edges }, _) => edges
                .windows(2)
                .map(|w| {
                    format!("{} - {} {}", w[0].ceil(), w[1].floor(), unit)
                        .trim_end()
                        .to_string()
                })
                .collect(),
        }
    }
}

/// Observed `[min, max]`, widened when degenerate, `[0, 1]` when empty.
fn span<'a>(values: impl IntoIterator<Item = &'a f64>) -> (f64, f64) {
    let (lo, hi) = values
        .into_iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if lo > hi {
        (0.0, 1.0)
    } else if lo == hi {
        (lo - 0.5, hi + 0.5)
    } else {
        (lo, hi)
    }
}
