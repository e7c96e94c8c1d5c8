// Figure geometry in inches: column frames, question rows and bar centers

use crate::config::{BarLayout, HistogramLayout, LineLayout, TimelineLayout};
use crate::error::{PlotError, Result};

/// Average glyph width as a fraction of the font size
const GLYPH_WIDTH_EM: f64 = 0.5;

/// A horizontal band of the figure, in inches from the left edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Column {
    pub x: f64,
    pub width: f64,
}

impl Column {
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Map a fraction of the column width to an absolute x.
    pub fn at(&self, fraction: f64) -> f64 {
        self.x + fraction * self.width
    }
}

/// Lay columns out left to right with `pad` between neighbours.
fn columns<const N: usize>(widths: [f64; N], pad: f64) -> ([Column; N], f64) {
    let mut x = 0.0;
    let mut out = [Column { x: 0.0, width: 0.0 }; N];
    for (i, width) in widths.into_iter().enumerate() {
        if i > 0 {
            x += pad;
        }
        out[i] = Column { x, width };
        x += width;
    }
    (out, x)
}

/// Offsets of `n` bar centers from their row center, top bar first.
///
/// For an even `n` the bars form pairs symmetric about zero; for an odd `n`
/// the middle bar sits at exactly zero.
pub fn bar_centers(n: usize, height: f64, gap: f64) -> Vec<f64> {
    let middle = (n as f64 - 1.0) / 2.0;
    (0..n).map(|i| (middle - i as f64) * (height + gap)).collect()
}

/// Relative height of one bar when `n_groups` bars share a unit row.
pub fn bar_height(n_groups: usize, rel_pad_questions: f64, rel_pad_groups: f64) -> Result<f64> {
    let n = n_groups.max(1) as f64;
    let height = (1.0 - rel_pad_questions - (n - 1.0) * rel_pad_groups) / n;
    if !(height.is_finite() && height > 0.0) {
        return Err(PlotError::config(format!(
            "barplots.layout: {} groups do not fit a question row with paddings {} and {}",
            n_groups, rel_pad_questions, rel_pad_groups
        )));
    }
    Ok(height)
}

/// Characters per line for a column `width` inches wide at `font_size` points.
pub fn wrap_width(width: f64, font_size: f64) -> usize {
    let chars = width * 72.0 / (GLYPH_WIDTH_EM * font_size);
    (chars.floor() as usize).max(1)
}

/// Stacked bar figure: legend on top, one row per question.
#[derive(Debug, Clone, PartialEq)]
pub struct BarGeometry {
    pub width: f64,
    pub height: f64,
    pub question: Column,
    pub groups: Column,
    pub plot: Column,
    pub summary: Column,
    /// Height of the legend band above the first question
    pub legend_height: f64,
    pub row_height: f64,
    /// Absolute bar height in inches
    pub bar_height: f64,
    centers: Vec<f64>,
}

impl BarGeometry {
    pub fn new(layout: &BarLayout, n_questions: usize, n_groups: usize) -> Result<Self> {
        let rel_height = bar_height(
            n_groups,
            layout.height_rel_pad_questions,
            layout.height_rel_pad_groups,
        )?;
        let ([question, groups, plot, summary], width) = columns(
            [
                layout.width_question,
                layout.width_groups,
                layout.width_plot,
                layout.width_summary,
            ],
            layout.width_pad,
        );
        let row_height = layout.height_question;
        // one unit for the legend, one for the percentage axis
        let height = (n_questions as f64 + 2.0) * row_height;
        let centers = bar_centers(n_groups, rel_height, layout.height_rel_pad_groups)
            .into_iter()
            .map(|c| c * row_height)
            .collect();

        Ok(Self {
            width,
            height,
            question,
            groups,
            plot,
            summary,
            legend_height: row_height,
            row_height,
            bar_height: rel_height * row_height,
            centers,
        })
    }

    pub fn row_center(&self, question: usize) -> f64 {
        self.legend_height + (question as f64 + 0.5) * self.row_height
    }

    /// Vertical center of a group's bar; group 0 is the top bar.
    pub fn bar_center(&self, question: usize, group: usize) -> f64 {
        self.row_center(question) - self.centers.get(group).copied().unwrap_or(0.0)
    }

    /// Top edge of the axis band below the last question
    pub fn axis_top(&self, n_questions: usize) -> f64 {
        self.legend_height + n_questions as f64 * self.row_height
    }
}

/// Line figure: a header band for the scale ends, then one row per question.
#[derive(Debug, Clone, PartialEq)]
pub struct LineGeometry {
    pub width: f64,
    pub height: f64,
    pub question: Column,
    pub plot: Column,
    pub labels: Column,
    pub header_height: f64,
    pub row_height: f64,
    edge: f64,
}

impl LineGeometry {
    pub fn new(layout: &LineLayout, n_questions: usize) -> Self {
        let ([question, plot, labels], width) = columns(
            [layout.width_question, layout.width_plot, layout.width_labels],
            layout.width_pad,
        );
        let row_height = layout.height_question;
        let edge = layout.rel_edge_line_height * row_height;
        Self {
            width,
            height: row_height + 2.0 * edge + n_questions as f64 * row_height,
            question,
            plot,
            labels,
            header_height: row_height,
            row_height,
            edge,
        }
    }

    pub fn row_center(&self, question: usize) -> f64 {
        self.header_height + self.edge + (question as f64 + 0.5) * self.row_height
    }

    /// Vertical extent of the plot frame
    pub fn frame(&self) -> (f64, f64) {
        (self.header_height, self.height)
    }
}

/// Horizontal histogram: a legend row above one row per bar.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramGeometry {
    pub width: f64,
    pub height: f64,
    pub labels: Column,
    pub plot: Column,
    pub summary: Column,
    pub row_height: f64,
    pub bar_height: f64,
    centers: Vec<f64>,
}

impl HistogramGeometry {
    pub fn new(layout: &HistogramLayout, n_bars: usize, n_groups: usize) -> Self {
        let ([labels, plot], width) =
            columns([layout.width_labels, layout.width_plot], layout.width_pad);
        let n_groups = n_groups.max(1);
        let row_height = (n_groups as f64 + layout.height_rel_pad_questions) * layout.height_bar;
        let summary = Column {
            x: plot.right() - layout.pad_summary_right - layout.width_summary,
            width: layout.width_summary,
        };
        Self {
            width,
            height: (n_bars as f64 + 1.0) * row_height,
            labels,
            plot,
            summary,
            row_height,
            bar_height: layout.height_bar,
            centers: bar_centers(n_groups, layout.height_bar, 0.0),
        }
    }

    pub fn row_center(&self, bar: usize) -> f64 {
        (bar as f64 + 1.5) * self.row_height
    }

    pub fn bar_center(&self, bar: usize, group: usize) -> f64 {
        self.row_center(bar) - self.centers.get(group).copied().unwrap_or(0.0)
    }
}

/// Timeline figure: one row per question above a dataset axis band.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineGeometry {
    pub width: f64,
    pub height: f64,
    pub question: Column,
    pub plot: Column,
    pub row_height: f64,
    /// Horizontal slot centers, one per dataset
    pub slots: Vec<f64>,
}

impl TimelineGeometry {
    pub fn new(layout: &TimelineLayout, n_questions: usize, n_datasets: usize) -> Self {
        let ([question, plot], width) =
            columns([layout.width_question, layout.width_plot], layout.width_pad);
        let n = n_datasets.max(1) as f64;
        let slots = (0..n_datasets)
            .map(|d| plot.at((d as f64 + 0.5) / n))
            .collect();
        Self {
            width,
            height: n_questions as f64 * layout.height_question + layout.height_axis,
            question,
            plot,
            row_height: layout.height_question,
            slots,
        }
    }

    pub fn row_top(&self, question: usize) -> f64 {
        question as f64 * self.row_height
    }

    /// Map a data value to a y inside the question row, `range` spanning the row.
    pub fn value_y(&self, question: usize, value: f64, range: (f64, f64)) -> f64 {
        let (lo, hi) = range;
        let t = if hi > lo { (value - lo) / (hi - lo) } else { 0.5 };
        self.row_top(question) + (1.0 - t) * self.row_height
    }
}
