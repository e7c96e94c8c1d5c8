use crate::config::{
    BarplotsConfig, FontConfig, HistogramsConfig, LineplotsConfig, TimelinesConfig, DEFAULT_GROUP,
};
use crate::error::{PlotError, Result};
use crate::histogram::HistogramBlock;
use crate::ir::{Anchor, DrawCommand, Font, SceneGraph};
use crate::layout::{
    bar_centers, wrap_width, BarGeometry, Column, HistogramGeometry, LineGeometry,
    TimelineGeometry,
};
use crate::palette::{parse_color, ColorPalette, ColorScheme, Rgb};
use crate::timeline::TimelineBlock;
use crate::transform::{BarBlock, LineBlock};
use crate::wrap::WrapCache;

const GRAY: Rgb = Rgb(0x80, 0x80, 0x80);
const LIGHT_GRAY: Rgb = Rgb(0xdd, 0xdd, 0xdd);

/// Percent ticks along the bottom of a stacked bar plot
const BAR_TICKS: [f64; 5] = [0.0, 0.25, 0.5, 0.75, 1.0];

fn font(config: &FontConfig) -> Font {
    Font {
        family: config.family.clone(),
        size: config.size,
    }
}

fn text(x: f64, y: f64, lines: Vec<String>, font: Font, color: Rgb, anchor: Anchor) -> DrawCommand {
    DrawCommand::Text {
        x,
        y,
        lines,
        font,
        color,
        anchor,
    }
}

fn wrapped(cache: &mut WrapCache, label: &str, column: &Column, font: &FontConfig) -> Vec<String> {
    cache
        .get_or_compute(label, wrap_width(column.width, font.size))
        .to_vec()
}

/// The synthesized default group is never labelled.
fn group_label(name: &str) -> Option<&str> {
    (name != DEFAULT_GROUP).then_some(name)
}

fn color(name: &str) -> Result<Rgb> {
    parse_color(name).ok_or_else(|| PlotError::config(format!("unknown color '{}'", name)))
}

fn palette(names: &[String]) -> Result<ColorPalette> {
    ColorPalette::from_names(names).map_err(PlotError::config)
}

fn line_height(font: &FontConfig) -> f64 {
    1.2 * font.size / 72.0
}

/// Compile one stacked bar block into a scene.
pub fn compile_bar(
    block: &BarBlock,
    config: &BarplotsConfig,
    cache: &mut WrapCache,
) -> Result<SceneGraph> {
    let n_groups = block
        .questions
        .first()
        .map(|q| q.groups.len())
        .unwrap_or(0);
    let geo = BarGeometry::new(&config.layout, block.questions.len(), n_groups)?;
    let mut scene = SceneGraph::new(geo.width, geo.height);

    let scheme = ColorScheme::by_name(&block.color_scheme).ok_or_else(|| {
        PlotError::config(format!("unknown color scheme '{}'", block.color_scheme))
    })?;
    let colors = scheme.sample(block.bins.len(), block.invert);
    let text_color = color(&block.text_color)?;

    // Legend: one swatch per bin across the plot column
    let n_bins = block.bins.len().max(1);
    let cell = Column {
        x: geo.plot.x,
        width: geo.plot.width / n_bins as f64,
    };
    for (bin, label) in block.legend.iter().enumerate() {
        let x = geo.plot.x + bin as f64 * cell.width;
        scene.push(DrawCommand::Rect {
            x,
            y: geo.legend_height * 0.15,
            width: cell.width,
            height: geo.legend_height * 0.3,
            fill: colors[bin],
        });
        let lines = wrapped(cache, label, &cell, &config.font_small);
        scene.push(text(
            x + cell.width / 2.0,
            geo.legend_height * 0.7,
            lines,
            font(&config.font_small),
            Rgb::BLACK,
            Anchor::Center,
        ));
    }

    for (q, question) in block.questions.iter().enumerate() {
        let lines = wrapped(cache, &question.label, &geo.question, &config.font);
        scene.push(text(
            geo.question.x,
            geo.row_center(q),
            lines,
            font(&config.font),
            Rgb::BLACK,
            Anchor::Left,
        ));

        for (g, group) in question.groups.iter().enumerate() {
            let center = geo.bar_center(q, g);
            if let Some(name) = group_label(&group.group) {
                let lines = wrapped(cache, name, &geo.groups, &config.font_small);
                scene.push(text(
                    geo.groups.x,
                    center,
                    lines,
                    font(&config.font_small),
                    Rgb::BLACK,
                    Anchor::Left,
                ));
            }

            for segment in group.segments() {
                let x = geo.plot.at(segment.start);
                let width = segment.width * geo.plot.width;
                scene.push(DrawCommand::Rect {
                    x,
                    y: center - geo.bar_height / 2.0,
                    width,
                    height: geo.bar_height,
                    fill: colors[segment.bin],
                });
                if segment.width >= config.min_label_width {
                    scene.push(text(
                        x + width / 2.0,
                        center,
                        vec![segment.count.to_string()],
                        font(&config.font_small),
                        text_color,
                        Anchor::Center,
                    ));
                }
            }

            scene.push(text(
                geo.summary.x,
                center,
                group.summary.lines(),
                font(&config.font_small),
                Rgb::BLACK,
                Anchor::Left,
            ));
        }
    }

    // Percentage axis
    let axis_y = geo.axis_top(block.questions.len());
    scene.push(DrawCommand::Line {
        points: vec![(geo.plot.x, axis_y), (geo.plot.right(), axis_y)],
        color: GRAY,
        width: 1.0,
    });
    for tick in BAR_TICKS {
        let x = geo.plot.at(tick);
        scene.push(DrawCommand::Line {
            points: vec![(x, axis_y), (x, axis_y + 0.05)],
            color: GRAY,
            width: 1.0,
        });
        scene.push(text(
            x,
            axis_y + 0.05 + line_height(&config.font_small),
            vec![format!("{}%", (tick * 100.0).round())],
            font(&config.font_small),
            Rgb::BLACK,
            Anchor::Center,
        ));
    }

    Ok(scene)
}

/// Compile one line block: a marker per group and question, joined per group.
pub fn compile_line(
    block: &LineBlock,
    config: &LineplotsConfig,
    cache: &mut WrapCache,
) -> Result<SceneGraph> {
    let geo = LineGeometry::new(&config.layout, block.questions.len());
    let mut scene = SceneGraph::new(geo.width, geo.height);
    let colors = palette(&config.colors)?;
    let (top, bottom) = geo.frame();

    let header_y = geo.header_height / 2.0;
    scene.push(text(
        geo.plot.x,
        header_y,
        vec![block.left_label.clone()],
        font(&config.font_small),
        Rgb::BLACK,
        Anchor::Left,
    ));
    scene.push(text(
        geo.plot.right(),
        header_y,
        vec![block.right_label.clone()],
        font(&config.font_small),
        Rgb::BLACK,
        Anchor::Right,
    ));
    for x in [geo.plot.x, geo.plot.right()] {
        scene.push(DrawCommand::Line {
            points: vec![(x, top), (x, bottom)],
            color: GRAY,
            width: 1.0,
        });
    }

    for (q, question) in block.questions.iter().enumerate() {
        let y = geo.row_center(q);
        let lines = wrapped(cache, &question.label, &geo.question, &config.font);
        scene.push(text(
            geo.question.x,
            y,
            lines,
            font(&config.font),
            Rgb::BLACK,
            Anchor::Left,
        ));
        scene.push(DrawCommand::Line {
            points: vec![(geo.plot.x, y), (geo.plot.right(), y)],
            color: LIGHT_GRAY,
            width: 0.5,
        });
    }

    let n_groups = block
        .questions
        .first()
        .map(|q| q.points.len())
        .unwrap_or(0);
    for g in 0..n_groups {
        let color = colors.get_color(g);
        for ((q0, p0), (q1, p1)) in block.segments(g) {
            scene.push(DrawCommand::Line {
                points: vec![
                    (geo.plot.at(p0), geo.row_center(q0)),
                    (geo.plot.at(p1), geo.row_center(q1)),
                ],
                color,
                width: config.line_width,
            });
        }
        for (q, question) in block.questions.iter().enumerate() {
            if let Some(position) = question.points.get(g).and_then(|p| p.position) {
                scene.push(DrawCommand::Marker {
                    x: geo.plot.at(position),
                    y: geo.row_center(q),
                    size: config.marker_size,
                    color,
                });
            }
        }
    }

    // Group legend stacked in the label column
    let step = 1.5 * line_height(&config.font_small);
    if let Some(question) = block.questions.first() {
        for (g, point) in question.points.iter().enumerate() {
            let Some(name) = group_label(&point.group) else {
                continue;
            };
            let y = top + (g as f64 + 0.5) * step;
            scene.push(DrawCommand::Marker {
                x: geo.labels.x + 0.05,
                y,
                size: config.marker_size,
                color: colors.get_color(g),
            });
            let lines = wrapped(cache, name, &geo.labels, &config.font_small);
            scene.push(text(
                geo.labels.x + 0.15,
                y,
                lines,
                font(&config.font_small),
                Rgb::BLACK,
                Anchor::Left,
            ));
        }
    }

    Ok(scene)
}

/// Compile one histogram block: horizontal bars, one per bar label and group.
pub fn compile_histogram(
    block: &HistogramBlock,
    config: &HistogramsConfig,
    cache: &mut WrapCache,
) -> Result<SceneGraph> {
    let geo = HistogramGeometry::new(&config.layout, block.n_bars(), block.groups.len());
    let mut scene = SceneGraph::new(geo.width, geo.height);
    let colors = palette(&config.colors)?;

    if block.groups.len() > 1 {
        let cell = geo.plot.width / block.groups.len() as f64;
        let y = geo.row_height / 2.0;
        for (g, group) in block.groups.iter().enumerate() {
            let x = geo.plot.x + g as f64 * cell;
            scene.push(DrawCommand::Rect {
                x,
                y: y - geo.bar_height / 4.0,
                width: geo.bar_height / 2.0,
                height: geo.bar_height / 2.0,
                fill: colors.get_color(g),
            });
            scene.push(text(
                x + geo.bar_height,
                y,
                vec![group.group.clone()],
                font(&config.font_small),
                Rgb::BLACK,
                Anchor::Left,
            ));
        }
    }

    for (b, label) in block.labels.iter().enumerate() {
        let lines = wrapped(cache, label, &geo.labels, &config.font);
        scene.push(text(
            geo.labels.right(),
            geo.row_center(b),
            lines,
            font(&config.font),
            Rgb::BLACK,
            Anchor::Right,
        ));
    }

    for (g, group) in block.groups.iter().enumerate() {
        let lengths = block.lengths(g);
        for (b, (&count, &length)) in group.counts.iter().zip(&lengths).enumerate() {
            let center = geo.bar_center(b, g);
            let width = length * geo.plot.width;
            if count > 0 {
                scene.push(DrawCommand::Rect {
                    x: geo.plot.x,
                    y: center - geo.bar_height / 2.0,
                    width,
                    height: geo.bar_height,
                    fill: colors.get_color(g),
                });
            }
            scene.push(text(
                geo.plot.x + width + config.layout.bar_label_pad,
                center,
                vec![count.to_string()],
                font(&config.font_small),
                Rgb::BLACK,
                Anchor::Left,
            ));
        }
    }

    scene.push(DrawCommand::Line {
        points: vec![(geo.plot.x, geo.row_height), (geo.plot.x, geo.height)],
        color: GRAY,
        width: 1.0,
    });

    let summary = block.summary.count_lines();
    let y = config.layout.pad_summary_top
        + summary.len() as f64 * line_height(&config.font_small) / 2.0;
    scene.push(text(
        geo.summary.right(),
        y,
        summary,
        font(&config.font_small),
        Rgb::BLACK,
        Anchor::Right,
    ));

    Ok(scene)
}

/// Compile one timeline block: mean and std error bar per dataset and group.
pub fn compile_timeline(
    block: &TimelineBlock,
    config: &TimelinesConfig,
    cache: &mut WrapCache,
) -> Result<SceneGraph> {
    let geo = TimelineGeometry::new(&config.layout, block.questions.len(), block.datasets.len());
    let mut scene = SceneGraph::new(geo.width, geo.height);
    let colors = palette(&config.colors)?;

    let n_groups = block
        .questions
        .first()
        .map(|q| q.series.len())
        .unwrap_or(0);
    // groups sit side by side within a dataset slot
    let dodge = bar_centers(n_groups, 0.08, 0.0);

    for (q, question) in block.questions.iter().enumerate() {
        let top = geo.row_top(q);
        let lines = wrapped(cache, &question.label, &geo.question, &config.font);
        scene.push(text(
            geo.question.x,
            top + geo.row_height / 2.0,
            lines,
            font(&config.font),
            Rgb::BLACK,
            Anchor::Left,
        ));
        for &tick in &block.ticks {
            let y = geo.value_y(q, tick, block.y_range);
            scene.push(DrawCommand::Line {
                points: vec![(geo.plot.x, y), (geo.plot.right(), y)],
                color: LIGHT_GRAY,
                width: 0.5,
            });
        }
        scene.push(DrawCommand::Line {
            points: vec![
                (geo.plot.x, top + geo.row_height),
                (geo.plot.right(), top + geo.row_height),
            ],
            color: GRAY,
            width: 1.0,
        });

        for (g, series) in question.series.iter().enumerate() {
            let color = colors.get_color(g);
            let offset = dodge.get(g).copied().unwrap_or(0.0);
            for (slot, summary) in geo.slots.iter().zip(&series.points) {
                let (Some(mean), Some(std)) = (summary.mean, summary.std) else {
                    continue;
                };
                let x = slot - offset;
                scene.push(DrawCommand::Line {
                    points: vec![
                        (x, geo.value_y(q, mean + std, block.y_range)),
                        (x, geo.value_y(q, mean - std, block.y_range)),
                    ],
                    color,
                    width: 1.0,
                });
                scene.push(DrawCommand::Marker {
                    x,
                    y: geo.value_y(q, mean, block.y_range),
                    size: config.marker_size,
                    color,
                });
            }
        }
    }

    let axis_y = geo.row_top(block.questions.len()) + config.layout.height_axis / 2.0;
    for (slot, dataset) in geo.slots.iter().zip(&block.datasets) {
        scene.push(text(
            *slot,
            axis_y,
            vec![dataset.clone()],
            font(&config.font_small),
            Rgb::BLACK,
            Anchor::Center,
        ));
    }
    if let Some(question) = block.questions.first() {
        let labelled: Vec<(usize, &str)> = question
            .series
            .iter()
            .enumerate()
            .filter_map(|(g, s)| group_label(&s.group).map(|name| (g, name)))
            .collect();
        for (row, (g, name)) in labelled.into_iter().enumerate() {
            scene.push(text(
                geo.question.x,
                axis_y + row as f64 * line_height(&config.font_small),
                vec![name.to_string()],
                font(&config.font_small),
                colors.get_color(g),
                Anchor::Left,
            ));
        }
    }

    Ok(scene)
}
