use crate::config::OutputFormat;
use crate::ir::{Anchor, DrawCommand, SceneGraph};
use crate::palette::Rgb;
use anyhow::{Context, Result};
use image::ImageEncoder;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

/// Render a scene to the bytes of an SVG or PNG file.
pub fn render_scene(scene: &SceneGraph, format: OutputFormat, dpi: f64) -> Result<Vec<u8>> {
    let canvas = Canvas::new(scene, dpi);
    match format {
        OutputFormat::Svg => {
            let mut svg = String::new();
            {
                let root = SVGBackend::with_string(&mut svg, canvas.size).into_drawing_area();
                canvas.draw(&root, scene)?;
                root.present().context("Failed to present drawing")?;
            }
            Ok(svg.into_bytes())
        }
        OutputFormat::Png => {
            let (width, height) = canvas.size;
            let mut buffer = vec![0u8; (width * height * 3) as usize];
            {
                let root = BitMapBackend::with_buffer(&mut buffer, (width, height))
                    .into_drawing_area();
                canvas.draw(&root, scene)?;
                root.present().context("Failed to present drawing")?;
            }

            let mut png_bytes = Vec::new();
            {
                let encoder = image::codecs::png::PngEncoder::new(&mut png_bytes);
                encoder
                    .write_image(&buffer, width, height, image::ColorType::Rgb8)
                    .context("Failed to encode PNG")?;
            }
            Ok(png_bytes)
        }
    }
}

/// Inch to pixel conversion for one scene
struct Canvas {
    dpi: f64,
    size: (u32, u32),
}

impl Canvas {
    fn new(scene: &SceneGraph, dpi: f64) -> Self {
        let px = |inches: f64| ((inches * dpi).ceil() as u32).max(1);
        Self {
            dpi,
            size: (px(scene.width), px(scene.height)),
        }
    }

    fn px(&self, inches: f64) -> i32 {
        (inches * self.dpi).round() as i32
    }

    fn point(&self, (x, y): (f64, f64)) -> (i32, i32) {
        (self.px(x), self.px(y))
    }

    /// Typographic points to pixels
    fn pt(&self, points: f64) -> f64 {
        points * self.dpi / 72.0
    }

    fn draw<DB>(&self, root: &DrawingArea<DB, Shift>, scene: &SceneGraph) -> Result<()>
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        root.fill(&WHITE).context("Failed to fill background")?;

        for command in &scene.commands {
            match command {
                DrawCommand::Rect {
                    x,
                    y,
                    width,
                    height,
                    fill,
                } => {
                    root.draw(&Rectangle::new(
                        [self.point((*x, *y)), self.point((x + width, y + height))],
                        rgb(fill).filled(),
                    ))
                    .context("Failed to draw rectangle")?;
                }
                DrawCommand::Line {
                    points,
                    color,
                    width,
                } => {
                    let style = ShapeStyle {
                        color: rgb(color).to_rgba(),
                        filled: false,
                        stroke_width: (self.pt(*width).round() as u32).max(1),
                    };
                    let path: Vec<(i32, i32)> = points.iter().map(|&p| self.point(p)).collect();
                    root.draw(&PathElement::new(path, style))
                        .context("Failed to draw line")?;
                }
                DrawCommand::Marker { x, y, size, color } => {
                    let radius = (self.pt(*size) / 2.0).round().max(1.0) as i32;
                    root.draw(&Circle::new(self.point((*x, *y)), radius, rgb(color).filled()))
                        .context("Failed to draw marker")?;
                }
                DrawCommand::Text {
                    x,
                    y,
                    lines,
                    font,
                    color,
                    anchor,
                } => {
                    let size = self.pt(font.size);
                    let h_pos = match anchor {
                        Anchor::Left => HPos::Left,
                        Anchor::Center => HPos::Center,
                        Anchor::Right => HPos::Right,
                    };
                    let color = rgb(color);
                    let style = (font.family.as_str(), size)
                        .into_font()
                        .color(&color)
                        .pos(Pos::new(h_pos, VPos::Center));
                    let line_height = 1.2 * size;
                    let middle = (lines.len() as f64 - 1.0) / 2.0;
                    for (i, line) in lines.iter().enumerate() {
                        if line.is_empty() {
                            continue;
                        }
                        let dy = (i as f64 - middle) * line_height;
                        let (px, py) = self.point((*x, *y));
                        root.draw(&Text::new(
                            line.as_str(),
                            (px, py + dy.round() as i32),
                            style.clone(),
                        ))
                        .context("Failed to draw text")?;
                    }
                }
            }
        }
        Ok(())
    }
}

fn rgb(color: &Rgb) -> RGBColor {
    RGBColor(color.0, color.1, color.2)
}
