use crate::palette::Rgb;

// =============================================================================
// Scene graph
// =============================================================================

/// A list of primitive drawing commands in inches, origin at the top left.
/// The backend just executes these blindly.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneGraph {
    pub width: f64,
    pub height: f64,
    pub commands: Vec<DrawCommand>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Font {
    pub family: String,
    /// Points
    pub size: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    /// Filled rectangle from its top-left corner
    Rect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        fill: Rgb,
    },
    Line {
        points: Vec<(f64, f64)>,
        color: Rgb,
        /// Points
        width: f64,
    },
    /// Filled circle, `size` is the diameter in points
    Marker {
        x: f64,
        y: f64,
        size: f64,
        color: Rgb,
    },
    /// Block of lines vertically centered on `y`
    Text {
        x: f64,
        y: f64,
        lines: Vec<String>,
        font: Font,
        color: Rgb,
        anchor: Anchor,
    },
}

impl SceneGraph {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            commands: Vec::new(),
        }
    }

    pub fn push(&mut self, command: DrawCommand) {
        self.commands.push(command);
    }

    /// Every text line in drawing order
    #[cfg(test)]
    pub fn texts(&self) -> impl Iterator<Item = &str> + '_ {
        self.commands.iter().flat_map(|c| match c {
            DrawCommand::Text { lines, .. } => lines.iter().map(String::as_str).collect::<Vec<_>>(),
            _ => Vec::new(),
        })
    }

    #[cfg(test)]
    pub fn rects(&self) -> impl Iterator<Item = &DrawCommand> + '_ {
        self.commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::Rect { .. }))
    }

    #[cfg(test)]
    pub fn markers(&self) -> impl Iterator<Item = &DrawCommand> + '_ {
        self.commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::Marker { .. }))
    }
}
