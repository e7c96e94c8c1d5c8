// Color palettes: group color cycles and sampled color schemes for bar segments

use std::fmt;

/// An opaque 8-bit RGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const BLACK: Rgb = Rgb(0, 0, 0);
    pub const WHITE: Rgb = Rgb(255, 255, 255);

    fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#')?;
        let expanded: String = match digits.len() {
            3 => digits.chars().flat_map(|c| [c, c]).collect(),
            6 => digits.to_string(),
            _ => return None,
        };
        let channel = |i: usize| u8::from_str_radix(expanded.get(i..i + 2)?, 16).ok();
        Some(Rgb(channel(0)?, channel(2)?, channel(4)?))
    }

    fn lerp(self, other: Rgb, t: f64) -> Rgb {
        let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        Rgb(mix(self.0, other.0), mix(self.1, other.1), mix(self.2, other.2))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

// matplotlib's default property cycle, addressed as C0..C9
const CYCLE: [&str; 10] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf",
];

const NAMED: [(&str, &str); 24] = [
    ("black", "#000000"),
    ("white", "#ffffff"),
    ("red", "#ff0000"),
    ("green", "#008000"),
    ("blue", "#0000ff"),
    ("orange", "#ffa500"),
    ("purple", "#800080"),
    ("brown", "#a52a2a"),
    ("pink", "#ffc0cb"),
    ("gray", "#808080"),
    ("grey", "#808080"),
    ("olive", "#808000"),
    ("cyan", "#00ffff"),
    ("magenta", "#ff00ff"),
    ("yellow", "#ffff00"),
    ("navy", "#000080"),
    ("teal", "#008080"),
    ("maroon", "#800000"),
    ("darkgreen", "#006400"),
    ("darkblue", "#00008b"),
    ("darkred", "#8b0000"),
    ("lightgray", "#d3d3d3"),
    ("lightgrey", "#d3d3d3"),
    ("darkgray", "#a9a9a9"),
];

/// Parse `C0`..`C9`, a named color or `#rgb` / `#rrggbb`.
pub fn parse_color(name: &str) -> Option<Rgb> {
    let name = name.trim();
    if let Some(idx) = name.strip_prefix('C').and_then(|d| d.parse::<usize>().ok()) {
        return CYCLE.get(idx).and_then(|hex| Rgb::from_hex(hex));
    }
    if name.starts_with('#') {
        return Rgb::from_hex(name);
    }
    let lower = name.to_ascii_lowercase();
    NAMED
        .iter()
        .find(|(n, _)| *n == lower)
        .and_then(|(_, hex)| Rgb::from_hex(hex))
}

/// Color palette for categorical data (one color per group)
#[derive(Debug, Clone, PartialEq)]
pub struct ColorPalette {
    colors: Vec<Rgb>,
}

impl ColorPalette {
    /// Build from configured color names; fails on the first unknown name.
    pub fn from_names(names: &[String]) -> Result<Self, String> {
        let colors = names
            .iter()
            .map(|n| parse_color(n).ok_or_else(|| format!("unknown color '{}'", n)))
            .collect::<Result<Vec<_>, _>>()?;
        if colors.is_empty() {
            return Err("color list is empty".to_string());
        }
        Ok(ColorPalette { colors })
    }

    /// Get color for a specific index (wraps around if index > palette size)
    pub fn get_color(&self, index: usize) -> Rgb {
        self.colors[index % self.colors.len()]
    }
}

// Control points of the supported color schemes, low to high
const RD_YL_GN: &[&str] = &[
    "#a50026", "#d73027", "#f46d43", "#fdae61", "#fee08b", "#ffffbf", "#d9ef8b", "#a6d96a",
    "#66bd63", "#1a9850", "#006837",
];
const RD_YL_BU: &[&str] = &[
    "#a50026", "#d73027", "#f46d43", "#fdae61", "#fee090", "#ffffbf", "#e0f3f8", "#abd9e9",
    "#74add1", "#4575b4", "#313695",
];
const RD_BU: &[&str] = &[
    "#67001f", "#b2182b", "#d6604d", "#f4a582", "#fddbc7", "#f7f7f7", "#d1e5f0", "#92c5de",
    "#4393c3", "#2166ac", "#053061",
];
const BLUES: &[&str] = &[
    "#f7fbff", "#deebf7", "#c6dbef", "#9ecae1", "#6baed6", "#4292c6", "#2171b5", "#08519c",
    "#08306b",
];
const GREENS: &[&str] = &[
    "#f7fcf5", "#e5f5e0", "#c7e9c0", "#a1d99b", "#74c476", "#41ab5d", "#238b45", "#006d2c",
    "#00441b",
];
const REDS: &[&str] = &[
    "#fff5f0", "#fee0d2", "#fcbba1", "#fc9272", "#fb6a4a", "#ef3b2c", "#cb181d", "#a50f15",
    "#67000d",
];
const VIRIDIS: &[&str] = &[
    "#440154", "#482878", "#3e4989", "#31688e", "#26828e", "#1f9e89", "#35b779", "#6ece58",
    "#b5de2b", "#fde725",
];
const COOLWARM: &[&str] = &[
    "#3b4cc0", "#6788ee", "#9abbff", "#c9d7f0", "#edd1c2", "#f7a889", "#e26952", "#b40426",
];

/// A continuous color ramp sampled at evenly spaced points.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorScheme {
    stops: Vec<Rgb>,
}

impl ColorScheme {
    /// Look up a scheme by name; a `_r` suffix reverses it.
    pub fn by_name(name: &str) -> Option<Self> {
        let (base, reversed) = match name.strip_suffix("_r") {
            Some(base) => (base, true),
            None => (name, false),
        };
        let hexes = match base {
            "RdYlGn" => RD_YL_GN,
            "RdYlBu" => RD_YL_BU,
            "RdBu" => RD_BU,
            "Blues" => BLUES,
            "Greens" => GREENS,
            "Reds" => REDS,
            "viridis" => VIRIDIS,
            "coolwarm" => COOLWARM,
            _ => return None,
        };
        let mut stops: Vec<Rgb> = hexes.iter().filter_map(|h| Rgb::from_hex(h)).collect();
        if reversed {
            stops.reverse();
        }
        Some(Self { stops })
    }

    /// Color at `t` in `[0, 1]`
    pub fn at(&self, t: f64) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        let last = self.stops.len() - 1;
        let pos = t * last as f64;
        let idx = (pos.floor() as usize).min(last.saturating_sub(1));
        self.stops[idx].lerp(self.stops[(idx + 1).min(last)], pos - idx as f64)
    }

    /// `n` colors evenly spaced on `[0.15, 0.85]`, reversed when `invert`.
    pub fn sample(&self, n: usize, invert: bool) -> Vec<Rgb> {
        let mut colors: Vec<Rgb> = (0..n)
            .map(|i| {
                let t = if n > 1 {
                    0.15 + 0.7 * i as f64 / (n - 1) as f64
                } else {
                    0.15
                };
                self.at(t)
            })
            .collect();
        if invert {
            colors.reverse();
        }
        colors
    }
}
