// Run configuration: typed sections loaded from TOML with an optional override

use crate::error::{PlotError, Result};
use crate::layout::bar_height;
use crate::palette::{parse_color, ColorPalette, ColorScheme};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

/// Column name reserved for the per-row group assignment.
pub const GROUP_COLUMN: &str = "surveygraph_group";

/// Name of the group synthesized when no groups are configured.
pub const DEFAULT_GROUP: &str = "surveygraph_default_group";

const REQUIRED_SECTIONS: [&str; 2] = ["data", "plotting"];

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Configuration {
    pub data: DataConfig,
    pub plotting: PlottingConfig,
    pub barplots: BarplotsConfig,
    pub lineplots: LineplotsConfig,
    pub histograms: HistogramsConfig,
    pub timelines: TimelinesConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DataConfig {
    pub name_label: String,
    pub question_label: String,
    pub mapping_label: String,
    pub block_id_label: String,
    pub missing_label: String,
    pub no_answer_code: i64,
    pub delimiter: String,
    /// Evaluated in declaration order; a later match overrides an earlier one.
    pub groups: Vec<GroupConfig>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            name_label: "Variable".to_string(),
            question_label: "Label".to_string(),
            mapping_label: "Value Codes".to_string(),
            block_id_label: "Group".to_string(),
            missing_label: "Missing Code".to_string(),
            no_answer_code: 999,
            delimiter: ",".to_string(),
            groups: Vec::new(),
        }
    }
}

impl DataConfig {
    /// The delimiter as the single byte the CSV reader expects.
    pub fn delimiter_byte(&self) -> Result<u8> {
        let value = if self.delimiter == "\\t" { "\t" } else { self.delimiter.as_str() };
        match value.as_bytes() {
            [byte] => Ok(*byte),
            _ => Err(PlotError::config(format!(
                "data.delimiter must be a single ASCII character, got '{}'",
                self.delimiter
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupConfig {
    pub name: String,
    pub filter: GroupFilter,
}

/// Either an all-or-nothing constant or a filter expression over columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GroupFilter {
    Constant(bool),
    Expression(String),
}

impl fmt::Display for GroupFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupFilter::Constant(value) => write!(f, "{}", value),
            GroupFilter::Expression(expr) => write!(f, "{}", expr),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Svg,
    Png,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Svg => "svg",
            OutputFormat::Png => "png",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlottingConfig {
    pub format: OutputFormat,
    /// Pixels per inch used when rasterizing the inch-based layouts
    pub dpi: f64,
    pub nbins: usize,
    pub unit: String,
}

impl Default for PlottingConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Svg,
            dpi: 100.0,
            nbins: 5,
            unit: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FontConfig {
    pub family: String,
    /// Size in points
    pub size: f64,
}

impl FontConfig {
    fn sized(size: f64) -> Self {
        Self {
            family: "sans-serif".to_string(),
            size,
        }
    }
}

impl Default for FontConfig {
    fn default() -> Self {
        Self::sized(12.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BarplotsConfig {
    pub invert: bool,
    pub color_scheme: String,
    pub text_color: String,
    /// Segments narrower than this fraction get no count label
    pub min_label_width: f64,
    pub font: FontConfig,
    pub font_small: FontConfig,
    pub layout: BarLayout,
}

impl Default for BarplotsConfig {
    fn default() -> Self {
        Self {
            invert: false,
            color_scheme: "RdYlGn".to_string(),
            text_color: "black".to_string(),
            min_label_width: 0.05,
            font: FontConfig::sized(12.0),
            font_small: FontConfig::sized(10.0),
            layout: BarLayout::default(),
        }
    }
}

/// Bar plot geometry. Widths and `height_question` are inches, `height_rel_*`
/// are fractions of one question row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BarLayout {
    pub width_question: f64,
    pub width_groups: f64,
    pub width_plot: f64,
    pub width_summary: f64,
    pub width_pad: f64,
    pub height_question: f64,
    pub height_rel_pad_questions: f64,
    pub height_rel_pad_groups: f64,
}

impl Default for BarLayout {
    fn default() -> Self {
        Self {
            width_question: 3.0,
            width_groups: 1.0,
            width_plot: 4.0,
            width_summary: 1.0,
            width_pad: 0.1,
            height_question: 1.0,
            height_rel_pad_questions: 0.3,
            height_rel_pad_groups: 0.05,
        }
    }
}

fn default_colors() -> Vec<String> {
    ["C0", "C1", "C2", "C3", "C4"]
        .iter()
        .map(|c| c.to_string())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LineplotsConfig {
    pub invert: bool,
    pub colors: Vec<String>,
    pub marker_size: f64,
    pub line_width: f64,
    pub font: FontConfig,
    pub font_small: FontConfig,
    pub layout: LineLayout,
}

impl Default for LineplotsConfig {
    fn default() -> Self {
        Self {
            invert: false,
            colors: default_colors(),
            marker_size: 5.0,
            line_width: 2.0,
            font: FontConfig::sized(12.0),
            font_small: FontConfig::sized(10.0),
            layout: LineLayout::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LineLayout {
    pub width_question: f64,
    /// Group legend column right of the plot
    pub width_labels: f64,
    pub width_plot: f64,
    pub width_pad: f64,
    pub height_question: f64,
    /// Space above the first and below the last question, in rows
    pub rel_edge_line_height: f64,
}

impl Default for LineLayout {
    fn default() -> Self {
        Self {
            width_question: 3.0,
            width_labels: 1.0,
            width_plot: 4.0,
            width_pad: 0.1,
            height_question: 0.6,
            rel_edge_line_height: 0.5,
        }
    }
}

/// Which code of a binary mapping counts as "yes" in multi histograms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Affirmative {
    #[default]
    Lower,
    Higher,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HistogramsConfig {
    pub colors: Vec<String>,
    pub affirmative: Affirmative,
    /// Headroom so the longest bar leaves space for its count label
    pub margin_factor: f64,
    pub font: FontConfig,
    pub font_small: FontConfig,
    pub layout: HistogramLayout,
}

impl Default for HistogramsConfig {
    fn default() -> Self {
        Self {
            colors: default_colors(),
            affirmative: Affirmative::Lower,
            margin_factor: 1.1,
            font: FontConfig::sized(12.0),
            font_small: FontConfig::sized(10.0),
            layout: HistogramLayout::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HistogramLayout {
    pub width_labels: f64,
    pub width_plot: f64,
    pub width_pad: f64,
    pub width_summary: f64,
    /// Height of one group bar in inches
    pub height_bar: f64,
    pub height_rel_pad_questions: f64,
    pub bar_label_pad: f64,
    pub pad_summary_top: f64,
    pub pad_summary_right: f64,
}

impl Default for HistogramLayout {
    fn default() -> Self {
        Self {
            width_labels: 2.5,
            width_plot: 4.0,
            width_pad: 0.1,
            width_summary: 1.0,
            height_bar: 0.3,
            height_rel_pad_questions: 0.3,
            bar_label_pad: 0.05,
            pad_summary_top: 0.1,
            pad_summary_right: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimelinesConfig {
    pub colors: Vec<String>,
    pub marker_size: f64,
    pub font: FontConfig,
    pub font_small: FontConfig,
    pub layout: TimelineLayout,
}

impl Default for TimelinesConfig {
    fn default() -> Self {
        Self {
            colors: vec!["blue".to_string(), "red".to_string()],
            marker_size: 5.0,
            font: FontConfig::sized(12.0),
            font_small: FontConfig::sized(10.0),
            layout: TimelineLayout::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimelineLayout {
    pub width_question: f64,
    pub width_plot: f64,
    pub width_pad: f64,
    pub height_question: f64,
    /// Horizontal space for dataset labels below the plot
    pub height_axis: f64,
}

impl Default for TimelineLayout {
    fn default() -> Self {
        Self {
            width_question: 3.0,
            width_plot: 4.0,
            width_pad: 0.1,
            height_question: 1.5,
            height_axis: 0.4,
        }
    }
}

impl Configuration {
    /// Load the base file, deep-merge the optional override on top and validate.
    pub fn load(base: &Path, override_path: Option<&Path>) -> Result<Self> {
        let mut document = read_table(base)?;
        for section in REQUIRED_SECTIONS {
            if !document.contains_key(section) {
                return Err(PlotError::config(format!(
                    "{} has no [{}] table",
                    base.display(),
                    section
                )));
            }
        }
        debug!("Read base configuration from {}", base.display());

        if let Some(path) = override_path {
            let overrides = read_table(path)?;
            merge_tables(&mut document, overrides);
            info!("Applied configuration override {}", path.display());
        }

        Self::from_table(document)
    }

    /// Parse a configuration document without the required-table check.
    #[cfg(test)]
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let table: toml::Table = content
            .parse()
            .map_err(|e: toml::de::Error| PlotError::config(e.to_string()))?;
        Self::from_table(table)
    }

    fn from_table(table: toml::Table) -> Result<Self> {
        let mut config: Configuration = toml::Value::Table(table)
            .try_into()
            .map_err(|e: toml::de::Error| PlotError::config(e.to_string()))?;
        config.check()?;
        Ok(config)
    }

    /// Validate cross-field rules and fill in the default group.
    pub fn check(&mut self) -> Result<()> {
        self.data.delimiter_byte()?;

        if self.plotting.nbins == 0 {
            return Err(PlotError::config("plotting.nbins must be at least 1"));
        }
        if !(self.plotting.dpi.is_finite() && self.plotting.dpi > 0.0) {
            return Err(PlotError::config("plotting.dpi must be positive"));
        }
        if !(self.histograms.margin_factor.is_finite() && self.histograms.margin_factor >= 1.0) {
            return Err(PlotError::config("histograms.margin_factor must be >= 1"));
        }
        for (section, colors) in [
            ("lineplots", &self.lineplots.colors),
            ("histograms", &self.histograms.colors),
            ("timelines", &self.timelines.colors),
        ] {
            ColorPalette::from_names(colors)
                .map_err(|e| PlotError::config(format!("{}.colors: {}", section, e)))?;
        }
        if parse_color(&self.barplots.text_color).is_none() {
            return Err(PlotError::config(format!(
                "barplots.text_color: unknown color '{}'",
                self.barplots.text_color
            )));
        }
        if ColorScheme::by_name(&self.barplots.color_scheme).is_none() {
            return Err(PlotError::config(format!(
                "barplots.color_scheme: unknown color scheme '{}'",
                self.barplots.color_scheme
            )));
        }

        let mut seen = HashSet::new();
        for group in &self.data.groups {
            if group.name.is_empty() {
                return Err(PlotError::config("group names must not be empty"));
            }
            if group.name == GROUP_COLUMN {
                return Err(PlotError::config(format!(
                    "group name '{}' is reserved",
                    GROUP_COLUMN
                )));
            }
            if !seen.insert(group.name.as_str()) {
                return Err(PlotError::config(format!(
                    "group '{}' is defined more than once",
                    group.name
                )));
            }
        }

        if self.data.groups.is_empty() {
            debug!("No groups configured, using {}", DEFAULT_GROUP);
            self.data.groups.push(GroupConfig {
                name: DEFAULT_GROUP.to_string(),
                filter: GroupFilter::Constant(true),
            });
        }

        // every group needs room in a bar plot row before anything is drawn
        let layout = &self.barplots.layout;
        bar_height(
            self.data.groups.len(),
            layout.height_rel_pad_questions,
            layout.height_rel_pad_groups,
        )?;
        Ok(())
    }

    pub fn group_names(&self) -> Vec<&str> {
        self.data.groups.iter().map(|g| g.name.as_str()).collect()
    }

    /// Serialize the effective configuration for later reruns.
    pub fn write(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| PlotError::config(format!("unable to serialize configuration: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PlotError::io(parent, e))?;
        }
        std::fs::write(path, content).map_err(|e| PlotError::io(path, e))?;
        info!("Wrote configuration to {}", path.display());
        Ok(())
    }
}

fn read_table(path: &Path) -> Result<toml::Table> {
    let content = std::fs::read_to_string(path).map_err(|e| PlotError::io(path, e))?;
    content
        .parse::<toml::Table>()
        .map_err(|e| PlotError::config(format!("{}: {}", path.display(), e)))
}

/// Tables merge key by key, anything else in `overrides` replaces the base value.
fn merge_tables(base: &mut toml::Table, overrides: toml::Table) {
    for (key, value) in overrides {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn toml_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    const BASE: &str = r#"
[data]
no_answer_code = 99
delimiter = ";"

[[data.groups]]
name = "all"
filter = true

[[data.groups]]
name = "young"
filter = "age < 30"

[plotting]
format = "png"
nbins = 4

[barplots]
invert = true
"#;

    #[test]
    fn test_load_base() {
        let file = toml_file(BASE);
        let config = Configuration::load(file.path(), None).unwrap();
        assert_eq!(config.data.no_answer_code, 99);
        assert_eq!(config.data.delimiter_byte().unwrap(), b';');
        assert_eq!(config.plotting.format, OutputFormat::Png);
        assert_eq!(config.plotting.nbins, 4);
        assert!(config.barplots.invert);
        // untouched sections keep their defaults
        assert_eq!(config.lineplots, LineplotsConfig::default());
        assert_eq!(config.group_names(), vec!["all", "young"]);
        assert_eq!(
            config.data.groups[1].filter,
            GroupFilter::Expression("age < 30".to_string())
        );
    }

    #[test]
    fn test_missing_required_section() {
        let file = toml_file("[data]\nno_answer_code = 1\n");
        let err = Configuration::load(file.path(), None).unwrap_err();
        assert!(matches!(err, PlotError::Config(_)));
        assert!(err.to_string().contains("[plotting]"));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = Configuration::from_toml_str("[plotting]\nnbinz = 3\n").unwrap_err();
        assert!(matches!(err, PlotError::Config(_)));
        assert!(err.to_string().contains("nbinz"));
    }

    #[test]
    fn test_wrong_type_rejected() {
        let err = Configuration::from_toml_str("[plotting]\nnbins = \"five\"\n").unwrap_err();
        assert!(matches!(err, PlotError::Config(_)));
    }

    #[test]
    fn test_pdf_format_rejected() {
        let err = Configuration::from_toml_str("[plotting]\nformat = \"pdf\"\n").unwrap_err();
        assert!(matches!(err, PlotError::Config(_)));
    }

    #[test]
    fn test_override_deep_merges() {
        let base = toml_file(BASE);
        let overrides = toml_file("[plotting]\nnbins = 7\n[barplots.layout]\nwidth_plot = 6.5\n");
        let config = Configuration::load(base.path(), Some(overrides.path())).unwrap();
        assert_eq!(config.plotting.nbins, 7);
        // sibling keys of an overridden table survive
        assert_eq!(config.plotting.format, OutputFormat::Png);
        assert!(config.barplots.invert);
        assert_eq!(config.barplots.layout.width_plot, 6.5);
        assert_eq!(config.barplots.layout.width_question, 3.0);
    }

    #[test]
    fn test_override_replaces_group_list() {
        let base = toml_file(BASE);
        let overrides = toml_file("[[data.groups]]\nname = \"old\"\nfilter = \"age >= 60\"\n");
        let config = Configuration::load(base.path(), Some(overrides.path())).unwrap();
        assert_eq!(config.group_names(), vec!["old"]);
    }

    #[test]
    fn test_empty_groups_become_default_group() {
        let config = Configuration::from_toml_str("[data]\n[plotting]\n").unwrap();
        assert_eq!(config.data.groups.len(), 1);
        assert_eq!(config.data.groups[0].name, DEFAULT_GROUP);
        assert_eq!(config.data.groups[0].filter, GroupFilter::Constant(true));
    }

    #[test]
    fn test_reserved_group_name() {
        let content = format!(
            "[[data.groups]]\nname = \"{}\"\nfilter = true\n",
            GROUP_COLUMN
        );
        let err = Configuration::from_toml_str(&content).unwrap_err();
        assert!(err.to_string().contains("reserved"));
    }

    #[test]
    fn test_duplicate_group_name() {
        let content = "[[data.groups]]\nname = \"a\"\nfilter = true\n\
                       [[data.groups]]\nname = \"a\"\nfilter = false\n";
        let err = Configuration::from_toml_str(content).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_unknown_colors_rejected() {
        let content = "[lineplots]\ncolors = [\"C0\", \"mauvish\"]\n";
        let err = Configuration::from_toml_str(content).unwrap_err();
        assert!(err.to_string().contains("mauvish"));
        let err = Configuration::from_toml_str("[barplots]\ncolor_scheme = \"Jet\"\n").unwrap_err();
        assert!(err.to_string().contains("color scheme"));
        let err = Configuration::from_toml_str("[lineplots]\ncolors = []\n").unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    fn groups_toml(n: usize) -> String {
        (0..n)
            .map(|i| format!("[[data.groups]]\nname = \"g{}\"\nfilter = true\n", i))
            .collect()
    }

    #[test]
    fn test_groups_must_fit_bar_rows() {
        // default paddings leave room for at most 14 bars per question
        assert!(Configuration::from_toml_str(&groups_toml(14)).is_ok());
        let err = Configuration::from_toml_str(&groups_toml(15)).unwrap_err();
        assert!(matches!(err, PlotError::Config(_)));
        assert!(err.to_string().contains("15 groups"));

        let roomier = format!(
            "{}[barplots.layout]\nheight_rel_pad_groups = 0.01\n",
            groups_toml(15)
        );
        assert!(Configuration::from_toml_str(&roomier).is_ok());
    }

    #[test]
    fn test_nan_settings_rejected() {
        let err = Configuration::from_toml_str("[plotting]\ndpi = nan\n").unwrap_err();
        assert!(err.to_string().contains("dpi"));
        let err =
            Configuration::from_toml_str("[histograms]\nmargin_factor = nan\n").unwrap_err();
        assert!(err.to_string().contains("margin_factor"));
        let err = Configuration::from_toml_str("[barplots.layout]\nheight_rel_pad_groups = nan\n")
            .unwrap_err();
        assert!(matches!(err, PlotError::Config(_)));
    }

    #[test]
    fn test_bad_delimiter() {
        let err = Configuration::from_toml_str("[data]\ndelimiter = \";;\"\n").unwrap_err();
        assert!(err.to_string().contains("delimiter"));
    }

    #[test]
    fn test_tab_delimiter() {
        let config = Configuration::from_toml_str("[data]\ndelimiter = \"\\t\"\n").unwrap();
        assert_eq!(config.data.delimiter_byte().unwrap(), b'\t');
    }

    #[test]
    fn test_write_and_reload() {
        let base = toml_file(BASE);
        let config = Configuration::load(base.path(), None).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("config_run.toml");
        config.write(&path).unwrap();
        let reloaded = Configuration::load(&path, None).unwrap();
        assert_eq!(reloaded, config);
    }
}
