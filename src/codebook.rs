// Codebook: per-variable labels, value maps and question blocks

use crate::config::Configuration;
use crate::csv_reader::{read_csv_file, write_csv_file, CsvData};
use crate::error::{PlotError, Result};
use crate::palette::{parse_color, ColorScheme};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Block id of variables that are not plotted.
pub const UNASSIGNED_BLOCK: i64 = -1;

// Column names of the cached codebook written to the output directory.
const COL_VARIABLE: &str = "variable";
const COL_LABEL: &str = "label";
const COL_VALUE_MAP: &str = "value_map";
const COL_BLOCK: &str = "block";
const COL_MISSING: &str = "missing_label";
const COL_NBINS: &str = "plotting.nbins";
const COL_UNIT: &str = "plotting.unit";
const COL_TEXT_COLOR: &str = "barplots.text_color";
const COL_COLOR_SCHEME: &str = "barplots.color_scheme";
const COL_BAR_INVERT: &str = "barplots.invert";
const COL_LINE_INVERT: &str = "lineplots.invert";
const COL_NO_ANSWER: &str = "data.no_answer_code";

const CACHE_COLUMNS: [&str; 12] = [
    COL_VARIABLE,
    COL_LABEL,
    COL_VALUE_MAP,
    COL_BLOCK,
    COL_MISSING,
    COL_NBINS,
    COL_UNIT,
    COL_TEXT_COLOR,
    COL_COLOR_SCHEME,
    COL_BAR_INVERT,
    COL_LINE_INVERT,
    COL_NO_ANSWER,
];

/// Ordered mapping from integer response code to its label.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValueMap(BTreeMap<i64, String>);

impl ValueMap {
    /// Parse a `code=label` per line cell. `None` means a numeric variable.
    ///
    /// The no-answer code is dropped even when the cell lists it.
    pub fn parse(cell: &str, no_answer_code: i64) -> std::result::Result<Option<Self>, String> {
        let trimmed = cell.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
            return Ok(None);
        }

        let mut map = BTreeMap::new();
        for line in trimmed.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let (code, label) = line
                .split_once('=')
                .ok_or_else(|| format!("line '{}' has no '='", line))?;
            let code: i64 = code
                .trim()
                .parse()
                .map_err(|_| format!("code '{}' is not an integer", code.trim()))?;
            if code == no_answer_code {
                continue;
            }
            map.insert(code, label.trim().to_string());
        }

        if map.is_empty() {
            return Err("mapping defines no codes besides the no-answer code".to_string());
        }
        Ok(Some(Self(map)))
    }

    #[cfg(test)]
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (i64, S)>,
        S: Into<String>,
    {
        Self(pairs.into_iter().map(|(k, v)| (k, v.into())).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, code: i64) -> bool {
        self.0.contains_key(&code)
    }

    /// Codes in ascending order
    pub fn codes(&self) -> impl Iterator<Item = i64> + '_ {
        self.0.keys().copied()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> + '_ {
        self.0.values().map(String::as_str)
    }

    pub fn first_code(&self) -> Option<i64> {
        self.0.keys().next().copied()
    }

    pub fn last_code(&self) -> Option<i64> {
        self.0.keys().next_back().copied()
    }

    pub fn label(&self, code: i64) -> Option<&str> {
        self.0.get(&code).map(String::as_str)
    }
}

impl fmt::Display for ValueMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (code, label)) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}={}", code, label)?;
        }
        Ok(())
    }
}

/// One codebook row.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeBookEntry {
    pub variable: String,
    pub label: String,
    pub value_map: Option<ValueMap>,
    pub block: i64,
    /// Code meaning "not applicable" for this variable
    pub missing_code: Option<i64>,
    pub nbins: usize,
    pub unit: String,
    pub text_color: String,
    pub color_scheme: String,
    pub bar_invert: bool,
    pub line_invert: bool,
    pub no_answer_code: i64,
}

impl CodeBookEntry {
    /// Entry whose plotting attributes are copied from the configuration.
    pub fn new(
        config: &Configuration,
        variable: impl Into<String>,
        label: impl Into<String>,
        value_map: Option<ValueMap>,
        block: i64,
    ) -> Self {
        Self {
            variable: variable.into(),
            label: label.into(),
            value_map,
            block: if block < 0 { UNASSIGNED_BLOCK } else { block },
            missing_code: None,
            nbins: config.plotting.nbins,
            unit: config.plotting.unit.clone(),
            text_color: config.barplots.text_color.clone(),
            color_scheme: config.barplots.color_scheme.clone(),
            bar_invert: config.barplots.invert,
            line_invert: config.lineplots.invert,
            no_answer_code: config.data.no_answer_code,
        }
    }

    fn value_map_cell(&self) -> String {
        self.value_map
            .as_ref()
            .map(|m| m.to_string())
            .unwrap_or_default()
    }

    /// Attributes that every member of a block must share, as printable values.
    fn shared_attributes(&self) -> [(&'static str, String); 7] {
        [
            (COL_VALUE_MAP, self.value_map_cell()),
            (COL_NBINS, self.nbins.to_string()),
            (COL_UNIT, self.unit.clone()),
            (COL_TEXT_COLOR, self.text_color.clone()),
            (COL_COLOR_SCHEME, self.color_scheme.clone()),
            (COL_BAR_INVERT, self.bar_invert.to_string()),
            (COL_LINE_INVERT, self.line_invert.to_string()),
        ]
    }

    fn to_record(&self) -> Vec<String> {
        vec![
            self.variable.clone(),
            self.label.clone(),
            self.value_map_cell(),
            self.block.to_string(),
            self.missing_code.map(|c| c.to_string()).unwrap_or_default(),
            self.nbins.to_string(),
            self.unit.clone(),
            self.text_color.clone(),
            self.color_scheme.clone(),
            self.bar_invert.to_string(),
            self.line_invert.to_string(),
            self.no_answer_code.to_string(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CodeBook {
    pub path: PathBuf,
    entries: Vec<CodeBookEntry>,
    block_ids: BTreeSet<i64>,
}

impl CodeBook {
    pub fn new(path: impl Into<PathBuf>, entries: Vec<CodeBookEntry>) -> Self {
        let block_ids = entries
            .iter()
            .map(|e| e.block)
            .filter(|b| *b != UNASSIGNED_BLOCK)
            .collect();
        Self {
            path: path.into(),
            entries,
            block_ids,
        }
    }

    /// Read a user codebook whose columns are named by `config.data`.
    pub fn read_source(path: &Path, config: &Configuration) -> Result<Self> {
        let table = read_csv_file(path, config.data.delimiter_byte()?)?;
        let labels = &config.data;
        let col = |name: &str| {
            table.find_column(name).ok_or_else(|| {
                PlotError::codebook(path, format!("required column '{}' not found", name))
            })
        };
        let i_variable = col(&labels.name_label)?;
        let i_label = col(&labels.question_label)?;
        let i_map = col(&labels.mapping_label)?;
        let i_block = col(&labels.block_id_label)?;
        let i_missing = col(&labels.missing_label)?;

        let mut entries = Vec::with_capacity(table.n_rows());
        for (row_idx, row) in table.rows.iter().enumerate() {
            let cell = |i: usize| row.get(i).map(String::as_str).unwrap_or("");
            let variable = cell(i_variable).trim().to_string();
            let value_map = ValueMap::parse(cell(i_map), labels.no_answer_code).map_err(|_| {
                PlotError::MappingParse {
                    variable: variable.clone(),
                    line: row_idx + 1,
                    cell: cell(i_map).to_string(),
                }
            })?;
            let block = parse_block(cell(i_block))
                .ok_or_else(|| bad_cell(path, row_idx, &labels.block_id_label, cell(i_block)))?;
            let missing_code = parse_optional_code(cell(i_missing))
                .ok_or_else(|| bad_cell(path, row_idx, &labels.missing_label, cell(i_missing)))?;

            let mut entry =
                CodeBookEntry::new(config, variable, cell(i_label).trim(), value_map, block);
            entry.missing_code = missing_code;
            entries.push(entry);
        }

        let codebook = Self::new(path, entries);
        codebook.validate()?;
        Ok(codebook)
    }

    /// Read a codebook previously written by [`CodeBook::write`].
    pub fn read_cached(path: &Path) -> Result<Self> {
        let table = read_csv_file(path, b',')?;
        let mut idx = [0usize; CACHE_COLUMNS.len()];
        for (slot, name) in idx.iter_mut().zip(CACHE_COLUMNS) {
            *slot = table.find_column(name).ok_or_else(|| {
                PlotError::codebook(path, format!("required column '{}' not found", name))
            })?;
        }

        let mut entries = Vec::with_capacity(table.n_rows());
        for (row_idx, row) in table.rows.iter().enumerate() {
            let cell = |k: usize| row.get(idx[k]).map(String::as_str).unwrap_or("");
            let bad = |k: usize| bad_cell(path, row_idx, CACHE_COLUMNS[k], cell(k));

            let no_answer_code: i64 = cell(11).trim().parse().map_err(|_| bad(11))?;
            let variable = cell(0).to_string();
            let value_map =
                ValueMap::parse(cell(2), no_answer_code).map_err(|_| PlotError::MappingParse {
                    variable: variable.clone(),
                    line: row_idx + 1,
                    cell: cell(2).to_string(),
                })?;

            entries.push(CodeBookEntry {
                variable,
                label: cell(1).to_string(),
                value_map,
                block: parse_block(cell(3)).ok_or_else(|| bad(3))?,
                missing_code: parse_optional_code(cell(4)).ok_or_else(|| bad(4))?,
                nbins: cell(5).trim().parse().map_err(|_| bad(5))?,
                unit: cell(6).to_string(),
                text_color: cell(7).to_string(),
                color_scheme: cell(8).to_string(),
                bar_invert: parse_bool(cell(9)).ok_or_else(|| bad(9))?,
                line_invert: parse_bool(cell(10)).ok_or_else(|| bad(10))?,
                no_answer_code,
            });
        }

        let codebook = Self::new(path, entries);
        codebook.validate()?;
        Ok(codebook)
    }

    /// Use the cached copy unless a full rerun is requested, then validate.
    pub fn setup(
        config: &Configuration,
        source: &Path,
        cache: &Path,
        full_rerun: bool,
    ) -> Result<Self> {
        let codebook = if cache.exists() && !full_rerun {
            warn!(
                "Found existing codebook {}, using it instead of {}",
                cache.display(),
                source.display()
            );
            Self::read_cached(cache)?
        } else {
            Self::read_source(source, config)?
        };
        codebook.summarize();
        info!("Finished setting up codebook");
        Ok(codebook)
    }

    /// Check table-level rules and per-block consistency.
    pub fn validate(&self) -> Result<()> {
        if self.entries.is_empty() {
            return Err(PlotError::codebook(&self.path, "no variables defined"));
        }

        let mut seen = HashSet::new();
        for entry in &self.entries {
            if entry.variable.is_empty() {
                return Err(PlotError::codebook(&self.path, "empty variable name"));
            }
            if !seen.insert(entry.variable.as_str()) {
                return Err(PlotError::codebook(
                    &self.path,
                    format!("variable '{}' is listed more than once", entry.variable),
                ));
            }
            if entry.nbins == 0 {
                return Err(PlotError::codebook(
                    &self.path,
                    format!("variable '{}' has zero bins", entry.variable),
                ));
            }
            if ColorScheme::by_name(&entry.color_scheme).is_none() {
                return Err(PlotError::codebook(
                    &self.path,
                    format!(
                        "variable '{}' uses unknown color scheme '{}'",
                        entry.variable, entry.color_scheme
                    ),
                ));
            }
            if parse_color(&entry.text_color).is_none() {
                return Err(PlotError::codebook(
                    &self.path,
                    format!(
                        "variable '{}' uses unknown text color '{}'",
                        entry.variable, entry.text_color
                    ),
                ));
            }
        }

        for block in self.blocks() {
            let members = self.block_entries(block);
            let Some((first, rest)) = members.split_first() else {
                continue;
            };
            let reference = first.shared_attributes();
            for other in rest {
                let attributes = other.shared_attributes();
                for ((name, expected), (_, found)) in reference.iter().zip(attributes.iter()) {
                    if expected != found {
                        return Err(PlotError::BlockConsistency {
                            block,
                            attribute: name.to_string(),
                            first_variable: first.variable.clone(),
                            first_value: expected.clone(),
                            second_variable: other.variable.clone(),
                            second_value: found.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    pub fn entries(&self) -> &[CodeBookEntry] {
        &self.entries
    }

    pub fn entry(&self, variable: &str) -> Option<&CodeBookEntry> {
        self.entries.iter().find(|e| e.variable == variable)
    }

    /// Distinct assigned block ids, ascending. Each call starts a fresh pass.
    pub fn blocks(&self) -> impl Iterator<Item = i64> + '_ {
        self.block_ids.iter().copied()
    }

    /// Members of a block in codebook order
    pub fn block_entries(&self, block: i64) -> Vec<&CodeBookEntry> {
        self.entries.iter().filter(|e| e.block == block).collect()
    }

    pub fn unassigned(&self) -> Vec<&CodeBookEntry> {
        self.block_entries(UNASSIGNED_BLOCK)
    }

    pub fn variables(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|e| e.variable.as_str())
    }

    pub fn to_table(&self) -> CsvData {
        CsvData::new(
            CACHE_COLUMNS.iter().map(|c| c.to_string()).collect(),
            self.entries.iter().map(CodeBookEntry::to_record).collect(),
        )
    }

    /// Persist with the fixed internal column names, always comma separated.
    pub fn write(&self, path: &Path) -> Result<()> {
        write_csv_file(path, &self.to_table())?;
        info!("Wrote codebook to {}", path.display());
        Ok(())
    }

    pub fn summarize(&self) {
        info!("Codebook defines {} variables", self.entries.len());
        info!(
            "Codebook defines {} blocks. Breakdown of variables into blocks:",
            self.block_ids.len()
        );
        for block in self.blocks() {
            let names: Vec<&str> = self
                .block_entries(block)
                .iter()
                .map(|e| e.variable.as_str())
                .collect();
            info!("Block {} contains variables: {}", block, names.join(","));
        }
        let unassigned = self.unassigned();
        if !unassigned.is_empty() {
            let names: Vec<&str> = unassigned.iter().map(|e| e.variable.as_str()).collect();
            warn!(
                "Variables {} are not assigned to any block and will not be plotted",
                names.join(",")
            );
        }
    }
}

fn bad_cell(path: &Path, row_idx: usize, column: &str, value: &str) -> PlotError {
    PlotError::codebook(
        path,
        format!(
            "invalid value '{}' in column '{}' (row {})",
            value,
            column,
            row_idx + 1
        ),
    )
}

/// Integral number, also accepting a `.0` float rendering.
fn parse_integral(cell: &str) -> Option<i64> {
    let trimmed = cell.trim();
    if let Ok(v) = trimmed.parse::<i64>() {
        return Some(v);
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() && v.fract() == 0.0 => Some(v as i64),
        _ => None,
    }
}

fn parse_block(cell: &str) -> Option<i64> {
    let trimmed = cell.trim();
    if trimmed.is_empty() || matches!(trimmed, "NA" | "NaN" | "nan") {
        return Some(UNASSIGNED_BLOCK);
    }
    parse_integral(trimmed).map(|b| if b < 0 { UNASSIGNED_BLOCK } else { b })
}

/// `Some(None)` for an empty cell, `None` when the cell is malformed.
fn parse_optional_code(cell: &str) -> Option<Option<i64>> {
    let trimmed = cell.trim();
    if trimmed.is_empty() || matches!(trimmed, "NA" | "NaN" | "nan") {
        return Some(None);
    }
    parse_integral(trimmed).map(Some)
}

fn parse_bool(cell: &str) -> Option<bool> {
    match cell.trim() {
        "true" | "True" | "TRUE" => Some(true),
        "false" | "False" | "FALSE" => Some(false),
        _ => None,
    }
}
