// Error taxonomy for configuration, codebook and data validation

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading and validating the inputs of a run.
///
/// Everything here is raised eagerly, before the first block is aggregated.
#[derive(Debug, Error)]
pub enum PlotError {
    /// Malformed configuration, or a required key / table is missing.
    #[error("configuration error: {0}")]
    Config(String),

    /// A codebook value-map cell is not a list of `code=label` lines.
    #[error(
        "unable to parse value mapping for variable '{variable}' (codebook row {line}): '{cell}'"
    )]
    MappingParse {
        variable: String,
        line: usize,
        cell: String,
    },

    /// Shared per-block attributes disagree between two member variables.
    #[error(
        "column {attribute} not unique for question block {block}: \
         '{first_variable}' has '{first_value}' but '{second_variable}' has '{second_value}'"
    )]
    BlockConsistency {
        block: i64,
        attribute: String,
        first_variable: String,
        first_value: String,
        second_variable: String,
        second_value: String,
    },

    /// Codebook variables without a matching column in a dataset.
    #[error("dataset '{dataset}' is missing codebook variables: {}", variables.join(", "))]
    MissingVariable {
        dataset: String,
        variables: Vec<String>,
    },

    /// Data values outside the declared domain of their variables, all of them.
    #[error(
        "data values outside their declared domain ({} found):\n{}",
        values.len(),
        list_lines(values)
    )]
    OutOfRange { values: Vec<InvalidValue> },

    /// A group predicate failed to parse or to evaluate.
    #[error("unable to process filter '{filter}' of group '{group}': {reason}")]
    Filter {
        group: String,
        filter: String,
        reason: String,
    },

    /// The codebook table itself is malformed.
    #[error("invalid codebook {path}: {reason}")]
    CodeBook { path: PathBuf, reason: String },

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to process CSV {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// One offending cell of a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidValue {
    pub dataset: String,
    pub variable: String,
    /// 1-based data row
    pub row: usize,
    pub value: String,
    pub domain: String,
}

impl fmt::Display for InvalidValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "dataset '{}': value '{}' of variable '{}' (row {}) is outside its {}",
            self.dataset, self.value, self.variable, self.row, self.domain
        )
    }
}

fn list_lines(values: &[InvalidValue]) -> String {
    values
        .iter()
        .map(|v| format!("  {}", v))
        .collect::<Vec<_>>()
        .join("\n")
}

impl PlotError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Csv {
            path: path.into(),
            source,
        }
    }

    pub fn codebook(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CodeBook {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for the validation core.
pub type Result<T> = std::result::Result<T, PlotError>;
