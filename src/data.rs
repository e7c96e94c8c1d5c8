// Survey datasets: reading, group assignment, validation and response extraction

use crate::codebook::{CodeBook, CodeBookEntry};
use crate::config::{Configuration, GROUP_COLUMN};
use crate::csv_reader::{read_csv_file, write_csv_file, Cell, CsvData};
use crate::error::{InvalidValue, PlotError, Result};
use crate::filter::GroupPredicate;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Valid responses of one variable with the excluded rows counted.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Responses {
    pub values: Vec<f64>,
    /// Rows holding the no-answer sentinel
    pub n_no_answer: usize,
    /// Rows holding the variable's own missing code
    pub n_missing: usize,
}

/// One labelled dataset, e.g. a single survey wave.
#[derive(Debug, Clone, PartialEq)]
pub struct Data {
    pub name: String,
    pub table: CsvData,
    group_names: Vec<String>,
    /// Index into `group_names` per row; `None` when no group matched
    assignment: Vec<Option<usize>>,
}

impl Data {
    pub fn new(name: impl Into<String>, table: CsvData) -> Self {
        Self {
            name: name.into(),
            table,
            group_names: Vec::new(),
            assignment: Vec::new(),
        }
    }

    /// Check column coverage and assign each row to its group.
    ///
    /// Predicates run in order and a later match overrides an earlier one.
    pub fn bind(&mut self, codebook: &CodeBook, groups: &[GroupPredicate]) -> Result<()> {
        self.check_columns(codebook)?;
        if self.table.has_column(GROUP_COLUMN) {
            return Err(PlotError::config(format!(
                "dataset '{}' already has a column named '{}'",
                self.name, GROUP_COLUMN
            )));
        }

        let mut assignment = vec![None; self.table.n_rows()];
        for (group_idx, predicate) in groups.iter().enumerate() {
            let flags = predicate.evaluate(&self.table)?;
            for (slot, matched) in assignment.iter_mut().zip(flags) {
                if matched {
                    *slot = Some(group_idx);
                }
            }
        }

        self.group_names = groups.iter().map(|g| g.name.clone()).collect();
        self.assignment = assignment;

        for (idx, name) in self.group_names.iter().enumerate() {
            debug!(
                "Dataset {}: group '{}' has {} rows",
                self.name,
                name,
                self.group_size(idx)
            );
        }
        let unmatched = self.assignment.iter().filter(|g| g.is_none()).count();
        if unmatched > 0 {
            warn!(
                "Dataset {}: {} rows match no group and are ignored",
                self.name, unmatched
            );
        }
        Ok(())
    }

    fn group_size(&self, group_idx: usize) -> usize {
        self.assignment
            .iter()
            .filter(|g| **g == Some(group_idx))
            .count()
    }

    /// Every codebook variable must be a column, all absent ones are reported together.
    fn check_columns(&self, codebook: &CodeBook) -> Result<()> {
        let missing: Vec<String> = codebook
            .variables()
            .filter(|v| !self.table.has_column(v))
            .map(str::to_string)
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(PlotError::MissingVariable {
                dataset: self.name.clone(),
                variables: missing,
            })
        }
    }

    /// Every remaining value must be a mapped code, or a finite number for numeric variables.
    pub fn validate(&self, codebook: &CodeBook) -> Result<()> {
        let values = self.invalid_values(codebook)?;
        if values.is_empty() {
            Ok(())
        } else {
            Err(PlotError::OutOfRange { values })
        }
    }

    /// All offending cells, in codebook then row order.
    pub fn invalid_values(&self, codebook: &CodeBook) -> Result<Vec<InvalidValue>> {
        self.check_columns(codebook)?;
        let mut invalid = Vec::new();
        for entry in codebook.entries() {
            let col = self.column_index(entry)?;
            for (row, raw) in self.table.column(col).enumerate() {
                let value = match Cell::parse(raw) {
                    Cell::Missing => continue,
                    Cell::Number(v) => v,
                    Cell::Text(_) => {
                        invalid.push(self.invalid_value(entry, row, raw));
                        continue;
                    }
                };
                if is_code(value, entry.no_answer_code) || is_missing(value, entry) {
                    continue;
                }
                let valid = match &entry.value_map {
                    Some(map) => value.fract() == 0.0 && map.contains(value as i64),
                    None => value.is_finite(),
                };
                if !valid {
                    invalid.push(self.invalid_value(entry, row, raw));
                }
            }
        }
        Ok(invalid)
    }

    fn invalid_value(&self, entry: &CodeBookEntry, row: usize, raw: &str) -> InvalidValue {
        let domain = match &entry.value_map {
            Some(map) => {
                let codes: Vec<String> = map.codes().map(|c| c.to_string()).collect();
                format!("value map {{{}}}", codes.join(", "))
            }
            None => "numeric domain".to_string(),
        };
        InvalidValue {
            dataset: self.name.clone(),
            variable: entry.variable.clone(),
            row: row + 1,
            value: raw.trim().to_string(),
            domain,
        }
    }

    fn column_index(&self, entry: &CodeBookEntry) -> Result<usize> {
        self.table
            .find_column(&entry.variable)
            .ok_or_else(|| PlotError::MissingVariable {
                dataset: self.name.clone(),
                variables: vec![entry.variable.clone()],
            })
    }

    /// Responses of `variable` (a member of `block`) within `group`, or all rows for `None`.
    ///
    /// Exclusion order: NaN, then the no-answer code, then the variable's missing code.
    pub fn aggregate(
        &self,
        codebook: &CodeBook,
        block: i64,
        variable: &str,
        group: Option<&str>,
    ) -> Result<Responses> {
        let entry = codebook
            .entry(variable)
            .filter(|e| e.block == block)
            .ok_or_else(|| {
                PlotError::codebook(
                    &codebook.path,
                    format!("variable '{}' is not part of block {}", variable, block),
                )
            })?;
        let group_idx = match group {
            None => None,
            Some(name) => Some(
                self.group_names
                    .iter()
                    .position(|g| g == name)
                    .ok_or_else(|| {
                        PlotError::config(format!(
                            "group '{}' is not assigned in dataset '{}'",
                            name, self.name
                        ))
                    })?,
            ),
        };

        let col = self.column_index(entry)?;
        let mut responses = Responses::default();
        for (row, raw) in self.table.column(col).enumerate() {
            if group_idx.is_some() && self.assignment.get(row).copied().flatten() != group_idx {
                continue;
            }
            let value = Cell::parse(raw)
                .as_f64()
                .ok_or_else(|| PlotError::OutOfRange {
                    values: vec![self.invalid_value(entry, row, raw)],
                })?;
            if value.is_nan() {
                continue;
            }
            if is_code(value, entry.no_answer_code) {
                responses.n_no_answer += 1;
                continue;
            }
            if is_missing(value, entry) {
                responses.n_missing += 1;
                continue;
            }
            responses.values.push(value);
        }
        Ok(responses)
    }
}

fn is_code(value: f64, code: i64) -> bool {
    value == code as f64
}

fn is_missing(value: f64, entry: &CodeBookEntry) -> bool {
    entry.missing_code.is_some_and(|code| is_code(value, code))
}

/// All datasets of a run, in the order they were given.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataCollection {
    pub datasets: Vec<Data>,
}

impl DataCollection {
    pub fn new(datasets: Vec<Data>) -> Result<Self> {
        let mut seen = HashSet::new();
        for data in &datasets {
            if !seen.insert(data.name.as_str()) {
                return Err(PlotError::config(format!(
                    "dataset label '{}' is used more than once",
                    data.name
                )));
            }
        }
        Ok(Self { datasets })
    }

    /// Read one CSV per path, labelled by `labels` or by the file stem.
    pub fn read_csv_files(paths: &[PathBuf], labels: &[String], delimiter: u8) -> Result<Self> {
        if !labels.is_empty() && labels.len() != paths.len() {
            return Err(PlotError::config(format!(
                "got {} data files but {} labels",
                paths.len(),
                labels.len()
            )));
        }

        let mut datasets = Vec::with_capacity(paths.len());
        for (idx, path) in paths.iter().enumerate() {
            let name = match labels.get(idx) {
                Some(label) => label.clone(),
                None => default_label(path),
            };
            let table = read_csv_file(path, delimiter)?;
            info!(
                "Read dataset {} ({} rows) from {}",
                name,
                table.n_rows(),
                path.display()
            );
            datasets.push(Data::new(name, table));
        }
        Self::new(datasets)
    }

    /// Read a cache directory written by [`DataCollection::write_cache`].
    pub fn read_cache(dir: &Path) -> Result<Self> {
        let entries = std::fs::read_dir(dir).map_err(|e| PlotError::io(dir, e))?;
        let mut sheets = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| PlotError::io(dir, e))?.path();
            if let Some((index, label)) = parse_sheet_name(&path) {
                sheets.push((index, label, path));
            }
        }
        if sheets.is_empty() {
            return Err(PlotError::config(format!(
                "data cache {} holds no datasets",
                dir.display()
            )));
        }
        sheets.sort_by_key(|(index, _, _)| *index);

        let mut datasets = Vec::with_capacity(sheets.len());
        for (_, label, path) in sheets {
            let table = read_csv_file(&path, b',')?;
            datasets.push(Data::new(label, table));
        }
        Self::new(datasets)
    }

    /// One comma separated file per dataset, named `<index>_<label>.csv`.
    pub fn write_cache(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir).map_err(|e| PlotError::io(dir, e))?;
        let stale = std::fs::read_dir(dir).map_err(|e| PlotError::io(dir, e))?;
        for entry in stale {
            let path = entry.map_err(|e| PlotError::io(dir, e))?.path();
            if parse_sheet_name(&path).is_some() {
                std::fs::remove_file(&path).map_err(|e| PlotError::io(&path, e))?;
            }
        }

        for (index, data) in self.datasets.iter().enumerate() {
            let path = dir.join(format!("{}_{}.csv", index, data.name));
            write_csv_file(&path, &data.table)?;
        }
        info!("Wrote {} datasets to {}", self.datasets.len(), dir.display());
        Ok(())
    }

    /// Load datasets (from the cache unless a full rerun is requested), bind and validate.
    pub fn setup(
        config: &Configuration,
        codebook: &CodeBook,
        paths: &[PathBuf],
        labels: &[String],
        cache: &Path,
        full_rerun: bool,
    ) -> Result<Self> {
        let mut collection = if cache.is_dir() && !full_rerun {
            warn!(
                "Found existing data cache {}, using it instead of the input files",
                cache.display()
            );
            Self::read_cache(cache)?
        } else {
            Self::read_csv_files(paths, labels, config.data.delimiter_byte()?)?
        };

        let groups = GroupPredicate::compile_all(&config.data.groups)?;
        collection.bind(codebook, &groups)?;
        collection.validate(codebook)?;
        info!("Finished setting up data");
        Ok(collection)
    }

    pub fn bind(&mut self, codebook: &CodeBook, groups: &[GroupPredicate]) -> Result<()> {
        for data in &mut self.datasets {
            data.bind(codebook, groups)?;
        }
        Ok(())
    }

    /// Validate every dataset and report the offending values of all of them at once.
    pub fn validate(&self, codebook: &CodeBook) -> Result<()> {
        let mut values = Vec::new();
        for data in &self.datasets {
            values.extend(data.invalid_values(codebook)?);
        }
        if values.is_empty() {
            Ok(())
        } else {
            Err(PlotError::OutOfRange { values })
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.datasets.iter().map(|d| d.name.as_str())
    }
}

fn default_label(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn parse_sheet_name(path: &Path) -> Option<(usize, String)> {
    if path.extension()? != "csv" {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    let (index, label) = stem.split_once('_')?;
    Some((index.parse().ok()?, label.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codebook::ValueMap;
    use crate::config::{GroupConfig, GroupFilter};

    fn codebook() -> CodeBook {
        let config = Configuration::default();
        let mut age = CodeBookEntry::new(&config, "age", "Age", None, 2);
        age.missing_code = Some(-9);
        CodeBook::new(
            "mem",
            vec![
                CodeBookEntry::new(
                    &config,
                    "q1",
                    "Question 1",
                    Some(ValueMap::from_pairs([(1, "Yes"), (2, "No")])),
                    1,
                ),
                age,
            ],
        )
    }

    fn table(rows: &[[&str; 3]]) -> CsvData {
        CsvData::new(
            vec!["q1".to_string(), "age".to_string(), "cohort".to_string()],
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    fn groups(specs: &[(&str, GroupFilter)]) -> Vec<GroupPredicate> {
        let configs: Vec<GroupConfig> = specs
            .iter()
            .map(|(name, filter)| GroupConfig {
                name: name.to_string(),
                filter: filter.clone(),
            })
            .collect();
        GroupPredicate::compile_all(&configs).unwrap()
    }

    fn row_group(data: &Data, row: usize) -> Option<&str> {
        data.assignment[row].map(|idx| data.group_names[idx].as_str())
    }

    fn expr(s: &str) -> GroupFilter {
        GroupFilter::Expression(s.to_string())
    }

    fn scenario() -> Data {
        let mut data = Data::new(
            "wave1",
            table(&[
                ["1", "20", "A"],
                ["1", "30", "A"],
                ["2", "-9", "A"],
                ["999", "40", "B"],
                ["", "", "B"],
            ]),
        );
        data.bind(
            &codebook(),
            &groups(&[("A", expr("cohort == 'A'")), ("B", expr("cohort == 'B'"))]),
        )
        .unwrap();
        data
    }

    #[test]
    fn test_aggregate_excludes_and_counts() {
        let data = scenario();
        let cb = codebook();

        let a = data.aggregate(&cb, 1, "q1", Some("A")).unwrap();
        assert_eq!(a.values, vec![1.0, 1.0, 2.0]);
        assert_eq!(a.n_no_answer, 0);

        let b = data.aggregate(&cb, 1, "q1", Some("B")).unwrap();
        assert!(b.values.is_empty());
        assert_eq!(b.n_no_answer, 1);

        let age = data.aggregate(&cb, 2, "age", None).unwrap();
        assert_eq!(age.values, vec![20.0, 30.0, 40.0]);
        assert_eq!(age.n_missing, 1);
    }

    #[test]
    fn test_aggregate_is_idempotent() {
        let data = scenario();
        let cb = codebook();
        let first = data.aggregate(&cb, 1, "q1", Some("A")).unwrap();
        let second = data.aggregate(&cb, 1, "q1", Some("A")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_aggregate_wrong_block_or_group() {
        let data = scenario();
        let cb = codebook();
        assert!(data.aggregate(&cb, 2, "q1", None).is_err());
        assert!(data.aggregate(&cb, 1, "q1", Some("C")).is_err());
    }

    #[test]
    fn test_last_match_wins() {
        let mut data = Data::new("w", table(&[["1", "20", "A"], ["2", "70", "B"]]));
        data.bind(
            &codebook(),
            &groups(&[("all", GroupFilter::Constant(true)), ("old", expr("age > 60"))]),
        )
        .unwrap();
        assert_eq!(row_group(&data, 0), Some("all"));
        assert_eq!(row_group(&data, 1), Some("old"));
    }

    #[test]
    fn test_unmatched_rows_have_no_group() {
        let mut data = Data::new("w", table(&[["1", "20", "A"], ["2", "70", "B"]]));
        data.bind(&codebook(), &groups(&[("old", expr("age > 60"))]))
            .unwrap();
        assert_eq!(row_group(&data, 0), None);
        let old = data.aggregate(&codebook(), 1, "q1", Some("old")).unwrap();
        assert_eq!(old.values, vec![2.0]);
    }

    #[test]
    fn test_bind_lists_every_missing_variable() {
        let mut data = Data::new(
            "wave2",
            CsvData::new(vec!["cohort".to_string()], vec![vec!["A".to_string()]]),
        );
        let err = data
            .bind(&codebook(), &groups(&[("all", GroupFilter::Constant(true))]))
            .unwrap_err();
        match err {
            PlotError::MissingVariable { dataset, variables } => {
                assert_eq!(dataset, "wave2");
                assert_eq!(variables, vec!["q1", "age"]);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_bind_filter_on_missing_column() {
        let mut data = Data::new("w", table(&[["1", "20", "A"]]));
        let err = data
            .bind(&codebook(), &groups(&[("x", expr("region == 3"))]))
            .unwrap_err();
        assert!(matches!(err, PlotError::Filter { .. }));
    }

    #[test]
    fn test_validate_accepts_excluded_codes() {
        let data = scenario();
        assert!(data.validate(&codebook()).is_ok());
    }

    #[test]
    fn test_validate_unmapped_code() {
        let data = Data::new("w", table(&[["1", "20", "A"], ["3", "20", "A"]]));
        let err = data.validate(&codebook()).unwrap_err();
        match err {
            PlotError::OutOfRange { values } => {
                assert_eq!(values.len(), 1);
                assert_eq!(values[0].dataset, "w");
                assert_eq!(values[0].variable, "q1");
                assert_eq!(values[0].row, 2);
                assert_eq!(values[0].value, "3");
                assert_eq!(values[0].domain, "value map {1, 2}");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_validate_reports_every_bad_value() {
        let data = Data::new(
            "w",
            table(&[["3", "20", "A"], ["1", "old", "A"], ["7", "-9", "B"]]),
        );
        let values = data.invalid_values(&codebook()).unwrap();
        let found: Vec<(&str, usize, &str)> = values
            .iter()
            .map(|v| (v.variable.as_str(), v.row, v.value.as_str()))
            .collect();
        assert_eq!(found, vec![("q1", 1, "3"), ("q1", 3, "7"), ("age", 2, "old")]);

        let msg = data.validate(&codebook()).unwrap_err().to_string();
        assert!(msg.contains("(3 found)"), "{}", msg);
        assert!(msg.contains("value 'old' of variable 'age' (row 2)"), "{}", msg);
    }

    #[test]
    fn test_collection_validate_spans_datasets() {
        let first = Data::new("w1", table(&[["3", "20", "A"]]));
        let second = Data::new("w2", table(&[["1", "x", "A"]]));
        let collection = DataCollection::new(vec![first, second]).unwrap();
        match collection.validate(&codebook()).unwrap_err() {
            PlotError::OutOfRange { values } => {
                let datasets: Vec<&str> = values.iter().map(|v| v.dataset.as_str()).collect();
                assert_eq!(datasets, vec!["w1", "w2"]);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_validate_lists_every_missing_column() {
        let data = Data::new(
            "w",
            CsvData::new(vec!["cohort".to_string()], vec![vec!["A".to_string()]]),
        );
        match data.validate(&codebook()).unwrap_err() {
            PlotError::MissingVariable { variables, .. } => {
                assert_eq!(variables, vec!["q1".to_string(), "age".to_string()]);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_validate_fractional_code() {
        let data = Data::new("w", table(&[["1.5", "20", "A"]]));
        assert!(data.validate(&codebook()).is_err());
    }

    #[test]
    fn test_validate_text_in_numeric_column() {
        let data = Data::new("w", table(&[["1", "twenty", "A"]]));
        let err = data.validate(&codebook()).unwrap_err();
        assert!(err.to_string().contains("numeric domain"));
    }

    #[test]
    fn test_collection_rejects_duplicate_labels() {
        let a = Data::new("w", table(&[]));
        let b = Data::new("w", table(&[]));
        assert!(DataCollection::new(vec![a, b]).is_err());
    }

    #[test]
    fn test_read_csv_files_default_labels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wave_2021.csv");
        std::fs::write(&path, "q1;age;cohort\n1;20;A\n").unwrap();
        let collection = DataCollection::read_csv_files(&[path], &[], b';').unwrap();
        assert_eq!(collection.names().collect::<Vec<_>>(), vec!["wave_2021"]);
    }

    #[test]
    fn test_read_csv_files_label_count_mismatch() {
        let err = DataCollection::read_csv_files(
            &[PathBuf::from("a.csv")],
            &["x".to_string(), "y".to_string()],
            b',',
        )
        .unwrap_err();
        assert!(matches!(err, PlotError::Config(_)));
    }

    #[test]
    fn test_cache_round_trip_keeps_order() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("data_run");
        let collection = DataCollection::new(vec![
            Data::new("later", table(&[["1", "20", "A"]])),
            Data::new("earlier", table(&[["2", "30", "B"]])),
        ])
        .unwrap();
        collection.write_cache(&cache).unwrap();

        let reread = DataCollection::read_cache(&cache).unwrap();
        assert_eq!(reread.names().collect::<Vec<_>>(), vec!["later", "earlier"]);
        assert_eq!(reread.datasets[1].table, collection.datasets[1].table);
    }

    #[test]
    fn test_write_cache_removes_stale_sheets() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("data_run");
        std::fs::create_dir_all(&cache).unwrap();
        std::fs::write(cache.join("7_old.csv"), "q1\n1\n").unwrap();

        let collection =
            DataCollection::new(vec![Data::new("new", table(&[["1", "20", "A"]]))]).unwrap();
        collection.write_cache(&cache).unwrap();
        let reread = DataCollection::read_cache(&cache).unwrap();
        assert_eq!(reread.names().collect::<Vec<_>>(), vec!["new"]);
    }
}
