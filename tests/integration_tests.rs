use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use surveygraph::config::OutputFormat;
use surveygraph::histogram::{aggregate_histogram_block, HistogramType};
use surveygraph::runtime::{self, OutputLayout, PlotType, RunOptions};
use surveygraph::transform::{aggregate_bar_block, aggregate_line_block};
use tempfile::TempDir;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

fn options(output_dir: &Path) -> RunOptions {
    RunOptions {
        data: vec![fixture("wave1.csv"), fixture("wave2.csv")],
        labels: Vec::new(),
        codebook: fixture("codebook.csv"),
        config: fixture("config.toml"),
        plot_types: vec![PlotType::Bar],
        format: None,
        output_name: "survey".to_string(),
        output_dir: output_dir.to_path_buf(),
        full_rerun: false,
        no_cache: false,
    }
}

/// Helper function to run the surveygraph binary
fn run_surveygraph(args: &[&str]) -> Result<String, String> {
    let output = Command::new(env!("CARGO_BIN_EXE_surveygraph"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .map_err(|e| format!("Failed to spawn process: {}", e))?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    } else {
        Err(String::from_utf8_lossy(&output.stderr).to_string())
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

fn is_svg(path: &Path) -> bool {
    fs::read_to_string(path)
        .map(|s| s.starts_with("<svg"))
        .unwrap_or(false)
}

#[test]
fn test_end_to_end_all_plot_types() {
    let out = TempDir::new().unwrap();
    let (wave1, wave2) = (path_arg(&fixture("wave1.csv")), path_arg(&fixture("wave2.csv")));
    let (codebook, config) = (
        path_arg(&fixture("codebook.csv")),
        path_arg(&fixture("config.toml")),
    );
    let output_dir = path_arg(out.path());

    let result = run_surveygraph(&[
        &wave1,
        &wave2,
        "--codebook",
        &codebook,
        "--config",
        &config,
        "--plot-type",
        "bar",
        "line",
        "histogram",
        "timeline",
        "--output-name",
        "survey",
        "--output-dir",
        &output_dir,
        "-q",
    ]);
    assert!(result.is_ok(), "Failed: {:?}", result.err());
    let stdout = result.unwrap();
    let written: Vec<&str> = stdout.lines().collect();

    // bar and line: 2 datasets x 4 blocks; histogram: blocks 1 and 4 per dataset;
    // timeline: one per block
    assert_eq!(written.len(), 8 + 8 + 4 + 4);
    for path in &written {
        assert!(is_svg(Path::new(path)), "{} is not an SVG", path);
    }

    let layout = OutputLayout::new(out.path(), "survey");
    assert!(layout
        .plot("wave1", PlotType::Histogram, 1, OutputFormat::Svg)
        .is_file());
    assert!(!layout
        .plot("wave1", PlotType::Histogram, 2, OutputFormat::Svg)
        .exists());
    assert!(layout.timeline(3, OutputFormat::Svg).is_file());
    assert!(layout.config().is_file());
    assert!(layout.codebook().is_file());
    assert!(layout.data().join("1_wave2.csv").is_file());
}

#[test]
fn test_end_to_end_labels_name_the_files() {
    let out = TempDir::new().unwrap();
    let result = run_surveygraph(&[
        &path_arg(&fixture("wave1.csv")),
        &path_arg(&fixture("wave2.csv")),
        "--codebook",
        &path_arg(&fixture("codebook.csv")),
        "--config",
        &path_arg(&fixture("config.toml")),
        "--labels",
        "2023",
        "2024",
        "--output-dir",
        &path_arg(out.path()),
        "-q",
    ]);
    assert!(result.is_ok(), "Failed: {:?}", result.err());
    let layout = OutputLayout::new(out.path(), "surveygraph");
    assert!(layout
        .plot("2024", PlotType::Bar, 4, OutputFormat::Svg)
        .is_file());
}

#[test]
fn test_end_to_end_missing_variable() {
    let out = TempDir::new().unwrap();
    let data = out.path().join("partial.csv");
    fs::write(&data, "id,region,q1,q2\n1,north,1,2\n").unwrap();

    let result = run_surveygraph(&[
        &path_arg(&data),
        "--codebook",
        &path_arg(&fixture("codebook.csv")),
        "--config",
        &path_arg(&fixture("config.toml")),
        "--output-dir",
        &path_arg(out.path()),
    ]);
    assert!(result.is_err(), "Should have failed with missing variables");
    let stderr = result.unwrap_err();
    assert!(stderr.contains("missing codebook variables"), "{}", stderr);
    for variable in ["q3", "q4", "age", "commute"] {
        assert!(stderr.contains(variable), "{} not reported", variable);
    }
}

#[test]
fn test_end_to_end_bad_filter() {
    let out = TempDir::new().unwrap();
    let config = out.path().join("config.toml");
    fs::write(
        &config,
        "[data]\n[[data.groups]]\nname = \"x\"\nfilter = \"country == 'de'\"\n[plotting]\n",
    )
    .unwrap();

    let result = run_surveygraph(&[
        &path_arg(&fixture("wave1.csv")),
        "--codebook",
        &path_arg(&fixture("codebook.csv")),
        "--config",
        &path_arg(&config),
        "--output-dir",
        &path_arg(out.path()),
    ]);
    assert!(result.is_err());
    assert!(result.unwrap_err().contains("country"));
}

#[test]
fn test_end_to_end_invalid_config() {
    let out = TempDir::new().unwrap();
    let config = out.path().join("config.toml");
    fs::write(&config, "[data]\n[plotting]\nformat = \"pdf\"\n").unwrap();

    let result = run_surveygraph(&[
        &path_arg(&fixture("wave1.csv")),
        "--codebook",
        &path_arg(&fixture("codebook.csv")),
        "--config",
        &path_arg(&config),
        "--output-dir",
        &path_arg(out.path()),
    ]);
    assert!(result.is_err(), "Should have rejected the pdf format");
    assert!(result.unwrap_err().contains("configuration error"));
}

#[test]
fn test_library_aggregates_per_group() {
    let out = TempDir::new().unwrap();
    let opts = options(out.path());
    let layout = OutputLayout::new(out.path(), "survey");
    let setup = runtime::setup(&opts, &layout).unwrap();
    let groups: Vec<String> = setup
        .config
        .group_names()
        .into_iter()
        .map(String::from)
        .collect();
    let wave1 = &setup.data.datasets[0];

    let bar = aggregate_bar_block(wave1, &setup.codebook, 1, &groups).unwrap();
    let q1 = &bar.questions[0];
    assert_eq!(q1.groups[0].counts, vec![3, 0]);
    assert_eq!(q1.groups[1].counts, vec![0, 2]);
    assert_eq!(q1.groups[1].summary.n_no_answer, 1);

    // the 999 code is dropped from the value map, 0 is the missing code
    let line = aggregate_line_block(wave1, &setup.codebook, 2, &groups).unwrap();
    assert_eq!(line.left_label, "Very unhappy");
    assert_eq!(line.right_label, "Very happy");
    let north = &line.questions[0].points[0];
    assert_eq!(north.summary.n, 2);
    assert!((north.position.unwrap() - 0.625).abs() < 1e-9);

    let hist = aggregate_histogram_block(
        wave1,
        &setup.codebook,
        1,
        &groups,
        setup.config.histograms.affirmative,
        setup.config.histograms.margin_factor,
    )
    .unwrap()
    .unwrap();
    assert_eq!(hist.kind, HistogramType::Multi);
    assert_eq!(hist.groups[0].counts, vec![3, 1]);
    assert_eq!(hist.groups[1].counts, vec![0, 1]);
}

#[test]
fn test_library_reuses_cached_codebook() {
    let out = TempDir::new().unwrap();
    let source = out.path().join("codebook.csv");
    fs::copy(fixture("codebook.csv"), &source).unwrap();
    let mut opts = options(out.path());
    opts.codebook = source.clone();
    runtime::run(&opts).unwrap();

    let edited = fs::read_to_string(&source)
        .unwrap()
        .replace("How old are you?", "Age in years");
    fs::write(&source, edited).unwrap();

    let layout = OutputLayout::new(out.path(), "survey");
    let cached = runtime::setup(&opts, &layout).unwrap();
    assert_eq!(cached.codebook.entry("age").unwrap().label, "How old are you?");

    opts.full_rerun = true;
    let fresh = runtime::setup(&opts, &layout).unwrap();
    assert_eq!(fresh.codebook.entry("age").unwrap().label, "Age in years");
    // the rerun refreshed the cached copy
    let cached_file = fs::read_to_string(layout.codebook()).unwrap();
    assert!(cached_file.contains("Age in years"));
}

#[test]
fn test_library_no_cache_writes_only_plots() {
    let out = TempDir::new().unwrap();
    let mut opts = options(out.path());
    opts.no_cache = true;
    let written = runtime::run(&opts).unwrap();
    assert_eq!(written.len(), 8);

    let layout = OutputLayout::new(out.path(), "survey");
    assert!(!layout.config().exists());
    assert!(!layout.codebook().exists());
    assert!(!layout.data().exists());
}
