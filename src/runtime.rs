// Run orchestration: configuration, codebook and data setup, then one plot per block

use crate::codebook::CodeBook;
use crate::compiler;
use crate::config::{Configuration, OutputFormat};
use crate::data::DataCollection;
use crate::graph;
use crate::histogram::aggregate_histogram_block;
use crate::ir::SceneGraph;
use crate::timeline::aggregate_timeline_block;
use crate::transform::{aggregate_bar_block, aggregate_line_block};
use crate::wrap::WrapCache;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PlotType {
    Bar,
    Line,
    Histogram,
    Timeline,
}

impl PlotType {
    pub fn name(&self) -> &'static str {
        match self {
            PlotType::Bar => "bar",
            PlotType::Line => "line",
            PlotType::Histogram => "histogram",
            PlotType::Timeline => "timeline",
        }
    }
}

/// File locations of one named run.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputLayout {
    root: PathBuf,
    name: String,
}

impl OutputLayout {
    pub fn new(dir: &Path, name: &str) -> Self {
        Self {
            root: dir.join(name),
            name: name.to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> PathBuf {
        self.root.join(format!("config_{}.toml", self.name))
    }

    pub fn codebook(&self) -> PathBuf {
        self.root.join(format!("codebook_{}.csv", self.name))
    }

    pub fn data(&self) -> PathBuf {
        self.root.join(format!("data_{}", self.name))
    }

    pub fn plot(
        &self,
        dataset: &str,
        plot_type: PlotType,
        block: i64,
        format: OutputFormat,
    ) -> PathBuf {
        self.root.join(format!(
            "{}_{}_{}_{}.{}",
            self.name,
            dataset,
            plot_type.name(),
            block,
            format.extension()
        ))
    }

    pub fn timeline(&self, block: i64, format: OutputFormat) -> PathBuf {
        self.root.join(format!(
            "{}_timeline_{}.{}",
            self.name,
            block,
            format.extension()
        ))
    }
}

/// Everything a run needs, usually filled from the command line.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub data: Vec<PathBuf>,
    pub labels: Vec<String>,
    pub codebook: PathBuf,
    pub config: PathBuf,
    pub plot_types: Vec<PlotType>,
    /// Overrides `plotting.format`
    pub format: Option<OutputFormat>,
    pub output_name: String,
    pub output_dir: PathBuf,
    /// Ignore cached copies in the output directory
    pub full_rerun: bool,
    /// Neither read nor write cached copies
    pub no_cache: bool,
}

impl RunOptions {
    fn reuse_cache(&self) -> bool {
        !self.no_cache && !self.full_rerun
    }
}

/// Validated inputs of a run.
#[derive(Debug)]
pub struct Setup {
    pub config: Configuration,
    pub codebook: CodeBook,
    pub data: DataCollection,
}

/// Load and validate configuration, codebook and data; write the cached copies.
pub fn setup(options: &RunOptions, layout: &OutputLayout) -> Result<Setup> {
    let reuse = options.reuse_cache();

    // 1. Configuration, with the copy of an earlier run as override
    let cached_config = layout.config();
    let override_path = (reuse && cached_config.exists()).then_some(cached_config.as_path());
    let mut config = Configuration::load(&options.config, override_path)
        .with_context(|| format!("Failed to load configuration {}", options.config.display()))?;
    if let Some(format) = options.format {
        config.plotting.format = format;
    }

    // 2. Codebook
    let codebook = CodeBook::setup(&config, &options.codebook, &layout.codebook(), !reuse)
        .with_context(|| format!("Failed to set up codebook {}", options.codebook.display()))?;

    // 3. Data
    let data_cache = layout.data();
    if options.data.is_empty() && !(reuse && data_cache.is_dir()) {
        anyhow::bail!("No data files given and no cached data in {}", data_cache.display());
    }
    let data = DataCollection::setup(
        &config,
        &codebook,
        &options.data,
        &options.labels,
        &data_cache,
        !reuse,
    )
    .context("Failed to set up data")?;

    if !options.no_cache {
        config.write(&layout.config())?;
        codebook.write(&layout.codebook())?;
        data.write_cache(&data_cache)?;
    }

    Ok(Setup {
        config,
        codebook,
        data,
    })
}

/// Run the whole pipeline and return the plot files written, in order.
pub fn run(options: &RunOptions) -> Result<Vec<PathBuf>> {
    let layout = OutputLayout::new(&options.output_dir, &options.output_name);
    std::fs::create_dir_all(layout.root())
        .with_context(|| format!("Failed to create {}", layout.root().display()))?;

    let setup = setup(options, &layout)?;
    let plot_types = if options.plot_types.is_empty() {
        vec![PlotType::Bar]
    } else {
        options.plot_types.clone()
    };

    let mut cache = WrapCache::new();
    let mut written = Vec::new();
    for plot_type in plot_types {
        info!("Creating {} plots", plot_type.name());
        written.extend(plot(&setup, &layout, plot_type, &mut cache)?);
    }
    debug!("Wrap cache holds {} entries", cache.len());
    info!("Wrote {} plots to {}", written.len(), layout.root().display());
    Ok(written)
}

/// Compile, render and write every block of one plot type.
pub fn plot(
    setup: &Setup,
    layout: &OutputLayout,
    plot_type: PlotType,
    cache: &mut WrapCache,
) -> Result<Vec<PathBuf>> {
    let Setup {
        config,
        codebook,
        data,
    } = setup;
    let groups: Vec<String> = config.group_names().into_iter().map(String::from).collect();
    let format = config.plotting.format;
    let mut written = Vec::new();

    if plot_type == PlotType::Timeline {
        for block in codebook.blocks() {
            let timeline = aggregate_timeline_block(data, codebook, block, &groups)?;
            let scene = compiler::compile_timeline(&timeline, &config.timelines, cache)?;
            let path = layout.timeline(block, format);
            write_plot(&scene, config, &path)?;
            written.push(path);
        }
        return Ok(written);
    }

    for dataset in &data.datasets {
        for block in codebook.blocks() {
            let scene = match plot_type {
                PlotType::Bar => {
                    let bar = aggregate_bar_block(dataset, codebook, block, &groups)?;
                    Some(compiler::compile_bar(&bar, &config.barplots, cache)?)
                }
                PlotType::Line => {
                    let line = aggregate_line_block(dataset, codebook, block, &groups)?;
                    Some(compiler::compile_line(&line, &config.lineplots, cache)?)
                }
                PlotType::Histogram => aggregate_histogram_block(
                    dataset,
                    codebook,
                    block,
                    &groups,
                    config.histograms.affirmative,
                    config.histograms.margin_factor,
                )?
                .map(|h| compiler::compile_histogram(&h, &config.histograms, cache))
                .transpose()?,
                PlotType::Timeline => None,
            };
            let Some(scene) = scene else {
                continue;
            };
            let path = layout.plot(&dataset.name, plot_type, block, format);
            write_plot(&scene, config, &path)?;
            written.push(path);
        }
    }
    Ok(written)
}

fn write_plot(scene: &SceneGraph, config: &Configuration, path: &Path) -> Result<()> {
    let bytes = graph::render_scene(scene, config.plotting.format, config.plotting.dpi)
        .with_context(|| format!("Failed to render {}", path.display()))?;
    std::fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const CONFIG: &str = "[data]\nno_answer_code = 999\n\n\
                          [[data.groups]]\nname = \"A\"\nfilter = \"g == 'A'\"\n\n\
                          [[data.groups]]\nname = \"B\"\nfilter = \"g == 'B'\"\n\n\
                          [plotting]\nformat = \"svg\"\n";

    const CODEBOOK: &str = "Variable,Label,Value Codes,Group,Missing Code\n\
                            q1,Do you like apples?,\"1=Yes\n2=No\",1,\n\
                            q2,Do you like pears?,\"1=Yes\n2=No\",1,\n\
                            age,Age,,2,\n";

    const DATA: &str = "q1,q2,age,g\n1,2,34,A\n1,1,51,A\n2,,27,A\n999,1,60,B\n,2,45,B\n";

    fn fixture() -> (TempDir, RunOptions) {
        let dir = tempfile::tempdir().unwrap();
        let write = |name: &str, content: &str| {
            let path = dir.path().join(name);
            fs::write(&path, content).unwrap();
            path
        };
        let options = RunOptions {
            data: vec![write("wave1.csv", DATA)],
            labels: Vec::new(),
            codebook: write("codebook.csv", CODEBOOK),
            config: write("config.toml", CONFIG),
            plot_types: vec![PlotType::Bar],
            format: None,
            output_name: "report".to_string(),
            output_dir: dir.path().join("out"),
            full_rerun: false,
            no_cache: false,
        };
        (dir, options)
    }

    #[test]
    fn test_output_layout_paths() {
        let layout = OutputLayout::new(Path::new("out"), "report");
        assert_eq!(layout.config(), Path::new("out/report/config_report.toml"));
        assert_eq!(layout.codebook(), Path::new("out/report/codebook_report.csv"));
        assert_eq!(layout.data(), Path::new("out/report/data_report"));
        assert_eq!(
            layout.plot("wave1", PlotType::Histogram, 3, OutputFormat::Png),
            Path::new("out/report/report_wave1_histogram_3.png")
        );
        assert_eq!(
            layout.timeline(2, OutputFormat::Svg),
            Path::new("out/report/report_timeline_2.svg")
        );
    }

    #[test]
    fn test_run_writes_plots_and_caches() {
        let (_dir, options) = fixture();
        let written = run(&options).unwrap();
        let layout = OutputLayout::new(&options.output_dir, "report");

        assert_eq!(
            written,
            vec![
                layout.plot("wave1", PlotType::Bar, 1, OutputFormat::Svg),
                layout.plot("wave1", PlotType::Bar, 2, OutputFormat::Svg),
            ]
        );
        for path in &written {
            let svg = fs::read_to_string(path).unwrap();
            assert!(svg.starts_with("<svg"));
        }
        assert!(layout.config().is_file());
        assert!(layout.codebook().is_file());
        assert!(layout.data().join("0_wave1.csv").is_file());
    }

    #[test]
    fn test_histogram_skips_blocks_that_do_not_fit() {
        let (_dir, mut options) = fixture();
        options.plot_types = vec![PlotType::Histogram];
        let written = run(&options).unwrap();
        let layout = OutputLayout::new(&options.output_dir, "report");
        // block 1 is multi (two yes/no questions), block 2 is numeric
        assert_eq!(
            written,
            vec![layout.plot("wave1", PlotType::Histogram, 1, OutputFormat::Svg)]
        );
    }

    #[test]
    fn test_timeline_spans_datasets() {
        let (dir, mut options) = fixture();
        let second = dir.path().join("wave2.csv");
        fs::write(&second, DATA).unwrap();
        options.data.push(second);
        options.plot_types = vec![PlotType::Timeline, PlotType::Line];
        let written = run(&options).unwrap();
        let layout = OutputLayout::new(&options.output_dir, "report");
        assert_eq!(written.len(), 2 + 4);
        assert_eq!(written[0], layout.timeline(1, OutputFormat::Svg));
    }

    #[test]
    fn test_cached_config_overrides_base() {
        let (_dir, options) = fixture();
        run(&options).unwrap();
        let layout = OutputLayout::new(&options.output_dir, "report");
        let cached = fs::read_to_string(layout.config()).unwrap();
        fs::write(layout.config(), cached.replace("nbins = 5", "nbins = 3")).unwrap();

        let setup_again = setup(&options, &layout).unwrap();
        assert_eq!(setup_again.config.plotting.nbins, 3);

        let rerun = RunOptions {
            full_rerun: true,
            ..options.clone()
        };
        let fresh = setup(&rerun, &layout).unwrap();
        assert_eq!(fresh.config.plotting.nbins, 5);
    }

    #[test]
    fn test_format_flag_overrides_config() {
        let (_dir, mut options) = fixture();
        options.format = Some(OutputFormat::Png);
        options.no_cache = true;
        let layout = OutputLayout::new(&options.output_dir, "report");
        let setup = setup(&options, &layout).unwrap();
        assert_eq!(setup.config.plotting.format, OutputFormat::Png);
        assert!(!layout.config().exists());
    }

    #[test]
    fn test_validation_fails_before_any_plot() {
        let (dir, mut options) = fixture();
        let bad = dir.path().join("bad.csv");
        fs::write(&bad, "q1,q2,age,g\n7,1,30,A\n").unwrap();
        options.data = vec![bad];
        let err = run(&options).unwrap_err();
        assert!(format!("{:#}", err).contains("q1"));
        let layout = OutputLayout::new(&options.output_dir, "report");
        assert!(!layout.plot("bad", PlotType::Bar, 1, OutputFormat::Svg).exists());
    }

    #[test]
    fn test_crowded_bar_layout_fails_before_any_output() {
        let (dir, mut options) = fixture();
        let groups: String = (0..15)
            .map(|i| format!("[[data.groups]]\nname = \"g{}\"\nfilter = true\n", i))
            .collect();
        let config = dir.path().join("crowded.toml");
        fs::write(&config, format!("[data]\n{}[plotting]\n", groups)).unwrap();
        options.config = config;
        options.plot_types = vec![PlotType::Histogram, PlotType::Bar];

        let err = run(&options).unwrap_err();
        assert!(format!("{:#}", err).contains("15 groups"));
        let root = OutputLayout::new(&options.output_dir, "report").root().to_path_buf();
        let leftovers: Vec<_> = fs::read_dir(&root).unwrap().collect();
        assert!(leftovers.is_empty(), "unexpected output {:?}", leftovers);
    }

    #[test]
    fn test_no_data_is_an_error() {
        let (_dir, mut options) = fixture();
        options.data.clear();
        assert!(run(&options).is_err());
    }
}
