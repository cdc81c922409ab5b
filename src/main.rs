use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use fov_align::config::{load_config_or_default, ConfigFormat};
use fov_align::driver::{align_field, FieldOfView, FieldOutcome};
use fov_align::logging::{self, LoggingConfig};
use fov_align::utils::load_image;
use fov_align::*;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "fov-align")]
#[command(about = "Align microscope fields of view to sequencing read coordinates")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML or JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Replace the configured logging with a preset
    #[arg(long, value_enum, global = true)]
    log_preset: Option<LogPreset>,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Rough and precision align one image against alignment reads
    Align {
        /// Grayscale microscope image
        #[arg(short, long)]
        image: PathBuf,

        /// Cluster detection catalog for the image
        #[arg(short = 'C', long)]
        clusters: PathBuf,

        /// Read names of the alignment reads, one per line
        #[arg(short, long)]
        reads: PathBuf,

        /// Read names of every read to project once aligned
        #[arg(short, long)]
        all_reads: Option<PathBuf>,

        /// Candidate tile keys (comma-separated). Loaded tiles left out of
        /// this list serve as noise-floor controls.
        #[arg(short, long, value_delimiter = ',', required = true)]
        tiles: Vec<String>,

        /// Directory for the stats and read position files
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Output file prefix; defaults to the image file stem
        #[arg(long)]
        id: Option<String>,
    },

    /// Refine a stored alignment against another image of the same field
    Refine {
        /// Stats file written by a previous `align`
        #[arg(short, long)]
        stats: PathBuf,

        #[arg(short, long)]
        image: PathBuf,

        #[arg(short = 'C', long)]
        clusters: PathBuf,

        #[arg(short, long)]
        reads: PathBuf,

        #[arg(short, long)]
        all_reads: Option<PathBuf>,

        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        #[arg(long)]
        id: Option<String>,
    },

    /// Write the default configuration
    InitConfig {
        #[arg(short, long, default_value = "fov-align.toml")]
        output: PathBuf,

        #[arg(short, long, value_enum, default_value_t = Format::Toml)]
        format: Format,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum LogPreset {
    /// Debug console output plus files, with source locations
    Development,
    /// Warnings and above, written to files only
    Production,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Toml,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config_or_default(cli.config.as_deref());
    let logging_config = match cli.log_preset {
        Some(LogPreset::Development) => LoggingConfig::development(),
        Some(LogPreset::Production) => LoggingConfig::production(),
        None => config.logging.clone(),
    }
    .with_verbosity(cli.verbose);
    let _guard = logging::init_logging(&logging_config)?;

    match cli.command {
        Commands::Align {
            image,
            clusters,
            reads,
            all_reads,
            tiles,
            output,
            id,
        } => handle_align(config, &image, &clusters, &reads, all_reads.as_deref(), tiles, &output, id),
        Commands::Refine {
            stats,
            image,
            clusters,
            reads,
            all_reads,
            output,
            id,
        } => handle_refine(config, &stats, &image, &clusters, &reads, all_reads.as_deref(), &output, id),
        Commands::InitConfig { output, format } => handle_init_config(&output, format),
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_align(
    config: AlignConfig,
    image_path: &Path,
    clusters_path: &Path,
    reads_path: &Path,
    all_reads_path: Option<&Path>,
    tiles: Vec<String>,
    output: &Path,
    id: Option<String>,
) -> Result<()> {
    let id = field_id(image_path, id)?;
    let template: AlignmentEngine = AlignmentEngine::new(Arc::new(load_catalog(reads_path)?), config)?;
    let all_reads = all_reads_path.map(load_catalog).transpose()?;

    let candidates: Vec<TileKey> = tiles.iter().map(|t| TileKey::new(t.trim())).collect();

    let field = FieldOfView {
        id: id.clone(),
        column: 0,
        pixels: Arc::new(load_image(image_path)?),
        clusters: Arc::new(load_clusters(clusters_path)?),
        candidates,
    };

    let report = align_field(&template, &field, all_reads.as_ref());
    match report.outcome {
        FieldOutcome::Aligned { record, positions } => {
            write_output(output, &id, &record, &positions)?;
        }
        FieldOutcome::Skipped { reason } => {
            tracing::info!(field = %id, %reason, "Field skipped");
        }
        FieldOutcome::Failed(e) => {
            return Err(e).with_context(|| format!("aligning {}", image_path.display()));
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn handle_refine(
    config: AlignConfig,
    stats_path: &Path,
    image_path: &Path,
    clusters_path: &Path,
    reads_path: &Path,
    all_reads_path: Option<&Path>,
    output: &Path,
    id: Option<String>,
) -> Result<()> {
    let id = field_id(image_path, id)?;
    let stored: AlignmentRecord = fs::read_to_string(stats_path)
        .with_context(|| format!("reading {}", stats_path.display()))?
        .parse()?;

    let mut engine: AlignmentEngine = AlignmentEngine::new(Arc::new(load_catalog(reads_path)?), config)?;
    engine.set_image(load_image(image_path)?)?;
    engine.set_clusters(load_clusters(clusters_path)?);
    engine.apply_record(&stored)?;

    match engine.precision_align() {
        Ok(_) => {}
        Err(e) if e.is_recoverable() => {
            tracing::info!(field = %id, error = %e, "Could not precision align");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    }

    let record = engine.alignment_record();
    let positions: Vec<ReadPosition> = match all_reads_path {
        Some(path) => AlignmentEngine::from_aligned(&engine, &load_catalog(path)?)?
            .read_positions()
            .collect(),
        None => engine.read_positions().collect(),
    };
    write_output(output, &id, &record, &positions)
}

fn handle_init_config(output: &Path, format: Format) -> Result<()> {
    let format = match format {
        Format::Toml => ConfigFormat::Toml,
        Format::Json => ConfigFormat::Json,
    };
    AlignConfig::default().save_to_file(output, format)?;
    println!("Default configuration written to {}", output.display());
    Ok(())
}

fn field_id(image_path: &Path, id: Option<String>) -> Result<String> {
    match id {
        Some(id) => Ok(id),
        None => image_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .with_context(|| format!("no file stem in {}", image_path.display())),
    }
}

fn load_catalog(path: &Path) -> Result<ReadCatalog> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let catalog = ReadCatalog::from_read_names(BufReader::new(file))?;
    tracing::info!(
        path = %path.display(),
        tiles = catalog.len(),
        reads = catalog.read_count(),
        "Reads loaded"
    );
    Ok(catalog)
}

fn load_clusters(path: &Path) -> Result<ClusterSet> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    Ok(ClusterSet::from_reader(BufReader::new(file))?)
}

/// Score of a previously written stats file; unreadable files count as zero.
fn existing_record(stats_path: &Path) -> Option<AlignmentRecord> {
    let text = fs::read_to_string(stats_path).ok()?;
    match text.parse::<AlignmentRecord>() {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::warn!(path = %stats_path.display(), error = %e, "Ignoring unreadable stats file");
            None
        }
    }
}

fn write_output(
    output: &Path,
    id: &str,
    record: &AlignmentRecord,
    positions: &[ReadPosition],
) -> Result<()> {
    fs::create_dir_all(output)?;
    let stats_path = output.join(format!("{id}_stats.txt"));
    let rcs_path = output.join(format!("{id}_all_read_rcs.txt"));

    if let Some(existing) = existing_record(&stats_path) {
        if !record.is_better_than(&existing) {
            tracing::info!(
                field = %id,
                existing = existing.score(),
                new = record.score(),
                "Alignment already exists, skipping"
            );
            return Ok(());
        }
    }

    tracing::info!(field = %id, score = record.score(), "Saving alignment");
    fs::write(&stats_path, record.to_string())
        .with_context(|| format!("writing {}", stats_path.display()))?;

    let mut writer = BufWriter::new(File::create(&rcs_path)?);
    for position in positions {
        writeln!(writer, "{}", position)?;
    }
    writer.flush()?;
    Ok(())
}
