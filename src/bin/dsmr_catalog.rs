use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dsmr::backend::AsciiBackend;
use dsmr::{DsmrConfig, NameGen, ResArchive, TimeRange};

#[derive(Parser)]
#[command(name = "dsmr-catalog")]
#[command(about = "Inspect and maintain multi-resolution archive catalogs")]
struct Cli {
    /// JSON configuration file (defaults apply when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List resolutions and chunk records
    Show {
        /// Catalog file
        catalog: PathBuf,
    },
    /// Rewrite chunk locator prefixes
    Relocate {
        /// Catalog file
        catalog: PathBuf,

        /// New locator prefix
        #[arg(long)]
        new_prefix: String,

        /// Prefix every current locator must start with
        #[arg(long, default_value = "")]
        old_prefix: String,

        /// Write the result here instead of in place
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Chunks covering [start, end) at the resolution nearest RES
    Cover {
        catalog: PathBuf,
        res: f64,
        start: f64,
        end: f64,
    },
    /// Chunk boundaries a writer would use for these sample times
    Chunks {
        res: f64,
        #[arg(required = true)]
        times: Vec<f64>,
    },
    /// Read flat-text chunks through the catalog and print merged rows
    Read {
        catalog: PathBuf,
        res: f64,
        start: f64,
        end: f64,

        /// Fields to read (all configured fields when omitted)
        #[arg(long = "field")]
        fields: Vec<String>,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => DsmrConfig::load(path)
            .with_context(|| format!("load config {}", path.display()))?,
        None => DsmrConfig::default(),
    };

    match cli.command {
        Commands::Show { catalog } => {
            let archive = load(&catalog)?;
            for fileset in archive.filesets() {
                println!("res={} chunks={}", fileset.resolution(), fileset.len());
                for record in fileset.records() {
                    println!(
                        "  {} fields={} {}",
                        record.time_range,
                        record.fields.join(","),
                        record.locator
                    );
                }
            }
        }
        Commands::Relocate {
            catalog,
            new_prefix,
            old_prefix,
            output,
        } => {
            let mut archive = load(&catalog)?;
            archive.relocate(&new_prefix, &old_prefix)?;
            let target = output.unwrap_or(catalog);
            archive
                .save(&target)
                .with_context(|| format!("save catalog {}", target.display()))?;
            println!("relocated {} chunk(s)", archive.chunk_count());
        }
        Commands::Cover {
            catalog,
            res,
            start,
            end,
        } => {
            let archive = load(&catalog)?;
            let nearest = archive.nearest_resolution(res)?;
            println!("res={}", nearest);
            for record in archive.cover_for_intervals(res, &[TimeRange::new(start, end)])? {
                println!("  {} {}", record.time_range, record.locator);
            }
        }
        Commands::Chunks { res, times } => {
            let namegen = NameGen::new(config.namegen);
            let step = namegen.effective_resolution(res)?;
            for cell in namegen.cover_for_times(res, &times)? {
                println!("{} {}", cell, NameGen::chunk_name(step, &cell));
            }
        }
        Commands::Read {
            catalog,
            res,
            start,
            end,
            fields,
        } => {
            let mut archive = load(&catalog)?;
            archive.set_backend(AsciiBackend::new(config.ascii));
            let fields = (!fields.is_empty()).then_some(fields);
            let data = archive.get_data(res, &[TimeRange::new(start, end)], fields.as_deref(), None)?;
            for (field, series) in &data {
                println!("# {} ({} samples)", field, series.len());
                for (t, value) in series.t().iter().zip(series.data()) {
                    println!("{} {}", t, value);
                }
            }
        }
    }

    Ok(())
}

fn load(path: &Path) -> Result<ResArchive> {
    ResArchive::load(path).with_context(|| format!("load catalog {}", path.display()))
}
