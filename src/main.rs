//! Chimera CLI - pybind11 and Boost.Python bindings from one C++ declaration set

use anyhow::{Context, bail};
use chimera::config::{self, Configuration};
use chimera::ui::{self, DecisionKind, Icons, ProgressManager, TableBuilder};
use chimera::{CancelFlag, DeclPath, Generator, TranslationUnitDecl};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "chimera")]
#[command(version = "0.1.0")]
#[command(about = "Dual-backend C++ binding generator (pybind11 + Boost.Python)")]
#[command(long_about = r#"
Chimera reads translation units extracted from C++ headers and generates,
for each unit:
  • <module>_pybind11.cpp
  • <module>_boost_python.cpp
  • <module>.manifest.json (what was emitted, suppressed and worked around)

Example usage:
  chimera init --module chimera_test --namespace chimera_test
  chimera generate class.json enum.json
  chimera plan class.json --details
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate bindings for one or more translation units
    Generate {
        /// Translation unit JSON files from the front-end
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output directory (defaults to the configured one)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show what each backend would emit, without writing anything
    Plan {
        /// Translation unit JSON file
        input: PathBuf,

        /// Configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// List every suppression and capability gap
        #[arg(short, long)]
        details: bool,
    },

    /// Write a default configuration file
    Init {
        /// Root host module name
        #[arg(short, long)]
        module: String,

        /// C++ namespaces bound into the root module
        #[arg(short, long, required = true)]
        namespace: Vec<String>,

        /// Where to write the configuration
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Overwrite an existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Generate {
            inputs,
            config,
            output,
        } => generate(&inputs, config.as_deref(), output),
        Commands::Plan {
            input,
            config,
            details,
        } => plan(&input, config.as_deref(), details),
        Commands::Init {
            module,
            namespace,
            path,
            force,
        } => init(module, &namespace, path, force),
    }
}

fn require_config(path: Option<&Path>) -> anyhow::Result<Configuration> {
    match config::load_config(path)? {
        Some(config) => Ok(config),
        None => bail!(
            "No configuration found at {} (run `chimera init` first)",
            path.map(Path::to_path_buf)
                .unwrap_or_else(config::default_config_path)
                .display()
        ),
    }
}

fn read_unit(path: &Path) -> anyhow::Result<TranslationUnitDecl> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    TranslationUnitDecl::from_json(&source)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

fn generate(inputs: &[PathBuf], config: Option<&Path>, output: Option<PathBuf>) -> anyhow::Result<()> {
    let started = Instant::now();
    let config = require_config(config)?;
    let out_dir = output.unwrap_or_else(|| config.module.output.clone());
    let units = inputs
        .iter()
        .map(|path| read_unit(path))
        .collect::<anyhow::Result<Vec<_>>>()?;

    ui::header(&format!("Generating module {}", config.module.name));
    ui::status(Icons::PACKAGE, "Units", &units.len().to_string());
    ui::status(Icons::FILE, "Output", &out_dir.display().to_string());

    let generator = Generator::new(config)?;
    let cancel = CancelFlag::new();
    let (mut progress, tx) = ProgressManager::new(units.len());
    let results = generator.generate_all(&units, &cancel, Some(&tx));
    drop(tx);

    // Several units share one module name, so each gets its own directory
    let per_unit_dirs = units.len() > 1;
    let mut files = 0;
    let mut failed = 0;
    for result in results {
        match result {
            Ok(unit) => {
                let dir = if per_unit_dirs {
                    out_dir.join(&unit.unit)
                } else {
                    out_dir.clone()
                };
                for path in unit.write(&dir)? {
                    ui::file_new(&path.display().to_string());
                    files += 1;
                }
            }
            Err(e) => {
                failed += 1;
                ui::error(&e.to_string());
            }
        }
    }

    progress.finish_with_summary(started.elapsed(), units.len(), files);
    if failed > 0 {
        bail!("{} of {} units failed", failed, units.len());
    }
    Ok(())
}

fn plan(input: &Path, config: Option<&Path>, details: bool) -> anyhow::Result<()> {
    let config = require_config(config)?;
    let unit = read_unit(input)?;
    let output = Generator::new(config)?.generate(&unit, &CancelFlag::new())?;

    ui::header(&format!("Plan for {} → module {}", output.unit, output.module));
    println!("{}", ui::backend_table(&output.manifest));

    let mut totals = TableBuilder::new();
    for (backend, section) in &output.manifest.backends {
        totals.add_row(
            &format!("{} enum values exported", backend.display_name()),
            &section
                .enum_exports
                .iter()
                .filter(|e| e.hoisted)
                .count()
                .to_string(),
        );
        totals.add_row(
            &format!("{} exception translators", backend.display_name()),
            &section.exceptions.len().to_string(),
        );
    }
    println!("{}", totals.build());

    if details {
        for (backend, section) in &output.manifest.backends {
            ui::backend_section(backend.display_name());
            for suppressed in &section.suppressed {
                ui::decision(
                    DecisionKind::Suppressed,
                    "suppressed",
                    &suppressed.path,
                    &suppressed.reason,
                );
            }
            for gap in &section.gaps {
                ui::decision(DecisionKind::Gap, gap.feature.as_str(), &gap.path, &gap.detail);
            }
            for record in &section.ambiguities {
                ui::decision(
                    DecisionKind::Ambiguity,
                    "ambiguity",
                    &format!("{}.{}", record.class, record.ambiguity.name),
                    &format!("{:?}", record.ambiguity.resolution),
                );
            }
        }
    }
    ui::info("Input hash", &output.manifest.input_hash);
    Ok(())
}

fn init(module: String, namespaces: &[String], path: Option<PathBuf>, force: bool) -> anyhow::Result<()> {
    let path = path.unwrap_or_else(config::default_config_path);
    let namespaces = namespaces
        .iter()
        .map(|ns| DeclPath::parse(ns))
        .collect::<chimera::Result<Vec<_>>>()?;
    let config = Configuration::new(module, namespaces);
    config.validate()?;
    config::write_config(&path, &config, force)?;
    ui::success(&format!("Wrote {}", path.display()));
    Ok(())
}
