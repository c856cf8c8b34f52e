//! `hearth` - inspect FHIR definition sources from the command line

mod config;
mod logging;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use hearth_context::{ResourceKind, WorkerContext};
use hearth_format::ResourceFormat;
use hearth_package::FhirPackage;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::config::Settings;

#[derive(Debug, Parser)]
#[command(name = "hearth", version, about = "FHIR definition tooling")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load a source and print what it contains
    Load {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Print the StructureDefinition `url` with its snapshot generated
    Snapshot {
        #[command(flatten)]
        source: SourceArgs,
        url: String,
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },
    /// List StructureMaps whose sources are all `url`
    Transforms {
        #[command(flatten)]
        source: SourceArgs,
        url: String,
    },
}

#[derive(Debug, Args)]
struct SourceArgs {
    /// Zip pack, NPM package (.tgz or unpacked directory) or folder of resources
    source: PathBuf,
    #[arg(long)]
    ignore_profile_errors: bool,
    #[arg(long = "allow-duplicates")]
    allow_duplicates: bool,
    /// TOML settings file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Xml,
}

/// Shapes of definition source the CLI can open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceKind {
    Pack,
    PackageArchive,
    PackageDirectory,
    Folder,
}

impl SourceKind {
    fn detect(path: &Path) -> Self {
        if path.is_dir() {
            if path.join("package.json").is_file() {
                SourceKind::PackageDirectory
            } else {
                SourceKind::Folder
            }
        } else {
            let name = path.to_string_lossy();
            if name.ends_with(".tgz") || name.ends_with(".tar.gz") {
                SourceKind::PackageArchive
            } else {
                SourceKind::Pack
            }
        }
    }
}

fn open_context(args: &SourceArgs, settings: &Settings) -> anyhow::Result<WorkerContext> {
    let mut context = WorkerContext::new(settings.context_config());
    let path = &args.source;

    match SourceKind::detect(path) {
        SourceKind::Pack => {
            context
                .load_pack(path)
                .with_context(|| format!("Failed to load pack {}", path.display()))?;
        }
        SourceKind::PackageArchive => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            let package = FhirPackage::from_tar_gz(BufReader::new(file))
                .with_context(|| format!("Failed to read package {}", path.display()))?;
            context.load_package(&package)?;
            context.load_binaries_from_package(&package)?;
        }
        SourceKind::PackageDirectory => {
            let package = FhirPackage::from_directory(path)
                .with_context(|| format!("Failed to read package {}", path.display()))?;
            context.load_package(&package)?;
            context.load_binaries_from_package(&package)?;
        }
        SourceKind::Folder => {
            context
                .load_from_folder(path)
                .with_context(|| format!("Failed to load folder {}", path.display()))?;
        }
    }

    Ok(context)
}

fn settings_for(args: &SourceArgs) -> anyhow::Result<Settings> {
    let mut settings = Settings::load(args.config.as_deref())?;
    settings.ignore_profile_errors |= args.ignore_profile_errors;
    settings.allow_loading_duplicates |= args.allow_duplicates;
    Ok(settings)
}

fn print_summary(context: &WorkerContext) {
    println!("FHIR version: {}", context.version().unwrap_or("unknown"));
    for kind in ResourceKind::DEFINITIONAL
        .into_iter()
        .chain([ResourceKind::Binary])
    {
        let count = context.count(kind);
        if count > 0 {
            println!("{:<20} {}", kind, count);
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let source = match &cli.command {
        Command::Load { source }
        | Command::Snapshot { source, .. }
        | Command::Transforms { source, .. } => source,
    };

    let settings = settings_for(source)?;
    logging::init_logging(&settings.log_level)?;

    let context = open_context(source, &settings)?;
    tracing::debug!(entries = context.len(), "Context ready");

    match &cli.command {
        Command::Load { .. } => print_summary(&context),
        Command::Snapshot { url, format, .. } => {
            let Some(sd) = context.generate_snapshot(url)? else {
                bail!("No StructureDefinition with url {}", url);
            };
            let value = serde_json::to_value(&*sd)?;
            let text = match format {
                OutputFormat::Json => hearth_format::encode(&value, ResourceFormat::Json)?,
                OutputFormat::Xml => hearth_format::encode(&value, ResourceFormat::Xml)?,
            };
            println!("{}", text);
        }
        Command::Transforms { url, .. } => {
            for map in context.find_transforms_for_source(url) {
                println!("{}", map.url);
            }
        }
    }

    Ok(())
}
