use anyhow::Result;
use clap::Parser;
use h5p_registry::commands;
use h5p_registry::config::RegistryConfig;
use h5p_registry::dependency::DependencyKind;
use std::path::PathBuf;

/// h5p-registry - private registry for H5P libraries
///
/// Import library archives, export a library with everything it depends on,
/// and inspect dependency problems.
///
/// Examples:
///   h5p-registry import upload.h5p
///   h5p-registry export "H5P.Column 1.13"
///   h5p-registry check "H5P.Column 1.13"
#[derive(Parser, Debug)]
#[command(author, version = env!("H5P_REGISTRY_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Installed libraries directory (also via H5P_LIBRARIES_DIR)
    #[arg(long, env = "H5P_LIBRARIES_DIR", value_name = "PATH", global = true)]
    libraries_dir: Option<PathBuf>,

    /// Scratch directory for imports and exports (also via H5P_TEMP_DIR)
    #[arg(long, env = "H5P_TEMP_DIR", value_name = "PATH", global = true)]
    temp_dir: Option<PathBuf>,

    /// Directory exported archives are written to (also via H5P_EXPORT_DIR)
    #[arg(long, env = "H5P_EXPORT_DIR", value_name = "PATH", global = true)]
    export_dir: Option<PathBuf>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Import every library in a .h5p archive
    Import(ImportArgs),

    /// Export a library and its installed dependencies as a .h5p archive
    Export(LibraryArgs),

    /// List the dependencies of a library
    Deps(DepsArgs),

    /// Report conflicting, missing and outdated dependencies
    Check(CheckArgs),

    /// Remove an installed library
    Remove(LibraryArgs),
}

#[derive(clap::Args, Debug)]
struct ImportArgs {
    /// Archive to import
    #[arg(value_name = "FILE")]
    file: PathBuf,
}

#[derive(clap::Args, Debug)]
struct LibraryArgs {
    /// Library as "machineName major.minor", e.g. "H5P.Text 1.1"
    #[arg(value_name = "LIBRARY")]
    library: String,
}

#[derive(clap::Args, Debug)]
struct DepsArgs {
    /// Library as "machineName major.minor"
    #[arg(value_name = "LIBRARY")]
    library: String,

    /// Which direct dependencies to list
    #[arg(long, value_enum, default_value_t = KindArg::All)]
    kind: KindArg,

    /// List the whole dependency closure instead
    #[arg(long, short = 't')]
    transitive: bool,
}

#[derive(clap::Args, Debug)]
struct CheckArgs {
    /// Library as "machineName major.minor"
    #[arg(value_name = "LIBRARY")]
    library: String,

    /// Print findings as JSON
    #[arg(long)]
    json: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum KindArg {
    Mandatory,
    Optional,
    All,
}

impl From<KindArg> for DependencyKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Mandatory => DependencyKind::Mandatory,
            KindArg::Optional => DependencyKind::Optional,
            KindArg::All => DependencyKind::All,
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let runtime = h5p_registry::runtime::RealRuntime;
    let config = RegistryConfig::resolve(&runtime, cli.libraries_dir, cli.temp_dir, cli.export_dir)?;

    match cli.command {
        Commands::Import(args) => commands::import(runtime, &args.file, &config)?,
        Commands::Export(args) => commands::export(runtime, &args.library, &config)?,
        Commands::Deps(args) => commands::deps(
            runtime,
            &args.library,
            args.kind.into(),
            args.transitive,
            &config,
        )?,
        Commands::Check(args) => commands::check(runtime, &args.library, args.json, &config)?,
        Commands::Remove(args) => commands::remove(runtime, &args.library, &config)?,
    }
    Ok(())
}
