use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use miette::Diagnostic;
use nodescan_config::NodescanConfigBuilder;
use nodescan_fs::DiskFileSystem;
use nodescan_inference::{PluginRegistry, ProjectGraph};
use nodescan_repository::PackageManager;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[clap(about = "Infers the project graph of a JavaScript monorepo", long_about = None)]
#[command(name = "nodescan")]
pub struct Args {
    /// The workspace root to scan. Defaults to the current directory
    #[clap(long, value_parser, value_name = "DIR")]
    pub cwd: Option<Utf8PathBuf>,
    /// Package manager used in the run command of inferred targets
    #[clap(long, value_parser)]
    pub package_manager: Option<PackageManager>,
    /// Key of the tool section inside package.json files
    #[clap(long, value_parser)]
    pub manifest_key: Option<String>,
    /// File name of the explicit project configuration next to a
    /// package.json
    #[clap(long, value_parser)]
    pub sibling_config_file: Option<String>,
    /// Process files on a single thread
    #[clap(long)]
    pub no_parallel: bool,
    /// Pretty print the output
    #[clap(long)]
    pub pretty: bool,
    #[clap(flatten)]
    pub verbosity: Verbosity,
}

#[derive(Parser, Clone, Copy, Debug, Default, PartialEq)]
pub struct Verbosity {
    #[clap(
        long = "verbosity",
        global = true,
        conflicts_with = "v",
        value_name = "COUNT"
    )]
    /// Verbosity level
    pub verbosity: Option<u8>,
    #[clap(
        short = 'v',
        action = clap::ArgAction::Count,
        global = true,
        hide = true,
        conflicts_with = "verbosity"
    )]
    pub v: u8,
}

impl From<Verbosity> for u8 {
    fn from(val: Verbosity) -> Self {
        let Verbosity { verbosity, v } = val;
        verbosity.unwrap_or(v)
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("unable to determine the current directory: {0}")]
    CurrentDirectory(#[source] std::io::Error),
    #[error("the current directory is not valid UTF-8: {}", .0.display())]
    #[diagnostic(code(non_utf8_cwd))]
    NonUtf8Cwd(std::path::PathBuf),
    #[error("workspace root {0} is not a directory")]
    #[diagnostic(code(invalid_cwd), help("pass an existing directory with --cwd"))]
    NotADirectory(Utf8PathBuf),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] nodescan_config::Error),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Inference(#[from] nodescan_inference::Error),
}

fn workspace_root(cwd: Option<&Utf8Path>) -> Result<Utf8PathBuf, Error> {
    let current_dir = std::env::current_dir().map_err(Error::CurrentDirectory)?;
    let current_dir = Utf8PathBuf::try_from(current_dir)
        .map_err(|err| Error::NonUtf8Cwd(err.into_path_buf()))?;
    let root = match cwd {
        Some(cwd) => current_dir.join(cwd),
        None => current_dir,
    };
    if !root.is_dir() {
        return Err(Error::NotADirectory(root));
    }
    Ok(root)
}

/// Resolves configuration for the selected workspace and scans it.
pub fn run(args: &Args) -> Result<ProjectGraph, Error> {
    let root = workspace_root(args.cwd.as_deref())?;
    debug!("scanning workspace at {}", root);
    let fs = DiskFileSystem::new();

    let configuration = NodescanConfigBuilder::new(&root)
        .with_package_manager(args.package_manager)
        .with_manifest_key(args.manifest_key.clone())
        .with_sibling_config_file(args.sibling_config_file.clone())
        .with_parallel(args.no_parallel.then_some(false))
        .build(&fs)?;

    let registry = PluginRegistry::with_defaults(&configuration)?;
    let graph = registry.scan(&fs, &root, &configuration)?;
    info!("inferred {} projects", graph.len());
    if !graph.collisions().is_empty() {
        info!(
            "{} project roots were claimed by more than one project",
            graph.collisions().len()
        );
    }
    Ok(graph)
}
