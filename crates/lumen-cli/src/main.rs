use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use lumen_archive::{process_jar, ProcessOptions};
use lumen_classpath::ClasspathInheritance;
use lumen_mappings::parse_tsrg2;

#[derive(Parser)]
#[command(
    name = "lumen",
    version,
    about = "Rewrite obfuscated names in a jar using a TSRG2 mapping table"
)]
struct Cli {
    /// The jar to remap
    #[arg(short = 'i', long = "jar-in")]
    jar_in: PathBuf,
    /// The output jar
    #[arg(short = 'o', long = "jar-out")]
    jar_out: PathBuf,
    /// The TSRG2 mappings to remap with
    #[arg(short = 'm', long)]
    mappings: PathBuf,
    /// Library to add to the classpath for constructing inheritance
    #[arg(short = 'l', long = "library")]
    libraries: Vec<PathBuf>,
    /// Number of threads to use when remapping
    #[arg(short = 't', long)]
    threads: Option<usize>,
    /// Generate the metadata file that names abstract method arguments
    /// during decompilation
    #[arg(long)]
    fernflower_meta: bool,
    /// Inject synthetic constructors for classes with final fields and no
    /// constructor
    #[arg(long)]
    create_inits: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    let args = expand_args(std::env::args().collect())?;
    let cli = Cli::parse_from(args);
    run(cli)
}

fn run(cli: Cli) -> Result<()> {
    if !cli.jar_in.exists() {
        bail!("input jar does not exist: {}", cli.jar_in.display());
    }
    let text = fs::read_to_string(&cli.mappings)
        .with_context(|| format!("failed to read mappings {}", cli.mappings.display()))?;
    let table = parse_tsrg2(&text).context("failed to parse input mappings")?;
    info!("loaded mappings for {} classes", table.class_count());

    let mut classpath = ClasspathInheritance::new();
    classpath
        .add_jar(&cli.jar_in)
        .with_context(|| format!("failed to open {}", cli.jar_in.display()))?;
    for library in &cli.libraries {
        classpath
            .add_path(library)
            .with_context(|| format!("failed to read library {}", library.display()))?;
    }

    let options = ProcessOptions {
        inject_constructors: cli.create_inits,
        parameter_metadata: cli.fernflower_meta,
        threads: cli.threads,
    };
    let stats = process_jar(&cli.jar_in, &cli.jar_out, &table, &classpath, &options)?;
    println!(
        "Processed {} entries into {} ({} dropped, {} generated)",
        stats.entries_read,
        cli.jar_out.display(),
        stats.entries_dropped,
        stats.resources_generated
    );
    Ok(())
}

/// Splices `--cfg <file>` / `--cfg=<file>` response files into the argument
/// list, one argument per line.
fn expand_args(args: Vec<String>) -> Result<Vec<String>> {
    let mut expanded = Vec::with_capacity(args.len());
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        let path = if let Some(inline) = arg.strip_prefix("--cfg=") {
            Some(inline.to_string())
        } else if arg == "--cfg" {
            match iter.next() {
                Some(next) => Some(next),
                None => bail!("must specify a file when using the --cfg argument"),
            }
        } else {
            None
        };
        match path {
            Some(path) => {
                let text = fs::read_to_string(Path::new(&path))
                    .with_context(|| format!("failed to read config file '{path}'"))?;
                expanded.extend(text.lines().map(str::to_string));
            }
            None => expanded.push(arg),
        }
    }
    Ok(expanded)
}
