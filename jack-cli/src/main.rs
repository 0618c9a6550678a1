use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use jack_core::{SourceFile, collect_sources, compile_to_vm, emit_xml};
use log::LevelFilter;

/// Compile Jack classes into stack-machine code.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// A `.jack` file, or a directory searched recursively for them
    path: PathBuf,

    #[arg(long, help = "Write the parse tree as XML instead of VM code")]
    xml: bool,

    #[arg(
        long,
        value_name = "DIR",
        help = "Directory for output files (defaults to next to each source)"
    )]
    out_dir: Option<PathBuf>,

    #[arg(long, help = "Print output to stdout instead of writing files")]
    stdout: bool,

    #[arg(short, long, action = clap::ArgAction::Count, help = "Increase log verbosity")]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose);
    execute(cli)
}

fn init_logger(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn execute(cli: Cli) -> Result<()> {
    let sources = collect_sources(&cli.path)
        .with_context(|| format!("failed to collect sources from {}", cli.path.display()))?;
    if sources.is_empty() {
        bail!("no .jack files found at {}", cli.path.display());
    }

    let extension = if cli.xml { "xml" } else { "vm" };
    for source in &sources {
        let output = if cli.xml {
            emit_xml(&source.contents)
        } else {
            compile_to_vm(&source.contents)
        }
        .with_context(|| format!("failed to compile {}", source.path.display()))?;

        if cli.stdout {
            print!("{output}");
            continue;
        }

        let destination = output_path(source, &cli.path, cli.out_dir.as_deref(), extension)?;
        write_output(&destination, output.as_bytes())?;
        log::info!(
            "{} -> {}",
            source.path.display(),
            destination.display()
        );
    }

    Ok(())
}

/// Next to the source by default. Under `out_dir`, the source keeps its path
/// relative to the walked root so same-named classes in different
/// directories stay apart.
fn output_path(
    source: &SourceFile,
    root: &Path,
    out_dir: Option<&Path>,
    extension: &str,
) -> Result<PathBuf> {
    let Some(dir) = out_dir else {
        return Ok(source.output_path(extension));
    };
    let relative = match source.path.strip_prefix(root) {
        Ok(relative) if !relative.as_os_str().is_empty() => relative,
        _ => source
            .path
            .file_name()
            .map(Path::new)
            .with_context(|| format!("source path {} has no file name", source.path.display()))?,
    };
    Ok(dir.join(relative).with_extension(extension))
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {parent:?}"))?;
        }
    }
    fs::write(path, bytes)
        .with_context(|| format!("failed to write output file {}", path.display()))?;
    Ok(())
}
