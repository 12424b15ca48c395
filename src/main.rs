use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use dossier::config::Config;
use dossier::generator::OpenRouterGenerator;
use dossier::session::{Progress, Session, SessionOptions};

#[derive(Parser, Debug)]
#[command(
    name = "dossier",
    about = "Generate a PDF dossier for a file using a self-correcting AI extraction script",
    version
)]
struct Args {
    /// File to analyze
    file: PathBuf,

    /// Output PDF path (defaults to "<stem>_report.pdf" next to the input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of improvement iterations (1-5)
    #[arg(short = 'n', long)]
    improvements: Option<u32>,

    /// Execution attempts before the correction loop gives up
    #[arg(long)]
    retries: Option<u32>,

    /// Include extraction error markers in the report
    #[arg(long)]
    include_errors: bool,

    /// Model id to request from the generation service
    #[arg(long)]
    model: Option<String>,

    /// Session work directory (holds the evolving script and artifacts)
    #[arg(long)]
    workdir: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let config = Config::load();

    let improvements = args.improvements.unwrap_or(config.improvements);
    if !(1..=5).contains(&improvements) {
        anyhow::bail!("number of improvements must be between 1 and 5");
    }

    let file = args
        .file
        .canonicalize()
        .with_context(|| format!("cannot open {}", args.file.display()))?;
    if !file.is_file() {
        anyhow::bail!("{} is not a file", file.display());
    }

    let output = args.output.unwrap_or_else(|| default_output(&file));

    let api_key = config.resolve_api_key().ok_or_else(|| {
        anyhow::anyhow!(
            "no API key configured; set DOSSIER_API_KEY or OPENROUTER_API_KEY, or add api_key to {}",
            Config::config_location()
        )
    })?;
    let model = args.model.unwrap_or_else(|| config.model.clone());
    let generator = OpenRouterGenerator::new(api_key, model)?;

    let opts = SessionOptions {
        subject: file.clone(),
        output,
        improvements,
        include_errors: args.include_errors,
        retries: args.retries.unwrap_or(config.retries),
        correction_delay: Duration::from_secs(config.correction_delay_secs),
        improve_delay: Duration::from_secs(config.improve_delay_secs),
        workdir: args.workdir.unwrap_or_else(|| config.resolve_workdir()),
    };

    eprintln!("  analyzing {}", file.display());

    let (tx, rx) = mpsc::channel();
    let session = Session::new(opts, Box::new(generator), tx)?;
    let worker = thread::spawn(move || session.run());

    // The channel closes when the worker finishes, ending this loop.
    for progress in rx {
        match progress {
            Progress::Stage(stage) => eprintln!("  {}", stage),
            Progress::Iteration {
                index,
                total,
                committed,
            } => eprintln!(
                "  iteration {}/{}: {}",
                index,
                total,
                if committed {
                    "improvement kept"
                } else {
                    "improvement reverted"
                }
            ),
            Progress::ReportWritten(path) => {
                eprintln!("  report written to {}", path.display())
            }
        }
    }

    let written = worker
        .join()
        .map_err(|_| anyhow::anyhow!("report worker panicked"))??;
    println!("{}", written.display());
    Ok(())
}

fn default_output(file: &Path) -> PathBuf {
    let stem = file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());
    file.with_file_name(format!("{}_report.pdf", stem))
}
