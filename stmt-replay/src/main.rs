// Statement replay - drive breakpoint evaluation from recorded statements
//
// Reads intercepted statements as JSON lines on stdin and reports, per line,
// which breakpoints fired and what their processors produced.

use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use stmt_debug::{AutoResume, BreakpointRegistry, Evaluator, Resume};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

mod definitions;
mod handlers;

use handlers::ReplayHandler;

/// Replay intercepted SQL statements against a set of breakpoints
#[derive(Debug, Parser)]
#[command(name = "stmt-replay", version, about)]
struct Args {
    /// JSON file with the breakpoint definitions
    #[arg(short, long)]
    breakpoints: PathBuf,

    /// How statements suspended at a breaking breakpoint continue
    #[arg(long, value_enum, default_value_t = OnBreak::Run)]
    on_break: OnBreak,

    /// Only report which breakpoints would match, without counting hits
    #[arg(long)]
    preview: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OnBreak {
    Run,
    Skip,
    Fail,
}

impl From<OnBreak> for Resume {
    fn from(on_break: OnBreak) -> Self {
        match on_break {
            OnBreak::Run => Resume::Run,
            OnBreak::Skip => Resume::Skip,
            OnBreak::Fail => Resume::Fail,
        }
    }
}

const DEFAULT_LOG_FILTER: &str = "stmt_replay=info,stmt_debug=info";

/// `RUST_LOG` when set and valid, the default filter otherwise
fn log_filter(rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Tracing to stderr only - stdout carries the reports
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(rust_log.as_deref()))
        .with_writer(std::io::stderr)
        .init();

    info!("Starting statement replay...");

    let registry = Arc::new(BreakpointRegistry::new());
    registry.replace_all(definitions::load(&args.breakpoints)?)?;
    info!(
        "Loaded {} breakpoint(s) from {}",
        registry.len(),
        args.breakpoints.display()
    );

    let evaluator = Evaluator::new(registry).with_suspend_handler(AutoResume(args.on_break.into()));
    let handler = ReplayHandler::new(evaluator, args.preview);

    let mut reader = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    let mut statements = 0usize;

    loop {
        let mut line = String::new();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                info!("End of input");
                break;
            }
            Ok(_) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                debug!("Received: {}", line);
                statements += 1;

                let report = handler.handle_line(line);
                let report_str = serde_json::to_string(&report)?;
                stdout.write_all(report_str.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await?;
            }
            Err(e) => {
                error!("Read error: {}", e);
                break;
            }
        }
    }

    info!("Replayed {} statement(s)", statements);
    Ok(())
}
