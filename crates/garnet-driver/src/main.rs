use ariadne::{Color, Label, Report, ReportKind, Source};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use garnet_driver::{load_program, lower, read_file, run_isolated, DriverError};
use garnet_ir::{pretty, IrModule, LowerError, LowerOptions};

#[derive(Parser)]
#[command(
    name = "garnet",
    version = "0.1.0",
    about = "Garnet scope-resolution and parameter-binding lowerer",
    long_about = "Lowers a JSON syntax tree into slot-addressed IR with explicit\nargument binding, and runs it on a reference interpreter."
)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lower a syntax tree and print the result
    Lower {
        /// Input syntax tree (JSON)
        input: PathBuf,

        /// Source text the tree was parsed from, for diagnostics
        #[arg(long)]
        source: Option<PathBuf>,

        /// What to emit
        #[arg(long, default_value = "ir")]
        emit: EmitMode,

        /// Read undeclared locals as nil instead of rejecting them
        #[arg(long)]
        lenient: bool,
    },

    /// Lower a syntax tree and execute it
    Run {
        /// Input syntax tree (JSON)
        input: PathBuf,

        /// Source text the tree was parsed from, for diagnostics
        #[arg(long)]
        source: Option<PathBuf>,
    },

    /// Check that a syntax tree lowers without errors
    Check {
        /// Input syntax tree (JSON)
        input: PathBuf,

        /// Source text the tree was parsed from, for diagnostics
        #[arg(long)]
        source: Option<PathBuf>,
    },
}

#[derive(Clone, Debug, ValueEnum)]
enum EmitMode {
    /// Emit the IR dump (default)
    Ir,
    /// Emit per-body scope metadata as JSON
    Summary,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Lower {
            input,
            source,
            emit,
            lenient,
        } => lower_command(&input, source.as_deref(), emit, lenient),
        Commands::Run { input, source } => run_command(&input, source.as_deref()),
        Commands::Check { input, source } => check_command(&input, source.as_deref()),
    }
}

/// `GARNET_LOG` takes env-filter syntax; otherwise `--verbose` selects debug.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("GARNET_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn lower_command(input: &Path, source: Option<&Path>, emit: EmitMode, lenient: bool) -> ExitCode {
    let options = LowerOptions {
        strict_unresolved_locals: !lenient,
        ..LowerOptions::default()
    };
    let module = match load_and_lower(input, source, options) {
        Some(module) => module,
        None => return ExitCode::FAILURE,
    };

    match emit {
        EmitMode::Ir => print!("{}", pretty::dump_module(&module)),
        EmitMode::Summary => match serde_json::to_string_pretty(&module.summaries()) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing summary: {}", e);
                return ExitCode::FAILURE;
            }
        },
    }
    ExitCode::SUCCESS
}

fn run_command(input: &Path, source: Option<&Path>) -> ExitCode {
    let module = match load_and_lower(input, source, LowerOptions::default()) {
        Some(module) => module,
        None => return ExitCode::FAILURE,
    };

    let outcome = match run_isolated(module) {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    print!("{}", outcome.output);
    match outcome.error {
        None => ExitCode::SUCCESS,
        Some(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn check_command(input: &Path, source: Option<&Path>) -> ExitCode {
    match load_and_lower(input, source, LowerOptions::default()) {
        Some(module) => {
            println!("Lowering passed! ({} bodies)", module.bodies.len());
            ExitCode::SUCCESS
        }
        None => ExitCode::FAILURE,
    }
}

/// Load and lower, reporting any failure. `None` means errors were printed.
fn load_and_lower(input: &Path, source: Option<&Path>, options: LowerOptions) -> Option<IrModule> {
    let program = match load_program(input) {
        Ok(program) => program,
        Err(e) => {
            eprintln!("Error: {}", e);
            return None;
        }
    };

    match lower(&program, options) {
        Ok(module) => Some(module),
        Err(DriverError::Lower(errors)) => {
            report_lower_errors(&errors, input, source);
            None
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            None
        }
    }
}

fn report_lower_errors(errors: &[LowerError], input: &Path, source: Option<&Path>) {
    let text = match source.map(read_file) {
        Some(Ok(text)) => Some(text),
        Some(Err(e)) => {
            eprintln!("Warning: {}", e);
            None
        }
        None => None,
    };

    match (text, source) {
        (Some(text), Some(path)) => {
            let filename = path.to_string_lossy().to_string();
            for err in errors {
                report_error(
                    "E3000",
                    "Lowering error",
                    &err.message(),
                    err.span.start,
                    err.span.end,
                    &filename,
                    &text,
                );
            }
        }
        _ => {
            for err in errors {
                eprintln!(
                    "{}:{}..{}: {}",
                    input.display(),
                    err.span.start,
                    err.span.end,
                    err.message()
                );
            }
        }
    }
    eprintln!("{} error(s)", errors.len());
}

fn report_error(code: &str, title: &str, message: &str, start: usize, end: usize, filename: &str, source: &str) {
    let end = end.max(start).min(source.len());
    let start = start.min(end);
    let span = (filename, start..end);
    let printed = Report::build(ReportKind::Error, span.clone())
        .with_code(code)
        .with_message(title)
        .with_label(
            Label::new(span)
                .with_message(message)
                .with_color(Color::Red),
        )
        .finish()
        .print((filename, Source::from(source)));
    if let Err(e) = printed {
        eprintln!("{}: {}", title, message);
        eprintln!("(failed to render report: {})", e);
    }
}
