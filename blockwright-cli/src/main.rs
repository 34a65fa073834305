use anyhow::{Context, Result};
use blockwright::{
    blocks_from_json, field_values, Block, DetectResponse, Engine, EngineConfig, EngineError, ErrorResponse,
    ExtractOptions, FillOptions, FillPolicy, MergePolicy, ParseOptions, Warning, WriteMode,
};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "blockwright",
    about = "Detect and fill the form fields of a PDF",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Raise the log level (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Tolerate malformed objects instead of rejecting the file
    #[arg(long, global = true)]
    lenient: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the fillable blocks of a PDF as JSON
    Detect {
        /// Input PDF file
        input: PathBuf,

        /// How widgets sharing one field are reported
        #[arg(long, value_enum, default_value = "per-widget")]
        merge: Merge,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Write values into the form fields of a PDF
    Fill {
        /// Input PDF file
        input: PathBuf,

        /// JSON object mapping block labels to values
        #[arg(long)]
        values: PathBuf,

        /// Blocks from an earlier `detect` (array or detect output)
        #[arg(long)]
        blocks: Option<PathBuf>,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Write a complete new file instead of an incremental update
        #[arg(long)]
        full_rewrite: bool,

        /// Stop at the first field that cannot be filled
        #[arg(long)]
        fail_fast: bool,
    },

    /// List the form fields of a PDF
    Fields {
        /// Input PDF file
        input: PathBuf,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Merge {
    PerWidget,
    PerField,
}

impl From<Merge> for MergePolicy {
    fn from(merge: Merge) -> Self {
        match merge {
            Merge::PerWidget => MergePolicy::PerWidget,
            Merge::PerField => MergePolicy::PerField,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "blockwright=info",
        1 => "blockwright=debug",
        _ => "blockwright=trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<ExitCode> {
    let parse = if cli.lenient {
        ParseOptions::lenient()
    } else {
        ParseOptions::default()
    };

    match cli.command {
        Commands::Detect {
            input,
            merge,
            pretty,
        } => {
            let pdf = read_input(&input)?;
            let engine = Engine::new(EngineConfig {
                parse,
                extract: ExtractOptions::default().with_merge(merge.into()),
                ..EngineConfig::default()
            });
            match engine.detect_blocks(&pdf) {
                Ok(blocks) => {
                    print_json(&DetectResponse::new(blocks), pretty)?;
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => report_failure(&e),
            }
        }

        Commands::Fill {
            input,
            values,
            blocks,
            output,
            full_rewrite,
            fail_fast,
        } => {
            let pdf = read_input(&input)?;
            let values = read_values(&values)?;
            let blocks = match blocks {
                Some(path) => read_blocks(&path)?,
                None => Vec::new(),
            };
            let engine = Engine::new(EngineConfig {
                parse,
                fill: FillOptions {
                    policy: if fail_fast {
                        FillPolicy::FailFast
                    } else {
                        FillPolicy::BestEffort
                    },
                    write_mode: if full_rewrite {
                        WriteMode::FullRewrite
                    } else {
                        WriteMode::Incremental
                    },
                },
                ..EngineConfig::default()
            });

            match engine.fill_blocks_with_report(&pdf, &blocks, &values) {
                Ok(filled) => {
                    for warning in &filled.warnings {
                        eprintln!("warning: {}", format_warning(&Warning::from(warning)));
                    }
                    std::fs::write(&output, &filled.bytes)
                        .with_context(|| format!("failed to write {}", output.display()))?;
                    println!(
                        "Wrote {} ({} bytes, {} warnings)",
                        output.display(),
                        filled.bytes.len(),
                        filled.warnings.len()
                    );
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => report_failure(&e),
            }
        }

        Commands::Fields { input, json } => {
            let pdf = read_input(&input)?;
            let engine = Engine::new(EngineConfig {
                parse,
                ..EngineConfig::default()
            });
            let fields = match engine.inspect_fields(&pdf) {
                Ok(fields) => fields,
                Err(e) => return report_failure(&e),
            };

            if json {
                print_json(&fields, true)?;
                return Ok(ExitCode::SUCCESS);
            }
            if fields.is_empty() {
                println!("No form fields in {}", input.display());
                return Ok(ExitCode::SUCCESS);
            }
            println!("{:<40} {:<10} {:<8} VALUE", "NAME", "TYPE", "WIDGETS");
            for field in &fields {
                let mut value = field.value.clone().unwrap_or_default();
                if field.read_only {
                    value.push_str(" [read-only]");
                }
                println!("{:<40} {:<10} {:<8} {}", field.name, field.kind, field.widgets, value);
                if !field.options.is_empty() {
                    println!("    options: {}", field.options.join(", "));
                }
                if !field.states.is_empty() {
                    println!("    states: {}", field.states.join(", "));
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn read_input(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Values file: a flat JSON object of labels to values
fn read_values(path: &Path) -> Result<HashMap<String, String>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    field_values(&text).with_context(|| format!("invalid values in {}", path.display()))
}

/// `--blocks` accepts the bare array or the whole detect output
fn read_blocks(path: &Path) -> Result<Vec<Block>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    blocks_from_json(&text).with_context(|| format!("{} does not hold blocks", path.display()))
}

fn print_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{text}");
    Ok(())
}

/// Engine failures print the error envelope and exit with status 2
fn report_failure(error: &EngineError) -> Result<ExitCode> {
    tracing::debug!("engine failure: {error}");
    print_json(&ErrorResponse::from(error), false)?;
    Ok(ExitCode::from(2))
}

fn format_warning(warning: &Warning) -> String {
    match &warning.context {
        Some(context) => format!("{} ({context}): {}", warning.code, warning.message),
        None => format!("{}: {}", warning.code, warning.message),
    }
}
