use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::process;

use covenant_core::covenant::{Request, Response};
use covenant_core::turing::{parse_tape, render_tape, run, RunOutcome, TuringState};
use covenant_core::{evaluate, expected_outputs, Hash256, Verdict};

/// Covenant - stateful covenant evaluation CLI
///
/// Evaluate spends of limit-order and Turing machine covenants, compute the
/// outputs a spend must commit to, and simulate the machine offline.
#[derive(Parser)]
#[command(name = "covenant", version, about, long_about = None)]
struct Cli {
    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Log every check the engine runs
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a spend request (covenant + call + context)
    Evaluate {
        /// Path to request .json file
        file: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the outputs a request must commit to, and their hash256
    Outputs {
        /// Path to request .json file
        file: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the parentheses machine offline, without commitments
    Run {
        /// Tape written with `(`, `)`, `X` and `_`
        #[arg(long)]
        tape: String,
        /// Initial head position
        #[arg(long, default_value_t = 0)]
        head: i64,
        /// Step budget
        #[arg(long, default_value_t = 10_000)]
        max_steps: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compute hash256 (double SHA-256) of hex-encoded bytes
    Hash {
        /// Hex-encoded bytes
        hex: String,
    },

    /// Show version information
    Version,
}

// ── Logging ───────────────────────────────────────────────

fn init_tracing(quiet: bool, verbose: bool) {
    let default = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

// ── Commands ──────────────────────────────────────────────

fn load_request(file: &Path) -> Result<Request, String> {
    let text = std::fs::read_to_string(file)
        .map_err(|e| format!("cannot read {}: {}", file.display(), e))?;
    tracing::debug!(file = %file.display(), bytes = text.len(), "request loaded");
    Request::from_json(&text).map_err(|e| e.to_string())
}

fn fail(msg: &str) -> i32 {
    eprintln!("{} {}", "error:".red().bold(), msg);
    2
}

fn print_json<T: serde::Serialize>(value: &T) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(s) => {
            println!("{}", s);
            0
        }
        Err(e) => fail(&format!("Failed to serialize result: {}", e)),
    }
}

fn cmd_evaluate(file: &Path, json: bool) -> i32 {
    let req = match load_request(file) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };
    let response = Response::from(evaluate(&req.covenant, &req.call, &req.context));
    let accepted = response.accepted;

    if json {
        if print_json(&response) != 0 {
            return 2;
        }
    } else {
        match &response.verdict {
            Some(verdict) => {
                println!("{} {}", "✓ accepted:".green().bold(), verdict.status());
                match verdict {
                    Verdict::Continue { outputs, .. } | Verdict::Settled { outputs, .. } => {
                        println!("  outputs: {}", outputs);
                    }
                    Verdict::Halted { .. } | Verdict::Cancelled => {}
                }
            }
            None => {
                println!(
                    "{} {} ({})",
                    "✗ rejected:".red().bold(),
                    response.reason.as_deref().unwrap_or("unknown"),
                    response.kind.as_deref().unwrap_or("unknown")
                );
            }
        }
    }

    if accepted {
        0
    } else {
        1
    }
}

fn cmd_outputs(file: &Path, json: bool) -> i32 {
    let req = match load_request(file) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };
    match expected_outputs(&req.covenant, &req.call, &req.context) {
        Ok(expected) if json => print_json(&expected),
        Ok(expected) => {
            println!("hash_outputs: {}", expected.hash_outputs);
            println!("outputs: {}", expected.serialized);
            0
        }
        Err(e) => {
            println!("{} {} ({})", "✗ rejected:".red().bold(), e.reason(), e.kind());
            1
        }
    }
}

fn cmd_run(tape: &str, head: i64, max_steps: usize, json: bool) -> i32 {
    let machine = match parse_tape(tape).and_then(|t| TuringState::new(t, head, Vec::new())) {
        Ok(m) => m,
        Err(e) => return fail(&e.to_string()),
    };
    let report = match run(&machine, max_steps) {
        Ok(r) => r,
        Err(e) => return fail(&e.to_string()),
    };
    let code = match report.outcome {
        RunOutcome::Accepted => 0,
        RunOutcome::Rejected { .. } | RunOutcome::Exhausted => 1,
    };

    if json {
        if print_json(&report) != 0 {
            return 2;
        }
    } else {
        let tape = render_tape(&report.final_state.tape);
        match report.outcome {
            RunOutcome::Accepted => {
                println!("{} after {} steps", "✓ ACCEPT".green().bold(), report.steps)
            }
            RunOutcome::Rejected { state, symbol } => println!(
                "{} No transition table entry found. (state {:#04x}, symbol {:#04x}) after {} steps",
                "✗ REJECT".red().bold(),
                state,
                symbol,
                report.steps
            ),
            RunOutcome::Exhausted => println!(
                "{} step budget of {} used up",
                "⚠ EXHAUSTED".yellow().bold(),
                max_steps
            ),
        }
        println!("  tape: {}  head: {}", tape, report.final_state.head_pos);
    }
    code
}

fn cmd_hash(input: &str) -> i32 {
    match hex::decode(input.trim()) {
        Ok(bytes) => {
            println!("{}", Hash256::of(&bytes));
            0
        }
        Err(e) => fail(&format!("invalid hex: {}", e)),
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose);

    let exit_code = match cli.command {
        Commands::Evaluate { file, json } => cmd_evaluate(&file, json),
        Commands::Outputs { file, json } => cmd_outputs(&file, json),
        Commands::Run {
            tape,
            head,
            max_steps,
            json,
        } => cmd_run(&tape, head, max_steps, json),
        Commands::Hash { hex } => cmd_hash(&hex),
        Commands::Version => {
            println!(
                "covenant {} (covenant-core {})",
                env!("CARGO_PKG_VERSION"),
                covenant_core::VERSION
            );
            0
        }
    };

    process::exit(exit_code);
}
