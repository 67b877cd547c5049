use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, Log, Metadata, Record};
use std::fs;
use std::io::{self, Read};
use std::process::ExitCode;

use pegpat::{MatchResult, Value, create};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Grammar text file
    #[arg(value_name = "GRAMMAR")]
    grammar: String,

    /// Text to match
    #[arg(value_name = "INPUT", conflicts_with = "stdin")]
    input: Option<String>,

    /// Read the text to match from stdin
    #[arg(long)]
    stdin: bool,

    /// Print captures as JSON
    #[arg(long)]
    json: bool,

    /// Log to stderr (repeat for more detail)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Writes log records to stderr.
struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn init_logging(verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    log::set_logger(&LOGGER).context("Failed to install logger")?;
    log::set_max_level(level);
    Ok(())
}

fn run(args: Args) -> Result<bool> {
    let grammar_text = fs::read_to_string(&args.grammar)
        .with_context(|| format!("Failed to read {}", args.grammar))?;
    let pattern = create(&grammar_text).with_context(|| format!("Failed to compile {}", args.grammar))?;

    let input = match args.input {
        Some(input) if !args.stdin => input,
        _ => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };

    let Some(result) = pattern.match_str(&input).context("Match aborted")? else {
        println!("no match");
        return Ok(false);
    };
    match result {
        MatchResult::Position(end) if args.json => println!("{end}"),
        MatchResult::Position(end) => println!("matched {end} of {} characters", input.chars().count()),
        MatchResult::Captures(captures) if args.json => {
            println!("{}", serde_json::to_string_pretty(&captures)?)
        }
        MatchResult::Captures(captures) => {
            for capture in &captures {
                println!("{}", display(capture));
            }
        }
    }
    Ok(true)
}

fn display(value: &Value) -> String {
    match value {
        Value::Str(s) => format!("{s:?}"),
        other => other.to_string(),
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(err) = init_logging(args.verbose) {
        eprintln!("{err:#}");
    }
    match run(args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::from(2)
        }
    }
}
