// Main entry point for the csvql CLI
// Loads a CSV file and provides an interactive shell to query it

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use csvql::dataset::reader;
use csvql::format::{format_json, format_table};
use csvql::{sample_dataset, EngineConfig, FingerprintMode, ParsedDataset, QueryEngine, ResultSource};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// csvql - query CSV files with SQL, using the column names as written in the header
#[derive(ClapParser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// CSV file to load
    #[arg(short, long, conflicts_with = "sample")]
    file: Option<PathBuf>,

    /// Use the built-in sample dataset (the default when no file is given)
    #[arg(long)]
    sample: bool,

    /// Execute a single query and exit
    #[arg(short, long)]
    execute: Option<String>,

    /// Print results as JSON instead of a table
    #[arg(long)]
    json: bool,

    /// Fingerprint every cell to detect dataset changes (the default)
    #[arg(long, conflicts_with = "sample_fingerprint_rows")]
    full_fingerprint: bool,

    /// Fingerprint only the first N rows plus the row count
    #[arg(long, value_name = "N")]
    sample_fingerprint_rows: Option<usize>,

    /// Rows returned when a query falls back to raw rows
    #[arg(long, value_name = "N", default_value_t = 100)]
    fallback_limit: usize,
}

impl Args {
    fn engine_config(&self) -> EngineConfig {
        let fingerprint = match self.sample_fingerprint_rows {
            Some(rows) if !self.full_fingerprint => FingerprintMode::Sampled { rows },
            _ => FingerprintMode::Full,
        };

        EngineConfig {
            fingerprint,
            fallback_row_limit: self.fallback_limit,
            ..EngineConfig::default()
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("csvql=info")),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let dataset = match &args.file {
        Some(path) => reader::read_path(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => {
            if !args.sample {
                info!("no file given, using the sample dataset");
            }
            sample_dataset()
        }
    };

    let mut session = Session {
        engine: QueryEngine::new(args.engine_config()),
        dataset,
        json: args.json,
    };

    // If a query was provided, run it and exit
    if let Some(query) = &args.execute {
        session.run(query)?;
        return Ok(());
    }

    // Interactive REPL (Read-Eval-Print Loop)
    println!("╔════════════════════════════════════════════╗");
    println!("║          csvql Interactive Shell           ║");
    println!("╚════════════════════════════════════════════╝");
    println!();
    println!(
        "Loaded {} rows, {} columns into table '{}'",
        session.dataset.total_rows(),
        session.dataset.columns.len(),
        session.engine.config().table_name
    );
    println!("Type queries or '.help' for help");
    println!("Type '.exit' to quit");
    println!();

    repl(&mut session)
}

/// One loaded dataset and the engine that queries it
struct Session {
    engine: QueryEngine,
    dataset: ParsedDataset,
    json: bool,
}

impl Session {
    fn run(&mut self, query: &str) -> Result<()> {
        let outcome = self.engine.run(&self.dataset, query);

        if let ResultSource::Fallback { reason } = &outcome.source {
            eprintln!("Query failed ({}), showing a best-effort answer", reason);
        }

        if self.json {
            println!("{}", format_json(&outcome.rows)?);
        } else {
            println!("{}", format_table(&outcome.rows));
        }
        Ok(())
    }

    fn print_columns(&self) {
        for column in &self.dataset.columns {
            let kind = format!("{:?}", column.kind).to_lowercase();
            println!("  {:<24} {:<8} {}", column.name, kind, column.samples.join(", "));
        }
    }
}

/// REPL (Read-Eval-Print Loop) implementation
fn repl(session: &mut Session) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        // Print prompt
        print!("csvql> ");
        stdout.flush()?;

        // Read user input; zero bytes means end of input
        let mut input = String::new();
        if stdin.read_line(&mut input)? == 0 {
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        // Handle special commands (starting with .)
        if input.starts_with('.') {
            match input {
                ".exit" | ".quit" => {
                    println!("Goodbye!");
                    break;
                }
                ".help" => print_help(),
                ".columns" => session.print_columns(),
                _ => {
                    println!("Unknown command: {}", input);
                    println!("Type '.help' for help");
                }
            }
            continue;
        }

        if let Err(e) = session.run(input) {
            eprintln!("Error: {}", e);
        }
    }

    Ok(())
}

/// Print help information
fn print_help() {
    println!("Special Commands:");
    println!("  .help              Show this help message");
    println!("  .columns           List columns with their type and sample values");
    println!("  .exit, .quit       Exit the shell");
    println!();
    println!("Queries:");
    println!("  SELECT * FROM data LIMIT 5");
    println!("  SELECT city, COUNT(*) AS n FROM data GROUP BY city ORDER BY n DESC");
    println!("  SELECT \"환자 이름\", age FROM data WHERE age BETWEEN 20 AND 30");
    println!();
    println!("Notes:");
    println!("  - Column names are written as they appear in the CSV header,");
    println!("    with or without double quotes");
    println!("  - String values must be in single quotes");
    println!("  - Only SELECT is supported; other statements get a best-effort answer");
    println!();
}
