//! # Schema Guard
//!
//! Safety gate for SQL produced by a language model.
//!
//! `schema-guard` classifies statements for destructive keywords, checks their
//! `table.column` references against a captured schema, and keeps named,
//! checksummed schema snapshots so that drift can be detected and described.
//!
//! # Quick Start
//!
//! ```bash
//! # Is this statement destructive?
//! schema-guard classify --sql "DELETE FROM users"
//!
//! # Do all references resolve against the schema?
//! schema-guard check -s schema.sql --file queries.sql
//!
//! # Generate, then check
//! export LLM_API_KEY="sk-..."
//! schema-guard generate -r "ten newest orders with customer names" -s schema.json
//!
//! # Snapshots
//! schema-guard snapshot --owner me save crm -s schema.json
//! schema-guard snapshot --owner me diff crm -s schema-v2.json
//! ```
//!
//! # Exit Codes
//!
//! - `0` - Allowed, no findings
//! - `1` - Warnings (annotated statements, unknown references that are not
//!   rejected, a non-empty diff) or an error
//! - `2` - Blocked

use std::process;

use clap::Parser;
use schema_guard::{
    app::{CommandOutput, create_output_options, run_command},
    cli::Cli,
    config::Config,
    error::AppResult
};
use tokio::main;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[main]
async fn main() {
    match run().await {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

async fn run() -> AppResult<i32> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = Config::load()?;
    let opts = create_output_options(cli.output_format, cli.no_color);
    let CommandOutput {
        exit_code,
        output
    } = run_command(cli.command, &config, &opts).await?;
    if output.ends_with('\n') {
        print!("{}", output);
    } else {
        println!("{}", output);
    }
    Ok(exit_code)
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to install logger: {}", e);
    }
}
