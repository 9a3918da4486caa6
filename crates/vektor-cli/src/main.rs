//! vektor: inspect and produce wire-encoded queries

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;
mod logging;

use config::{Config, OutputFormat};

#[derive(Parser)]
#[command(name = "vektor", version, about = "Inspect and produce wire-encoded queries")]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = "vektor.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decode a binary query file and print it
    Inspect {
        file: PathBuf,
        /// Print the wire message as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the schema of a catalog table
    Describe {
        table: String,
        #[arg(long)]
        catalog: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Compile a table scan and write the binary query
    Scan {
        table: String,
        #[arg(long)]
        catalog: Option<PathBuf>,
        /// Columns to project, comma separated
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,
        #[arg(long)]
        limit: Option<i64>,
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn output_format(config: &Config, json: bool) -> OutputFormat {
    if json {
        OutputFormat::Json
    } else {
        config.codec.output
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    logging::init(&config.logging);

    let catalog_path = |flag: Option<PathBuf>| flag.unwrap_or_else(|| PathBuf::from(&config.codec.catalog));

    let out = match cli.command {
        Command::Inspect { file, json } => commands::inspect(&file, output_format(&config, json))?,
        Command::Describe {
            table,
            catalog,
            json,
        } => {
            let catalog = commands::load_catalog(&catalog_path(catalog))?;
            commands::describe(&catalog, &table, output_format(&config, json))?
        }
        Command::Scan {
            table,
            catalog,
            columns,
            limit,
            output,
        } => {
            let catalog = commands::load_catalog(&catalog_path(catalog))?;
            commands::scan(&catalog, &table, &columns, limit, &output)?
        }
    };
    println!("{}", out.trim_end());
    Ok(())
}
