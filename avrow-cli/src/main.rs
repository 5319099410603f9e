mod cat;
mod describe;
mod logging;

use std::path::PathBuf;

use anyhow::anyhow;
use avrow::{SCHEMA_LITERAL, SCHEMA_URL, TableProperties};
use clap::Parser;

use crate::cat::exec_cat;
use crate::describe::exec_describe;
use crate::logging::{default_env_filter, setup_logger};

#[derive(clap::Parser)]
#[command(version, about)]
struct Cli {
    /// Log everything, unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Print the columns a table's Avro schema presents to the engine.
    Describe {
        #[command(flatten)]
        table: TableArgs,
    },
    /// Decode an Avro object container file and print its rows.
    Cat {
        /// Path to the Avro file on disk
        file: PathBuf,

        /// Table schema to read the file with. Defaults to the file's own schema.
        #[command(flatten)]
        table: TableArgs,
    },
}

#[derive(Debug, clap::Args)]
struct TableArgs {
    /// Avro schema text, stored as `schema.literal`
    #[arg(long)]
    literal: Option<String>,

    /// Location of the Avro schema, stored as `schema.url`
    #[arg(long)]
    url: Option<String>,

    /// Any other table property
    #[arg(long = "property", value_name = "KEY=VALUE", value_parser = parse_property)]
    properties: Vec<(String, String)>,
}

impl TableArgs {
    fn into_properties(self) -> TableProperties {
        let mut properties = self.properties.into_iter().collect::<TableProperties>();
        if let Some(literal) = self.literal {
            properties.insert(SCHEMA_LITERAL, literal);
        }
        if let Some(url) = self.url {
            properties.insert(SCHEMA_URL, url);
        }
        properties
    }
}

fn parse_property(arg: &str) -> anyhow::Result<(String, String)> {
    let (key, value) = arg
        .split_once('=')
        .ok_or_else(|| anyhow!("expected KEY=VALUE, found {arg}"))?;
    Ok((key.to_string(), value.to_string()))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logger(default_env_filter(cli.verbose)?);

    match cli.command {
        Commands::Describe { table } => exec_describe(table.into_properties())?,
        Commands::Cat { file, table } => exec_cat(&file, table.into_properties())?,
    };

    Ok(())
}
