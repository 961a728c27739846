// CLI Layer
// ユーザー入力の受付とコマンドルーティング

pub mod commands;

use clap::{Parser, Subcommand};

/// Sagen - SQLAlchemy Schema Module Generator
///
/// Reflect tables from a live database and emit deterministic
/// python modules containing SQLAlchemy table definitions.
#[derive(Parser, Debug)]
#[command(name = "sagen")]
#[command(author = "Sagen Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "SQLAlchemy schema module generator")]
#[command(long_about = "Sagen - SQLAlchemy Schema Module Generator

Reflect tables from a live database and emit deterministic python
modules containing SQLAlchemy table definitions.

Sagen helps you:
  • Describe the tables you care about in simple .schema files
  • Reflect columns, types and constraints from the database
  • Emit stable, reviewable python schema modules
  • Keep generated modules identical across runs

Supported databases: PostgreSQL")]
#[command(propagate_version = true)]
#[command(after_help = "GETTING STARTED:
  1. Initialize a new project:      sagen init --dialect postgresql
  2. List your tables:              Edit .schema files in schema/ directory
  3. Generate schema modules:       sagen generate
  4. Generate a single module:      sagen generate mydb

For detailed help on each command, use: sagen <command> --help")]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new schema reflection project
    ///
    /// Creates the configuration file, the schema definition directory
    /// and the python constraint helper package.
    ///
    /// EXAMPLES:
    ///   # Initialize with PostgreSQL
    ///   sagen init --dialect postgresql
    ///
    ///   # Force re-initialization
    ///   sagen init --force
    Init {
        /// Database dialect (postgresql)
        #[arg(short, long, value_name = "DIALECT")]
        dialect: Option<String>,

        /// Force initialization even if config exists
        #[arg(short, long)]
        force: bool,
    },

    /// Generate python schema modules from the database
    ///
    /// Reads the .schema definition files, reflects the listed tables
    /// from the configured database and writes one python module per
    /// definition file.
    ///
    /// EXAMPLES:
    ///   # Generate all schema modules
    ///   sagen generate
    ///
    ///   # Generate a single module
    ///   sagen generate mydb
    ///
    ///   # Generate against the staging environment
    ///   sagen generate --env staging
    Generate {
        /// Schema definition names to generate (default: all)
        #[arg(value_name = "NAME")]
        names: Vec<String>,

        /// Target environment (development, staging, production)
        #[arg(short, long, value_name = "ENV", default_value = "development")]
        env: String,
    },
}
