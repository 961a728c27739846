use anyhow::Result;
use clap::Parser;
use sagen::cli::commands::generate::{GenerateCommand, GenerateCommandHandler};
use sagen::cli::commands::init::{InitCommand, InitCommandHandler};
use sagen::cli::{Cli, Commands};
use sagen::core::config::Dialect;
use std::env;
use std::process;

fn main() {
    // CLIをパースして実行
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    // sqlxのAnyドライバを登録
    sqlx::any::install_default_drivers();

    // 非同期ランタイムを作成して実行
    let runtime = tokio::runtime::Runtime::new().expect("Failed to create Tokio runtime");

    let result = runtime.block_on(run_command(cli));

    match result {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

/// コマンドを実行する
async fn run_command(cli: Cli) -> Result<String> {
    // プロジェクトのルートパスを取得
    let project_path = env::current_dir()?;

    match cli.command {
        Commands::Init { dialect, force } => {
            let dialect = parse_dialect(dialect.as_deref())?;
            let handler = InitCommandHandler::new();
            let command = InitCommand {
                project_path,
                dialect,
                force,
                database_name: format!("{}_db", dialect),
            };
            handler.execute(&command)?;
            Ok("Project initialized.".to_string())
        }

        Commands::Generate { names, env } => {
            let handler = GenerateCommandHandler::new();
            let command = GenerateCommand {
                project_path,
                names,
                env,
                verbose: cli.verbose,
            };
            handler.execute(&command).await
        }
    }
}

/// Dialect文字列をDialect型に変換する
fn parse_dialect(dialect: Option<&str>) -> Result<Dialect> {
    match dialect {
        Some("postgresql") | Some("postgres") => Ok(Dialect::PostgreSQL),
        Some(other) => Err(anyhow::anyhow!(
            "Unsupported database dialect: {}. Please specify: postgresql.",
            other
        )),
        None => Ok(Dialect::PostgreSQL), // デフォルトはPostgreSQL
    }
}
