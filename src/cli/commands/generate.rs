// generateコマンドハンドラー
//
// スキーマ定義ファイルからPythonスキーマモジュールを生成します。

use crate::services::schema_generator::{GeneratedModule, SchemaGeneratorService};
use anyhow::Result;
use colored::Colorize;
use std::fmt::Write;
use std::path::{Path, PathBuf};

/// generateコマンドの入力パラメータ
#[derive(Debug, Clone)]
pub struct GenerateCommand {
    /// プロジェクトのルートパス
    pub project_path: PathBuf,
    /// 対象のスキーマ定義名（空なら全件）
    pub names: Vec<String>,
    /// 対象環境
    pub env: String,
    /// 詳細出力
    pub verbose: bool,
}

/// generateコマンドハンドラー
#[derive(Debug, Default)]
pub struct GenerateCommandHandler {
    service: SchemaGeneratorService,
}

impl GenerateCommandHandler {
    /// 新しいGenerateCommandHandlerを作成
    pub fn new() -> Self {
        Self {
            service: SchemaGeneratorService::new(),
        }
    }

    /// generateコマンドを実行
    pub async fn execute(&self, command: &GenerateCommand) -> Result<String> {
        let generated = self
            .service
            .generate_all(&command.project_path, &command.names, &command.env)
            .await?;

        Ok(self.format_output(command, &generated))
    }

    /// 実行結果を整形
    fn format_output(&self, command: &GenerateCommand, generated: &[GeneratedModule]) -> String {
        let mut output = String::new();

        if command.verbose {
            writeln!(&mut output, "Environment: {}", command.env).unwrap();
            writeln!(&mut output).unwrap();
        }

        for module in generated {
            let tables = if module.table_count == 1 {
                "1 table".to_string()
            } else {
                format!("{} tables", module.table_count)
            };
            writeln!(
                &mut output,
                "{} {} -> {} ({})",
                "✓".green(),
                relative_display(&module.schema_file, &command.project_path),
                relative_display(&module.output_file, &command.project_path),
                tables
            )
            .unwrap();
        }

        writeln!(&mut output).unwrap();
        write!(
            &mut output,
            "{}",
            format!("Generated {} schema module(s).", generated.len()).bold()
        )
        .unwrap();

        output
    }
}

/// プロジェクトルートからの相対パス表示
fn relative_display(path: &Path, project_path: &Path) -> String {
    path.strip_prefix(project_path)
        .unwrap_or(path)
        .display()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_output_lists_modules() {
        colored::control::set_override(false);
        let handler = GenerateCommandHandler::new();
        let command = GenerateCommand {
            project_path: PathBuf::from("/project"),
            names: vec![],
            env: "development".to_string(),
            verbose: false,
        };
        let generated = vec![GeneratedModule {
            schema_file: PathBuf::from("/project/schema/myapp.schema"),
            output_file: PathBuf::from("/project/myapp.py"),
            table_count: 3,
        }];

        let output = handler.format_output(&command, &generated);
        assert!(output.contains("schema/myapp.schema -> myapp.py (3 tables)"));
        assert!(output.contains("Generated 1 schema module(s)."));
    }

    #[test]
    fn test_format_output_verbose_shows_environment() {
        colored::control::set_override(false);
        let handler = GenerateCommandHandler::new();
        let command = GenerateCommand {
            project_path: PathBuf::from("/project"),
            names: vec![],
            env: "staging".to_string(),
            verbose: true,
        };

        let output = handler.format_output(&command, &[]);
        assert!(output.contains("Environment: staging"));
    }

    #[test]
    fn test_relative_display_outside_project() {
        assert_eq!(
            relative_display(Path::new("/elsewhere/x.py"), Path::new("/project")),
            "/elsewhere/x.py"
        );
    }
}
