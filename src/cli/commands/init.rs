// initコマンドハンドラー
//
// プロジェクトの初期化処理を実装します。
// - ディレクトリ構造の作成（schema/, sagen/）
// - デフォルト設定ファイルの生成（.sagen.yaml）
// - 制約宣言ヘルパー（sagen/constraints.py）の配置
// - 初期化済みプロジェクトの検出と警告

use crate::core::config::{Config, DatabaseConfig, Dialect, SchemaConfig};
use crate::core::naming::SCHEMA_FILE_EXTENSION;
use anyhow::{anyhow, Context, Result};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

/// 生成モジュールが参照する制約宣言ヘルパー
///
/// 生成されたPythonモジュールは `from sagen.constraints import ...`
/// でこの内容を読み込みます。
const CONSTRAINTS_PY: &str = r#"# -*- coding: ascii -*-
"""
Constraint declarators.

Helper functions used by the generated schema modules to attach
constraints to their tables.
"""

import sqlalchemy as _sa


def Unique(*columns, **kwargs):
    """Append a unique constraint to the columns' table."""
    columns[0].table.append_constraint(
        _sa.UniqueConstraint(*columns, **kwargs)
    )


def PrimaryKey(*columns, **kwargs):
    """Append a primary key constraint to the columns' table."""
    columns[0].table.append_constraint(
        _sa.PrimaryKeyConstraint(*columns, **kwargs)
    )


def ForeignKey(columns, refcolumns, **kwargs):
    """Append a foreign key constraint to the columns' table."""
    columns[0].table.append_constraint(
        _sa.ForeignKeyConstraint(
            [col.name for col in columns],
            refcolumns,
            link_to_name=True,
            **kwargs
        )
    )
"#;

/// initコマンドの入力パラメータ
#[derive(Debug, Clone)]
pub struct InitCommand {
    /// プロジェクトのルートパス
    pub project_path: PathBuf,
    /// データベース方言
    pub dialect: Dialect,
    /// 強制的に初期化（既存の設定を上書き）
    pub force: bool,
    /// データベース名
    pub database_name: String,
}

/// initコマンドハンドラー
#[derive(Debug, Default)]
pub struct InitCommandHandler {}

impl InitCommandHandler {
    /// 新しいInitCommandHandlerを作成
    pub fn new() -> Self {
        Self {}
    }

    /// initコマンドを実行
    pub fn execute(&self, command: &InitCommand) -> Result<()> {
        // 初期化済みチェック
        if self.is_already_initialized(&command.project_path) && !command.force {
            return Err(anyhow!(
                "Project is already initialized. Use --force option to force re-initialization."
            ));
        }

        // ディレクトリ構造を作成
        self.create_directory_structure(&command.project_path)?;

        // 設定ファイルを生成
        self.generate_config_file(
            &command.project_path,
            command.dialect,
            &command.database_name,
        )?;

        // 雛形のスキーマ定義ファイルを生成
        self.generate_example_schema(&command.project_path, &command.database_name)?;

        // 制約宣言ヘルパーを配置
        self.generate_constraints_package(&command.project_path)?;

        // .gitignoreに設定ファイルが含まれていない場合は警告
        self.warn_gitignore(&command.project_path);

        Ok(())
    }

    /// プロジェクトが既に初期化されているかチェック
    pub fn is_already_initialized(&self, project_path: &Path) -> bool {
        let config_path = project_path.join(Config::DEFAULT_CONFIG_PATH);
        config_path.exists()
    }

    /// ディレクトリ構造を作成
    pub fn create_directory_structure(&self, project_path: &Path) -> Result<()> {
        // schema/ディレクトリを作成
        let schema_dir = project_path.join("schema");
        fs::create_dir_all(&schema_dir)
            .with_context(|| format!("Failed to create schema/ directory: {:?}", schema_dir))?;

        // sagen/パッケージディレクトリを作成
        let package_dir = project_path.join("sagen");
        fs::create_dir_all(&package_dir)
            .with_context(|| format!("Failed to create sagen/ directory: {:?}", package_dir))?;

        Ok(())
    }

    /// 設定ファイルを生成
    pub fn generate_config_file(
        &self,
        project_path: &Path,
        dialect: Dialect,
        database_name: &str,
    ) -> Result<()> {
        // 開発環境のデータベース設定を作成
        let db_config = DatabaseConfig {
            host: "localhost".to_string(),
            port: 5432,
            database: database_name.to_string(),
            user: None,
            password: None,
            timeout: Some(30),
        };

        let mut environments = HashMap::new();
        environments.insert("development".to_string(), db_config);

        let config = Config {
            version: "1.0".to_string(),
            dialect,
            schema_dir: PathBuf::from("schema"),
            output_dir: PathBuf::from("."),
            environments,
            symbols: BTreeMap::new(),
        };

        // YAMLにシリアライズしてファイルに書き込み
        let yaml = serde_saphyr::to_string(&config)
            .with_context(|| "Failed to serialize config file")?;
        let config_path = project_path.join(Config::DEFAULT_CONFIG_PATH);
        fs::write(&config_path, yaml)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        Ok(())
    }

    /// 雛形のスキーマ定義ファイルを生成
    ///
    /// 既に存在する場合は上書きしません。
    pub fn generate_example_schema(&self, project_path: &Path, database_name: &str) -> Result<()> {
        let schema_path = project_path
            .join("schema")
            .join(format!("{}.{}", database_name, SCHEMA_FILE_EXTENSION));
        if schema_path.exists() {
            return Ok(());
        }

        let schema_config = SchemaConfig::new(Vec::new(), BTreeMap::new());
        let mut file = fs::File::create(&schema_path)
            .with_context(|| format!("Failed to create schema file: {:?}", schema_path))?;
        schema_config
            .dump(&mut file)
            .with_context(|| format!("Failed to write schema file: {:?}", schema_path))?;

        Ok(())
    }

    /// 制約宣言ヘルパーのPythonパッケージを配置
    pub fn generate_constraints_package(&self, project_path: &Path) -> Result<()> {
        let package_dir = project_path.join("sagen");

        let init_path = package_dir.join("__init__.py");
        if !init_path.exists() {
            fs::write(&init_path, "")
                .with_context(|| format!("Failed to write file: {:?}", init_path))?;
        }

        let constraints_path = package_dir.join("constraints.py");
        fs::write(&constraints_path, CONSTRAINTS_PY)
            .with_context(|| format!("Failed to write file: {:?}", constraints_path))?;

        Ok(())
    }

    /// .gitignoreに設定ファイルが含まれているかチェックし、警告を出力
    fn warn_gitignore(&self, project_path: &Path) {
        let config_file_name = Config::DEFAULT_CONFIG_PATH;
        let gitignore_path = project_path.join(".gitignore");

        if gitignore_path.exists() {
            if let Ok(content) = fs::read_to_string(&gitignore_path) {
                if content.lines().any(|line| {
                    let trimmed = line.trim();
                    trimmed == config_file_name || trimmed == format!("/{}", config_file_name)
                }) {
                    return; // 既に含まれている
                }
            }
        }

        eprintln!(
            "Warning: '{}' is not listed in .gitignore. The config file may contain sensitive information (e.g., database passwords). Consider adding '{}' to your .gitignore file.",
            config_file_name, config_file_name
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use tempfile::TempDir;

    fn command(project_path: &Path) -> InitCommand {
        InitCommand {
            project_path: project_path.to_path_buf(),
            dialect: Dialect::PostgreSQL,
            force: false,
            database_name: "myapp".to_string(),
        }
    }

    #[test]
    fn test_new_handler() {
        let handler = InitCommandHandler::new();
        assert!(format!("{:?}", handler).contains("InitCommandHandler"));
    }

    #[test]
    fn test_is_already_initialized() {
        let temp_dir = TempDir::new().unwrap();
        let project_path = temp_dir.path();

        let handler = InitCommandHandler::new();
        assert!(!handler.is_already_initialized(project_path));

        // 設定ファイルを作成
        fs::write(
            project_path.join(Config::DEFAULT_CONFIG_PATH),
            "version: 1.0\n",
        )
        .unwrap();

        assert!(handler.is_already_initialized(project_path));
    }

    #[test]
    fn test_execute_creates_project_layout() {
        let temp_dir = TempDir::new().unwrap();
        let project_path = temp_dir.path();

        let handler = InitCommandHandler::new();
        handler.execute(&command(project_path)).unwrap();

        assert!(project_path.join(".sagen.yaml").exists());
        assert!(project_path.join("schema").is_dir());
        assert!(project_path.join("schema/myapp.schema").exists());
        assert!(project_path.join("sagen/__init__.py").exists());
        assert!(project_path.join("sagen/constraints.py").exists());
    }

    #[test]
    fn test_execute_refuses_reinit_without_force() {
        let temp_dir = TempDir::new().unwrap();
        let project_path = temp_dir.path();

        let handler = InitCommandHandler::new();
        handler.execute(&command(project_path)).unwrap();

        let result = handler.execute(&command(project_path));
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("--force"));
    }

    #[test]
    fn test_execute_force_reinitializes() {
        let temp_dir = TempDir::new().unwrap();
        let project_path = temp_dir.path();

        let handler = InitCommandHandler::new();
        handler.execute(&command(project_path)).unwrap();

        let mut forced = command(project_path);
        forced.force = true;
        handler.execute(&forced).unwrap();
    }

    #[test]
    fn test_generated_config_is_valid() {
        let temp_dir = TempDir::new().unwrap();
        let project_path = temp_dir.path();

        let handler = InitCommandHandler::new();
        handler.execute(&command(project_path)).unwrap();

        let content = fs::read_to_string(project_path.join(".sagen.yaml")).unwrap();
        let config = Config::from_str(&content).unwrap();
        config.validate().unwrap();
        assert_eq!(config.dialect, Dialect::PostgreSQL);
        let db = config.get_database_config("development").unwrap();
        assert_eq!(db.database, "myapp");
    }

    #[test]
    fn test_example_schema_not_overwritten() {
        let temp_dir = TempDir::new().unwrap();
        let project_path = temp_dir.path();

        let handler = InitCommandHandler::new();
        handler.create_directory_structure(project_path).unwrap();
        fs::write(project_path.join("schema/myapp.schema"), "users\n").unwrap();

        handler
            .generate_example_schema(project_path, "myapp")
            .unwrap();
        let content = fs::read_to_string(project_path.join("schema/myapp.schema")).unwrap();
        assert_eq!(content, "users\n");
    }

    #[test]
    fn test_constraints_module_mentions_declarators() {
        let temp_dir = TempDir::new().unwrap();
        let project_path = temp_dir.path();

        let handler = InitCommandHandler::new();
        handler.execute(&command(project_path)).unwrap();

        let content = fs::read_to_string(project_path.join("sagen/constraints.py")).unwrap();
        assert!(content.contains("def Unique("));
        assert!(content.contains("def PrimaryKey("));
        assert!(content.contains("def ForeignKey("));
        assert!(content.contains("link_to_name=True"));
    }
}
