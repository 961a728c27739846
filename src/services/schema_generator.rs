// スキーマ生成サービス
//
// プロジェクト設定の読み込みからスキーマモジュールの書き出しまでの
// 生成パイプラインを実行します。

use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::adapters::database::DatabaseConnectionService;
use crate::adapters::postgres::{PgEnumLoader, PostgresProvider};
use crate::core::config::{Config, DatabaseConfig, SchemaConfig};
use crate::core::naming::SCHEMA_FILE_EXTENSION;
use crate::core::schema::Schema;
use crate::core::symbols::{SymbolDefaults, Symbols};
use sqlx::AnyPool;

/// 生成された1モジュールの情報
#[derive(Debug, Clone)]
pub struct GeneratedModule {
    /// 入力のスキーマ定義ファイル
    pub schema_file: PathBuf,
    /// 出力されたPythonモジュール
    pub output_file: PathBuf,
    /// 描画されたテーブル数（参照を含む）
    pub table_count: usize,
}

/// スキーマ生成サービス
#[derive(Debug)]
pub struct SchemaGeneratorService;

impl SchemaGeneratorService {
    /// 新しいSchemaGeneratorServiceを作成
    pub fn new() -> Self {
        Self
    }

    /// プロジェクト設定を読み込んで検証
    pub fn load_config(&self, project_path: &Path) -> Result<Config> {
        let config_path = project_path.join(Config::DEFAULT_CONFIG_PATH);
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file '{}'", config_path.display()))?;
        let config = Config::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// 対象のスキーマ定義ファイルを列挙
    ///
    /// 名前が指定された場合はその定義ファイルだけを対象にし、存在
    /// しない名前はエラーにします。指定がなければディレクトリ内の
    /// 全ファイルを名前順で処理します。
    pub fn resolve_schema_files(
        &self,
        config: &Config,
        project_path: &Path,
        names: &[String],
    ) -> Result<Vec<PathBuf>> {
        let schema_dir = project_path.join(&config.schema_dir);
        if !names.is_empty() {
            return names
                .iter()
                .map(|name| {
                    let path = schema_dir.join(format!("{}.{}", name, SCHEMA_FILE_EXTENSION));
                    if path.is_file() {
                        Ok(path)
                    } else {
                        Err(anyhow!(
                            "Schema definition '{}' not found ('{}')",
                            name,
                            path.display()
                        ))
                    }
                })
                .collect();
        }

        let mut files: Vec<PathBuf> = fs::read_dir(&schema_dir)
            .with_context(|| {
                format!("Failed to read schema directory '{}'", schema_dir.display())
            })?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file()
                    && path.extension().and_then(|e| e.to_str()) == Some(SCHEMA_FILE_EXTENSION)
            })
            .collect();
        files.sort();
        Ok(files)
    }

    /// すべての対象についてスキーマモジュールを生成
    pub async fn generate_all(
        &self,
        project_path: &Path,
        names: &[String],
        environment: &str,
    ) -> Result<Vec<GeneratedModule>> {
        let config = self.load_config(project_path)?;
        let db_config = config.get_database_config(environment)?;
        let schema_files = self.resolve_schema_files(&config, project_path, names)?;
        if schema_files.is_empty() {
            return Err(anyhow!(
                "No schema definitions found in '{}'",
                project_path.join(&config.schema_dir).display()
            ));
        }

        let connection_service = DatabaseConnectionService::new();
        let pool = connection_service
            .create_pool(config.dialect, &db_config)
            .await
            .with_context(|| format!("Failed to connect to environment '{}'", environment))?;

        let mut generated = Vec::with_capacity(schema_files.len());
        for schema_file in &schema_files {
            let result = self
                .generate_one(&config, &db_config, &pool, project_path, schema_file)
                .await
                .with_context(|| {
                    format!("Failed to generate from '{}'", schema_file.display())
                });
            match result {
                Ok(module) => generated.push(module),
                Err(e) => {
                    pool.close().await;
                    return Err(e);
                }
            }
        }
        pool.close().await;
        Ok(generated)
    }

    /// 1つのスキーマ定義ファイルからモジュールを生成
    async fn generate_one(
        &self,
        config: &Config,
        db_config: &DatabaseConfig,
        pool: &AnyPool,
        project_path: &Path,
        schema_file: &Path,
    ) -> Result<GeneratedModule> {
        let schema_config = SchemaConfig::from_path(schema_file)?;
        let symbols = Symbols::with_overrides(&SymbolDefaults::default(), &config.symbols)?;

        let mut provider = PostgresProvider::new(pool.clone());
        let loader = PgEnumLoader::new(pool.clone());
        let mut schema = Schema::build(
            &mut provider,
            &schema_config.tables,
            &schema_config.schemas,
            symbols,
            Some(db_config.database.clone()),
            Some(&loader),
        )
        .await?;

        let stem = schema_file
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| {
                anyhow!("Invalid schema file name '{}'", schema_file.display())
            })?;
        let output_dir = project_path.join(&config.output_dir);
        fs::create_dir_all(&output_dir).with_context(|| {
            format!("Failed to create output directory '{}'", output_dir.display())
        })?;
        let output_file = output_dir.join(format!("{}.py", stem));
        let mut writer = fs::File::create(&output_file)
            .with_context(|| format!("Failed to create '{}'", output_file.display()))?;
        schema.render(&mut writer)?;

        Ok(GeneratedModule {
            schema_file: schema_file.to_path_buf(),
            output_file,
            table_count: schema.tables().len(),
        })
    }
}

impl Default for SchemaGeneratorService {
    fn default() -> Self {
        Self::new()
    }
}
