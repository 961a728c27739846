// データベース接続アダプター
//
// SQLxを使用したデータベース接続の管理を行います。リフレクションに
// 必要な読み取り専用の接続プールを提供します。

use crate::core::config::{DatabaseConfig, Dialect};
use crate::core::error::ReflectError;
use sqlx::pool::PoolOptions;
use sqlx::{Any, AnyPool};
use std::time::Duration;

/// データベース接続サービス
///
/// データベース接続プールの初期化と管理を行います。
#[derive(Debug, Clone, Default)]
pub struct DatabaseConnectionService {
    // 将来的な拡張のためのフィールドを予約
}

impl DatabaseConnectionService {
    /// 新しいDatabaseConnectionServiceを作成
    pub fn new() -> Self {
        Self {}
    }

    /// データベース接続文字列を構築
    pub fn build_connection_string(&self, dialect: Dialect, config: &DatabaseConfig) -> String {
        config.to_connection_string(dialect)
    }

    /// データベース接続プールを作成
    pub async fn create_pool(
        &self,
        dialect: Dialect,
        config: &DatabaseConfig,
    ) -> Result<AnyPool, ReflectError> {
        let connection_string = self.build_connection_string(dialect, config);
        let pool_options = self.create_pool_options(config.timeout);

        Ok(pool_options.connect(&connection_string).await?)
    }

    /// 接続テストを実行
    pub async fn test_connection(&self, pool: &AnyPool) -> Result<(), ReflectError> {
        // シンプルなクエリで接続をテスト
        sqlx::query("SELECT 1").execute(pool).await?;
        Ok(())
    }

    /// プールオプションを作成
    pub fn create_pool_options(&self, timeout_secs: Option<u64>) -> PoolOptions<Any> {
        PoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(timeout_secs.unwrap_or(30)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_connection_string() {
        let service = DatabaseConnectionService::new();
        let config = DatabaseConfig {
            host: "localhost".to_string(),
            port: 5432,
            database: "myapp".to_string(),
            user: Some("svc".to_string()),
            password: None,
            timeout: None,
        };
        assert_eq!(
            service.build_connection_string(Dialect::PostgreSQL, &config),
            "postgresql://svc@localhost:5432/myapp"
        );
    }
}
