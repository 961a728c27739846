// エラー型定義
//
// 生成パイプライン全体で使用されるカスタムエラー型を提供します。
// thiserrorを使用して、ReflectError と GenerateError を定義します。

use thiserror::Error;

/// リフレクションエラー
///
/// リフレクションプロバイダー（データベース側）で発生するエラーを表現します。
#[derive(Debug, Error)]
pub enum ReflectError {
    /// テーブルが見つからない
    #[error("Table not found: '{table}'")]
    NotFound {
        /// テーブル名（スキーマ修飾の可能性あり）
        table: String,
    },

    /// 未知のカラム型
    ///
    /// 型ローダーによる解決リトライの対象となる唯一のエラーです。
    #[error("Did not recognize type '{type_name}'")]
    UnrecognizedType {
        /// 型の素の名前
        type_name: String,
    },

    /// 型ローダーの失敗
    #[error("Could not load type '{type_name}': {message}")]
    TypeLoad {
        /// 型の素の名前
        type_name: String,
        /// 失敗理由
        message: String,
    },

    /// データベースエラー
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// スキーマ生成エラー
///
/// 一回の生成ランを中断させるエラーを表現します。
#[derive(Debug, Error)]
pub enum GenerateError {
    /// シンボル衝突
    #[error("Symbol conflict: {message}")]
    SymbolConflict {
        /// 衝突の内容
        message: String,
    },

    /// シンボル未登録
    #[error("Symbol not found: '{name}'")]
    SymbolNotFound {
        /// 論理名
        name: String,
    },

    /// インポート衝突
    ///
    /// 同じ論理IDに異なるインポート文が登録された場合。
    #[error("Import conflict: '{name}': '{existing}' vs. '{conflict}'")]
    ImportConflict {
        /// 論理ID
        name: String,
        /// 登録済みのインポート文
        existing: String,
        /// 衝突したインポート文
        conflict: String,
    },

    /// 型解決失敗
    #[error("Don't know how to address type '{type_name}'")]
    UnresolvedType {
        /// 解決できなかった型（module.Class形式）
        type_name: String,
    },

    /// 型ロードの循環
    ///
    /// 解決待ちスタックに同じ型名が再登場した場合。
    #[error("Cyclic type dependency while loading '{type_name}'")]
    TypeLoadCycle {
        /// 型の素の名前
        type_name: String,
    },

    /// 外部スキーマのモジュールパス不正
    #[error("Schema module path '{path}' must be dotted (package.module)")]
    SchemaModulePath {
        /// 不正なモジュールパス
        path: String,
    },

    /// 内部不変条件の違反（正しい入力では到達しない）
    #[error("Internal invariant violated: {message}")]
    AssertionFailure {
        /// 違反の内容
        message: String,
    },

    /// リフレクションエラーのパススルー
    #[error(transparent)]
    Reflect(#[from] ReflectError),

    /// I/Oエラーのパススルー
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
