// アプリケーション名前付け定数
//
// アプリケーション全体で使用される名前関連の定数を一元管理します。

/// アプリケーション名
pub const APP_NAME: &str = "sagen";

/// 設定ファイル名
pub const CONFIG_FILE: &str = ".sagen.yaml";

/// バイナリ名
pub const BINARY_NAME: &str = "sagen";

/// デフォルトのスキーマ定義ディレクトリ名
pub const DEFAULT_SCHEMA_DIR: &str = "schema";

/// スキーマ定義ファイルの拡張子
pub const SCHEMA_FILE_EXTENSION: &str = "schema";
