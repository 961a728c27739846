// Sagenライブラリのエントリーポイント
//
// モジュール構造:
// - cli: CLIレイヤー（ユーザー入力の受付とコマンドルーティング）
// - core: コアドメインロジック（シンボル管理、型解決、テーブル・制約の描画、モジュール出力）
// - adapters: データベースへのアクセスを抽象化
// - services: 生成パイプラインを実行するサービス層

pub mod cli;
pub mod core;
pub mod adapters;
pub mod services;
