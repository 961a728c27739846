// Core Domain
// シンボル管理、型解決、テーブル・制約の描画、依存グラフ処理の純粋なロジック

pub mod column;
pub mod config;
pub mod constraint;
pub mod error;
pub mod graph;
pub mod naming;
pub mod pysyntax;
pub mod reflect;
pub mod schema;
pub mod symbols;
pub mod table;
pub mod template;
pub mod types;
