// Adapters
// データベースへのアクセスを抽象化

pub mod database;
pub mod postgres;
