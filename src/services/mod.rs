// Services Layer
// 生成パイプラインを実行するサービス層

pub mod schema_generator;
