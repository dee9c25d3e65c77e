/// データベース管理モジュール
///
/// SQLiteデータベースへの接続、スキーマ作成、マイグレーションを提供します。
pub mod connection;

pub use connection::*;
