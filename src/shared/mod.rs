/// 共有モジュール
///
/// アプリケーション全体で使用される共通機能（設定、データベース、
/// エラー型、ユーティリティ）を提供します。
pub mod config;
pub mod database;
pub mod errors;
pub mod utils;
