/// 認証機能のモジュール
pub mod commands;
pub mod models;
pub mod password;
pub mod repository;
pub mod service;
pub mod session;

pub use models::*;
pub use repository::*;
pub use service::*;
pub use session::*;
