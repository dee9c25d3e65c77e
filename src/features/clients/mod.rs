/// 顧客管理機能モジュール
///
/// このモジュールは、顧客管理に関連するすべての機能を提供します：
/// - 顧客の作成、読み取り、更新、論理削除
/// - 支払いステータスの導出（未入金・一部入金・全額入金）
/// - 追記専用の履歴レコード管理
/// - 次回作業予定日の照会と更新
pub mod commands;
pub mod models;
pub mod repository;

// 公開インターフェース
pub use commands::{
    create_client, delete_client, get_client, get_clients, mark_client_completed, update_client,
};

pub use models::{
    Client, ClientStatus, CreateClientDto, HistoryEntry, HistoryKind, UpdateClientDto,
};
