// 機能モジュール構造
pub mod features;
pub mod shared;

// 機能モジュールからコマンドをインポート
use features::auth::service::AuthService;
use features::reminders::scheduler::SchedulerHandle;
use features::{
    auth::commands as auth_commands, clients::commands as client_commands,
    payments::commands as payment_commands, reminders::commands as reminder_commands,
};
use log::info;
use rusqlite::Connection;
use shared::config::environment::{
    get_session_encryption_key, initialize_logging_system, load_environment_variables,
};
use std::sync::{Arc, Mutex};
use tauri::Manager;

/// アプリケーション状態（共有データベース接続を保持）
pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .setup(|app| {
            // 環境に応じた.envファイルを読み込み（ログシステム初期化前に実行）
            load_environment_variables();

            // ログシステムを初期化（.envファイル読み込み後）
            initialize_logging_system();

            info!("アプリケーション初期化を開始します...");

            // データベースを初期化（スキーマ作成含む）
            let db_conn = match shared::database::connection::initialize_database(app.handle()) {
                Ok(conn) => conn,
                Err(e) => {
                    eprintln!("データベース初期化失敗: {e}");
                    return Err(format!("データベース初期化失敗: {e}").into());
                }
            };

            // 全機能で共有するデータベース接続
            let db_connection = Arc::new(Mutex::new(db_conn));

            // 認証サービスを初期化（セッショントークンの暗号化鍵付き）
            let auth_service =
                AuthService::new(Arc::clone(&db_connection), get_session_encryption_key());
            app.manage(auth_service);

            // リマインダースケジューラーの置き場（開始はログイン後のコマンドで行う）
            app.manage(SchedulerHandle::default());

            app.manage(AppState { db: db_connection });

            info!("アプリケーション初期化が完了しました");

            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            // 認証コマンド
            auth_commands::register,
            auth_commands::login,
            auth_commands::logout,
            auth_commands::validate_session,
            auth_commands::cleanup_expired_sessions,
            // 顧客コマンド
            client_commands::get_clients,
            client_commands::get_client,
            client_commands::create_client,
            client_commands::update_client,
            client_commands::delete_client,
            client_commands::mark_client_completed,
            // 入金コマンド
            payment_commands::record_payment,
            payment_commands::complete_cycle,
            payment_commands::get_client_payments,
            // リマインダーコマンド
            reminder_commands::start_reminder_scheduler,
            reminder_commands::stop_reminder_scheduler,
            reminder_commands::get_reminder_stats,
            reminder_commands::get_upcoming_reminders,
        ])
        .run(tauri::generate_context!())
        .expect("Tauriアプリケーションの実行中にエラーが発生しました");
}
