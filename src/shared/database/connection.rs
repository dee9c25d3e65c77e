use crate::shared::config::{get_database_filename, get_environment};
use crate::shared::errors::{AppError, AppResult};
use rusqlite::Connection;
use std::path::PathBuf;
use tauri::{AppHandle, Manager};

/// データベース接続を初期化し、マイグレーションを実行する
///
/// # 引数
/// * `app_handle` - Tauriアプリケーションハンドル
///
/// # 戻り値
/// データベース接続、または失敗時はエラー
///
/// # 処理内容
/// 1. アプリケーションデータディレクトリの確保
/// 2. データベースファイルパスの決定
/// 3. データベース接続の開設
/// 4. テーブル作成とマイグレーションの実行
pub fn initialize_database(app_handle: &AppHandle) -> AppResult<Connection> {
    // データベースファイルパスを取得
    let database_path = get_database_path(app_handle)?;

    // データベース接続を開く
    let conn = Connection::open(&database_path)?;

    // テーブルを作成
    create_tables(&conn)?;

    log::info!("データベースを初期化しました: {database_path:?}");

    Ok(conn)
}

/// アプリデータディレクトリ内のデータベースファイルパスを取得する
///
/// # 引数
/// * `app_handle` - Tauriアプリケーションハンドル
///
/// # 戻り値
/// データベースファイルのパス、または失敗時はエラー
pub fn get_database_path(app_handle: &AppHandle) -> AppResult<PathBuf> {
    // アプリケーションデータディレクトリを取得
    let app_data_dir = app_handle.path().app_data_dir().map_err(|e| {
        AppError::configuration(format!("アプリデータディレクトリの取得に失敗: {e}"))
    })?;

    // ディレクトリが存在しない場合は作成
    if !app_data_dir.exists() {
        std::fs::create_dir_all(&app_data_dir).map_err(|e| {
            AppError::configuration(format!("アプリデータディレクトリの作成に失敗: {e}"))
        })?;
        log::info!("アプリケーションデータディレクトリを作成: {app_data_dir:?}");
    }

    // 環境に応じたデータベースファイル名を決定
    let db_filename = get_database_filename(get_environment());
    let database_path = app_data_dir.join(db_filename);

    Ok(database_path)
}

/// インメモリデータベース接続を作成する（テスト用）
///
/// # 戻り値
/// テーブル作成済みのインメモリ接続、または失敗時はエラー
pub fn create_in_memory_connection() -> AppResult<Connection> {
    let conn = Connection::open_in_memory()?;
    create_tables(&conn)?;
    Ok(conn)
}

/// データベーステーブルを作成する
///
/// # 引数
/// * `conn` - データベース接続
///
/// # 戻り値
/// 成功時はOk(())、失敗時はエラー
pub fn create_tables(conn: &Connection) -> AppResult<()> {
    // 既存のテーブル構造をチェック
    let table_exists: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='clients'",
        [],
        |row| row.get(0),
    )?;

    if table_exists == 0 {
        // 新規インストール: 最新のスキーマでテーブルを作成
        create_clients_table(conn)?;
        log::info!("新規データベースを作成しました");
    } else {
        // 既存インストール: 必要なカラムを安全に追加
        log::info!("既存のデータベースを確認中...");
        migrate_existing_tables(conn)?;
    }

    // その他のテーブルを作成
    create_client_history_table(conn)?;
    create_payments_table(conn)?;
    create_users_table(conn)?;
    create_sessions_table(conn)?;

    // インデックスを作成
    create_indexes(conn)?;

    Ok(())
}

/// 顧客テーブルを作成する
fn create_clients_table(conn: &Connection) -> AppResult<()> {
    conn.execute(
        "CREATE TABLE clients (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            name TEXT NOT NULL,
            mobile TEXT,
            address TEXT,
            work_description TEXT,
            work_date TEXT NOT NULL,
            next_work_date TEXT,
            reminder_time TEXT NOT NULL DEFAULT '09:00',
            repeat_after_days INTEGER NOT NULL DEFAULT 0,
            total_amount REAL NOT NULL DEFAULT 0,
            received_amount REAL NOT NULL DEFAULT 0,
            remaining_amount REAL NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'Pending'
                CHECK(status IN ('Pending', 'Partial', 'Completed')),
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

/// 既存テーブルのマイグレーションを実行する
///
/// 繰り返しサイクル機能より前のバージョンで作成されたデータベースには
/// reminder_time / repeat_after_days カラムが存在しない。
fn migrate_existing_tables(conn: &Connection) -> AppResult<()> {
    if !check_column_exists(conn, "clients", "reminder_time") {
        log::info!("reminder_timeカラムを追加します...");
        let _ = conn.execute(
            "ALTER TABLE clients ADD COLUMN reminder_time TEXT NOT NULL DEFAULT '09:00'",
            [],
        );
    }

    if !check_column_exists(conn, "clients", "repeat_after_days") {
        log::info!("repeat_after_daysカラムを追加します...");
        let _ = conn.execute(
            "ALTER TABLE clients ADD COLUMN repeat_after_days INTEGER NOT NULL DEFAULT 0",
            [],
        );
    }

    Ok(())
}

/// 顧客履歴テーブルを作成する
///
/// 履歴は追記専用で、rowid順がそのまま記録順になる。
fn create_client_history_table(conn: &Connection) -> AppResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS client_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            client_id INTEGER NOT NULL,
            date TEXT NOT NULL,
            kind TEXT NOT NULL CHECK(kind IN ('Work', 'Payment', 'Cycle')),
            amount REAL NOT NULL DEFAULT 0,
            status TEXT NOT NULL,
            description TEXT
        )",
        [],
    )?;

    Ok(())
}

/// 支払いテーブルを作成する
///
/// 支払いは追記専用で、更新・削除は行わない。
fn create_payments_table(conn: &Connection) -> AppResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS payments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            client_id INTEGER NOT NULL,
            amount REAL NOT NULL,
            payment_date TEXT NOT NULL,
            notes TEXT,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

/// ユーザーテーブルを作成する
fn create_users_table(conn: &Connection) -> AppResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

/// セッションテーブルを作成する
fn create_sessions_table(conn: &Connection) -> AppResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            created_at TEXT NOT NULL,
            expires_at TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

/// インデックスを作成する
fn create_indexes(conn: &Connection) -> AppResult<()> {
    // 顧客テーブルのインデックス
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_clients_user ON clients(user_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_clients_next_work_date ON clients(next_work_date)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_clients_active ON clients(is_active)",
        [],
    )?;

    // 履歴テーブルのインデックス
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_client_history_client ON client_history(client_id)",
        [],
    )?;

    // 支払いテーブルのインデックス
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_payments_client ON payments(client_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_payments_user ON payments(user_id)",
        [],
    )?;

    // セッションテーブルのインデックス
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at)",
        [],
    )?;

    Ok(())
}

/// テーブルに指定されたカラムが存在するかチェックする
///
/// # 引数
/// * `conn` - データベース接続
/// * `table_name` - テーブル名
/// * `column_name` - カラム名
///
/// # 戻り値
/// カラムが存在する場合はtrue、存在しないかエラーの場合はfalse
fn check_column_exists(conn: &Connection, table_name: &str, column_name: &str) -> bool {
    let query = format!("PRAGMA table_info({table_name})");

    match conn.prepare(&query) {
        Ok(mut stmt) => {
            match stmt.query_map([], |row| {
                let col_name: String = row.get(1)?;
                Ok(col_name)
            }) {
                Ok(rows) => {
                    for col_name in rows.flatten() {
                        if col_name == column_name {
                            return true;
                        }
                    }
                    false
                }
                Err(_) => false,
            }
        }
        Err(_) => false,
    }
}
