use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Asia::Tokyo;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::features::auth::models::{Session, SessionError};

/// セッションの有効期間（日）
const SESSION_DURATION_DAYS: i64 = 30;

/// ノンス長（バイト）。AES-GCMの96ビットノンス
const NONCE_LENGTH: usize = 12;

/// セッション管理
///
/// セッションの作成・検証・無効化と、
/// セッションIDのAES-256-GCMによるトークン化を提供する
#[derive(Clone)]
pub struct SessionManager {
    /// データベース接続
    db_connection: Arc<Mutex<Connection>>,
    /// トークン暗号化キー
    encryption_key: [u8; 32],
}

impl SessionManager {
    /// 新しいSessionManagerインスタンスを作成する
    ///
    /// # 引数
    /// * `db_connection` - データベース接続
    /// * `encryption_key` - トークン暗号化キー（32バイト）
    ///
    /// # 戻り値
    /// SessionManagerインスタンス
    pub fn new(db_connection: Arc<Mutex<Connection>>, encryption_key: [u8; 32]) -> Self {
        Self {
            db_connection,
            encryption_key,
        }
    }

    /// 新しいセッションを作成し、暗号化トークンを返す
    ///
    /// # 引数
    /// * `user_id` - ユーザーID（nanoId形式）
    ///
    /// # 戻り値
    /// 暗号化されたセッショントークン、失敗時はエラー
    pub fn create_session(&self, user_id: &str) -> Result<String, SessionError> {
        let session_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let expires_at = now + Duration::days(SESSION_DURATION_DAYS);

        // タイムスタンプはJSTのRFC3339形式で保存
        let created_at_str = now.with_timezone(&Tokyo).to_rfc3339();
        let expires_at_str = expires_at.with_timezone(&Tokyo).to_rfc3339();

        {
            let conn = self
                .db_connection
                .lock()
                .map_err(|e| SessionError::DatabaseError(format!("ロック取得失敗: {e}")))?;

            conn.execute(
                "INSERT INTO sessions (id, user_id, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![session_id, user_id, created_at_str, expires_at_str],
            )?;
        }

        // セッションIDを暗号化してトークン化
        self.encrypt_session_id(&session_id)
    }

    /// トークンを検証し、有効なセッションを返す
    ///
    /// # 引数
    /// * `token` - 暗号化されたセッショントークン
    ///
    /// # 戻り値
    /// セッション情報、無効・期限切れの場合はエラー
    ///
    /// # 処理内容
    /// 1. トークンを復号してセッションIDを取得
    /// 2. セッションをデータベースから検索
    /// 3. 有効期限をチェック（期限切れの場合はセッションを削除）
    pub fn validate_session(&self, token: &str) -> Result<Session, SessionError> {
        let session_id = self.decrypt_token(token)?;

        let conn = self
            .db_connection
            .lock()
            .map_err(|e| SessionError::DatabaseError(format!("ロック取得失敗: {e}")))?;

        let mut stmt = conn.prepare(
            "SELECT id, user_id, created_at, expires_at
             FROM sessions
             WHERE id = ?1",
        )?;

        let mut session_iter = stmt.query_map(params![session_id], |row| {
            let id: String = row.get(0)?;
            let user_id: String = row.get(1)?;
            let created_at_str: String = row.get(2)?;
            let expires_at_str: String = row.get(3)?;
            Ok((id, user_id, created_at_str, expires_at_str))
        })?;

        let (id, user_id, created_at_str, expires_at_str) = match session_iter.next() {
            Some(row) => row?,
            None => return Err(SessionError::NotFound),
        };

        let created_at = parse_timestamp(&created_at_str)?;
        let expires_at = parse_timestamp(&expires_at_str)?;

        // 有効期限チェック
        if expires_at < Utc::now() {
            // 期限切れセッションは削除する
            conn.execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
            return Err(SessionError::Expired);
        }

        Ok(Session {
            id,
            user_id,
            expires_at,
            created_at,
        })
    }

    /// トークンに対応するセッションを無効化する
    ///
    /// # 引数
    /// * `token` - 暗号化されたセッショントークン
    ///
    /// # 戻り値
    /// 成功時はOk(())、失敗時はエラー
    pub fn invalidate_token(&self, token: &str) -> Result<(), SessionError> {
        let session_id = self.decrypt_token(token)?;

        let conn = self
            .db_connection
            .lock()
            .map_err(|e| SessionError::DatabaseError(format!("ロック取得失敗: {e}")))?;

        conn.execute("DELETE FROM sessions WHERE id = ?1", params![session_id])?;

        Ok(())
    }

    /// 指定ユーザーのすべてのセッションを無効化する
    ///
    /// # 引数
    /// * `user_id` - ユーザーID
    ///
    /// # 戻り値
    /// 削除されたセッション数、失敗時はエラー
    pub fn invalidate_user_sessions(&self, user_id: &str) -> Result<usize, SessionError> {
        let conn = self
            .db_connection
            .lock()
            .map_err(|e| SessionError::DatabaseError(format!("ロック取得失敗: {e}")))?;

        let deleted = conn.execute("DELETE FROM sessions WHERE user_id = ?1", params![user_id])?;

        Ok(deleted)
    }

    /// 期限切れセッションを削除する
    ///
    /// # 戻り値
    /// 削除されたセッション数、失敗時はエラー
    pub fn cleanup_expired_sessions(&self) -> Result<usize, SessionError> {
        let conn = self
            .db_connection
            .lock()
            .map_err(|e| SessionError::DatabaseError(format!("ロック取得失敗: {e}")))?;

        // RFC3339文字列の比較では期限切れを正しく判定できないため、
        // 全セッションを取得して日時として比較する
        let mut stmt = conn.prepare("SELECT id, expires_at FROM sessions")?;
        let session_iter = stmt.query_map([], |row| {
            let id: String = row.get(0)?;
            let expires_at: String = row.get(1)?;
            Ok((id, expires_at))
        })?;

        let now = Utc::now();
        let mut expired_ids = Vec::new();
        for session in session_iter {
            let (id, expires_at_str) = session?;
            if let Ok(expires_at) = parse_timestamp(&expires_at_str) {
                if expires_at < now {
                    expired_ids.push(id);
                }
            }
        }
        drop(stmt);

        let mut deleted = 0;
        for id in &expired_ids {
            deleted += conn.execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
        }

        Ok(deleted)
    }

    /// セッションIDをAES-256-GCMで暗号化し、base64トークンを生成する
    ///
    /// トークン形式: base64(ノンス12バイト || 暗号文)
    fn encrypt_session_id(&self, session_id: &str) -> Result<String, SessionError> {
        let key = Key::<Aes256Gcm>::from_slice(&self.encryption_key);
        let cipher = Aes256Gcm::new(key);

        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, session_id.as_bytes())
            .map_err(|e| SessionError::EncryptionError(format!("暗号化失敗: {e}")))?;

        let mut combined = nonce.to_vec();
        combined.extend_from_slice(&ciphertext);

        Ok(general_purpose::STANDARD.encode(combined))
    }

    /// トークンを復号してセッションIDを取り出す
    fn decrypt_token(&self, token: &str) -> Result<String, SessionError> {
        let data = general_purpose::STANDARD
            .decode(token)
            .map_err(|e| SessionError::DecryptionError(format!("base64デコード失敗: {e}")))?;

        if data.len() <= NONCE_LENGTH {
            return Err(SessionError::DecryptionError(
                "トークンが短すぎます".to_string(),
            ));
        }

        let (nonce_bytes, ciphertext) = data.split_at(NONCE_LENGTH);
        let key = Key::<Aes256Gcm>::from_slice(&self.encryption_key);
        let cipher = Aes256Gcm::new(key);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| SessionError::DecryptionError(format!("復号失敗: {e}")))?;

        String::from_utf8(plaintext)
            .map_err(|e| SessionError::DecryptionError(format!("不正なUTF-8: {e}")))
    }
}

/// RFC3339形式のタイムスタンプをUTCに変換する
fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, SessionError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SessionError::DatabaseError(format!("タイムスタンプの解析失敗: {e}")))
}
