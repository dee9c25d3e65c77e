use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::errors::AppError;

/// ユーザー情報
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// ユーザーID（nanoid、21文字）
    pub id: String,
    /// メールアドレス（小文字に正規化済み）
    pub email: String,
    /// 表示名
    pub name: String,
    /// パスワードハッシュ（フロントエンドには返さない）
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// 作成日時
    pub created_at: DateTime<Utc>,
    /// 更新日時
    pub updated_at: DateTime<Utc>,
}

/// セッション情報
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// セッションID（UUID v4）
    pub id: String,
    /// ユーザーID
    pub user_id: String,
    /// 有効期限
    pub expires_at: DateTime<Utc>,
    /// 作成日時
    pub created_at: DateTime<Utc>,
}

/// セッション管理のエラー型
#[derive(Debug, Error)]
pub enum SessionError {
    /// セッションが存在しない
    #[error("セッションが見つかりません")]
    NotFound,

    /// セッションの有効期限切れ
    #[error("セッションの有効期限が切れています")]
    Expired,

    /// データベース操作の失敗
    #[error("データベースエラー: {0}")]
    DatabaseError(String),

    /// トークンの暗号化失敗
    #[error("暗号化エラー: {0}")]
    EncryptionError(String),

    /// トークンの復号化失敗
    #[error("復号化エラー: {0}")]
    DecryptionError(String),
}

impl From<rusqlite::Error> for SessionError {
    fn from(error: rusqlite::Error) -> Self {
        SessionError::DatabaseError(error.to_string())
    }
}

impl From<SessionError> for AppError {
    fn from(error: SessionError) -> Self {
        match error {
            SessionError::NotFound => {
                AppError::auth("セッションが無効です。再度ログインしてください")
            }
            SessionError::Expired => {
                AppError::auth("セッションの有効期限が切れました。再度ログインしてください")
            }
            SessionError::DatabaseError(msg) => AppError::Database(msg),
            SessionError::EncryptionError(msg) | SessionError::DecryptionError(msg) => {
                AppError::Security(msg)
            }
        }
    }
}

/// ユーザー登録リクエスト
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    /// メールアドレス
    pub email: String,
    /// パスワード（6文字以上）
    pub password: String,
    /// 表示名（省略時はデフォルト名）
    pub name: Option<String>,
}

/// ログインリクエスト
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    /// メールアドレス
    pub email: String,
    /// パスワード
    pub password: String,
}

/// 認証成功レスポンス
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    /// セッショントークン（30日間有効）
    pub token: String,
    /// ユーザー情報
    pub user: User,
}

/// フロントエンドに返す認証状態
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthState {
    /// 認証済みユーザー（未認証の場合はNone）
    pub user: Option<User>,
    /// 認証済みかどうか
    pub is_authenticated: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_serialization_hides_password_hash() {
        let user = User {
            id: "test-user-id-123456789".to_string(),
            email: "taro@example.com".to_string(),
            name: "太郎".to_string(),
            password_hash: "secret-hash".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_string(&user).unwrap();

        // パスワードハッシュがシリアライズされないことを確認
        assert!(!json.contains("secret-hash"));
        assert!(!json.contains("password_hash"));
        assert!(json.contains("taro@example.com"));
    }

    #[test]
    fn test_session_error_to_app_error() {
        let app_error: AppError = SessionError::NotFound.into();
        assert!(matches!(app_error, AppError::Auth(_)));

        let app_error: AppError = SessionError::Expired.into();
        assert!(matches!(app_error, AppError::Auth(_)));

        let app_error: AppError = SessionError::DatabaseError("接続失敗".to_string()).into();
        assert!(matches!(app_error, AppError::Database(_)));

        let app_error: AppError = SessionError::DecryptionError("改ざん".to_string()).into();
        assert!(matches!(app_error, AppError::Security(_)));
    }

    #[test]
    fn test_auth_state_default() {
        let state = AuthState::default();
        assert!(!state.is_authenticated);
        assert!(state.user.is_none());
    }
}
