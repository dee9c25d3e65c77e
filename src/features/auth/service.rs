use rusqlite::Connection;
use std::sync::{Arc, Mutex};

use crate::features::auth::models::{AuthResponse, LoginRequest, RegisterRequest, User};
use crate::features::auth::password::{hash_password, validate_password, verify_password};
use crate::features::auth::repository::UserRepository;
use crate::features::auth::session::SessionManager;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::normalize_string;

/// 未指定時のデフォルト表示名
const DEFAULT_USER_NAME: &str = "オーナー";

/// メールアドレスとパスワードによる認証サービス
///
/// ユーザー登録・ログイン・セッション検証・ログアウトを提供する。
/// 認証情報はすべてローカルデータベースで管理する。
#[derive(Clone)]
pub struct AuthService {
    /// ユーザーリポジトリ
    repository: UserRepository,
    /// セッション管理
    session_manager: SessionManager,
}

impl AuthService {
    /// 新しいAuthServiceを作成する
    ///
    /// # 引数
    /// * `db_connection` - データベース接続
    /// * `encryption_key` - セッショントークン暗号化キー（32バイト）
    ///
    /// # 戻り値
    /// AuthServiceインスタンス
    pub fn new(db_connection: Arc<Mutex<Connection>>, encryption_key: [u8; 32]) -> Self {
        let repository = UserRepository::new(Arc::clone(&db_connection));
        let session_manager = SessionManager::new(db_connection, encryption_key);

        Self {
            repository,
            session_manager,
        }
    }

    /// 新規ユーザーを登録し、セッションを開始する
    ///
    /// # 引数
    /// * `request` - 登録リクエスト
    ///
    /// # 戻り値
    /// セッショントークンとユーザー情報、失敗時はエラー
    ///
    /// # 処理内容
    /// 1. メールアドレスの正規化（小文字化・前後空白除去）
    /// 2. 入力値の検証
    /// 3. 重複チェック
    /// 4. パスワードのハッシュ化とユーザー作成
    /// 5. セッション作成
    pub async fn register(&self, request: RegisterRequest) -> AppResult<AuthResponse> {
        let email = normalize_email(&request.email);

        validate_email(&email)?;
        validate_password(&request.password)?;

        // 重複チェック
        if self.repository.find_by_email(&email).await?.is_some() {
            return Err(AppError::validation(
                "このメールアドレスは既に登録されています",
            ));
        }

        // 表示名が未指定または空の場合はデフォルト名を使用
        let name = request
            .name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_USER_NAME);

        let password_hash = hash_password(&request.password)?;
        let user = self
            .repository
            .create_user(&email, name, &password_hash)
            .await?;

        let token = self.session_manager.create_session(&user.id)?;

        log::info!("新規ユーザーを登録しました: user_id={}", user.id);

        Ok(AuthResponse { token, user })
    }

    /// ログインし、セッションを開始する
    ///
    /// # 引数
    /// * `request` - ログインリクエスト
    ///
    /// # 戻り値
    /// セッショントークンとユーザー情報、失敗時はエラー
    ///
    /// # 注意
    /// メールアドレス不明とパスワード不一致は同じエラーメッセージを返す
    pub async fn login(&self, request: LoginRequest) -> AppResult<AuthResponse> {
        let email = normalize_email(&request.email);

        let user = match self.repository.find_by_email(&email).await? {
            Some(user) => user,
            None => return Err(invalid_credentials()),
        };

        if !verify_password(&request.password, &user.password_hash)? {
            return Err(invalid_credentials());
        }

        let token = self.session_manager.create_session(&user.id)?;

        log::info!("ログインしました: user_id={}", user.id);

        Ok(AuthResponse { token, user })
    }

    /// セッショントークンを検証し、ユーザー情報を返す
    ///
    /// # 引数
    /// * `token` - セッショントークン
    ///
    /// # 戻り値
    /// 認証されたユーザー情報、無効な場合はエラー
    pub async fn validate_token(&self, token: &str) -> AppResult<User> {
        let session = self.session_manager.validate_session(token)?;

        let user = self
            .repository
            .find_by_id(&session.user_id)
            .await?
            .ok_or_else(|| AppError::auth("ユーザーが見つかりません"))?;

        log::debug!("セッションを検証しました: user_id={}", user.id);

        Ok(user)
    }

    /// ログアウトする（セッションを無効化）
    ///
    /// # 引数
    /// * `token` - セッショントークン
    ///
    /// # 戻り値
    /// 成功時はOk(())、失敗時はエラー
    pub async fn logout(&self, token: &str) -> AppResult<()> {
        self.session_manager.invalidate_token(token)?;

        log::info!("ログアウトしました");

        Ok(())
    }

    /// 期限切れセッションを削除する
    ///
    /// # 戻り値
    /// 削除されたセッション数、失敗時はエラー
    pub async fn cleanup_expired_sessions(&self) -> AppResult<usize> {
        let deleted = self.session_manager.cleanup_expired_sessions()?;

        if deleted > 0 {
            log::info!("期限切れセッションを削除しました: {deleted}件");
        }

        Ok(deleted)
    }
}

/// メールアドレスを正規化する（前後空白除去・小文字化）
fn normalize_email(email: &str) -> String {
    normalize_string(email).to_lowercase()
}

/// メールアドレスの形式を検証する
fn validate_email(email: &str) -> AppResult<()> {
    if email.is_empty() {
        return Err(AppError::validation("メールアドレスを入力してください"));
    }

    // ローカル部とドメイン部の存在のみ確認する
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.'),
        None => false,
    };

    if !valid {
        return Err(AppError::validation(
            "メールアドレスの形式が正しくありません",
        ));
    }

    Ok(())
}

/// 認証失敗の共通エラー
///
/// ユーザー列挙を防ぐため、メールアドレス不明とパスワード不一致を区別しない
fn invalid_credentials() -> AppError {
    AppError::auth("メールアドレスまたはパスワードが正しくありません")
}
