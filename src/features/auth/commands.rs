use tauri::State;

use crate::features::auth::models::{AuthResponse, AuthState, LoginRequest, RegisterRequest};
use crate::features::auth::service::AuthService;
use crate::features::reminders::scheduler::SchedulerHandle;
use crate::shared::errors::AppError;

/// 新規ユーザーを登録する
///
/// # 引数
/// * `request` - 登録リクエスト
/// * `auth_service` - 認証サービス
///
/// # 戻り値
/// セッショントークンとユーザー情報
#[tauri::command]
pub async fn register(
    request: RegisterRequest,
    auth_service: State<'_, AuthService>,
) -> Result<AuthResponse, String> {
    log::info!("ユーザー登録コマンドを実行");

    auth_service.register(request).await.map_err(|e| {
        log::error!("ユーザー登録エラー: {e}");
        String::from(e)
    })
}

/// ログインする
///
/// # 引数
/// * `request` - ログインリクエスト
/// * `auth_service` - 認証サービス
///
/// # 戻り値
/// セッショントークンとユーザー情報
#[tauri::command]
pub async fn login(
    request: LoginRequest,
    auth_service: State<'_, AuthService>,
) -> Result<AuthResponse, String> {
    log::info!("ログインコマンドを実行");

    auth_service.login(request).await.map_err(|e| {
        log::error!("ログインエラー: {e}");
        String::from(e)
    })
}

/// ログアウトする
///
/// リマインダースケジューラーが動作中の場合は先に停止する。
///
/// # 引数
/// * `token` - セッショントークン
/// * `auth_service` - 認証サービス
/// * `scheduler` - リマインダースケジューラーの状態
///
/// # 戻り値
/// ログアウト結果
#[tauri::command]
pub async fn logout(
    token: String,
    auth_service: State<'_, AuthService>,
    scheduler: State<'_, SchedulerHandle>,
) -> Result<(), String> {
    log::info!("ログアウトコマンドを実行");

    // セッション終了に伴いリマインダーをすべて解除する
    if let Some(running) = scheduler.take() {
        running.stop();
        log::info!("リマインダースケジューラーを停止しました");
    }

    auth_service.logout(&token).await.map_err(|e| {
        log::error!("ログアウト処理エラー: {e}");
        String::from(e)
    })?;

    log::info!("ログアウト処理が完了しました");
    Ok(())
}

/// セッショントークンを検証し、認証状態を返す
///
/// トークンが無効・期限切れの場合はエラーではなく未認証状態を返す。
///
/// # 引数
/// * `token` - セッショントークン
/// * `auth_service` - 認証サービス
///
/// # 戻り値
/// 認証状態
#[tauri::command]
pub async fn validate_session(
    token: String,
    auth_service: State<'_, AuthService>,
) -> Result<AuthState, String> {
    log::debug!("セッション検証コマンドを実行");

    match auth_service.validate_token(&token).await {
        Ok(user) => {
            log::debug!("認証済み状態: user_id={}", user.id);
            Ok(AuthState {
                user: Some(user),
                is_authenticated: true,
            })
        }
        Err(AppError::Auth(_)) | Err(AppError::Security(_)) => {
            log::debug!("未認証状態");
            Ok(AuthState::default())
        }
        Err(e) => {
            log::error!("セッション検証エラー: {e}");
            Err(String::from(e))
        }
    }
}

/// 期限切れセッションをクリーンアップする（管理用コマンド）
///
/// # 引数
/// * `auth_service` - 認証サービス
///
/// # 戻り値
/// 削除されたセッション数
#[tauri::command]
pub async fn cleanup_expired_sessions(
    auth_service: State<'_, AuthService>,
) -> Result<usize, String> {
    log::info!("期限切れセッションクリーンアップコマンドを実行");

    auth_service.cleanup_expired_sessions().await.map_err(|e| {
        log::error!("セッションクリーンアップエラー: {e}");
        String::from(e)
    })
}
