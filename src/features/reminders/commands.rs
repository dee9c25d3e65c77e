use std::sync::Arc;
use tauri::{AppHandle, State};

use super::notifier::EventNotifier;
use super::scheduler::{ReminderScheduler, ReminderStats, SchedulerHandle};
use crate::features::auth::service::AuthService;
use crate::features::clients::{repository as clients_repository, Client};
use crate::shared::utils::{add_days_to_date, get_today_date_jst};
use crate::AppState;

/// リマインダースケジューラーを開始する
///
/// 稼働中のスケジューラーがあれば停止してから新しく開始する。
///
/// # 引数
/// * `token` - セッショントークン
/// * `state` - アプリケーション状態
/// * `auth_service` - 認証サービス
/// * `scheduler_handle` - スケジューラーの置き場
/// * `app_handle` - Tauriアプリケーションハンドル
///
/// # 戻り値
/// 成功時は()、失敗時はエラーメッセージ
#[tauri::command]
pub async fn start_reminder_scheduler(
    token: String,
    state: State<'_, AppState>,
    auth_service: State<'_, AuthService>,
    scheduler_handle: State<'_, SchedulerHandle>,
    app_handle: AppHandle,
) -> Result<(), String> {
    // 認証チェック
    let user = auth_service
        .validate_token(&token)
        .await
        .map_err(|e| format!("認証エラー: {e}"))?;

    // 稼働中のスケジューラーは停止してから置き換える
    if let Some(previous) = scheduler_handle.take() {
        previous.stop();
    }

    let sink = Arc::new(EventNotifier::new(app_handle));
    let scheduler = ReminderScheduler::new(Arc::clone(&state.db), sink, user.id.clone());
    scheduler.start();
    scheduler_handle.replace(scheduler);

    Ok(())
}

/// リマインダースケジューラーを停止する
///
/// # 引数
/// * `scheduler_handle` - スケジューラーの置き場
///
/// # 戻り値
/// 成功時は()（稼働していなくても成功扱い）
#[tauri::command]
pub async fn stop_reminder_scheduler(
    scheduler_handle: State<'_, SchedulerHandle>,
) -> Result<(), String> {
    if let Some(scheduler) = scheduler_handle.take() {
        scheduler.stop();
    } else {
        log::debug!("停止対象のスケジューラーがありません");
    }

    Ok(())
}

/// スケジューラーの稼働状況を取得する
///
/// # 戻り値
/// 稼働状況（未稼働時は全て0）
#[tauri::command]
pub async fn get_reminder_stats(
    scheduler_handle: State<'_, SchedulerHandle>,
) -> Result<ReminderStats, String> {
    Ok(scheduler_handle
        .with(|scheduler| scheduler.stats())
        .unwrap_or_default())
}

/// 直近のリマインダー対象顧客を取得する
///
/// 次回作業予定日が今日から明日までのアクティブな顧客を日付順に返す。
///
/// # 引数
/// * `token` - セッショントークン
/// * `state` - アプリケーション状態
/// * `auth_service` - 認証サービス
///
/// # 戻り値
/// 対象顧客のリスト、または失敗時はエラーメッセージ
#[tauri::command]
pub async fn get_upcoming_reminders(
    token: String,
    state: State<'_, AppState>,
    auth_service: State<'_, AuthService>,
) -> Result<Vec<Client>, String> {
    // 認証チェック
    let user = auth_service
        .validate_token(&token)
        .await
        .map_err(|e| format!("認証エラー: {e}"))?;

    let today = get_today_date_jst();
    let tomorrow = add_days_to_date(&today, 1).map_err(|e| e.user_message().to_string())?;

    // データベース接続を取得
    let db = state
        .db
        .lock()
        .map_err(|e| format!("データベースロックエラー: {e}"))?;

    clients_repository::find_due_between(&db, &user.id, &today, &tomorrow)
        .map_err(|e| e.user_message().to_string())
}
