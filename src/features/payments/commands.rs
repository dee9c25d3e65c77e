use tauri::State;

use super::models::{CompleteCycleDto, Payment, RecordPaymentDto};
use super::repository;
use crate::features::auth::service::AuthService;
use crate::features::clients::models::Client;
use crate::shared::utils::{validate_amount, validate_date, validate_description};
use crate::AppState;

/// 入金を記録する
///
/// # 引数
/// * `client_id` - 顧客ID
/// * `dto` - 入金記録用DTO
/// * `token` - セッショントークン
/// * `state` - アプリケーション状態
/// * `auth_service` - 認証サービス
///
/// # 戻り値
/// 更新された顧客、または失敗時はエラーメッセージ
#[tauri::command]
pub async fn record_payment(
    client_id: i64,
    dto: RecordPaymentDto,
    token: String,
    state: State<'_, AppState>,
    auth_service: State<'_, AuthService>,
) -> Result<Client, String> {
    // 認証チェック
    let user = auth_service
        .validate_token(&token)
        .await
        .map_err(|e| format!("認証エラー: {e}"))?;

    // バリデーション
    validate_record_payment_dto(&dto)?;

    // データベース接続を取得
    let db = state
        .db
        .lock()
        .map_err(|e| format!("データベースロックエラー: {e}"))?;

    repository::record_payment(&db, client_id, dto, &user.id).map_err(|e| e.user_message().to_string())
}

/// 作業サイクルを完了する
///
/// # 引数
/// * `client_id` - 顧客ID
/// * `dto` - サイクル完了用DTO
/// * `token` - セッショントークン
/// * `state` - アプリケーション状態
/// * `auth_service` - 認証サービス
///
/// # 戻り値
/// リセット後の顧客、または失敗時はエラーメッセージ
#[tauri::command]
pub async fn complete_cycle(
    client_id: i64,
    dto: CompleteCycleDto,
    token: String,
    state: State<'_, AppState>,
    auth_service: State<'_, AuthService>,
) -> Result<Client, String> {
    // 認証チェック
    let user = auth_service
        .validate_token(&token)
        .await
        .map_err(|e| format!("認証エラー: {e}"))?;

    // バリデーション
    validate_complete_cycle_dto(&dto)?;

    // データベース接続を取得
    let db = state
        .db
        .lock()
        .map_err(|e| format!("データベースロックエラー: {e}"))?;

    repository::complete_cycle(&db, client_id, dto, &user.id).map_err(|e| e.user_message().to_string())
}

/// 顧客の入金一覧を取得する（新しい順）
///
/// # 引数
/// * `client_id` - 顧客ID
/// * `token` - セッショントークン
/// * `state` - アプリケーション状態
/// * `auth_service` - 認証サービス
///
/// # 戻り値
/// 入金レコードのリスト、または失敗時はエラーメッセージ
#[tauri::command]
pub async fn get_client_payments(
    client_id: i64,
    token: String,
    state: State<'_, AppState>,
    auth_service: State<'_, AuthService>,
) -> Result<Vec<Payment>, String> {
    // 認証チェック
    let user = auth_service
        .validate_token(&token)
        .await
        .map_err(|e| format!("認証エラー: {e}"))?;

    // データベース接続を取得
    let db = state
        .db
        .lock()
        .map_err(|e| format!("データベースロックエラー: {e}"))?;

    repository::find_for_client(&db, client_id, &user.id).map_err(|e| e.user_message().to_string())
}

/// 入金記録DTOのバリデーション
///
/// 金額の範囲（0より大きく残額以下）は適用時に検証されるため、
/// ここでは形式のみを確認する。
///
/// # 引数
/// * `dto` - 入金記録用DTO
///
/// # 戻り値
/// バリデーション成功時はOk(())、失敗時はエラーメッセージ
fn validate_record_payment_dto(dto: &RecordPaymentDto) -> Result<(), String> {
    if let Some(amount) = dto.amount {
        validate_amount(amount).map_err(|e| e.user_message().to_string())?;
    }

    if let Some(ref payment_date) = dto.payment_date {
        validate_date(payment_date).map_err(|e| e.user_message().to_string())?;
    }

    validate_description(&dto.notes).map_err(|e| e.user_message().to_string())?;

    Ok(())
}

/// サイクル完了DTOのバリデーション
///
/// # 引数
/// * `dto` - サイクル完了用DTO
///
/// # 戻り値
/// バリデーション成功時はOk(())、失敗時はエラーメッセージ
fn validate_complete_cycle_dto(dto: &CompleteCycleDto) -> Result<(), String> {
    if let Some(ref completion_date) = dto.completion_date {
        validate_date(completion_date).map_err(|e| e.user_message().to_string())?;
    }

    if let Some(payment_amount) = dto.payment_amount {
        validate_amount(payment_amount).map_err(|e| e.user_message().to_string())?;
    }

    if let Some(next_total_amount) = dto.next_total_amount {
        validate_amount(next_total_amount).map_err(|e| e.user_message().to_string())?;
    }

    validate_description(&dto.notes).map_err(|e| e.user_message().to_string())?;

    Ok(())
}
