use tauri::State;

use super::models::{Client, CreateClientDto, UpdateClientDto};
use super::repository;
use crate::features::auth::service::AuthService;
use crate::shared::utils::{
    validate_amount, validate_date, validate_description, validate_reminder_time,
    validate_required_field, validate_text_length,
};
use crate::AppState;

/// 顧客一覧を取得する（アクティブのみ、新しい順）
///
/// # 引数
/// * `token` - セッショントークン
/// * `state` - アプリケーション状態
/// * `auth_service` - 認証サービス
///
/// # 戻り値
/// 顧客のリスト、または失敗時はエラーメッセージ
#[tauri::command]
pub async fn get_clients(
    token: String,
    state: State<'_, AppState>,
    auth_service: State<'_, AuthService>,
) -> Result<Vec<Client>, String> {
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

    repository::find_all(&db, &user.id).map_err(|e| e.user_message().to_string())
}

/// IDで顧客を取得する（履歴付き）
///
/// # 引数
/// * `id` - 顧客ID
/// * `token` - セッショントークン
/// * `state` - アプリケーション状態
/// * `auth_service` - 認証サービス
///
/// # 戻り値
/// 顧客、または失敗時はエラーメッセージ
#[tauri::command]
pub async fn get_client(
    id: i64,
    token: String,
    state: State<'_, AppState>,
    auth_service: State<'_, AuthService>,
) -> Result<Client, String> {
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

    repository::find_by_id(&db, id, &user.id).map_err(|e| e.user_message().to_string())
}

/// 顧客を作成する
///
/// # 引数
/// * `dto` - 顧客作成用DTO
/// * `token` - セッショントークン
/// * `state` - アプリケーション状態
/// * `auth_service` - 認証サービス
///
/// # 戻り値
/// 作成された顧客、または失敗時はエラーメッセージ
#[tauri::command]
pub async fn create_client(
    dto: CreateClientDto,
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
    validate_create_client_dto(&dto)?;

    // データベース接続を取得
    let db = state
        .db
        .lock()
        .map_err(|e| format!("データベースロックエラー: {e}"))?;

    let client = repository::create(&db, dto, &user.id).map_err(|e| e.user_message().to_string())?;

    log::info!("顧客を作成しました: client_id={}", client.id);
    Ok(client)
}

/// 顧客を更新する
///
/// # 引数
/// * `id` - 顧客ID
/// * `dto` - 顧客更新用DTO
/// * `token` - セッショントークン
/// * `state` - アプリケーション状態
/// * `auth_service` - 認証サービス
///
/// # 戻り値
/// 更新された顧客、または失敗時はエラーメッセージ
#[tauri::command]
pub async fn update_client(
    id: i64,
    dto: UpdateClientDto,
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
    validate_update_client_dto(&dto)?;

    // データベース接続を取得
    let db = state
        .db
        .lock()
        .map_err(|e| format!("データベースロックエラー: {e}"))?;

    repository::update(&db, id, dto, &user.id).map_err(|e| e.user_message().to_string())
}

/// 顧客を削除する（論理削除）
///
/// # 引数
/// * `id` - 顧客ID
/// * `token` - セッショントークン
/// * `state` - アプリケーション状態
/// * `auth_service` - 認証サービス
///
/// # 戻り値
/// 成功時はOk(())、失敗時はエラーメッセージ
#[tauri::command]
pub async fn delete_client(
    id: i64,
    token: String,
    state: State<'_, AppState>,
    auth_service: State<'_, AuthService>,
) -> Result<(), String> {
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

    repository::deactivate(&db, id, &user.id).map_err(|e| e.user_message().to_string())?;

    log::info!("顧客を論理削除しました: client_id={id}");
    Ok(())
}

/// 顧客を全額入金済みにする（旧形式の完了操作）
///
/// # 引数
/// * `id` - 顧客ID
/// * `token` - セッショントークン
/// * `state` - アプリケーション状態
/// * `auth_service` - 認証サービス
///
/// # 戻り値
/// 更新された顧客、または失敗時はエラーメッセージ
#[tauri::command]
pub async fn mark_client_completed(
    id: i64,
    token: String,
    state: State<'_, AppState>,
    auth_service: State<'_, AuthService>,
) -> Result<Client, String> {
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

    repository::mark_completed(&db, id, &user.id).map_err(|e| e.user_message().to_string())
}

/// 顧客作成DTOのバリデーション
///
/// # 引数
/// * `dto` - 顧客作成用DTO
///
/// # 戻り値
/// バリデーション成功時はOk(())、失敗時はエラーメッセージ
fn validate_create_client_dto(dto: &CreateClientDto) -> Result<(), String> {
    validate_required_field(&dto.name, "顧客名").map_err(|e| e.user_message().to_string())?;
    validate_text_length(&dto.name, 100, "顧客名").map_err(|e| e.user_message().to_string())?;

    if let Some(ref mobile) = dto.mobile {
        validate_text_length(mobile, 30, "電話番号").map_err(|e| e.user_message().to_string())?;
    }

    if let Some(ref address) = dto.address {
        validate_text_length(address, 200, "住所").map_err(|e| e.user_message().to_string())?;
    }

    validate_description(&dto.work_description).map_err(|e| e.user_message().to_string())?;

    if let Some(ref work_date) = dto.work_date {
        validate_date(work_date).map_err(|e| e.user_message().to_string())?;
    }

    if let Some(ref next_work_date) = dto.next_work_date {
        validate_date(next_work_date).map_err(|e| e.user_message().to_string())?;
    }

    if let Some(ref reminder_time) = dto.reminder_time {
        validate_reminder_time(reminder_time).map_err(|e| e.user_message().to_string())?;
    }

    if let Some(repeat_after_days) = dto.repeat_after_days {
        if repeat_after_days < 0 {
            return Err("繰り返し間隔は0以上で入力してください".to_string());
        }
    }

    if let Some(total_amount) = dto.total_amount {
        validate_amount(total_amount).map_err(|e| e.user_message().to_string())?;
    }

    Ok(())
}

/// 顧客更新DTOのバリデーション
///
/// # 引数
/// * `dto` - 顧客更新用DTO
///
/// # 戻り値
/// バリデーション成功時はOk(())、失敗時はエラーメッセージ
fn validate_update_client_dto(dto: &UpdateClientDto) -> Result<(), String> {
    if let Some(ref name) = dto.name {
        validate_required_field(name, "顧客名").map_err(|e| e.user_message().to_string())?;
        validate_text_length(name, 100, "顧客名").map_err(|e| e.user_message().to_string())?;
    }

    if let Some(ref mobile) = dto.mobile {
        validate_text_length(mobile, 30, "電話番号").map_err(|e| e.user_message().to_string())?;
    }

    if let Some(ref address) = dto.address {
        validate_text_length(address, 200, "住所").map_err(|e| e.user_message().to_string())?;
    }

    validate_description(&dto.work_description).map_err(|e| e.user_message().to_string())?;

    if let Some(ref work_date) = dto.work_date {
        validate_date(work_date).map_err(|e| e.user_message().to_string())?;
    }

    // 空文字列は予定日の解除を意味するため日付形式を要求しない
    if let Some(ref next_work_date) = dto.next_work_date {
        if !next_work_date.trim().is_empty() {
            validate_date(next_work_date).map_err(|e| e.user_message().to_string())?;
        }
    }

    if let Some(ref reminder_time) = dto.reminder_time {
        validate_reminder_time(reminder_time).map_err(|e| e.user_message().to_string())?;
    }

    if let Some(repeat_after_days) = dto.repeat_after_days {
        if repeat_after_days < 0 {
            return Err("繰り返し間隔は0以上で入力してください".to_string());
        }
    }

    if let Some(total_amount) = dto.total_amount {
        validate_amount(total_amount).map_err(|e| e.user_message().to_string())?;
    }

    if let Some(received_amount) = dto.received_amount {
        validate_amount(received_amount).map_err(|e| e.user_message().to_string())?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_create_dto() -> CreateClientDto {
        CreateClientDto {
            name: "山田太郎".to_string(),
            mobile: Some("090-1234-5678".to_string()),
            address: None,
            work_description: None,
            work_date: Some("2024-06-01".to_string()),
            next_work_date: Some("2024-07-01".to_string()),
            reminder_time: Some("09:30".to_string()),
            repeat_after_days: Some(30),
            total_amount: Some(10000.0),
        }
    }

    #[test]
    fn test_validate_create_client_dto_accepts_valid_input() {
        assert!(validate_create_client_dto(&valid_create_dto()).is_ok());
    }

    #[test]
    fn test_validate_create_client_dto_rejects_empty_name() {
        let mut dto = valid_create_dto();
        dto.name = "   ".to_string();
        assert!(validate_create_client_dto(&dto).is_err());
    }

    #[test]
    fn test_validate_create_client_dto_rejects_bad_reminder_time() {
        let mut dto = valid_create_dto();
        dto.reminder_time = Some("25:00".to_string());
        assert!(validate_create_client_dto(&dto).is_err());
    }

    #[test]
    fn test_validate_create_client_dto_rejects_negative_repeat() {
        let mut dto = valid_create_dto();
        dto.repeat_after_days = Some(-1);
        assert!(validate_create_client_dto(&dto).is_err());
    }

    #[test]
    fn test_validate_create_client_dto_rejects_bad_date() {
        let mut dto = valid_create_dto();
        dto.next_work_date = Some("2024/07/01".to_string());
        assert!(validate_create_client_dto(&dto).is_err());
    }

    #[test]
    fn test_validate_update_client_dto_allows_empty_next_work_date() {
        let dto = UpdateClientDto {
            name: None,
            mobile: None,
            address: None,
            work_description: None,
            work_date: None,
            next_work_date: Some(String::new()),
            reminder_time: None,
            repeat_after_days: None,
            total_amount: None,
            received_amount: None,
        };
        assert!(validate_update_client_dto(&dto).is_ok());
    }

    #[test]
    fn test_validate_update_client_dto_rejects_negative_amount() {
        let dto = UpdateClientDto {
            name: None,
            mobile: None,
            address: None,
            work_description: None,
            work_date: None,
            next_work_date: None,
            reminder_time: None,
            repeat_after_days: None,
            total_amount: Some(-100.0),
            received_amount: None,
        };
        assert!(validate_update_client_dto(&dto).is_err());
    }
}
