use serde::{Deserialize, Serialize};
use tauri::{AppHandle, Emitter};

use crate::features::clients::Client;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::format_amount;

/// 作業内容が未登録の場合の通知本文
const DEFAULT_BODY_TEXT: &str = "本日の作業予定";

/// 発火時にフロントエンドへ送るリマインダー情報
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DueReminder {
    pub client_id: i64,
    pub client_name: String,
    /// 対象の作業予定日（YYYY-MM-DD形式）
    pub work_date: String,
    /// リマインダー時刻（HH:MM形式）
    pub reminder_time: String,
    pub work_description: Option<String>,
    /// 通知に表示する本文（顧客名・作業内容・請求額）
    pub body: String,
}

impl DueReminder {
    /// 顧客情報からリマインダー通知の内容を組み立てる
    ///
    /// # 引数
    /// * `client` - 対象の顧客
    /// * `work_date` - 発火対象の作業予定日
    pub fn from_client(client: &Client, work_date: &str) -> Self {
        let body = format!(
            "{}\n{}\n金額: {}円",
            client.name,
            client.work_description.as_deref().unwrap_or(DEFAULT_BODY_TEXT),
            format_amount(client.total_amount)
        );
        Self {
            client_id: client.id,
            client_name: client.name.clone(),
            work_date: work_date.to_string(),
            reminder_time: client.reminder_time.clone(),
            work_description: client.work_description.clone(),
            body,
        }
    }
}

/// 発火したリマインダーの通知先
///
/// 通知はベストエフォートで行う。失敗してもスケジューラー側の
/// 記録処理は継続する。
pub trait NotificationSink: Send + Sync {
    /// リマインダーを通知する
    fn notify(&self, reminder: &DueReminder) -> AppResult<()>;
}

/// Tauriイベントとしてフロントエンドへ通知するシンク
pub struct EventNotifier {
    app_handle: AppHandle,
}

impl EventNotifier {
    pub fn new(app_handle: AppHandle) -> Self {
        Self { app_handle }
    }
}

impl NotificationSink for EventNotifier {
    fn notify(&self, reminder: &DueReminder) -> AppResult<()> {
        self.app_handle
            .emit("reminder-due", reminder)
            .map_err(|e| AppError::notification(format!("リマインダー通知の送信に失敗: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::clients::models::ClientStatus;

    fn sample_client(work_description: Option<&str>, total_amount: f64) -> Client {
        Client {
            id: 1,
            name: "田中様".to_string(),
            mobile: None,
            address: None,
            work_description: work_description.map(str::to_string),
            work_date: "2024-06-01".to_string(),
            next_work_date: Some("2024-06-08".to_string()),
            reminder_time: "09:00".to_string(),
            repeat_after_days: 7,
            total_amount,
            received_amount: 0.0,
            remaining_amount: total_amount,
            status: ClientStatus::Pending,
            is_active: true,
            history: Vec::new(),
            created_at: "2024-06-01T00:00:00+09:00".to_string(),
            updated_at: "2024-06-01T00:00:00+09:00".to_string(),
        }
    }

    #[test]
    fn test_from_client_builds_body_with_amount() {
        let client = sample_client(Some("庭の剪定"), 15000.0);
        let reminder = DueReminder::from_client(&client, "2024-06-08");

        assert_eq!(reminder.client_id, 1);
        assert_eq!(reminder.work_date, "2024-06-08");
        assert_eq!(reminder.body, "田中様\n庭の剪定\n金額: 15000円");
    }

    #[test]
    fn test_from_client_body_without_description() {
        let client = sample_client(None, 2500.5);
        let reminder = DueReminder::from_client(&client, "2024-06-08");

        // 作業内容が未登録の場合は既定の文言、端数は小数2桁で表示する
        assert_eq!(reminder.body, "田中様\n本日の作業予定\n金額: 2500.50円");
    }
}
