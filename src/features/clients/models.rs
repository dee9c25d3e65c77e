use serde::{Deserialize, Serialize};

/// 顧客の支払いステータス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientStatus {
    /// 未入金
    Pending,
    /// 一部入金済み
    Partial,
    /// 全額入金済み
    Completed,
}

impl ClientStatus {
    /// 金額からステータスを導出する
    ///
    /// 入金額が0以下なら未入金、請求額未満なら一部入金、
    /// 請求額以上なら全額入金とする。
    ///
    /// # 引数
    /// * `total_amount` - 請求額
    /// * `received_amount` - 入金済み額
    ///
    /// # 戻り値
    /// 導出されたステータス
    pub fn derive(total_amount: f64, received_amount: f64) -> Self {
        if received_amount <= 0.0 {
            ClientStatus::Pending
        } else if received_amount < total_amount {
            ClientStatus::Partial
        } else {
            ClientStatus::Completed
        }
    }

    /// データベース保存用の文字列表現
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientStatus::Pending => "Pending",
            ClientStatus::Partial => "Partial",
            ClientStatus::Completed => "Completed",
        }
    }

    /// 文字列表現からステータスを復元する
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Pending" => Some(ClientStatus::Pending),
            "Partial" => Some(ClientStatus::Partial),
            "Completed" => Some(ClientStatus::Completed),
            _ => None,
        }
    }
}

/// 履歴レコードの種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryKind {
    /// 作業実施
    Work,
    /// 入金
    Payment,
    /// サイクル完了
    Cycle,
}

impl HistoryKind {
    /// データベース保存用の文字列表現
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryKind::Work => "Work",
            HistoryKind::Payment => "Payment",
            HistoryKind::Cycle => "Cycle",
        }
    }

    /// 文字列表現から種別を復元する
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Work" => Some(HistoryKind::Work),
            "Payment" => Some(HistoryKind::Payment),
            "Cycle" => Some(HistoryKind::Cycle),
            _ => None,
        }
    }
}

/// 顧客の履歴レコード（追記専用）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub date: String, // YYYY-MM-DD形式
    pub kind: HistoryKind,
    pub amount: f64,
    pub status: ClientStatus, // 記録時点のステータス
    pub description: Option<String>,
}

/// 顧客データモデル
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: i64,
    pub name: String,                     // 顧客名、100文字以内
    pub mobile: Option<String>,           // 電話番号
    pub address: Option<String>,          // 住所
    pub work_description: Option<String>, // 作業内容、500文字以内
    pub work_date: String,                // 直近の作業日、YYYY-MM-DD形式
    pub next_work_date: Option<String>,   // 次回作業予定日、YYYY-MM-DD形式
    pub reminder_time: String,            // リマインダー時刻、HH:MM形式
    pub repeat_after_days: i64,           // 繰り返し間隔（日数）、0は繰り返しなし
    pub total_amount: f64,                // 請求額
    pub received_amount: f64,             // 入金済み額
    pub remaining_amount: f64,            // 残額（total - received）
    pub status: ClientStatus,
    pub is_active: bool, // 論理削除フラグ
    pub history: Vec<HistoryEntry>,
    pub created_at: String, // RFC3339形式（JST）
    pub updated_at: String, // RFC3339形式（JST）
}

/// 顧客作成用DTO
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateClientDto {
    pub name: String,
    pub mobile: Option<String>,
    pub address: Option<String>,
    pub work_description: Option<String>,
    pub work_date: Option<String>, // 省略時は今日（JST）
    pub next_work_date: Option<String>,
    pub reminder_time: Option<String>, // 省略時は09:00
    pub repeat_after_days: Option<i64>, // 省略時は0
    pub total_amount: Option<f64>,     // 省略時は0（未請求）
}

/// 顧客更新用DTO
///
/// Noneのフィールドは変更しない。
/// next_work_dateに空文字列を指定すると予定日を解除（NULL化）する。
#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateClientDto {
    pub name: Option<String>,
    pub mobile: Option<String>,
    pub address: Option<String>,
    pub work_description: Option<String>,
    pub work_date: Option<String>,
    pub next_work_date: Option<String>,
    pub reminder_time: Option<String>,
    pub repeat_after_days: Option<i64>,
    pub total_amount: Option<f64>,
    pub received_amount: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[test]
    fn test_derive_status() {
        // 入金なしは未入金
        assert_eq!(ClientStatus::derive(1000.0, 0.0), ClientStatus::Pending);

        // 一部入金
        assert_eq!(ClientStatus::derive(1000.0, 400.0), ClientStatus::Partial);

        // 全額入金
        assert_eq!(ClientStatus::derive(1000.0, 1000.0), ClientStatus::Completed);

        // 請求額0で入金なしは未入金
        assert_eq!(ClientStatus::derive(0.0, 0.0), ClientStatus::Pending);
    }

    #[quickcheck]
    fn prop_derive_status_is_consistent(total: u32, received: u32) -> bool {
        let total = f64::from(total % 1_000_000);
        let received = f64::from(received % 1_000_000);

        match ClientStatus::derive(total, received) {
            ClientStatus::Pending => received <= 0.0,
            ClientStatus::Partial => received > 0.0 && received < total,
            ClientStatus::Completed => received > 0.0 && received >= total,
        }
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [
            ClientStatus::Pending,
            ClientStatus::Partial,
            ClientStatus::Completed,
        ] {
            assert_eq!(ClientStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ClientStatus::parse("Unknown"), None);
    }

    #[test]
    fn test_history_kind_roundtrip() {
        for kind in [HistoryKind::Work, HistoryKind::Payment, HistoryKind::Cycle] {
            assert_eq!(HistoryKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(HistoryKind::parse("Refund"), None);
    }

    #[test]
    fn test_status_serializes_as_plain_string() {
        let json = serde_json::to_string(&ClientStatus::Partial).unwrap();
        assert_eq!(json, "\"Partial\"");
    }
}
