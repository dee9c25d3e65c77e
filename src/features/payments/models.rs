use serde::{Deserialize, Serialize};

/// 入金レコード（追記専用）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub client_id: i64,
    pub amount: f64,
    pub payment_date: String, // YYYY-MM-DD形式
    pub notes: Option<String>,
    pub created_at: String, // RFC3339形式（JST）
}

/// 入金記録用DTO
#[derive(Debug, Serialize, Deserialize)]
pub struct RecordPaymentDto {
    /// 入金額。is_full_paymentがtrueの場合は省略可能（残額全額を充当）
    pub amount: Option<f64>,
    /// 入金日（YYYY-MM-DD形式）。省略時は今日（JST）
    pub payment_date: Option<String>,
    pub notes: Option<String>,
    /// 残額全額の入金として扱う
    #[serde(default)]
    pub is_full_payment: bool,
}

/// 作業サイクル完了用DTO
#[derive(Debug, Serialize, Deserialize)]
pub struct CompleteCycleDto {
    /// 完了日（YYYY-MM-DD形式）。省略時は今日（JST）
    pub completion_date: Option<String>,
    /// 完了前の最終入金額。省略かつis_full_paymentもfalseなら入金なしで完了する
    pub payment_amount: Option<f64>,
    /// 残額全額の入金として扱う
    #[serde(default)]
    pub is_full_payment: bool,
    pub notes: Option<String>,
    /// 次サイクルの請求額。省略時は現在の請求額を引き継ぐ
    pub next_total_amount: Option<f64>,
}
