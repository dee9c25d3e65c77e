use crate::features::clients::models::ClientStatus;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::add_days_to_date;

/// 入金適用後の顧客金額の計画
///
/// データベースに書き込む前に、入金の検証と金額の導出を純粋に行った結果。
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentPlan {
    /// 充当する入金額
    pub amount: f64,
    /// 適用後の入金済み額
    pub received_amount: f64,
    /// 適用後の残額
    pub remaining_amount: f64,
    /// 適用後のステータス
    pub status: ClientStatus,
}

/// 入金を検証し、適用後の金額を導出する
///
/// # 引数
/// * `total_amount` - 現在の請求額
/// * `received_amount` - 現在の入金済み額
/// * `requested_amount` - 指定された入金額（全額入金の場合は省略可能）
/// * `is_full_payment` - 残額全額の入金として扱うか
///
/// # 戻り値
/// 入金計画、不正な金額の場合はエラー
pub fn plan_payment(
    total_amount: f64,
    received_amount: f64,
    requested_amount: Option<f64>,
    is_full_payment: bool,
) -> AppResult<PaymentPlan> {
    let remaining = total_amount - received_amount;

    // 全額入金の場合は残額をそのまま充当する
    let amount = if is_full_payment {
        remaining
    } else {
        requested_amount.ok_or_else(|| AppError::validation("入金額を入力してください"))?
    };

    if amount <= 0.0 {
        return Err(AppError::validation(
            "入金額は0より大きい金額を入力してください",
        ));
    }

    if amount > remaining {
        return Err(AppError::validation(format!(
            "入金額が残額を超えています（残額: {remaining}円）"
        )));
    }

    // 入金済み額は請求額を超えない
    let new_received = (received_amount + amount).min(total_amount);
    let new_remaining = total_amount - new_received;

    Ok(PaymentPlan {
        amount,
        received_amount: new_received,
        remaining_amount: new_remaining,
        status: ClientStatus::derive(total_amount, new_received),
    })
}

/// 作業サイクル完了の計画
#[derive(Debug, Clone)]
pub struct CyclePlan {
    /// 完了前の最終入金（入金なしで完了する場合はNone）
    pub final_payment: Option<PaymentPlan>,
    /// リセット後の請求額
    pub next_total_amount: f64,
    /// 次回作業予定日（繰り返しなしの場合はNone）
    pub next_work_date: Option<String>,
}

/// 作業サイクル完了を検証し、リセット後の状態を導出する
///
/// 完了後の顧客は入金済み額0・ステータスPendingで次サイクルを開始する。
/// 繰り返し間隔が設定されている場合、次回作業予定日は完了日から間隔日数後になる。
///
/// # 引数
/// * `total_amount` - 現在の請求額
/// * `received_amount` - 現在の入金済み額
/// * `repeat_after_days` - 繰り返し間隔（日数）、0は繰り返しなし
/// * `completion_date` - 完了日（YYYY-MM-DD形式）
/// * `payment_amount` - 完了前の最終入金額
/// * `is_full_payment` - 残額全額の入金として扱うか
/// * `next_total_amount` - 次サイクルの請求額（省略時は現在の請求額）
///
/// # 戻り値
/// サイクル完了計画、不正な入力の場合はエラー
pub fn plan_cycle_completion(
    total_amount: f64,
    received_amount: f64,
    repeat_after_days: i64,
    completion_date: &str,
    payment_amount: Option<f64>,
    is_full_payment: bool,
    next_total_amount: Option<f64>,
) -> AppResult<CyclePlan> {
    // 金額指定も全額指定もなければ入金なしで完了する
    let final_payment = if is_full_payment || payment_amount.is_some() {
        Some(plan_payment(
            total_amount,
            received_amount,
            payment_amount,
            is_full_payment,
        )?)
    } else {
        None
    };

    let next_total = next_total_amount.unwrap_or(total_amount);
    if next_total < 0.0 {
        return Err(AppError::validation(
            "次サイクルの請求額は0以上で入力してください",
        ));
    }

    // 繰り返し設定がある場合のみ次回作業予定日を計算する
    let next_work_date = if repeat_after_days > 0 {
        Some(add_days_to_date(completion_date, repeat_after_days)?)
    } else {
        None
    };

    Ok(CyclePlan {
        final_payment,
        next_total_amount: next_total,
        next_work_date,
    })
}
