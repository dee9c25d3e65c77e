/// 入金・作業サイクル機能モジュール
///
/// このモジュールは、入金とサイクル管理に関連するすべての機能を提供します：
/// - 入金の検証と記録（一部入金・全額入金）
/// - 作業サイクルの完了と次サイクルへのリセット
/// - 繰り返し間隔に基づく次回作業予定日の計算
/// - 顧客ごとの入金一覧の取得
pub mod commands;
pub mod cycle;
pub mod models;
pub mod repository;

// 公開インターフェース
pub use commands::{complete_cycle, get_client_payments, record_payment};

pub use cycle::{plan_cycle_completion, plan_payment, CyclePlan, PaymentPlan};

pub use models::{CompleteCycleDto, Payment, RecordPaymentDto};
