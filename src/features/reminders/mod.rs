//! リマインダー機能
//!
//! 顧客の次回作業予定日とリマインダー時刻からタイマーを導出し、
//! 発火時の通知と繰り返し予定の自動更新を行う。

pub mod commands;
pub mod notifier;
pub mod schedule;
pub mod scheduler;

pub use notifier::{DueReminder, EventNotifier, NotificationSink};
pub use schedule::{evaluate, ReminderKey, ScheduleDecision};
pub use scheduler::{ReminderScheduler, ReminderStats, SchedulerHandle};
