use chrono::{DateTime, Duration, NaiveDate};
use chrono_tz::Tz;
use std::fmt;

use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::parse_reminder_time;

/// タイマーをセットする最大時間幅（時間）
const MAX_ARM_WINDOW_HOURS: i64 = 24;

/// 発火時刻を過ぎていても即時発火を許す猶予（時間）
const LATE_FIRE_GRACE_HOURS: i64 = 1;

/// スケジュール済みリマインダーの識別キー（顧客ID + 予定日）
///
/// 同じ顧客でも予定日が変われば別のリマインダーとして扱う。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReminderKey {
    pub client_id: i64,
    pub next_work_date: String,
}

impl fmt::Display for ReminderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.client_id, self.next_work_date)
    }
}

/// リマインダーの発火判定
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleDecision {
    /// 指定時間後の発火をセットする（発火まで24時間以内）
    Arm(std::time::Duration),
    /// 発火時刻を過ぎているが猶予内なので即時発火する
    FireNow,
    /// 発火時刻を過ぎており猶予も超えているため破棄する
    Expired,
    /// 発火まで24時間を超えるため今回はセットしない（次回スキャンに委ねる）
    Deferred,
}

/// 予定日とリマインダー時刻から発火判定を行う
///
/// 発火時刻は予定日のリマインダー時刻（秒は0）。
/// 発火まで24時間以内ならタイマーをセットし、24時間超なら見送る。
/// すでに発火時刻を過ぎている場合、当日かつ1時間以内なら即時発火、
/// それ以外は破棄する。
///
/// # 引数
/// * `next_work_date` - 予定日（YYYY-MM-DD形式）
/// * `reminder_time` - リマインダー時刻（HH:MM形式）
/// * `now` - 現在時刻（JST）
///
/// # 戻り値
/// 発火判定、入力が不正な場合はエラー
pub fn evaluate(
    next_work_date: &str,
    reminder_time: &str,
    now: DateTime<Tz>,
) -> AppResult<ScheduleDecision> {
    let date = NaiveDate::parse_from_str(next_work_date, "%Y-%m-%d")
        .map_err(|_| AppError::validation(format!("不正な日付形式です: {next_work_date}")))?;
    let time = parse_reminder_time(reminder_time)?;

    let fire_at = date
        .and_time(time)
        .and_local_timezone(now.timezone())
        .single()
        .ok_or_else(|| {
            AppError::validation(format!(
                "発火時刻を解決できません: {next_work_date} {reminder_time}"
            ))
        })?;

    let delta = fire_at.signed_duration_since(now);

    if delta > Duration::hours(MAX_ARM_WINDOW_HOURS) {
        return Ok(ScheduleDecision::Deferred);
    }

    if delta > Duration::zero() {
        return Ok(ScheduleDecision::Arm(delta.to_std().unwrap_or_default()));
    }

    // 発火時刻を過ぎている。当日かつ猶予内なら即時発火する
    let elapsed = -delta;
    if now.date_naive() == date && elapsed < Duration::hours(LATE_FIRE_GRACE_HOURS) {
        Ok(ScheduleDecision::FireNow)
    } else {
        Ok(ScheduleDecision::Expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Asia::Tokyo;

    fn jst(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Tz> {
        Tokyo.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_evaluate_arms_within_window() {
        // 2時間後の発火はタイマーをセットする
        let now = jst(2024, 6, 1, 7, 0, 0);
        let decision = evaluate("2024-06-01", "09:00", now).unwrap();

        assert_eq!(
            decision,
            ScheduleDecision::Arm(std::time::Duration::from_secs(2 * 3600))
        );
    }

    #[test]
    fn test_evaluate_arms_at_exactly_24_hours() {
        let now = jst(2024, 6, 1, 9, 0, 0);
        let decision = evaluate("2024-06-02", "09:00", now).unwrap();

        assert_eq!(
            decision,
            ScheduleDecision::Arm(std::time::Duration::from_secs(24 * 3600))
        );
    }

    #[test]
    fn test_evaluate_defers_beyond_24_hours() {
        // 26時間後はタイマーをセットしない
        let now = jst(2024, 6, 1, 7, 0, 0);
        let decision = evaluate("2024-06-02", "09:00", now).unwrap();

        assert_eq!(decision, ScheduleDecision::Deferred);
    }

    #[test]
    fn test_evaluate_fires_now_within_grace() {
        // 30分過ぎはまだ猶予内なので即時発火する
        let now = jst(2024, 6, 1, 9, 30, 0);
        let decision = evaluate("2024-06-01", "09:00", now).unwrap();

        assert_eq!(decision, ScheduleDecision::FireNow);
    }

    #[test]
    fn test_evaluate_fires_now_at_exact_time() {
        let now = jst(2024, 6, 1, 9, 0, 0);
        let decision = evaluate("2024-06-01", "09:00", now).unwrap();

        assert_eq!(decision, ScheduleDecision::FireNow);
    }

    #[test]
    fn test_evaluate_expires_after_grace() {
        // 3時間過ぎは破棄する
        let now = jst(2024, 6, 1, 12, 0, 0);
        let decision = evaluate("2024-06-01", "09:00", now).unwrap();

        assert_eq!(decision, ScheduleDecision::Expired);
    }

    #[test]
    fn test_evaluate_expires_at_exactly_one_hour() {
        // 猶予はちょうど1時間で切れる
        let now = jst(2024, 6, 1, 10, 0, 0);
        let decision = evaluate("2024-06-01", "09:00", now).unwrap();

        assert_eq!(decision, ScheduleDecision::Expired);
    }

    #[test]
    fn test_evaluate_expires_when_date_changed() {
        // 前日深夜の発火時刻は、経過が1時間未満でも日付が変わっていれば破棄する
        let now = jst(2024, 6, 1, 0, 15, 0);
        let decision = evaluate("2024-05-31", "23:30", now).unwrap();

        assert_eq!(decision, ScheduleDecision::Expired);
    }

    #[test]
    fn test_evaluate_rejects_invalid_input() {
        let now = jst(2024, 6, 1, 7, 0, 0);

        assert!(evaluate("2024/06/01", "09:00", now).is_err());
        assert!(evaluate("2024-06-01", "9時", now).is_err());
        assert!(evaluate("2024-06-01", "25:00", now).is_err());
    }

    #[test]
    fn test_reminder_key_display() {
        let key = ReminderKey {
            client_id: 42,
            next_work_date: "2024-06-01".to_string(),
        };
        assert_eq!(key.to_string(), "42-2024-06-01");
    }
}
