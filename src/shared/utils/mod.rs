pub mod nanoid;

use crate::shared::errors::{AppError, AppResult};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use chrono_tz::Asia::Tokyo;
use once_cell::sync::Lazy;
use regex::Regex;

/// リマインダー時刻（HH:MM 24時間表記）の形式
static REMINDER_TIME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([01][0-9]|2[0-3]):([0-5][0-9])$").expect("不正な正規表現"));

/// 日付文字列のバリデーション
///
/// # 引数
/// * `date_str` - 日付文字列（YYYY-MM-DD形式）
///
/// # 戻り値
/// 有効な日付の場合はOk(())、無効な場合はエラー
///
/// # バリデーション規則
/// - YYYY-MM-DD形式であること
/// - 実在する日付であること
/// - 1900年以降、2100年以前であること
pub fn validate_date(date_str: &str) -> AppResult<()> {
    // 基本的な形式チェック
    if date_str.len() != 10 {
        return Err(AppError::validation(
            "日付はYYYY-MM-DD形式で入力してください",
        ));
    }

    // ハイフンの位置チェック
    if (date_str.chars().nth(4) != Some('-')) || (date_str.chars().nth(7) != Some('-')) {
        return Err(AppError::validation(
            "日付はYYYY-MM-DD形式で入力してください",
        ));
    }

    // 日付として解析可能かチェック
    let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .map_err(|_| AppError::validation("無効な日付です"))?;

    // 年の範囲チェック
    let year = date.year();
    if !(1900..=2100).contains(&year) {
        return Err(AppError::validation(
            "日付は1900年から2100年の間で入力してください",
        ));
    }

    Ok(())
}

/// 金額のバリデーション
///
/// # 引数
/// * `amount` - 金額
///
/// # 戻り値
/// 有効な金額の場合はOk(())、無効な場合はエラー
///
/// # バリデーション規則
/// - 0以上の数値であること（金額0は「未請求」として許可）
/// - 10桁以内であること（9,999,999,999円まで）
/// - 有限の数値であること
pub fn validate_amount(amount: f64) -> AppResult<()> {
    // 無限大・NaNチェック
    if !amount.is_finite() {
        return Err(AppError::validation("無効な金額です"));
    }

    // 負の数チェック
    if amount < 0.0 {
        return Err(AppError::validation("金額は0以上で入力してください"));
    }

    // 上限チェック（10桁以内）
    if amount >= 10_000_000_000.0 {
        return Err(AppError::validation("金額は10桁以内で入力してください"));
    }

    Ok(())
}

/// リマインダー時刻のバリデーション
///
/// # 引数
/// * `time_str` - 時刻文字列（HH:MM 24時間表記）
///
/// # 戻り値
/// 有効な時刻の場合はOk(())、無効な場合はエラー
pub fn validate_reminder_time(time_str: &str) -> AppResult<()> {
    if !REMINDER_TIME_PATTERN.is_match(time_str) {
        return Err(AppError::validation(
            "リマインダー時刻はHH:MM形式（24時間表記）で入力してください",
        ));
    }
    Ok(())
}

/// リマインダー時刻文字列をNaiveTimeに変換
///
/// 秒以下は常にゼロとして扱う。
///
/// # 引数
/// * `time_str` - 時刻文字列（HH:MM形式）
///
/// # 戻り値
/// 解析された時刻、形式が不正な場合はエラー
pub fn parse_reminder_time(time_str: &str) -> AppResult<NaiveTime> {
    validate_reminder_time(time_str)?;
    NaiveTime::parse_from_str(time_str, "%H:%M")
        .map_err(|_| AppError::validation("リマインダー時刻の解析に失敗しました"))
}

/// 文字列の長さバリデーション
///
/// # 引数
/// * `text` - 検証対象の文字列
/// * `max_length` - 最大文字数
/// * `field_name` - フィールド名（エラーメッセージ用）
///
/// # 戻り値
/// 有効な長さの場合はOk(())、無効な場合はエラー
pub fn validate_text_length(text: &str, max_length: usize, field_name: &str) -> AppResult<()> {
    let char_count = text.chars().count();
    if char_count > max_length {
        return Err(AppError::validation(format!(
            "{field_name}は{max_length}文字以内で入力してください（現在: {char_count}文字）"
        )));
    }
    Ok(())
}

/// 必須フィールドのバリデーション
///
/// # 引数
/// * `text` - 検証対象の文字列
/// * `field_name` - フィールド名（エラーメッセージ用）
///
/// # 戻り値
/// 空でない場合はOk(())、空の場合はエラー
pub fn validate_required_field(text: &str, field_name: &str) -> AppResult<()> {
    if text.trim().is_empty() {
        return Err(AppError::validation(format!("{field_name}は必須項目です")));
    }
    Ok(())
}

/// 説明文のバリデーション
///
/// # 引数
/// * `description` - 説明文（Option）
///
/// # 戻り値
/// 有効な説明文の場合はOk(())、無効な場合はエラー
///
/// # バリデーション規則
/// - 500文字以内であること（Noneの場合は有効）
pub fn validate_description(description: &Option<String>) -> AppResult<()> {
    if let Some(desc) = description {
        validate_text_length(desc, 500, "説明")?;
    }
    Ok(())
}

/// 現在の日時をJST（日本標準時）で取得
///
/// # 戻り値
/// JSTのDateTime
pub fn now_jst() -> DateTime<chrono_tz::Tz> {
    Utc::now().with_timezone(&Tokyo)
}

/// 現在の日時をJST（日本標準時）のRFC3339文字列で取得
///
/// # 戻り値
/// JST形式のRFC3339文字列
pub fn get_current_jst_timestamp() -> String {
    now_jst().to_rfc3339()
}

/// 日付文字列に日数を加算
///
/// 繰り返しサイクルの次回作業日の計算に使用する。
///
/// # 引数
/// * `date_str` - 日付文字列（YYYY-MM-DD形式）
/// * `days` - 加算する日数
///
/// # 戻り値
/// 加算後の日付文字列（YYYY-MM-DD形式）
pub fn add_days_to_date(date_str: &str, days: i64) -> AppResult<String> {
    let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .map_err(|_| AppError::validation("日付の形式が正しくありません"))?;
    let shifted = date
        .checked_add_signed(Duration::days(days))
        .ok_or_else(|| AppError::validation("日付の範囲を超えています"))?;
    Ok(shifted.format("%Y-%m-%d").to_string())
}

/// 今日の日付をYYYY-MM-DD形式で取得（JST基準）
///
/// # 戻り値
/// 今日の日付文字列
pub fn get_today_date_jst() -> String {
    now_jst().format("%Y-%m-%d").to_string()
}

/// 文字列の正規化（前後の空白を削除）
///
/// # 引数
/// * `text` - 正規化対象の文字列
///
/// # 戻り値
/// 正規化された文字列
pub fn normalize_string(text: &str) -> String {
    text.trim().to_string()
}

/// 金額を文字列形式でフォーマット
///
/// # 引数
/// * `amount` - 金額
///
/// # 戻り値
/// フォーマットされた金額文字列
pub fn format_amount(amount: f64) -> String {
    // 小数点以下が0の場合は整数として表示
    if amount.fract() == 0.0 {
        format!("{amount:.0}")
    } else {
        format!("{amount:.2}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_date() {
        // 有効な日付
        assert!(validate_date("2024-01-01").is_ok());
        assert!(validate_date("2024-12-31").is_ok());
        assert!(validate_date("2000-02-29").is_ok()); // うるう年

        // 無効な日付
        assert!(validate_date("2024-13-01").is_err()); // 無効な月
        assert!(validate_date("2024-02-30").is_err()); // 無効な日
        assert!(validate_date("2023-02-29").is_err()); // 非うるう年
        assert!(validate_date("24-01-01").is_err()); // 形式エラー
        assert!(validate_date("2024/01/01").is_err()); // 区切り文字エラー
        assert!(validate_date("1899-01-01").is_err()); // 年の範囲外
        assert!(validate_date("2101-01-01").is_err()); // 年の範囲外
    }

    #[test]
    fn test_validate_amount() {
        // 有効な金額
        assert!(validate_amount(0.0).is_ok()); // 未請求
        assert!(validate_amount(1.0).is_ok());
        assert!(validate_amount(100.50).is_ok());
        assert!(validate_amount(9999999999.0).is_ok());

        // 無効な金額
        assert!(validate_amount(-1.0).is_err()); // 負の数
        assert!(validate_amount(10000000000.0).is_err()); // 上限超過
        assert!(validate_amount(f64::INFINITY).is_err()); // 無限大
        assert!(validate_amount(f64::NAN).is_err()); // NaN
    }

    #[test]
    fn test_validate_reminder_time() {
        // 有効な時刻
        assert!(validate_reminder_time("09:00").is_ok());
        assert!(validate_reminder_time("00:00").is_ok());
        assert!(validate_reminder_time("23:59").is_ok());

        // 無効な時刻
        assert!(validate_reminder_time("24:00").is_err()); // 時の範囲外
        assert!(validate_reminder_time("12:60").is_err()); // 分の範囲外
        assert!(validate_reminder_time("9:00").is_err()); // ゼロ埋めなし
        assert!(validate_reminder_time("09:00:00").is_err()); // 秒付き
        assert!(validate_reminder_time("朝9時").is_err()); // 形式外
        assert!(validate_reminder_time("").is_err());
    }

    #[test]
    fn test_parse_reminder_time() {
        let time = parse_reminder_time("09:30").unwrap();
        assert_eq!(time.format("%H:%M:%S").to_string(), "09:30:00");

        assert!(parse_reminder_time("25:00").is_err());
    }

    #[test]
    fn test_validate_text_length() {
        // 有効な長さ
        assert!(validate_text_length("短いテキスト", 10, "テスト").is_ok());
        assert!(validate_text_length("", 10, "テスト").is_ok());

        // 無効な長さ
        assert!(validate_text_length("これは非常に長いテキストです", 5, "テスト").is_err());
    }

    #[test]
    fn test_validate_required_field() {
        // 有効な値
        assert!(validate_required_field("有効な値", "テスト").is_ok());
        assert!(validate_required_field("  有効な値  ", "テスト").is_ok()); // 前後の空白は許可

        // 無効な値
        assert!(validate_required_field("", "テスト").is_err());
        assert!(validate_required_field("   ", "テスト").is_err()); // 空白のみ
    }

    #[test]
    fn test_validate_description() {
        // 有効な説明
        assert!(validate_description(&None).is_ok());
        assert!(validate_description(&Some("短い説明".to_string())).is_ok());

        // 無効な説明
        assert!(validate_description(&Some("a".repeat(501))).is_err()); // 501文字
    }

    #[test]
    fn test_get_current_jst_timestamp() {
        let timestamp = get_current_jst_timestamp();

        // RFC3339形式であることを確認
        assert!(timestamp.contains('T'));
        assert!(timestamp.contains('+') || timestamp.contains('Z'));
    }

    #[test]
    fn test_get_today_date_jst() {
        let today = get_today_date_jst();

        // YYYY-MM-DD形式であることを確認
        assert_eq!(today.len(), 10);
        assert!(validate_date(&today).is_ok());
    }

    #[test]
    fn test_add_days_to_date() {
        assert_eq!(add_days_to_date("2024-01-01", 7).unwrap(), "2024-01-08");
        assert_eq!(add_days_to_date("2024-02-28", 1).unwrap(), "2024-02-29"); // うるう年
        assert_eq!(add_days_to_date("2024-12-31", 1).unwrap(), "2025-01-01"); // 年またぎ
        assert_eq!(add_days_to_date("2024-01-08", -7).unwrap(), "2024-01-01");

        assert!(add_days_to_date("invalid", 7).is_err());
    }

    #[test]
    fn test_normalize_string() {
        assert_eq!(normalize_string("  テスト  "), "テスト");
        assert_eq!(normalize_string("テスト"), "テスト");
        assert_eq!(normalize_string("   "), "");
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(1000.0), "1000");
        assert_eq!(format_amount(1000.50), "1000.50");
        assert_eq!(format_amount(1234567.89), "1234567.89");
        assert_eq!(format_amount(0.01), "0.01");
    }
}
