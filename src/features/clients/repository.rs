use rusqlite::{params, Connection, Row};

use super::models::{Client, ClientStatus, CreateClientDto, HistoryEntry, HistoryKind, UpdateClientDto};
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::{get_current_jst_timestamp, get_today_date_jst, normalize_string};

/// デフォルトのリマインダー時刻
const DEFAULT_REMINDER_TIME: &str = "09:00";

/// 顧客を作成する
///
/// # 引数
/// * `conn` - データベース接続
/// * `dto` - 顧客作成用DTO
/// * `user_id` - ユーザーID
///
/// # 戻り値
/// 作成された顧客、または失敗時はエラー
pub fn create(conn: &Connection, dto: CreateClientDto, user_id: &str) -> AppResult<Client> {
    let now = get_current_jst_timestamp();

    let work_date = dto.work_date.unwrap_or_else(get_today_date_jst);
    let reminder_time = dto
        .reminder_time
        .unwrap_or_else(|| DEFAULT_REMINDER_TIME.to_string());
    let repeat_after_days = dto.repeat_after_days.unwrap_or(0);
    let total_amount = dto.total_amount.unwrap_or(0.0);

    // 新規顧客は入金なしで開始する
    let status = ClientStatus::derive(total_amount, 0.0);

    conn.execute(
        "INSERT INTO clients (user_id, name, mobile, address, work_description, work_date,
                              next_work_date, reminder_time, repeat_after_days,
                              total_amount, received_amount, remaining_amount, status,
                              is_active, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0, ?10, ?11, 1, ?12, ?12)",
        params![
            user_id,
            dto.name.trim(),
            clean_optional(dto.mobile),
            clean_optional(dto.address),
            clean_optional(dto.work_description),
            work_date,
            clean_optional(dto.next_work_date),
            reminder_time,
            repeat_after_days,
            total_amount,
            status.as_str(),
            now
        ],
    )?;

    let id = conn.last_insert_rowid();
    find_by_id(conn, id, user_id)
}

/// IDで顧客を取得する（履歴付き）
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - 顧客ID
/// * `user_id` - ユーザーID
///
/// # 戻り値
/// 顧客、または失敗時はエラー
pub fn find_by_id(conn: &Connection, id: i64, user_id: &str) -> AppResult<Client> {
    let mut client = conn
        .query_row(
            &format!("{CLIENT_SELECT} WHERE id = ?1 AND user_id = ?2"),
            params![id, user_id],
            row_to_client,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                AppError::NotFound(format!("ID {id} の顧客が見つかりません"))
            }
            _ => AppError::Database(e.to_string()),
        })?;

    client.history = load_history(conn, client.id)?;
    Ok(client)
}

/// アクティブな顧客一覧を取得する（作成日の新しい順）
///
/// # 引数
/// * `conn` - データベース接続
/// * `user_id` - ユーザーID
///
/// # 戻り値
/// 顧客のリスト、または失敗時はエラー
pub fn find_all(conn: &Connection, user_id: &str) -> AppResult<Vec<Client>> {
    let query = format!(
        "{CLIENT_SELECT} WHERE user_id = ?1 AND is_active = 1 ORDER BY created_at DESC, id DESC"
    );

    let mut stmt = conn.prepare(&query)?;
    let clients = stmt.query_map([user_id], row_to_client)?;

    let mut result = clients
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::Database(e.to_string()))?;

    for client in &mut result {
        client.history = load_history(conn, client.id)?;
    }

    Ok(result)
}

/// 顧客を更新する
///
/// 金額が変更された場合、入金済み額を請求額の範囲にクランプし、
/// 残額とステータスを再導出する。
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - 顧客ID
/// * `dto` - 顧客更新用DTO
/// * `user_id` - ユーザーID
///
/// # 戻り値
/// 更新された顧客、または失敗時はエラー
pub fn update(
    conn: &Connection,
    id: i64,
    dto: UpdateClientDto,
    user_id: &str,
) -> AppResult<Client> {
    let now = get_current_jst_timestamp();

    // 既存の顧客を取得
    let existing = find_by_id(conn, id, user_id)?;

    // 更新するフィールドを決定
    let name = dto.name.map(|s| s.trim().to_string()).unwrap_or(existing.name);
    let mobile = merge_optional(dto.mobile, existing.mobile);
    let address = merge_optional(dto.address, existing.address);
    let work_description = merge_optional(dto.work_description, existing.work_description);
    let work_date = dto.work_date.unwrap_or(existing.work_date);
    let reminder_time = dto.reminder_time.unwrap_or(existing.reminder_time);
    let repeat_after_days = dto.repeat_after_days.unwrap_or(existing.repeat_after_days);

    // 空文字列は予定日の解除を意味する
    let next_work_date = match dto.next_work_date {
        None => existing.next_work_date,
        Some(ref s) if s.trim().is_empty() => None,
        Some(s) => Some(s),
    };

    // 金額を再導出する（入金済み額は0以上かつ請求額以下にクランプ）
    let total_amount = dto.total_amount.unwrap_or(existing.total_amount);
    let received_amount = dto
        .received_amount
        .unwrap_or(existing.received_amount)
        .clamp(0.0, total_amount.max(0.0));
    let remaining_amount = total_amount - received_amount;
    let status = ClientStatus::derive(total_amount, received_amount);

    conn.execute(
        "UPDATE clients
         SET name = ?1, mobile = ?2, address = ?3, work_description = ?4, work_date = ?5,
             next_work_date = ?6, reminder_time = ?7, repeat_after_days = ?8,
             total_amount = ?9, received_amount = ?10, remaining_amount = ?11, status = ?12,
             updated_at = ?13
         WHERE id = ?14 AND user_id = ?15",
        params![
            name,
            mobile,
            address,
            work_description,
            work_date,
            next_work_date,
            reminder_time,
            repeat_after_days,
            total_amount,
            received_amount,
            remaining_amount,
            status.as_str(),
            now,
            id,
            user_id
        ],
    )?;

    find_by_id(conn, id, user_id)
}

/// 顧客を論理削除する
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - 顧客ID
/// * `user_id` - ユーザーID
///
/// # 戻り値
/// 成功時はOk(())、失敗時はエラー
pub fn deactivate(conn: &Connection, id: i64, user_id: &str) -> AppResult<()> {
    let now = get_current_jst_timestamp();

    let rows_affected = conn.execute(
        "UPDATE clients SET is_active = 0, updated_at = ?1 WHERE id = ?2 AND user_id = ?3",
        params![now, id, user_id],
    )?;

    if rows_affected == 0 {
        return Err(AppError::NotFound(format!(
            "ID {id} の顧客が見つかりません"
        )));
    }

    Ok(())
}

/// 顧客を全額入金済みにする（旧形式の完了操作）
///
/// 入金済み額を請求額まで引き上げ、ステータスをCompletedにする。
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - 顧客ID
/// * `user_id` - ユーザーID
///
/// # 戻り値
/// 更新された顧客、または失敗時はエラー
pub fn mark_completed(conn: &Connection, id: i64, user_id: &str) -> AppResult<Client> {
    let now = get_current_jst_timestamp();

    // 存在確認を兼ねて取得
    let existing = find_by_id(conn, id, user_id)?;
    let status = ClientStatus::derive(existing.total_amount, existing.total_amount);

    conn.execute(
        "UPDATE clients
         SET received_amount = total_amount, remaining_amount = 0, status = ?1, updated_at = ?2
         WHERE id = ?3 AND user_id = ?4",
        params![status.as_str(), now, id, user_id],
    )?;

    find_by_id(conn, id, user_id)
}

/// 次回作業予定日を設定する
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - 顧客ID
/// * `user_id` - ユーザーID
/// * `next_work_date` - 次回作業予定日（Noneで解除）
///
/// # 戻り値
/// 成功時はOk(())、失敗時はエラー
pub fn set_next_work_date(
    conn: &Connection,
    id: i64,
    user_id: &str,
    next_work_date: Option<&str>,
) -> AppResult<()> {
    let now = get_current_jst_timestamp();

    let rows_affected = conn.execute(
        "UPDATE clients SET next_work_date = ?1, updated_at = ?2 WHERE id = ?3 AND user_id = ?4",
        params![next_work_date, now, id, user_id],
    )?;

    if rows_affected == 0 {
        return Err(AppError::NotFound(format!(
            "ID {id} の顧客が見つかりません"
        )));
    }

    Ok(())
}

/// 次回作業予定日が設定されているアクティブな顧客を取得する
///
/// リマインダースケジューラーの定期スキャンで使用する。
///
/// # 引数
/// * `conn` - データベース接続
/// * `user_id` - ユーザーID
///
/// # 戻り値
/// 顧客のリスト（履歴なし）、または失敗時はエラー
pub fn find_with_next_work_date(conn: &Connection, user_id: &str) -> AppResult<Vec<Client>> {
    let query = format!(
        "{CLIENT_SELECT}
         WHERE user_id = ?1 AND is_active = 1 AND next_work_date IS NOT NULL
         ORDER BY next_work_date, reminder_time"
    );

    let mut stmt = conn.prepare(&query)?;
    let clients = stmt.query_map([user_id], row_to_client)?;

    clients
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::Database(e.to_string()))
}

/// 指定期間内に次回作業予定日があるアクティブな顧客を取得する
///
/// # 引数
/// * `conn` - データベース接続
/// * `user_id` - ユーザーID
/// * `from_date` - 期間開始日（YYYY-MM-DD形式、この日を含む）
/// * `to_date` - 期間終了日（YYYY-MM-DD形式、この日を含む）
///
/// # 戻り値
/// 顧客のリスト（履歴なし）、または失敗時はエラー
pub fn find_due_between(
    conn: &Connection,
    user_id: &str,
    from_date: &str,
    to_date: &str,
) -> AppResult<Vec<Client>> {
    let query = format!(
        "{CLIENT_SELECT}
         WHERE user_id = ?1 AND is_active = 1
           AND next_work_date IS NOT NULL
           AND next_work_date >= ?2 AND next_work_date <= ?3
         ORDER BY next_work_date, reminder_time"
    );

    let mut stmt = conn.prepare(&query)?;
    let clients = stmt.query_map(params![user_id, from_date, to_date], row_to_client)?;

    clients
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::Database(e.to_string()))
}

/// 履歴レコードを追記する
///
/// # 引数
/// * `conn` - データベース接続
/// * `client_id` - 顧客ID
/// * `date` - 記録日（YYYY-MM-DD形式）
/// * `kind` - レコード種別
/// * `amount` - 金額
/// * `status` - 記録時点のステータス
/// * `description` - 説明文
///
/// # 戻り値
/// 成功時はOk(())、失敗時はエラー
pub fn append_history(
    conn: &Connection,
    client_id: i64,
    date: &str,
    kind: HistoryKind,
    amount: f64,
    status: ClientStatus,
    description: Option<&str>,
) -> AppResult<()> {
    conn.execute(
        "INSERT INTO client_history (client_id, date, kind, amount, status, description)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            client_id,
            date,
            kind.as_str(),
            amount,
            status.as_str(),
            description
        ],
    )?;

    Ok(())
}

/// 顧客の履歴を記録順に取得する
///
/// # 引数
/// * `conn` - データベース接続
/// * `client_id` - 顧客ID
///
/// # 戻り値
/// 履歴レコードのリスト、または失敗時はエラー
pub fn load_history(conn: &Connection, client_id: i64) -> AppResult<Vec<HistoryEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, date, kind, amount, status, description
         FROM client_history
         WHERE client_id = ?1
         ORDER BY id",
    )?;

    let entries = stmt.query_map([client_id], |row| {
        let kind_str: String = row.get(2)?;
        let kind = HistoryKind::parse(&kind_str).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                format!("不正な履歴種別: {kind_str}").into(),
            )
        })?;

        let status_str: String = row.get(4)?;
        let status = ClientStatus::parse(&status_str).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                4,
                rusqlite::types::Type::Text,
                format!("不正なステータス: {status_str}").into(),
            )
        })?;

        Ok(HistoryEntry {
            id: row.get(0)?,
            date: row.get(1)?,
            kind,
            amount: row.get(3)?,
            status,
            description: row.get(5)?,
        })
    })?;

    entries
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::Database(e.to_string()))
}

/// 顧客取得クエリの共通SELECT句
const CLIENT_SELECT: &str = "SELECT id, name, mobile, address, work_description, work_date,
            next_work_date, reminder_time, repeat_after_days,
            total_amount, received_amount, remaining_amount, status, is_active,
            created_at, updated_at
     FROM clients";

/// データベース行からClientオブジェクトを作成する（履歴は空）
fn row_to_client(row: &Row) -> Result<Client, rusqlite::Error> {
    let status_str: String = row.get(12)?;
    let status = ClientStatus::parse(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            12,
            rusqlite::types::Type::Text,
            format!("不正なステータス: {status_str}").into(),
        )
    })?;

    Ok(Client {
        id: row.get(0)?,
        name: row.get(1)?,
        mobile: row.get(2)?,
        address: row.get(3)?,
        work_description: row.get(4)?,
        work_date: row.get(5)?,
        next_work_date: row.get(6)?,
        reminder_time: row.get(7)?,
        repeat_after_days: row.get(8)?,
        total_amount: row.get(9)?,
        received_amount: row.get(10)?,
        remaining_amount: row.get(11)?,
        status,
        is_active: row.get::<_, i64>(13)? != 0,
        history: Vec::new(),
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    })
}

/// 省略可能なテキストを整形する（前後空白除去、空ならNone）
fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|s| normalize_string(&s))
        .filter(|s| !s.is_empty())
}

/// 更新DTOの省略可能フィールドをマージする
fn merge_optional(new_value: Option<String>, existing: Option<String>) -> Option<String> {
    match new_value {
        Some(s) => clean_optional(Some(s)),
        None => existing,
    }
}
