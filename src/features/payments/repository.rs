use rusqlite::{params, Connection};

use super::cycle::{plan_cycle_completion, plan_payment};
use super::models::{CompleteCycleDto, Payment, RecordPaymentDto};
use crate::features::clients::models::{Client, ClientStatus, HistoryKind};
use crate::features::clients::repository as clients_repository;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::{get_current_jst_timestamp, get_today_date_jst};

/// 入金を記録する
///
/// 入金レコードの追加・履歴の追記・顧客金額の更新を
/// 1トランザクションで行う。
///
/// # 引数
/// * `conn` - データベース接続
/// * `client_id` - 顧客ID
/// * `dto` - 入金記録用DTO
/// * `user_id` - ユーザーID
///
/// # 戻り値
/// 更新された顧客、または失敗時はエラー
pub fn record_payment(
    conn: &Connection,
    client_id: i64,
    dto: RecordPaymentDto,
    user_id: &str,
) -> AppResult<Client> {
    let client = clients_repository::find_by_id(conn, client_id, user_id)?;

    // 書き込み前に入金を検証し、適用後の金額を導出する
    let plan = plan_payment(
        client.total_amount,
        client.received_amount,
        dto.amount,
        dto.is_full_payment,
    )?;

    let payment_date = dto.payment_date.unwrap_or_else(get_today_date_jst);
    let now = get_current_jst_timestamp();

    let tx = conn.unchecked_transaction()?;

    tx.execute(
        "INSERT INTO payments (user_id, client_id, amount, payment_date, notes, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            user_id,
            client_id,
            plan.amount,
            payment_date,
            dto.notes,
            now
        ],
    )?;

    clients_repository::append_history(
        &tx,
        client_id,
        &payment_date,
        HistoryKind::Payment,
        plan.amount,
        plan.status,
        dto.notes.as_deref(),
    )?;

    tx.execute(
        "UPDATE clients
         SET received_amount = ?1, remaining_amount = ?2, status = ?3, updated_at = ?4
         WHERE id = ?5 AND user_id = ?6",
        params![
            plan.received_amount,
            plan.remaining_amount,
            plan.status.as_str(),
            now,
            client_id,
            user_id
        ],
    )?;

    tx.commit()?;

    log::info!(
        "入金を記録しました: client_id={client_id}, amount={}",
        plan.amount
    );

    clients_repository::find_by_id(conn, client_id, user_id)
}

/// 作業サイクルを完了する
///
/// 最終入金（任意）とサイクル完了の履歴を残し、
/// 顧客を次サイクルの初期状態にリセットする。
/// 繰り返し間隔が設定されている場合は次回作業予定日も更新する。
///
/// # 引数
/// * `conn` - データベース接続
/// * `client_id` - 顧客ID
/// * `dto` - サイクル完了用DTO
/// * `user_id` - ユーザーID
///
/// # 戻り値
/// リセット後の顧客、または失敗時はエラー
pub fn complete_cycle(
    conn: &Connection,
    client_id: i64,
    dto: CompleteCycleDto,
    user_id: &str,
) -> AppResult<Client> {
    let client = clients_repository::find_by_id(conn, client_id, user_id)?;

    let completion_date = dto.completion_date.unwrap_or_else(get_today_date_jst);

    let plan = plan_cycle_completion(
        client.total_amount,
        client.received_amount,
        client.repeat_after_days,
        &completion_date,
        dto.payment_amount,
        dto.is_full_payment,
        dto.next_total_amount,
    )?;

    let now = get_current_jst_timestamp();

    let tx = conn.unchecked_transaction()?;

    // 最終入金があれば入金レコードと履歴を残す
    if let Some(ref payment) = plan.final_payment {
        tx.execute(
            "INSERT INTO payments (user_id, client_id, amount, payment_date, notes, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                user_id,
                client_id,
                payment.amount,
                completion_date,
                dto.notes,
                now
            ],
        )?;

        clients_repository::append_history(
            &tx,
            client_id,
            &completion_date,
            HistoryKind::Payment,
            payment.amount,
            payment.status,
            dto.notes.as_deref(),
        )?;
    }

    // サイクル完了の履歴を追記する
    let cycle_amount = plan
        .final_payment
        .as_ref()
        .map(|p| p.amount)
        .unwrap_or(0.0);
    clients_repository::append_history(
        &tx,
        client_id,
        &completion_date,
        HistoryKind::Cycle,
        cycle_amount,
        ClientStatus::Completed,
        Some("作業サイクル完了"),
    )?;

    // 顧客を次サイクルの初期状態にリセットする
    tx.execute(
        "UPDATE clients
         SET total_amount = ?1, received_amount = 0, remaining_amount = ?1, status = ?2,
             work_date = ?3, next_work_date = ?4, updated_at = ?5
         WHERE id = ?6 AND user_id = ?7",
        params![
            plan.next_total_amount,
            ClientStatus::Pending.as_str(),
            completion_date,
            plan.next_work_date,
            now,
            client_id,
            user_id
        ],
    )?;

    tx.commit()?;

    log::info!(
        "作業サイクルを完了しました: client_id={client_id}, next_work_date={:?}",
        plan.next_work_date
    );

    clients_repository::find_by_id(conn, client_id, user_id)
}

/// 顧客の入金一覧を取得する（新しい順）
///
/// # 引数
/// * `conn` - データベース接続
/// * `client_id` - 顧客ID
/// * `user_id` - ユーザーID
///
/// # 戻り値
/// 入金レコードのリスト、または失敗時はエラー
pub fn find_for_client(
    conn: &Connection,
    client_id: i64,
    user_id: &str,
) -> AppResult<Vec<Payment>> {
    // 顧客の存在と所有権を確認する
    clients_repository::find_by_id(conn, client_id, user_id)?;

    let mut stmt = conn.prepare(
        "SELECT id, client_id, amount, payment_date, notes, created_at
         FROM payments
         WHERE client_id = ?1 AND user_id = ?2
         ORDER BY payment_date DESC, id DESC",
    )?;

    let payments = stmt.query_map(params![client_id, user_id], |row| {
        Ok(Payment {
            id: row.get(0)?,
            client_id: row.get(1)?,
            amount: row.get(2)?,
            payment_date: row.get(3)?,
            notes: row.get(4)?,
            created_at: row.get(5)?,
        })
    })?;

    payments
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::Database(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::clients::models::{CreateClientDto, UpdateClientDto};
    use crate::shared::database::connection::create_in_memory_connection;

    /// 指定した金額状態の顧客を作成する
    fn seed_client(
        conn: &Connection,
        total: f64,
        received: f64,
        repeat_after_days: i64,
    ) -> Client {
        let client = clients_repository::create(
            conn,
            CreateClientDto {
                name: "テスト顧客".to_string(),
                mobile: None,
                address: None,
                work_description: None,
                work_date: Some("2024-06-01".to_string()),
                next_work_date: None,
                reminder_time: None,
                repeat_after_days: Some(repeat_after_days),
                total_amount: Some(total),
            },
            "user-a",
        )
        .unwrap();

        if received > 0.0 {
            clients_repository::update(
                conn,
                client.id,
                UpdateClientDto {
                    name: None,
                    mobile: None,
                    address: None,
                    work_description: None,
                    work_date: None,
                    next_work_date: None,
                    reminder_time: None,
                    repeat_after_days: None,
                    total_amount: None,
                    received_amount: Some(received),
                },
                "user-a",
            )
            .unwrap()
        } else {
            client
        }
    }

    fn payment_dto(amount: Option<f64>, is_full: bool) -> RecordPaymentDto {
        RecordPaymentDto {
            amount,
            payment_date: Some("2024-06-10".to_string()),
            notes: None,
            is_full_payment: is_full,
        }
    }

    #[test]
    fn test_record_payment_updates_client_and_history() {
        let conn = create_in_memory_connection().unwrap();
        let client = seed_client(&conn, 1000.0, 0.0, 0);

        let updated =
            record_payment(&conn, client.id, payment_dto(Some(400.0), false), "user-a").unwrap();

        assert_eq!(updated.received_amount, 400.0);
        assert_eq!(updated.remaining_amount, 600.0);
        assert_eq!(updated.status, ClientStatus::Partial);

        // 履歴にPaymentレコードが追記されている
        assert_eq!(updated.history.len(), 1);
        assert_eq!(updated.history[0].kind, HistoryKind::Payment);
        assert_eq!(updated.history[0].amount, 400.0);
        assert_eq!(updated.history[0].status, ClientStatus::Partial);
        assert_eq!(updated.history[0].date, "2024-06-10");

        // 入金レコードも保存されている
        let payments = find_for_client(&conn, client.id, "user-a").unwrap();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].amount, 400.0);
    }

    #[test]
    fn test_record_full_payment() {
        let conn = create_in_memory_connection().unwrap();
        let client = seed_client(&conn, 1000.0, 400.0, 0);

        let updated =
            record_payment(&conn, client.id, payment_dto(None, true), "user-a").unwrap();

        assert_eq!(updated.received_amount, 1000.0);
        assert_eq!(updated.remaining_amount, 0.0);
        assert_eq!(updated.status, ClientStatus::Completed);

        // 充当額は残額と一致する
        let payments = find_for_client(&conn, client.id, "user-a").unwrap();
        assert_eq!(payments[0].amount, 600.0);
    }

    #[test]
    fn test_record_payment_rejects_overpayment_without_side_effects() {
        let conn = create_in_memory_connection().unwrap();
        let client = seed_client(&conn, 1000.0, 400.0, 0);

        let result = record_payment(&conn, client.id, payment_dto(Some(700.0), false), "user-a");
        assert!(result.is_err());

        // 顧客も履歴も入金も変化していない
        let unchanged = clients_repository::find_by_id(&conn, client.id, "user-a").unwrap();
        assert_eq!(unchanged.received_amount, 400.0);
        assert!(unchanged.history.is_empty());
        assert!(find_for_client(&conn, client.id, "user-a")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_record_payment_is_scoped_to_user() {
        let conn = create_in_memory_connection().unwrap();
        let client = seed_client(&conn, 1000.0, 0.0, 0);

        let result = record_payment(&conn, client.id, payment_dto(Some(400.0), false), "user-b");
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    fn cycle_dto(
        payment_amount: Option<f64>,
        is_full: bool,
        next_total: Option<f64>,
    ) -> CompleteCycleDto {
        CompleteCycleDto {
            completion_date: Some("2024-06-15".to_string()),
            payment_amount,
            is_full_payment: is_full,
            notes: None,
            next_total_amount: next_total,
        }
    }

    #[test]
    fn test_complete_cycle_with_full_payment_resets_client() {
        let conn = create_in_memory_connection().unwrap();
        let client = seed_client(&conn, 1000.0, 400.0, 0);

        let updated =
            complete_cycle(&conn, client.id, cycle_dto(None, true, None), "user-a").unwrap();

        // 次サイクルの初期状態にリセットされる
        assert_eq!(updated.status, ClientStatus::Pending);
        assert_eq!(updated.received_amount, 0.0);
        assert_eq!(updated.total_amount, 1000.0);
        assert_eq!(updated.remaining_amount, 1000.0);
        assert_eq!(updated.work_date, "2024-06-15");
        assert!(updated.next_work_date.is_none());

        // 履歴は入金とサイクル完了の2件（記録順）
        assert_eq!(updated.history.len(), 2);
        assert_eq!(updated.history[0].kind, HistoryKind::Payment);
        assert_eq!(updated.history[0].amount, 600.0);
        assert_eq!(updated.history[0].status, ClientStatus::Completed);
        assert_eq!(updated.history[1].kind, HistoryKind::Cycle);
        assert_eq!(updated.history[1].amount, 600.0);
    }

    #[test]
    fn test_complete_cycle_sets_next_work_date_from_repeat() {
        let conn = create_in_memory_connection().unwrap();
        let client = seed_client(&conn, 1000.0, 1000.0, 7);

        let updated =
            complete_cycle(&conn, client.id, cycle_dto(None, false, None), "user-a").unwrap();

        // 完了日の7日後が次回作業予定日になる
        assert_eq!(updated.next_work_date.as_deref(), Some("2024-06-22"));
    }

    #[test]
    fn test_complete_cycle_without_payment() {
        let conn = create_in_memory_connection().unwrap();
        let client = seed_client(&conn, 1000.0, 1000.0, 0);

        let updated =
            complete_cycle(&conn, client.id, cycle_dto(None, false, None), "user-a").unwrap();

        // 入金なしなのでサイクル完了の履歴のみ
        assert_eq!(updated.history.len(), 1);
        assert_eq!(updated.history[0].kind, HistoryKind::Cycle);
        assert_eq!(updated.history[0].amount, 0.0);
        assert!(find_for_client(&conn, client.id, "user-a")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_complete_cycle_with_new_total() {
        let conn = create_in_memory_connection().unwrap();
        let client = seed_client(&conn, 1000.0, 1000.0, 0);

        let updated = complete_cycle(
            &conn,
            client.id,
            cycle_dto(None, false, Some(2500.0)),
            "user-a",
        )
        .unwrap();

        assert_eq!(updated.total_amount, 2500.0);
        assert_eq!(updated.remaining_amount, 2500.0);
        assert_eq!(updated.status, ClientStatus::Pending);
    }

    #[test]
    fn test_complete_cycle_clears_previous_next_work_date() {
        let conn = create_in_memory_connection().unwrap();
        let client = seed_client(&conn, 1000.0, 1000.0, 0);

        // 先に次回予定日を設定しておく
        clients_repository::set_next_work_date(&conn, client.id, "user-a", Some("2024-07-01"))
            .unwrap();

        let updated =
            complete_cycle(&conn, client.id, cycle_dto(None, false, None), "user-a").unwrap();

        // 繰り返しなしのサイクル完了で予定日は解除される
        assert!(updated.next_work_date.is_none());
    }

    #[test]
    fn test_complete_cycle_rejects_invalid_payment_without_side_effects() {
        let conn = create_in_memory_connection().unwrap();
        let client = seed_client(&conn, 1000.0, 400.0, 7);

        let result = complete_cycle(
            &conn,
            client.id,
            cycle_dto(Some(9999.0), false, None),
            "user-a",
        );
        assert!(result.is_err());

        let unchanged = clients_repository::find_by_id(&conn, client.id, "user-a").unwrap();
        assert_eq!(unchanged.received_amount, 400.0);
        assert!(unchanged.history.is_empty());
        assert!(unchanged.next_work_date.is_none());
    }

    #[test]
    fn test_find_for_client_orders_newest_first() {
        let conn = create_in_memory_connection().unwrap();
        let client = seed_client(&conn, 1000.0, 0.0, 0);

        record_payment(
            &conn,
            client.id,
            RecordPaymentDto {
                amount: Some(100.0),
                payment_date: Some("2024-06-01".to_string()),
                notes: Some("1回目".to_string()),
                is_full_payment: false,
            },
            "user-a",
        )
        .unwrap();
        record_payment(
            &conn,
            client.id,
            RecordPaymentDto {
                amount: Some(200.0),
                payment_date: Some("2024-06-05".to_string()),
                notes: Some("2回目".to_string()),
                is_full_payment: false,
            },
            "user-a",
        )
        .unwrap();

        let payments = find_for_client(&conn, client.id, "user-a").unwrap();
        assert_eq!(payments.len(), 2);
        assert_eq!(payments[0].payment_date, "2024-06-05");
        assert_eq!(payments[1].payment_date, "2024-06-01");
    }
}
