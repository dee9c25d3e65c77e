use chrono::DateTime;
use chrono_tz::Tz;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

use crate::features::clients::{repository as clients_repository, Client};
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::{add_days_to_date, now_jst};

use super::notifier::{DueReminder, NotificationSink};
use super::schedule::{evaluate, ReminderKey, ScheduleDecision};

/// 定期再スキャンの間隔（秒）
const RESCAN_INTERVAL_SECS: u64 = 300;

/// スケジューラーの稼働状況
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReminderStats {
    pub running: bool,
    pub armed: usize,
    pub notified_today: usize,
    pub pending_recurrence: usize,
}

/// スケジューラーの内部状態
///
/// ロックは短時間の同期処理でのみ保持する（保持したままawaitしない）。
#[derive(Default)]
struct SchedulerState {
    /// スケジュール済みリマインダー（キー -> 発火待ちタスク）
    scheduled: HashMap<ReminderKey, tokio::task::JoinHandle<()>>,
    /// 当日すでに発火したキー。JST深夜0時にクリアする
    notified: HashSet<ReminderKey>,
    /// 保存に失敗した次回予定日（顧客ID -> 予定日）。次回スキャンで再試行する
    pending_recurrence: HashMap<i64, String>,
}

struct SchedulerInner {
    db_connection: Arc<Mutex<Connection>>,
    sink: Arc<dyn NotificationSink>,
    user_id: String,
    state: Mutex<SchedulerState>,
    cancellation_token: CancellationToken,
}

/// セッションごとのリマインダースケジューラー
///
/// 顧客の次回作業予定日とリマインダー時刻からタイマーをセットし、
/// 発火時に通知シンクへ送る。リマインダー自体は保存せず、
/// スキャンのたびに顧客データから導出し直す。
///
/// # 処理内容
/// 1. 開始時と5分間隔で顧客一覧をスキャンし、24時間以内の予定にタイマーをセット
/// 2. 発火時に通知し、繰り返し設定があれば次回予定日を保存して再スケジュール
/// 3. JST深夜0時に当日の発火記録をクリアして再スキャン
/// 4. 停止時は全タイマーを中断して状態をクリア
#[derive(Clone)]
pub struct ReminderScheduler {
    inner: Arc<SchedulerInner>,
}

impl ReminderScheduler {
    /// # 引数
    /// * `db_connection` - 共有データベース接続
    /// * `sink` - 発火時の通知先
    /// * `user_id` - 対象ユーザーのID
    pub fn new(
        db_connection: Arc<Mutex<Connection>>,
        sink: Arc<dyn NotificationSink>,
        user_id: String,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                db_connection,
                sink,
                user_id,
                state: Mutex::new(SchedulerState::default()),
                cancellation_token: CancellationToken::new(),
            }),
        }
    }

    /// スケジューラーを開始する
    ///
    /// 初回スキャンを即座に実行し、以降は5分間隔の再スキャンと
    /// JST深夜0時のリセットをバックグラウンドで繰り返す。
    pub fn start(&self) {
        let scheduler = self.clone();
        tauri::async_runtime::spawn(async move {
            scheduler.run_loop().await;
        });
        log::info!(
            "リマインダースケジューラーを開始しました: user_id={}",
            self.inner.user_id
        );
    }

    /// スケジューラーを停止する
    ///
    /// 再スキャンループと待機中の全タイマーをキャンセルし、状態をクリアする。
    pub fn stop(&self) {
        self.inner.cancellation_token.cancel();
        self.cancel_all();
        log::info!(
            "リマインダースケジューラーを停止しました: user_id={}",
            self.inner.user_id
        );
    }

    /// 稼働状況を取得する
    pub fn stats(&self) -> ReminderStats {
        match self.lock_state() {
            Ok(state) => ReminderStats {
                running: !self.inner.cancellation_token.is_cancelled(),
                armed: state.scheduled.len(),
                notified_today: state.notified.len(),
                pending_recurrence: state.pending_recurrence.len(),
            },
            Err(e) => {
                log::error!("稼働状況の取得に失敗しました: {}", e.user_message());
                ReminderStats::default()
            }
        }
    }

    /// 再スキャンと日付変更リセットのループ
    async fn run_loop(&self) {
        let mut rescan_timer =
            tokio::time::interval(std::time::Duration::from_secs(RESCAN_INTERVAL_SECS));

        loop {
            tokio::select! {
                _ = self.inner.cancellation_token.cancelled() => {
                    log::debug!(
                        "スケジューラーループを終了します: user_id={}",
                        self.inner.user_id
                    );
                    break;
                }
                _ = rescan_timer.tick() => {
                    if let Err(e) = self.scan_once() {
                        log::error!("リマインダーの再スキャンに失敗しました: {}", e.user_message());
                    }
                }
                _ = tokio::time::sleep(duration_until_midnight_jst()) => {
                    self.reset_for_new_day();
                    if let Err(e) = self.scan_once() {
                        log::error!("日付変更後の再スキャンに失敗しました: {}", e.user_message());
                    }
                }
            }
        }
    }

    /// 保留中の書き込みを再試行し、最新の顧客一覧からリマインダーをセットする
    fn scan_once(&self) -> AppResult<()> {
        self.scan_at(now_jst())
    }

    fn scan_at(&self, now: DateTime<Tz>) -> AppResult<()> {
        self.retry_pending_recurrence();

        // データベース接続を取得
        let clients = {
            let conn = self.lock_db()?;
            clients_repository::find_with_next_work_date(&conn, &self.inner.user_id)?
        };

        for client in &clients {
            self.schedule_reminder(client, now);
        }

        Ok(())
    }

    /// 顧客1件のリマインダーを判定してセットする
    fn schedule_reminder(&self, client: &Client, now: DateTime<Tz>) {
        let next_work_date = match client.next_work_date.as_deref() {
            Some(date) => date,
            None => return,
        };

        let key = ReminderKey {
            client_id: client.id,
            next_work_date: next_work_date.to_string(),
        };
        let reminder = DueReminder::from_client(client, next_work_date);
        self.schedule_key(key, reminder, client.repeat_after_days, now);
    }

    fn schedule_key(
        &self,
        key: ReminderKey,
        reminder: DueReminder,
        repeat_after_days: i64,
        now: DateTime<Tz>,
    ) {
        // 通知済み・セット済みのキーはスキップする（再スキャンは追加のみ）
        match self.lock_state() {
            Ok(state) => {
                if state.notified.contains(&key) || state.scheduled.contains_key(&key) {
                    return;
                }
            }
            Err(e) => {
                log::error!("スケジューラー状態の参照に失敗しました: {}", e.user_message());
                return;
            }
        }

        match evaluate(&key.next_work_date, &reminder.reminder_time, now) {
            Ok(ScheduleDecision::Arm(delay)) => self.arm(key, delay, reminder, repeat_after_days),
            Ok(ScheduleDecision::FireNow) => self.on_fire(&key, &reminder, repeat_after_days),
            Ok(ScheduleDecision::Expired) => {
                log::debug!("発火時刻を過ぎているためリマインダーを破棄しました: key={key}");
            }
            Ok(ScheduleDecision::Deferred) => {
                // 24時間超の予定は次回以降のスキャンで拾う
            }
            Err(e) => {
                log::warn!(
                    "リマインダー時刻を解析できません: key={key}, {}",
                    e.user_message()
                );
            }
        }
    }

    /// 指定時間後に発火するタイマーをセットする
    fn arm(
        &self,
        key: ReminderKey,
        delay: std::time::Duration,
        reminder: DueReminder,
        repeat_after_days: i64,
    ) {
        let scheduler = self.clone();
        let token = self.inner.cancellation_token.clone();
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    scheduler.on_fire(&task_key, &reminder, repeat_after_days);
                }
            }
        });

        match self.lock_state() {
            Ok(mut state) => {
                // 同じキーのタイマーが残っていれば置き換える
                if let Some(old) = state.scheduled.insert(key.clone(), handle) {
                    old.abort();
                }
                log::debug!(
                    "リマインダーをセットしました: key={key}, {}秒後に発火",
                    delay.as_secs()
                );
            }
            Err(e) => {
                handle.abort();
                log::error!("タイマーの登録に失敗しました: key={key}, {}", e.user_message());
            }
        }
    }

    /// リマインダーの発火処理
    ///
    /// # 処理内容
    /// 1. 通知済みのキーなら何もしない（二重発火の防止）
    /// 2. 発火を記録してタイマーを外し、通知シンクへ送る（失敗しても続行）
    /// 3. 繰り返し設定があれば次回予定日を保存して再スケジュールする
    fn on_fire(&self, key: &ReminderKey, reminder: &DueReminder, repeat_after_days: i64) {
        if self.inner.cancellation_token.is_cancelled() {
            return;
        }

        match self.lock_state() {
            Ok(mut state) => {
                if !state.notified.insert(key.clone()) {
                    state.scheduled.remove(key);
                    return;
                }
                state.scheduled.remove(key);
            }
            Err(e) => {
                log::error!("発火記録の更新に失敗しました: key={key}, {}", e.user_message());
                return;
            }
        }

        // 通知はベストエフォート。失敗しても繰り返しの記録は続行する
        match self.inner.sink.notify(reminder) {
            Ok(()) => log::info!("リマインダーを発火しました: key={key}"),
            Err(e) => log::warn!("リマインダー通知に失敗しました: key={key}, {}", e.user_message()),
        }

        if repeat_after_days > 0 {
            match add_days_to_date(&key.next_work_date, repeat_after_days) {
                Ok(next_date) => {
                    self.advance_recurrence(key.client_id, &next_date, reminder, repeat_after_days);
                }
                Err(e) => {
                    log::error!(
                        "次回予定日の計算に失敗しました: key={key}, {}",
                        e.user_message()
                    );
                }
            }
        }
    }

    /// 次回予定日を保存し、新しい予定で再スケジュールする
    ///
    /// データベース要因で保存に失敗した場合は保留リストに積み、次回スキャンで
    /// 再試行する。顧客がすでに存在しない場合は再試行せず破棄する。
    /// タイマー側の発火記録はロールバックしない（通知自体は行われたため）。
    fn advance_recurrence(
        &self,
        client_id: i64,
        next_date: &str,
        reminder: &DueReminder,
        repeat_after_days: i64,
    ) {
        if let Err(e) = self.persist_next_work_date(client_id, next_date) {
            match e {
                AppError::Database(_) | AppError::Concurrency(_) => {
                    log::error!(
                        "次回予定日の保存に失敗しました。次回スキャンで再試行します: client_id={client_id}, {}",
                        e.user_message()
                    );
                    match self.lock_state() {
                        Ok(mut state) => {
                            state.pending_recurrence.insert(client_id, next_date.to_string());
                        }
                        Err(e) => {
                            log::error!("保留リストへの追加に失敗しました: {}", e.user_message());
                        }
                    }
                }
                _ => {
                    log::warn!(
                        "対象の顧客が存在しないため次回予定日を破棄します: client_id={client_id}, {}",
                        e.user_message()
                    );
                }
            }
            return;
        }

        log::info!(
            "次回予定日を更新しました: client_id={client_id}, next_work_date={next_date}"
        );

        let next_key = ReminderKey {
            client_id,
            next_work_date: next_date.to_string(),
        };
        let mut next_reminder = reminder.clone();
        next_reminder.work_date = next_date.to_string();
        self.schedule_key(next_key, next_reminder, repeat_after_days, now_jst());
    }

    /// 保存に失敗していた次回予定日を再試行する
    fn retry_pending_recurrence(&self) {
        let pending: Vec<(i64, String)> = match self.lock_state() {
            Ok(mut state) => state.pending_recurrence.drain().collect(),
            Err(e) => {
                log::error!("保留リストの取得に失敗しました: {}", e.user_message());
                return;
            }
        };

        for (client_id, next_date) in pending {
            match self.persist_next_work_date(client_id, &next_date) {
                Ok(()) => {
                    log::info!(
                        "保留中の次回予定日を保存しました: client_id={client_id}, next_work_date={next_date}"
                    );
                }
                Err(e @ (AppError::Database(_) | AppError::Concurrency(_))) => {
                    log::warn!(
                        "次回予定日の保存に再度失敗しました: client_id={client_id}, {}",
                        e.user_message()
                    );
                    if let Ok(mut state) = self.lock_state() {
                        state.pending_recurrence.insert(client_id, next_date);
                    }
                }
                Err(e) => {
                    log::warn!(
                        "対象の顧客が存在しないため保留中の次回予定日を破棄します: client_id={client_id}, {}",
                        e.user_message()
                    );
                }
            }
        }
    }

    fn persist_next_work_date(&self, client_id: i64, next_date: &str) -> AppResult<()> {
        let conn = self.lock_db()?;
        clients_repository::set_next_work_date(&conn, client_id, &self.inner.user_id, Some(next_date))
    }

    /// 日付変更時のリセット
    ///
    /// 発火記録とタイマー記録をクリアする。セット済みのタイマー自体は
    /// そのまま走らせ、発火側のnotified再チェックで二重通知を防ぐ。
    fn reset_for_new_day(&self) {
        match self.lock_state() {
            Ok(mut state) => {
                let armed = state.scheduled.len();
                let notified = state.notified.len();
                state.scheduled.clear();
                state.notified.clear();
                log::info!(
                    "日付が変わったためリマインダー記録をクリアしました: armed={armed}, notified={notified}"
                );
            }
            Err(e) => {
                log::error!("日付変更リセットに失敗しました: {}", e.user_message());
            }
        }
    }

    /// 全タイマーを中断して状態をクリアする
    fn cancel_all(&self) {
        match self.lock_state() {
            Ok(mut state) => {
                for (_, handle) in state.scheduled.drain() {
                    handle.abort();
                }
                state.notified.clear();
                state.pending_recurrence.clear();
            }
            Err(e) => {
                log::error!("スケジューラー状態のクリアに失敗しました: {}", e.user_message());
            }
        }
    }

    fn lock_state(&self) -> AppResult<MutexGuard<'_, SchedulerState>> {
        self.inner
            .state
            .lock()
            .map_err(|e| AppError::concurrency(format!("スケジューラー状態のロック取得に失敗: {e}")))
    }

    fn lock_db(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.inner
            .db_connection
            .lock()
            .map_err(|e| AppError::concurrency(format!("データベースロックの取得に失敗: {e}")))
    }
}

/// 次のJST深夜0時までの待機時間を計算する
fn duration_until_midnight_jst() -> std::time::Duration {
    let now = now_jst();
    now.date_naive()
        .succ_opt()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .and_then(|naive| naive.and_local_timezone(now.timezone()).single())
        .and_then(|midnight| midnight.signed_duration_since(now).to_std().ok())
        .unwrap_or(std::time::Duration::from_secs(3600))
}

/// Tauri管理状態として保持する稼働中スケジューラーの置き場
///
/// セッションごとに1つのスケジューラーを持つ。開始時は置き換え、
/// ログアウト時は取り外して停止する。
#[derive(Default)]
pub struct SchedulerHandle {
    inner: Mutex<Option<ReminderScheduler>>,
}

impl SchedulerHandle {
    /// 稼働中のスケジューラーを新しいものと置き換え、古いものを返す
    pub fn replace(&self, scheduler: ReminderScheduler) -> Option<ReminderScheduler> {
        match self.inner.lock() {
            Ok(mut guard) => guard.replace(scheduler),
            Err(e) => {
                log::error!("スケジューラーハンドルのロック取得に失敗: {e}");
                None
            }
        }
    }

    /// 稼働中のスケジューラーを取り外す
    pub fn take(&self) -> Option<ReminderScheduler> {
        match self.inner.lock() {
            Ok(mut guard) => guard.take(),
            Err(e) => {
                log::error!("スケジューラーハンドルのロック取得に失敗: {e}");
                None
            }
        }
    }

    /// 稼働中のスケジューラーを参照して処理を実行する
    pub fn with<R>(&self, f: impl FnOnce(&ReminderScheduler) -> R) -> Option<R> {
        match self.inner.lock() {
            Ok(guard) => guard.as_ref().map(f),
            Err(e) => {
                log::error!("スケジューラーハンドルのロック取得に失敗: {e}");
                None
            }
        }
    }
}
