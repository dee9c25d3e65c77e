use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex};

use crate::features::auth::models::User;
use crate::shared::errors::{AppError, AppResult};

/// ユーザーデータのリポジトリ
///
/// メールアドレスとパスワードによるユーザーの作成・取得を提供する
#[derive(Clone)]
pub struct UserRepository {
    /// データベース接続
    db_connection: Arc<Mutex<Connection>>,
}

impl UserRepository {
    /// 新しいUserRepositoryインスタンスを作成する
    ///
    /// # 引数
    /// * `db_connection` - データベース接続
    ///
    /// # 戻り値
    /// UserRepositoryインスタンス
    pub fn new(db_connection: Arc<Mutex<Connection>>) -> Self {
        Self { db_connection }
    }

    /// 新規ユーザーを作成する
    ///
    /// # 引数
    /// * `email` - 正規化済みメールアドレス
    /// * `name` - 表示名
    /// * `password_hash` - ハッシュ化済みパスワード
    ///
    /// # 戻り値
    /// 作成されたユーザー情報、失敗時はエラー
    pub async fn create_user(
        &self,
        email: &str,
        name: &str,
        password_hash: &str,
    ) -> AppResult<User> {
        let conn = self
            .db_connection
            .lock()
            .map_err(|e| AppError::concurrency(format!("データベースロック取得失敗: {e}")))?;

        // nanoIdを生成
        let user_id = crate::shared::utils::nanoid::generate_user_id();

        // 作成日時をJSTで生成
        let timestamp = crate::shared::utils::get_current_jst_timestamp();

        conn.execute(
            "INSERT INTO users (id, email, name, password_hash, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![user_id, email, name, password_hash, timestamp, timestamp],
        )?;

        // 作成されたユーザー情報を取得して返す
        self.find_by_id_internal(&conn, &user_id)?
            .ok_or_else(|| AppError::Database("作成されたユーザーの取得に失敗".to_string()))
    }

    /// メールアドレスでユーザーを取得する
    ///
    /// # 引数
    /// * `email` - 正規化済みメールアドレス
    ///
    /// # 戻り値
    /// ユーザー情報（存在しない場合はNone）、失敗時はエラー
    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let conn = self
            .db_connection
            .lock()
            .map_err(|e| AppError::concurrency(format!("データベースロック取得失敗: {e}")))?;

        let mut stmt = conn.prepare(
            "SELECT id, email, name, password_hash, created_at, updated_at
             FROM users
             WHERE email = ?1",
        )?;

        let mut user_iter = stmt.query_map(params![email], |row| self.row_to_user(row))?;

        match user_iter.next() {
            Some(user) => Ok(Some(user?)),
            None => Ok(None),
        }
    }

    /// ユーザーIDでユーザーを取得する
    ///
    /// # 引数
    /// * `user_id` - ユーザーID（nanoId形式）
    ///
    /// # 戻り値
    /// ユーザー情報（存在しない場合はNone）、失敗時はエラー
    pub async fn find_by_id(&self, user_id: &str) -> AppResult<Option<User>> {
        let conn = self
            .db_connection
            .lock()
            .map_err(|e| AppError::concurrency(format!("データベースロック取得失敗: {e}")))?;

        self.find_by_id_internal(&conn, user_id)
    }

    /// 内部用：ユーザーIDでユーザーを取得する
    fn find_by_id_internal(&self, conn: &Connection, user_id: &str) -> AppResult<Option<User>> {
        let mut stmt = conn.prepare(
            "SELECT id, email, name, password_hash, created_at, updated_at
             FROM users
             WHERE id = ?1",
        )?;

        let mut user_iter = stmt.query_map(params![user_id], |row| self.row_to_user(row))?;

        match user_iter.next() {
            Some(user) => Ok(Some(user?)),
            None => Ok(None),
        }
    }

    /// データベース行からUserオブジェクトを作成する
    fn row_to_user(&self, row: &Row) -> Result<User, rusqlite::Error> {
        let created_at_str: String = row.get(4)?;
        let updated_at_str: String = row.get(5)?;

        // RFC3339形式の文字列をDateTime<Utc>に変換
        let created_at = DateTime::parse_from_rfc3339(&created_at_str)
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    4,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?
            .with_timezone(&Utc);

        let updated_at = DateTime::parse_from_rfc3339(&updated_at_str)
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    5,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?
            .with_timezone(&Utc);

        Ok(User {
            id: row.get(0)?,
            email: row.get(1)?,
            name: row.get(2)?,
            password_hash: row.get(3)?,
            created_at,
            updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::database::connection::create_in_memory_connection;
    use std::sync::{Arc, Mutex};

    /// テスト用のUserRepositoryを作成する
    fn create_test_repository() -> UserRepository {
        let conn = create_in_memory_connection().unwrap();
        let db_connection = Arc::new(Mutex::new(conn));
        UserRepository::new(db_connection)
    }

    #[tokio::test]
    async fn test_create_user() {
        let repository = create_test_repository();

        let user = repository
            .create_user("taro@example.com", "太郎", "v1$salt$hash")
            .await
            .unwrap();

        // ユーザー情報が正しく設定されていることを確認
        assert_eq!(user.email, "taro@example.com");
        assert_eq!(user.name, "太郎");
        assert_eq!(user.password_hash, "v1$salt$hash");
        // IDがnanoId形式（21文字）であることを確認
        assert_eq!(user.id.len(), 21);
    }

    #[tokio::test]
    async fn test_create_user_duplicate_email() {
        let repository = create_test_repository();

        repository
            .create_user("taro@example.com", "太郎", "v1$salt$hash")
            .await
            .unwrap();

        // 同じメールアドレスで再登録するとUNIQUE制約違反になる
        let result = repository
            .create_user("taro@example.com", "次郎", "v1$salt$hash2")
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_find_by_email() {
        let repository = create_test_repository();

        let created = repository
            .create_user("hanako@example.com", "花子", "v1$salt$hash")
            .await
            .unwrap();

        let found = repository
            .find_by_email("hanako@example.com")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(created.id, found.id);
        assert_eq!(created.email, found.email);
    }

    #[tokio::test]
    async fn test_find_by_email_not_found() {
        let repository = create_test_repository();

        let result = repository.find_by_email("nobody@example.com").await.unwrap();

        // Noneが返されることを確認
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_find_by_id() {
        let repository = create_test_repository();

        let created = repository
            .create_user("taro@example.com", "太郎", "v1$salt$hash")
            .await
            .unwrap();

        let found = repository.find_by_id(&created.id).await.unwrap().unwrap();

        assert_eq!(created.id, found.id);
        assert_eq!(created.email, found.email);
    }

    #[tokio::test]
    async fn test_find_by_id_not_found() {
        let repository = create_test_repository();

        let result = repository.find_by_id("nonexistent_id").await.unwrap();

        assert!(result.is_none());
    }
}
