use super::util::{dup_key_name, is_dup_key, store_err, uuid_from_bytes};
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{MySql, MySqlPool, Row};

const SELECT_USER: &str = r#"
SELECT user_id, username, email, password_hash, display_name, roles, created_at
FROM users
"#;

pub struct MySqlUserRepo {
    pool: MySqlPool,
}

impl MySqlUserRepo {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlUserRepo { pool }
    }

    fn row_to_record(row: MySqlRow) -> Result<UserRecord, AuthError> {
        let user_id: Vec<u8> = row.try_get("user_id").map_err(store_err)?;
        let roles: String = row.try_get("roles").map_err(store_err)?;
        let created_at: DateTime<Utc> = row.try_get("created_at").map_err(store_err)?;

        Ok(UserRecord {
            user_id: UserId(uuid_from_bytes(&user_id)?),
            username: row.try_get("username").map_err(store_err)?,
            email: row.try_get("email").map_err(store_err)?,
            password_hash: row.try_get("password_hash").map_err(store_err)?,
            display_name: row.try_get("display_name").map_err(store_err)?,
            roles: Roles::from_column(&roles).map_err(|e| AuthError::Store(e.to_string()))?,
            created_at,
        })
    }

    async fn find_one<T>(&self, column: &str, value: T) -> Result<Option<UserRecord>, AuthError>
    where
        T: for<'q> sqlx::Encode<'q, MySql> + sqlx::Type<MySql> + Send + 'static,
    {
        let sql = format!("{SELECT_USER}WHERE {column} = ?");
        let row_opt = sqlx::query(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;

        row_opt.map(Self::row_to_record).transpose()
    }

    async fn exists(&self, column: &str, value: &str) -> Result<bool, AuthError> {
        let sql = format!("SELECT COUNT(1) FROM users WHERE {column} = ?");
        let count: i64 = sqlx::query_scalar(&sql)
            .bind(value)
            .fetch_one(&self.pool)
            .await
            .map_err(store_err)?;

        Ok(count > 0)
    }
}

#[async_trait::async_trait]
impl UserRepo for MySqlUserRepo {
    async fn create(&self, user: &NewUser) -> Result<UserRecord, AuthError> {
        let result = sqlx::query(
            r#"
INSERT INTO users (user_id, username, email, password_hash, display_name, roles)
VALUES (?, ?, ?, ?, ?, ?)
"#,
        )
        .bind(user.user_id.0.as_bytes() as &[u8])
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.display_name)
        .bind(user.roles.to_column())
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            if is_dup_key(&e) {
                let key = dup_key_name(&e).unwrap_or_default();
                return Err(if key.contains("email") {
                    AuthError::EmailAlreadyExists
                } else {
                    AuthError::UsernameAlreadyExists
                });
            }
            return Err(store_err(e));
        }

        self.find_by_id(user.user_id)
            .await?
            .ok_or_else(|| AuthError::Store("inserted user not readable".to_string()))
    }

    async fn find_by_id(&self, user_id: UserId) -> Result<Option<UserRecord>, AuthError> {
        self.find_one("user_id", user_id.0.as_bytes().to_vec()).await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, AuthError> {
        self.find_one("username", username.to_string()).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, AuthError> {
        self.find_one("email", email.to_string()).await
    }

    async fn username_exists(&self, username: &str) -> Result<bool, AuthError> {
        self.exists("username", username).await
    }

    async fn email_exists(&self, email: &str) -> Result<bool, AuthError> {
        self.exists("email", email).await
    }

    async fn count(&self) -> Result<u64, AuthError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(store_err)?;

        Ok(count.max(0) as u64)
    }
}
