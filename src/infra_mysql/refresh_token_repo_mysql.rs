use super::util::{store_err, uuid_from_bytes};
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};

pub struct MySqlRefreshTokenRepo {
    pool: MySqlPool,
}

impl MySqlRefreshTokenRepo {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlRefreshTokenRepo { pool }
    }

    fn row_to_record(row: MySqlRow) -> Result<RefreshTokenRecord, AuthError> {
        let token_id: Vec<u8> = row.try_get("id").map_err(store_err)?;
        let user_id: Vec<u8> = row.try_get("user_id").map_err(store_err)?;
        let expires_at: DateTime<Utc> = row.try_get("expires_at").map_err(store_err)?;
        let revoked_at: Option<DateTime<Utc>> = row.try_get("revoked_at").map_err(store_err)?;
        let created_at: DateTime<Utc> = row.try_get("created_at").map_err(store_err)?;

        Ok(RefreshTokenRecord {
            token_id: TokenId(uuid_from_bytes(&token_id)?),
            user_id: UserId(uuid_from_bytes(&user_id)?),
            secret_hash: row.try_get("token_hash").map_err(store_err)?,
            expires_at,
            revoked: row.try_get("revoked").map_err(store_err)?,
            revoked_at,
            created_at,
        })
    }
}

#[async_trait::async_trait]
impl RefreshTokenRepo for MySqlRefreshTokenRepo {
    async fn create(&self, token: &NewRefreshToken) -> Result<(), AuthError> {
        sqlx::query(
            r#"
INSERT INTO user_token (id, user_id, token_hash, expires_at, revoked)
VALUES (?, ?, ?, ?, FALSE)
"#,
        )
        .bind(token.token_id.0.as_bytes() as &[u8])
        .bind(token.user_id.0.as_bytes() as &[u8])
        .bind(&token.secret_hash)
        .bind(token.expires_at)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(())
    }

    async fn find_by_id(
        &self,
        token_id: TokenId,
    ) -> Result<Option<RefreshTokenRecord>, AuthError> {
        let row_opt: Option<MySqlRow> = sqlx::query(
            r#"
SELECT id, user_id, token_hash, expires_at, revoked, revoked_at, created_at
FROM user_token
WHERE id = ?
"#,
        )
        .bind(token_id.0.as_bytes() as &[u8])
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        row_opt.map(Self::row_to_record).transpose()
    }

    async fn revoke_if_not_revoked(
        &self,
        token_id: TokenId,
        revoked_at: DateTime<Utc>,
    ) -> Result<u64, AuthError> {
        let result = sqlx::query(
            r#"
UPDATE user_token
SET revoked = TRUE, revoked_at = ?
WHERE id = ? AND revoked = FALSE
"#,
        )
        .bind(revoked_at)
        .bind(token_id.0.as_bytes() as &[u8])
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(result.rows_affected())
    }

    async fn revoke_all_for_user(
        &self,
        user_id: UserId,
        revoked_at: DateTime<Utc>,
    ) -> Result<u64, AuthError> {
        let result = sqlx::query(
            r#"
UPDATE user_token
SET revoked = TRUE, revoked_at = ?
WHERE user_id = ? AND revoked = FALSE
"#,
        )
        .bind(revoked_at)
        .bind(user_id.0.as_bytes() as &[u8])
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(result.rows_affected())
    }
}
