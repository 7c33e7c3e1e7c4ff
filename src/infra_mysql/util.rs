use crate::application_port::AuthError;
use sqlx::mysql::MySqlDatabaseError;
use uuid::Uuid;

pub fn is_dup_key(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db) = err {
        if let Some(mysql_err) = db.try_downcast_ref::<MySqlDatabaseError>() {
            return mysql_err.number() == 1062; // ER_DUP_ENTRY
        }
    }

    false
}

/// Name of the unique index a duplicate-key error tripped, if MySQL reported one.
pub fn dup_key_name(err: &sqlx::Error) -> Option<String> {
    let sqlx::Error::Database(db) = err else {
        return None;
    };
    // Duplicate entry 'x' for key 'users.uk_users_email'
    let message = db.message();
    let start = message.rfind("for key '")? + "for key '".len();
    let end = message[start..].find('\'')? + start;
    Some(message[start..end].to_string())
}

pub fn store_err(e: sqlx::Error) -> AuthError {
    AuthError::Store(e.to_string())
}

#[inline]
pub fn uuid_from_bytes(bytes: &[u8]) -> Result<Uuid, AuthError> {
    Uuid::from_slice(bytes).map_err(|e| AuthError::Store(e.to_string()))
}
