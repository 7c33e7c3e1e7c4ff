use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use dashmap::DashMap;
use std::sync::{Arc, Mutex};

pub struct MemoryUserRepo {
    users: DashMap<UserId, UserRecord>,
    // Serialises the uniqueness check with the insert.
    create_lock: Mutex<()>,
    clock: Arc<dyn Clock>,
}

impl MemoryUserRepo {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        MemoryUserRepo {
            users: DashMap::new(),
            create_lock: Mutex::new(()),
            clock,
        }
    }

    fn find(&self, pred: impl Fn(&UserRecord) -> bool) -> Option<UserRecord> {
        self.users
            .iter()
            .find(|u| pred(u.value()))
            .map(|u| u.value().clone())
    }
}

#[async_trait::async_trait]
impl UserRepo for MemoryUserRepo {
    async fn create(&self, user: &NewUser) -> Result<UserRecord, AuthError> {
        let _guard = self
            .create_lock
            .lock()
            .map_err(|e| AuthError::Store(e.to_string()))?;

        if self.find(|u| u.username == user.username).is_some() {
            return Err(AuthError::UsernameAlreadyExists);
        }
        if self.find(|u| u.email == user.email).is_some() {
            return Err(AuthError::EmailAlreadyExists);
        }

        let record = UserRecord {
            user_id: user.user_id,
            username: user.username.clone(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            display_name: user.display_name.clone(),
            roles: user.roles.clone(),
            created_at: self.clock.now(),
        };
        self.users.insert(record.user_id, record.clone());
        Ok(record)
    }

    async fn find_by_id(&self, user_id: UserId) -> Result<Option<UserRecord>, AuthError> {
        Ok(self.users.get(&user_id).map(|u| u.value().clone()))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, AuthError> {
        Ok(self.find(|u| u.username == username))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, AuthError> {
        Ok(self.find(|u| u.email == email))
    }

    async fn username_exists(&self, username: &str) -> Result<bool, AuthError> {
        Ok(self.find(|u| u.username == username).is_some())
    }

    async fn email_exists(&self, email: &str) -> Result<bool, AuthError> {
        Ok(self.find(|u| u.email == email).is_some())
    }

    async fn count(&self) -> Result<u64, AuthError> {
        Ok(self.users.len() as u64)
    }
}
