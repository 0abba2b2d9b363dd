//! Accounts, password hashing and session tokens

use rand::{distributions::Alphanumeric, Rng};
use tracing::{info, warn};

use super::Backend;
use crate::error::{CoachError, Result};
use crate::models::{
    from_document, new_id, Collection, Entity, Role, Session, SessionOrigin, User, UserRecord,
};

const TOKEN_LEN: usize = 32;

pub fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

pub fn hash_password(password: &str, cost: u32) -> Result<String> {
    Ok(bcrypt::hash(password, cost)?)
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    Ok(bcrypt::verify(password, hash)?)
}

/// Account to create with `Backend::register_user`
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub password: String,
    pub name: String,
    pub role: Role,
    pub student_id: Option<String>,
}

impl Backend {
    pub fn register_user(&self, account: NewAccount) -> Result<User> {
        if account.password.len() < 6 {
            return Err(CoachError::validation("password must have at least 6 characters"));
        }
        if self.find_user(&account.username)?.is_some() {
            return Err(CoachError::validation(format!(
                "username '{}' is already taken",
                account.username
            )));
        }
        if let Some(student_id) = &account.student_id {
            self.get_student(student_id)?;
        }

        let record = UserRecord {
            profile: User {
                id: new_id("u"),
                username: account.username.trim().to_string(),
                name: account.name,
                role: account.role,
                student_id: account.student_id,
            },
            password_hash: hash_password(&account.password, self.password_cost)?,
        };
        record.validate()?;
        self.store
            .put(Collection::Users, record.id(), serde_json::to_value(&record)?)?;
        info!("Registered {:?} account '{}'", record.profile.role, record.profile.username);
        Ok(record.profile)
    }

    pub(crate) fn find_user(&self, username: &str) -> Result<Option<UserRecord>> {
        let username = username.trim();
        for doc in self.store.list(Collection::Users, None)? {
            let record: UserRecord = from_document(doc)?;
            if record.profile.username.eq_ignore_ascii_case(username) {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    /// Exchange credentials for a session token
    pub fn login(&self, username: &str, password: &str) -> Result<Session> {
        let record = match self.find_user(username)? {
            Some(record) => record,
            None => {
                warn!("Login for unknown user '{}'", username);
                return Err(CoachError::InvalidCredentials);
            }
        };
        if !verify_password(password, &record.password_hash)? {
            warn!("Wrong password for '{}'", username);
            return Err(CoachError::InvalidCredentials);
        }

        let token = generate_token();
        self.sessions
            .write()
            .map_err(|_| CoachError::Storage("session table lock poisoned".to_string()))?
            .insert(token.clone(), record.profile.id.clone());
        info!("User '{}' signed in", record.profile.username);

        Ok(Session {
            token,
            user: record.profile,
            origin: SessionOrigin::Local,
        })
    }

    /// Forget a session token; unknown tokens are ignored
    pub fn logout(&self, token: &str) -> Result<()> {
        let removed = self
            .sessions
            .write()
            .map_err(|_| CoachError::Storage("session table lock poisoned".to_string()))?
            .remove(token);
        if removed.is_some() {
            info!("Session closed");
        }
        Ok(())
    }

    pub fn session_user(&self, token: &str) -> Result<User> {
        let user_id = self
            .sessions
            .read()
            .map_err(|_| CoachError::Storage("session table lock poisoned".to_string()))?
            .get(token)
            .cloned()
            .ok_or(CoachError::Unauthenticated)?;
        self.get_user(&user_id)
    }

    pub fn get_user(&self, id: &str) -> Result<User> {
        let record: UserRecord = self.get_entity(id)?;
        Ok(record.profile)
    }
}
