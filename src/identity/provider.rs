use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use parking_lot::RwLock;
use password_hash::{PasswordHash, SaltString};
use tracing::info;

use super::principal::UserRecord;
use super::session::{SessionGrant, SessionStore};

pub(crate) fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let argon2 = Argon2::default();
    let phc = argon2.hash_password(password.as_bytes(), &salt).map_err(|e| anyhow!(e.to_string()))?.to_string();
    Ok(phc)
}

pub(crate) fn verify_password(hash: &str, password: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        let argon2 = Argon2::default();
        argon2.verify_password(password.as_bytes(), &parsed).is_ok()
    } else { false }
}

#[derive(Debug, Clone)]
struct StoredUser {
    record: UserRecord,
    password_hash: Option<String>,
}

/// Profile fields a user may change; `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

/// In-memory user directory. Cloning shares the same directory.
#[derive(Clone, Default)]
pub struct UserDirectory {
    users: Arc<RwLock<HashMap<String, StoredUser>>>,
}

impl UserDirectory {
    pub fn new() -> Self { Self::default() }

    /// Create a user. OAuth sign-ups pass no password and start without a credential.
    pub fn create(&self, email: &str, name: Option<&str>, password: Option<&str>) -> Result<UserRecord> {
        let email = email.trim().to_lowercase();
        if email.is_empty() { return Err(anyhow!("email_required")); }
        if self.find_by_email(&email).is_some() { return Err(anyhow!("email_taken")); }
        let password_hash = match password {
            Some(pw) => Some(hash_password(pw)?),
            None => None,
        };
        let record = UserRecord {
            id: uuid::Uuid::new_v4().simple().to_string(),
            email,
            name: name.map(|s| s.to_string()),
            has_password: Some(password_hash.is_some()),
            avatar_url: None,
            metadata: serde_json::Map::new(),
        };
        self.users.write().insert(record.id.clone(), StoredUser { record: record.clone(), password_hash });
        info!(target: "identity", user_id = %record.id, "user created");
        Ok(record)
    }

    pub fn get(&self, id: &str) -> Option<UserRecord> {
        self.users.read().get(id).map(|u| u.record.clone())
    }

    pub fn find_by_email(&self, email: &str) -> Option<UserRecord> {
        let needle = email.trim().to_lowercase();
        self.users.read().values().find(|u| u.record.email == needle).map(|u| u.record.clone())
    }

    pub fn update_profile(&self, id: &str, update: ProfileUpdate) -> Option<UserRecord> {
        let mut users = self.users.write();
        let u = users.get_mut(id)?;
        if let Some(name) = update.name { u.record.name = Some(name); }
        if let Some(avatar) = update.avatar_url { u.record.avatar_url = Some(avatar); }
        Some(u.record.clone())
    }

    /// Set (or replace) the user's password and mark the credential as present.
    pub fn set_password(&self, id: &str, password: &str) -> Result<UserRecord> {
        if password.is_empty() { return Err(anyhow!("password_required")); }
        let hash = hash_password(password)?;
        let mut users = self.users.write();
        let u = users.get_mut(id).ok_or_else(|| anyhow!("user_not_found"))?;
        u.password_hash = Some(hash);
        u.record.has_password = Some(true);
        Ok(u.record.clone())
    }

    /// Overwrite a user's free-form metadata map.
    pub fn set_metadata(&self, id: &str, metadata: serde_json::Map<String, serde_json::Value>) -> Option<UserRecord> {
        let mut users = self.users.write();
        let u = users.get_mut(id)?;
        u.record.metadata = metadata;
        Some(u.record.clone())
    }

    fn verify(&self, email: &str, password: &str) -> Option<UserRecord> {
        let needle = email.trim().to_lowercase();
        let users = self.users.read();
        let u = users.values().find(|u| u.record.email == needle)?;
        let hash = u.password_hash.as_deref()?;
        verify_password(hash, password).then(|| u.record.clone())
    }
}

#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct LoginResponse {
    pub user: UserRecord,
    pub session: SessionGrant,
}

pub trait AuthProvider: Send + Sync {
    fn login(&self, req: &LoginRequest) -> Result<LoginResponse>;
}

pub struct LocalAuthProvider {
    pub users: UserDirectory,
    pub sessions: SessionStore,
}

impl LocalAuthProvider {
    pub fn new(users: UserDirectory, sessions: SessionStore) -> Self { Self { users, sessions } }
}

impl AuthProvider for LocalAuthProvider {
    fn login(&self, req: &LoginRequest) -> Result<LoginResponse> {
        let Some(user) = self.users.verify(&req.email, &req.password) else {
            return Err(anyhow!("invalid_credentials"));
        };
        let session = self.sessions.issue(&user.id)?;
        info!(target: "identity", user_id = %user.id, "auth.login");
        Ok(LoginResponse { user, session })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_login_round_trip() {
        let users = UserDirectory::new();
        let u = users.create("Ada@Example.com", Some("Ada"), Some("s3cret")).unwrap();
        assert_eq!(u.email, "ada@example.com");
        assert_eq!(u.has_password, Some(true));
        let provider = LocalAuthProvider::new(users.clone(), SessionStore::default());
        let ok = provider.login(&LoginRequest { email: "ada@example.com".into(), password: "s3cret".into() }).unwrap();
        assert_eq!(ok.user.id, u.id);
        assert!(provider.sessions.validate_access(&ok.session.access_token).is_some());
        let bad = provider.login(&LoginRequest { email: "ada@example.com".into(), password: "nope".into() });
        assert_eq!(bad.unwrap_err().to_string(), "invalid_credentials");
    }

    #[test]
    fn oauth_user_gains_credential_when_password_set() {
        let users = UserDirectory::new();
        let u = users.create("grace@example.com", None, None).unwrap();
        assert_eq!(u.has_password, Some(false));
        let provider = LocalAuthProvider::new(users.clone(), SessionStore::default());
        assert!(provider.login(&LoginRequest { email: u.email.clone(), password: String::new() }).is_err());
        let updated = users.set_password(&u.id, "hunter2").unwrap();
        assert_eq!(updated.has_password, Some(true));
        assert!(provider.login(&LoginRequest { email: u.email, password: "hunter2".into() }).is_ok());
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let users = UserDirectory::new();
        users.create("a@b.c", None, None).unwrap();
        assert!(users.create(" A@B.C ", None, None).is_err());
    }
}
