//! # Client Accounts
//!
//! Registered storefront users and the directory that creates and
//! authenticates them. Passwords are stored as argon2 PHC strings only.

use crate::error::{ShopError, ShopResult};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tokio::sync::RwLock;
use tracing::{info, warn};

/// A registered user account
#[derive(Debug, Clone, Serialize)]
pub struct Client {
    pub id: u64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<NaiveDate>,
    pub is_staff: bool,
    pub is_superuser: bool,
    #[serde(skip_serializing)]
    password_hash: String,
    pub date_joined: DateTime<Utc>,
}

impl Client {
    /// "First Last", or the username when no name was given.
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }

}

/// Fields accepted by [`ClientDirectory::create_user`]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewClient {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub is_staff: bool,
    #[serde(default)]
    pub is_superuser: bool,
}

impl NewClient {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            ..Default::default()
        }
    }

    /// Builder: set email
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    /// Builder: set first and last name
    pub fn with_name(mut self, first: impl Into<String>, last: impl Into<String>) -> Self {
        self.first_name = first.into();
        self.last_name = last.into();
        self
    }

    /// Builder: set birth date
    pub fn with_birth_date(mut self, date: NaiveDate) -> Self {
        self.birth_date = Some(date);
        self
    }

    /// Builder: grant staff and superuser flags
    pub fn with_flags(mut self, is_staff: bool, is_superuser: bool) -> Self {
        self.is_staff = is_staff;
        self.is_superuser = is_superuser;
        self
    }
}

#[derive(Debug, Default)]
struct Directory {
    clients: HashMap<u64, Client>,
    next_id: u64,
}

/// Shared account store
#[derive(Debug, Clone, Default)]
pub struct ClientDirectory {
    inner: Arc<RwLock<Directory>>,
}

impl ClientDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account. Usernames are unique; empty username or password
    /// is rejected.
    pub async fn create_user(&self, new: NewClient) -> ShopResult<Client> {
        let username = new.username.trim().to_string();
        if username.is_empty() {
            return Err(ShopError::InvalidRequest("username is required".to_string()));
        }
        if new.password.is_empty() {
            return Err(ShopError::InvalidRequest("password is required".to_string()));
        }

        let password_hash = hash_password(&new.password)?;

        let mut dir = self.inner.write().await;
        if dir.clients.values().any(|c| c.username == username) {
            return Err(ShopError::DuplicateUsername { username });
        }

        dir.next_id += 1;
        let client = Client {
            id: dir.next_id,
            username,
            email: new.email,
            first_name: new.first_name,
            last_name: new.last_name,
            birth_date: new.birth_date,
            is_staff: new.is_staff,
            is_superuser: new.is_superuser,
            password_hash,
            date_joined: Utc::now(),
        };
        dir.clients.insert(client.id, client.clone());

        info!(client_id = client.id, username = %client.username, "client created");
        Ok(client)
    }

    /// Verify a username/password pair.
    ///
    /// The argon2 check runs on the blocking pool with the directory unlocked.
    /// Unknown usernames are checked against a throwaway hash so they take as
    /// long as a wrong password.
    pub async fn authenticate(&self, username: &str, password: &str) -> ShopResult<Client> {
        let client = self
            .inner
            .read()
            .await
            .clients
            .values()
            .find(|c| c.username == username)
            .cloned();

        let stored_hash = match &client {
            Some(client) => client.password_hash.clone(),
            None => unknown_user_hash(),
        };
        let password = password.to_string();
        let verified = tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash))
            .await
            .map_err(|e| ShopError::Internal(format!("password check failed: {}", e)))?;

        match client {
            Some(client) if verified => Ok(client),
            _ => Err(ShopError::InvalidCredentials),
        }
    }

    pub async fn get(&self, id: u64) -> Option<Client> {
        self.inner.read().await.clients.get(&id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.clients.len()
    }
}

fn hash_password(password: &str) -> ShopResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ShopError::Internal(format!("password hashing failed: {}", e)))
}

fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!(error = %e, "stored password hash is malformed");
            false
        }
    }
}

/// Hash that no submitted password matches, computed once.
fn unknown_user_hash() -> String {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| {
        let salt = SaltString::generate(&mut OsRng);
        let unguessable = salt.as_str().repeat(2);
        hash_password(&unguessable).unwrap_or_default()
    })
    .clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin() -> NewClient {
        NewClient::new("admin", "AdminPass123")
            .with_name("Admin", "Admin")
            .with_email("admin@gmail.com")
            .with_birth_date(NaiveDate::from_ymd_opt(1990, 1, 1).unwrap())
            .with_flags(true, true)
    }

    #[tokio::test]
    async fn test_create_user_keeps_profile_fields() {
        let directory = ClientDirectory::new();
        let client = directory.create_user(admin()).await.unwrap();

        assert_eq!(client.id, 1);
        assert_eq!(client.email, "admin@gmail.com");
        assert!(client.is_staff && client.is_superuser);
        assert_eq!(client.display_name(), "Admin Admin");
        assert_ne!(client.password_hash, "AdminPass123");
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let directory = ClientDirectory::new();
        directory.create_user(admin()).await.unwrap();

        let err = directory.create_user(admin()).await.unwrap_err();
        assert!(matches!(err, ShopError::DuplicateUsername { .. }));
        assert_eq!(directory.len().await, 1);
    }

    #[tokio::test]
    async fn test_authenticate() {
        let directory = ClientDirectory::new();
        let created = directory
            .create_user(NewClient::new("User", "UserPass123").with_email("user@gmail.com"))
            .await
            .unwrap();

        let client = directory.authenticate("User", "UserPass123").await.unwrap();
        assert_eq!(client.id, created.id);
        assert_eq!(client.display_name(), "User");

        assert!(matches!(
            directory.authenticate("User", "wrong").await,
            Err(ShopError::InvalidCredentials)
        ));
        assert!(matches!(
            directory.authenticate("nobody", "UserPass123").await,
            Err(ShopError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_unknown_user_hash_is_a_real_argon2_hash() {
        let hash = unknown_user_hash();
        assert!(PasswordHash::new(&hash).is_ok());
        assert_eq!(hash, unknown_user_hash());
        assert!(!verify_password("", &hash));
    }

    #[tokio::test]
    async fn test_authenticate_does_not_block_writers() {
        let directory = ClientDirectory::new();
        directory
            .create_user(NewClient::new("User", "UserPass123"))
            .await
            .unwrap();

        let (login, signup) = tokio::join!(
            directory.authenticate("User", "UserPass123"),
            directory.create_user(NewClient::new("Other", "OtherPass123")),
        );
        assert!(login.is_ok());
        assert!(signup.is_ok());
        assert_eq!(directory.len().await, 2);
    }

    #[tokio::test]
    async fn test_empty_fields_rejected() {
        let directory = ClientDirectory::new();
        assert!(directory.create_user(NewClient::new("", "pw")).await.is_err());
        assert!(directory.create_user(NewClient::new("bob", "")).await.is_err());
    }

    #[tokio::test]
    async fn test_password_hash_never_serialized() {
        let directory = ClientDirectory::new();
        let client = directory
            .create_user(NewClient::new("testuser", "testpass"))
            .await
            .unwrap();

        let json = serde_json::to_value(&client).unwrap();
        assert_eq!(json["username"], "testuser");
        assert!(json.get("password_hash").is_none());
        assert!(!json.to_string().contains("argon2"));
    }
}
