// User records and role checks
use crate::model::{AuthError, StorageError};
use crate::storage::DocumentStore;
use crate::utils::now_rfc3339;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub hashed_password: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default = "active")]
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<String>,
}

fn active() -> bool {
    true
}

impl User {
    /// Administrator identity used by the maintenance CLI.
    pub fn local_operator() -> Self {
        Self {
            username: "cli".to_string(),
            email: None,
            full_name: None,
            hashed_password: String::new(),
            role: Role::Admin,
            is_active: true,
            created_at: None,
        }
    }
}

/// Public view of a user, without the password hash.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserProfile {
    pub username: String,
    pub email: Option<String>,
    pub role: Role,
    pub is_active: bool,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role,
            is_active: user.is_active,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    pub password: String,
    #[serde(default)]
    pub role: Role,
}

/// Password hashing lives with the authentication layer; the store only
/// needs these two operations.
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, password: &str) -> Result<String, AuthError>;
    fn verify(&self, password: &str, hashed: &str) -> bool;
}

/// Reads require an active account.
pub fn authorize_read(user: &User) -> Result<(), AuthError> {
    if user.is_active {
        Ok(())
    } else {
        Err(AuthError::Inactive)
    }
}

/// Writes require an active administrator.
pub fn authorize_admin(user: &User) -> Result<(), AuthError> {
    authorize_read(user)?;
    if user.role == Role::Admin {
        Ok(())
    } else {
        Err(AuthError::Forbidden)
    }
}

type UserMap = BTreeMap<String, User>;

/// Users persisted as one JSON object keyed by username.
pub struct UserStore<S: DocumentStore + ?Sized> {
    store: Arc<S>,
    file_name: String,
}

impl<S: DocumentStore + ?Sized> UserStore<S> {
    pub fn new(store: Arc<S>, file_name: &str) -> Self {
        Self {
            store,
            file_name: file_name.to_string(),
        }
    }

    async fn load(&self) -> Result<UserMap, StorageError> {
        let mut users: UserMap = match self.store.read(&self.file_name).await? {
            Some(text) => serde_json::from_str(&text)?,
            None => UserMap::new(),
        };
        for (key, user) in users.iter_mut() {
            if user.username.is_empty() {
                user.username = key.clone();
            }
        }
        Ok(users)
    }

    async fn save(&self, users: &UserMap) -> Result<(), StorageError> {
        let text = serde_json::to_string_pretty(users)?;
        self.store.write(&self.file_name, &text).await
    }

    pub async fn list(&self) -> Result<Vec<UserProfile>, AuthError> {
        Ok(self.load().await?.values().map(UserProfile::from).collect())
    }

    pub async fn get(&self, username: &str) -> Result<Option<User>, AuthError> {
        Ok(self.load().await?.remove(username))
    }

    pub async fn create(&self, new_user: NewUser, hasher: &dyn PasswordHasher) -> Result<User, AuthError> {
        let mut users = self.load().await?;
        if users.contains_key(&new_user.username) {
            return Err(AuthError::UserExists(new_user.username));
        }
        if let Some(email) = &new_user.email {
            if users.values().any(|u| u.email.as_ref() == Some(email)) {
                return Err(AuthError::EmailTaken(email.clone()));
            }
        }

        let user = User {
            hashed_password: hasher.hash(&new_user.password)?,
            username: new_user.username,
            email: new_user.email,
            full_name: new_user.full_name,
            role: new_user.role,
            is_active: true,
            created_at: Some(now_rfc3339()),
        };
        users.insert(user.username.clone(), user.clone());
        self.save(&users).await?;
        info!("Created user {} ({:?})", user.username, user.role);
        Ok(user)
    }

    pub async fn update_role(&self, username: &str, role: Role) -> Result<User, AuthError> {
        self.modify(username, |user| user.role = role).await
    }

    /// Blocks or unblocks an account; `actor` cannot block themselves.
    pub async fn set_active(&self, actor: &User, username: &str, active: bool) -> Result<User, AuthError> {
        if actor.username == username && !active {
            return Err(AuthError::SelfBlock);
        }
        self.modify(username, |user| user.is_active = active).await
    }

    async fn modify(&self, username: &str, change: impl FnOnce(&mut User)) -> Result<User, AuthError> {
        let mut users = self.load().await?;
        let user = users
            .get_mut(username)
            .ok_or_else(|| AuthError::UserNotFound(username.to_string()))?;
        change(user);
        let updated = user.clone();
        self.save(&users).await?;
        Ok(updated)
    }

    /// Returns the user when the password matches an active account.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
        hasher: &dyn PasswordHasher,
    ) -> Result<Option<User>, AuthError> {
        let Some(user) = self.get(username).await? else {
            info!("Login for unknown user {}", username);
            return Ok(None);
        };
        if !user.is_active {
            info!("Login for blocked user {}", username);
            return Ok(None);
        }
        if user.hashed_password.is_empty() || !hasher.verify(password, &user.hashed_password) {
            info!("Wrong password for {}", username);
            return Ok(None);
        }
        Ok(Some(user))
    }

    /// Creates an `admin` account when no administrator exists yet.
    pub async fn ensure_default_admin(
        &self,
        password: &str,
        hasher: &dyn PasswordHasher,
    ) -> Result<bool, AuthError> {
        let users = self.load().await?;
        if users.values().any(|u| u.role == Role::Admin) {
            return Ok(false);
        }
        warn!("No administrator found, creating the default one");
        self.create(
            NewUser {
                username: "admin".to_string(),
                email: None,
                full_name: None,
                password: password.to_string(),
                role: Role::Admin,
            },
            hasher,
        )
        .await?;
        Ok(true)
    }
}
