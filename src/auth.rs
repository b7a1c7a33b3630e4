use std::collections::BTreeSet;

use chrono::Utc;
use serde::Deserialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;
use crate::models::{StoredUser, User, UserPreferences};
use crate::store::{Collection, RecordStore};
use crate::validation::ValidateExt;

/// The single key under which the active-user snapshot is stored.
pub const CURRENT_USER_KEY: &str = "current";

const SIGNUP_COINS: i64 = 100;
const WELCOME_BADGE: &str = "Welcome";

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: String,
}

/// Account creation and credential checks. Passwords are bcrypt-hashed
/// before they touch the store; the hash stays inside this module's
/// [`StoredUser`] records.
#[derive(Debug)]
pub struct Authenticator<'a> {
    store: &'a RecordStore,
}

impl<'a> Authenticator<'a> {
    pub fn new(store: &'a RecordStore) -> Self {
        Self { store }
    }

    /// Creates an account with the starter loadout and makes it the
    /// active user. A duplicate email is rejected.
    #[instrument(skip_all, fields(email = %request.email))]
    pub async fn signup(&self, request: SignupRequest) -> Result<User, AppError> {
        let request = request.validated()?;

        let users: Vec<StoredUser> = self.store.list_all(Collection::Users).await?;
        if users.iter().any(|u| u.user.email == request.email) {
            return Err(AppError::Validation(format!(
                "Email '{}' is already registered",
                request.email
            )));
        }

        let password_hash = bcrypt::hash(&request.password, bcrypt::DEFAULT_COST)?;
        let now = Utc::now();

        let user = User {
            id: Uuid::new_v4().to_string(),
            email: request.email,
            name: request.name,
            level: 1,
            coins: SIGNUP_COINS,
            xp: 0,
            badges: vec![WELCOME_BADGE.to_string()],
            achievements: BTreeSet::new(),
            created_at: now,
            last_login_at: now,
            preferences: UserPreferences::default(),
        };

        info!(user_id = %user.id, "Creating new user");
        let stored = StoredUser {
            user: user.clone(),
            password_hash,
        };
        self.store
            .put(Collection::Users, &user.id, &user.id, &stored)
            .await?;
        self.store
            .put(Collection::CurrentUser, CURRENT_USER_KEY, &user.id, &user)
            .await?;

        Ok(user)
    }

    /// Verifies credentials, stamps the login time, and snapshots the
    /// account as the active user. Unknown email and wrong password are
    /// indistinguishable to the caller.
    #[instrument(skip_all, fields(email))]
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AppError> {
        info!("Authenticating user");

        let users: Vec<StoredUser> = self.store.list_all(Collection::Users).await?;
        let stored = users.into_iter().find(|u| u.user.email == email);

        let mut stored = match stored {
            Some(stored) => stored,
            _ => {
                warn!("Login attempt for unknown email");
                return Err(AppError::Authentication(
                    "Invalid email or password".to_string(),
                ));
            }
        };

        let valid = match bcrypt::verify(password, &stored.password_hash) {
            Ok(valid) => valid,
            Err(_) => false,
        };
        if !valid {
            return Err(AppError::Authentication(
                "Invalid email or password".to_string(),
            ));
        }

        stored.user.last_login_at = Utc::now();
        self.store
            .put(Collection::Users, &stored.user.id, &stored.user.id, &stored)
            .await?;
        self.store
            .put(
                Collection::CurrentUser,
                CURRENT_USER_KEY,
                &stored.user.id,
                &stored.user,
            )
            .await?;

        info!(user_id = %stored.user.id, "Login successful");
        Ok(stored.user)
    }

    /// Clears the active-user snapshot. The account itself is untouched.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<(), AppError> {
        self.store.delete(Collection::CurrentUser, CURRENT_USER_KEY).await
    }

    #[instrument(skip(self))]
    pub async fn current_user(&self) -> Result<Option<User>, AppError> {
        self.store.get(Collection::CurrentUser, CURRENT_USER_KEY).await
    }
}
