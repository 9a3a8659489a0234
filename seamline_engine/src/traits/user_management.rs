use thiserror::Error;

use crate::{
    db_types::{NewSuspension, NewUser, Role, Suspension, User},
    user_objects::ProfileUpdate,
};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UserApiError {
    #[error("Could not connect to the database. {0}")]
    DatabaseError(String),
    #[error("User {0} does not exist")]
    UserNotFound(String),
    #[error("Email {0} is already in use")]
    EmailInUse(String),
    #[error("Invalid user record: {0}")]
    ValidationError(String),
}

impl From<sqlx::Error> for UserApiError {
    fn from(e: sqlx::Error) -> Self {
        Self::DatabaseError(e.to_string())
    }
}

/// Storage contract for user records, profiles and suspensions.
#[allow(async_fn_in_trait)]
pub trait UserManagement {
    /// Inserts the user if the uid has not been seen before. The boolean is `true` when a new row
    /// was created, and `false` when the existing record was returned instead. A new uid carrying
    /// an email that belongs to another account fails with [`UserApiError::EmailInUse`].
    async fn insert_user(&self, user: NewUser) -> Result<(User, bool), UserApiError>;

    async fn fetch_user_by_uid(&self, uid: &str) -> Result<Option<User>, UserApiError>;

    async fn fetch_user_by_email(&self, email: &str) -> Result<Option<User>, UserApiError>;

    /// Users whose display name or email contains `search`, newest first, capped to a small page.
    async fn search_users(&self, search: Option<&str>) -> Result<Vec<User>, UserApiError>;

    async fn update_role(&self, id: i64, role: Role) -> Result<Option<User>, UserApiError>;

    /// Applies a partial profile update keyed by the caller's uid.
    async fn update_profile(&self, uid: &str, update: ProfileUpdate) -> Result<Option<User>, UserApiError>;

    async fn delete_user(&self, id: i64) -> Result<Option<User>, UserApiError>;

    /// Records the suspension and marks the user suspended in a single transaction.
    async fn suspend_user(&self, suspension: NewSuspension) -> Result<Suspension, UserApiError>;

    /// Suspension history for a user, most recent first.
    async fn suspensions_for_user(&self, user_id: i64) -> Result<Vec<Suspension>, UserApiError>;
}
