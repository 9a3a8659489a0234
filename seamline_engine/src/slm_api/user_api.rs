use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{NewSuspension, NewUser, Role, Suspension, User},
    traits::{UserApiError, UserManagement},
    user_objects::ProfileUpdate,
};

/// `UserApi` covers identity bookkeeping: upsert-on-login registration, profile edits, the admin
/// role and suspension controls, and the lookups the authentication layer leans on.
pub struct UserApi<B> {
    db: B,
}

impl<B: Debug> Debug for UserApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "UserApi ({:?})", self.db)
    }
}

impl<B> UserApi<B>
where B: UserManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Registers the user on first sight and returns the stored record. Logging in again with the
    /// same uid is a no-op that returns the existing record, so the boolean tells you whether a
    /// row was actually created.
    pub async fn register(&self, user: NewUser) -> Result<(User, bool), UserApiError> {
        let user = normalize_new_user(user)?;
        let (user, created) = self.db.insert_user(user).await?;
        if created {
            info!("👤️ New {} registered: {} ({})", user.role, user.display_name, user.email);
        } else {
            debug!("👤️ {} is already registered", user.email);
        }
        Ok((user, created))
    }

    pub async fn user_by_uid(&self, uid: &str) -> Result<Option<User>, UserApiError> {
        self.db.fetch_user_by_uid(uid).await
    }

    pub async fn user_by_email(&self, email: &str) -> Result<Option<User>, UserApiError> {
        self.db.fetch_user_by_email(&email.trim().to_lowercase()).await
    }

    /// The stored profile for `uid`, or [`UserApiError::UserNotFound`].
    pub async fn profile(&self, uid: &str) -> Result<User, UserApiError> {
        self.db.fetch_user_by_uid(uid).await?.ok_or_else(|| UserApiError::UserNotFound(uid.to_string()))
    }

    /// Admin view of the user base, optionally filtered by a search term over name and email.
    pub async fn search_users(&self, search_text: Option<&str>) -> Result<Vec<User>, UserApiError> {
        self.db.search_users(search_text).await
    }

    /// Assigns a new role to the user. Admin only, enforced at the route layer.
    pub async fn update_role(&self, id: i64, role: Role) -> Result<User, UserApiError> {
        let user = self.db.update_role(id, role).await?.ok_or_else(|| UserApiError::UserNotFound(id.to_string()))?;
        info!("👤️ {} ({}) is now a {role}", user.display_name, user.email);
        Ok(user)
    }

    /// Applies a partial profile edit for the calling user.
    pub async fn update_profile(&self, uid: &str, update: ProfileUpdate) -> Result<User, UserApiError> {
        if update.is_empty() {
            return Err(UserApiError::ValidationError("The update contains no fields".to_string()));
        }
        let update = normalize_profile_update(update)?;
        if let Some(email) = &update.email {
            if let Some(holder) = self.db.fetch_user_by_email(email).await? {
                if holder.uid != uid {
                    return Err(UserApiError::EmailInUse(email.clone()));
                }
            }
        }
        let user =
            self.db.update_profile(uid, update).await?.ok_or_else(|| UserApiError::UserNotFound(uid.to_string()))?;
        debug!("👤️ Profile updated for {}", user.email);
        Ok(user)
    }

    /// Removes a user record entirely. Admin only, enforced at the route layer.
    pub async fn delete_user(&self, id: i64) -> Result<User, UserApiError> {
        let user = self.db.delete_user(id).await?.ok_or_else(|| UserApiError::UserNotFound(id.to_string()))?;
        info!("👤️🗑️ {} ({}) deleted", user.display_name, user.email);
        Ok(user)
    }

    /// Suspends a user: records the reason and marks the account `suspended` in one transaction.
    /// Suspended users keep their history but fail authentication until reinstated.
    pub async fn suspend_user(&self, suspension: NewSuspension) -> Result<Suspension, UserApiError> {
        if suspension.reason.trim().is_empty() {
            return Err(UserApiError::ValidationError("A suspension needs a reason".to_string()));
        }
        let suspension = self.db.suspend_user(suspension).await?;
        warn!("👤️🚫️ User #{} suspended: {}", suspension.user_id, suspension.reason);
        Ok(suspension)
    }

    /// The suspension history for a user, most recent first.
    pub async fn suspensions_for_user(&self, user_id: i64) -> Result<Vec<Suspension>, UserApiError> {
        self.db.suspensions_for_user(user_id).await
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }
}

fn normalize_new_user(mut user: NewUser) -> Result<NewUser, UserApiError> {
    user.email = user.email.trim().to_lowercase();
    user.display_name = user.display_name.trim().to_string();
    if user.uid.trim().is_empty() {
        return Err(UserApiError::ValidationError("uid must not be empty".to_string()));
    }
    if user.display_name.is_empty() {
        return Err(UserApiError::ValidationError("display_name must not be empty".to_string()));
    }
    if !user.email.contains('@') {
        return Err(UserApiError::ValidationError(format!("'{}' is not a valid email address", user.email)));
    }
    Ok(user)
}

fn normalize_profile_update(mut update: ProfileUpdate) -> Result<ProfileUpdate, UserApiError> {
    if let Some(name) = &update.display_name {
        let name = name.trim();
        if name.is_empty() {
            return Err(UserApiError::ValidationError("display_name must not be empty".to_string()));
        }
        update.display_name = Some(name.to_string());
    }
    if let Some(email) = &update.email {
        let email = email.trim().to_lowercase();
        if !email.contains('@') {
            return Err(UserApiError::ValidationError(format!("'{email}' is not a valid email address")));
        }
        update.email = Some(email);
    }
    Ok(update)
}
