use log::{debug, trace};
use sqlx::{sqlite::SqliteRow, FromRow, QueryBuilder, SqliteConnection};

use crate::{
    db_types::{AccountStatus, NewSuspension, NewUser, Role, Suspension, User},
    user_objects::ProfileUpdate,
};

/// Inserts the user if the uid is not yet known, returning `false` in the second parameter when
/// the user already existed. Login is an upsert, so this runs on every authentication.
pub async fn idempotent_insert(user: NewUser, conn: &mut SqliteConnection) -> Result<(User, bool), sqlx::Error> {
    let inserted = match fetch_user_by_uid(&user.uid, conn).await? {
        Some(user) => (user, false),
        None => {
            let user = insert_user(user, conn).await?;
            debug!("📝️ User [{}] inserted with id {}", user.email, user.id);
            (user, true)
        },
    };
    Ok(inserted)
}

async fn insert_user(user: NewUser, conn: &mut SqliteConnection) -> Result<User, sqlx::Error> {
    let user = sqlx::query_as(
        r#"
            INSERT INTO users (uid, display_name, email, photo_url, role, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(user.uid)
    .bind(user.display_name)
    .bind(user.email)
    .bind(user.photo_url)
    .bind(user.role)
    .bind(user.status)
    .fetch_one(conn)
    .await?;
    Ok(user)
}

pub async fn fetch_user_by_uid(uid: &str, conn: &mut SqliteConnection) -> Result<Option<User>, sqlx::Error> {
    let user = sqlx::query_as("SELECT * FROM users WHERE uid = $1").bind(uid).fetch_optional(conn).await?;
    Ok(user)
}

pub async fn fetch_user_by_email(email: &str, conn: &mut SqliteConnection) -> Result<Option<User>, sqlx::Error> {
    let user = sqlx::query_as("SELECT * FROM users WHERE email = $1").bind(email).fetch_optional(conn).await?;
    Ok(user)
}

/// The user listing is an admin convenience, not a report, so it returns at most this many rows.
const MAX_SEARCH_RESULTS: i64 = 20;

/// Admin listing of users, newest first, optionally narrowed by a term matched against the
/// display name and email.
pub async fn search_users(search_text: Option<&str>, conn: &mut SqliteConnection) -> Result<Vec<User>, sqlx::Error> {
    let users = match search_text {
        Some(term) => {
            let pattern = format!("%{term}%");
            sqlx::query_as(
                "SELECT * FROM users WHERE display_name LIKE $1 OR email LIKE $1 ORDER BY created_at DESC LIMIT $2",
            )
            .bind(pattern)
            .bind(MAX_SEARCH_RESULTS)
            .fetch_all(conn)
            .await?
        },
        None => sqlx::query_as("SELECT * FROM users ORDER BY created_at DESC LIMIT $1")
            .bind(MAX_SEARCH_RESULTS)
            .fetch_all(conn)
            .await?,
    };
    Ok(users)
}

pub(crate) async fn update_role(id: i64, role: Role, conn: &mut SqliteConnection) -> Result<Option<User>, sqlx::Error> {
    let user = sqlx::query_as("UPDATE users SET role = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *")
        .bind(role)
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(user)
}

pub(crate) async fn update_profile(
    uid: &str,
    update: ProfileUpdate,
    conn: &mut SqliteConnection,
) -> Result<Option<User>, sqlx::Error> {
    let mut builder = QueryBuilder::new("UPDATE users SET updated_at = CURRENT_TIMESTAMP, ");
    let mut set_clause = builder.separated(", ");
    if let Some(name) = update.display_name {
        set_clause.push("display_name = ");
        set_clause.push_bind_unseparated(name);
    }
    if let Some(email) = update.email {
        set_clause.push("email = ");
        set_clause.push_bind_unseparated(email);
    }
    if let Some(url) = update.photo_url {
        set_clause.push("photo_url = ");
        set_clause.push_bind_unseparated(url);
    }
    builder.push(" WHERE uid = ");
    builder.push_bind(uid);
    builder.push(" RETURNING *");
    trace!("📝️ Executing query: {}", builder.sql());
    let res = builder.build().fetch_optional(conn).await?.map(|row: SqliteRow| User::from_row(&row)).transpose()?;
    Ok(res)
}

pub(crate) async fn delete_user(id: i64, conn: &mut SqliteConnection) -> Result<Option<User>, sqlx::Error> {
    let user = sqlx::query_as("DELETE FROM users WHERE id = $1 RETURNING *").bind(id).fetch_optional(conn).await?;
    Ok(user)
}

pub(crate) async fn set_account_status(
    id: i64,
    status: AccountStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<User>, sqlx::Error> {
    let user = sqlx::query_as("UPDATE users SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *")
        .bind(status)
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(user)
}

pub(crate) async fn insert_suspension(
    suspension: NewSuspension,
    conn: &mut SqliteConnection,
) -> Result<Suspension, sqlx::Error> {
    let suspension = sqlx::query_as(
        "INSERT INTO suspensions (user_id, reason, feedback, suspended_by) VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(suspension.user_id)
    .bind(suspension.reason)
    .bind(suspension.feedback)
    .bind(suspension.suspended_by)
    .fetch_one(conn)
    .await?;
    Ok(suspension)
}

pub async fn suspensions_for_user(user_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Suspension>, sqlx::Error> {
    let suspensions = sqlx::query_as("SELECT * FROM suspensions WHERE user_id = $1 ORDER BY created_at DESC, id DESC")
        .bind(user_id)
        .fetch_all(conn)
        .await?;
    Ok(suspensions)
}
