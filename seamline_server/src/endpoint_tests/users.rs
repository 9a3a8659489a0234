use actix_web::{http::StatusCode, web, web::ServiceConfig};
use chrono::{Duration, TimeZone, Utc};
use seamline_engine::{
    db_types::{AccountStatus, Role, Suspension, User},
    UserApi,
};
use serde_json::json;

use super::{
    helpers::{delete_request, get_request, issue_access_token, patch_request, post_request},
    mocks::MockUserManager,
};
use crate::{
    auth::JwtClaims,
    routes::{
        DeleteUserRoute,
        ProfileRoute,
        SuspendUserRoute,
        SuspensionsRoute,
        UpdateProfileRoute,
        UpdateRoleRoute,
        UserRoleRoute,
        UsersRoute,
    },
};

const PROFILE_JSON: &str = r#"{"id":1,"uid":"uid-900","display_name":"Asha Rahman","email":"asha@example.com","photo_url":null,"role":"buyer","status":"active","created_at":"2024-04-01T08:00:00Z","updated_at":"2024-04-01T08:00:00Z"}"#;

//------------------------------------  Profile  ---------------------------------------------------------------------

#[actix_web::test]
async fn profile_requires_a_token() {
    let _ = env_logger::try_init().ok();
    let err = get_request("", "/profile", configure_profile).await.err().unwrap();
    assert_eq!(err, "Authentication Error. No access token was provided.");
}

#[actix_web::test]
async fn an_expired_token_is_rejected() {
    let _ = env_logger::try_init().ok();
    let claims = JwtClaims {
        sub: "uid-900".to_string(),
        name: "Asha Rahman".to_string(),
        email: "asha@example.com".to_string(),
        role: Role::Buyer,
        exp: (Utc::now() - Duration::days(1)).timestamp(),
    };
    let token = issue_access_token(&claims);
    let err = get_request(&token, "/profile", configure_profile).await.err().unwrap();
    assert!(err.contains("Authentication Error. Token signature is invalid."), "was: {err}");
}

#[actix_web::test]
async fn profile_returns_the_callers_record() {
    let _ = env_logger::try_init().ok();
    let token = valid_token(Role::Buyer);
    let (status, body) = get_request(&token, "/profile", configure_profile).await.unwrap();
    assert!(status.is_success(), "was: {body}");
    assert_eq!(body, PROFILE_JSON);
}

#[actix_web::test]
async fn profile_for_a_deleted_account_is_a_404() {
    let _ = env_logger::try_init().ok();
    let token = valid_token(Role::Buyer);
    let (status, body) = get_request(&token, "/profile", configure_missing_profile).await.unwrap();
    assert_eq!(status.as_u16(), StatusCode::NOT_FOUND.as_u16());
    assert_eq!(body, r#"{"error":"User uid-900 does not exist"}"#);
}

#[actix_web::test]
async fn updating_your_own_profile() {
    let _ = env_logger::try_init().ok();
    let token = valid_token(Role::Buyer);
    let update = json!({"display_name": "Asha R."});
    let (status, body) = patch_request(&token, "/profile", update, configure_profile_update).await.unwrap();
    assert!(status.is_success(), "was: {body}");
    assert!(body.contains(r#""display_name":"Asha R.""#), "was: {body}");
}

#[actix_web::test]
async fn profile_updates_reject_taken_emails() {
    let _ = env_logger::try_init().ok();
    let token = valid_token(Role::Buyer);
    let update = json!({"email": "taken@example.com"});
    let (status, body) = patch_request(&token, "/profile", update, configure_profile_update_taken).await.unwrap();
    assert_eq!(status.as_u16(), StatusCode::BAD_REQUEST.as_u16());
    assert_eq!(body, r#"{"error":"Email taken@example.com is already in use"}"#);
}

//------------------------------------  Administration  --------------------------------------------------------------

#[actix_web::test]
async fn the_user_list_is_admin_only() {
    let _ = env_logger::try_init().ok();
    let token = valid_token(Role::Manager);
    let err = get_request(&token, "/users", configure_user_search).await.err().unwrap();
    assert!(err.contains("Insufficient permissions"), "was: {err}");
}

#[actix_web::test]
async fn admins_can_search_users() {
    let _ = env_logger::try_init().ok();
    let token = valid_token(Role::Admin);
    let (status, body) = get_request(&token, "/users?search=asha", configure_user_search).await.unwrap();
    assert!(status.is_success(), "was: {body}");
    assert_eq!(body, format!("[{PROFILE_JSON}]"));
}

#[actix_web::test]
async fn role_lookup_by_email() {
    let _ = env_logger::try_init().ok();
    let token = valid_token(Role::Buyer);
    let (status, body) = get_request(&token, "/users/asha@example.com/role", configure_role_lookup).await.unwrap();
    assert!(status.is_success(), "was: {body}");
    assert_eq!(body, r#"{"email":"asha@example.com","role":"buyer"}"#);
}

#[actix_web::test]
async fn role_changes_are_admin_only() {
    let _ = env_logger::try_init().ok();
    let token = valid_token(Role::Manager);
    let err = patch_request(&token, "/users/1/role", json!({"role": "manager"}), configure_update_role)
        .await
        .err()
        .unwrap();
    assert!(err.contains("Insufficient permissions"), "was: {err}");
}

#[actix_web::test]
async fn promoting_a_buyer_to_manager() {
    let _ = env_logger::try_init().ok();
    let token = valid_token(Role::Admin);
    let (status, body) = patch_request(&token, "/users/1/role", json!({"role": "manager"}), configure_update_role)
        .await
        .unwrap();
    assert!(status.is_success(), "was: {body}");
    assert!(body.contains(r#""role":"manager""#), "was: {body}");
}

#[actix_web::test]
async fn deleting_a_user_is_admin_only() {
    let _ = env_logger::try_init().ok();
    let token = valid_token(Role::Buyer);
    let err = delete_request(&token, "/users/1", configure_delete_user).await.err().unwrap();
    assert!(err.contains("Insufficient permissions"), "was: {err}");
}

//------------------------------------  Suspensions  -----------------------------------------------------------------

#[actix_web::test]
async fn suspending_a_user_records_the_acting_admin() {
    let _ = env_logger::try_init().ok();
    let token = valid_token(Role::Admin);
    // The body tries to pin the suspension on someone else.
    let body = json!({"user_id": 1, "reason": "Fraudulent listings", "suspended_by": "spoof@example.com"});
    let (status, body) = post_request(&token, "/suspensions", body, configure_suspend).await.unwrap();
    assert!(status.is_success(), "was: {body}");
    assert!(body.contains(r#""suspended_by":"asha@example.com""#), "was: {body}");
}

#[actix_web::test]
async fn suspension_history_for_a_user() {
    let _ = env_logger::try_init().ok();
    let token = valid_token(Role::Admin);
    let (status, body) = get_request(&token, "/suspensions/1", configure_suspension_history).await.unwrap();
    assert!(status.is_success(), "was: {body}");
    assert!(body.contains("Fraudulent listings"), "was: {body}");
}

//------------------------------------  Fixtures and plumbing  -------------------------------------------------------

fn valid_token(role: Role) -> String {
    let claims = JwtClaims {
        sub: "uid-900".to_string(),
        name: "Asha Rahman".to_string(),
        email: "asha@example.com".to_string(),
        role,
        exp: (Utc::now() + Duration::days(1)).timestamp(),
    };
    issue_access_token(&claims)
}

fn asha(role: Role) -> User {
    User {
        id: 1,
        uid: "uid-900".to_string(),
        display_name: "Asha Rahman".to_string(),
        email: "asha@example.com".to_string(),
        photo_url: None,
        role,
        status: AccountStatus::Active,
        created_at: Utc.with_ymd_and_hms(2024, 4, 1, 8, 0, 0).unwrap(),
        updated_at: Utc.with_ymd_and_hms(2024, 4, 1, 8, 0, 0).unwrap(),
    }
}

fn suspension() -> Suspension {
    Suspension {
        id: 1,
        user_id: 1,
        reason: "Fraudulent listings".to_string(),
        feedback: None,
        suspended_by: "asha@example.com".to_string(),
        created_at: Utc.with_ymd_and_hms(2024, 5, 10, 9, 0, 0).unwrap(),
    }
}

fn configure_profile(cfg: &mut ServiceConfig) {
    let mut api = MockUserManager::new();
    api.expect_fetch_user_by_uid().withf(|uid| uid == "uid-900").return_const(Ok(Some(asha(Role::Buyer))));
    let api = UserApi::new(api);
    cfg.service(ProfileRoute::<MockUserManager>::new()).app_data(web::Data::new(api));
}

fn configure_missing_profile(cfg: &mut ServiceConfig) {
    let mut api = MockUserManager::new();
    api.expect_fetch_user_by_uid().return_const(Ok(None));
    let api = UserApi::new(api);
    cfg.service(ProfileRoute::<MockUserManager>::new()).app_data(web::Data::new(api));
}

fn configure_profile_update(cfg: &mut ServiceConfig) {
    let mut api = MockUserManager::new();
    let updated = User { display_name: "Asha R.".to_string(), ..asha(Role::Buyer) };
    api.expect_update_profile()
        .withf(|uid, u| uid == "uid-900" && u.display_name.as_deref() == Some("Asha R."))
        .return_const(Ok(Some(updated)));
    let api = UserApi::new(api);
    cfg.service(UpdateProfileRoute::<MockUserManager>::new()).app_data(web::Data::new(api));
}

fn configure_profile_update_taken(cfg: &mut ServiceConfig) {
    let mut api = MockUserManager::new();
    let holder = User { uid: "uid-777".to_string(), email: "taken@example.com".to_string(), ..asha(Role::Buyer) };
    api.expect_fetch_user_by_email().withf(|email| email == "taken@example.com").return_const(Ok(Some(holder)));
    let api = UserApi::new(api);
    cfg.service(UpdateProfileRoute::<MockUserManager>::new()).app_data(web::Data::new(api));
}

fn configure_user_search(cfg: &mut ServiceConfig) {
    let mut api = MockUserManager::new();
    api.expect_search_users().withf(|search| *search == Some("asha")).return_const(Ok(vec![asha(Role::Buyer)]));
    let api = UserApi::new(api);
    cfg.service(UsersRoute::<MockUserManager>::new()).app_data(web::Data::new(api));
}

fn configure_role_lookup(cfg: &mut ServiceConfig) {
    let mut api = MockUserManager::new();
    api.expect_fetch_user_by_email().withf(|email| email == "asha@example.com").return_const(Ok(Some(asha(Role::Buyer))));
    let api = UserApi::new(api);
    cfg.service(UserRoleRoute::<MockUserManager>::new()).app_data(web::Data::new(api));
}

fn configure_update_role(cfg: &mut ServiceConfig) {
    let mut api = MockUserManager::new();
    api.expect_update_role()
        .withf(|id, role| *id == 1 && *role == Role::Manager)
        .return_const(Ok(Some(asha(Role::Manager))));
    let api = UserApi::new(api);
    cfg.service(UpdateRoleRoute::<MockUserManager>::new()).app_data(web::Data::new(api));
}

fn configure_delete_user(cfg: &mut ServiceConfig) {
    let api = UserApi::new(MockUserManager::new());
    cfg.service(DeleteUserRoute::<MockUserManager>::new()).app_data(web::Data::new(api));
}

fn configure_suspend(cfg: &mut ServiceConfig) {
    let mut api = MockUserManager::new();
    api.expect_suspend_user()
        .withf(|s| s.user_id == 1 && s.suspended_by == "asha@example.com")
        .return_const(Ok(suspension()));
    let api = UserApi::new(api);
    cfg.service(SuspendUserRoute::<MockUserManager>::new()).app_data(web::Data::new(api));
}

fn configure_suspension_history(cfg: &mut ServiceConfig) {
    let mut api = MockUserManager::new();
    api.expect_suspensions_for_user().withf(|id| *id == 1).return_const(Ok(vec![suspension()]));
    let api = UserApi::new(api);
    cfg.service(SuspensionsRoute::<MockUserManager>::new()).app_data(web::Data::new(api));
}
