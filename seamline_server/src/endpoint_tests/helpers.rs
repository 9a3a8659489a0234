use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, web::ServiceConfig, App};
use chrono::Duration;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use log::debug;
use serde_json::Value;
use slm_common::Secret;

use crate::{
    auth::{JwtClaims, LoginToken},
    config::AuthConfig,
    middleware::JwtMiddlewareFactory,
};

// Creates a test `AuthConfig` for issuing tokens. DO NOT re-use these keys anywhere.
pub fn get_auth_config() -> AuthConfig {
    AuthConfig {
        jwt_signing_key: Secret::new("925842e11914fdd0c9a2ab8a38dac9de57b3e392372cde1661b1a84b1d8e430e".into()),
        identity_secret: Secret::new("b4db54f75421a02b0d0056fb7203df23c742b25e41283976bdaa7fe63de1ad23".into()),
        access_token_validity: Duration::minutes(60),
    }
}

pub fn issue_access_token(claims: &JwtClaims) -> String {
    let config = get_auth_config();
    let key = EncodingKey::from_secret(config.jwt_signing_key.reveal().as_bytes());
    encode(&Header::new(Algorithm::HS256), claims, &key).expect("Failed to sign token")
}

pub fn issue_login_token(token: &LoginToken) -> String {
    let config = get_auth_config();
    let key = EncodingKey::from_secret(config.identity_secret.reveal().as_bytes());
    encode(&Header::new(Algorithm::HS256), token, &key).expect("Failed to sign token")
}

pub async fn get_request(
    access_token: &str,
    path: &str,
    configure: fn(&mut ServiceConfig),
) -> Result<(StatusCode, String), String> {
    let mut req = TestRequest::get().uri(path);
    if !access_token.is_empty() {
        req = req.insert_header(("Authorization", format!("Bearer {access_token}")));
    }
    send(req, configure).await
}

pub async fn post_request(
    access_token: &str,
    path: &str,
    body: Value,
    configure: fn(&mut ServiceConfig),
) -> Result<(StatusCode, String), String> {
    let mut req = TestRequest::post().uri(path).set_json(body);
    if !access_token.is_empty() {
        req = req.insert_header(("Authorization", format!("Bearer {access_token}")));
    }
    send(req, configure).await
}

pub async fn patch_request(
    access_token: &str,
    path: &str,
    body: Value,
    configure: fn(&mut ServiceConfig),
) -> Result<(StatusCode, String), String> {
    let mut req = TestRequest::patch().uri(path).set_json(body);
    if !access_token.is_empty() {
        req = req.insert_header(("Authorization", format!("Bearer {access_token}")));
    }
    send(req, configure).await
}

pub async fn delete_request(
    access_token: &str,
    path: &str,
    configure: fn(&mut ServiceConfig),
) -> Result<(StatusCode, String), String> {
    let mut req = TestRequest::delete().uri(path);
    if !access_token.is_empty() {
        req = req.insert_header(("Authorization", format!("Bearer {access_token}")));
    }
    send(req, configure).await
}

// Every request runs behind the JWT middleware, exactly as the /api scope is assembled in
// production. Routes keep their scope-relative paths here.
async fn send(req: TestRequest, configure: fn(&mut ServiceConfig)) -> Result<(StatusCode, String), String> {
    let config = get_auth_config();
    let app = App::new().wrap(JwtMiddlewareFactory::new(&config)).configure(configure);
    let service = test::init_service(app).await;
    debug!("Making request");
    let req = req.to_request();
    let (_, res) = test::try_call_service(&service, req).await.map_err(|e| e.to_string())?.into_parts();
    let status = res.status();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    Ok((status, body))
}
