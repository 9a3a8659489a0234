//! Token handling for the two-step login flow.
//!
//! Clients arrive with a *login token*: a short-lived JWT issued by the identity provider and
//! signed with the shared [`AuthConfig::identity_secret`]. The `/auth` endpoint verifies it,
//! looks the account up, and answers with an *access token* signed with this server's own
//! [`AuthConfig::jwt_signing_key`]. Only access tokens are accepted on the `/api` scope; the
//! role baked into an access token is the one on record at issue time, never one the client
//! asked for.

use actix_web::{dev::Payload, FromRequest, HttpMessage, HttpRequest};
use chrono::Utc;
use futures::future::{ready, Ready};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::debug;
use seamline_engine::db_types::{Role, User};
use serde::{Deserialize, Serialize};

use crate::{config::AuthConfig, errors::AuthError};

/// The claims carried by an access token. Handlers receive these via the [`FromRequest`]
/// extractor once the JWT middleware has validated the signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// The account uid, as assigned by the identity provider.
    pub sub: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub exp: i64,
}

/// The claims the identity provider puts in a login token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginToken {
    pub sub: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub photo_url: Option<String>,
    pub exp: i64,
}

impl FromRequest for JwtClaims {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let claims = req
            .extensions()
            .get::<JwtClaims>()
            .cloned()
            .ok_or_else(|| crate::errors::ServerError::from(AuthError::TokenNotProvided).into());
        ready(claims)
    }
}

/// Verifies a login token against the shared identity secret and returns its claims.
///
/// Expiry is checked as part of validation. Nothing else about the claims is vetted here; in
/// particular the account may not exist yet, which is exactly the state `/register` handles.
pub fn check_login_token_signature<S: AsRef<str>>(token: S, config: &AuthConfig) -> Result<LoginToken, AuthError> {
    let key = DecodingKey::from_secret(config.identity_secret.reveal().as_bytes());
    let validation = Validation::new(Algorithm::HS256);
    let token = decode::<LoginToken>(token.as_ref(), &key, &validation).map_err(|e| match e.kind() {
        ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
            AuthError::PoorlyFormattedToken(format!("{e}"))
        },
        _ => AuthError::ValidationError(format!("{e}")),
    })?;
    debug!("Login token validated successfully. Claims: {:?}", token.claims);
    Ok(token.claims)
}

/// Decodes and verifies an access token issued by [`TokenIssuer`].
pub fn validate_access_token(token: &str, config: &AuthConfig) -> Result<JwtClaims, AuthError> {
    let key = DecodingKey::from_secret(config.jwt_signing_key.reveal().as_bytes());
    let validation = Validation::new(Algorithm::HS256);
    let token =
        decode::<JwtClaims>(token, &key, &validation).map_err(|e| AuthError::ValidationError(format!("{e}")))?;
    Ok(token.claims)
}

pub struct TokenIssuer {
    encoding_key: EncodingKey,
    validity: chrono::Duration,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.jwt_signing_key.reveal().as_bytes());
        Self { encoding_key, validity: config.access_token_validity }
    }

    /// Issue a new access token for the given user record.
    ///
    /// This method DOES NOT verify that the caller may act as `user`. The login token must be
    /// validated and the account's status checked prior to calling `issue_token`.
    pub fn issue_token(&self, user: &User) -> Result<String, AuthError> {
        let claims = JwtClaims {
            sub: user.uid.clone(),
            name: user.display_name.clone(),
            email: user.email.clone(),
            role: user.role,
            exp: (Utc::now() + self.validity).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::ValidationError(format!("{e}")))
    }
}
