//! Access token middleware for the Seamline server.
//!
//! Every route inside the `/api` scope is wrapped with this middleware. It expects an access
//! token issued by [`crate::auth::TokenIssuer`] in the `Authorization: Bearer ...` header,
//! verifies the signature and expiry, and stores the decoded [`JwtClaims`] in the request
//! extensions, where the claims extractor and the ACL middleware pick them up.
//!
//! Requests without a token are rejected with 401. Role checks are not done here; that is the
//! ACL middleware's job.

use std::rc::Rc;

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
    HttpMessage,
};
use futures::future::{ok, LocalBoxFuture, Ready};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use log::debug;

use crate::{
    auth::JwtClaims,
    config::AuthConfig,
    errors::{AuthError, ServerError},
};

pub struct JwtMiddlewareFactory {
    decoding_key: DecodingKey,
}

impl JwtMiddlewareFactory {
    pub fn new(config: &AuthConfig) -> Self {
        let decoding_key = DecodingKey::from_secret(config.jwt_signing_key.reveal().as_bytes());
        JwtMiddlewareFactory { decoding_key }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = JwtMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(JwtMiddlewareService { decoding_key: self.decoding_key.clone(), service: Rc::new(service) })
    }
}

pub struct JwtMiddlewareService<S> {
    decoding_key: DecodingKey,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let decoding_key = self.decoding_key.clone();
        Box::pin(async move {
            let token = bearer_token(&req).ok_or_else(|| {
                debug!("No access token on request to {}", req.path());
                Error::from(ServerError::from(AuthError::TokenNotProvided))
            })?;
            let validation = Validation::new(Algorithm::HS256);
            let claims = decode::<JwtClaims>(&token, &decoding_key, &validation)
                .map_err(|e| {
                    debug!("Access token rejected for {}. {e}", req.path());
                    Error::from(ServerError::from(AuthError::ValidationError(format!("{e}"))))
                })?
                .claims;
            req.extensions_mut().insert(claims);
            service.call(req).await
        })
    }
}

fn bearer_token(req: &ServiceRequest) -> Option<String> {
    req.headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string())
}
