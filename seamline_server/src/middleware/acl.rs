//! Access control list middleware for the Seamline server.
//! This middleware can be placed on any route or service.
//!
//! It reads the [`JwtClaims`] that the JWT middleware stored in the request extensions and checks
//! the caller's role against the roles the route allows. If the caller's role is one of the
//! allowed roles, the request continues. Otherwise, a 403 Forbidden response is returned.

use std::pin::Pin;
use std::rc::Rc;
use actix_web::dev::{forward_ready, Service, Transform};
use actix_web::{dev::ServiceRequest, dev::ServiceResponse, Error, HttpMessage};
use actix_web::error::ErrorForbidden;
use futures::future::{ok, Ready};
use futures::Future;
use seamline_engine::db_types::Role;
use crate::auth::JwtClaims;
use crate::errors::{AuthError, ServerError};

pub struct AclMiddlewareFactory {
    allowed_roles: Vec<Role>,
}

impl AclMiddlewareFactory {
    pub fn new(allowed_roles: &[Role]) -> Self {
        AclMiddlewareFactory { allowed_roles: allowed_roles.to_vec() }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AclMiddlewareFactory
    where
        S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
        S::Future: 'static,
        B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = AclMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AclMiddlewareService {
            allowed_roles: self.allowed_roles.clone(),
            service: Rc::new(service),
        })
    }
}

pub struct AclMiddlewareService<S> {
    allowed_roles: Vec<Role>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AclMiddlewareService<S>
    where
        S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
        S::Future: 'static,
        B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let allowed_roles = self.allowed_roles.clone();
        Box::pin( async move {
            let jwt_claims = req.extensions().get::<JwtClaims>()
                .ok_or_else(|| {
                    log::warn!("No JWT claims found in request extensions");
                    Error::from(ServerError::from(AuthError::TokenNotProvided))
                })?.clone();
            if allowed_roles.contains(&jwt_claims.role) {
                service.call(req).await
            } else {
                Err(ErrorForbidden("Insufficient permissions"))
            }
        })
    }
}
