use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use log::error;
use seamline_engine::traits::{CatalogApiError, OrderApiError, PaymentApiError, UserApiError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Payload deserialization error")]
    CouldNotDeserializePayload,
    #[error("Login token signature invalid or not provided")]
    CouldNotDeserializeAuthToken,
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("Could not serialize access token. {0}")]
    CouldNotSerializeAccessToken(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    #[error("{0}")]
    OrderError(#[from] OrderApiError),
    #[error("{0}")]
    CatalogError(#[from] CatalogApiError),
    #[error("{0}")]
    UserError(#[from] UserApiError),
    #[error("{0}")]
    PaymentError(#[from] PaymentApiError),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::CouldNotDeserializePayload => StatusCode::BAD_REQUEST,
            Self::CouldNotDeserializeAuthToken => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(e) => match e {
                AuthError::TokenNotProvided => StatusCode::UNAUTHORIZED,
                AuthError::ValidationError(_) => StatusCode::UNAUTHORIZED,
                AuthError::PoorlyFormattedToken(_) => StatusCode::BAD_REQUEST,
                AuthError::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
                AuthError::AccountNotFound => StatusCode::FORBIDDEN,
                AuthError::AccountSuspended => StatusCode::FORBIDDEN,
            },
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::CouldNotSerializeAccessToken(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            Self::OrderError(e) => match e {
                OrderApiError::OrderNotFound(_) => StatusCode::NOT_FOUND,
                OrderApiError::ProductNotFound(_) => StatusCode::NOT_FOUND,
                OrderApiError::Forbidden => StatusCode::FORBIDDEN,
                OrderApiError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
                OrderApiError::PriceOverflow => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::BAD_REQUEST,
            },
            Self::CatalogError(e) => match e {
                CatalogApiError::ProductNotFound(_) => StatusCode::NOT_FOUND,
                CatalogApiError::Forbidden => StatusCode::FORBIDDEN,
                CatalogApiError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::BAD_REQUEST,
            },
            Self::UserError(e) => match e {
                UserApiError::UserNotFound(_) => StatusCode::NOT_FOUND,
                UserApiError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::BAD_REQUEST,
            },
            Self::PaymentError(e) => match e {
                PaymentApiError::OrderNotFound(_) => StatusCode::NOT_FOUND,
                PaymentApiError::PaymentNotFound(_) => StatusCode::NOT_FOUND,
                PaymentApiError::Forbidden => StatusCode::FORBIDDEN,
                PaymentApiError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::BAD_REQUEST,
            },
        }
    }

    // 5xx responses carry a generic body. The cause is logged here and must never reach the
    // client.
    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let message = if status.is_server_error() {
            error!("💻️ Request failed. {self}");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        HttpResponse::build(status)
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": message }).to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("No access token was provided.")]
    TokenNotProvided,
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    #[error("Token signature is invalid. {0}")]
    ValidationError(String),
    #[error("Login token is not in the correct format. {0}")]
    PoorlyFormattedToken(String),
    #[error("User account not found.")]
    AccountNotFound,
    #[error("This account has been suspended.")]
    AccountSuspended,
}
