use crate::api::v1::handler::ApiResponse;
use crate::application_port::*;
use serde::Serialize;
use std::convert::Infallible;
use thiserror::Error;
use tracing::{error, warn};
use warp::http::StatusCode;
use warp::{Rejection, reject};

pub async fn recover_error(err: Rejection) -> Result<impl warp::Reply, Infallible> {
    let (code, message, status) = if let Some(code) = err.find::<ApiErrorCode>() {
        (code.clone(), code.to_string(), code.status())
    } else if err.is_not_found() {
        (
            ApiErrorCode::NotFound,
            ApiErrorCode::NotFound.to_string(),
            StatusCode::NOT_FOUND,
        )
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (ApiErrorCode::InvalidInput, e.to_string(), StatusCode::BAD_REQUEST)
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            ApiErrorCode::MethodNotAllowed,
            ApiErrorCode::MethodNotAllowed.to_string(),
            StatusCode::METHOD_NOT_ALLOWED,
        )
    } else {
        error!("Unhandled rejection: {:?}", err);
        (
            ApiErrorCode::InternalError,
            ApiErrorCode::InternalError.to_string(),
            StatusCode::INTERNAL_SERVER_ERROR,
        )
    };

    let json = warp::reply::json(&ApiResponse::<()>::err(code, message));
    Ok(warp::reply::with_status(json, status))
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
}

/// Wire-level error codes. Every credential problem shares the message
/// "Unauthorized"; only the code tells them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
pub enum ApiErrorCode {
    #[error("Unauthorized")]
    MissingCredential,
    #[error("Unauthorized")]
    InvalidCredential,
    #[error("Unauthorized")]
    ExpiredCredential,
    #[error("Unauthorized")]
    UnknownIdentity,
    #[error("Unauthorized")]
    RefreshMismatch,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Access denied")]
    Forbidden,
    #[error("User already exists")]
    UserExists,
    #[error("Invalid input")]
    InvalidInput,
    #[error("Not found")]
    NotFound,
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("Service temporarily unavailable")]
    StoreUnavailable,
    #[error("Internal error")]
    InternalError,
}

impl ApiErrorCode {
    pub fn internal<E: std::fmt::Display>(error: E) -> ApiErrorCode {
        warn!("Internal error: {}", error);
        ApiErrorCode::InternalError
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiErrorCode::MissingCredential
            | ApiErrorCode::InvalidCredential
            | ApiErrorCode::ExpiredCredential
            | ApiErrorCode::UnknownIdentity
            | ApiErrorCode::RefreshMismatch
            | ApiErrorCode::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ApiErrorCode::UserExists | ApiErrorCode::InvalidInput => StatusCode::BAD_REQUEST,
            ApiErrorCode::NotFound => StatusCode::NOT_FOUND,
            ApiErrorCode::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiErrorCode::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl reject::Reject for ApiErrorCode {}

impl From<AuthError> for ApiErrorCode {
    fn from(error: AuthError) -> Self {
        if error.is_unauthenticated() {
            warn!(kind = %error, "authentication rejected");
        }
        match error {
            AuthError::MissingCredential => ApiErrorCode::MissingCredential,
            AuthError::InvalidCredential => ApiErrorCode::InvalidCredential,
            AuthError::ExpiredCredential => ApiErrorCode::ExpiredCredential,
            AuthError::UnknownIdentity => ApiErrorCode::UnknownIdentity,
            AuthError::RefreshMismatch => ApiErrorCode::RefreshMismatch,
            AuthError::InvalidCredentials => ApiErrorCode::InvalidCredentials,
            AuthError::Forbidden => ApiErrorCode::Forbidden,
            AuthError::UserExists => ApiErrorCode::UserExists,
            AuthError::Validation(e) => {
                warn!("rejected input: {}", e);
                ApiErrorCode::InvalidInput
            }
            AuthError::StoreUnavailable(e) => {
                error!("dependency unavailable: {}", e);
                ApiErrorCode::StoreUnavailable
            }
            AuthError::InternalError(e) => ApiErrorCode::internal(e),
        }
    }
}

pub(crate) fn rejection(error: AuthError) -> Rejection {
    reject::custom(ApiErrorCode::from(error))
}
