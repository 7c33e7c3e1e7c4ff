use crate::api::v1::handler::ApiResponse;
use crate::application_port::*;
use serde::Serialize;
use std::convert::Infallible;
use thiserror::Error;
use tracing::warn;
use warp::http::StatusCode;
use warp::{Rejection, reject};

pub async fn recover_error(err: Rejection) -> Result<impl warp::Reply, Infallible> {
    let (code, message) = if let Some(err) = err.find::<ApiErrorCode>() {
        (err.clone(), err.to_string())
    } else if err.is_not_found() {
        (ApiErrorCode::NotFound, ApiErrorCode::NotFound.to_string())
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (ApiErrorCode::InvalidInput, e.to_string())
    } else if err.find::<reject::PayloadTooLarge>().is_some()
        || err.find::<reject::LengthRequired>().is_some()
        || err.find::<reject::UnsupportedMediaType>().is_some()
    {
        (
            ApiErrorCode::InvalidInput,
            ApiErrorCode::InvalidInput.to_string(),
        )
    } else if err.find::<reject::MethodNotAllowed>().is_some() {
        (ApiErrorCode::NotFound, ApiErrorCode::NotFound.to_string())
    } else {
        warn!("unhandled rejection: {:?}", err);
        (
            ApiErrorCode::InternalError,
            ApiErrorCode::InternalError.to_string(),
        )
    };

    let json = warp::reply::json(&ApiResponse::<()>::err(code.clone(), message));
    Ok(warp::reply::with_status(json, code.status()))
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, Error, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiErrorCode {
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("Username already taken")]
    UsernameTaken,
    #[error("Email already registered")]
    EmailTaken,
    #[error("Invalid request")]
    InvalidInput,
    #[error("Token is not valid")]
    InvalidToken,
    #[error("Not found")]
    NotFound,
    #[error("Service temporarily unavailable")]
    Unavailable,
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
            ApiErrorCode::InvalidCredentials | ApiErrorCode::InvalidToken => {
                StatusCode::UNAUTHORIZED
            }
            ApiErrorCode::UsernameTaken | ApiErrorCode::EmailTaken | ApiErrorCode::InvalidInput => {
                StatusCode::BAD_REQUEST
            }
            ApiErrorCode::NotFound => StatusCode::NOT_FOUND,
            ApiErrorCode::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl reject::Reject for ApiErrorCode {}

impl From<AuthError> for ApiErrorCode {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::InvalidCredentials => ApiErrorCode::InvalidCredentials,
            AuthError::UsernameAlreadyExists => ApiErrorCode::UsernameTaken,
            AuthError::EmailAlreadyExists => ApiErrorCode::EmailTaken,
            AuthError::InvalidInput(_) => ApiErrorCode::InvalidInput,
            AuthError::Unauthorized(reason) => {
                warn!("rejected token: {}", reason);
                ApiErrorCode::InvalidToken
            }
            AuthError::UserNotFound => ApiErrorCode::InvalidToken,
            AuthError::Store(e) => {
                warn!("store unavailable: {}", e);
                ApiErrorCode::Unavailable
            }
            AuthError::InternalError(e) => ApiErrorCode::internal(e),
        }
    }
}
