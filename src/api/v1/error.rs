use crate::api::v1::handler::ApiResponse;
use crate::application_port::AuthError;
use serde::Serialize;
use std::convert::Infallible;
use thiserror::Error;
use tracing::warn;
use warp::http::StatusCode;
use warp::{Rejection, reject};

pub async fn recover_error(err: Rejection) -> Result<impl warp::Reply, Infallible> {
    let code = if let Some(code) = err.find::<ApiErrorCode>() {
        code.clone()
    } else if err.is_not_found() {
        ApiErrorCode::NotFound
    } else if err.find::<warp::filters::body::BodyDeserializeError>().is_some() {
        ApiErrorCode::BadRequest
    } else if err.find::<warp::reject::MissingHeader>().is_some() {
        ApiErrorCode::InvalidToken
    } else {
        warn!("unhandled rejection: {:?}", err);
        ApiErrorCode::Internal
    };

    let json = warp::reply::json(&ApiResponse::<()>::err(code.clone(), code.to_string()));
    Ok(warp::reply::with_status(json, code.status()))
}

#[derive(Debug, Clone, Error, Serialize)]
pub enum ApiErrorCode {
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Token is not valid")]
    InvalidToken,
    #[error("Email already in use")]
    EmailTaken,
    #[error("Bad request")]
    BadRequest,
    #[error("Resource not found")]
    NotFound,
    #[error("Service unavailable")]
    ServiceUnavailable,
    #[error("Internal error")]
    Internal,
}

impl ApiErrorCode {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiErrorCode::InvalidCredentials | ApiErrorCode::InvalidToken => {
                StatusCode::UNAUTHORIZED
            }
            ApiErrorCode::EmailTaken => StatusCode::CONFLICT,
            ApiErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            ApiErrorCode::NotFound => StatusCode::NOT_FOUND,
            ApiErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn internal<E: std::fmt::Display>(error: E) -> ApiErrorCode {
        warn!("internal error: {}", error);
        ApiErrorCode::Internal
    }
}

impl reject::Reject for ApiErrorCode {}

impl From<AuthError> for ApiErrorCode {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::Unauthorized => ApiErrorCode::InvalidCredentials,
            AuthError::InvalidToken(reason) => {
                warn!("rejected token: {reason}");
                ApiErrorCode::InvalidToken
            }
            AuthError::UserNotFound => ApiErrorCode::NotFound,
            AuthError::EmailTaken => ApiErrorCode::EmailTaken,
            AuthError::Signing(e) | AuthError::IdGeneration(e) | AuthError::Internal(e) => {
                ApiErrorCode::internal(e)
            }
            AuthError::StoreUnavailable(e) => ApiErrorCode::internal(e),
        }
    }
}
