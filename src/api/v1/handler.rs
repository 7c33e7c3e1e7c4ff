use super::error::*;
use crate::application_port::*;
use crate::domain_model::{AuthenticatedUser, TokenPair};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warp::http::StatusCode;
use warp::{self, reject};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(code: ApiErrorCode, message: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(ApiError {
                code,
                message: message.into(),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

pub async fn register(
    body: RegisterRequest,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let register_input = RegisterInput {
        username: body.username,
        email: body.email,
        password: body.password,
        display_name: body.display_name,
    };
    let user = auth_service
        .register(register_input)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    let json = warp::reply::json(&ApiResponse::ok(UserProfile::from(&user)));
    Ok(warp::reply::with_status(json, StatusCode::CREATED))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub login: String,
    pub password: String,
}

/// Profile and token pair side by side in one flat object.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub tokens: TokenPair,
    #[serde(flatten)]
    pub user: UserProfile,
}

impl From<LoginResult> for LoginResponse {
    fn from(result: LoginResult) -> Self {
        LoginResponse {
            tokens: result.tokens,
            user: result.user,
        }
    }
}

pub async fn login(
    body: LoginRequest,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let login_input = LoginInput {
        login: body.login,
        password: body.password,
    };
    let login_result = auth_service
        .authenticate(login_input)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(LoginResponse::from(
        login_result,
    ))))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn refresh(
    body: RefreshRequest,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let login_result = auth_service
        .refresh(&body.refresh_token)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(LoginResponse::from(
        login_result,
    ))))
}

pub async fn logout(
    principal: AuthenticatedUser,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    auth_service
        .logout(principal.user_id)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(())))
}

pub async fn me(principal: AuthenticatedUser) -> Result<impl warp::Reply, warp::Rejection> {
    Ok(warp::reply::json(&ApiResponse::ok(principal)))
}
