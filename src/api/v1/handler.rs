use super::cookie::*;
use super::error::*;
use crate::application_port::*;
use crate::domain_model::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warp::http::StatusCode;
use warp::{Reply, reject};

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

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: UserProfile,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token_expires_at: DateTime<Utc>,
}

fn session_reply(grant: SessionGrant, status: StatusCode, cookies: &CookiePolicy) -> impl Reply + use<> {
    let SessionGrant { profile, tokens } = grant;
    let body = ApiResponse::ok(SessionResponse {
        user: profile,
        access_token_expires_at: tokens.access_token_expires_at,
        refresh_token_expires_at: tokens.refresh_token_expires_at,
    });

    let mut response = warp::reply::with_status(warp::reply::json(&body), status).into_response();
    append_cookies(
        &mut response,
        &[
            cookies.access_cookie(tokens.access_token.as_str()),
            cookies.refresh_cookie(tokens.refresh_token.as_str()),
        ],
    );
    response
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

pub async fn signup(
    body: SignupRequest,
    auth_service: Arc<dyn AuthService>,
    cookies: Arc<CookiePolicy>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let signup_input = SignupInput {
        name: body.name,
        email: body.email,
        password: body.password,
    };
    let grant = auth_service
        .signup(signup_input)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(session_reply(grant, StatusCode::CREATED, &cookies))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn login(
    body: LoginRequest,
    auth_service: Arc<dyn AuthService>,
    cookies: Arc<CookiePolicy>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let login_input = LoginInput {
        email: body.email,
        password: body.password,
    };
    let grant = auth_service
        .login(login_input)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(session_reply(grant, StatusCode::OK, &cookies))
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

pub async fn logout(
    refresh_token: Option<String>,
    auth_service: Arc<dyn AuthService>,
    cookies: Arc<CookiePolicy>,
) -> Result<impl warp::Reply, warp::Rejection> {
    auth_service
        .logout(refresh_token.as_deref())
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    let body = ApiResponse::ok(MessageResponse {
        message: "Logged out successfully",
    });
    let mut response = warp::reply::json(&body).into_response();
    append_cookies(
        &mut response,
        &[
            cookies.expired_cookie(ACCESS_COOKIE_NAME),
            cookies.expired_cookie(REFRESH_COOKIE_NAME),
        ],
    );
    Ok(response)
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub message: &'static str,
    pub access_token_expires_at: DateTime<Utc>,
}

pub async fn refresh_token(
    refresh_token: Option<String>,
    auth_service: Arc<dyn AuthService>,
    cookies: Arc<CookiePolicy>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let grant = auth_service
        .refresh(refresh_token.as_deref())
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    let body = ApiResponse::ok(RefreshResponse {
        message: "Token refreshed successfully",
        access_token_expires_at: grant.expires_at,
    });
    let mut response = warp::reply::json(&body).into_response();
    append_cookies(
        &mut response,
        &[cookies.access_cookie(grant.access_token.as_str())],
    );
    Ok(response)
}

pub async fn profile(session: Session) -> Result<impl warp::Reply, warp::Rejection> {
    Ok(warp::reply::json(&ApiResponse::ok(session.user)))
}
