use super::cookie::REFRESH_COOKIE_NAME;
use super::handler;
use super::session::with_session;
use crate::server::*;
use std::convert::Infallible;
use std::sync::Arc;
use warp::Filter;

pub fn routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let cookies = Arc::new(server.cookies.clone());

    let signup = warp::path("auth")
        .and(warp::path("signup"))
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(16 * 1024))
        .and(warp::body::json())
        .and(with(server.auth_service.clone()))
        .and(with(cookies.clone()))
        .and_then(handler::signup);

    let login = warp::path("auth")
        .and(warp::path("login"))
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(16 * 1024))
        .and(warp::body::json())
        .and(with(server.auth_service.clone()))
        .and(with(cookies.clone()))
        .and_then(handler::login);

    let logout = warp::path("auth")
        .and(warp::path("logout"))
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::cookie::optional::<String>(REFRESH_COOKIE_NAME))
        .and(with(server.auth_service.clone()))
        .and(with(cookies.clone()))
        .and_then(handler::logout);

    let refresh_token = warp::path("auth")
        .and(warp::path("refresh-token"))
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::cookie::optional::<String>(REFRESH_COOKIE_NAME))
        .and(with(server.auth_service.clone()))
        .and(with(cookies))
        .and_then(handler::refresh_token);

    let profile = warp::path("auth")
        .and(warp::path("profile"))
        .and(warp::path::end())
        .and(warp::get())
        .and(with_session(server.auth_service.clone()))
        .and_then(handler::profile);

    signup
        .or(login)
        .or(logout)
        .or(refresh_token)
        .or(profile)
        .with(warp::trace::request())
}

fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}

