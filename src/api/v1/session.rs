use super::cookie::ACCESS_COOKIE_NAME;
use super::error::rejection;
use crate::application_port::*;
use crate::domain_model::*;
use std::sync::Arc;
use warp::Filter;

/// Resolves the `accessToken` cookie into a [`Session`], or rejects with the
/// precise credential failure.
pub fn with_session(
    auth_service: Arc<dyn AuthService>,
) -> impl Filter<Extract = (Session,), Error = warp::Rejection> + Clone {
    warp::cookie::optional::<String>(ACCESS_COOKIE_NAME).and_then(
        move |token: Option<String>| {
            let auth_service = auth_service.clone();
            async move {
                auth_service
                    .authenticate(token.as_deref())
                    .await
                    .map_err(rejection)
            }
        },
    )
}

/// Role gate. Runs only after [`with_session`] has resolved the user, so an
/// unauthenticated caller still sees 401 rather than 403.
///
/// The auth routes themselves need no role. Admin-only routes (catalog
/// management and the like) live outside this crate and mount this filter
/// next to [`routes`](super::routes), sharing [`recover_error`](super::recover_error):
///
/// ```ignore
/// let admin_products = warp::path("products")
///     .and(with_role(server.auth_service.clone(), Role::Admin))
///     .and_then(create_product);
/// let api = warp::path("api")
///     .and(warp::path("v1"))
///     .and(routes(server).or(admin_products))
///     .recover(recover_error);
/// ```
pub fn with_role(
    auth_service: Arc<dyn AuthService>,
    role: Role,
) -> impl Filter<Extract = (Session,), Error = warp::Rejection> + Clone {
    with_session(auth_service).and_then(move |session: Session| async move {
        if session.has_role(role) {
            Ok(session)
        } else {
            Err(rejection(AuthError::Forbidden))
        }
    })
}
