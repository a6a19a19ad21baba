mod auth_service_impl;
mod clock_fake;
mod credential_hasher_argon2;
mod token_codec_jwt;

pub use auth_service_impl::*;
pub use clock_fake::*;
pub use credential_hasher_argon2::*;
pub use token_codec_jwt::*;
