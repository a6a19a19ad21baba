use std::time::Duration;
use warp::http::HeaderValue;
use warp::http::header::SET_COOKIE;
use warp::reply::Response;

pub const ACCESS_COOKIE_NAME: &str = "accessToken";
pub const REFRESH_COOKIE_NAME: &str = "refreshToken";

#[derive(Debug, Clone)]
pub struct CookiePolicy {
    pub secure: bool,
    pub access_max_age: Duration,
    pub refresh_max_age: Duration,
}

impl CookiePolicy {
    pub fn access_cookie(&self, value: &str) -> String {
        self.cookie(ACCESS_COOKIE_NAME, value, self.access_max_age.as_secs())
    }

    pub fn refresh_cookie(&self, value: &str) -> String {
        self.cookie(REFRESH_COOKIE_NAME, value, self.refresh_max_age.as_secs())
    }

    pub fn expired_cookie(&self, name: &str) -> String {
        self.cookie(name, "", 0)
    }

    fn cookie(&self, name: &str, value: &str, max_age_secs: u64) -> String {
        let secure = if self.secure { "; Secure" } else { "" };
        format!("{name}={value}; HttpOnly; SameSite=Strict; Path=/; Max-Age={max_age_secs}{secure}")
    }
}

/// `warp::reply::with_header` replaces; cookies have to be appended.
pub fn append_cookies(response: &mut Response, cookies: &[String]) {
    for cookie in cookies {
        if let Ok(value) = HeaderValue::from_str(cookie) {
            response.headers_mut().append(SET_COOKIE, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warp::Reply;

    fn policy(secure: bool) -> CookiePolicy {
        CookiePolicy {
            secure,
            access_max_age: Duration::from_secs(900),
            refresh_max_age: Duration::from_secs(604800),
        }
    }

    #[test]
    fn cookie_attributes() {
        assert_eq!(
            policy(false).access_cookie("abc"),
            "accessToken=abc; HttpOnly; SameSite=Strict; Path=/; Max-Age=900"
        );
        assert_eq!(
            policy(true).refresh_cookie("xyz"),
            "refreshToken=xyz; HttpOnly; SameSite=Strict; Path=/; Max-Age=604800; Secure"
        );
        assert_eq!(
            policy(false).expired_cookie(ACCESS_COOKIE_NAME),
            "accessToken=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0"
        );
    }

    #[test]
    fn both_cookies_survive_on_one_response() {
        let p = policy(false);
        let mut response = warp::reply().into_response();
        append_cookies(&mut response, &[p.access_cookie("a"), p.refresh_cookie("r")]);

        let values: Vec<_> = response.headers().get_all(SET_COOKIE).iter().collect();
        assert_eq!(values.len(), 2);
    }
}
