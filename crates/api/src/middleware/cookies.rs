//! Credential cookies.
//!
//! Both credentials travel as `HttpOnly`, `SameSite=Lax` cookies scoped to
//! `/`, living exactly as long as the token they carry.

use axum::http::{HeaderMap, header::COOKIE};
use cookie::{Cookie, SameSite, time::Duration};

use crate::config::CredentialConfig;

/// Value of the named cookie, if the request carries one.
#[must_use]
pub fn read(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value().to_owned())
}

/// Cookie carrying a freshly issued credential.
#[must_use]
pub fn credential(config: &CredentialConfig, name: &str, token: &str) -> Cookie<'static> {
    Cookie::build((name.to_owned(), token.to_owned()))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .secure(config.secure_cookies)
        .max_age(Duration::seconds(config.ttl.num_seconds()))
        .build()
}

/// Cookie that makes the browser drop `name`.
#[must_use]
pub fn removal(config: &CredentialConfig, name: &str) -> Cookie<'static> {
    let mut cookie = Cookie::build((name.to_owned(), String::new()))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .secure(config.secure_cookies)
        .build();
    cookie.make_removal();
    cookie
}
