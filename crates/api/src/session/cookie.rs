//! Reading the session cookie from requests and writing `Set-Cookie`.

use std::fmt::Write as _;

use axum::http::{header, header::InvalidHeaderValue, HeaderMap, HeaderValue};

use super::policy::CookieAttributes;

/// First value of cookie `name` across every `Cookie` header.
pub fn read<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.trim_matches('"'))
}

/// Render a `Set-Cookie` header.
pub fn render(name: &str, value: &str, attrs: &CookieAttributes) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut out = format!("{name}={value}; Max-Age={}; Path={}", attrs.max_age_secs, attrs.path);
    if let Some(domain) = &attrs.domain {
        let _ = write!(out, "; Domain={domain}");
    }
    if attrs.http_only {
        out.push_str("; HttpOnly");
    }
    if attrs.secure {
        out.push_str("; Secure");
    }
    let _ = write!(out, "; SameSite={}", attrs.same_site.as_attribute());
    HeaderValue::from_str(&out)
}
