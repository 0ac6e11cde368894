//! Per-request information needed to render responses.

use axum::http::{HeaderMap, header};
use axum_helpers::AuthUser;

const FORWARDED_PROTO: &str = "x-forwarded-proto";
const FORWARDED_HOST: &str = "x-forwarded-host";

/// Scheme and host the client used, plus the authenticated caller if any.
///
/// Projections take `Option<&RequestContext>`; `None` means the data is
/// rendered outside an HTTP request (jobs, tests) and absolute URLs cannot
/// be built.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestContext {
    scheme: String,
    host: String,
    user: Option<AuthUser>,
}

fn split_base_url(base_url: &str) -> (String, String) {
    let base_url = base_url.trim_end_matches('/');
    match base_url.split_once("://") {
        Some((scheme, host)) => (scheme.to_string(), host.to_string()),
        None => ("http".to_string(), base_url.to_string()),
    }
}

/// First value of a possibly comma-separated proxy header
fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

impl RequestContext {
    /// Context from a configured base URL such as `https://shop.example.com`
    pub fn new(base_url: &str, user: Option<AuthUser>) -> Self {
        let (scheme, host) = split_base_url(base_url);
        Self { scheme, host, user }
    }

    /// Resolve scheme and host from `Host`, falling back to `fallback_base_url`.
    ///
    /// `X-Forwarded-Proto` and `X-Forwarded-Host` take precedence only when
    /// `trust_forwarded` is set, i.e. a proxy that overwrites them sits in front.
    pub fn from_headers(
        headers: &HeaderMap,
        fallback_base_url: &str,
        trust_forwarded: bool,
        user: Option<AuthUser>,
    ) -> Self {
        let (fallback_scheme, fallback_host) = split_base_url(fallback_base_url);
        let forwarded = |name| {
            if trust_forwarded {
                header_value(headers, name)
            } else {
                None
            }
        };

        let scheme = forwarded(FORWARDED_PROTO)
            .map(str::to_string)
            .unwrap_or(fallback_scheme);
        let host = forwarded(FORWARDED_HOST)
            .or_else(|| header_value(headers, header::HOST.as_str()))
            .map(str::to_string)
            .unwrap_or(fallback_host);

        Self { scheme, host, user }
    }

    pub fn user(&self) -> Option<&AuthUser> {
        self.user.as_ref()
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// `scheme://host/path`; paths that already carry a scheme are returned as is.
    pub fn build_absolute_uri(&self, path: &str) -> String {
        if path.contains("://") {
            return path.to_string();
        }
        if path.starts_with('/') {
            format!("{}://{}{}", self.scheme, self.host, path)
        } else {
            format!("{}://{}/{}", self.scheme, self.host, path)
        }
    }
}
