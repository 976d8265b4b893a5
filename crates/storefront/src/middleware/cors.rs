//! CORS for the storefront front-end.
//!
//! The front-end is served from `STOREFRONT_BASE_URL` and calls the API with
//! the session cookie, so only that origin is allowed and credentials are on.

use axum::http::{HeaderValue, Method, header};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::StorefrontConfig;

/// Origin part of a base URL (`scheme://host[:port]`), if it parses.
fn origin_of(base_url: &str) -> Option<HeaderValue> {
    let url = url::Url::parse(base_url).ok()?;
    HeaderValue::from_str(&url.origin().ascii_serialization()).ok()
}

/// Build the CORS layer.
#[must_use]
pub fn cors_layer(config: &StorefrontConfig) -> CorsLayer {
    let origin = origin_of(&config.base_url).map_or_else(
        || {
            tracing::warn!(base_url = %config.base_url, "Base URL has no usable origin, CORS disabled");
            AllowOrigin::list([])
        },
        AllowOrigin::exact,
    );

    CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_strips_path() {
        assert_eq!(
            origin_of("https://rayhastore.com/boutique/"),
            Some(HeaderValue::from_static("https://rayhastore.com"))
        );
        assert_eq!(
            origin_of("http://localhost:3000"),
            Some(HeaderValue::from_static("http://localhost:3000"))
        );
        assert_eq!(origin_of("not a url"), None);
    }
}
