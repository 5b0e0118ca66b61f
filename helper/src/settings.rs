use nutype::nutype;

/// Base URL of the REST backend, e.g. `http://localhost:8000`.
#[nutype(
    derive(Clone, Debug, Display),
    sanitize(with = strip_trailing_slash),
    validate(not_empty, predicate = is_http_url)
)]
pub struct ApiBaseUrl(String);

/// Base URL of the push endpoints, e.g. `ws://localhost:8000`.
#[nutype(
    derive(Clone, Debug, Display),
    sanitize(with = strip_trailing_slash),
    validate(not_empty, predicate = is_ws_url)
)]
pub struct WsBaseUrl(String);

/// Bearer token presented on the REST calls and the chat subscription.
#[nutype(derive(Clone, Debug), validate(not_empty))]
pub struct AuthToken(String);

fn strip_trailing_slash(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

fn is_ws_url(url: &str) -> bool {
    url.starts_with("ws://") || url.starts_with("wss://")
}
