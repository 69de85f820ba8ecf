//! Optional HTTP Basic Auth in front of every route.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::Engine;
use tracing::{debug, warn};

/// Authenticated username, inserted into request extensions by the auth middleware.
#[derive(Clone)]
pub(crate) struct AuthUser(pub(crate) String);

/// Expected `(user, password)` pair.
pub(crate) type Credentials = Arc<(String, String)>;

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Basic realm=\"brother-exporter\"")],
        "Unauthorized",
    )
        .into_response()
}

/// Extracts `(user, password)` from an `Authorization: Basic ...` header value.
fn decode_basic(value: &str) -> Result<(String, String), &'static str> {
    let encoded = value.strip_prefix("Basic ").ok_or("not basic auth")?;
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|_| "invalid base64")?;
    let decoded = String::from_utf8(decoded).map_err(|_| "invalid utf8")?;
    let (user, pass) = decoded
        .split_once(':')
        .ok_or("malformed credentials")?;
    Ok((user.to_owned(), pass.to_owned()))
}

pub(crate) async fn basic_auth_middleware(
    State(creds): State<Credentials>,
    mut req: Request,
    next: Next,
) -> Response {
    let path = req.uri().path().to_owned();

    let header_value = match req.headers().get(header::AUTHORIZATION) {
        Some(v) => v,
        None => {
            warn!(path = %path, "auth failed: no authorization header");
            return unauthorized();
        }
    };

    let header_str = match header_value.to_str() {
        Ok(s) => s,
        Err(_) => {
            warn!(path = %path, "auth failed: invalid header encoding");
            return unauthorized();
        }
    };

    let (user, pass) = match decode_basic(header_str) {
        Ok(pair) => pair,
        Err(reason) => {
            warn!(path = %path, "auth failed: {reason}");
            return unauthorized();
        }
    };

    if user != creds.0 || pass != creds.1 {
        warn!(user = %user, path = %path, "auth failed: invalid credentials");
        return unauthorized();
    }

    debug!(user = %user, path = %path, "authenticated");
    req.extensions_mut().insert(AuthUser(user));
    next.run(req).await
}
