use std::fmt;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::Response,
};

/// A shared secret expected as `Authorization: Bearer <secret>`.
///
/// An empty secret accepts nothing, so an unconfigured trigger stays closed.
#[derive(Clone)]
pub struct BearerSecret(Arc<str>);

impl BearerSecret {
    pub fn new(secret: &str) -> Self {
        Self(Arc::from(secret))
    }

    pub fn accepts(&self, token: &str) -> bool {
        !self.0.is_empty() && constant_time_eq(self.0.as_bytes(), token.as_bytes())
    }
}

impl fmt::Debug for BearerSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BearerSecret").field(&"<redacted>").finish()
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub async fn require_bearer(
    State(secret): State<BearerSecret>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .is_some_and(|token| secret.accepts(token));

    if !authorized {
        tracing::warn!(
            name: "security.trigger.rejected",
            path = %request.uri().path(),
            "Rejected unauthorized trigger request"
        );
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(next.run(request).await)
}
