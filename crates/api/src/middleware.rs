use axum::{
    extract::State,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use tracing::{debug, error};

use shopfront_infra::{Accounts, ServiceError};

use crate::context::AuthOutcome;

#[derive(Clone)]
pub struct AuthState {
    pub accounts: Accounts,
}

/// Resolve the bearer token (if any) and record the outcome on the request.
/// Routes decide for themselves whether a principal is required.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let outcome = match extract_bearer(req.headers()).map(|t| t.map(str::to_string)) {
        Ok(None) => AuthOutcome::Anonymous,
        Err(reason) => AuthOutcome::Rejected(reason.to_string()),
        Ok(Some(token)) => match state.accounts.resolve(&token).await {
            Ok(principal) => AuthOutcome::Authenticated(principal),
            Err(ServiceError::Auth(e)) => {
                debug!(error = %e, "bearer token rejected");
                AuthOutcome::Rejected(e.to_string())
            }
            Err(e) => {
                error!(error = %e, "could not resolve bearer token");
                AuthOutcome::Rejected("could not verify credentials".to_string())
            }
        },
    };

    req.extensions_mut().insert(outcome);
    next.run(req).await
}

/// `Ok(None)` when no `Authorization` header is present.
pub fn extract_bearer(headers: &HeaderMap) -> Result<Option<&str>, &'static str> {
    let Some(header) = headers.get(axum::http::header::AUTHORIZATION) else {
        return Ok(None);
    };

    let header = header.to_str().map_err(|_| "malformed authorization header")?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or("authorization header must use the Bearer scheme")?
        .trim();
    if token.is_empty() {
        return Err("empty bearer token");
    }

    Ok(Some(token))
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn bearer_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer(&headers), Ok(None));

        headers.insert("authorization", HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(extract_bearer(&headers), Ok(Some("abc.def")));

        headers.insert("authorization", HeaderValue::from_static("Basic Zm9v"));
        assert!(extract_bearer(&headers).is_err());

        headers.insert("authorization", HeaderValue::from_static("Bearer   "));
        assert!(extract_bearer(&headers).is_err());
    }
}
