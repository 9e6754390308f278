//! Bulk-transfer credential handling

use crate::arrow::transport::{HeaderValue, OutgoingHeaders, ResponseHeaders, AUTHORIZATION_HEADER};
use crate::config::Credentials;
use crate::error::{GdsError, GdsResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// Credential attached to outgoing calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// Encoded `user:password`
    Basic(String),
    /// Server-issued token
    Bearer(String),
}

impl Credential {
    pub fn basic(credentials: &Credentials) -> Self {
        let raw = format!("{}:{}", credentials.username, credentials.password);
        Credential::Basic(STANDARD.encode(raw))
    }

    /// Value of the `authorization` header
    pub fn header_value(&self) -> String {
        match self {
            Credential::Basic(encoded) => format!("Basic {}", encoded),
            Credential::Bearer(token) => format!("Bearer {}", token),
        }
    }
}

/// Attaches the current credential to every call and upgrades it to a bearer
/// token as soon as the server hands one out. The upgrade is one-way.
#[derive(Debug)]
pub struct AuthMiddleware {
    current: RwLock<Arc<Credential>>,
}

impl AuthMiddleware {
    pub fn new(credentials: &Credentials) -> Self {
        Self {
            current: RwLock::new(Arc::new(Credential::basic(credentials))),
        }
    }

    /// Snapshot of the credential in use
    pub fn credential(&self) -> Arc<Credential> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Bearer token, once the server issued one
    pub fn token(&self) -> Option<String> {
        match self.credential().as_ref() {
            Credential::Bearer(token) => Some(token.clone()),
            Credential::Basic(_) => None,
        }
    }

    pub fn sending_headers(&self) -> OutgoingHeaders {
        vec![(AUTHORIZATION_HEADER.to_string(), self.credential().header_value())]
    }

    /// Inspect response headers for a new token
    pub fn received_headers(&self, headers: &ResponseHeaders) -> GdsResult<()> {
        let values = match headers.get(AUTHORIZATION_HEADER) {
            Some(values) if !values.is_empty() => values,
            _ => return Ok(()),
        };

        let value = match values {
            [HeaderValue::Text(value)] => value,
            [other] => return Err(incompatible(&other.to_string())),
            many => {
                let joined: Vec<String> = many.iter().map(ToString::to_string).collect();
                return Err(incompatible(&joined.join(", ")));
            }
        };

        if let Some((scheme, token)) = value.split_once(' ') {
            if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() {
                let next = Arc::new(Credential::Bearer(token.trim().to_string()));
                let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
                if **current != *next {
                    debug!("Received new bulk-transfer token");
                    *current = next;
                }
            }
        }
        Ok(())
    }
}

fn incompatible(value: &str) -> GdsError {
    GdsError::Authentication(format!(
        "Incompatible header value received from server: `{}`",
        value
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn middleware() -> AuthMiddleware {
        AuthMiddleware::new(&Credentials::new("user", "password"))
    }

    #[test]
    fn test_starts_with_basic() {
        let auth = middleware();
        assert_eq!(
            auth.sending_headers(),
            vec![("authorization".to_string(), "Basic dXNlcjpwYXNzd29yZA==".to_string())]
        );
        assert_eq!(auth.token(), None);
    }

    #[test]
    fn test_upgrades_to_bearer() {
        let auth = middleware();
        let headers = ResponseHeaders::new().with_text("authorization", "Bearer token");

        auth.received_headers(&headers).unwrap();

        assert_eq!(auth.token().as_deref(), Some("token"));
        assert_eq!(
            auth.sending_headers(),
            vec![("authorization".to_string(), "Bearer token".to_string())]
        );
    }

    #[test]
    fn test_missing_header_keeps_state() {
        let auth = middleware();
        auth.received_headers(&ResponseHeaders::new()).unwrap();
        assert_eq!(auth.token(), None);

        auth.received_headers(&ResponseHeaders::new().with_text("authorization", "Bearer t1"))
            .unwrap();
        auth.received_headers(&ResponseHeaders::new()).unwrap();
        assert_eq!(auth.token().as_deref(), Some("t1"));
    }

    #[test]
    fn test_never_reverts_to_basic() {
        let auth = middleware();
        auth.received_headers(&ResponseHeaders::new().with_text("authorization", "Bearer t1"))
            .unwrap();
        auth.received_headers(&ResponseHeaders::new().with_text("authorization", "Basic abc"))
            .unwrap();
        assert_eq!(*auth.credential(), Credential::Bearer("t1".to_string()));
    }

    #[test]
    fn test_malformed_header() {
        let auth = middleware();
        let mut headers = ResponseHeaders::new();
        headers.append("authorization", HeaderValue::Binary(Bytes::from_static(b"12342")));

        let err = auth.received_headers(&headers).unwrap_err();

        assert!(matches!(err, GdsError::Authentication(_)));
        assert!(err
            .to_string()
            .contains("Incompatible header value received from server: `12342`"));
        assert_eq!(auth.token(), None);
    }

    #[test]
    fn test_multiple_values_are_rejected() {
        let auth = middleware();
        let headers = ResponseHeaders::new()
            .with_text("authorization", "Bearer a")
            .with_text("authorization", "Bearer b");

        assert!(auth.received_headers(&headers).is_err());
        assert_eq!(auth.token(), None);
    }
}
