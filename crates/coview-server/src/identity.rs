//! Who is calling.
//!
//! Authentication happens upstream; the gateway forwards the user id (and
//! optionally the email) in headers. A request without them is anonymous.

use std::convert::Infallible;
use std::net::IpAddr;

use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts, HeaderMap};
use coview_shared::constants::{USER_EMAIL_HEADER, USER_ID_HEADER};
use coview_shared::Identity;

use crate::error::ServerError;
use crate::rate_limit::client_ip;

/// The caller of one request.
#[derive(Debug, Clone)]
pub struct Caller {
    pub identity: Option<Identity>,
    pub ip: Option<IpAddr>,
    pub user_agent: Option<String>,
}

impl Caller {
    /// The identified caller, or 401.
    pub fn require(&self, action: &str) -> Result<&Identity, ServerError> {
        self.identity
            .as_ref()
            .ok_or_else(|| ServerError::Unauthorized(format!("sign in to {action}")))
    }

    pub fn user_id(&self) -> Option<&str> {
        self.identity.as_ref().map(|i| i.id.as_str())
    }

    /// Rate limiting subject: the user id when known, else the client address.
    pub fn subject(&self) -> String {
        match (&self.identity, self.ip) {
            (Some(identity), _) => format!("user:{}", identity.id),
            (None, Some(ip)) => format!("ip:{ip}"),
            (None, None) => "anonymous".to_string(),
        }
    }

    /// Opaque description stored with access log entries.
    pub fn client_context(&self) -> String {
        let ip = self.ip.map(|ip| ip.to_string()).unwrap_or_default();
        let agent = self.user_agent.as_deref().unwrap_or_default();
        format!("ip={ip}; ua={agent}")
    }

    fn from_headers(headers: &HeaderMap, ip: Option<IpAddr>) -> Self {
        let text = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
        Self {
            identity: Identity::from_parts(text(USER_ID_HEADER), text(USER_EMAIL_HEADER)),
            ip,
            user_agent: text(header::USER_AGENT.as_str()).map(str::to_string),
        }
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ip = client_ip(&parts.extensions, &parts.headers);
        Ok(Self::from_headers(&parts.headers, ip))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identified_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, "u1".parse().unwrap());
        headers.insert(USER_EMAIL_HEADER, "u1@example.com".parse().unwrap());
        headers.insert(header::USER_AGENT, "test-agent".parse().unwrap());

        let caller = Caller::from_headers(&headers, Some("10.0.0.1".parse().unwrap()));
        assert_eq!(caller.user_id(), Some("u1"));
        assert_eq!(
            caller.identity.as_ref().and_then(|i| i.email.as_deref()),
            Some("u1@example.com")
        );
        assert_eq!(caller.subject(), "user:u1");
        assert_eq!(caller.client_context(), "ip=10.0.0.1; ua=test-agent");
        assert!(caller.require("comment").is_ok());
    }

    #[test]
    fn blank_user_is_anonymous() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, "   ".parse().unwrap());

        let caller = Caller::from_headers(&headers, None);
        assert!(caller.identity.is_none());
        assert_eq!(caller.subject(), "anonymous");
        assert!(matches!(
            caller.require("accept invitations"),
            Err(ServerError::Unauthorized(_))
        ));
    }
}
