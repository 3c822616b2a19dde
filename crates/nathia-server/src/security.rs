//! Provider endpoint validation
//!
//! Outbound provider URLs come from configuration and environment. Before
//! any client is built they are checked so a misconfigured endpoint cannot
//! point the server at itself, the local network or a cloud metadata
//! service.

use std::net::IpAddr;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("invalid provider URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("scheme '{0}' not allowed for provider endpoints")]
    InvalidScheme(String),

    #[error("provider host '{host}' is not allowed: {reason}")]
    BlockedHost { host: String, reason: &'static str },

    #[error("provider URL has no host")]
    MissingHost,
}

/// Hostnames that resolve to the machine itself or a metadata service
const BLOCKED_HOSTNAMES: &[&str] = &[
    "localhost",
    "localhost.localdomain",
    "ip6-localhost",
    "ip6-loopback",
    "metadata.google.internal",
    "metadata.goog",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct EndpointPolicy {
    /// Plain HTTP accepted
    pub allow_http: bool,
    /// Loopback, localhost and private ranges accepted
    pub allow_local: bool,
}

impl EndpointPolicy {
    /// HTTPS to public hosts only
    pub fn production() -> Self {
        Self::default()
    }

    /// Local mock providers allowed
    pub fn development() -> Self {
        Self {
            allow_http: true,
            allow_local: true,
        }
    }

    pub fn for_mode(development: bool) -> Self {
        if development {
            Self::development()
        } else {
            Self::production()
        }
    }
}

/// Parse `endpoint` and reject it unless `policy` allows its scheme and host
pub fn validate_provider_url(endpoint: &str, policy: &EndpointPolicy) -> Result<Url, SecurityError> {
    let url = Url::parse(endpoint)?;

    match url.scheme() {
        "https" => {}
        "http" if policy.allow_http => {}
        other => return Err(SecurityError::InvalidScheme(other.to_string())),
    }

    let host = url.host_str().ok_or(SecurityError::MissingHost)?;
    let blocked = |reason| SecurityError::BlockedHost {
        host: host.to_string(),
        reason,
    };

    // Metadata endpoints are refused even in development
    let bare = host.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = bare.parse::<IpAddr>() {
        if is_link_local(&ip) {
            return Err(blocked("link-local address"));
        }
        if !policy.allow_local && ip.is_loopback() {
            return Err(blocked("loopback address"));
        }
        if !policy.allow_local && is_private(&ip) {
            return Err(blocked("private address"));
        }
    } else {
        let lower = host.to_ascii_lowercase();
        let named = BLOCKED_HOSTNAMES
            .iter()
            .find(|name| lower == **name || lower.ends_with(&format!(".{}", name)));
        if let Some(name) = named {
            if name.starts_with("metadata") {
                return Err(blocked("metadata service"));
            }
            if !policy.allow_local {
                return Err(blocked("local hostname"));
            }
        }
    }

    Ok(url)
}

fn is_private(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let [a, b, ..] = v4.octets();
            // RFC 1918, carrier-grade NAT and "this network"
            v4.is_private() || (a == 100 && (b & 0xc0) == 64) || a == 0
        }
        // fc00::/7
        IpAddr::V6(v6) => (v6.segments()[0] & 0xfe00) == 0xfc00,
    }
}

fn is_link_local(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_link_local(),
        IpAddr::V6(v6) => (v6.segments()[0] & 0xffc0) == 0xfe80,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_https_accepted() {
        let url = validate_provider_url(
            "https://generativelanguage.googleapis.com/v1beta/models/x:generateContent",
            &EndpointPolicy::production(),
        )
        .unwrap();
        assert_eq!(url.host_str(), Some("generativelanguage.googleapis.com"));
    }

    #[test]
    fn test_http_needs_development() {
        let err = validate_provider_url("http://api.example.com", &EndpointPolicy::production());
        assert!(matches!(err, Err(SecurityError::InvalidScheme(_))));
        assert!(validate_provider_url("http://api.example.com", &EndpointPolicy::development()).is_ok());
    }

    #[test]
    fn test_local_hosts_rejected_in_production() {
        let policy = EndpointPolicy::production();
        for endpoint in [
            "https://localhost:8080",
            "https://127.0.0.1/v1",
            "https://[::1]/v1",
            "https://10.0.0.4",
            "https://192.168.1.1",
        ] {
            assert!(
                matches!(validate_provider_url(endpoint, &policy), Err(SecurityError::BlockedHost { .. })),
                "{endpoint} should be blocked"
            );
        }
    }

    #[test]
    fn test_metadata_always_rejected() {
        let policy = EndpointPolicy::development();
        assert!(validate_provider_url("http://169.254.169.254/latest/meta-data/", &policy).is_err());
        assert!(validate_provider_url("http://metadata.google.internal/", &policy).is_err());
        assert!(validate_provider_url("http://127.0.0.1:9000/mock", &policy).is_ok());
    }

    #[test]
    fn test_garbage_rejected() {
        let err = validate_provider_url("not a url", &EndpointPolicy::production());
        assert!(matches!(err, Err(SecurityError::InvalidUrl(_))));
    }
}
