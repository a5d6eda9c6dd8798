//! Shared-secret check guarding settings changes.
//!
//! The secret is read once at startup and never refreshed: saving a new
//! secret through the settings endpoint only takes effect after a restart.

use std::net::IpAddr;

#[derive(Debug, Clone, Default)]
pub struct AuthGate {
    secret: Option<String>,
}

impl AuthGate {
    /// An empty secret counts as no secret.
    pub fn new(secret: Option<String>) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.secret.is_some()
    }

    /// Exact, case-sensitive comparison. Passes for anything when no secret
    /// is configured.
    pub fn check(&self, candidate: &str) -> bool {
        match &self.secret {
            None => true,
            Some(secret) => secret == candidate,
        }
    }

    /// With `local_only` set and no secret configured, only loopback peers
    /// are let in.
    pub fn admits_peer(&self, peer: IpAddr, local_only: bool) -> bool {
        !local_only || self.is_configured() || is_loopback(peer)
    }
}

fn is_loopback(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_loopback(),
        // IPv4-mapped loopback arrives this way on dual-stack listeners
        IpAddr::V6(v6) => v6.is_loopback() || v6.to_ipv4_mapped().is_some_and(|v4| v4.is_loopback()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn test_no_secret_passes_everything() {
        let gate = AuthGate::new(None);
        assert!(!gate.is_configured());
        assert!(gate.check(""));
        assert!(gate.check("anything"));
    }

    #[test]
    fn test_empty_secret_is_unconfigured() {
        let gate = AuthGate::new(Some(String::new()));
        assert!(!gate.is_configured());
        assert!(gate.check("whatever"));
    }

    #[test]
    fn test_configured_secret_requires_exact_match() {
        let gate = AuthGate::new(Some("S3cret".to_string()));
        assert!(gate.is_configured());
        assert!(gate.check("S3cret"));
        assert!(!gate.check("s3cret"));
        assert!(!gate.check(" S3cret"));
        assert!(!gate.check("S3cret "));
        assert!(!gate.check(""));
    }

    #[test]
    fn test_local_only_without_secret() {
        let gate = AuthGate::new(None);
        let remote = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20));

        assert!(gate.admits_peer(IpAddr::V4(Ipv4Addr::LOCALHOST), true));
        assert!(gate.admits_peer(IpAddr::V6(Ipv6Addr::LOCALHOST), true));
        assert!(gate.admits_peer(
            IpAddr::V6(Ipv4Addr::LOCALHOST.to_ipv6_mapped()),
            true
        ));
        assert!(!gate.admits_peer(remote, true));
        assert!(gate.admits_peer(remote, false));
    }

    #[test]
    fn test_local_only_ignored_once_secret_is_set() {
        let gate = AuthGate::new(Some("x".to_string()));
        let remote = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7));
        assert!(gate.admits_peer(remote, true));
    }
}
