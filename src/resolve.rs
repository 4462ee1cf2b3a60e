//! Best-effort host name resolution
//!
//! Dashboard rows show a server's network address when it can be resolved
//! from its name. Resolution is strictly best-effort: any failure yields
//! `None` and the caller renders the row without an address.

use std::net::IpAddr;

use tokio::net;

/// Resolves a host name to its first address, or `None` on any failure.
///
/// An address literal is returned as-is without a lookup.
pub async fn resolve_host(host: &str) -> Option<IpAddr> {
    if host.is_empty() {
        return None;
    }
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Some(ip);
    }

    match net::lookup_host(format!("{host}:0")).await {
        Ok(mut addrs) => addrs.next().map(|addr| addr.ip()),
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_address_literal_is_returned_directly() {
        let ip = resolve_host("10.0.0.5").await;
        assert_eq!(ip, Some("10.0.0.5".parse().unwrap()));

        let ip6 = resolve_host("::1").await;
        assert_eq!(ip6, Some("::1".parse().unwrap()));
    }

    #[tokio::test]
    async fn test_empty_name_is_none() {
        assert!(resolve_host("").await.is_none());
    }

    #[tokio::test]
    async fn test_unresolvable_name_is_none() {
        assert!(resolve_host("no-such-host.invalid").await.is_none());
    }

    #[tokio::test]
    async fn test_localhost_resolves() {
        assert!(resolve_host("localhost").await.is_some());
    }
}
