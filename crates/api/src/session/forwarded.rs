//! Client address and scheme as seen through trusted reverse proxies.

use std::net::{IpAddr, SocketAddr};

use axum::http::{HeaderMap, HeaderName};

static X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
static X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

/// What the service may believe about the original request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Forwarded {
    /// The client reached the outermost trusted hop over HTTPS.
    pub secure: bool,
    pub client_ip: Option<IpAddr>,
}

impl Forwarded {
    /// Derive from the socket peer and `X-Forwarded-*` headers.
    ///
    /// With `trusted_hops == 0` the headers are ignored: the service itself
    /// never terminates TLS, so the request is plain HTTP from `peer`.
    /// Otherwise the peer is the nearest proxy and the client is found
    /// `trusted_hops` entries back along `X-Forwarded-For`. When `peer` is
    /// unknown the rightmost `X-Forwarded-For` entry counts as the first hop.
    /// The scheme is the first `X-Forwarded-Proto` value.
    pub fn derive(headers: &HeaderMap, peer: Option<SocketAddr>, trusted_hops: u8) -> Self {
        let peer_ip = peer.map(|p| p.ip());
        if trusted_hops == 0 {
            return Self {
                secure: false,
                client_ip: peer_ip,
            };
        }

        // Nearest first: the socket peer, then X-Forwarded-For right to left.
        let chain: Vec<IpAddr> = peer_ip
            .into_iter()
            .chain(
                forwarded_for(headers)
                    .into_iter()
                    .rev()
                    .map_while(|entry| entry.parse::<IpAddr>().ok()),
            )
            .collect();
        // Without a socket peer the chain starts one hop further out.
        let hops = usize::from(trusted_hops) - usize::from(peer_ip.is_none());
        let client_ip = chain.get(hops.min(chain.len().saturating_sub(1))).copied();

        let secure = headers
            .get(&X_FORWARDED_PROTO)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .is_some_and(|proto| proto.trim().eq_ignore_ascii_case("https"));

        Self { secure, client_ip }
    }
}

fn forwarded_for(headers: &HeaderMap) -> Vec<&str> {
    headers
        .get_all(&X_FORWARDED_FOR)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn peer() -> Option<SocketAddr> {
        Some("10.0.0.2:40000".parse().unwrap())
    }

    fn headers(xff: &str, proto: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(X_FORWARDED_FOR.clone(), HeaderValue::from_str(xff).unwrap());
        h.insert(X_FORWARDED_PROTO.clone(), HeaderValue::from_str(proto).unwrap());
        h
    }

    #[test]
    fn no_trusted_hops_ignores_headers() {
        let f = Forwarded::derive(&headers("203.0.113.9", "https"), peer(), 0);
        assert!(!f.secure);
        assert_eq!(f.client_ip, Some("10.0.0.2".parse().unwrap()));
    }

    #[test]
    fn one_hop_trusts_the_proxy() {
        let f = Forwarded::derive(&headers("198.51.100.1, 203.0.113.9", "https"), peer(), 1);
        assert!(f.secure);
        assert_eq!(f.client_ip, Some("203.0.113.9".parse().unwrap()));
    }

    #[test]
    fn two_hops_walk_further_back() {
        let f = Forwarded::derive(&headers("198.51.100.1, 203.0.113.9", "https,http"), peer(), 2);
        assert!(f.secure);
        assert_eq!(f.client_ip, Some("198.51.100.1".parse().unwrap()));
    }

    #[test]
    fn hops_beyond_chain_stop_at_the_furthest_entry() {
        let f = Forwarded::derive(&headers("198.51.100.1", "http"), peer(), 5);
        assert!(!f.secure);
        assert_eq!(f.client_ip, Some("198.51.100.1".parse().unwrap()));
    }

    #[test]
    fn missing_headers_mean_plain_http_from_peer() {
        let f = Forwarded::derive(&HeaderMap::new(), peer(), 1);
        assert!(!f.secure);
        assert_eq!(f.client_ip, Some("10.0.0.2".parse().unwrap()));
    }

    #[test]
    fn unknown_peer_counts_rightmost_entry_as_first_hop() {
        let h = headers("198.51.100.1, 203.0.113.9", "https");
        let one = Forwarded::derive(&h, None, 1);
        assert_eq!(one.client_ip, Some("203.0.113.9".parse().unwrap()));
        let two = Forwarded::derive(&h, None, 2);
        assert_eq!(two.client_ip, Some("198.51.100.1".parse().unwrap()));
        assert!(two.secure);
    }
}
