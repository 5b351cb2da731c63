//! Deterministic ordering and per-protocol grouping of verified proxies

use crate::proxy::models::{Protocol, VerifiedProxy};
use std::collections::BTreeMap;

/// Sort the verified list into its final deterministic order.
///
/// Speed sort is ascending by latency with unmeasured proxies last;
/// address sort is lexicographic by (protocol, host, port). Both are
/// stable, so ties keep their input order.
pub fn aggregate(mut verified: Vec<VerifiedProxy>, sort_by_speed: bool) -> Vec<VerifiedProxy> {
    if sort_by_speed {
        verified.sort_by(|a, b| {
            a.latency
                .unwrap_or(f64::INFINITY)
                .total_cmp(&b.latency.unwrap_or(f64::INFINITY))
        });
    } else {
        verified.sort_by(|a, b| {
            (a.endpoint.protocol, &a.endpoint.host, a.endpoint.port)
                .cmp(&(b.endpoint.protocol, &b.endpoint.host, b.endpoint.port))
        });
    }
    verified
}

/// Group an ordered list by protocol, preserving the list's order inside
/// each sublist. The overall list is not altered.
pub fn group_by_protocol(proxies: &[VerifiedProxy]) -> BTreeMap<Protocol, Vec<VerifiedProxy>> {
    let mut grouped: BTreeMap<Protocol, Vec<VerifiedProxy>> = BTreeMap::new();
    for proxy in proxies {
        grouped
            .entry(proxy.endpoint.protocol)
            .or_default()
            .push(proxy.clone());
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::models::ProxyEndpoint;

    fn verified(protocol: Protocol, host: &str, port: u16, latency: Option<f64>) -> VerifiedProxy {
        VerifiedProxy {
            endpoint: ProxyEndpoint::new(protocol, host.to_string(), port),
            latency,
            exit_ip: None,
        }
    }

    #[test]
    fn test_speed_sort_puts_unmeasured_last() {
        let input = vec![
            verified(Protocol::Http, "1.1.1.1", 80, None),
            verified(Protocol::Http, "2.2.2.2", 80, Some(0.5)),
            verified(Protocol::Http, "3.3.3.3", 80, Some(0.1)),
            verified(Protocol::Http, "4.4.4.4", 80, None),
        ];

        let sorted = aggregate(input, true);
        assert_eq!(sorted[0].endpoint.host, "3.3.3.3");
        assert_eq!(sorted[1].endpoint.host, "2.2.2.2");
        // unmeasured proxies keep their relative input order at the end
        assert_eq!(sorted[2].endpoint.host, "1.1.1.1");
        assert_eq!(sorted[3].endpoint.host, "4.4.4.4");
    }

    #[test]
    fn test_speed_sort_stable_among_equal_latencies() {
        let input = vec![
            verified(Protocol::Http, "b.example.com", 80, Some(0.2)),
            verified(Protocol::Http, "a.example.com", 80, Some(0.2)),
            verified(Protocol::Http, "c.example.com", 80, Some(0.2)),
        ];

        let sorted = aggregate(input, true);
        let hosts: Vec<_> = sorted.iter().map(|p| p.endpoint.host.as_str()).collect();
        assert_eq!(hosts, ["b.example.com", "a.example.com", "c.example.com"]);
    }

    #[test]
    fn test_address_sort() {
        let input = vec![
            verified(Protocol::Socks5, "1.1.1.1", 80, None),
            verified(Protocol::Http, "2.2.2.2", 9000, None),
            verified(Protocol::Http, "2.2.2.2", 80, None),
            verified(Protocol::Socks4, "9.9.9.9", 80, None),
        ];

        let sorted = aggregate(input, false);
        let keys: Vec<_> = sorted
            .iter()
            .map(|p| (p.endpoint.protocol, p.endpoint.host.as_str(), p.endpoint.port))
            .collect();
        assert_eq!(
            keys,
            [
                (Protocol::Http, "2.2.2.2", 80),
                (Protocol::Http, "2.2.2.2", 9000),
                (Protocol::Socks4, "9.9.9.9", 80),
                (Protocol::Socks5, "1.1.1.1", 80),
            ]
        );
    }

    #[test]
    fn test_group_by_protocol_preserves_order() {
        let ordered = vec![
            verified(Protocol::Socks5, "1.1.1.1", 80, Some(0.1)),
            verified(Protocol::Http, "2.2.2.2", 80, Some(0.2)),
            verified(Protocol::Socks5, "3.3.3.3", 80, Some(0.3)),
        ];

        let grouped = group_by_protocol(&ordered);
        assert_eq!(grouped.len(), 2);
        let socks5: Vec<_> = grouped[&Protocol::Socks5]
            .iter()
            .map(|p| p.endpoint.host.as_str())
            .collect();
        assert_eq!(socks5, ["1.1.1.1", "3.3.3.3"]);
        assert_eq!(grouped[&Protocol::Http].len(), 1);
    }
}
