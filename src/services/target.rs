//! Target and port-range syntax parsing, shared by the Orchestrator's
//! TargetProvider and the Port+Service scanner's range expansion.

use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TargetParseError {
    #[error("invalid target syntax: {0}")]
    InvalidTarget(String),

    #[error("invalid port syntax: {0}")]
    InvalidPort(String),
}

/// Well-known named port sets, the smallest useful stand-in for the
/// service's `top1000` shorthand (full list lives in the rule-pack, not
/// hardcoded here).
fn named_port_set(name: &str) -> Option<Vec<u16>> {
    match name {
        "top1000" => Some(TOP_PORTS.to_vec()),
        _ => None,
    }
}

const TOP_PORTS: &[u16] = &[
    21, 22, 23, 25, 53, 80, 110, 111, 135, 139, 143, 443, 445, 993, 995, 1723, 3306, 3389, 5900,
    8080,
];

/// Expands `"22,80,443,8000-8002"` or `"top1000"` into a sorted, deduped
/// list of ports.
pub fn parse_port_range(spec: &str) -> Result<Vec<u16>, TargetParseError> {
    let mut ports = Vec::new();
    for item in spec.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if let Some(named) = named_port_set(item) {
            ports.extend(named);
            continue;
        }
        if let Some((start, end)) = item.split_once('-') {
            let start: u16 = start
                .parse()
                .map_err(|_| TargetParseError::InvalidPort(item.to_string()))?;
            let end: u16 = end
                .parse()
                .map_err(|_| TargetParseError::InvalidPort(item.to_string()))?;
            if start > end {
                return Err(TargetParseError::InvalidPort(item.to_string()));
            }
            ports.extend(start..=end);
        } else {
            let port: u16 = item
                .parse()
                .map_err(|_| TargetParseError::InvalidPort(item.to_string()))?;
            ports.push(port);
        }
    }
    ports.sort_unstable();
    ports.dedup();
    Ok(ports)
}

/// Expands a target expression into concrete IPv4 addresses. Supports
/// `a.b.c.d`, `a.b.c.d-e.f.g.h` (full range), `a.b.c.d-N` (last-octet
/// shorthand), and CIDR.
pub fn expand_target(spec: &str) -> Result<Vec<Ipv4Addr>, TargetParseError> {
    let spec = spec.trim();

    if let Ok(net) = spec.parse::<Ipv4Network>() {
        return Ok(net.iter().collect());
    }

    if let Some((lhs, rhs)) = spec.split_once('-') {
        let start: Ipv4Addr = lhs
            .parse()
            .map_err(|_| TargetParseError::InvalidTarget(spec.to_string()))?;

        let end = if rhs.contains('.') {
            rhs.parse::<Ipv4Addr>()
                .map_err(|_| TargetParseError::InvalidTarget(spec.to_string()))?
        } else {
            let last: u8 = rhs
                .parse()
                .map_err(|_| TargetParseError::InvalidTarget(spec.to_string()))?;
            let octets = start.octets();
            Ipv4Addr::new(octets[0], octets[1], octets[2], last)
        };

        let start_u32 = u32::from(start);
        let end_u32 = u32::from(end);
        if start_u32 > end_u32 {
            return Err(TargetParseError::InvalidTarget(spec.to_string()));
        }
        return Ok((start_u32..=end_u32).map(Ipv4Addr::from).collect());
    }

    spec.parse::<Ipv4Addr>()
        .map(|ip| vec![ip])
        .map_err(|_| TargetParseError::InvalidTarget(spec.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_range_parses_list_and_range() {
        let ports = parse_port_range("22,80,443,8000-8002").unwrap();
        assert_eq!(ports, vec![22, 80, 443, 8000, 8001, 8002]);
    }

    #[test]
    fn port_range_expands_named_set() {
        let ports = parse_port_range("top1000").unwrap();
        assert!(ports.contains(&22));
        assert!(ports.contains(&443));
    }

    #[test]
    fn port_range_rejects_inverted_bounds() {
        assert!(parse_port_range("100-50").is_err());
    }

    #[test]
    fn single_ip_target() {
        assert_eq!(expand_target("10.0.0.1").unwrap(), vec![Ipv4Addr::new(10, 0, 0, 1)]);
    }

    #[test]
    fn last_octet_shorthand_range() {
        let ips = expand_target("10.0.0.1-5").unwrap();
        assert_eq!(ips.len(), 5);
        assert_eq!(ips[0], Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(ips[4], Ipv4Addr::new(10, 0, 0, 5));
    }

    #[test]
    fn full_range_target() {
        let ips = expand_target("10.0.0.254-10.0.1.1").unwrap();
        assert_eq!(ips.first(), Some(&Ipv4Addr::new(10, 0, 0, 254)));
        assert_eq!(ips.last(), Some(&Ipv4Addr::new(10, 0, 1, 1)));
    }

    #[test]
    fn cidr_target_expands_all_hosts() {
        let ips = expand_target("10.0.0.0/30").unwrap();
        assert_eq!(ips.len(), 4);
    }

    #[test]
    fn rejects_garbage() {
        assert!(expand_target("not-an-ip").is_err());
    }
}
