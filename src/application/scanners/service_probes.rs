//! Service-detection engine: an ordered table of probe strings with
//! `match`/`softmatch`/`fallback` regex rules and `$N` template
//! substitution, the mechanism behind nmap's `nmap-service-probes`
//! without carrying the probe-file payload itself (that payload is
//! explicitly out of scope — the matching machinery is not).
//!
//! Algorithm per probe, in table order: send the probe's payload, read
//! the response, then walk `matches` in order. The first non-soft match
//! wins outright. A soft match only records a service name and keeps the
//! engine trying later probes (including any `fallback` probe's matches
//! against the same response) for something more specific. If nothing
//! ever produces a hard match, the best soft match is returned.

use std::net::IpAddr;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

use crate::application::dialer::Dialer;

pub struct ProbeMatch {
    pub service: &'static str,
    pattern: &'static str,
    pub soft: bool,
    pub product: Option<&'static str>,
    pub version: Option<&'static str>,
    pub info: Option<&'static str>,
    pub cpe: Option<&'static str>,
}

impl ProbeMatch {
    fn regex(&self) -> &Regex {
        regex_cache(self.pattern)
    }
}

pub struct ServiceProbe {
    pub name: &'static str,
    /// Raw bytes written to the socket. Empty means "read only" (many
    /// services banner unprompted: SSH, FTP, SMTP, ...).
    pub payload: &'static [u8],
    /// Ports this probe applies to; empty means "any open port".
    pub ports: &'static [u16],
    pub matches: &'static [ProbeMatch],
    /// Name of another probe whose `matches` are also tried against this
    /// probe's response if none of this probe's own matches hit.
    pub fallback: Option<&'static str>,
}

#[derive(Debug, Clone, Default)]
pub struct ServiceMatchResult {
    pub service: String,
    pub product: Option<String>,
    pub version: Option<String>,
    pub info: Option<String>,
    pub cpe: Option<String>,
}

fn regex_cache(pattern: &'static str) -> &'static Regex {
    static CACHE: OnceLock<std::sync::Mutex<std::collections::HashMap<&'static str, &'static Regex>>> = OnceLock::new();
    let cache = CACHE.get_or_init(|| std::sync::Mutex::new(std::collections::HashMap::new()));
    let mut guard = cache.lock().expect("regex cache mutex poisoned");
    if let Some(re) = guard.get(pattern) {
        return re;
    }
    let compiled: &'static Regex = Box::leak(Box::new(Regex::new(pattern).expect("service probe pattern is valid regex")));
    guard.insert(pattern, compiled);
    compiled
}

const NULL_MATCHES: &[ProbeMatch] = &[
    ProbeMatch { service: "ssh", pattern: r"^SSH-(\d\.\d+)-([^\r\n ]+)", soft: false, product: Some("$2"), version: Some("$1"), info: None, cpe: None },
    ProbeMatch { service: "ftp", pattern: r"(?i)^220[- ].*ftp", soft: false, product: None, version: None, info: Some("$0"), cpe: None },
    ProbeMatch { service: "smtp", pattern: r"(?i)^220[- ]\S+.*(e?smtp)", soft: false, product: None, version: None, info: Some("$0"), cpe: None },
    ProbeMatch { service: "pop3", pattern: r"^\+OK", soft: true, product: None, version: None, info: None, cpe: None },
    ProbeMatch { service: "imap", pattern: r"^\* OK", soft: true, product: None, version: None, info: None, cpe: None },
    ProbeMatch { service: "mysql", pattern: r"^.\x00\x00\x00\x0a(\d+\.\d+\.\d+)", soft: false, product: Some("mysql"), version: Some("$1"), info: None, cpe: Some("cpe:/a:mysql:mysql:$1") },
];

const GENERIC_LINES_MATCHES: &[ProbeMatch] = &[
    ProbeMatch { service: "telnet", pattern: r"(?i)login[: ]*$", soft: true, product: None, version: None, info: None, cpe: None },
];

const GET_REQUEST_MATCHES: &[ProbeMatch] = &[
    ProbeMatch { service: "http", pattern: r"(?i)^HTTP/1\.[01] \d+.*\r\n(?:.*\r\n)*?Server: Apache/(\S+)", soft: false, product: Some("Apache httpd"), version: Some("$1"), info: None, cpe: Some("cpe:/a:apache:http_server:$1") },
    ProbeMatch { service: "http", pattern: r"(?i)^HTTP/1\.[01] \d+.*\r\n(?:.*\r\n)*?Server: nginx/(\S+)", soft: false, product: Some("nginx"), version: Some("$1"), info: None, cpe: Some("cpe:/a:nginx:nginx:$1") },
    ProbeMatch { service: "http", pattern: r"(?i)^HTTP/1\.[01] \d+", soft: true, product: None, version: None, info: None, cpe: None },
];

/// Ordered by rarity with the cheap read-only probe first, the way
/// `nmap-service-probes` orders `rarity 1` probes ahead of noisier ones.
static PROBES: &[ServiceProbe] = &[
    ServiceProbe { name: "NULL", payload: b"", ports: &[], matches: NULL_MATCHES, fallback: None },
    ServiceProbe { name: "GetRequest", payload: b"GET / HTTP/1.0\r\n\r\n", ports: &[80, 443, 8000, 8080, 8443], matches: GET_REQUEST_MATCHES, fallback: None },
    ServiceProbe { name: "GenericLines", payload: b"\r\n\r\n", ports: &[], matches: GENERIC_LINES_MATCHES, fallback: Some("NULL") },
];

fn probes_for_port(port: u16) -> Vec<&'static ServiceProbe> {
    let mut specific: Vec<&ServiceProbe> = PROBES.iter().filter(|p| p.ports.contains(&port)).collect();
    let generic: Vec<&ServiceProbe> = PROBES.iter().filter(|p| p.ports.is_empty()).collect();
    specific.extend(generic);
    specific
}

fn apply_template(template: &str, caps: &regex::Captures) -> String {
    let mut out = String::new();
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '$' {
            if let Some(&next) = chars.peek() {
                if let Some(idx) = next.to_digit(10) {
                    chars.next();
                    if let Some(m) = caps.get(idx as usize) {
                        out.push_str(m.as_str());
                    }
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

fn to_result(m: &ProbeMatch, caps: &regex::Captures) -> ServiceMatchResult {
    ServiceMatchResult {
        service: m.service.to_string(),
        product: m.product.map(|t| apply_template(t, caps)),
        version: m.version.map(|t| apply_template(t, caps)),
        info: m.info.map(|t| apply_template(t, caps)),
        cpe: m.cpe.map(|t| apply_template(t, caps)),
    }
}

/// Tries `matches` against `response`; returns `Some(hard match)` on the
/// first non-soft hit, records the first soft hit into `soft` without
/// stopping, and returns `None` if nothing but soft matches were found.
fn try_matches(response: &str, matches: &[ProbeMatch], soft: &mut Option<ServiceMatchResult>) -> Option<ServiceMatchResult> {
    for m in matches {
        if let Some(caps) = m.regex().captures(response) {
            let result = to_result(m, &caps);
            if m.soft {
                if soft.is_none() {
                    *soft = Some(result);
                }
            } else {
                return Some(result);
            }
        }
    }
    None
}

fn probe_by_name(name: &str) -> Option<&'static ServiceProbe> {
    PROBES.iter().find(|p| p.name == name)
}

/// Runs the probe table against one open `(ip, port)`, returning the best
/// service identification found. `read_timeout` bounds each probe's
/// response read; the whole detection reads at most 4KB per probe.
pub async fn detect_service(dialer: &Dialer, ip: IpAddr, port: u16, read_timeout: Duration) -> Option<ServiceMatchResult> {
    let mut soft = None;

    for probe in probes_for_port(port) {
        let Ok(mut stream) = dialer.connect_tcp((ip, port).into()).await else { continue };
        if !probe.payload.is_empty() {
            use tokio::io::AsyncWriteExt;
            if stream.write_all(probe.payload).await.is_err() {
                continue;
            }
        }

        use tokio::io::AsyncReadExt;
        let mut buf = vec![0u8; 4096];
        let response = match tokio::time::timeout(read_timeout, stream.read(&mut buf)).await {
            Ok(Ok(n)) if n > 0 => String::from_utf8_lossy(&buf[..n]).to_string(),
            _ => continue,
        };

        if let Some(hit) = try_matches(&response, probe.matches, &mut soft) {
            return Some(hit);
        }
        if let Some(fallback_name) = probe.fallback {
            if let Some(fallback) = probe_by_name(fallback_name) {
                if let Some(hit) = try_matches(&response, fallback.matches, &mut soft) {
                    return Some(hit);
                }
            }
        }
    }

    soft
}
