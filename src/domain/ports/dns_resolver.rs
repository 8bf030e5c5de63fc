//! DNS resolver port used by the Alive runner's optional hostname
//! resolution step. A trait seam so tests can inject a fake resolver
//! instead of making real DNS calls.

use std::net::IpAddr;

use async_trait::async_trait;

#[async_trait]
pub trait DnsResolver: Send + Sync {
    async fn resolve(&self, ip: IpAddr) -> Option<String>;
}

/// A resolver that never resolves anything — used when hostname
/// resolution is disabled, or as a safe default in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDnsResolver;

#[async_trait]
impl DnsResolver for NullDnsResolver {
    async fn resolve(&self, _ip: IpAddr) -> Option<String> {
        None
    }
}
