//! Normalized asset models the ETL processor upserts results into.
//! Upsert keys per §4.7: AssetHost=(project_id,ip), AssetService=(host_id,port,proto),
//! AssetWeb=(url), AssetVuln=(host_id,vuln_id) or (url,vuln_id).

use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssetHostKey {
    pub project_id: Uuid,
    pub ip: String,
}

#[derive(Debug, Clone)]
pub struct AssetHost {
    pub id: Uuid,
    pub project_id: Uuid,
    pub ip: String,
    pub hostname: Option<String>,
    pub os: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssetServiceKey {
    pub host_id: Uuid,
    pub port: u16,
    pub proto: String,
}

#[derive(Debug, Clone)]
pub struct AssetService {
    pub id: Uuid,
    pub host_id: Uuid,
    pub port: u16,
    pub proto: String,
    pub banner: Option<String>,
    pub product: Option<String>,
    pub version: Option<String>,
    pub cpe: Option<String>,
    pub fingerprint_confidence: Option<u8>,
}

impl AssetService {
    pub fn new(host_id: Uuid, port: u16, proto: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            host_id,
            port,
            proto: proto.into(),
            banner: None,
            product: None,
            version: None,
            cpe: None,
            fingerprint_confidence: None,
        }
    }

    /// Whether enrichment (fingerprint lookup) should run: a banner exists
    /// but the product is still unknown.
    pub fn needs_enrichment(&self) -> bool {
        self.banner.is_some() && self.product.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct AssetWeb {
    pub id: Uuid,
    pub url: String,
    pub title: Option<String>,
    pub tech_stack: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AssetVulnKey {
    Host { host_id: Uuid, vuln_id: String },
    Web { url: String, vuln_id: String },
}

#[derive(Debug, Clone)]
pub struct AssetVuln {
    pub id: Uuid,
    pub key: AssetVulnKey,
    pub severity: String,
    pub evidence: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn needs_enrichment_only_with_banner_and_no_product() {
        let host = Uuid::new_v4();
        let mut s = AssetService::new(host, 22, "tcp");
        assert!(!s.needs_enrichment());
        s.banner = Some("SSH-2.0-OpenSSH_8.9".into());
        assert!(s.needs_enrichment());
        s.product = Some("openssh".into());
        assert!(!s.needs_enrichment());
    }
}
