//! Fingerprint lookup port, consulted by ETL enrichment (§4.7 step 4)
//! when a service has a banner but no identified product.

use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct FingerprintMatch {
    pub product: String,
    pub version: Option<String>,
    pub cpe: Option<String>,
    pub confidence: u8,
}

#[async_trait]
pub trait FingerprintService: Send + Sync {
    async fn match_banner(&self, banner: &str) -> Option<FingerprintMatch>;
}

/// A fingerprint service that never matches — used in tests and when no
/// rule-pack has been loaded yet.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullFingerprintService;

#[async_trait]
impl FingerprintService for NullFingerprintService {
    async fn match_banner(&self, _banner: &str) -> Option<FingerprintMatch> {
        None
    }
}
