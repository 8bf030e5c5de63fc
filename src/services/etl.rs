//! ETL Processor: drains the result queue, upserts normalized
//! assets, triggers fingerprint enrichment and auto-tagging. Never poisons
//! the queue — any step's error is captured as an `EtlErrorRecord` and
//! processing moves on to the next result.

use std::sync::Arc;

use serde::Deserialize;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::domain::models::{AssetService, AssetVuln, AssetVulnKey, EntityType, EtlErrorRecord, StageResult};
use crate::domain::ports::{
    AssetRepository, EtlErrorRepository, FingerprintService, TagRepository,
};
use crate::services::ingestor::ResultQueue;
use crate::services::tag_engine;

#[derive(Debug, Deserialize)]
struct PortServiceAttributes {
    ip: String,
    port: u16,
    #[serde(default = "default_proto")]
    proto: String,
    banner: Option<String>,
    hostname: Option<String>,
    os: Option<String>,
}

fn default_proto() -> String {
    "tcp".to_string()
}

#[derive(Debug, Deserialize)]
struct AliveAttributes {
    ip: String,
    hostname: Option<String>,
    os_guess: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OsAttributes {
    ip: String,
    os_family: String,
}

#[derive(Debug, Deserialize)]
struct WebAttributes {
    url: String,
    title: Option<String>,
    #[serde(default)]
    fingerprints: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct VulnAttributes {
    target: String,
    vuln_id: String,
    severity: String,
    evidence: String,
}

#[derive(Debug, Deserialize)]
struct BruteAttributes {
    ip: String,
    protocol: String,
    username: String,
    success: bool,
}

/// Drains `queue` with `worker_count` concurrent consumers, following the
/// `JoinSet`-of-workers shape used elsewhere for bounded worker pools.
pub struct EtlProcessor {
    queue: Arc<ResultQueue>,
    assets: Arc<dyn AssetRepository>,
    tags: Arc<dyn TagRepository>,
    errors: Arc<dyn EtlErrorRepository>,
    fingerprints: Arc<dyn FingerprintService>,
}

impl EtlProcessor {
    pub fn new(
        queue: Arc<ResultQueue>,
        assets: Arc<dyn AssetRepository>,
        tags: Arc<dyn TagRepository>,
        errors: Arc<dyn EtlErrorRepository>,
        fingerprints: Arc<dyn FingerprintService>,
    ) -> Self {
        Self { queue, assets, tags, errors, fingerprints }
    }

    pub fn spawn_workers(self: Arc<Self>, worker_count: usize) -> JoinSet<()> {
        let mut set = JoinSet::new();
        for _ in 0..worker_count {
            let this = Arc::clone(&self);
            set.spawn(async move {
                while let Some(result) = this.queue.pop().await {
                    this.process_one(result).await;
                }
            });
        }
        set
    }

    /// Dispatches a result to its type-specific handler. Every branch
    /// either reaches the asset store or returns `Err`, which `process_one`
    /// turns into an `EtlErrorRecord` — no result type is silently dropped.
    async fn process_one(&self, result: StageResult) {
        let outcome = match result.result_type.as_str() {
            "port" | "service" => self.process_port_service(&result).await,
            "alive" => self.process_alive(&result).await,
            "os" => self.process_os(&result).await,
            "web" => self.process_web(&result).await,
            "vuln" => self.process_vuln(&result).await,
            "brute" => self.process_brute(&result).await,
            other => Err(format!("no ETL handler registered for result_type {other}")),
        };

        if let Err(e) = outcome {
            error!(task_id = %result.task_id, error = %e, "etl failed, recording error row");
            let record = EtlErrorRecord::new(
                result.task_id,
                None,
                result.result_type.clone(),
                result.attributes.clone(),
                e,
                "etl_processor",
            );
            if let Err(write_err) = self.errors.create(&record).await {
                error!(error = %write_err, "failed to persist ETLError row");
            }
        }
    }

    async fn process_port_service(&self, result: &StageResult) -> Result<(), String> {
        let attrs: PortServiceAttributes =
            serde_json::from_value(result.attributes.clone()).map_err(|e| e.to_string())?;

        let host = self
            .assets
            .upsert_host(
                // project_id resolution happens upstream in production;
                // nil here is a placeholder the caller is expected to fill in
                // via a project-scoped wrapper before this stage.
                uuid::Uuid::nil(),
                &attrs.ip,
                attrs.hostname.as_deref(),
                attrs.os.as_deref(),
            )
            .await
            .map_err(|e| e.to_string())?;

        let existing = self
            .assets
            .get_service(host.id, attrs.port, &attrs.proto)
            .await
            .map_err(|e| e.to_string())?;

        let mut service = existing.unwrap_or_else(|| AssetService::new(host.id, attrs.port, &attrs.proto));
        // Last-writer-wins for volatile fields.
        if attrs.banner.is_some() {
            service.banner = attrs.banner;
        }

        let service = self.assets.upsert_service(service).await.map_err(|e| e.to_string())?;

        if service.needs_enrichment() {
            self.enrich(host.id, service).await?;
        } else {
            self.auto_tag(service.id).await?;
        }

        Ok(())
    }

    /// Alive probes only confirm liveness and an optional reverse-DNS
    /// name; they upsert the host row but trigger no further enrichment.
    async fn process_alive(&self, result: &StageResult) -> Result<(), String> {
        let attrs: AliveAttributes = serde_json::from_value(result.attributes.clone()).map_err(|e| e.to_string())?;
        self.assets
            .upsert_host(uuid::Uuid::nil(), &attrs.ip, attrs.hostname.as_deref(), attrs.os_guess.as_deref())
            .await
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    /// OS fingerprint results merge into the host's `os` field.
    async fn process_os(&self, result: &StageResult) -> Result<(), String> {
        let attrs: OsAttributes = serde_json::from_value(result.attributes.clone()).map_err(|e| e.to_string())?;
        self.assets
            .upsert_host(uuid::Uuid::nil(), &attrs.ip, None, Some(&attrs.os_family))
            .await
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    async fn process_web(&self, result: &StageResult) -> Result<(), String> {
        let attrs: WebAttributes = serde_json::from_value(result.attributes.clone()).map_err(|e| e.to_string())?;
        self.assets
            .upsert_web(&attrs.url, attrs.title.as_deref(), attrs.fingerprints)
            .await
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    /// A vuln's key is `(host_id, vuln_id)` if `target` is an IP, or
    /// `(url, vuln_id)` otherwise — stable either way across rescans.
    async fn process_vuln(&self, result: &StageResult) -> Result<(), String> {
        let attrs: VulnAttributes = serde_json::from_value(result.attributes.clone()).map_err(|e| e.to_string())?;

        let key = if attrs.target.parse::<std::net::IpAddr>().is_ok() {
            let host = self
                .assets
                .upsert_host(uuid::Uuid::nil(), &attrs.target, None, None)
                .await
                .map_err(|e| e.to_string())?;
            AssetVulnKey::Host { host_id: host.id, vuln_id: attrs.vuln_id }
        } else {
            AssetVulnKey::Web { url: attrs.target, vuln_id: attrs.vuln_id }
        };

        let vuln = AssetVuln { id: uuid::Uuid::new_v4(), key, severity: attrs.severity, evidence: attrs.evidence };
        self.assets.upsert_vuln(vuln).await.map_err(|e| e.to_string())?;
        Ok(())
    }

    /// A successful brute-force attempt is recorded as a weak-credentials
    /// vuln on the host; a failed attempt is not an error, just nothing to
    /// record.
    async fn process_brute(&self, result: &StageResult) -> Result<(), String> {
        let attrs: BruteAttributes = serde_json::from_value(result.attributes.clone()).map_err(|e| e.to_string())?;
        if !attrs.success {
            return Ok(());
        }

        let host = self
            .assets
            .upsert_host(uuid::Uuid::nil(), &attrs.ip, None, None)
            .await
            .map_err(|e| e.to_string())?;

        let vuln = AssetVuln {
            id: uuid::Uuid::new_v4(),
            key: AssetVulnKey::Host { host_id: host.id, vuln_id: format!("weak_credentials_{}", attrs.protocol) },
            severity: "high".to_string(),
            evidence: format!("valid credentials found for user {}", attrs.username),
        };
        self.assets.upsert_vuln(vuln).await.map_err(|e| e.to_string())?;
        Ok(())
    }

    async fn enrich(&self, _host_id: uuid::Uuid, mut service: AssetService) -> Result<(), String> {
        let banner = service.banner.clone().unwrap_or_default();
        match self.fingerprints.match_banner(&banner).await {
            Some(m) => {
                service.product = Some(m.product);
                service.version = m.version;
                service.cpe = m.cpe;
                service.fingerprint_confidence = Some(m.confidence);
            }
            None => {
                // Mark unknown to break the re-scan/re-enrich loop.
                service.product = Some("unknown".to_string());
            }
        }
        let service = self.assets.upsert_service(service).await.map_err(|e| e.to_string())?;
        self.auto_tag(service.id).await
    }

    async fn auto_tag(&self, service_id: uuid::Uuid) -> Result<(), String> {
        let entity_id = service_id.to_string();
        let rules = self
            .tags
            .list_rules_for(EntityType::Service)
            .await
            .map_err(|e| e.to_string())?;
        let existing = self
            .tags
            .list_for_entity(EntityType::Service, &entity_id)
            .await
            .map_err(|e| e.to_string())?;

        let attrs = serde_json::json!({});
        let (to_add, to_remove) =
            tag_engine::reevaluate(EntityType::Service, &entity_id, &attrs, &rules, &existing)
                .map_err(|e| e.to_string())?;

        for tag in to_add {
            self.tags.link(&tag).await.map_err(|e| e.to_string())?;
        }
        for tag_id in to_remove {
            self.tags
                .unlink(EntityType::Service, &entity_id, tag_id)
                .await
                .map_err(|e| e.to_string())?;
        }
        info!(service_id = %entity_id, "auto-tag reevaluation complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::DomainResult;
    use crate::domain::models::{AssetHost, AssetVuln, AssetWeb};
    use crate::domain::ports::FingerprintMatch;
    use crate::domain::models::{MatchRule, Tag};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use uuid::Uuid;

    #[derive(Default)]
    struct FakeAssetRepo {
        services: Mutex<Vec<AssetService>>,
        hosts: Mutex<Vec<AssetHost>>,
    }

    #[async_trait]
    impl AssetRepository for FakeAssetRepo {
        async fn upsert_host(
            &self,
            project_id: Uuid,
            ip: &str,
            hostname: Option<&str>,
            os: Option<&str>,
        ) -> DomainResult<AssetHost> {
            let mut hosts = self.hosts.lock().unwrap();
            if let Some(existing) = hosts.iter().find(|h| h.ip == ip) {
                return Ok(existing.clone());
            }
            let host = AssetHost {
                id: Uuid::new_v4(),
                project_id,
                ip: ip.to_string(),
                hostname: hostname.map(String::from),
                os: os.map(String::from),
            };
            hosts.push(host.clone());
            Ok(host)
        }

        async fn upsert_service(&self, service: AssetService) -> DomainResult<AssetService> {
            let mut services = self.services.lock().unwrap();
            services.retain(|s| s.id != service.id);
            services.push(service.clone());
            Ok(service)
        }

        async fn upsert_web(&self, url: &str, title: Option<&str>, tech_stack: Vec<String>) -> DomainResult<AssetWeb> {
            Ok(AssetWeb {
                id: Uuid::new_v4(),
                url: url.to_string(),
                title: title.map(String::from),
                tech_stack,
            })
        }

        async fn upsert_vuln(&self, vuln: AssetVuln) -> DomainResult<AssetVuln> {
            Ok(vuln)
        }

        async fn get_service(&self, host_id: Uuid, port: u16, proto: &str) -> DomainResult<Option<AssetService>> {
            Ok(self
                .services
                .lock()
                .unwrap()
                .iter()
                .find(|s| s.host_id == host_id && s.port == port && s.proto == proto)
                .cloned())
        }
    }

    #[derive(Default)]
    struct FakeTagRepo;

    #[async_trait]
    impl TagRepository for FakeTagRepo {
        async fn create_tag(&self, _tag: &Tag) -> DomainResult<()> {
            Ok(())
        }
        async fn get_tag(&self, _id: Uuid) -> DomainResult<Option<Tag>> {
            Ok(None)
        }
        async fn list_tags(&self) -> DomainResult<Vec<Tag>> {
            Ok(vec![])
        }
        async fn create_rule(&self, _rule: &MatchRule) -> DomainResult<()> {
            Ok(())
        }
        async fn list_rules_for(&self, _entity_type: EntityType) -> DomainResult<Vec<MatchRule>> {
            Ok(vec![])
        }
        async fn link(&self, _entity_tag: &crate::domain::models::EntityTag) -> DomainResult<()> {
            Ok(())
        }
        async fn unlink(&self, _entity_type: EntityType, _entity_id: &str, _tag_id: Uuid) -> DomainResult<()> {
            Ok(())
        }
        async fn list_for_entity(&self, _entity_type: EntityType, _entity_id: &str) -> DomainResult<Vec<crate::domain::models::EntityTag>> {
            Ok(vec![])
        }
    }

    #[derive(Default)]
    struct FakeEtlErrorRepo {
        records: Mutex<Vec<EtlErrorRecord>>,
    }

    #[async_trait]
    impl EtlErrorRepository for FakeEtlErrorRepo {
        async fn create(&self, record: &EtlErrorRecord) -> DomainResult<()> {
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }
        async fn get(&self, _id: Uuid) -> DomainResult<Option<EtlErrorRecord>> {
            Ok(None)
        }
        async fn update(&self, _record: &EtlErrorRecord) -> DomainResult<()> {
            Ok(())
        }
        async fn list_new(&self) -> DomainResult<Vec<EtlErrorRecord>> {
            Ok(vec![])
        }
        async fn list_all(&self) -> DomainResult<Vec<EtlErrorRecord>> {
            Ok(self.records.lock().unwrap().clone())
        }
    }

    struct StubFingerprintService;

    #[async_trait]
    impl FingerprintService for StubFingerprintService {
        async fn match_banner(&self, banner: &str) -> Option<FingerprintMatch> {
            if banner.contains("OpenSSH") {
                Some(FingerprintMatch {
                    product: "openssh".to_string(),
                    version: Some("8.9".to_string()),
                    cpe: None,
                    confidence: 90,
                })
            } else {
                None
            }
        }
    }

    #[tokio::test]
    async fn processing_unparseable_attributes_writes_etl_error() {
        let assets = Arc::new(FakeAssetRepo::default());
        let tags = Arc::new(FakeTagRepo);
        let errors = Arc::new(FakeEtlErrorRepo::default());
        let fingerprints = Arc::new(StubFingerprintService);
        let queue = Arc::new(ResultQueue::new(4));
        let processor = EtlProcessor::new(queue, assets, tags, errors.clone(), fingerprints);

        let bad = StageResult {
            task_id: Uuid::new_v4(),
            agent_id: "a1".to_string(),
            result_type: "port".to_string(),
            target_value: "10.0.0.1".to_string(),
            attributes: serde_json::json!({"not": "valid"}),
            evidence: serde_json::json!({}),
            produced_at: chrono::Utc::now(),
        };

        processor.process_one(bad).await;
        assert_eq!(errors.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn enrichment_fills_product_on_fingerprint_match() {
        let assets = Arc::new(FakeAssetRepo::default());
        let tags = Arc::new(FakeTagRepo);
        let errors = Arc::new(FakeEtlErrorRepo::default());
        let fingerprints = Arc::new(StubFingerprintService);
        let queue = Arc::new(ResultQueue::new(4));
        let processor = EtlProcessor::new(queue, assets.clone(), tags, errors.clone(), fingerprints);

        let result = StageResult {
            task_id: Uuid::new_v4(),
            agent_id: "a1".to_string(),
            result_type: "port".to_string(),
            target_value: "10.0.0.1".to_string(),
            attributes: serde_json::json!({
                "ip": "10.0.0.1",
                "port": 22,
                "proto": "tcp",
                "banner": "SSH-2.0-OpenSSH_8.9"
            }),
            evidence: serde_json::json!({}),
            produced_at: chrono::Utc::now(),
        };

        processor.process_one(result).await;
        assert!(errors.list_all().await.unwrap().is_empty());
        let services = assets.services.lock().unwrap();
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].product.as_deref(), Some("openssh"));
    }
}
