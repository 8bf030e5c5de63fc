//! SQLite implementation of `AssetRepository`, honoring the upsert keys
//! from `domain::models::asset`: AssetHost=(project_id,ip),
//! AssetService=(host_id,port,proto), AssetWeb=(url),
//! AssetVuln=(host_id,vuln_id) or (url,vuln_id).

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AssetHost, AssetService, AssetVuln, AssetVulnKey, AssetWeb};
use crate::domain::ports::AssetRepository;

#[derive(sqlx::FromRow)]
struct AssetHostRow {
    id: String,
    project_id: String,
    ip: String,
    hostname: Option<String>,
    os: Option<String>,
}

impl TryFrom<AssetHostRow> for AssetHost {
    type Error = anyhow::Error;

    fn try_from(row: AssetHostRow) -> Result<Self, Self::Error> {
        Ok(AssetHost {
            id: Uuid::parse_str(&row.id)?,
            project_id: Uuid::parse_str(&row.project_id)?,
            ip: row.ip,
            hostname: row.hostname,
            os: row.os,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AssetServiceRow {
    id: String,
    host_id: String,
    port: i64,
    proto: String,
    banner: Option<String>,
    product: Option<String>,
    version: Option<String>,
    cpe: Option<String>,
    fingerprint_confidence: Option<i64>,
}

impl TryFrom<AssetServiceRow> for AssetService {
    type Error = anyhow::Error;

    fn try_from(row: AssetServiceRow) -> Result<Self, Self::Error> {
        Ok(AssetService {
            id: Uuid::parse_str(&row.id)?,
            host_id: Uuid::parse_str(&row.host_id)?,
            port: row.port as u16,
            proto: row.proto,
            banner: row.banner,
            product: row.product,
            version: row.version,
            cpe: row.cpe,
            fingerprint_confidence: row.fingerprint_confidence.map(|c| c as u8),
        })
    }
}

#[derive(sqlx::FromRow)]
struct AssetWebRow {
    id: String,
    url: String,
    title: Option<String>,
    tech_stack_json: String,
}

impl TryFrom<AssetWebRow> for AssetWeb {
    type Error = anyhow::Error;

    fn try_from(row: AssetWebRow) -> Result<Self, Self::Error> {
        Ok(AssetWeb {
            id: Uuid::parse_str(&row.id)?,
            url: row.url,
            title: row.title,
            tech_stack: serde_json::from_str(&row.tech_stack_json)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AssetVulnRow {
    id: String,
    host_id: Option<String>,
    url: Option<String>,
    vuln_id: String,
    severity: String,
    evidence: String,
}

impl TryFrom<AssetVulnRow> for AssetVuln {
    type Error = anyhow::Error;

    fn try_from(row: AssetVulnRow) -> Result<Self, Self::Error> {
        let key = match (row.host_id, row.url) {
            (Some(host_id), _) => AssetVulnKey::Host { host_id: Uuid::parse_str(&host_id)?, vuln_id: row.vuln_id },
            (None, Some(url)) => AssetVulnKey::Web { url, vuln_id: row.vuln_id },
            (None, None) => return Err(anyhow::anyhow!("asset_vulns row has neither host_id nor url")),
        };
        Ok(AssetVuln { id: Uuid::parse_str(&row.id)?, key, severity: row.severity, evidence: row.evidence })
    }
}

pub struct SqliteAssetRepository {
    pool: SqlitePool,
}

impl SqliteAssetRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn map_err(e: anyhow::Error) -> DomainError {
    DomainError::ValidationFailed(e.to_string())
}

#[async_trait]
impl AssetRepository for SqliteAssetRepository {
    async fn upsert_host(
        &self,
        project_id: Uuid,
        ip: &str,
        hostname: Option<&str>,
        os: Option<&str>,
    ) -> DomainResult<AssetHost> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"INSERT INTO asset_hosts (id, project_id, ip, hostname, os)
               VALUES (?, ?, ?, ?, ?)
               ON CONFLICT(project_id, ip) DO UPDATE SET
                 hostname = COALESCE(excluded.hostname, asset_hosts.hostname),
                 os = COALESCE(excluded.os, asset_hosts.os)"#,
        )
        .bind(id.to_string())
        .bind(project_id.to_string())
        .bind(ip)
        .bind(hostname)
        .bind(os)
        .execute(&self.pool)
        .await?;

        let row: AssetHostRow = sqlx::query_as("SELECT * FROM asset_hosts WHERE project_id = ? AND ip = ?")
            .bind(project_id.to_string())
            .bind(ip)
            .fetch_one(&self.pool)
            .await?;
        AssetHost::try_from(row).map_err(map_err)
    }

    async fn upsert_service(&self, service: AssetService) -> DomainResult<AssetService> {
        sqlx::query(
            r#"INSERT INTO asset_services (id, host_id, port, proto, banner, product, version, cpe, fingerprint_confidence)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(host_id, port, proto) DO UPDATE SET
                 banner = COALESCE(excluded.banner, asset_services.banner),
                 product = COALESCE(excluded.product, asset_services.product),
                 version = COALESCE(excluded.version, asset_services.version),
                 cpe = COALESCE(excluded.cpe, asset_services.cpe),
                 fingerprint_confidence = COALESCE(excluded.fingerprint_confidence, asset_services.fingerprint_confidence)"#,
        )
        .bind(service.id.to_string())
        .bind(service.host_id.to_string())
        .bind(service.port as i64)
        .bind(&service.proto)
        .bind(&service.banner)
        .bind(&service.product)
        .bind(&service.version)
        .bind(&service.cpe)
        .bind(service.fingerprint_confidence.map(|c| c as i64))
        .execute(&self.pool)
        .await?;

        let row: AssetServiceRow = sqlx::query_as(
            "SELECT * FROM asset_services WHERE host_id = ? AND port = ? AND proto = ?",
        )
        .bind(service.host_id.to_string())
        .bind(service.port as i64)
        .bind(&service.proto)
        .fetch_one(&self.pool)
        .await?;
        AssetService::try_from(row).map_err(map_err)
    }

    async fn upsert_web(&self, url: &str, title: Option<&str>, tech_stack: Vec<String>) -> DomainResult<AssetWeb> {
        let id = Uuid::new_v4();
        let tech_stack_json = serde_json::to_string(&tech_stack)?;

        sqlx::query(
            r#"INSERT INTO asset_webs (id, url, title, tech_stack_json)
               VALUES (?, ?, ?, ?)
               ON CONFLICT(url) DO UPDATE SET
                 title = COALESCE(excluded.title, asset_webs.title),
                 tech_stack_json = excluded.tech_stack_json"#,
        )
        .bind(id.to_string())
        .bind(url)
        .bind(title)
        .bind(&tech_stack_json)
        .execute(&self.pool)
        .await?;

        let row: AssetWebRow = sqlx::query_as("SELECT * FROM asset_webs WHERE url = ?")
            .bind(url)
            .fetch_one(&self.pool)
            .await?;
        AssetWeb::try_from(row).map_err(map_err)
    }

    async fn upsert_vuln(&self, vuln: AssetVuln) -> DomainResult<AssetVuln> {
        let (host_id, url, vuln_id) = match &vuln.key {
            AssetVulnKey::Host { host_id, vuln_id } => (Some(host_id.to_string()), None, vuln_id.clone()),
            AssetVulnKey::Web { url, vuln_id } => (None, Some(url.clone()), vuln_id.clone()),
        };

        sqlx::query(
            r#"INSERT INTO asset_vulns (id, host_id, url, vuln_id, severity, evidence)
               VALUES (?, ?, ?, ?, ?, ?)
               ON CONFLICT(host_id, vuln_id) DO UPDATE SET
                 severity = excluded.severity, evidence = excluded.evidence
               ON CONFLICT(url, vuln_id) DO UPDATE SET
                 severity = excluded.severity, evidence = excluded.evidence"#,
        )
        .bind(vuln.id.to_string())
        .bind(&host_id)
        .bind(&url)
        .bind(&vuln_id)
        .bind(&vuln.severity)
        .bind(&vuln.evidence)
        .execute(&self.pool)
        .await?;

        let row: AssetVulnRow = match &vuln.key {
            AssetVulnKey::Host { host_id, vuln_id } => {
                sqlx::query_as("SELECT * FROM asset_vulns WHERE host_id = ? AND vuln_id = ?")
                    .bind(host_id.to_string())
                    .bind(vuln_id)
                    .fetch_one(&self.pool)
                    .await?
            }
            AssetVulnKey::Web { url, vuln_id } => {
                sqlx::query_as("SELECT * FROM asset_vulns WHERE url = ? AND vuln_id = ?")
                    .bind(url)
                    .bind(vuln_id)
                    .fetch_one(&self.pool)
                    .await?
            }
        };
        AssetVuln::try_from(row).map_err(map_err)
    }

    async fn get_service(&self, host_id: Uuid, port: u16, proto: &str) -> DomainResult<Option<AssetService>> {
        let row: Option<AssetServiceRow> =
            sqlx::query_as("SELECT * FROM asset_services WHERE host_id = ? AND port = ? AND proto = ?")
                .bind(host_id.to_string())
                .bind(port as i64)
                .bind(proto)
                .fetch_optional(&self.pool)
                .await?;
        row.map(AssetService::try_from).transpose().map_err(map_err)
    }
}
