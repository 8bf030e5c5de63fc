//! Ports: trait seams between the domain and the outside world. Adapters
//! in `crate::adapters` implement these; `crate::application`/`crate::services`
//! depend only on the traits.

pub mod agent_repository;
pub mod archiver;
pub mod asset_repository;
pub mod dns_resolver;
pub mod etl_error_repository;
pub mod fingerprint_service;
pub mod master_client;
pub mod project_repository;
pub mod tag_repository;
pub mod task_repository;

pub use agent_repository::AgentRepository;
pub use archiver::{Archiver, NullArchiver};
pub use asset_repository::AssetRepository;
pub use dns_resolver::{DnsResolver, NullDnsResolver};
pub use etl_error_repository::EtlErrorRepository;
pub use fingerprint_service::{FingerprintMatch, FingerprintService, NullFingerprintService};
pub use master_client::{
    MasterClient, MasterClientError, RegisterRequest, RegisterResponse, RuleVersions,
    StatusReport, WireTask,
};
pub use project_repository::{ProjectRepository, WorkflowRepository};
pub use tag_repository::TagRepository;
pub use task_repository::{AgentTaskFilter, TaskRepository};
