//! SQLite adapters implementing the domain's repository ports.

pub mod agent_repository;
pub mod asset_repository;
pub mod connection;
pub mod etl_error_repository;
pub mod project_repository;
pub mod tag_repository;
pub mod task_repository;

pub use agent_repository::SqliteAgentRepository;
pub use asset_repository::SqliteAssetRepository;
pub use connection::{create_pool, create_test_pool, migrate, ConnectionError, PoolConfig};
pub use etl_error_repository::SqliteEtlErrorRepository;
pub use project_repository::{SqliteProjectRepository, SqliteWorkflowRepository};
pub use tag_repository::SqliteTagRepository;
pub use task_repository::SqliteTaskRepository;
