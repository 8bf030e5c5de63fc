//! Domain models for the NeoScan distributed scanning engine.

pub mod agent;
pub mod agent_metrics;
pub mod agent_task;
pub mod asset;
pub mod entity_tag;
pub mod etl_error;
pub mod match_rule;
pub mod project;
pub mod stage;
pub mod stage_dag;
pub mod stage_result;
pub mod tag;
pub mod task;
pub mod task_result;
pub mod workflow;

pub use agent::{Agent, AgentHardware, AgentStatus};
pub use agent_metrics::{AgentMetrics, WorkStatus};
pub use agent_task::{AgentTask, AgentTaskStatus};
pub use asset::{
    AssetHost, AssetHostKey, AssetService, AssetServiceKey, AssetVuln, AssetVulnKey, AssetWeb,
};
pub use entity_tag::{EntityTag, TagSource};
pub use etl_error::{EtlErrorRecord, EtlErrorStatus};
pub use match_rule::{EntityType, MatchRule};
pub use project::{FileFormat, Project, ProjectStatus, TargetSource};
pub use stage::{ExecutionPolicy, ScanStage};
pub use stage_dag::{StageDag, StageDagError};
pub use stage_result::StageResult;
pub use tag::Tag;
pub use task::{Task, TaskType};
pub use task_result::{
    BruteResult, IpAliveResult, OsInfo, PortServiceResult, ResultData, ResultStatus,
    TabularProjection, TaskResult, VulnResult, WebResult,
};
pub use workflow::Workflow;
