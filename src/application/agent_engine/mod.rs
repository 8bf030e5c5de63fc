//! Agent-side task execution engine (§4.4): translates wire tasks into
//! domain `Task`s, runs them on a bounded worker pool, and reports
//! results back to the Master.

pub mod client;
pub mod reporter;
pub mod translator;
pub mod worker_pool;

pub use client::AgentClient;
pub use reporter::Reporter;
pub use translator::TaskTranslator;
pub use worker_pool::WorkerPool;
