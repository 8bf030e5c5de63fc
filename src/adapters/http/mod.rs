//! HTTP adapters: the Master's axum API and the Agent's reqwest-based
//! `MasterClient` implementation.

pub mod agent_client;
pub mod auth;
pub mod envelope;
pub mod master_api;

pub use agent_client::HttpMasterClient;
pub use auth::AuthState;
pub use envelope::{ApiEnvelope, ApiError, ApiResult};
pub use master_api::{router, MasterApiState};
