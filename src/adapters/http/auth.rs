//! Auth & whitelist middleware (§6): skip-paths are checked first, then
//! the IP whitelist (single IPs and CIDRs, IPv4+IPv6), then the Bearer
//! token. Passing the whitelist never implies skipping the token check.
//!
//! Two credentials are in play: the Master's single deployment-wide
//! `master_token`, which gates bootstrap (`/agent/register`) and the
//! operator-facing orchestrator/asset routes, and each agent's own
//! per-agent token (issued at `agent_register`, stored on the `Agent`
//! row), which gates the agent-facing routes (`/agent/heartbeat`,
//! `/agent/tasks`, `/agent/tasks/{id}/status`). A caller holding only the
//! master token cannot act as an arbitrary agent.

use std::net::IpAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use ipnetwork::IpNetwork;

use crate::domain::ports::AgentRepository;

use super::envelope::ApiEnvelope;

const SKIP_PATHS: &[&str] = &["/health", "/auth/register", "/auth/login"];

/// Agent-facing routes that must present the calling agent's own token
/// rather than the shared master token. `/agent/register` is deliberately
/// excluded — bootstrapping a new agent still uses the master token.
const PER_AGENT_TOKEN_PATHS: &[&str] = &["/agent/heartbeat", "/agent/tasks"];

#[derive(Clone)]
pub struct AuthState {
    pub master_token: Arc<str>,
    pub whitelist: Arc<[IpNetwork]>,
    pub agents: Arc<dyn AgentRepository>,
}

impl AuthState {
    pub fn new(
        master_token: impl Into<Arc<str>>,
        whitelist_entries: &[String],
        agents: Arc<dyn AgentRepository>,
    ) -> Self {
        let whitelist = whitelist_entries
            .iter()
            .filter_map(|entry| parse_whitelist_entry(entry))
            .collect::<Vec<_>>()
            .into();
        Self { master_token: master_token.into(), whitelist, agents }
    }

    fn ip_allowed(&self, ip: IpAddr) -> bool {
        self.whitelist.is_empty() || self.whitelist.iter().any(|net| net.contains(ip))
    }
}

fn requires_per_agent_token(path: &str) -> bool {
    PER_AGENT_TOKEN_PATHS.iter().any(|p| path == *p || path.starts_with(p))
}

fn parse_whitelist_entry(entry: &str) -> Option<IpNetwork> {
    if let Ok(net) = entry.parse::<IpNetwork>() {
        return Some(net);
    }
    entry.parse::<IpAddr>().ok().map(IpNetwork::from)
}

fn unauthorized(message: &str) -> Response {
    ApiEnvelope::<()> {
        code: 401,
        status: "failed",
        message: "auth".to_string(),
        data: None,
        error: Some(message.to_string()),
    }
    .into_response()
}

fn forbidden(message: &str) -> Response {
    ApiEnvelope::<()> {
        code: 403,
        status: "failed",
        message: "auth".to_string(),
        data: None,
        error: Some(message.to_string()),
    }
    .into_response()
}

pub async fn require_auth(
    State(state): State<AuthState>,
    ConnectInfo(addr): ConnectInfo<std::net::SocketAddr>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let path = request.uri().path();
    if SKIP_PATHS.iter().any(|skip| path == *skip) {
        return next.run(request).await;
    }

    if !state.ip_allowed(addr.ip()) {
        return forbidden("source ip not in whitelist");
    }

    let header = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let Some(token) = header.and_then(|h| h.strip_prefix("Bearer ")) else {
        return unauthorized("missing or invalid bearer token");
    };

    if requires_per_agent_token(path) {
        match state.agents.find_by_token(token).await {
            Ok(Some(agent)) if agent.token_expiry > Utc::now() => next.run(request).await,
            Ok(_) => unauthorized("agent token unknown or expired"),
            Err(_) => unauthorized("agent token lookup failed"),
        }
    } else if !state.master_token.is_empty() && token == state.master_token.as_ref() {
        next.run(request).await
    } else {
        unauthorized("missing or invalid bearer token")
    }
}
