//! `scan <mode>`: runs a single scanner standalone, against the local
//! `Dialer`/`DnsResolver` defaults, printing results instead of reporting
//! them to a Master.

use std::sync::Arc;

use anyhow::{bail, Result};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::application::dialer::Dialer;
use crate::application::runner::Runner;
use crate::application::scanners::{
    alive::AliveRunner, brute::BruteRunner, os_fingerprint::OsFingerprintRunner,
    port_service::PortServiceRunner, web::WebRunner,
};
use crate::cli::display;
use crate::cli::types::ScanMode;
use crate::domain::models::{Task, TaskType};
use crate::domain::ports::NullDnsResolver;

pub async fn handle(mode: ScanMode) -> Result<()> {
    let dialer = Arc::new(Dialer::default());
    let cancel = CancellationToken::new();

    let (runner, task): (Arc<dyn Runner>, Task) = match mode {
        ScanMode::Alive { target } => {
            let runner = Arc::new(AliveRunner::new(dialer, Arc::new(NullDnsResolver)));
            (runner, Task::new(TaskType::Alive, target))
        }
        ScanMode::Port { target, ports } => {
            let runner = Arc::new(PortServiceRunner::new(dialer));
            (runner, Task::new(TaskType::Port, target).with_port_range(ports))
        }
        ScanMode::Os { target } => {
            let runner = Arc::new(OsFingerprintRunner::new(dialer));
            (runner, Task::new(TaskType::Os, target))
        }
        ScanMode::Brute { target, protocol, port, credentials } => {
            let runner = Arc::new(BruteRunner::new(dialer));
            let creds: Vec<_> = credentials
                .iter()
                .filter_map(|pair| pair.split_once(':'))
                .map(|(user, pass)| json!({"username": user, "password": pass}))
                .collect();
            if creds.is_empty() {
                bail!("--credentials must contain at least one user:pass pair");
            }
            let task = Task::new(TaskType::Brute, target)
                .with_param("protocol", json!(protocol))
                .with_param("port", json!(port.to_string()))
                .with_param("credentials", json!(creds));
            (runner, task)
        }
        ScanMode::Web { target } => {
            let runner: Arc<dyn Runner> = Arc::new(WebRunner::new());
            (runner, Task::new(TaskType::Web, target))
        }
    };

    let results = runner.run(&task, cancel).await?;
    for result in &results {
        if let Some(err) = &result.error {
            bail!("scan failed: {err}");
        }
        println!("{}", display::render(&result.data));
    }

    Ok(())
}
