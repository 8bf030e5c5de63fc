//! Orchestrator (§4.8): resolves a Project's target scope and expands its
//! Workflow's stage DAG into one `AgentTask` per (target × stage).

use std::collections::HashSet;

use uuid::Uuid;

use crate::domain::error::EtlError;
use crate::domain::models::{AgentTask, FileFormat, ScanStage, StageDag, TargetSource};
use crate::services::target::expand_target;

/// Resolves a `TargetSource` into a flat list of target strings. `manual`
/// and CIDR/range expressions go through `expand_target`; `file` sources
/// are parsed by the caller and handed in as pre-read `contents` since
/// file I/O is explicitly out of this module's scope.
pub fn resolve_targets(source: &TargetSource, file_contents: Option<&str>) -> Result<Vec<String>, EtlError> {
    match source {
        TargetSource::Manual { targets } => {
            let mut out = Vec::new();
            for t in targets {
                match expand_target(t) {
                    Ok(ips) => out.extend(ips.into_iter().map(|ip| ip.to_string())),
                    Err(_) => out.push(t.clone()), // URL / hostname form, passed through
                }
            }
            Ok(out)
        }
        TargetSource::ProjectTarget { seed } => Ok(vec![seed.clone()]),
        TargetSource::File { format, .. } => {
            let contents = file_contents
                .ok_or_else(|| EtlError::ConstraintViolation("file target source requires pre-read contents".into()))?;
            parse_file_targets(contents, *format)
        }
    }
}

fn parse_file_targets(contents: &str, format: FileFormat) -> Result<Vec<String>, EtlError> {
    match format {
        FileFormat::Line => Ok(contents.lines().map(str::trim).filter(|l| !l.is_empty()).map(String::from).collect()),
        FileFormat::Csv => Ok(contents
            .lines()
            .flat_map(|line| line.split(','))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()),
        FileFormat::JsonArray => serde_json::from_str::<Vec<String>>(contents)
            .map_err(|e| EtlError::UnparseableAttributes("target_file".into(), e.to_string())),
    }
}

/// Expands a validated stage DAG against a resolved target list into one
/// `AgentTask` per (target, stage), with `required_tags` copied from the
/// stage's policy (§4.8). Stage order in the returned vec follows the
/// DAG's topological order so callers that dispatch sequentially respect
/// predecessor ordering naturally.
pub fn expand_to_tasks(
    project_id: Uuid,
    workflow_id: Uuid,
    dag: &StageDag,
    targets: &[String],
    default_timeout: std::time::Duration,
) -> Vec<AgentTask> {
    let mut tasks = Vec::new();
    for stage_id in dag.topological_order() {
        let Some(stage) = dag.stage(stage_id) else { continue };
        for target in targets {
            tasks.push(build_task(project_id, workflow_id, stage, target, default_timeout));
        }
    }
    tasks
}

fn build_task(
    project_id: Uuid,
    workflow_id: Uuid,
    stage: &ScanStage,
    target: &str,
    timeout: std::time::Duration,
) -> AgentTask {
    let mut task = AgentTask::new(
        project_id,
        workflow_id,
        stage.id,
        stage.tool_name.clone(),
        stage.tool_params.clone(),
        target,
        stage.required_tags.clone(),
        timeout,
    );
    task.required_tags = stage.required_tags.iter().cloned().collect::<HashSet<_>>();
    task
}
