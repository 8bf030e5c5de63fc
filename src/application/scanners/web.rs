//! Web runner: HTTP(S) fetch, a short idle wait for late content, title/
//! meta/script/cookie extraction, a favicon grab, and technology
//! fingerprinting via the shared rule matcher — the third consumer of
//! `services::matcher` alongside dispatcher tag matching and the
//! auto-tag engine. A true headless-browser runner (rendered screenshot,
//! JS-executed DOM) is out of scope for this pass — `screenshot_base64`
//! stays `None` until one is wired in.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use chrono::Utc;
use serde_json::json;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::application::limiter::AdaptiveLimiter;
use crate::application::rtt::RttEstimator;
use crate::application::runner::{Runner, RunnerError};
use crate::domain::models::{ResultData, ResultStatus, Task, TaskResult, TaskType, WebResult};
use crate::services::matcher::{Leaf, Operator, Rule};

/// How long to let a page "settle" after the initial response before
/// extracting content, standing in for a real network-idle wait in the
/// absence of a JS-executing renderer.
const DEFAULT_IDLE_WAIT: Duration = Duration::from_millis(300);
const FAVICON_READ_CAP: usize = 256 * 1024;

pub struct WebRunner {
    client: reqwest::Client,
    limiter: AdaptiveLimiter,
    rtt: Mutex<RttEstimator>,
}

impl WebRunner {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true) // scanning targets routinely present self-signed certs
            .build()
            .expect("reqwest client config is static and always valid");
        Self { client, limiter: AdaptiveLimiter::new(5, 1, 10), rtt: Mutex::new(RttEstimator::new()) }
    }

    async fn fetch_favicon(&self, base_url: &str, cancel: &CancellationToken) -> Option<String> {
        let favicon_url = format!("{}/favicon.ico", base_url.trim_end_matches('/'));
        let permit = self.limiter.acquire(cancel).await?;
        let result = self.client.get(&favicon_url).timeout(Duration::from_secs(5)).send().await;
        let body = match result {
            Ok(resp) if resp.status().is_success() => resp.bytes().await.ok(),
            _ => None,
        };
        self.limiter.release(permit).await;
        let bytes = body?;
        if bytes.is_empty() || bytes.len() > FAVICON_READ_CAP {
            return None;
        }
        Some(base64::engine::general_purpose::STANDARD.encode(&bytes))
    }
}

impl Default for WebRunner {
    fn default() -> Self {
        Self::new()
    }
}

fn extract_title(body: &str) -> Option<String> {
    let lower = body.to_lowercase();
    let start = lower.find("<title>")? + "<title>".len();
    let end = lower[start..].find("</title>")? + start;
    Some(body[start..end].trim().to_string())
}

/// `<meta name="..." content="...">` pairs, order-insensitive on the two attributes.
fn extract_meta(body: &str) -> Vec<(String, String)> {
    let re = regex::Regex::new(r#"(?is)<meta\s+[^>]*?name=["']([^"']+)["'][^>]*?content=["']([^"']*)["'][^>]*?>"#)
        .expect("static pattern");
    let re_rev = regex::Regex::new(r#"(?is)<meta\s+[^>]*?content=["']([^"']*)["'][^>]*?name=["']([^"']+)["'][^>]*?>"#)
        .expect("static pattern");
    let mut out: Vec<(String, String)> = re.captures_iter(body).map(|c| (c[1].to_lowercase(), c[2].to_string())).collect();
    out.extend(re_rev.captures_iter(body).map(|c| (c[2].to_lowercase(), c[1].to_string())));
    out
}

fn extract_scripts(body: &str) -> Vec<String> {
    let re = regex::Regex::new(r#"(?is)<script\s+[^>]*?src=["']([^"']+)["'][^>]*?>"#).expect("static pattern");
    re.captures_iter(body).map(|c| c[1].to_string()).collect()
}

fn extract_cookie_names(headers: &reqwest::header::HeaderMap) -> Vec<String> {
    headers
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .filter_map(|kv| kv.split('=').next())
        .map(|name| name.trim().to_string())
        .collect()
}

fn fingerprint_headers(headers: &reqwest::header::HeaderMap) -> Vec<String> {
    let mut out = Vec::new();
    if let Some(server) = headers.get("server").and_then(|v| v.to_str().ok()) {
        out.push(format!("server:{server}"));
    }
    if let Some(powered) = headers.get("x-powered-by").and_then(|v| v.to_str().ok()) {
        out.push(format!("x-powered-by:{powered}"));
    }
    out
}

fn leaf(field: &str, operator: Operator, value: serde_json::Value) -> Rule {
    Rule::Leaf(Leaf { field: field.to_string(), operator, value, ignore_case: true })
}

fn contains(field: &str, needle: &str) -> Rule {
    leaf(field, Operator::Contains, json!(needle))
}

/// Built-in technology fingerprints, evaluated against a per-page
/// attribute document (`headers.*`, `meta.*`, `scripts_joined`,
/// `cookies_joined`, `title`) the same way auto-tag rules run against an
/// asset's attribute map — just compiled in rather than stored.
fn fingerprint_rules() -> Vec<(&'static str, Rule)> {
    vec![
        ("wordpress", Rule::Or { or: vec![contains("meta.generator", "wordpress"), contains("scripts_joined", "wp-content"), contains("cookies_joined", "wordpress_")] }),
        ("drupal", Rule::Or { or: vec![contains("headers.x-generator", "drupal"), contains("meta.generator", "drupal")] }),
        ("nginx", contains("headers.server", "nginx")),
        ("apache", contains("headers.server", "apache")),
        ("iis", contains("headers.server", "microsoft-iis")),
        ("php", Rule::Or { or: vec![contains("headers.x-powered-by", "php"), contains("cookies_joined", "phpsessid")] }),
        ("react", contains("scripts_joined", "react")),
        ("jquery", contains("scripts_joined", "jquery")),
    ]
}

fn run_fingerprint_engine(
    title: Option<&str>,
    headers: &reqwest::header::HeaderMap,
    meta: &[(String, String)],
    scripts: &[String],
    cookies: &[String],
) -> Vec<String> {
    let headers_doc: serde_json::Map<String, serde_json::Value> = headers
        .iter()
        .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_lowercase(), json!(v))))
        .collect();
    let meta_doc: serde_json::Map<String, serde_json::Value> = meta.iter().map(|(k, v)| (k.clone(), json!(v))).collect();
    let doc = json!({
        "title": title.unwrap_or_default(),
        "headers": headers_doc,
        "meta": meta_doc,
        "scripts_joined": scripts.join(" "),
        "cookies_joined": cookies.join(" "),
    });

    fingerprint_rules()
        .into_iter()
        .filter_map(|(name, rule)| match rule.evaluate(&doc) {
            Ok(true) => Some(name.to_string()),
            _ => None,
        })
        .collect()
}

#[async_trait]
impl Runner for WebRunner {
    fn name(&self) -> TaskType {
        TaskType::Web
    }

    async fn run(&self, task: &Task, cancel: CancellationToken) -> Result<Vec<TaskResult>, RunnerError> {
        if cancel.is_cancelled() {
            return Err(RunnerError::Cancelled);
        }
        let url = &task.target;
        let now = Utc::now();
        let idle_wait = task
            .param_str("idle_wait_ms")
            .and_then(|v| v.parse().ok())
            .map_or(DEFAULT_IDLE_WAIT, Duration::from_millis);

        let Some(permit) = self.limiter.acquire(&cancel).await else {
            return Err(RunnerError::Cancelled);
        };

        let read_timeout = self.rtt.lock().await.timeout().max(Duration::from_secs(3));
        let started = Instant::now();
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => { self.limiter.release(permit).await; return Err(RunnerError::Cancelled); }
            resp = self.client.get(url).timeout(read_timeout).send() => resp,
        };

        let result = match response {
            Ok(resp) => {
                self.rtt.lock().await.update(started.elapsed());
                self.limiter.on_success().await;

                let status_code = Some(resp.status().as_u16());
                let headers = resp.headers().clone();
                let mut fingerprints = fingerprint_headers(&headers);

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {}
                    () = tokio::time::sleep(idle_wait) => {}
                }

                let body = resp.text().await.unwrap_or_default();
                let title = extract_title(&body);
                let meta = extract_meta(&body);
                let scripts = extract_scripts(&body);
                let cookies = extract_cookie_names(&headers);
                fingerprints.extend(run_fingerprint_engine(title.as_deref(), &headers, &meta, &scripts, &cookies));

                let favicon_base64 = self.fetch_favicon(url, &cancel).await;
                self.limiter.release(permit).await;

                WebResult { url: url.clone(), status_code, title, fingerprints, screenshot_base64: None, favicon_base64 }
            }
            Err(e) => {
                self.limiter.on_failure().await;
                self.limiter.release(permit).await;
                return Ok(vec![TaskResult {
                    task_id: task.id,
                    status: ResultStatus::Failed,
                    data: vec![],
                    error: Some(e.to_string()),
                    executed_at: now,
                    completed_at: Utc::now(),
                }]);
            }
        };

        Ok(vec![TaskResult {
            task_id: task.id,
            status: ResultStatus::Completed,
            data: vec![ResultData::Web(result)],
            error: None,
            executed_at: now,
            completed_at: Utc::now(),
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn extracts_title_case_insensitively() {
        let body = "<html><head><TITLE>Example</TITLE></head></html>";
        assert_eq!(extract_title(body), Some("Example".to_string()));
    }

    #[test]
    fn missing_title_returns_none() {
        assert_eq!(extract_title("<html></html>"), None);
    }

    #[test]
    fn extracts_meta_generator_either_attribute_order() {
        let body = r#"<meta name="generator" content="WordPress 6.4">"#;
        let meta = extract_meta(body);
        assert_eq!(meta[0], ("generator".to_string(), "WordPress 6.4".to_string()));

        let reversed = r#"<meta content="WordPress 6.4" name="generator">"#;
        let meta2 = extract_meta(reversed);
        assert!(meta2.iter().any(|(k, v)| k == "generator" && v == "WordPress 6.4"));
    }

    #[test]
    fn extracts_script_srcs() {
        let body = r#"<script src="/wp-content/themes/x/app.js"></script>"#;
        assert_eq!(extract_scripts(body), vec!["/wp-content/themes/x/app.js".to_string()]);
    }

    #[test]
    fn fingerprint_engine_flags_wordpress_from_meta_generator() {
        let headers = reqwest::header::HeaderMap::new();
        let meta = vec![("generator".to_string(), "WordPress 6.4".to_string())];
        let hits = run_fingerprint_engine(None, &headers, &meta, &[], &[]);
        assert!(hits.contains(&"wordpress".to_string()));
    }

    #[test]
    fn fingerprint_engine_flags_nginx_from_server_header() {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("server", "nginx/1.25.3".parse().unwrap());
        let hits = run_fingerprint_engine(None, &headers, &[], &[], &[]);
        assert!(hits.contains(&"nginx".to_string()));
    }

    #[tokio::test]
    async fn fetches_title_and_fingerprints_from_mock_server() {
        let server = MockServer::start().await;
        let body = r#"<html><head><title>Welcome</title>
            <meta name="generator" content="WordPress 6.4"></head>
            <body><script src="/wp-content/themes/x/app.js"></script></body></html>"#;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body).insert_header("server", "nginx/1.25.3"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/favicon.ico"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let runner = WebRunner::new();
        let task = Task::new(TaskType::Web, server.uri());
        let results = runner.run(&task, CancellationToken::new()).await.unwrap();
        let ResultData::Web(web) = &results[0].data[0] else { panic!("wrong variant") };
        assert_eq!(web.title.as_deref(), Some("Welcome"));
        assert!(web.fingerprints.contains(&"wordpress".to_string()));
        assert!(web.fingerprints.iter().any(|f| f == "server:nginx/1.25.3"));
        assert!(web.favicon_base64.is_none());
    }
}
