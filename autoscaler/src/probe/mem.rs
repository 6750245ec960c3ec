use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use super::MetricProbe;
use crate::error::RuntimeError;

#[derive(Debug, Deserialize)]
struct PromResponse {
    data: PromData,
}

#[derive(Debug, Deserialize)]
struct PromData {
    result: Vec<PromResult>,
}

#[derive(Debug, Deserialize)]
struct PromResult {
    value: (f64, String),
}

/// Samples memory utilization as a percentage via Prometheus.
///
/// The original source aggregates this from per-slave agent statistics
/// fetched directly from the orchestrator rather than through
/// Prometheus; that slave-listing logic is out of scope here (see
/// `DESIGN.md`), so this probe queries the same `agent_stats` exporter
/// family the JVM probe uses, in the analogous ratio shape.
pub struct MemUtilizationProbe {
    prometheus_host: Url,
    http: reqwest::Client,
}

impl MemUtilizationProbe {
    #[must_use]
    pub fn new(prometheus_host: Url, http: reqwest::Client) -> Self {
        Self {
            prometheus_host,
            http,
        }
    }

    fn query_url(&self, app_name: &str) -> Url {
        let query = format!(
            "sum(agent_stats_mem{{application=\"{app_name}\",name=\"mem_used\"}}) / sum(agent_stats_mem{{application=\"{app_name}\",name=\"mem_total\"}})"
        );
        let mut url = self.prometheus_host.clone();
        url.set_path("/api/v1/query");
        url.query_pairs_mut().append_pair("query", &query);
        url
    }
}

#[async_trait]
impl MetricProbe for MemUtilizationProbe {
    async fn sample(&self, app_name: &str) -> Result<Vec<f64>, RuntimeError> {
        let url = self.query_url(app_name);
        let response = self.http.get(url.clone()).send().await.map_err(|e| {
            RuntimeError::Transport(url.to_string(), e.to_string())
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(RuntimeError::Http {
                status: status.as_u16(),
                path: url.to_string(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        let body: PromResponse = response.json().await.map_err(|e| {
            RuntimeError::Metric(format!(
                "malformed prometheus response: {e}"
            ))
        })?;
        let sample = body.data.result.first().ok_or_else(|| {
            RuntimeError::Metric("prometheus returned no datapoint".to_string())
        })?;
        let ratio: f64 = sample.value.1.parse().map_err(|_| {
            RuntimeError::Metric(format!(
                "non-numeric prometheus value: {}",
                sample.value.1
            ))
        })?;
        Ok(vec![ratio * 100.0])
    }
}
