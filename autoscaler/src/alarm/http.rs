use std::collections::HashMap;

use async_trait::async_trait;
use url::Url;

use super::{AlarmPayload, AlarmSink};
use crate::error::RuntimeError;

/// POSTs alarm payloads to a configured host+path. The query string
/// carries the fixed `request_params` record from `Settings`
/// (e.g. `key=<alarm_key>`); the body carries the JSON payload.
pub struct HttpAlarmSink {
    http: reqwest::Client,
    host: Url,
    path: String,
    params: HashMap<String, String>,
}

impl HttpAlarmSink {
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        host: Url,
        path: String,
        params: HashMap<String, String>,
    ) -> Self {
        Self {
            http,
            host,
            path,
            params,
        }
    }

    fn target_url(&self) -> Url {
        let mut url = self.host.clone();
        url.set_path(&self.path);
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.params {
                pairs.append_pair(key, value);
            }
        }
        url
    }
}

#[async_trait]
impl AlarmSink for HttpAlarmSink {
    async fn send(&self, payload: &AlarmPayload) -> Result<(), RuntimeError> {
        let url = self.target_url();
        let response =
            self.http.post(url.clone()).json(payload).send().await.map_err(
                |e| RuntimeError::Transport(url.to_string(), e.to_string()),
            )?;
        let status = response.status();
        if !status.is_success() {
            return Err(RuntimeError::Http {
                status: status.as_u16(),
                path: url.to_string(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }
}
