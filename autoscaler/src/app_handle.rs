//! Thin accessor resolving an application's orchestrator-side metadata.
//!
//! Owned exclusively by one `ControlLoop`; all reads go through the
//! shared `ApiClient::cached_get` so every read within one cycle
//! shares a single upstream fetch (satisfies P7 alongside the
//! supervisor's per-interval `EvictAll`).

use std::sync::Arc;

use reqwest::Method;
use serde::Deserialize;
use url::Url;

use crate::{
    api_client::ApiClient,
    error::RuntimeError,
    types::{AppId, TenantId},
};

#[derive(Debug, Deserialize)]
struct AppLookupResponse {
    app: AppDocument,
}

#[derive(Debug, Deserialize)]
struct AppDocument {
    #[serde(default)]
    instances: Option<i64>,
    #[serde(default)]
    env: Option<AppEnv>,
}

#[derive(Debug, Deserialize)]
struct AppEnv {
    #[serde(rename = "APP_NAME")]
    app_name: Option<String>,
}

pub struct AppHandle {
    api: Arc<ApiClient>,
    dcos_master: Url,
    tenant: TenantId,
    app_id: AppId,
    display_name: Option<String>,
}

impl AppHandle {
    #[must_use]
    pub fn new(
        api: Arc<ApiClient>,
        dcos_master: Url,
        tenant: TenantId,
        app_id: AppId,
    ) -> Self {
        Self {
            api,
            dcos_master,
            tenant,
            app_id,
            display_name: None,
        }
    }

    fn app_url(&self) -> Url {
        let mut url = self.dcos_master.clone();
        url.set_path(&format!(
            "/service/{}/v2/apps{}",
            self.tenant, self.app_id
        ));
        url
    }

    /// The cached display name, falling back to the bare app id (with
    /// its leading slash stripped) until the orchestrator has reported
    /// one via `env.APP_NAME`.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.display_name
            .as_deref()
            .unwrap_or_else(|| self.app_id.as_str().trim_start_matches('/'))
    }

    async fn fetch(&mut self) -> Result<AppDocument, RuntimeError> {
        let body = self.api.cached_get(self.app_url()).await?;
        let response: AppLookupResponse =
            serde_json::from_slice(&body).map_err(|e| {
                RuntimeError::Metric(format!(
                    "malformed app lookup response: {e}"
                ))
            })?;
        if self.display_name.is_none()
            && let Some(env) = &response.app.env
            && let Some(name) = &env.app_name
        {
            self.display_name = Some(name.clone());
        }
        Ok(response.app)
    }

    /// `true` iff the orchestrator reports an application with a
    /// matching id. A 404 is not an error here: it is the signal that
    /// the app does not exist.
    pub async fn exists(&mut self) -> Result<bool, RuntimeError> {
        match self.fetch().await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Currently deployed instance count, or `0` with a warning if the
    /// orchestrator's response omits it.
    pub async fn instances(&mut self) -> Result<i64, RuntimeError> {
        let app = self.fetch().await?;
        match app.instances {
            Some(n) => Ok(n),
            None => {
                tracing::warn!(
                    tenant = %self.tenant,
                    app_id = %self.app_id,
                    "orchestrator response did not include instance count, assuming 0"
                );
                Ok(0)
            }
        }
    }

    /// Writes a new desired instance count. Always a live, uncached
    /// `PUT`.
    pub async fn set_instances(&self, n: i64) -> Result<(), RuntimeError> {
        self.api
            .request(
                Method::PUT,
                self.app_url(),
                Some(serde_json::json!({ "instances": n })),
            )
            .await?;
        Ok(())
    }
}
