//! Process-level reconciler: fetches the desired app set on a fixed
//! interval, diffs it against the live [`FleetState`], and
//! starts/stops/replaces [`ControlLoop`]s to match. Also drives the
//! shared `ApiClient`'s cache eviction once per interval.

use std::sync::Arc;

use backon::{ExponentialBuilder, Retryable};
use futures::future::BoxFuture;
use meltdown::Token;
use rustc_hash::FxHashMap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    alarm::{AlarmFormatter, AlarmSink},
    api_client::ApiClient,
    app_handle::AppHandle,
    config::{AppConfig, ConfigSource, Settings},
    control_loop::ControlLoop,
    error::{InitError, RuntimeError},
    probe,
    scaling_mode::ScalingMode,
    types::AppKey,
};

fn app_key(app: &AppConfig) -> AppKey {
    AppKey {
        tenant: app.tenant.clone(),
        app_id: app.app_id.clone(),
    }
}

/// One entry of the exclusively-Supervisor-owned `FleetState`: the
/// config a running loop was started with (for value-equality change
/// detection) plus the handle needed to stop it.
struct FleetEntry {
    config: AppConfig,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct Supervisor {
    http: reqwest::Client,
    api: Arc<ApiClient>,
    config_source: Arc<dyn ConfigSource>,
    settings: Arc<Settings>,
    alarm_formatter: Arc<AlarmFormatter>,
    alarm_sink: Arc<dyn AlarmSink>,
    fleet: FxHashMap<AppKey, FleetEntry>,
}

impl Supervisor {
    /// Fetches the initial desired app list and starts one
    /// `ControlLoop` per entry. An app whose config fails validation is
    /// fatal: a malformed fleet document at startup is treated the same
    /// as a malformed settings document (`InitError::InvalidAppConfig`).
    ///
    /// The fetch itself is retried a few times with backoff: a
    /// transient blip on the very first call the process makes
    /// shouldn't be fatal the way a genuinely malformed document is.
    /// Reconciliation's periodic re-fetch does not retry (§4.6: on
    /// error, log and leave the fleet alone until the next tick).
    pub async fn bootstrap(
        config_source: Arc<dyn ConfigSource>,
        settings: Arc<Settings>,
        http: reqwest::Client,
        api: Arc<ApiClient>,
        alarm_sink: Arc<dyn AlarmSink>,
    ) -> Result<Self, InitError> {
        let apps = (|| config_source.fetch_apps(&settings.scale_api_url))
            .retry(ExponentialBuilder::default().with_max_times(3).with_jitter())
            .notify(|err, dur| {
                warn!(error = %err, retry_in = ?dur, "initial app list fetch failed, retrying");
            })
            .await
            .map_err(|e| InitError::AppListFetch(e.to_string()))?;

        for app in &apps {
            app.validate().map_err(|e| InitError::InvalidAppConfig {
                app_key: app_key(app).to_string(),
                reason: e.to_string(),
            })?;
        }

        let mut supervisor = Self {
            http,
            api,
            config_source,
            alarm_formatter: Arc::new(AlarmFormatter::new(settings.clone())),
            settings,
            alarm_sink,
            fleet: FxHashMap::default(),
        };

        info!(count = apps.len(), "starting initial fleet");
        for app in apps {
            supervisor.start_loop(app);
        }

        Ok(supervisor)
    }

    fn start_loop(&mut self, config: AppConfig) {
        let key = app_key(&config);
        let cancel = CancellationToken::new();

        let probe = probe::probe_for(
            config.trigger_mode,
            self.settings.prometheus_host.clone(),
            self.http.clone(),
        );
        let scaling_mode = ScalingMode::new(
            probe,
            config.min_range.clone(),
            config.max_range.clone(),
        );
        let app_handle = AppHandle::new(
            self.api.clone(),
            self.settings.dcos_master.clone(),
            config.tenant.clone(),
            config.app_id.clone(),
        );
        let control_loop = ControlLoop::new(
            config.clone(),
            app_handle,
            scaling_mode,
            self.alarm_formatter.clone(),
            self.alarm_sink.clone(),
            &self.settings,
            cancel.clone(),
        );

        info!(%key, "starting control loop");
        let handle = tokio::spawn(control_loop.run());
        self.fleet.insert(
            key,
            FleetEntry {
                config,
                cancel,
                handle,
            },
        );
    }

    /// Signals `Stop()` and waits, bounded by one `interval`, for the
    /// loop's task to actually exit (P10). A loop that doesn't exit in
    /// time is logged and abandoned rather than awaited forever — its
    /// cancellation token is already set, so it will stop on its own
    /// next cycle boundary or sleep-interrupt.
    async fn stop_loop(&mut self, key: &AppKey) {
        let Some(entry) = self.fleet.remove(key) else {
            return;
        };
        entry.cancel.cancel();
        match tokio::time::timeout(self.settings.interval, entry.handle).await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(%key, error = %e, "control loop task panicked");
            }
            Err(_) => {
                warn!(
                    %key,
                    "control loop did not exit within one interval of Stop()"
                );
            }
        }
    }

    async fn reconcile(&mut self) {
        self.api.evict_all();

        let desired = match self
            .config_source
            .fetch_apps(&self.settings.scale_api_url)
            .await
        {
            Ok(apps) => apps,
            Err(e) => {
                error!(error = %e, "failed to fetch desired app list, leaving fleet unchanged");
                return;
            }
        };

        let mut desired_map: FxHashMap<AppKey, AppConfig> = FxHashMap::default();
        for app in desired {
            if let Err(e) = app.validate() {
                error!(
                    app_key = %app_key(&app),
                    error = %e,
                    "skipping app with invalid configuration"
                );
                continue;
            }
            desired_map.insert(app_key(&app), app);
        }

        let removed: Vec<AppKey> = self
            .fleet
            .keys()
            .filter(|key| !desired_map.contains_key(*key))
            .cloned()
            .collect();
        for key in removed {
            info!(%key, "app no longer in desired fleet, stopping control loop");
            self.stop_loop(&key).await;
        }

        let mut to_replace = Vec::new();
        let mut to_add = Vec::new();
        for (key, config) in &desired_map {
            match self.fleet.get(key) {
                Some(entry) if &entry.config == config => {}
                Some(_) => to_replace.push(config.clone()),
                None => to_add.push(config.clone()),
            }
        }

        for config in to_replace {
            let key = app_key(&config);
            info!(%key, "app configuration changed, replacing control loop");
            self.stop_loop(&key).await;
            self.start_loop(config);
        }

        for config in to_add {
            let key = app_key(&config);
            info!(%key, "new app in desired fleet, starting control loop");
            self.start_loop(config);
        }
    }
}

impl meltdown::Service for Supervisor {
    type Future = BoxFuture<'static, Result<(), RuntimeError>>;

    fn run(mut self, mut token: Token) -> Self::Future {
        Box::pin(async move {
            let mut ticker = tokio::time::interval(self.settings.interval);
            // The first tick fires immediately; the initial fleet is
            // already running from `bootstrap`, so nothing to reconcile
            // until the *next* tick.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.reconcile().await;
                    }
                    () = &mut token => {
                        break;
                    }
                }
            }

            info!(count = self.fleet.len(), "supervisor stopping, draining fleet");
            let keys: Vec<AppKey> = self.fleet.keys().cloned().collect();
            for key in keys {
                self.stop_loop(&key).await;
            }
            Ok(())
        })
    }
}
