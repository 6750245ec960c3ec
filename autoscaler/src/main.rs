use std::{path::PathBuf, sync::Arc, time::Duration};

use autoscaler::{
    alarm::{AlarmSink, HttpAlarmSink},
    api_client::ApiClient,
    config::{
        Config,
        source::{ConfigSource, ConfigSourceSettings, EnvConfigSource, HttpConfigSource},
    },
    error::RuntimeError,
    shutdown::ShutdownSignal,
    supervisor::Supervisor,
};
use backon::{ExponentialBuilder, Retryable};
use clap::Parser;
use meltdown::Meltdown;
use tracing::{debug, error, info, warn};

#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// Path to the default config file.
    /// Configs in this file can be overridden by environment variables.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Deadline for the one-time initial settings fetch, before
/// `Settings::request_timeout` (half the sample interval) is known.
const STARTUP_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

fn fatal(context: &str, error: impl std::fmt::Display) -> ! {
    eprintln!("{context}: {error}");
    std::process::exit(1);
}

/// Builds the configured `ConfigSource` against `http`. Called twice:
/// once with a startup-only client to fetch the settings document,
/// again with the operational, deadline-bound client so the ongoing
/// per-reconciliation app-list fetch also honors spec.md §5's bounded
/// deadline.
fn build_config_source(
    settings: &ConfigSourceSettings,
    http: reqwest::Client,
) -> Arc<dyn ConfigSource> {
    match (&settings.settings_url, &settings.legacy_env_var) {
        (Some(url), _) => {
            let url = url::Url::parse(url).unwrap_or_else(|error| {
                fatal("invalid config-source.settings-url", error)
            });
            Arc::new(HttpConfigSource::new(http, url))
        }
        (None, Some(var)) => Arc::new(EnvConfigSource::new(var.clone())),
        (None, None) => fatal(
            "startup",
            "config-source.settings-url or config-source.legacy-env-var must be set",
        ),
    }
}

#[tokio::main]
async fn main() -> Result<(), RuntimeError> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut config = match Config::try_read(args.config) {
        Ok(config) => config,
        Err(error) => fatal("failed to read config", error),
    };

    if args.verbose {
        config.telemetry.level = "info,autoscaler=trace".to_string();
    }

    if let Err(error) = telemetry::init_telemetry(&config.telemetry) {
        fatal("failed to initialize telemetry", error);
    }

    debug!(?config, "starting with configuration");

    let bootstrap_http = reqwest::Client::builder()
        .timeout(STARTUP_HTTP_TIMEOUT)
        .build()
        .expect("default reqwest client always builds");

    let bootstrap_config_source =
        build_config_source(&config.config_source, bootstrap_http);

    let settings = match (|| bootstrap_config_source.fetch_settings())
        .retry(ExponentialBuilder::default().with_max_times(3).with_jitter())
        .notify(|error, dur| {
            warn!(%error, retry_in = ?dur, "settings document fetch failed, retrying");
        })
        .await
    {
        Ok(settings) => Arc::new(settings),
        Err(error) => fatal("failed to fetch initial settings document", error),
    };

    // Every outbound call from here on (orchestrator reads/writes, probe
    // samples, alarm POSTs, and the ongoing app-list poll) shares this
    // client, bounding every one of them to spec.md §5's deadline.
    let http = reqwest::Client::builder()
        .timeout(settings.request_timeout)
        .build()
        .expect("default reqwest client always builds");

    let config_source =
        build_config_source(&config.config_source, http.clone());

    let api = Arc::new(ApiClient::new(
        http.clone(),
        settings.request_timeout,
        config.dcos_bearer_token.take(),
    ));
    let alarm_sink: Arc<dyn AlarmSink> = Arc::new(HttpAlarmSink::new(
        http.clone(),
        settings.alarm_host.clone(),
        settings.alarm_url.clone(),
        settings.alarm_params.clone(),
    ));

    let supervisor = match Supervisor::bootstrap(
        config_source,
        settings,
        http,
        api,
        alarm_sink,
    )
    .await
    {
        Ok(supervisor) => supervisor,
        Err(error) => fatal("failed to bootstrap supervisor", error),
    };

    let mut shutting_down = false;
    let mut meltdown =
        Meltdown::new().register(ShutdownSignal).register(supervisor);

    info!("autoscaler control plane starting");

    while let Some((service, result)) = meltdown.next().await {
        match result {
            Ok(()) => info!(%service, "service stopped"),
            Err(error) => error!(%service, %error, "service crashed"),
        }

        if !shutting_down {
            info!("propagating shutdown signal...");
            meltdown.trigger();
            shutting_down = true;
        }
    }

    info!("shut down");
    Ok(())
}
