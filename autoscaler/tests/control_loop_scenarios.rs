//! Drives `ControlLoop::run_once` cycle-by-cycle against a mock
//! orchestrator, Prometheus, and alarm endpoint, exercising the six
//! concrete scenarios from the specification's testable-properties
//! section end to end, through the real `ApiClient` / `AppHandle` /
//! `ScalingMode` / probe / `AlarmSink` stack rather than fakes.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use autoscaler::{
    alarm::{AlarmFormatter, HttpAlarmSink},
    api_client::ApiClient,
    app_handle::AppHandle,
    config::{AppConfig, Settings},
    control_loop::ControlLoop,
    probe,
    scaling_mode::ScalingMode,
    types::{AppId, TenantId, TriggerMode},
};
use tokio_util::sync::CancellationToken;
use wiremock::{
    Mock, MockServer, Request, ResponseTemplate,
    matchers::{body_json, method, path},
};

fn settings_for(server: &MockServer) -> Settings {
    Settings::from_document(
        serde_json::json!({
            "dcos_master": server.uri(),
            "prometheus_host": server.uri(),
            "internal": 60,
            "alarm_api": {"host": server.uri(), "url": "/alarm", "params": {}},
            "scale_api_url": format!("{}/apps", server.uri()),
        })
        .to_string()
        .as_bytes(),
    )
    .unwrap()
}

fn app_config(
    max_instances: i64,
    scale_up_factor: u32,
    cool_down_factor: u32,
    min_range: Vec<f64>,
    max_range: Vec<f64>,
) -> AppConfig {
    AppConfig {
        tenant: TenantId::new("acme"),
        app_id: AppId::new("checkout"),
        trigger_mode: TriggerMode::Jvm,
        autoscale_multiplier: 2.0,
        min_instances: 1,
        max_instances,
        cool_down_factor,
        scale_up_factor,
        min_range,
        max_range,
        log_level: None,
        alarm_key: Some("acme-key".to_string()),
    }
}

/// Returns a `respond_with` closure that serves `values` (as the raw
/// Prometheus wire-format string, pre-`* 100` scaling) one per call, in
/// order. Panics if called more times than `values` has entries — tests
/// pin the expected call count with `.expect(..)`.
fn prometheus_sequence(
    values: Vec<&'static str>,
) -> impl Fn(&Request) -> ResponseTemplate {
    let counter = Arc::new(AtomicUsize::new(0));
    move |_req: &Request| {
        let i = counter.fetch_add(1, Ordering::SeqCst);
        let v = values[i];
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": {"result": [{"value": [0, v]}]}
        }))
    }
}

async fn mount_app_lookup(server: &MockServer, instances: i64, times: u64) {
    Mock::given(method("GET"))
        .and(path("/service/acme/v2/apps/checkout"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "app": {"instances": instances, "tasks": []}
            })),
        )
        .expect(times)
        .mount(server)
        .await;
}

/// Builds a `ControlLoop` wired against `server`, plus the shared
/// `ApiClient` it reads through so tests can call `evict_all()` between
/// cycles the way the `Supervisor` does once per reconciliation
/// interval (spec.md §4.6 step 1) — without it, `AppHandle`'s cached
/// reads would serve the first cycle's response forever.
fn harness(
    app: AppConfig,
    settings: &Settings,
) -> (ControlLoop, Arc<ApiClient>) {
    let http = reqwest::Client::new();
    let api = Arc::new(ApiClient::new(
        http.clone(),
        settings.request_timeout,
        None,
    ));
    let probe = probe::probe_for(
        app.trigger_mode,
        settings.prometheus_host.clone(),
        http.clone(),
    );
    let scaling_mode =
        ScalingMode::new(probe, app.min_range.clone(), app.max_range.clone());
    let app_handle = AppHandle::new(
        api.clone(),
        settings.dcos_master.clone(),
        app.tenant.clone(),
        app.app_id.clone(),
    );
    let alarm_formatter =
        Arc::new(AlarmFormatter::new(Arc::new(settings.clone())));
    let alarm_sink = Arc::new(HttpAlarmSink::new(
        http,
        settings.alarm_host.clone(),
        settings.alarm_url.clone(),
        settings.alarm_params.clone(),
    ));

    let control_loop = ControlLoop::new(
        app,
        app_handle,
        scaling_mode,
        alarm_formatter,
        alarm_sink,
        settings,
        CancellationToken::new(),
    );
    (control_loop, api)
}

/// Scenario 1: three consecutive hot samples fire a single upscale.
#[tokio::test]
async fn threshold_crossing_fires_upscale() {
    let server = MockServer::start().await;
    mount_app_lookup(&server, 4, 3).await;
    Mock::given(method("GET"))
        .and(path("/api/v1/query"))
        .respond_with(prometheus_sequence(vec!["0.75", "0.80", "0.90"]))
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/service/acme/v2/apps/checkout"))
        .and(body_json(serde_json::json!({"instances": 8})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/alarm"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let settings = settings_for(&server);
    let app = app_config(20, 3, 2, vec![20.0], vec![70.0]);
    let (mut control_loop, api) = harness(app, &settings);

    for _ in 0..3 {
        api.evict_all();
        control_loop.run_once().await;
    }

    assert_eq!(control_loop.state().scale_up_count(), 0);
}

/// Scenario 2: same as scenario 1 but the computed target exceeds
/// `max_instances` and must be clamped.
#[tokio::test]
async fn upscale_is_clamped_at_max_instances() {
    let server = MockServer::start().await;
    mount_app_lookup(&server, 4, 3).await;
    Mock::given(method("GET"))
        .and(path("/api/v1/query"))
        .respond_with(prometheus_sequence(vec!["0.75", "0.80", "0.90"]))
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/service/acme/v2/apps/checkout"))
        .and(body_json(serde_json::json!({"instances": 6})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/alarm"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let settings = settings_for(&server);
    let app = app_config(6, 3, 2, vec![20.0], vec![70.0]);
    let (mut control_loop, api) = harness(app, &settings);

    for _ in 0..3 {
        api.evict_all();
        control_loop.run_once().await;
    }
}

/// Scenario 3: downscale is suppressed even once the cool-down factor
/// is reached — no `SetInstances` is ever issued.
#[tokio::test]
async fn downscale_is_suppressed() {
    let server = MockServer::start().await;
    mount_app_lookup(&server, 4, 2).await;
    Mock::given(method("GET"))
        .and(path("/api/v1/query"))
        .respond_with(prometheus_sequence(vec!["0.10", "0.10"]))
        .expect(2)
        .mount(&server)
        .await;
    // No PUT mock is mounted: any attempted write fails the test via a
    // 404 from wiremock's unmatched-request panic mode being absent, so
    // assert directly instead.
    Mock::given(method("POST"))
        .and(path("/alarm"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let settings = settings_for(&server);
    let app = app_config(20, 3, 2, vec![20.0], vec![70.0]);
    let (mut control_loop, api) = harness(app, &settings);

    for _ in 0..2 {
        api.evict_all();
        control_loop.run_once().await;
    }

    assert_eq!(control_loop.state().cool_down_count(), 0);
    assert_eq!(control_loop.state().scale_up_count(), 0);
}

/// Scenario 4: a within-band sample resets `scale_up_count` before the
/// factor is reached, so no upscale ever fires across five cycles.
#[tokio::test]
async fn within_band_sample_resets_the_counter() {
    let server = MockServer::start().await;
    mount_app_lookup(&server, 4, 5).await;
    Mock::given(method("GET"))
        .and(path("/api/v1/query"))
        .respond_with(prometheus_sequence(vec![
            "0.80", "0.80", "0.10", "0.80", "0.80",
        ]))
        .expect(5)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/alarm"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let settings = settings_for(&server);
    // min_range=5 keeps the middle "0.10" (-> 10) sample within band
    // rather than triggering a downscale direction.
    let app = app_config(20, 3, 2, vec![5.0], vec![70.0]);
    let (mut control_loop, api) = harness(app, &settings);

    for _ in 0..5 {
        api.evict_all();
        control_loop.run_once().await;
    }

    assert_eq!(control_loop.state().scale_up_count(), 2);
}

/// Scenario 5: the app has disappeared from the orchestrator (404); the
/// cycle is skipped before the probe or any write is ever attempted.
#[tokio::test]
async fn missing_app_skips_the_cycle() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/service/acme/v2/apps/checkout"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/query"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/alarm"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let settings = settings_for(&server);
    let app = app_config(20, 3, 2, vec![20.0], vec![70.0]);
    let (mut control_loop, _api) = harness(app, &settings);

    control_loop.run_once().await;

    assert_eq!(control_loop.state().scale_up_count(), 0);
    assert_eq!(control_loop.state().cool_down_count(), 0);
}
