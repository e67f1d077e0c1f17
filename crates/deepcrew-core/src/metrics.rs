use once_cell::sync::OnceCell;
use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::{KeyValue, global};
use tracing::info;

struct PipelineMetrics {
    runs: Counter<u64>,
    stage_duration_ms: Histogram<f64>,
    search_failures: Counter<u64>,
    tool_calls: Counter<u64>,
}

static METRICS: OnceCell<PipelineMetrics> = OnceCell::new();

fn handles() -> &'static PipelineMetrics {
    METRICS.get_or_init(|| {
        let meter: Meter = global::meter("deepcrew.pipeline");
        PipelineMetrics {
            runs: meter
                .u64_counter("pipeline_runs_total")
                .with_description("Total research pipeline runs by status")
                .init(),
            stage_duration_ms: meter
                .f64_histogram("stage_duration_ms")
                .with_description("Task stage runtime in milliseconds")
                .init(),
            search_failures: meter
                .u64_counter("search_failures_total")
                .with_description("Search calls that degraded into an error observation")
                .init(),
            tool_calls: meter
                .u64_counter("tool_calls_total")
                .with_description("Tool invocations requested by agents")
                .init(),
        }
    })
}

/// Hint to operators that OTEL metrics export can be configured externally.
pub fn init_metrics_from_env(service_name: &str) {
    if std::env::var("DEEPCREW_OTEL_METRICS_ENDPOINT").is_ok() {
        info!(
            target = "telemetry",
            "DEEPCREW_OTEL_METRICS_ENDPOINT detected for {service_name}. Configure an OTLP meter provider in your deployment to export pipeline metrics."
        );
    }
}

/// Record the terminal status of one pipeline run (no-op if no provider installed).
pub fn record_run(status: &str) {
    handles()
        .runs
        .add(1, &[KeyValue::new("status", status.to_string())]);
}

pub fn record_stage(stage: &str, duration_ms: u64, succeeded: bool) {
    let attrs = [
        KeyValue::new("stage", stage.to_string()),
        KeyValue::new("succeeded", succeeded),
    ];
    handles().stage_duration_ms.record(duration_ms as f64, &attrs);
}

pub fn record_tool_call(tool: &str, failed: bool) {
    let attrs = [
        KeyValue::new("tool", tool.to_string()),
        KeyValue::new("failed", failed),
    ];
    handles().tool_calls.add(1, &attrs);
}

pub fn record_search_failure() {
    handles().search_failures.add(1, &[]);
}
