use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use futures::stream::StreamExt;
use futures::SinkExt;
use serde::{Deserialize, Serialize};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing_subscriber::EnvFilter;
#[cfg(feature = "otel")]
use tracing_subscriber::layer::SubscriberExt;
#[cfg(feature = "otel")]
use tracing_subscriber::util::SubscriberInitExt;

use scenario_harness::prelude::*;
use scenario_harness::runner;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    ScenarioStarted,
    ScenarioCompleted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunEvent {
    pub event_type: EventType,
    pub run_id: String,
    pub scenario_id: u32,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunEvent {
    fn scenario_started(run_id: &str, scenario_id: u32) -> Self {
        Self {
            event_type: EventType::ScenarioStarted,
            run_id: run_id.to_string(),
            scenario_id,
            timestamp: Utc::now(),
            step_name: None,
            success: None,
            error: None,
        }
    }

    fn scenario_completed(run_id: &str, scenario_id: u32, success: bool, error: Option<String>) -> Self {
        Self {
            event_type: EventType::ScenarioCompleted,
            run_id: run_id.to_string(),
            scenario_id,
            timestamp: Utc::now(),
            step_name: None,
            success: Some(success),
            error,
        }
    }
}

#[derive(Parser)]
#[command(name = "scenario-harness")]
#[command(about = "Run browser UI scenarios with retries and evidence capture", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Supervisor URL for event reporting and abort commands (optional)
    #[arg(short, long, global = true)]
    server: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario by id
    Run {
        /// Scenario id (locates scenario-<ID>.yaml in the scenarios dir)
        #[arg(value_name = "ID")]
        scenario_id: u32,

        /// Directory containing scenario YAML files
        #[arg(short, long, default_value = "scenarios")]
        dir: PathBuf,

        /// Directory containing settings JSON files
        #[arg(short, long, default_value = "config")]
        config: PathBuf,

        /// Directory for evidence and results
        #[arg(short, long, default_value = "reports")]
        reports: PathBuf,

        /// Run with a visible browser window
        #[arg(long)]
        headed: bool,
    },

    /// List scenarios in a directory
    List {
        /// Directory containing scenario YAML files
        #[arg(short, long, default_value = "scenarios")]
        dir: PathBuf,
    },

    /// Validate scenario files without running them
    Validate {
        /// Path to a scenario file or directory
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
}

#[cfg(feature = "otel")]
fn init_otel_tracing(verbose: bool) {
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::runtime::Tokio;
    use opentelemetry_sdk::trace::TracerProvider;

    let filter = if verbose {
        "scenario_harness=debug"
    } else {
        "scenario_harness=info"
    };

    let otlp_endpoint =
        std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").unwrap_or_else(|_| "http://localhost:4317".to_string());

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&otlp_endpoint)
        .build()
        .expect("Failed to create OTLP exporter");

    let provider = TracerProvider::builder()
        .with_batch_exporter(exporter, Tokio)
        .build();

    let tracer = provider.tracer("scenario-harness");
    let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);

    tracing_subscriber::registry()
        .with(EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer())
        .with(otel_layer)
        .init();

    opentelemetry::global::set_tracer_provider(provider);
}

#[cfg(not(feature = "otel"))]
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        "scenario_harness=debug"
    } else {
        "scenario_harness=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    #[cfg(feature = "otel")]
    init_otel_tracing(cli.verbose);

    #[cfg(not(feature = "otel"))]
    init_tracing(cli.verbose);

    let result = run(cli).await;

    #[cfg(feature = "otel")]
    opentelemetry::global::shutdown_tracer_provider();

    match result {
        Ok(success) => {
            if success {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "Harness failed");
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    let server_url = cli.server;

    match cli.command {
        Commands::Run {
            scenario_id,
            dir,
            config,
            reports,
            headed,
        } => run_one(scenario_id, dir, config, reports, headed, server_url.as_deref()).await,
        Commands::List { dir } => list_scenarios(dir),
        Commands::Validate { path } => validate(path),
    }
}

/// Posts run events to the supervisor. Delivery is best effort; a missing
/// or unreachable supervisor never fails a run.
struct EventReporter {
    client: reqwest::Client,
    server_url: String,
}

impl EventReporter {
    fn new(server_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            server_url: server_url.to_string(),
        }
    }

    async fn send(&self, event: RunEvent) {
        let url = format!("{}/events", self.server_url);
        match self.client.post(&url).json(&event).send().await {
            Ok(r) if r.status().is_success() => {}
            Ok(r) => {
                tracing::warn!(status = %r.status(), "supervisor rejected event");
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to reach supervisor");
            }
        }
    }
}

/// Subscribe to the supervisor's command channel and raise the abort signal
/// when this run's scenario is stopped. Reconnects with capped backoff.
fn start_command_listener(
    server_url: &str,
    run_id: &str,
    scenario_id: u32,
    abort: AbortSignal,
) -> tokio::task::JoinHandle<()> {
    let ws_url = server_url
        .replace("http://", "ws://")
        .replace("https://", "wss://");
    let ws_url = format!("{}/commands", ws_url);
    let run_id = run_id.to_string();

    tokio::spawn(async move {
        let mut backoff_ms = 1000u64;
        const MAX_BACKOFF_MS: u64 = 30000;

        loop {
            if abort.is_raised() {
                break;
            }

            match connect_async(&ws_url).await {
                Ok((ws_stream, _)) => {
                    backoff_ms = 1000;
                    tracing::debug!("Connected to command channel");

                    let (mut write, mut read) = ws_stream.split();

                    let subscribe = serde_json::json!({
                        "type": "subscribe",
                        "runId": run_id,
                        "scenarioId": scenario_id,
                    });
                    if write
                        .send(Message::Text(subscribe.to_string()))
                        .await
                        .is_err()
                    {
                        tracing::warn!("Failed to subscribe, reconnecting...");
                        tokio::time::sleep(tokio::time::Duration::from_millis(backoff_ms)).await;
                        continue;
                    }

                    while let Some(message) = read.next().await {
                        if abort.is_raised() {
                            return;
                        }
                        match message {
                            Ok(Message::Text(text)) => {
                                let Ok(json) = serde_json::from_str::<serde_json::Value>(&text)
                                else {
                                    continue;
                                };
                                let cmd = json.get("command").and_then(|c| c.as_str());
                                let cmd_run = json.get("runId").and_then(|r| r.as_str());

                                if cmd_run.is_some() && cmd_run != Some(run_id.as_str()) {
                                    tracing::warn!(run = ?cmd_run, "ignoring command for different run");
                                    continue;
                                }

                                if cmd == Some("abort") {
                                    let reason = json
                                        .get("reason")
                                        .and_then(|r| r.as_str())
                                        .unwrap_or("supervisor abort");
                                    tracing::warn!(reason, "abort command received");
                                    abort.raise(reason);
                                    return;
                                }
                            }
                            Ok(Message::Close(_)) | Err(_) => break,
                            Ok(_) => {}
                        }
                    }
                }
                Err(e) => {
                    tracing::debug!(error = %e, "command channel connect failed");
                }
            }

            tokio::time::sleep(tokio::time::Duration::from_millis(backoff_ms)).await;
            backoff_ms = (backoff_ms * 2).min(MAX_BACKOFF_MS);
        }
    })
}

async fn run_one(
    scenario_id: u32,
    dir: PathBuf,
    config: PathBuf,
    reports: PathBuf,
    headed: bool,
    server_url: Option<&str>,
) -> anyhow::Result<bool> {
    let spec = ScenarioLoader::load_by_id(&dir, scenario_id)?;
    let settings = ScenarioSettings::load(&config, scenario_id)?;
    let recording = RecordingSettings::load(&config)?;

    let mut options = SessionOptions::new(spec.id, spec.product.clone());
    options.browser = spec.browser;
    options.headless = spec.headless && !headed;
    options.reports_dir = reports.clone();
    options.record_video = recording.is_enabled(spec.id);
    options.video_dir = reports.join("videos");
    options.user_video_folder = recording.user_folder(spec.id).map(|p| p.to_path_buf());

    let abort = AbortSignal::new();
    let run_id = uuid::Uuid::new_v4().to_string();

    let reporter = server_url.map(EventReporter::new);
    let listener = server_url.map(|url| start_command_listener(url, &run_id, spec.id, abort.clone()));

    if let Some(reporter) = &reporter {
        reporter.send(RunEvent::scenario_started(&run_id, spec.id)).await;
    }

    let bridge = Arc::new(PlaywrightBridge::start().await?);
    let store = ResultsStore::new(reports.join("results"));

    let outcome = runner::run_scenario(bridge, &spec, &settings, options, abort.clone(), &store).await;

    if let Some(listener) = listener {
        listener.abort();
    }

    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(e) => {
            if let Some(reporter) = &reporter {
                reporter
                    .send(RunEvent::scenario_completed(
                        &run_id,
                        spec.id,
                        false,
                        Some(e.to_string()),
                    ))
                    .await;
            }
            return Err(e.into());
        }
    };

    println!("{}", render_summary(&spec.product, &spec.name, &outcome.result));

    if let Some(reporter) = &reporter {
        let error = outcome.error.as_ref().map(|e| e.to_string());
        reporter
            .send(RunEvent::scenario_completed(
                &run_id,
                spec.id,
                outcome.passed(),
                error,
            ))
            .await;
    }

    Ok(outcome.passed())
}

fn list_scenarios(dir: PathBuf) -> anyhow::Result<bool> {
    let scenarios = ScenarioLoader::load_directory(&dir)?;

    if scenarios.is_empty() {
        println!("No scenarios found in {}", dir.display());
        return Ok(true);
    }

    println!("Scenarios in {}:", dir.display());
    for spec in scenarios {
        println!(
            "  {:>3}  {} ({}, {} steps)",
            spec.id,
            spec.name,
            spec.product,
            spec.steps.len()
        );
    }
    Ok(true)
}

fn validate(path: PathBuf) -> anyhow::Result<bool> {
    let specs = if path.is_dir() {
        ScenarioLoader::load_directory(&path)?
    } else {
        vec![ScenarioLoader::load_file(&path)?]
    };

    let mut ok = true;
    for spec in &specs {
        match runner::validate(spec) {
            Ok(()) => println!("✓ scenario {} ({})", spec.id, spec.name),
            Err(e) => {
                ok = false;
                println!("✗ scenario {} ({}): {}", spec.id, spec.name, e);
            }
        }
    }
    println!(
        "{} scenario(s) checked, {}",
        specs.len(),
        if ok { "all valid" } else { "errors found" }
    );
    Ok(ok)
}
