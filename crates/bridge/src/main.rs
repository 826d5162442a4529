//! `geoengine-bridge` console host.
//!
//! Loads the GeoEngine tool catalog the same way a GIS host plugin does,
//! and runs tools from the command line.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use geoengine_bridge::config::BridgeConfig;
use geoengine_bridge::events::{JobEvent, Severity};
use geoengine_bridge::host::{forward_events, HostAdapter};
use geoengine_bridge::lifecycle::JobOutcome;
use geoengine_bridge::operation::{ServiceStatusOperation, ToolOperation};
use geoengine_bridge::provider::GeoEngineProvider;
use geoengine_client::{GeoEngineApi, ServiceApi};
use geoengine_core::types::{ParamKind, ToolDescriptor};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "geoengine-bridge")]
#[command(about = "Discover and run GeoEngine tools", long_about = None)]
struct Cli {
    /// Service host (overrides GEOENGINE_HOST)
    #[arg(long, global = true)]
    host: Option<String>,

    /// Service port (overrides GEOENGINE_PORT)
    #[arg(long, global = true)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check service health and list registered projects
    Status,
    /// List every discovered tool with its parameters
    Tools,
    /// Run a tool and wait for it to finish (Ctrl-C cancels)
    Run {
        project: String,
        tool: String,
        /// Tool input as KEY=VALUE, repeatable
        #[arg(long = "input", short = 'i', value_parser = parse_key_value)]
        inputs: Vec<(String, String)>,
        /// Directory the job writes its outputs to
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// List jobs known to the service
    Jobs {
        /// Include finished jobs
        #[arg(long)]
        all: bool,
    },
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

// ---------------------------------------------------------------------------
// Console host
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ConsoleHost {
    operations: Mutex<Vec<ToolOperation>>,
    status: Mutex<Option<ServiceStatusOperation>>,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl HostAdapter for ConsoleHost {
    fn register_operation(&self, operation: ToolOperation) {
        locked(&self.operations).push(operation);
    }

    fn register_status(&self, operation: ServiceStatusOperation) {
        *locked(&self.status) = Some(operation);
    }

    fn emit(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Info => tracing::info!("{message}"),
            Severity::Warning => tracing::warn!("{message}"),
            Severity::Error => tracing::error!("{message}"),
        }
    }
}

impl ConsoleHost {
    fn operations(&self) -> Vec<ToolOperation> {
        locked(&self.operations).clone()
    }

    fn find(&self, project: &str, tool: &str) -> Option<ToolOperation> {
        locked(&self.operations)
            .iter()
            .find(|op| op.tool().key() == (project, tool))
            .cloned()
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Interpret a command-line value according to the input's declared kind.
fn input_value(tool: &ToolDescriptor, name: &str, raw: String) -> serde_json::Value {
    let numeric_or_bool = tool.input(name).is_some_and(|spec| {
        matches!(
            spec.kind,
            ParamKind::Integer | ParamKind::Float | ParamKind::Boolean
        )
    });
    if numeric_or_bool {
        if let Ok(value) = serde_json::from_str(&raw) {
            return value;
        }
    }
    serde_json::Value::String(raw)
}

async fn run_tool(
    host: &ConsoleHost,
    project: &str,
    tool: &str,
    raw_inputs: Vec<(String, String)>,
    output_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let Some(operation) = host.find(project, tool) else {
        bail!("Tool '{tool}' not found in project '{project}'");
    };

    let inputs: BTreeMap<String, serde_json::Value> = raw_inputs
        .into_iter()
        .map(|(key, raw)| {
            let value = input_value(operation.tool(), &key, raw);
            (key, value)
        })
        .collect();

    let mut handle = operation.execute(inputs, output_dir);

    let cancel = handle.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling job");
            cancel.cancel();
        }
    });

    let terminal = forward_events(&mut handle.events, host).await;
    match handle.wait().await {
        Ok(JobOutcome::Completed { matched, .. }) => {
            for (name, path) in &matched {
                println!("{name}\t{path}");
            }
            Ok(())
        }
        Ok(JobOutcome::Cancelled { .. }) => bail!("Job was cancelled"),
        Err(e) => {
            if !matches!(terminal, Some(JobEvent::Failed { .. })) {
                host.emit(Severity::Error, &e.to_string());
            }
            Err(e.into())
        }
    }
}

fn print_tools(operations: &[ToolOperation]) {
    for op in operations {
        println!("{} [{}] {}", op.id(), op.group(), op.display_name());
        if !op.help().is_empty() {
            println!("    {}", op.help());
        }
        for param in op.parameters() {
            println!(
                "    {}{} {:?}{}",
                if param.destination { "> " } else { "" },
                param.name,
                param.host_type,
                if param.required { "" } else { " (optional)" },
            );
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "geoengine_bridge=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = BridgeConfig::from_env().context("Invalid configuration")?;
    if let Some(host) = cli.host {
        config.client.host = host;
    }
    if let Some(port) = cli.port {
        config.client.port = port;
    }

    let endpoint = config.client.base_url();
    let api = GeoEngineApi::from_config(&config.client)?;
    let service: Arc<dyn ServiceApi> = Arc::new(api);

    match cli.command {
        Command::Status => {
            let host = ConsoleHost::default();
            let status = ServiceStatusOperation::new(service, endpoint)
                .run(&host)
                .await;
            if !status.is_healthy() {
                bail!("GeoEngine service at {} is not healthy", status.endpoint);
            }
        }
        Command::Tools => {
            let host = ConsoleHost::default();
            let provider = GeoEngineProvider::new(service, config.poll, endpoint);
            provider.load(&host).await;
            print_tools(&host.operations());
        }
        Command::Run {
            project,
            tool,
            inputs,
            output_dir,
        } => {
            let host = ConsoleHost::default();
            let provider = GeoEngineProvider::new(service, config.poll, endpoint);
            provider.load(&host).await;
            run_tool(&host, &project, &tool, inputs, output_dir).await?;
        }
        Command::Jobs { all } => {
            let jobs = service
                .list_jobs(all)
                .await
                .context("Failed to list jobs")?;
            for job in jobs {
                println!(
                    "{}\t{}\t{}",
                    job.id,
                    job.status,
                    job.tool.as_deref().unwrap_or("-"),
                );
            }
        }
    }

    Ok(())
}
