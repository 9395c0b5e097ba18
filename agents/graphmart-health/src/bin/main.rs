//! Graphmart Health Agent entry point
//!
//! Health checks, readiness waits, reloads and continuous monitoring of
//! graphmarts from the command line, plus the read-only HTTP surface.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use graphmart_health::client::AnzoClient;
use graphmart_health::config::{ClientConfig, ClientOverrides, Settings};
use graphmart_health::contracts::*;
use graphmart_health::engine::*;
use graphmart_health::handler::{create_router, AppState};
use graphmart_health::output::{self, OutputFormat};
use graphmart_health::telemetry::HealthMetrics;
use graphmart_health::{AGENT_ID, AGENT_VERSION};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "graphmart-health")]
#[command(about = "Graphmart Health Agent - readiness polling and health monitoring")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    /// Settings file (YAML/JSON)
    #[arg(short, long, global = true, env = "GRAPHMART_HEALTH_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConnectionArgs {
    /// Server hostname
    #[arg(long, global = true, env = "ANZO_SERVER")]
    server: Option<String>,

    /// Server port
    #[arg(long, global = true, env = "ANZO_PORT")]
    port: Option<String>,

    /// Username
    #[arg(short, long, global = true, env = "ANZO_USERNAME")]
    username: Option<String>,

    /// Password
    #[arg(long, global = true, env = "ANZO_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Use plain HTTP
    #[arg(long, global = true)]
    http: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the health of one or more graphmarts
    Check {
        /// Graphmart URIs (defaults to the settings file list)
        ids: Vec<String>,

        /// Include search index, AnzoGraph and authentication checks
        #[arg(long)]
        aux: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Wait until a graphmart is online with no failed or dirty layers
    Wait {
        id: String,

        /// Timeout in seconds (defaults to the poller setting)
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Reload a graphmart and wait for it
    Reload {
        id: String,

        /// Timeout in seconds (defaults to the poller setting)
        #[arg(short, long)]
        timeout: Option<u64>,
    },

    /// Refresh dirty layers of a graphmart and wait for it
    Refresh {
        id: String,

        /// Timeout in seconds (defaults to the poller setting)
        #[arg(short, long)]
        timeout: Option<u64>,
    },

    /// Reload every graphmart in a plan, one after another
    ReloadAll {
        /// Settings file with a `reload_plan`
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Check graphmarts on an interval until stopped
    Monitor {
        /// Graphmart URIs (defaults to the settings file list)
        ids: Vec<String>,

        /// Seconds between checks
        #[arg(short, long)]
        interval: Option<u64>,

        /// Stop after this many seconds
        #[arg(short, long)]
        duration: Option<u64>,
    },

    /// List layer status of a graphmart
    Layers {
        id: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Start the HTTP server
    Serve {
        /// Port to listen on
        #[arg(long, default_value = "8080", env = "PORT")]
        listen_port: u16,

        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
    },
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .init();
    }
}

impl ConnectionArgs {
    /// Flags and `ANZO_*` variables take precedence over the settings file
    fn resolve(&self, settings: &Settings) -> anyhow::Result<ClientConfig> {
        let overrides = ClientOverrides {
            server: self.server.clone(),
            port: self.port.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            plain_http: self.http,
        };
        settings
            .resolve_client(&overrides)
            .context("server, username and password are required (flags, ANZO_* or settings file)")
    }
}

fn load_settings(path: Option<&PathBuf>) -> anyhow::Result<Settings> {
    match path {
        Some(path) => Settings::load(path)
            .with_context(|| format!("Failed to load settings from {}", path.display())),
        None => Ok(Settings::default()),
    }
}

fn artifact_ids(ids: Vec<String>, settings: &Settings) -> anyhow::Result<Vec<ArtifactId>> {
    if !ids.is_empty() {
        return Ok(ids.into_iter().map(ArtifactId::from).collect());
    }
    if settings.graphmarts.is_empty() {
        anyhow::bail!("No graphmarts given on the command line or in the settings file");
    }
    Ok(settings.graphmarts.clone())
}

fn wait_timeout(secs: Option<u64>, settings: &Settings) -> Duration {
    secs.map(Duration::from_secs)
        .unwrap_or(settings.poller.default_timeout)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    // A reload plan file doubles as the settings file unless one is given
    let settings_path = match &cli.command {
        Commands::ReloadAll { file } if cli.config.is_none() => Some(file.clone()),
        _ => cli.config.clone(),
    };
    let settings = load_settings(settings_path.as_ref())?;
    let client = Arc::new(AnzoClient::new(cli.connection.resolve(&settings)?)?);
    let metrics = Arc::new(HealthMetrics::new()?);

    let exit_code = match cli.command {
        Commands::Check { ids, aux, format } => {
            let ids = artifact_ids(ids, &settings)?;
            let aggregator = HealthAggregator::new(client.clone())
                .with_auth_probe(client.clone())
                .with_metrics(metrics);
            let report = aggregator.aggregate(&ids, aux).await;
            output::render_aggregate(&mut std::io::stdout(), &report, format)?;
            report.exit_code()
        }

        Commands::Wait { id, timeout, format } => {
            let poller = ReadinessPoller::with_config(client.clone(), settings.poller.clone())
                .with_metrics(metrics);
            match poller
                .wait_until_ready(&ArtifactId::from(id), wait_timeout(timeout, &settings))
                .await
            {
                Ok(report) => {
                    output::render_report(&mut std::io::stdout(), &report, format)?;
                    0
                }
                Err(e) => {
                    tracing::error!("{}", e);
                    1
                }
            }
        }

        Commands::Reload { id, timeout } => {
            let poller = ReadinessPoller::with_config(client.clone(), settings.poller.clone())
                .with_metrics(metrics);
            let coordinator = ReloadCoordinator::new(client.clone(), poller);
            match coordinator
                .reload_and_wait(&ArtifactId::from(id), wait_timeout(timeout, &settings))
                .await
            {
                Ok(_) => 0,
                Err(e) => {
                    tracing::error!("{}", e);
                    1
                }
            }
        }

        Commands::Refresh { id, timeout } => {
            let poller = ReadinessPoller::with_config(client.clone(), settings.poller.clone())
                .with_metrics(metrics);
            let coordinator = ReloadCoordinator::new(client.clone(), poller);
            match coordinator
                .refresh_and_wait(&ArtifactId::from(id), wait_timeout(timeout, &settings))
                .await
            {
                Ok(_) => 0,
                Err(e) => {
                    tracing::error!("{}", e);
                    1
                }
            }
        }

        Commands::ReloadAll { file } => {
            let plan = Settings::load(&file)
                .with_context(|| format!("Failed to load reload plan from {}", file.display()))?;
            if plan.reload_plan.is_empty() {
                anyhow::bail!("{} has no reload_plan entries", file.display());
            }
            let poller = ReadinessPoller::with_config(client.clone(), plan.poller.clone())
                .with_metrics(metrics);
            let coordinator = ReloadCoordinator::new(client.clone(), poller);
            match coordinator.reload_sequential(&plan.reload_plan).await {
                Ok(_) => 0,
                Err(e) => {
                    tracing::error!("{}", e);
                    1
                }
            }
        }

        Commands::Monitor {
            ids,
            interval,
            duration,
        } => {
            let ids = artifact_ids(ids, &settings)?;
            let mut config = settings.monitor.clone();
            if let Some(interval) = interval {
                config.interval = Duration::from_secs(interval);
            }
            if let Some(duration) = duration {
                config.duration = Some(Duration::from_secs(duration));
            }

            let cancel = CancellationToken::new();
            let trigger = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    trigger.cancel();
                }
            });

            let monitor = ContinuousMonitor::new(client.clone(), config).with_metrics(metrics);
            let summary = monitor.run(&ids, &AlertingObserver, &cancel).await;
            tracing::info!(iterations = summary.iterations, "Monitoring finished");
            0
        }

        Commands::Layers { id, format } => {
            let id = ArtifactId::from(id);
            let title = client.title(&id).await?;
            let raw = client.status_detail(&id).await?;
            inspect_layers(&title, &raw);
            output::render_layers(&mut std::io::stdout(), &title, &layer_statuses(&raw), format)?;
            0
        }

        Commands::Serve { listen_port, host } => {
            let addr: SocketAddr = format!("{}:{}", host, listen_port).parse()?;
            let aggregator = HealthAggregator::new(client.clone())
                .with_auth_probe(client.clone())
                .with_metrics(Arc::clone(&metrics));
            let state = Arc::new(AppState::new(
                aggregator,
                settings.graphmarts.clone(),
                metrics,
            ));
            let router = create_router(state);

            tracing::info!("Starting Graphmart Health Agent on {}", addr);
            tracing::info!("Agent ID: {}, Version: {}", AGENT_ID, AGENT_VERSION);

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = tokio::signal::ctrl_c().await;
                })
                .await?;
            0
        }
    };

    std::process::exit(exit_code);
}
