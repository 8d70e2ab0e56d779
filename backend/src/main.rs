//! Freight Ops - Backend Server
//!
//! Supplier status lifecycle and notification pipeline for consolidated
//! cargo: HTTP API, queue workers and batch maintenance commands.

use axum::{routing::get, Router};
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use std::{net::SocketAddr, path::Path, process::ExitCode, sync::Arc, time::Duration};
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod config;
mod documents;
mod error;
mod external;
mod handlers;
mod jobs;
mod middleware;
mod models;
mod routes;
mod services;

use cli::{BatchArgs, Cli, Commands};
pub use config::Config;
use external::{Messenger, WhatsAppClient};
use jobs::{Job, JobContext, JobQueue};
use services::{BatchOptions, ClienteService, CursoService, MaintenanceService, TrackingService};
use shared::batch::BatchReport;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub config: Arc<Config>,
    pub messenger: Arc<dyn Messenger>,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match config::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    init_tracing(config.logging.json);

    match run(cli, config).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "freight_ops=debug,tower_http=debug,sqlx=warn".into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Run one command; `Ok(false)` means it finished with failures
async fn run(cli: Cli, config: Config) -> anyhow::Result<bool> {
    tracing::info!("Environment: {}", config.environment);

    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&config.database.url)
        .await?;

    tracing::info!("Database connection established");

    // Run migrations in development
    if config.environment == "development" {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&db_pool).await?;
        tracing::info!("Migrations completed");
    }

    let config = Arc::new(config);
    let state = AppState {
        db: db_pool.clone(),
        messenger: Arc::new(WhatsAppClient::new(&config.whatsapp)),
        config: config.clone(),
    };

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(state).await,
        Commands::Worker { workers } => {
            let ctx = Arc::new(JobContext::new(
                db_pool.clone(),
                config.clone(),
                state.messenger.clone(),
            ));
            let queue = JobQueue::new(db_pool, &config.queue);
            let (tx, rx) = watch::channel(false);
            tokio::spawn(async move {
                shutdown_signal().await;
                let _ = tx.send(true);
            });

            jobs::run_workers(
                queue,
                ctx,
                workers.unwrap_or(config.queue.workers),
                Duration::from_millis(config.queue.poll_interval_ms),
                rx,
            )
            .await?;
            Ok(true)
        }
        Commands::UpdateEstadosProveedor { batch } => {
            let report = TrackingService::new(db_pool)
                .update_provider_states(batch_options(&batch))
                .await?;
            finish_batch(&report, batch.report.as_deref())
        }
        Commands::SyncTracking { batch } => {
            let report = TrackingService::new(db_pool)
                .sync_tracking_to_providers(batch_options(&batch))
                .await?;
            finish_batch(&report, batch.report.as_deref())
        }
        Commands::FixTrackingNulos { batch } => {
            let report = TrackingService::new(db_pool)
                .fix_null_tracking_states(batch_options(&batch))
                .await?;
            finish_batch(&report, batch.report.as_deref())
        }
        Commands::BackfillUuids {
            table,
            dry_run,
            report,
        } => {
            let result = MaintenanceService::new(db_pool)
                .backfill_uuids(table, dry_run)
                .await?;
            finish_batch(&result, report.as_deref())
        }
        Commands::SyncClientes { dry_run, report } => {
            let result = ClienteService::new(db_pool, config.whatsapp.country_code.clone())
                .sync_clientes_from_cotizaciones(dry_run)
                .await?;
            finish_batch(&result, report.as_deref())
        }
        Commands::EnqueueJob { payload } => {
            let job: Job = serde_json::from_str(&payload)?;
            let record = JobQueue::new(db_pool, &config.queue).enqueue(&job).await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(true)
        }
        Commands::ForceSendRotulado {
            cotizacion,
            proveedores,
        } => {
            let ctx = JobContext::new(db_pool, config.clone(), state.messenger.clone());
            let job = Job::ForceSendRotulado {
                cotizacion_id: cotizacion,
                proveedor_ids: proveedores,
            };
            jobs::handlers::handle(&ctx, &job).await?;
            Ok(true)
        }
        Commands::CreateCourse {
            fullname,
            shortname,
            category_id,
        } => {
            let id = external::MoodleClient::new(&config.moodle)
                .create_course(&fullname, &shortname, category_id)
                .await?;
            tracing::info!(course_id = id, %shortname, "Moodle course created");
            println!("{}", id);
            Ok(true)
        }
        Commands::RenderConstancia { pedido_curso, out } => {
            let pdf = CursoService::new(db_pool)
                .render_constancia(&config, pedido_curso)
                .await?;
            tokio::fs::write(&out, &pdf).await?;
            tracing::info!(path = %out.display(), bytes = pdf.len(), "Constancia written");
            Ok(true)
        }
    }
}

fn batch_options(args: &BatchArgs) -> BatchOptions {
    BatchOptions {
        contenedor_id: args.contenedor_id,
        dry_run: args.dry_run,
    }
}

/// Print the summary, write the CSV report if asked, and report success
fn finish_batch(report: &BatchReport, csv_path: Option<&Path>) -> anyhow::Result<bool> {
    if let Some(path) = csv_path {
        let file = std::fs::File::create(path)?;
        services::tracking::write_report_csv(report, file)?;
        tracing::info!(path = %path.display(), rows = report.decisions.len(), "Report written");
    }

    println!(
        "scanned={} changed={} skipped={} failed={} dry_run={}",
        report.scanned, report.changed, report.skipped, report.failed, report.dry_run
    );
    Ok(!report.has_failures())
}

async fn serve(state: AppState) -> anyhow::Result<bool> {
    let addr: SocketAddr = format!("{}:{}", state.config.server.host, state.config.server.port)
        .parse()
        .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], state.config.server.port)));

    tracing::info!("Starting Freight Ops API");
    let app = create_app(state);

    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(true)
}

/// Create the application router with all routes and middleware
fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", routes::api_routes(state.clone()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(cors),
        )
        .with_state(state)
}

/// Root endpoint
async fn root() -> &'static str {
    "Freight Ops API v1"
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
