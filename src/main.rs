use std::{process, sync::Arc};

use apalis::prelude::{Monitor, WorkerBuilder, WorkerFactoryFn};
use apalis_cron::{CronStream, Schedule};
use folio::{
    application::{
        engine::ListingEngine,
        error::AppError,
        hooks::Hooks,
        jobs::{RewarmContext, process_rewarm_job, schedule_all},
    },
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, FlushResponse, HttpState},
        telemetry,
    },
};
use tokio::{sync::watch, task::JoinHandle, try_join};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Flush(args) => run_flush(args).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let engine = ListingEngine::build(
        repositories.clone(),
        Hooks::default(),
        settings.engine_options(),
    );

    if settings.scheduler.warm_on_startup {
        match schedule_all(&engine.listing, &engine.scheduler).await {
            Ok(count) => info!(categories = count, "scheduled startup warm"),
            Err(err) => warn!(error = %err, "startup warm could not be scheduled"),
        }
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let worker = engine.worker.clone();
    let worker_shutdown = shutdown_rx.clone();
    let worker_handle = tokio::spawn(async move { worker.run(worker_shutdown).await });

    let monitor_handle = settings
        .scheduler
        .rewarm
        .clone()
        .map(|schedule| spawn_rewarm_monitor(&engine, schedule));

    let state = HttpState::new(engine.clone()).with_db(repositories);
    let result = serve_http(&settings, state, shutdown_tx, shutdown_rx).await;

    if let Some(handle) = monitor_handle {
        handle.abort();
        let _ = handle.await;
    }

    if tokio::time::timeout(settings.server.graceful_shutdown, worker_handle)
        .await
        .is_err()
    {
        warn!("regeneration worker did not stop before the shutdown deadline");
    }

    match engine.flush_jobs().await {
        Ok(dropped) => info!(dropped, "pending regeneration jobs dropped at shutdown"),
        Err(err) => warn!(error = %err, "failed to flush pending jobs at shutdown"),
    }

    result
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn spawn_rewarm_monitor(engine: &ListingEngine, schedule: Schedule) -> JoinHandle<()> {
    let context = RewarmContext {
        listing: engine.listing.clone(),
        scheduler: engine.scheduler.clone(),
    };
    let rewarm_worker = WorkerBuilder::new("listing-rewarm-worker")
        .data(context)
        .backend(CronStream::new(schedule))
        .build_fn(process_rewarm_job);

    let monitor = Monitor::new().register(rewarm_worker);

    tokio::spawn(async move {
        if let Err(err) = monitor.run().await {
            error!(error = %err, "rewarm monitor stopped");
        }
    })
}

async fn serve_http(
    settings: &config::Settings,
    state: HttpState,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
) -> Result<(), AppError> {
    let public_router = http::build_router(state.clone());
    let admin_router = http::build_admin_router(state);

    let public_listener = tokio::net::TcpListener::bind(settings.server.public_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    let admin_listener = tokio::net::TcpListener::bind(settings.server.admin_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        public = %settings.server.public_addr,
        admin = %settings.server.admin_addr,
        "listening"
    );

    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    let public_server = axum::serve(public_listener, public_router.into_make_service())
        .with_graceful_shutdown(wait_for_shutdown(shutdown_rx.clone()));
    let admin_server = axum::serve(admin_listener, admin_router.into_make_service())
        .with_graceful_shutdown(wait_for_shutdown(shutdown_rx));

    try_join!(public_server, admin_server)
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}

async fn wait_for_shutdown(mut shutdown: watch::Receiver<bool>) {
    while !*shutdown.borrow() {
        if shutdown.changed().await.is_err() {
            break;
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => error!(error = %err, "failed to listen for SIGTERM"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

async fn run_flush(args: config::FlushArgs) -> Result<(), AppError> {
    let url = format!(
        "{}{}",
        args.admin_url.trim_end_matches('/'),
        args.target.path()
    );

    let response = reqwest::Client::new()
        .post(&url)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    let body: FlushResponse = response
        .json()
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(url = %url, removed = body.removed, "flush completed");
    Ok(())
}
