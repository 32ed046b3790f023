use batchscribe_api::{build_router, state::AppState};
use batchscribe_config::Settings;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let settings = Settings::load()?;
    settings.log_summary();

    let addr = settings.api.addr();
    let schedule = settings.lifecycle.scan_schedule.clone();
    let state = AppState::build(settings).await?;

    let consumer = tokio::spawn(state.consumer.clone().run());

    let scheduler = JobScheduler::new().await?;
    let scan = state.scan.clone();
    scheduler
        .add(Job::new_async(schedule.as_str(), move |_id, _lock| {
            let scan = scan.clone();
            Box::pin(async move {
                match scan.scan().await {
                    Ok(summary) => info!(
                        submitted_jobs = summary.submitted_jobs,
                        submitted_files = summary.submitted_files,
                        deferred_files = summary.deferred_files,
                        "Scheduled scan finished"
                    ),
                    Err(e) => error!(error = %e, "Scheduled scan failed"),
                }
            })
        })?)
        .await?;
    scheduler.start().await?;
    info!(schedule = %schedule, "Scan scheduled");

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    consumer.abort();
    info!("Shutting down");
    Ok(())
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,batchscribe=debug"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_target(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}
