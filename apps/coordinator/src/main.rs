use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use swarm_coordinator::config::CoordinatorConfig;
use swarm_coordinator::coordination::{CoordinationService, ScalingAction};
use swarm_coordinator::infrastructure::repositories::{
    PostgresAgentRepository, PostgresTaskRepository,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    let config = CoordinatorConfig::from_env()?;

    // Initialize tracing; RUST_LOG wins over LOG_LEVEL
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Connect to database
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database connected successfully");

    let service = CoordinationService::with_config(
        Arc::new(PostgresAgentRepository::new(pool.clone())),
        Arc::new(PostgresTaskRepository::with_timeout(
            pool.clone(),
            config.task_timeout,
        )),
        config.coordination,
    );

    tracing::info!(
        interval_secs = config.monitor_interval.as_secs(),
        "Swarm monitor started"
    );

    let mut ticker = tokio::time::interval(config.monitor_interval);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = check_swarm(&service).await {
                    tracing::error!(error = %e, "Swarm check failed");
                }
            }
            _ = &mut shutdown => {
                tracing::info!("Shutting down swarm monitor");
                break;
            }
        }
    }

    pool.close().await;
    Ok(())
}

async fn check_swarm(
    service: &CoordinationService,
) -> swarm_coordinator::coordination::CoordinationResult<()> {
    let health = service.get_swarm_health().await?;

    if health.healthy {
        tracing::info!(
            agents = health.total_agents,
            queue_depth = health.queue_depth,
            utilization = health.average_utilization,
            "Swarm healthy"
        );
    } else {
        for issue in &health.issues {
            tracing::warn!(issue = %issue, "Swarm health issue");
        }
    }

    let recommendation = service.calculate_scaling_recommendation().await?;
    if recommendation.action != ScalingAction::None {
        tracing::info!(
            action = %recommendation.action,
            count = recommendation.count,
            reason = %recommendation.reason,
            "Scaling recommended"
        );
    }

    Ok(())
}
