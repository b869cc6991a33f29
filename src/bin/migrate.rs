use user_sync_backend::{
    config::DEFAULT_DATABASE_URL,
    database::pool::{create_pool, run_migrations},
    telemetry::init_tracing,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());
    let pool = create_pool(&database_url).await?;
    run_migrations(&pool).await?;
    pool.close().await;

    tracing::info!(database_url = %database_url, "Migrations completed");
    Ok(())
}
