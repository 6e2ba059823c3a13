use std::sync::Arc;

use anyhow::Context;
use svd_recommender::{
    api::{create_router, AppState},
    config::Config,
    logging,
    services::{dataset, Loader, RecommendationSource, SnapshotSource, SvdSource},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let config = Config::from_env()?;
    let loader = Arc::new(Loader::new(config.rating_scale()?));

    let source: Arc<dyn RecommendationSource> = match &config.snapshot_path {
        Some(path) => Arc::new(SnapshotSource::new(Arc::clone(&loader), path.clone())),
        None => {
            if let Some(url) = &config.ratings_url {
                dataset::ensure_ratings_file(url, &config.ratings_path)
                    .await
                    .with_context(|| {
                        format!("failed to fetch {}", config.ratings_path.display())
                    })?;
            }
            Arc::new(
                SvdSource::new(
                    Arc::clone(&loader),
                    config.ratings_path.clone(),
                    config.ratings_format,
                    config.svd_params(),
                    config.top_n,
                )
                .with_holdout(config.holdout_fraction)
                .with_export(config.snapshot_export_path.clone()),
            )
        }
    };

    // Bad input documents abort startup before anything is served
    let preload_source = Arc::clone(&source);
    tokio::task::spawn_blocking(move || preload_source.preload())
        .await
        .context("preload task failed")??;

    let state = AppState::new();
    state.spawn_load(source);

    let app = create_router(state);

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {}", address))?;
    tracing::info!(address = %address, "Server running on http://{}", address);
    axum::serve(listener, app).await?;

    Ok(())
}
