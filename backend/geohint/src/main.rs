//! GeoHint game service — entry point.
//!
//! Samples random outdoor Street View locations, captures the player's
//! current view for the vision-analysis service, and scores guesses.
//! The browser page drives everything through a small Axum REST API.

mod analyzer;
mod api;
mod capture;
mod config;
mod controller;
mod errors;
mod geo;
mod guess_map;
mod hints;
mod notifications;
mod panorama;
mod round;
mod screenshots;

#[cfg(test)]
mod test_round;
#[cfg(test)]
mod test_support;

use std::sync::Arc;

use reqwest::Client;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use analyzer::AnalyzerClient;
use capture::StaticViewCapture;
use config::Config;
use controller::{ControllerSettings, GameController};
use panorama::StreetViewSource;
use screenshots::ScreenshotStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load optional .env file (ignored if missing) so RUST_LOG can live there too.
    let _ = dotenvy::dotenv();

    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Without a maps key the panorama widget cannot work at all.
    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;

    // HTTP client shared by the panorama, capture and analyzer adapters.
    let client = Client::builder()
        .timeout(std::time::Duration::from_secs(config.http_timeout_secs))
        .build()?;

    let screenshots = ScreenshotStore::new(&config.screenshot_dir);

    let mut controller = GameController::new(
        StreetViewSource::new(client.clone(), &config.streetview_base_url, &config.maps_api_key),
        StaticViewCapture::new(client.clone(), &config.streetview_base_url, &config.maps_api_key),
        AnalyzerClient::new(client, &config.analyzer_url),
        ControllerSettings {
            search_radius_m: config.search_radius_m,
            max_sampling_attempts: config.max_sampling_attempts,
        },
    );
    if config.save_hint_captures {
        info!("Saving hint captures to {}", config.screenshot_dir.display());
        controller = controller.with_screenshots(screenshots.clone());
    }

    // ─── REST API ─────────────────────────────────────────
    let api_state = Arc::new(api::ApiState {
        controller,
        screenshots,
    });

    let app = api::router(api_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.api_port);
    info!("Analyzer at {}", config.analyzer_url);
    info!("API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
