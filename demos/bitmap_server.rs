//! Bitmap server demo
//!
//! Serves rasterized pages to e-paper displays configured in a YAML file.
//!
//! Run with:
//!   DISPLAYS=config/displays.yaml PAGES=/var/cache/pages \
//!     cargo run --example bitmap_server --features axum
//!
//! The rasterizer is expected to write `<PAGES>/<mac>.png` at each display's
//! virtual size (MAC lowercased, colons replaced by dashes).
//!
//! Then test with:
//!   curl -o frame.bin http://localhost:3000/api/epaper/aa:bb:cc:dd:ee:01
//!   curl -o preview.png 'http://localhost:3000/bitmap/aa:bb:cc:dd:ee:01?preview_colors=true'

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::{routing::get, Router};
use epaper_bitmap::{
    encode_file_blocking, palette::registry, BitmapParams, DisplayProfiles, EncodedResult, Error,
};
use serde::Deserialize;

struct AppState {
    profiles: DisplayProfiles,
    pages: PathBuf,
}

impl AppState {
    fn source_for(&self, mac: &str) -> PathBuf {
        self.pages
            .join(format!("{}.png", mac.to_ascii_lowercase().replace(':', "-")))
    }
}

#[derive(Debug, Deserialize)]
struct EpaperQuery {
    #[serde(default)]
    web_format: bool,
    #[serde(default)]
    preview_colors: bool,
}

/// GET /bitmap/{mac} - Any format, parameters from the query string
async fn bitmap(
    State(state): State<Arc<AppState>>,
    Path(mac): Path<String>,
    Query(params): Query<BitmapParams>,
) -> Result<EncodedResult, Error> {
    let profile = state.profiles.by_mac(&mac)?;
    let (request, model) = profile.resolve(&params, registry())?;
    tracing::info!("Bitmap for {} ({:?})", profile.name, request.format);
    encode_file_blocking(state.source_for(&mac), request, model.clone()).await
}

/// GET /api/epaper/{mac} - Firmware endpoint
async fn epaper(
    State(state): State<Arc<AppState>>,
    Path(mac): Path<String>,
    Query(query): Query<EpaperQuery>,
) -> Result<EncodedResult, Error> {
    let profile = state.profiles.by_mac(&mac)?;
    let (request, model) =
        profile.epaper_request(query.web_format, query.preview_colors, registry())?;
    tracing::info!("Frame for {} (web format: {})", profile.name, query.web_format);
    encode_file_blocking(state.source_for(&mac), request, model.clone()).await
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let profiles_path =
        std::env::var("DISPLAYS").unwrap_or_else(|_| "config/displays.yaml".to_string());
    let pages = std::env::var("PAGES").unwrap_or_else(|_| "pages".to_string());

    let state = Arc::new(AppState {
        profiles: DisplayProfiles::load(&profiles_path)?,
        pages: PathBuf::from(pages),
    });

    println!("Starting bitmap server on http://localhost:3000");
    println!();
    println!("Endpoints:");
    println!("  GET /bitmap/{{mac}}      - Bitmap with explicit parameters");
    println!("  GET /api/epaper/{{mac}}  - Native frame for the firmware");

    let app = Router::new()
        .route("/bitmap/{mac}", get(bitmap))
        .route("/api/epaper/{mac}", get(epaper))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
    axum::serve(listener, app).await?;
    Ok(())
}
