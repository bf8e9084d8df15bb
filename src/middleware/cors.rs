use crate::config::CorsConfig;
use http::header;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};

/// Build the CORS layer from configuration. The broker's HTTP surface is
/// read-only plus a WebSocket upgrade, so GET and OPTIONS cover it.
pub fn create_cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins: Vec<String> = config
        .allowed_origin
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect();

    if origins.is_empty() {
        warn!("No CORS origins configured, falling back to localhost:3000");
        return origin_cors(vec!["http://localhost:3000".to_string()]);
    }

    if origins.iter().any(|o| o == "*") {
        warn!("Wildcard CORS enabled - development only!");
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([http::Method::GET, http::Method::OPTIONS])
            .allow_headers(Any)
            .max_age(std::time::Duration::from_secs(3600));
    }

    info!("CORS: allowing {} origin(s): {:?}", origins.len(), origins);
    origin_cors(origins)
}

fn origin_cors(origins: Vec<String>) -> CorsLayer {
    let origin_headers: Vec<http::HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<http::HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Skipping invalid CORS origin '{}': {}", origin, e);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origin_headers))
        .allow_methods([http::Method::GET, http::Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(std::time::Duration::from_secs(3600))
}
