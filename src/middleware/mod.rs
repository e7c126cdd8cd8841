// Request observability middleware

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

/// Log method, path, status and latency for every request.
pub async fn request_logging(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    let status = response.status().as_u16();
    let elapsed_ms = started.elapsed().as_millis();
    if status >= 500 {
        tracing::error!("{} {} -> {} ({}ms)", method, path, status, elapsed_ms);
    } else {
        tracing::info!("{} {} -> {} ({}ms)", method, path, status, elapsed_ms);
    }
    response
}
