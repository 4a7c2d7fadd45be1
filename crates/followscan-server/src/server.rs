//! HTTP server implementation using Axum.

use crate::handler::{
    handle_cancel, handle_get_results, handle_health, handle_post_results, handle_run,
    handle_status,
};
use axum::{
    routing::{get, post},
    Router,
};
use followscan_core::Orchestrator;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Requests handled at once; status and result reads are cheap.
const MAX_CONCURRENT_REQUESTS: usize = 64;

/// Application state shared across handlers.
pub struct AppState {
    pub orchestrator: Orchestrator,
    /// Bearer token required by `POST /results` when set.
    pub ingest_token: Option<String>,
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/run", post(handle_run))
        .route("/cancel", post(handle_cancel))
        .route("/status", get(handle_status))
        .route("/results", get(handle_get_results).post(handle_post_results))
        .layer(ConcurrencyLimitLayer::new(MAX_CONCURRENT_REQUESTS))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
///
/// Returns the actual address the server is bound to (useful when port=0).
pub async fn start_server(
    orchestrator: Orchestrator,
    ingest_token: Option<String>,
    host: &str,
    port: u16,
) -> anyhow::Result<SocketAddr> {
    let state = Arc::new(AppState {
        orchestrator,
        ingest_token,
    });
    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    info!("Server listening on {}", actual_addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Server error: {}", e);
        }
    });

    Ok(actual_addr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use followscan_core::{FetchOptions, PipelineConfig, RunState};
    use serde_json::{json, Value};
    use std::time::Duration;
    use tempfile::TempDir;

    /// Serve a tiny listing source: two projects, one with a handle.
    async fn start_listing_source() -> SocketAddr {
        let listing = r#"<table><tbody>
<tr data-coin-id="alpha"><td>1</td><td><a href="/en/coins/alpha">Alpha <span class="coin-symbol">alp</span></a></td><td data-price="2">$2</td><td data-market-cap="2000">$2,000</td></tr>
<tr data-coin-id="beta"><td>2</td><td><a href="/en/coins/beta">Beta <span class="coin-symbol">bet</span></a></td><td data-price="1">$1</td><td data-market-cap="1000">$1,000</td></tr>
</tbody></table>"#;
        let alpha = r#"<a href="https://twitter.com/alpha">Twitter</a>"#;
        let beta = r#"<p>no socials</p>"#;
        let profile = r#"<a href="/alpha/verified_followers"><span>2.5M</span> Followers</a>"#;

        let app = Router::new()
            .route("/", get(move || async move { axum::response::Html(listing) }))
            .route("/en/coins/alpha", get(move || async move { axum::response::Html(alpha) }))
            .route("/en/coins/beta", get(move || async move { axum::response::Html(beta) }))
            .route("/x/alpha", get(move || async move { axum::response::Html(profile) }));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    async fn start(source: SocketAddr, token: Option<&str>, data_dir: &TempDir) -> String {
        let config = PipelineConfig::new(format!("http://{}/", source))
            .with_page_param(None)
            .with_min_interval(Duration::ZERO)
            .with_profile_url_template(format!("http://{}/x/{{handle}}", source))
            .with_fetch_options(
                FetchOptions::default()
                    .with_timeout(Duration::from_secs(5))
                    .with_max_retries(0),
            )
            .with_data_dir(Some(data_dir.path().to_path_buf()));
        let orchestrator = Orchestrator::with_reqwest(config).unwrap();
        let addr = start_server(orchestrator, token.map(str::to_string), "127.0.0.1", 0)
            .await
            .unwrap();
        format!("http://{}", addr)
    }

    async fn wait_for_terminal(client: &reqwest::Client, base: &str) -> Value {
        for _ in 0..100 {
            let status: Value = client
                .get(format!("{base}/status"))
                .send()
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
            if !matches!(
                status["state"].as_str(),
                Some("running_listing") | Some("running_resolution")
            ) {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("run did not finish in time");
    }

    #[tokio::test]
    async fn test_server_starts() {
        let source = start_listing_source().await;
        let dir = TempDir::new().unwrap();
        let base = start(source, None, &dir).await;

        let health: Value = reqwest::get(format!("{base}/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn test_run_then_results() {
        let source = start_listing_source().await;
        let dir = TempDir::new().unwrap();
        let base = start(source, None, &dir).await;
        let client = reqwest::Client::new();

        // Seed data is served before any run
        let seed: Value = client
            .get(format!("{base}/results"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(seed["origin"], "seed");

        let idle: Value = client
            .post(format!("{base}/cancel"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(idle["status"], "idle");

        let response = client.post(format!("{base}/run")).send().await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::ACCEPTED);
        let accepted: Value = response.json().await.unwrap();
        assert_eq!(accepted["status"], "accepted");
        assert_eq!(accepted["run_id"], 1);

        let status = wait_for_terminal(&client, &base).await;
        assert_eq!(status["state"], RunState::Succeeded.as_str());
        assert_eq!(status["message"], "1 of 1 handles resolved (1 without handle)");

        let results: Value = client
            .get(format!("{base}/results"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(results["origin"], "run");
        assert_eq!(results["coverage"]["resolved"], 1);
        let data = results["data"].as_array().unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data[0]["rank"], 1);
        assert_eq!(data[0]["handle"], "alpha");
        assert_eq!(data[0]["followers"], 2_500_000);
        assert_eq!(data[1]["rank"], 2);
        assert!(data[1]["handle"].is_null());
        assert!(data[1]["followers"].is_null());
        assert_eq!(data[1]["social_status"], "no_handle");
    }

    #[tokio::test]
    async fn test_post_results_requires_token_and_valid_payload() {
        let source = start_listing_source().await;
        let dir = TempDir::new().unwrap();
        let base = start(source, Some("s3cret"), &dir).await;
        let client = reqwest::Client::new();

        let payload = json!({"data": [{
            "rank": 1, "name": "Gamma", "symbol": "GAM", "source_id": "gamma",
            "handle": "gamma", "followers": 42, "social_status": "resolved",
            "market_cap": 10.0, "price": 0.1,
            "last_updated": "2026-01-01T00:00:00Z"
        }]});

        let unauthorized = client
            .post(format!("{base}/results"))
            .json(&payload)
            .send()
            .await
            .unwrap();
        assert_eq!(unauthorized.status(), reqwest::StatusCode::UNAUTHORIZED);

        let malformed = client
            .post(format!("{base}/results"))
            .bearer_auth("s3cret")
            .json(&json!({"data": [{"rank": 1}]}))
            .send()
            .await
            .unwrap();
        assert_eq!(malformed.status(), reqwest::StatusCode::BAD_REQUEST);
        let body: Value = malformed.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("invalid results payload"));

        let duplicate = client
            .post(format!("{base}/results"))
            .bearer_auth("s3cret")
            .json(&json!({"data": [payload["data"][0], payload["data"][0]]}))
            .send()
            .await
            .unwrap();
        assert_eq!(duplicate.status(), reqwest::StatusCode::BAD_REQUEST);

        // Rejected payloads left the seed in place
        let results: Value = client
            .get(format!("{base}/results"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(results["origin"], "seed");

        let accepted: Value = client
            .post(format!("{base}/results"))
            .bearer_auth("s3cret")
            .json(&payload)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(accepted, json!({"count": 1}));

        let results: Value = client
            .get(format!("{base}/results"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(results["origin"], "ingested");
        assert_eq!(results["data"][0]["followers"], 42);
    }
}
