use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::ResolverConfig;
use crate::error::ResolverError;
use crate::llm::{ContradictionExtractor, TechnicalContradiction};
use crate::resolver::{CandidateReport, ContradictionResolver, ResolutionResult};
use crate::services::bootstrap;

pub struct ResolverServerState {
    pub resolver: ContradictionResolver,
    pub extractor: Option<ContradictionExtractor>,
    /// Default informational candidates per effect
    pub candidates: usize,
}

#[derive(Deserialize)]
struct ResolveRequest {
    positive: String,
    negative: String,
    candidates: Option<usize>,
}

#[derive(Deserialize)]
struct ExtractRequest {
    description: String,
}

#[derive(Serialize)]
struct ResolveResponse {
    result: ResolutionResult,
    candidates: CandidateReport,
}

#[derive(Serialize)]
struct ExtractResponse {
    contradiction: TechnicalContradiction,
    result: ResolutionResult,
}

#[derive(Serialize)]
struct ParameterSummary {
    position: u32,
    name: String,
}

struct ServerError(anyhow::Error);

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match self.0.downcast_ref::<ResolverError>() {
            Some(ResolverError::EmbeddingUnavailable { .. }) => StatusCode::BAD_GATEWAY,
            Some(ResolverError::Extraction(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = format!("Resolver Error: {:#}", self.0);
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl<E> From<E> for ServerError where E: Into<anyhow::Error> {
    fn from(err: E) -> Self { Self(err.into()) }
}

pub fn router(state: Arc<ResolverServerState>) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/parameters", get(parameters_handler))
        .route("/resolve", post(resolve_handler))
        .route("/extract", post(extract_handler))
        .with_state(state)
}

pub async fn run_resolver_server(config: ResolverConfig) -> Result<()> {
    info!("Starting TRIZ resolver service...");

    let embedder = bootstrap::embedder_from_config(&config)?;
    let resolver = bootstrap::load_resolver(&config, embedder).await?;
    let extractor = ContradictionExtractor::new(
        bootstrap::chat_provider_from_config(&config)?,
        config.chat_model.clone(),
    );

    let state = Arc::new(ResolverServerState {
        resolver,
        extractor: Some(extractor),
        candidates: config.candidates,
    });

    let listener = tokio::net::TcpListener::bind(&config.server_addr).await?;
    info!("Resolver service listening at http://{}", config.server_addr);
    axum::serve(listener, router(state)).await?;

    Ok(())
}

async fn parameters_handler(State(state): State<Arc<ResolverServerState>>) -> Json<Vec<ParameterSummary>> {
    let parameters = state
        .resolver
        .index()
        .parameters()
        .iter()
        .map(|p| ParameterSummary { position: p.position, name: p.name.clone() })
        .collect();
    Json(parameters)
}

async fn resolve_handler(
    State(state): State<Arc<ResolverServerState>>,
    Json(payload): Json<ResolveRequest>,
) -> Result<Json<ResolveResponse>, ServerError> {
    debug!("Resolving {:?} vs {:?}", payload.positive, payload.negative);
    let n = payload.candidates.unwrap_or(state.candidates);
    let (result, candidates) = state
        .resolver
        .resolve_with_candidates(&payload.positive, &payload.negative, n)
        .await?;
    Ok(Json(ResolveResponse { result, candidates }))
}

async fn extract_handler(
    State(state): State<Arc<ResolverServerState>>,
    Json(payload): Json<ExtractRequest>,
) -> Result<Json<ExtractResponse>, ServerError> {
    let extractor = state
        .extractor
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("contradiction extraction is not configured"))?;
    let contradiction = extractor.extract(&payload.description).await?;
    let result = state
        .resolver
        .resolve(&contradiction.positive_effect, &contradiction.negative_effect)
        .await?;
    Ok(Json(ExtractResponse { contradiction, result }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{Embedder, FixedEmbedder, Vector};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use crate::matrix::{ContradictionMatrix, MatrixLayout, PrincipleCatalog};
    use crate::retrieval::{BuildOptions, ParameterIndex};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn embedder() -> FixedEmbedder {
        FixedEmbedder::new()
            .with("Weight of moving object", vec![1.0, 0.0])
            .with("Speed", vec![0.0, 1.0])
            .with("faster", vec![0.1, 1.0])
            .with("heavier", vec![1.0, 0.1])
    }

    async fn state() -> Arc<ResolverServerState> {
        state_over(Arc::new(embedder())).await
    }

    async fn state_over(embedder: Arc<dyn Embedder>) -> Arc<ResolverServerState> {
        let names = vec!["Weight of moving object".to_string(), "Speed".to_string()];
        let index = ParameterIndex::build(&names, embedder.as_ref(), BuildOptions::default())
            .await
            .unwrap();
        let matrix = ContradictionMatrix::parse(";\n1,3;", MatrixLayout::default(), "m").unwrap();
        let catalog = PrincipleCatalog::from_names(vec![
            "Segmentation".into(),
            "Parameter changes".into(),
            "Universality".into(),
        ]);
        let resolver = ContradictionResolver::new(
            embedder,
            Arc::new(index),
            Arc::new(matrix),
            Arc::new(catalog),
        );
        Arc::new(ResolverServerState { resolver, extractor: None, candidates: 2 })
    }

    struct Counting {
        inner: FixedEmbedder,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for Counting {
        async fn embed(&self, text: &str) -> crate::Result<Vector> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed(text).await
        }

        fn model_name(&self) -> &str {
            "counting"
        }
    }

    async fn post(app: Router, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_resolve_endpoint() {
        let app = router(state().await);
        let (status, json) = post(
            app,
            "/resolve",
            serde_json::json!({ "positive": "faster", "negative": "heavier" }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["result"]["positive_match"]["name"], "Speed");
        assert_eq!(
            json["result"]["principles"],
            serde_json::json!(["Segmentation", "Universality"])
        );
        assert_eq!(json["candidates"]["negative"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_text_is_bad_gateway() {
        let app = router(state().await);
        let (status, json) = post(
            app,
            "/resolve",
            serde_json::json!({ "positive": "faster", "negative": "colder" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(json["error"].as_str().unwrap().contains("colder"));
    }

    #[tokio::test]
    async fn test_extract_without_llm() {
        let app = router(state().await);
        let (status, _) = post(app, "/extract", serde_json::json!({ "description": "x" })).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_resolve_endpoint_embeds_each_effect_once() {
        let embedder = Arc::new(Counting {
            inner: embedder(),
            calls: AtomicUsize::new(0),
        });
        let app = router(state_over(embedder.clone()).await);
        let before = embedder.calls.load(Ordering::SeqCst);

        let (status, json) = post(
            app,
            "/resolve",
            serde_json::json!({ "positive": "faster", "negative": "heavier", "candidates": 2 }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(embedder.calls.load(Ordering::SeqCst) - before, 2);
        assert_eq!(json["result"]["positive_match"], json["candidates"]["positive"][0]);
        assert_eq!(json["result"]["negative_match"], json["candidates"]["negative"][0]);
    }
}
