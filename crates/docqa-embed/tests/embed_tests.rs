use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use docqa_core::config::{EmbeddingProvider, EmbeddingSettings};
use docqa_core::traits::Embedder;
use docqa_core::{Error, Result};
use docqa_embed::{embed_all, get_default_embedder, HashEmbedder, OllamaEmbedder};

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[tokio::test]
async fn hash_embedder_shapes_and_determinism() {
    let settings = EmbeddingSettings { provider: EmbeddingProvider::Fake, dimension: 256, ..Default::default() };
    let embedder = get_default_embedder(&settings).expect("embedder");
    assert_eq!(embedder.dim(), 256);

    let texts = vec!["hello world".to_string(), "hello world".to_string(), "tomato blight".to_string()];
    let embs = embedder.embed_batch(&texts).await.expect("embed_batch");
    assert_eq!(embs.len(), 3);
    assert_eq!(embs[0].len(), 256);

    let norm: f32 = embs[0].iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");
    assert_eq!(embs[0], embs[1]);
    assert!(cosine(&embs[0], &embs[2]) < 0.99);
}

#[tokio::test]
async fn hash_embedder_scores_shared_words_higher() {
    let e = HashEmbedder::new(512);
    let q = e.embed("When should tomatoes be watered?").await.unwrap();
    let near = e.embed("Tomatoes should be watered early in the morning.").await.unwrap();
    let far = e.embed("Goat milk yields peak in spring.").await.unwrap();
    assert!(cosine(&q, &near) > cosine(&q, &far));
}

/// Fails every batch that contains the marker text.
struct FlakyEmbedder {
    inner: HashEmbedder,
    calls: AtomicUsize,
}

#[async_trait]
impl Embedder for FlakyEmbedder {
    fn id(&self) -> &str {
        "flaky"
    }
    fn dim(&self) -> usize {
        self.inner.dim()
    }
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if texts.iter().any(|t| t == "poison") {
            return Err(Error::EmbeddingUnavailable("connection reset".into()));
        }
        self.inner.embed_batch(texts).await
    }
}

#[tokio::test]
async fn embed_all_keeps_order_and_isolates_failed_batches() {
    let embedder = FlakyEmbedder { inner: HashEmbedder::new(32), calls: AtomicUsize::new(0) };
    let texts: Vec<String> =
        ["a", "b", "c", "poison", "e", "f", "g"].iter().map(|s| s.to_string()).collect();

    let outcomes = embed_all(&embedder, &texts, 2, 3).await;

    let ranges: Vec<_> = outcomes.iter().map(|o| o.range.clone()).collect();
    assert_eq!(ranges, vec![0..2, 2..4, 4..6, 6..7]);
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 4);
    assert!(outcomes[1].result.is_err());
    let first = outcomes[0].result.as_ref().unwrap();
    assert_eq!(first[1], embedder.inner.embed_sync("b"));
    assert_eq!(outcomes[3].result.as_ref().unwrap().len(), 1);
}

#[tokio::test]
async fn embed_all_rejects_wrong_dimension() {
    struct Short;
    #[async_trait]
    impl Embedder for Short {
        fn id(&self) -> &str {
            "short"
        }
        fn dim(&self) -> usize {
            4
        }
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }
    let outcomes = embed_all(&Short, &["x".to_string()], 8, 1).await;
    assert!(matches!(outcomes[0].result, Err(Error::Configuration(_))));
}

mod ollama {
    use super::*;
    use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};

    /// Serves `/api/embed`, answering 503 to the first `fail_first` requests.
    async fn spawn_server(fail_first: usize) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route(
                "/api/embed",
                post(|State((hits, fail_first)): State<(Arc<AtomicUsize>, usize)>, Json(body): Json<Value>| async move {
                    let n = hits.fetch_add(1, Ordering::SeqCst);
                    if n < fail_first {
                        return (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"error": "loading model"})));
                    }
                    let inputs = body["input"].as_array().cloned().unwrap_or_default();
                    let embeddings: Vec<Value> =
                        inputs.iter().enumerate().map(|(i, _)| json!([i as f32, 1.0, 0.0])).collect();
                    (StatusCode::OK, Json(json!({ "model": body["model"], "embeddings": embeddings })))
                }),
            )
            .with_state((hits.clone(), fail_first));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), hits)
    }

    fn settings(base_url: String, max_retries: u32) -> EmbeddingSettings {
        EmbeddingSettings { base_url, dimension: 3, max_retries, backoff_ms: 1, ..Default::default() }
    }

    #[tokio::test]
    async fn returns_one_vector_per_input_in_order() {
        let (url, hits) = spawn_server(0).await;
        let embedder = OllamaEmbedder::new(&settings(url, 0)).unwrap();
        let out = embedder.embed_batch(&["a".into(), "b".into()]).await.unwrap();
        assert_eq!(out, vec![vec![0.0, 1.0, 0.0], vec![1.0, 1.0, 0.0]]);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(embedder.id(), "ollama:nomic-embed-text:d3");
    }

    #[tokio::test]
    async fn retries_transient_server_errors() {
        let (url, hits) = spawn_server(2).await;
        let embedder = OllamaEmbedder::new(&settings(url, 3)).unwrap();
        let out = embedder.embed("hello").await.unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn surfaces_unavailable_after_retries() {
        let (url, hits) = spawn_server(usize::MAX).await;
        let embedder = OllamaEmbedder::new(&settings(url, 1)).unwrap();
        let err = embedder.embed("hello").await.unwrap_err();
        assert!(matches!(err, Error::EmbeddingUnavailable(_)));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unreachable_service_is_embedding_unavailable() {
        let embedder = OllamaEmbedder::new(&settings("http://127.0.0.1:9".into(), 0)).unwrap();
        assert!(matches!(embedder.embed("x").await, Err(Error::EmbeddingUnavailable(_))));
    }
}
