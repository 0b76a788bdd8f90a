use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use docqa_core::config::GenerationSettings;
use docqa_core::traits::Generator;
use docqa_core::Error;
use docqa_engine::OllamaGenerator;

#[derive(Clone, Default)]
struct Seen {
    hits: Arc<AtomicUsize>,
    bodies: Arc<Mutex<Vec<Value>>>,
}

async fn spawn_server(fail_first: usize) -> (String, Seen) {
    let seen = Seen::default();
    let app = Router::new()
        .route(
            "/api/generate",
            post(move |State(seen): State<Seen>, Json(body): Json<Value>| async move {
                let n = seen.hits.fetch_add(1, Ordering::SeqCst);
                seen.bodies.lock().unwrap().push(body);
                if n < fail_first {
                    return (StatusCode::BAD_GATEWAY, Json(json!({"error": "busy"})));
                }
                (StatusCode::OK, Json(json!({"model": "llama3.1", "response": "Plant in autumn.", "done": true})))
            }),
        )
        .with_state(seen.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), seen)
}

fn settings(base_url: String, max_retries: u32) -> GenerationSettings {
    GenerationSettings { base_url, max_retries, backoff_ms: 1, ..Default::default() }
}

#[tokio::test]
async fn sends_non_streaming_request_with_temperature() {
    let (url, seen) = spawn_server(0).await;
    let generator = OllamaGenerator::new(&settings(url, 0)).unwrap();
    assert_eq!(generator.generate("PROMPT").await.unwrap(), "Plant in autumn.");

    let body = seen.bodies.lock().unwrap()[0].clone();
    assert_eq!(body["model"], "llama3.1");
    assert_eq!(body["prompt"], "PROMPT");
    assert_eq!(body["stream"], false);
    assert!((body["options"]["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
}

#[tokio::test]
async fn retries_then_surfaces_generation_unavailable() {
    let (url, seen) = spawn_server(1).await;
    let generator = OllamaGenerator::new(&settings(url, 2)).unwrap();
    assert!(generator.generate("p").await.is_ok());
    assert_eq!(seen.hits.load(Ordering::SeqCst), 2);

    let (url, seen) = spawn_server(usize::MAX).await;
    let generator = OllamaGenerator::new(&settings(url, 2)).unwrap();
    assert!(matches!(generator.generate("p").await, Err(Error::GenerationUnavailable(_))));
    assert_eq!(seen.hits.load(Ordering::SeqCst), 3);
}
