use std::{env, sync::Once};

use studydeck::{
    config,
    embedding,
    generation::{self, GenerationRequest},
    ingestion::{DecodeMethod, IngestionApi, IngestionService},
};

static INIT: Once = Once::new();

fn set_default_env(key: &str, value: &str) {
    let needs_value = env::var(key).map(|v| v.trim().is_empty()).unwrap_or(true);
    if needs_value {
        // SAFETY: Tests run serially via Once and we intentionally mutate process env.
        unsafe {
            env::set_var(key, value);
        }
    }
}

fn init_config_once() {
    INIT.call_once(|| {
        set_default_env("GENERATION_PROVIDER", "ollama");
        set_default_env("GENERATION_MODEL", "llama3.1");
        set_default_env("EMBEDDING_PROVIDER", "ollama");
        set_default_env("EMBEDDING_MODEL", "nomic-embed-text");
        set_default_env("EMBEDDING_DIMENSION", "768");
        set_default_env("OLLAMA_URL", "http://127.0.0.1:11434");
        config::init_config();
    });
}

#[tokio::test]
#[ignore = "Requires live Ollama generation"]
async fn live_generation_returns_text() {
    init_config_once();
    let config = config::get_config();
    let client = generation::get_generation_client(config).expect("generation client");
    let reply = client
        .generate(GenerationRequest {
            model: config.generation_model.clone(),
            prompt: "Reply with the single word: ready".to_string(),
            temperature: 0.0,
        })
        .await
        .expect("failed to request a completion from provider");
    assert!(!reply.trim().is_empty(), "provider returned an empty reply");
}

#[tokio::test]
#[ignore = "Requires live Ollama embeddings"]
async fn live_ollama_embedding_roundtrip() {
    init_config_once();
    let config = config::get_config();
    let client = embedding::get_embedding_client(config)
        .expect("embedding client")
        .expect("embeddings enabled");
    let vectors = client
        .generate_embeddings(vec!["studydeck live embedding".to_string()])
        .await
        .expect("failed to request embeddings from provider");
    assert_eq!(vectors.len(), 1, "expected embedding per input text");
    assert_eq!(
        vectors[0].len(),
        config.embedding_dimension,
        "embedding dimension mismatch"
    );
}

#[tokio::test]
#[ignore = "Requires live Ollama generation"]
async fn live_summary_decodes_sections() {
    init_config_once();
    let service = IngestionService::from_config(config::get_config()).expect("service");
    let text = "Photosynthesis converts light energy into chemical energy. Chlorophyll in the \
                chloroplasts absorbs light, water is split to release oxygen, and the Calvin \
                cycle fixes carbon dioxide into sugars that fuel the plant.";
    let outcome = service.summarize(text.to_string(), Some(2)).await;
    assert_ne!(
        outcome.decode,
        DecodeMethod::AbsoluteFallback,
        "no sections decoded: {outcome:?}"
    );
    assert!(outcome.sections.len() <= 2);
}
