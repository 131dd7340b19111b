use pdfqa::{
    completion::{CompletionClient, OpenAiCompletionClient},
    config::{self, OpenAiSettings},
    embedding::{EmbeddingClient, OpenAiEmbeddingClient},
    github::{ContentsApi, GitHubClient},
};

fn openai_settings() -> OpenAiSettings {
    dotenvy::dotenv().ok();
    OpenAiSettings::from_env().expect("OPENAI_API_KEY must be set for live tests")
}

#[tokio::test]
#[ignore = "Requires live OpenAI embeddings"]
async fn live_openai_embedding_roundtrip() {
    let client = OpenAiEmbeddingClient::new(&openai_settings()).expect("client");
    let vectors = client
        .generate_embeddings(vec![
            "pdfqa live embedding".to_string(),
            "second input".to_string(),
        ])
        .await
        .expect("failed to request embeddings from provider");
    assert_eq!(vectors.len(), 2, "expected embedding per input chunk");
    assert!(!vectors[0].is_empty());
    assert_eq!(vectors[0].len(), vectors[1].len(), "embedding dimension mismatch");
}

#[tokio::test]
#[ignore = "Requires live OpenAI chat completions"]
async fn live_openai_completion_answers() {
    let client = OpenAiCompletionClient::new(&openai_settings()).expect("client");
    let answer = client
        .complete("Reply with the single word: ready")
        .await
        .expect("completion");
    assert!(!answer.trim().is_empty());
}

#[tokio::test]
#[ignore = "Requires a GitHub token and repository"]
async fn live_github_repository_is_reachable() {
    let config = config::load().expect("full configuration must be set for live tests");
    let client = GitHubClient::new(&config.github).expect("client");
    client.ensure_repository().await.expect("repository");
    let entries = client.list_directory("").await.expect("root listing");
    assert!(entries.iter().all(|entry| !entry.path.is_empty()));
}
