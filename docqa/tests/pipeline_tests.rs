//! End-to-end question answering through the pipeline.

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use common::{
    FailingModel, FlakyStore, HashEmbedder, PanickingModel, ScriptedModel, test_config, write_file,
};
use docqa::pipeline::{INVALID_QUESTION_ANSWER, UNEXPECTED_ERROR_ANSWER};
use docqa::synthesis::{GENERATION_FAILED_ANSWER, NO_CONTEXT_ANSWER};
use docqa::{
    AnswerOutcome, FileStatus, Health, InMemoryVectorStore, LanguageModel, RagError, RagPipeline,
    VectorStore,
};

const SUPPLIERS_CSV: &str = "supplier,city,product\nAcme Corp,Dayton,bolts\nGlobex Inc,Austin,nuts\n";
const NOTES: &str = "Acme Corp delivers bolts every Tuesday.\n\nGlobex Inc invoices net 30.";

async fn pipeline(
    embedder: Arc<HashEmbedder>,
    store: Arc<dyn VectorStore>,
    model: Arc<dyn LanguageModel>,
) -> RagPipeline {
    RagPipeline::builder()
        .config(test_config())
        .embedding_provider(embedder)
        .vector_store(store)
        .language_model(model)
        .build()
        .await
        .unwrap()
}

async fn loaded_pipeline(model: Arc<dyn LanguageModel>) -> (RagPipeline, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let csv = write_file(dir.path(), "suppliers.csv", SUPPLIERS_CSV);
    let notes = write_file(dir.path(), "notes.txt", NOTES);
    let pipeline =
        pipeline(Arc::new(HashEmbedder::new()), Arc::new(InMemoryVectorStore::new()), model).await;
    let results = pipeline.ingest(&[csv, notes]).await;
    assert!(results.iter().all(|r| r.status == FileStatus::Success));
    (pipeline, dir)
}

#[tokio::test]
async fn blank_question_makes_no_calls() {
    let embedder = Arc::new(HashEmbedder::new());
    let model = Arc::new(ScriptedModel::new("unused"));
    let pipeline =
        pipeline(Arc::clone(&embedder), Arc::new(InMemoryVectorStore::new()), model.clone()).await;

    for question in ["", "   ", "\n\t"] {
        let answer = pipeline.answer(question).await;
        assert_eq!(answer.text, INVALID_QUESTION_ANSWER);
        assert_eq!(answer.processing_time, 0.0);
        assert!(answer.sources.is_empty());
        assert_eq!(answer.documents_used, 0);
        assert_eq!(answer.outcome, AnswerOutcome::InvalidQuestion);
    }
    assert_eq!(model.calls(), 0);
    assert_eq!(embedder.embed_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn empty_index_answers_with_no_context_text() {
    let model = Arc::new(ScriptedModel::new("unused"));
    let pipeline =
        pipeline(Arc::new(HashEmbedder::new()), Arc::new(InMemoryVectorStore::new()), model.clone())
            .await;

    let answer = pipeline.answer("Who ships bolts?").await;

    assert_eq!(answer.text, NO_CONTEXT_ANSWER);
    assert_eq!(answer.outcome, AnswerOutcome::NoContext);
    assert!(answer.sources.is_empty());
    assert_eq!(answer.documents_used, 0);
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn answers_from_multiple_sources() {
    let model = Arc::new(ScriptedModel::new("  Acme Corp ships bolts from Dayton.\n"));
    let (pipeline, _dir) = loaded_pipeline(model.clone()).await;

    let answer = pipeline.query("Which supplier ships bolts?").await;

    assert_eq!(answer.outcome, AnswerOutcome::Answered);
    assert_eq!(answer.text, "Acme Corp ships bolts from Dayton.");
    assert!(answer.documents_used > 0);
    assert!(!answer.sources.is_empty());
    let unique: std::collections::HashSet<&String> = answer.sources.iter().collect();
    assert_eq!(unique.len(), answer.sources.len());
    assert!(answer.processing_time >= 0.0);

    let prompt = model.last_prompt().unwrap();
    assert!(prompt.contains("QUESTION: Which supplier ships bolts?"));
    for source in &answer.sources {
        assert!(prompt.contains(&format!("FROM {source}:")));
    }
    let params = model.params.lock().unwrap()[0];
    assert_eq!(params.temperature, 0.1);
    assert_eq!(params.max_output_tokens, 1500);
}

#[tokio::test]
async fn generation_failure_returns_the_apology() {
    let model = Arc::new(FailingModel::default());
    let (pipeline, _dir) = loaded_pipeline(model.clone()).await;

    let answer = pipeline.answer("Which supplier ships bolts?").await;

    assert_eq!(answer.text, GENERATION_FAILED_ANSWER);
    assert_eq!(answer.outcome, AnswerOutcome::GenerationFailed);
    assert!(answer.documents_used > 0);
    assert_eq!(model.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn panicking_component_is_contained() {
    let (pipeline, _dir) = loaded_pipeline(Arc::new(PanickingModel)).await;

    let answer = pipeline.answer("Which supplier ships bolts?").await;

    assert_eq!(answer.text, UNEXPECTED_ERROR_ANSWER);
    assert_eq!(answer.outcome, AnswerOutcome::Failed);
    assert!(answer.sources.is_empty());
    assert_eq!(answer.documents_used, 0);
}

#[tokio::test]
async fn backend_failure_is_reported_as_degraded() {
    let dir = tempfile::tempdir().unwrap();
    let notes = write_file(dir.path(), "notes.txt", NOTES);
    let store = Arc::new(FlakyStore::new());
    let model = Arc::new(ScriptedModel::new("unused"));
    let pipeline = pipeline(Arc::new(HashEmbedder::new()), store.clone(), model.clone()).await;
    pipeline.ingest(&[notes]).await;
    store.fail_reads.store(true, Ordering::SeqCst);

    let answer = pipeline.answer("Who invoices net 30?").await;
    let status = pipeline.status().await;

    assert_eq!(answer.text, NO_CONTEXT_ANSWER);
    assert_eq!(answer.outcome, AnswerOutcome::RetrievalDegraded);
    assert_eq!(model.calls(), 0);
    assert_eq!(status.status, Health::Error);
}

#[tokio::test]
async fn reset_and_ingest_replaces_the_corpus() {
    let model = Arc::new(ScriptedModel::new("ok"));
    let (pipeline, dir) = loaded_pipeline(model).await;
    let replacement = write_file(dir.path(), "replacement.md", "Initech sells staplers.");

    let results = pipeline.reset_and_ingest(&[replacement]).await.unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].chunks_created, 1);
    let status = pipeline.status().await;
    assert_eq!(status.status, Health::Healthy);
    assert_eq!(status.document_count, 1);

    let answer = pipeline.answer("Who sells staplers?").await;
    assert_eq!(answer.sources, vec!["replacement.md".to_string()]);
}

#[tokio::test]
async fn answer_serializes_with_service_field_names() {
    let (pipeline, _dir) = loaded_pipeline(Arc::new(ScriptedModel::new("Dayton."))).await;

    let answer = pipeline.answer("Where is Acme?").await;
    let json = serde_json::to_value(&answer).unwrap();

    assert_eq!(json["answer"], "Dayton.");
    assert!(json["sources"].is_array());
    assert!(json["processing_time"].is_number());
    assert!(json["documents_used"].is_number());
    assert_eq!(json["outcome"], "answered");
}

#[tokio::test]
async fn builder_requires_a_language_model() {
    let result = RagPipeline::builder()
        .config(test_config())
        .embedding_provider(Arc::new(HashEmbedder::new()))
        .vector_store(Arc::new(InMemoryVectorStore::new()))
        .build()
        .await;

    assert!(matches!(result, Err(RagError::ConfigError(_))));
}
