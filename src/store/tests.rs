use super::*;
use crate::chunking::{Chunk, ChunkMetadata};
use crate::tokens::estimate_tokens;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn chunk(document_id: &str, index: usize, text: &str, doc_type: DocumentType) -> Chunk {
    Chunk {
        chunk_text: text.to_string(),
        chunk_index: index,
        source: format!("{document_id}.md"),
        token_count: estimate_tokens(text),
        metadata: ChunkMetadata {
            document_id: document_id.to_string(),
            section: None,
            doc_type,
        },
    }
}

fn doc_chunk(text: &str) -> Chunk {
    chunk("doc", 0, text, DocumentType::Markdown)
}

#[test]
fn cosine_of_identical_vectors_is_one() {
    let v = vec![0.3, -0.2, 0.8, 0.1];
    assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
}

#[test]
fn cosine_of_opposite_vectors_is_minus_one() {
    let a = vec![0.5, 0.5];
    let b = vec![-0.5, -0.5];
    assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-6);
}

#[test]
fn cosine_of_orthogonal_vectors_is_zero() {
    let a = vec![1.0, 0.0];
    let b = vec![0.0, 1.0];
    assert!(cosine_similarity(&a, &b).abs() < 1e-6);
}

#[test]
fn cosine_of_zero_vector_is_zero_not_nan() {
    let a = vec![0.0, 0.0];
    let b = vec![1.0, 1.0];
    let score = cosine_similarity(&a, &b);
    assert_eq!(score, 0.0);
    assert!(!score.is_nan());
}

#[tokio::test]
async fn store_then_search_round_trips() {
    let store = VectorStore::in_memory(4);
    let embedding = vec![0.1, 0.7, 0.3, 0.2];

    let id = store
        .store_chunk(doc_chunk("round trip"), embedding.clone())
        .await
        .expect("should store chunk");

    let result = store
        .search_similar(&embedding, 5, None, &SearchFilter::default())
        .await
        .expect("should search");

    assert_eq!(result.chunks.len(), 1);
    assert_eq!(result.chunks[0].id, id);
    assert!((result.scores[0] - 1.0).abs() < 1e-5);
    assert_eq!(result.query_embedding, embedding);
}

#[tokio::test]
async fn results_are_sorted_descending() {
    let store = VectorStore::in_memory(2);
    store
        .store_chunk(doc_chunk("far"), vec![0.0, 1.0])
        .await
        .expect("should store");
    store
        .store_chunk(doc_chunk("near"), vec![1.0, 0.1])
        .await
        .expect("should store");
    store
        .store_chunk(doc_chunk("middle"), vec![0.6, 0.6])
        .await
        .expect("should store");

    let result = store
        .search_similar(&[1.0, 0.0], 10, None, &SearchFilter::default())
        .await
        .expect("should search");

    let texts: Vec<_> = result
        .chunks
        .iter()
        .map(|c| c.chunk.chunk_text.as_str())
        .collect();
    assert_eq!(texts, vec!["near", "middle", "far"]);
    assert!(result.scores.windows(2).all(|w| w[0] >= w[1]));
}

#[tokio::test]
async fn ties_keep_insertion_order() {
    let store = VectorStore::in_memory(2);
    for label in ["first", "second", "third"] {
        store
            .store_chunk(doc_chunk(label), vec![1.0, 0.0])
            .await
            .expect("should store");
    }

    for _ in 0..3 {
        let result = store
            .search_similar(&[1.0, 0.0], 10, None, &SearchFilter::default())
            .await
            .expect("should search");
        let texts: Vec<_> = result
            .chunks
            .iter()
            .map(|c| c.chunk.chunk_text.as_str())
            .collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }
}

#[tokio::test]
async fn search_respects_limit() {
    let store = VectorStore::in_memory(2);
    for i in 0..10 {
        store
            .store_chunk(doc_chunk(&format!("chunk {i}")), vec![1.0, 0.0])
            .await
            .expect("should store");
    }

    let result = store
        .search_similar(&[1.0, 0.0], 3, None, &SearchFilter::default())
        .await
        .expect("should search");
    assert_eq!(result.chunks.len(), 3);
    assert_eq!(result.scores.len(), 3);
}

#[tokio::test]
async fn chunks_below_threshold_are_dropped_entirely() {
    let store = VectorStore::in_memory(2);
    store
        .store_chunk(doc_chunk("aligned"), vec![1.0, 0.0])
        .await
        .expect("should store");
    store
        .store_chunk(doc_chunk("orthogonal"), vec![0.0, 1.0])
        .await
        .expect("should store");

    let result = store
        .search_similar(&[1.0, 0.0], 10, Some(0.5), &SearchFilter::default())
        .await
        .expect("should search");

    assert_eq!(result.chunks.len(), 1);
    assert_eq!(result.chunks[0].chunk.chunk_text, "aligned");
}

#[tokio::test]
async fn zero_norm_embeddings_are_excluded_from_search() {
    let store = VectorStore::in_memory(2);
    store
        .store_chunk(doc_chunk("dead"), vec![0.0, 0.0])
        .await
        .expect("should store");
    store
        .store_chunk(doc_chunk("alive"), vec![1.0, 0.0])
        .await
        .expect("should store");

    let result = store
        .search_similar(&[1.0, 0.0], 10, None, &SearchFilter::default())
        .await
        .expect("should search");

    assert_eq!(result.chunks.len(), 1);
    assert_eq!(result.chunks[0].chunk.chunk_text, "alive");
    assert!(result.scores.iter().all(|s| !s.is_nan()));
}

#[tokio::test]
async fn store_rejects_wrong_dimension() {
    let store = VectorStore::in_memory(4);
    let result = store.store_chunk(doc_chunk("bad"), vec![1.0, 0.0]).await;

    assert!(matches!(
        result,
        Err(RagError::DimensionMismatch {
            expected: 4,
            actual: 2
        })
    ));
}

#[tokio::test]
async fn search_rejects_wrong_dimension() {
    let store = VectorStore::in_memory(4);
    let result = store
        .search_similar(&[1.0, 0.0], 5, None, &SearchFilter::default())
        .await;

    assert!(matches!(
        result,
        Err(RagError::DimensionMismatch {
            expected: 4,
            actual: 2
        })
    ));
}

#[tokio::test]
async fn type_filter_narrows_results() {
    let store = VectorStore::in_memory(2);
    store
        .store_chunk(
            chunk("schema", 0, "type Query", DocumentType::Schema),
            vec![1.0, 0.0],
        )
        .await
        .expect("should store");
    store
        .store_chunk(
            chunk("guide", 0, "how to query", DocumentType::Markdown),
            vec![1.0, 0.0],
        )
        .await
        .expect("should store");

    let only_schema = SearchFilter {
        types: TypeFilter::Only(DocumentType::Schema),
        source: None,
    };
    let result = store
        .search_similar(&[1.0, 0.0], 10, None, &only_schema)
        .await
        .expect("should search");
    assert_eq!(result.chunks.len(), 1);
    assert_eq!(result.chunks[0].chunk.metadata.doc_type, DocumentType::Schema);

    let excluding_schema = SearchFilter {
        types: TypeFilter::Excluding(DocumentType::Schema),
        source: None,
    };
    let result = store
        .search_similar(&[1.0, 0.0], 10, None, &excluding_schema)
        .await
        .expect("should search");
    assert_eq!(result.chunks.len(), 1);
    assert_eq!(
        result.chunks[0].chunk.metadata.doc_type,
        DocumentType::Markdown
    );
}

#[tokio::test]
async fn source_filter_narrows_results() {
    let store = VectorStore::in_memory(2);
    store
        .store_chunk(chunk("a", 0, "from a", DocumentType::Text), vec![1.0, 0.0])
        .await
        .expect("should store");
    store
        .store_chunk(chunk("b", 0, "from b", DocumentType::Text), vec![1.0, 0.0])
        .await
        .expect("should store");

    let filter = SearchFilter {
        types: TypeFilter::Any,
        source: Some("a.md".to_string()),
    };
    let result = store
        .search_similar(&[1.0, 0.0], 10, None, &filter)
        .await
        .expect("should search");

    assert_eq!(result.chunks.len(), 1);
    assert_eq!(result.chunks[0].chunk.chunk_text, "from a");
}

#[tokio::test]
async fn get_all_chunks_respects_limit() {
    let store = VectorStore::in_memory(2);
    for i in 0..5 {
        store
            .store_chunk(doc_chunk(&format!("chunk {i}")), vec![1.0, 0.0])
            .await
            .expect("should store");
    }

    let all = store.get_all_chunks(None).await.expect("should fetch");
    assert_eq!(all.len(), 5);

    let limited = store.get_all_chunks(Some(2)).await.expect("should fetch");
    assert_eq!(limited.len(), 2);

    assert_eq!(store.count().await.expect("should count"), 5);
}

#[tokio::test]
async fn memory_store_tolerates_concurrent_appends() {
    let store = VectorStore::in_memory(2);

    let mut handles = Vec::new();
    for i in 0..16 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .store_chunk(doc_chunk(&format!("concurrent {i}")), vec![1.0, 0.0])
                .await
        }));
    }
    for handle in handles {
        handle
            .await
            .expect("task should not panic")
            .expect("store should succeed");
    }

    assert_eq!(store.count().await.expect("should count"), 16);
    assert!(store.health_check().await);
}

#[tokio::test]
async fn store_ids_are_unique() {
    let store = VectorStore::in_memory(2);
    let first = store
        .store_chunk(doc_chunk("one"), vec![1.0, 0.0])
        .await
        .expect("should store");
    let second = store
        .store_chunk(doc_chunk("one"), vec![1.0, 0.0])
        .await
        .expect("should store");

    assert_ne!(first, second);
}

// HTTP backend tests drive the blocking client against a mock server, so
// they need the multi-threaded runtime.

fn stored_chunk_json(id: &str, text: &str, embedding: &[f32]) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "chunk": {
            "chunk_text": text,
            "chunk_index": 0,
            "source": "doc.md",
            "token_count": 2,
            "metadata": {
                "document_id": "doc",
                "section": null,
                "doc_type": "markdown"
            }
        },
        "embedding": embedding,
        "stored_at": "2025-01-01T00:00:00Z"
    })
}

#[tokio::test(flavor = "multi_thread")]
async fn http_backend_commits_chunks() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chunks"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let backend = HttpBackend::new(&server.uri()).expect("should create backend");
    let store = VectorStore::new(Arc::new(backend), 2);

    store
        .store_chunk(doc_chunk("remote"), vec![1.0, 0.0])
        .await
        .expect("should store via http");
}

#[tokio::test(flavor = "multi_thread")]
async fn http_backend_fetches_and_ranks() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/chunks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            stored_chunk_json("id-1", "far", &[0.0, 1.0]),
            stored_chunk_json("id-2", "near", &[1.0, 0.0]),
        ])))
        .mount(&server)
        .await;

    let backend = HttpBackend::new(&server.uri()).expect("should create backend");
    let store = VectorStore::new(Arc::new(backend), 2);

    let result = store
        .search_similar(&[1.0, 0.0], 10, None, &SearchFilter::default())
        .await
        .expect("should search via http");

    assert_eq!(result.chunks.len(), 2);
    assert_eq!(result.chunks[0].id, "id-2");
}

#[tokio::test(flavor = "multi_thread")]
async fn http_backend_reports_unreachable_store() {
    // point at a closed port
    let backend = HttpBackend::new("http://127.0.0.1:9").expect("should create backend");
    let store = VectorStore::new(Arc::new(backend), 2);

    let result = store.store_chunk(doc_chunk("lost"), vec![1.0, 0.0]).await;
    assert!(matches!(result, Err(RagError::BackendUnavailable(_))));
    assert!(!store.health_check().await);
}

#[tokio::test(flavor = "multi_thread")]
async fn http_backend_health_reflects_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let backend = HttpBackend::new(&server.uri()).expect("should create backend");
    let store = VectorStore::new(Arc::new(backend), 2);
    assert!(store.health_check().await);
}

#[test]
fn http_backend_rejects_invalid_endpoint() {
    assert!(matches!(
        HttpBackend::new("not a url"),
        Err(RagError::Config(_))
    ));
}
