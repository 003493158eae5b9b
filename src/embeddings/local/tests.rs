use super::*;

#[test]
fn rejects_zero_dimension() {
    assert!(matches!(LocalEmbedder::new(0), Err(RagError::Config(_))));
}

#[test]
fn vectors_have_configured_dimension() {
    let embedder = LocalEmbedder::new(64).expect("should create embedder");
    let vectors = embedder
        .embed_batch(&["GraphQL mutations".to_string()])
        .expect("should embed");

    assert_eq!(vectors.len(), 1);
    assert_eq!(vectors[0].len(), 64);
}

#[test]
fn identical_texts_embed_identically() {
    let embedder = LocalEmbedder::new(64).expect("should create embedder");
    let first = embedder
        .embed_batch(&["pagination arguments".to_string()])
        .expect("should embed");
    let second = embedder
        .embed_batch(&["pagination arguments".to_string()])
        .expect("should embed");

    assert_eq!(first, second);
}

#[test]
fn vectors_are_normalized() {
    let embedder = LocalEmbedder::new(64).expect("should create embedder");
    let vectors = embedder
        .embed_batch(&["a longer piece of text with many distinct words".to_string()])
        .expect("should embed");

    let norm: f32 = vectors[0].iter().map(|v| v * v).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() < 1e-5);
}

#[test]
fn case_and_punctuation_are_ignored() {
    let embedder = LocalEmbedder::new(64).expect("should create embedder");
    let first = embedder
        .embed_batch(&["Hello, World!".to_string()])
        .expect("should embed");
    let second = embedder
        .embed_batch(&["hello world".to_string()])
        .expect("should embed");

    assert_eq!(first, second);
}

#[test]
fn text_without_terms_embeds_to_zero_vector() {
    let embedder = LocalEmbedder::new(64).expect("should create embedder");
    let vectors = embedder
        .embed_batch(&["!!! ...".to_string()])
        .expect("should embed");

    assert!(vectors[0].iter().all(|v| *v == 0.0));
}

#[test]
fn similar_texts_score_higher_than_unrelated() {
    let embedder = LocalEmbedder::new(128).expect("should create embedder");
    let vectors = embedder
        .embed_batch(&[
            "GraphQL mutation for creating transactions".to_string(),
            "creating transactions with a GraphQL mutation".to_string(),
            "completely unrelated cooking recipe for pancakes".to_string(),
        ])
        .expect("should embed");

    let dot = |a: &[f32], b: &[f32]| -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() };
    let related = dot(&vectors[0], &vectors[1]);
    let unrelated = dot(&vectors[0], &vectors[2]);

    assert!(related > unrelated);
}
