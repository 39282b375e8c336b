use medbook_core::traits::Embedder;
use medbook_embed::{default_embedder, HashingEmbedder, EMBEDDING_DIM};

#[test]
fn hashing_embedder_shape_norm_and_determinism() {
    let embedder = HashingEmbedder::new(EMBEDDING_DIM);
    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embeddings = embedder.embed_batch(&texts).expect("embed_batch");
    let v1 = &embeddings[0];
    let v2 = &embeddings[1];

    assert_eq!(v1.len(), EMBEDDING_DIM);

    // Norm approximately 1.0
    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    // Deterministic for same input
    for (a, b) in v1.iter().zip(v2.iter()) {
        assert!((a - b).abs() <= 1e-6);
    }
}

#[test]
fn hashing_embedder_ignores_case_and_punctuation() {
    let embedder = HashingEmbedder::new(EMBEDDING_DIM);
    let embeddings = embedder
        .embed_batch(&["Metformin.".to_string(), "metformin".to_string()])
        .expect("embed_batch");
    assert_eq!(embeddings[0], embeddings[1]);
}

#[test]
fn shared_terms_score_higher_than_disjoint_ones() {
    let embedder = HashingEmbedder::new(EMBEDDING_DIM);
    let embeddings = embedder
        .embed_batch(&[
            "metformin side effects".to_string(),
            "metformin commonly causes stomach upset".to_string(),
            "penicillin treats bacterial infections".to_string(),
        ])
        .expect("embed_batch");

    let related = cosine(&embeddings[0], &embeddings[1]);
    let unrelated = cosine(&embeddings[0], &embeddings[2]);
    assert!(
        related > unrelated,
        "overlapping vocabulary should raise similarity ({related} vs {unrelated})"
    );
}

#[test]
fn default_embedder_honors_fake_switch() {
    std::env::set_var("APP_USE_FAKE_EMBEDDINGS", "1");
    let embedder = default_embedder("BAAI/bge-small-en-v1.5").expect("embedder");
    assert_eq!(embedder.dim(), EMBEDDING_DIM);
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
