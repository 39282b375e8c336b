use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use medbook_core::chunker::Chunker;
use medbook_core::config::RagConfig;
use medbook_core::loader::DocumentLoader;
use medbook_core::normalize::TextNormalizer;
use medbook_core::traits::Embedder;
use medbook_embed::default_embedder;
use medbook_index::IndexStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = RagConfig::load().map_err(|e| {
        eprintln!("Error loading config: {e}");
        e
    })?;
    let args: Vec<String> = env::args().skip(1).collect();
    let data_dir = args
        .first()
        .map(PathBuf::from)
        .unwrap_or_else(|| config.data_dir());

    println!("medbook-indexer\n===============");
    println!("Data directory: {}", data_dir.display());
    println!("Persist directory: {}", config.persist_dir().display());
    println!("Collection: {}", config.collection_name);

    let documents = DocumentLoader::new(&data_dir).load()?;
    let documents = TextNormalizer::new().normalize(documents);
    let chunker = Chunker::new(config.chunk_size, config.chunk_overlap)?;
    let chunks = chunker.split(&documents);
    println!(
        "Prepared {} chunks from {} documents (size={}, overlap={})",
        chunks.len(),
        documents.len(),
        config.chunk_size,
        config.chunk_overlap
    );

    let embedder: Arc<dyn Embedder> = Arc::from(default_embedder(&config.embedding_model)?);
    let store = IndexStore::connect(config.persist_dir(), &config.collection_name).await?;
    let was_present = store.try_open_existing(embedder.clone()).await.is_some();
    let index = store.build_or_load(&chunks, embedder).await?;
    let stored = index.count().await?;

    if was_present {
        println!("Reused existing collection '{}' ({stored} chunks stored)", config.collection_name);
        println!("Delete {} to force a rebuild with fresh chunks.", config.persist_dir().display());
    } else {
        println!("Built collection '{}' ({stored} chunks stored)", config.collection_name);
    }
    Ok(())
}
