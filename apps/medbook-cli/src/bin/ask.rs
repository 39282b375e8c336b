use std::env;
use std::sync::Arc;

use medbook_core::chunker::Chunker;
use medbook_core::config::RagConfig;
use medbook_core::loader::DocumentLoader;
use medbook_core::normalize::TextNormalizer;
use medbook_core::traits::Embedder;
use medbook_embed::default_embedder;
use medbook_index::IndexStore;
use medbook_pipeline::hf_pipeline;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} \"<question>\"", args[0]);
        eprintln!("Example: {} \"What are common side effects of metformin?\"", args[0]);
        std::process::exit(1);
    }
    let question = &args[1];

    let config = RagConfig::load().map_err(|e| {
        eprintln!("Error loading config: {e}");
        e
    })?;

    let documents = DocumentLoader::new(config.data_dir()).load()?;
    let documents = TextNormalizer::new().normalize(documents);
    let chunks = Chunker::new(config.chunk_size, config.chunk_overlap)?.split(&documents);

    let embedder: Arc<dyn Embedder> = Arc::from(default_embedder(&config.embedding_model)?);
    let store = IndexStore::connect(config.persist_dir(), &config.collection_name).await?;
    let index = store.build_or_load(&chunks, embedder).await?;

    let pipeline = hf_pipeline(index, &config.repo_id, config.top_k, config.max_context_chars)?;
    let answer = pipeline.answer(question).await?;

    println!("\nAnswer:\n{}", answer.text);
    println!("\nSources:");
    for (i, source) in answer.sources.iter().enumerate() {
        println!(
            "  {}. [{}] score={:.4} {}",
            i + 1,
            source.source(),
            source.score,
            source.content.chars().take(80).collect::<String>()
        );
    }
    Ok(())
}
