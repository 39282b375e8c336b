use std::io::{self, BufRead, Write};
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

    let config = RagConfig::load().map_err(|e| {
        eprintln!("Error loading config: {e}");
        e
    })?;

    println!("medbook-chat\n============");
    println!("Corpus: {}", config.data_dir().display());

    let documents = DocumentLoader::new(config.data_dir()).load()?;
    let documents = TextNormalizer::new().normalize(documents);
    let chunks = Chunker::new(config.chunk_size, config.chunk_overlap)?.split(&documents);

    let embedder: Arc<dyn Embedder> = Arc::from(default_embedder(&config.embedding_model)?);
    let store = IndexStore::connect(config.persist_dir(), &config.collection_name).await?;
    let index = store.build_or_load(&chunks, embedder).await?;

    // Constructed once; every turn below borrows the same pipeline.
    let pipeline = hf_pipeline(index, &config.repo_id, config.top_k, config.max_context_chars)?;

    // The session transcript lives here, in the caller. The pipeline itself
    // has no memory of prior turns.
    let mut transcript: Vec<(&str, String)> = Vec::new();

    println!("Ask about the reference corpus. Commands: /history, /quit\n");
    let stdin = io::stdin();
    loop {
        print!("you> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        match question {
            "/quit" | "/exit" => break,
            "/history" => {
                for (role, text) in &transcript {
                    println!("  {role}: {text}");
                }
                continue;
            }
            _ => {}
        }

        match pipeline.answer(question).await {
            Ok(answer) => {
                transcript.push(("user", question.to_string()));
                transcript.push(("assistant", answer.text.clone()));
                println!("medbook> {}", answer.text);
                for (i, source) in answer.sources.iter().enumerate() {
                    println!(
                        "    [{}] {}: {}",
                        i + 1,
                        source.source(),
                        source.content.chars().take(60).collect::<String>()
                    );
                }
            }
            Err(e) => eprintln!("error: {e}"),
        }
    }

    println!("Ended after {} turns.", transcript.len() / 2);
    Ok(())
}
