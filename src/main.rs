use tracing_subscriber::EnvFilter;

use doc_search::config::Config;
use doc_search::engine::RetrievalEngine;
use doc_search::models::ContextRequest;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    tracing::info!("Corpus directory: {}", config.corpus_dir.display());
    tracing::info!(
        "Embedding provider: {} ({})",
        config.embedding.provider,
        config.embedding.base_url
    );

    let engine = RetrievalEngine::new(config)?;

    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        Some("reindex") => {
            let force = args.any(|a| a == "--force");
            let report = engine.reindex(force).await?;
            println!(
                "indexed {} documents ({} chunks), {} unchanged",
                report.indexed, report.chunks, report.unchanged
            );
        }
        Some("query") => {
            let query = args
                .next()
                .ok_or_else(|| anyhow::anyhow!("usage: doc-search query <text> [--rerank] [--no-lexical]"))?;
            let rest: Vec<String> = args.collect();
            let mut req = ContextRequest::new(query);
            req.use_rerank = rest.iter().any(|a| a == "--rerank");
            req.use_lexical_prefilter = !rest.iter().any(|a| a == "--no-lexical");

            let results = engine.search(&req).await?;
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        _ => {
            eprintln!("usage: doc-search <reindex [--force] | query <text> [--rerank] [--no-lexical]>");
            std::process::exit(2);
        }
    }

    Ok(())
}
