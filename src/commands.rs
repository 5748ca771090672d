use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

use console::style;
use dialoguer::Input;
use tracing::{error, info, warn};

use crate::config::{Config, get_config_dir};
use crate::corpus;
use crate::database::lancedb::VectorStore;
use crate::database::sqlite::Database;
use crate::embeddings::ollama::OllamaClient;
use crate::generation::{CompletionClient, answer_prompt};
use crate::indexer::{ConsistencyValidator, IndexBuilder};
use crate::retrieval::RetrievalEngine;
use crate::server::{AppState, OFF_TOPIC_RESPONSE};

const QUERY_EXAMPLES: [&str; 3] = [
    "Which drug works best for depression in women aged 30 to 40?",
    "Is Prozac effective for treating anxiety along with depression?",
    "What are the best-rated drugs for men suffering from depression?",
];

fn load_config() -> Result<Config> {
    let config_dir = get_config_dir()?;
    Config::load(&config_dir).context("Failed to load configuration")
}

/// Build the vector index and metadata artifacts from a corpus file
#[inline]
pub async fn build_corpus(input: PathBuf) -> Result<()> {
    info!("Building corpus index from {}", input.display());

    let config = load_config()?;
    let records = corpus::load_records(&input)?;

    println!("Loaded {} review records from {}", records.len(), input.display());

    let mut builder = IndexBuilder::new(config.clone())
        .await
        .context("Failed to initialize index builder")?;

    let stats = builder.build(&records).await?;

    println!("Index build completed successfully!");
    println!("  Records indexed: {}", stats.records_indexed);
    println!("  Vector dimension: {}", stats.vector_dimension);
    println!("  Embedding batches: {}", stats.embedding_batches);
    println!(
        "  Metadata: {}",
        config.metadata_path().context("metadata path")?.display()
    );
    println!(
        "  Vector index: {}",
        config
            .vector_index_path()
            .context("vector index path")?
            .display()
    );

    Ok(())
}

/// Answer a single query against the built index
#[inline]
pub async fn ask(query: String, top_k: usize, show_context: bool) -> Result<()> {
    let config = load_config()?;
    let completion = CompletionClient::new(&config)?;

    let query = query.trim().to_string();
    if query.is_empty() {
        println!("Please provide a query. For example: '{}'", QUERY_EXAMPLES[0]);
        return Ok(());
    }

    if !completion.classify_relevance(&query)? {
        println!("{}", OFF_TOPIC_RESPONSE);
        println!("Examples of valid queries include:");
        for example in QUERY_EXAMPLES {
            println!("- '{}'", example);
        }
        return Ok(());
    }

    let engine = RetrievalEngine::open(&config).await?;
    let results = engine.retrieve(&query, top_k).await?;

    if show_context {
        println!("Retrieved context ({} reviews):", results.len());
        for result in &results {
            println!(
                "  [{}] distance {:.4}: {}",
                result.position, result.distance, result.combined_text
            );
        }
        println!();
    }

    let context = engine.assemble_context(&results);
    let prompt = answer_prompt(&query, &context);
    let answer = completion.complete(
        &prompt,
        config.generation.max_tokens,
        config.generation.temperature,
    )?;

    println!("{}", answer);

    Ok(())
}

/// Interactive question-answering loop
#[inline]
pub async fn chat() -> Result<()> {
    let config = load_config()?;
    let completion = CompletionClient::new(&config)?;
    let engine = RetrievalEngine::open(&config).await?;

    println!(
        "{}",
        style("Welcome to the Depression Treatment Q&A CLI!").bold().cyan()
    );
    println!("Type your query below or type 'exit' to quit.");
    println!();

    loop {
        let query: String = Input::new()
            .with_prompt("Your query (or 'exit' to quit)")
            .allow_empty(true)
            .interact_text()?;
        let query = query.trim().to_string();

        if query.eq_ignore_ascii_case("exit") {
            println!("Goodbye!");
            break;
        }

        if query.is_empty() {
            println!(
                "Please provide a query. For example: '{}'",
                QUERY_EXAMPLES[0]
            );
            println!();
            continue;
        }

        let is_related = match completion.classify_relevance(&query) {
            Ok(verdict) => verdict,
            Err(e) => {
                println!("An unexpected error occurred during query analysis: {}", e);
                println!();
                continue;
            }
        };

        if !is_related {
            println!("{}", OFF_TOPIC_RESPONSE);
            println!("Examples of valid queries include:");
            for example in QUERY_EXAMPLES {
                println!("- '{}'", example);
            }
            println!();
            continue;
        }

        match engine
            .answer(&completion, &query, crate::retrieval::DEFAULT_TOP_K)
            .await
        {
            Ok(answer) => {
                println!("Response: {}", answer);
                println!();
            }
            Err(e) => {
                println!("An unexpected error occurred: {}", e);
                println!();
            }
        }
    }

    Ok(())
}

/// Start the HTTP recommendation server
#[inline]
pub async fn serve_http(port: u16) -> Result<()> {
    let config = load_config()?;

    // Verify Ollama connectivity before starting
    match OllamaClient::new(&config) {
        Ok(client) => match client.health_check() {
            Ok(()) => {
                info!(
                    "✅ Ollama connected at {}:{} with model {}",
                    config.ollama.host, config.ollama.port, config.ollama.model
                );
            }
            Err(e) => {
                warn!("⚠️  Ollama is reachable but unhealthy: {}", e);
                println!("Warning: Ollama may not be ready. Queries may fail.");
            }
        },
        Err(e) => {
            error!("❌ Failed to connect to Ollama: {}", e);
            println!(
                "Error: Cannot connect to Ollama at {}:{}",
                config.ollama.host, config.ollama.port
            );
            println!("Please ensure Ollama is running and accessible.");
            println!("Use 'medrag config' to update connection settings.");
            return Err(e);
        }
    }

    let engine = RetrievalEngine::open(&config)
        .await
        .context("Failed to open retrieval engine")?;
    let completion = CompletionClient::new(&config)?;

    let state = Arc::new(AppState { engine, completion });

    println!("🌐 Starting HTTP server on 127.0.0.1:{}", port);
    println!("📚 Serving {} indexed reviews", state.engine.review_count());
    println!("Press Ctrl+C to stop the server");

    tokio::select! {
        result = crate::server::serve(Arc::clone(&state), port) => {
            result.context("HTTP server failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            println!("\n📴 Received interrupt signal, shutting down...");
        }
    }

    println!("✅ Shutdown complete");

    Ok(())
}

/// Show detailed status of the retrieval pipeline
#[inline]
pub async fn show_status() -> Result<()> {
    let config = load_config().unwrap_or_else(|_| Config {
        ollama: crate::config::OllamaConfig::default(),
        generation: crate::config::GenerationConfig::default(),
        base_dir: get_config_dir().unwrap_or_default(),
    });

    println!("📊 Medrag Status Report");
    println!("{}", "=".repeat(50));
    println!();

    // Metadata artifact
    println!("🗄️  Metadata Status:");
    let metadata_path = config.metadata_path().context("metadata path")?;
    let database = match Database::open_existing(&metadata_path).await {
        Ok(db) => {
            println!("   ✅ SQLite: Connected ({})", metadata_path.display());
            Some(db)
        }
        Err(e) => {
            println!("   ❌ SQLite: {:#}", e);
            println!("   💡 Run 'medrag build <corpus>' to create the artifacts");
            None
        }
    };

    // Ollama connectivity
    println!("🤖 Ollama Status:");
    match OllamaClient::new(&config) {
        Ok(client) => match client.health_check() {
            Ok(()) => {
                println!(
                    "   ✅ Ollama: Connected ({}:{})",
                    config.ollama.host, config.ollama.port
                );
                println!("   📋 Model: {}", config.ollama.model);
                println!("   🔢 Batch Size: {}", config.ollama.batch_size);
            }
            Err(e) => {
                println!("   ⚠️  Ollama: Connected but unhealthy - {}", e);
            }
        },
        Err(e) => {
            println!("   ❌ Ollama: Failed to connect - {}", e);
        }
    }

    // Vector index
    println!("🔍 Vector Index Status:");
    let index_path = config.vector_index_path().context("vector index path")?;
    let vector_store = match VectorStore::open(&index_path).await {
        Ok(store) => {
            println!("   ✅ LanceDB: Connected ({})", index_path.display());
            if let Some(dimension) = store.dimension() {
                println!("   📐 Dimension: {}", dimension);
            }
            Some(store)
        }
        Err(e) => {
            println!("   ❌ LanceDB: {}", e);
            None
        }
    };

    if let (Some(database), Some(vector_store)) = (database, vector_store) {
        println!();
        println!("🔍 Artifact Consistency:");
        let validator = ConsistencyValidator::new(&database, &vector_store);
        match validator.validate().await {
            Ok(report) => {
                if report.is_consistent {
                    println!("   ✅ Artifacts are consistent");
                    println!("   📊 Metadata rows: {}", report.metadata_rows);
                    println!("   📊 Index vectors: {}", report.index_vectors);
                    if let Some(model) = &report.manifest_model {
                        println!("   🏷️  Built with model: {}", model);
                    }
                } else {
                    println!("   ⚠️  Consistency issues found:");
                    println!("   📊 Metadata rows: {}", report.metadata_rows);
                    println!("   📊 Index vectors: {}", report.index_vectors);
                    for issue in &report.issues {
                        println!("   🚫 {}", issue);
                    }
                }
            }
            Err(e) => {
                println!("   ❌ Failed to check consistency: {:#}", e);
            }
        }
    }

    println!();
    println!("💡 Next Steps:");
    println!("   • Use 'medrag build <corpus>' to index a review corpus");
    println!("   • Use 'medrag ask \"<question>\"' for a one-shot answer");
    println!("   • Use 'medrag chat' for an interactive session");
    println!("   • Use 'medrag serve' to start the HTTP server");

    Ok(())
}
