use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use guidedb_core::config::RetrievalConfig;
use guidedb_core::types::{Chunk, Intent, QueryContext};
use guidedb_fusion::{FusionEngine, Validator};
use guidedb_lexical::LexicalIndex;
use guidedb_query::detect_language;

const DEFAULT_INDEX_PATH: &str = "guidedb_index.json";

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().collect();
    let prog = args.remove(0);
    if args.is_empty() {
        eprintln!("Usage: {prog} <build|search|validate|stats> [args...]");
        eprintln!("  build <chunks.json> [index_path]");
        eprintln!("  search \"<query>\" [index_path] [top_k] [intent]");
        eprintln!("  validate [index_path] [sample queries...]");
        eprintln!("  stats [index_path]");
        std::process::exit(1);
    }
    let cmd = args.remove(0);
    (cmd, args)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = RetrievalConfig::load().map_err(|e| {
        eprintln!("Error loading config: {e}");
        e
    })?;
    let (cmd, args) = parse_args();

    match cmd.as_str() {
        "build" => {
            let Some(chunks_path) = args.first().map(PathBuf::from) else {
                eprintln!("Usage: guidedb build <chunks.json> [index_path]");
                std::process::exit(1);
            };
            let index_path =
                args.get(1).map_or_else(|| PathBuf::from(DEFAULT_INDEX_PATH), PathBuf::from);

            let bytes = fs::read(&chunks_path)?;
            let chunks: Vec<Chunk> = serde_json::from_slice(&bytes)?;
            println!("Building index from {} ({} chunks)", chunks_path.display(), chunks.len());

            let mut index = LexicalIndex::new(&config.aliases, &config.stop_words);
            index.build(chunks);
            index.save(&index_path)?;
            println!("✅ Index saved to {}", index_path.display());
        }
        "search" => {
            let Some(query) = args.first().cloned() else {
                eprintln!("Usage: guidedb search \"<query>\" [index_path] [top_k] [intent]");
                std::process::exit(1);
            };
            let index_path =
                args.get(1).map_or_else(|| PathBuf::from(DEFAULT_INDEX_PATH), PathBuf::from);
            let top_k: usize = args.get(2).map_or(Ok(5), |s| s.parse())?;
            let intent = args.get(3).map_or(Intent::Unknown, |s| parse_intent(s));

            let index = LexicalIndex::load(&index_path, &config.aliases)?;
            let engine = FusionEngine::new(&config, Arc::new(index), None)?;
            let ctx = query_context(&query, intent);

            let response = engine.retrieve(&ctx, top_k).await?;
            println!(
                "🔍 {} results for \"{}\" ({:?}, lexical {:.2} / vector {:.2})",
                response.results.len(),
                query,
                response.metadata.fusion_method,
                response.metadata.weights.lexical,
                response.metadata.weights.vector,
            );
            for result in &response.results {
                println!(
                    "\n  {}. score={:.4}  boost={:.1}  id={}  {}",
                    result.rank, result.fused_score, result.boost, result.chunk.id, result.chunk.topic,
                );
                if !result.chunk.summary.is_empty() {
                    println!("     📝 {}", result.chunk.summary);
                }
            }
            if !response.metadata.degraded.is_empty() {
                println!("\n⚠️  Degraded sources:");
                for reason in &response.metadata.degraded {
                    println!("  - {reason}");
                }
            }
        }
        "validate" => {
            let index_path =
                args.first().map_or_else(|| PathBuf::from(DEFAULT_INDEX_PATH), PathBuf::from);
            let samples: Vec<String> = if args.len() > 1 {
                args[1..].to_vec()
            } else {
                vec![
                    "bile titan weak points".to_string(),
                    "how to kill a charger".to_string(),
                ]
            };

            let index = LexicalIndex::load(&index_path, &config.aliases)?;
            let validator = Validator::new(samples);
            let report = validator.run(&index, None);

            println!("📋 {}", report.summary());
            for check in &report.checks {
                let mark = if check.passed { "✅" } else { "❌" };
                println!("  {mark} {}: {}", check.name, check.detail);
                if let Some(fix) = &check.remediation {
                    println!("     ↳ {fix}");
                }
            }
        }
        "stats" => {
            let index_path =
                args.first().map_or_else(|| PathBuf::from(DEFAULT_INDEX_PATH), PathBuf::from);
            let index = LexicalIndex::load(&index_path, &config.aliases)?;
            println!("{}", serde_json::to_string_pretty(&index.stats())?);
        }
        _ => {
            eprintln!("Unknown command: {cmd}");
            std::process::exit(1);
        }
    }
    Ok(())
}

fn query_context(query: &str, intent: Intent) -> QueryContext {
    QueryContext {
        original_query: query.to_string(),
        rewritten_query: query.to_string(),
        bm25_query: query.to_string(),
        detected_language: detect_language(query),
        intent,
        confidence: if intent == Intent::Unknown { 0.0 } else { 1.0 },
        detected_entities: Vec::new(),
    }
}

fn parse_intent(s: &str) -> Intent {
    serde_json::from_value(serde_json::Value::String(s.to_string())).unwrap_or(Intent::Unknown)
}
