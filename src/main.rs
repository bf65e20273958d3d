//! Swatch operator CLI.

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use mimalloc::MiMalloc;

use swatch::config::Config;
use swatch::retrieval::{RetrievalEngine, RetrievalQuery};
use swatch::storage::npy;
use swatch::store::EmbeddingStore;
use swatch::verifier::{VerifierConfig, VerifierPayload};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const USAGE: &str = "\
usage:
  swatch query <vector.npy> [--top-k N] [--top-c N] [--brute-force] [--lang L] [--image PATH]
  swatch inspect
  swatch build-centroids";

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Query(QueryArgs),
    Inspect,
    BuildCentroids,
    Help,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct QueryArgs {
    vector: PathBuf,
    top_k: Option<usize>,
    top_c: Option<usize>,
    brute_force: bool,
    lang: Option<String>,
    image: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let command = parse_args(std::env::args().skip(1))?;
    if command == Command::Help {
        println!("{USAGE}");
        return Ok(());
    }

    let config = Config::from_env()?;
    config.validate()?;

    match command {
        Command::Query(args) => run_query(&config, args).await,
        Command::Inspect => {
            let store = EmbeddingStore::new(config.store_paths(), config.store_options());
            println!("{}", serde_json::to_string_pretty(&store.stats()?)?);
            Ok(())
        }
        Command::BuildCentroids => {
            let store = EmbeddingStore::new(config.store_paths(), config.store_options());
            let written = store.rebuild_centroids()?;
            tracing::info!(
                classes = written,
                path = %config.centroids_path.display(),
                "Centroids rebuilt"
            );
            println!("{written}");
            Ok(())
        }
        Command::Help => Ok(()),
    }
}

async fn run_query(config: &Config, args: QueryArgs) -> anyhow::Result<()> {
    let vector = read_query_vector(&args.vector)?;
    let verifier_config = VerifierConfig::from_env()?;
    let engine = RetrievalEngine::from_config(config, &verifier_config)?;

    let mut query = RetrievalQuery::new(vector);
    if let Some(top_k) = args.top_k {
        query = query.top_k(top_k);
    }
    if let Some(top_c) = args.top_c {
        query = query.top_c(top_c);
    }
    if args.brute_force {
        query = query.accelerate(false);
    }
    if let Some(lang) = args.lang {
        query = query.lang(lang);
    }
    if let Some(path) = &args.image {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read image {}", path.display()))?;
        query = query.with_image(VerifierPayload::new(bytes, mime_for(path)));
    }

    let (result, meta) = engine.retrieve(query).await?;
    let out = serde_json::json!({ "result": result, "meta": meta });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

/// Accepts a `(D,)` or `(1, D)` float array.
fn read_query_vector(path: &Path) -> anyhow::Result<Vec<f32>> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let array = npy::decode(&bytes).with_context(|| format!("invalid .npy {}", path.display()))?;
    let shape = array.shape().to_vec();
    match shape.as_slice() {
        [_] | [1, _] => Ok(array.into_data()),
        shape => bail!("query must have shape (D,) or (1, D), got {shape:?}"),
    }
}

fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        _ => "image/png",
    }
}

fn parse_args(args: impl IntoIterator<Item = String>) -> anyhow::Result<Command> {
    let mut args = args.into_iter();
    let Some(command) = args.next() else {
        return Ok(Command::Help);
    };

    match command.as_str() {
        "inspect" => Ok(Command::Inspect),
        "build-centroids" => Ok(Command::BuildCentroids),
        "-h" | "--help" | "help" => Ok(Command::Help),
        "query" => {
            let mut query = QueryArgs::default();
            let mut vector = None;
            while let Some(arg) = args.next() {
                match arg.as_str() {
                    "--top-k" => query.top_k = Some(parse_count(&arg, args.next())?),
                    "--top-c" => query.top_c = Some(parse_count(&arg, args.next())?),
                    "--brute-force" => query.brute_force = true,
                    "--lang" => query.lang = Some(required(&arg, args.next())?),
                    "--image" => query.image = Some(PathBuf::from(required(&arg, args.next())?)),
                    flag if flag.starts_with("--") => bail!("unknown option {flag}\n{USAGE}"),
                    path if vector.is_none() => vector = Some(PathBuf::from(path)),
                    extra => bail!("unexpected argument {extra}\n{USAGE}"),
                }
            }
            query.vector = vector.with_context(|| format!("missing <vector.npy>\n{USAGE}"))?;
            Ok(Command::Query(query))
        }
        other => bail!("unknown command {other}\n{USAGE}"),
    }
}

fn required(flag: &str, value: Option<String>) -> anyhow::Result<String> {
    value.with_context(|| format!("{flag} needs a value"))
}

fn parse_count(flag: &str, value: Option<String>) -> anyhow::Result<usize> {
    let value = required(flag, value)?;
    value
        .parse()
        .with_context(|| format!("{flag} expects a non-negative integer, got {value:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<Command> {
        parse_args(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_parse_query_flags() {
        let command = parse(&[
            "query",
            "q.npy",
            "--top-k",
            "3",
            "--brute-force",
            "--lang",
            "en",
        ])
        .unwrap();
        assert_eq!(
            command,
            Command::Query(QueryArgs {
                vector: PathBuf::from("q.npy"),
                top_k: Some(3),
                brute_force: true,
                lang: Some("en".to_string()),
                ..Default::default()
            })
        );
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(parse(&["query"]).is_err());
        assert!(parse(&["query", "q.npy", "--top-k"]).is_err());
        assert!(parse(&["query", "q.npy", "--top-k", "-1"]).is_err());
        assert!(parse(&["query", "q.npy", "--frobnicate"]).is_err());
        assert!(parse(&["serve"]).is_err());
    }

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(parse(&[]).unwrap(), Command::Help);
        assert_eq!(parse(&["inspect"]).unwrap(), Command::Inspect);
        assert_eq!(parse(&["build-centroids"]).unwrap(), Command::BuildCentroids);
    }

    #[test]
    fn test_mime_for() {
        assert_eq!(mime_for(Path::new("a.JPG")), "image/jpeg");
        assert_eq!(mime_for(Path::new("a.png")), "image/png");
    }
}
