//! Raven — regulatory corpus ingestion and question answering.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use tracing::info;
use tracing_subscriber::EnvFilter;

use raven_core::{Error, RavenConfig};
use raven_embed::OpenAiEmbedder;
use raven_index::VectorIndex;
use raven_ingest::{csv_io, Ingester, TokenChunker};
use raven_query::{QueryEngine, Retriever};
use raven_store::SectionStore;

fn resolve_data_dir() -> PathBuf {
    std::env::var("RAVEN_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"))
}

fn print_help() {
    println!("Raven — regulatory corpus ingestion and question answering");
    println!();
    println!("Usage: raven <command> [args]");
    println!();
    println!("Commands:");
    println!("  ingest <html-file>       Ingest an HTML corpus: segment, embed, index");
    println!("  ingest-csv <csv-file>    Re-ingest a previously exported section CSV");
    println!("  ask <question>           Answer a question from the indexed corpus");
    println!("  lookup <identifier>      Print the stored text of one section");
    println!("  export-csv [path]        Export all stored sections to CSV");
    println!("  help                     Show this help message");
    println!();
    println!("Environment:");
    println!("  RAVEN_DATA_DIR           Data directory (default: ./data)");
    println!("  OPENAI_API_KEY           API key for embedding and chat calls");
}

struct App {
    config: RavenConfig,
    store: Arc<SectionStore>,
    index: Arc<VectorIndex>,
}

impl App {
    fn open(config: RavenConfig) -> anyhow::Result<Self> {
        let store = Arc::new(
            SectionStore::open(&config.data_paths.store).context("Failed to open section store")?,
        );
        let index = Arc::new(
            VectorIndex::open(&config.data_paths.index).context("Failed to open vector index")?,
        );
        Ok(Self {
            config,
            store,
            index,
        })
    }

    fn embedder(&self) -> anyhow::Result<Arc<OpenAiEmbedder>> {
        if self.config.api_key.is_empty() {
            bail!("OPENAI_API_KEY is not set");
        }
        Ok(Arc::new(OpenAiEmbedder::new(&self.config)?))
    }

    fn ingester(&self) -> anyhow::Result<Ingester> {
        let embedder = self.embedder()?;
        let chunker = TokenChunker::new(self.config.chunk_size, self.config.chunk_overlap)?;
        Ok(Ingester::new(
            self.store.clone(),
            self.index.clone(),
            embedder,
            chunker,
            &self.config.collection,
        ))
    }

    async fn ingest(&self, path: &str) -> anyhow::Result<()> {
        let report = self.ingester()?.ingest_file(path).await?;

        // Every run leaves a CSV copy of the segmented corpus behind.
        let export = self.config.data_paths.exports.join("regulatory_data.csv");
        csv_io::export_sections(&export, &self.store.sections()?)?;

        println!(
            "Ingested {} sections ({} chunks) into '{}'",
            report.sections, report.chunks, self.config.collection
        );
        if !report.collisions.is_empty() {
            println!(
                "Warning: {} duplicate section identifiers: {}",
                report.collisions.len(),
                report.collisions.join(", ")
            );
        }
        println!("Exported sections to {}", export.display());
        Ok(())
    }

    async fn ingest_csv(&self, path: &str) -> anyhow::Result<()> {
        let sections = csv_io::import_sections(path)?;
        if sections.is_empty() {
            bail!("No sections found in {}", path);
        }
        let report = self.ingester()?.ingest_sections(sections).await?;
        println!(
            "Ingested {} sections ({} chunks) into '{}'",
            report.sections, report.chunks, self.config.collection
        );
        Ok(())
    }

    async fn ask(&self, question: &str) -> anyhow::Result<()> {
        let embedder = self.embedder()?;
        let generator = Arc::new(raven_chat::OpenAiGenerator::new(&self.config)?);
        let retriever = Retriever::new(
            embedder,
            self.index.clone(),
            &self.config.collection,
            self.config.top_k,
        );
        let engine = QueryEngine::new(retriever, generator, self.store.clone());

        let outcome = engine.answer(question).await?;
        println!("{}", outcome.answer.text);
        if !outcome.sources.is_empty() {
            println!();
            println!("Related sources:");
            for source in &outcome.sources {
                match &source.content {
                    Some(_) => println!("  {}", source.identifier),
                    None => println!("  {} (text unavailable)", source.identifier),
                }
            }
        }
        Ok(())
    }

    fn lookup(&self, identifier: &str) -> anyhow::Result<()> {
        // A store miss is Ok(None); only this command treats it as an error.
        let content = self
            .store
            .lookup(identifier)?
            .ok_or_else(|| Error::NotFound(format!("no stored section named '{}'", identifier)))?;
        println!("{}", content);
        Ok(())
    }

    fn export_csv(&self, path: Option<&str>) -> anyhow::Result<()> {
        let path = path
            .map(PathBuf::from)
            .unwrap_or_else(|| self.config.data_paths.exports.join("regulatory_data.csv"));
        let sections = self.store.sections()?;
        csv_io::export_sections(&path, &sections)?;
        println!("Exported {} sections to {}", sections.len(), path.display());
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("help");

    if matches!(command, "help" | "--help" | "-h") {
        print_help();
        return Ok(());
    }

    let data_dir = resolve_data_dir();
    info!("Data directory: {}", data_dir.display());
    let config = RavenConfig::from_env(&data_dir)?;
    let app = App::open(config)?;

    match command {
        "ingest" => {
            let Some(path) = args.get(2) else {
                bail!("Usage: raven ingest <html-file>");
            };
            app.ingest(path).await
        }
        "ingest-csv" => {
            let Some(path) = args.get(2) else {
                bail!("Usage: raven ingest-csv <csv-file>");
            };
            app.ingest_csv(path).await
        }
        "ask" => {
            let question = args[2..].join(" ");
            if question.is_empty() {
                bail!("Usage: raven ask <question>");
            }
            app.ask(&question).await
        }
        "lookup" => {
            let Some(identifier) = args.get(2) else {
                bail!("Usage: raven lookup <identifier>");
            };
            app.lookup(identifier)
        }
        "export-csv" => app.export_csv(args.get(2).map(String::as_str)),
        other => {
            eprintln!("Unknown command: {}. Use 'raven help' for usage.", other);
            std::process::exit(1);
        }
    }
}
