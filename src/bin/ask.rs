use std::{
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use pdfqa::{
    completion::OpenAiCompletionClient,
    config::OpenAiSettings,
    embedding::{EmbeddingClient, OpenAiEmbeddingClient},
    index::{IndexBuilder, QueryEngine},
    logging,
};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(
    name = "pdfqa-ask",
    about = "Index a local PDF and ask questions about it"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build an index for a local PDF.
    Index {
        #[arg(long)]
        pdf: PathBuf,
        #[arg(long, default_value = "storage")]
        persist_dir: PathBuf,
    },
    /// Answer one question, or read questions from stdin until `quit`.
    Query {
        #[arg(long, default_value = "storage")]
        persist_dir: PathBuf,
        question: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    logging::init_cli_tracing();
    if let Err(err) = run().await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();
    let settings = OpenAiSettings::from_env().context("OpenAI settings")?;
    let embedder: Arc<dyn EmbeddingClient> = Arc::new(OpenAiEmbeddingClient::new(&settings)?);

    match cli.command {
        Command::Index { pdf, persist_dir } => {
            let bytes = tokio::fs::read(&pdf)
                .await
                .with_context(|| format!("failed to read {}", pdf.display()))?;
            let summary = IndexBuilder::new(embedder)
                .build(bytes, &persist_dir)
                .await
                .with_context(|| format!("failed to index {}", pdf.display()))?;
            println!(
                "Indexed {} chunks into {}",
                summary.node_count,
                summary.persist_dir.display()
            );
        }
        Command::Query {
            persist_dir,
            question,
        } => {
            let engine = QueryEngine::new(
                embedder,
                Arc::new(OpenAiCompletionClient::new(&settings)?),
            );
            match question {
                Some(question) => answer(&engine, &question, &persist_dir).await?,
                None => interactive(&engine, &persist_dir).await?,
            }
        }
    }
    Ok(())
}

async fn answer(engine: &QueryEngine, question: &str, persist_dir: &Path) -> Result<()> {
    let response = engine
        .answer(question, persist_dir)
        .await
        .context("query failed")?;
    println!("{response}");
    Ok(())
}

async fn interactive(engine: &QueryEngine, persist_dir: &Path) -> Result<()> {
    if !persist_dir.is_dir() {
        bail!("no index found at {}", persist_dir.display());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\nEnter your question (or 'quit' to exit): ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.eq_ignore_ascii_case("quit") {
            break;
        }
        if question.is_empty() {
            continue;
        }
        match engine.answer(question, persist_dir).await {
            Ok(response) => println!("\nAnswer: {response}"),
            Err(err) => eprintln!("error: {err}"),
        }
    }
    Ok(())
}
