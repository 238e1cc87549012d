use anyhow::Context;
use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tracing::info;
use vector_fusion_core::{
    cell_text, ExportFormat, HubConfig, IndexConfiguration, ModelId, SearchOptions, Session,
};

/// One line typed at the prompt.
#[derive(Parser)]
#[command(multicall = true)]
pub struct Line {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Open the Elasticsearch connection from the loaded settings.
    Connect,
    /// Check that the cluster still answers.
    Ping,
    /// Upload a CSV file as the session dataset.
    Load { path: PathBuf },
    /// Show inferred column types and missing counts.
    Describe,
    /// Print the first rows of the dataset.
    Preview {
        #[arg(long, default_value = "5")]
        rows: usize,
    },
    /// Choose the index and the columns to embed, identify and display.
    Configure {
        #[arg(long)]
        index: String,
        /// Column whose text is embedded.
        #[arg(long)]
        text: String,
        /// Column used as the document id.
        #[arg(long)]
        id: String,
        /// Comma separated columns shown in results.
        #[arg(long, value_delimiter = ',', required = true)]
        display: Vec<String>,
        /// minilm or mpnet.
        #[arg(long)]
        model: Option<ModelId>,
    },
    /// Embed and upsert every row into the configured index.
    Index,
    /// Number of documents in the configured index.
    Count,
    /// Semantic search over the configured index.
    Search {
        #[arg(long, default_value = "10")]
        k: usize,
        #[arg(long, default_value = "500")]
        candidates: usize,
        #[arg(required = true, num_args = 1.., trailing_var_arg = true)]
        query: Vec<String>,
    },
    /// Write the last search result as csv, excel or pdf.
    Export { format: ExportFormat, path: PathBuf },
    /// Show the session stage and selections.
    Status,
    #[command(alias = "exit")]
    Quit,
}

/// Splits `line` the way a shell would, so quoted queries and paths with
/// spaces stay one argument, and parses it. Blank lines give `None`.
pub fn parse_line(line: &str) -> Result<Option<Command>, clap::Error> {
    let words = shlex::split(line).ok_or_else(|| {
        clap::Error::raw(ErrorKind::InvalidValue, "unbalanced quotes in the input line\n")
    })?;
    if words.is_empty() {
        return Ok(None);
    }
    Ok(Some(Line::try_parse_from(words)?.command))
}

pub enum Flow {
    Continue,
    Quit,
}

pub async fn execute(session: &mut Session, config: &HubConfig, command: Command) -> anyhow::Result<Flow> {
    match command {
        Command::Connect => {
            session.connect(&config.store).await?;
            println!("connected to {}", config.store.endpoint);
        }
        Command::Ping => {
            if session.ping().await {
                println!("cluster is reachable");
            } else {
                println!("cluster is not reachable");
            }
        }
        Command::Load { path } => {
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            let dataset = session.load_dataset(&bytes)?;
            println!(
                "loaded {} rows, {} columns: {}",
                dataset.len(),
                dataset.columns().len(),
                dataset.columns().join(", ")
            );
        }
        Command::Describe => {
            let dataset = session.dataset().context("no dataset loaded")?;
            println!("{:<24} {:<8} {:>8}", "column", "type", "missing");
            for summary in dataset.describe() {
                println!(
                    "{:<24} {:<8} {:>8}",
                    summary.name,
                    format!("{:?}", summary.kind).to_lowercase(),
                    summary.missing
                );
            }
        }
        Command::Preview { rows } => {
            let dataset = session.dataset().context("no dataset loaded")?;
            println!("{}", dataset.columns().join("\t"));
            for record in dataset.preview(rows) {
                let cells: Vec<String> = record.values().iter().map(cell_text).collect();
                println!("{}", cells.join("\t"));
            }
        }
        Command::Configure {
            index,
            text,
            id,
            display,
            model,
        } => {
            let selection = IndexConfiguration {
                index,
                text_column: text,
                identifier_column: id,
                display_columns: display,
            };
            session.configure(selection, model)?;
            println!("configured with model {}", session.model());
        }
        Command::Index => {
            let total = session.dataset().map(|dataset| dataset.len()).unwrap_or_default();
            let bar = ProgressBar::new(total as u64);
            bar.set_style(
                ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/{len} rows ({eta})")?
                    .progress_chars("=> "),
            );

            let outcome = session
                .index(|progress| {
                    bar.set_length(progress.total as u64);
                    bar.set_position(progress.current as u64);
                })
                .await;
            bar.finish_and_clear();

            let report = outcome?;
            println!(
                "indexed {}/{} rows into {}",
                report.succeeded, report.total, report.index
            );
            for failure in &report.failed {
                println!("  {} failed: {}", failure.id, failure.reason);
            }
        }
        Command::Count => {
            println!("{} documents", session.count().await?);
        }
        Command::Search {
            k,
            candidates,
            query,
        } => {
            let options = SearchOptions {
                k,
                num_candidates: candidates,
            };
            let result = session.search(&query.join(" "), options).await?;
            println!("{:>4} {:>8}  {}", "#", "score", result.columns.join(" | "));
            for (rank, hit) in result.hits.iter().enumerate() {
                let cells: Vec<String> = hit.values.iter().map(cell_text).collect();
                println!("{:>4} {:>8.4}  {}", rank + 1, hit.score, cells.join(" | "));
            }
            if result.hits.is_empty() {
                println!("no matches");
            }
        }
        Command::Export { format, path } => {
            let bytes = session.export(format)?;
            tokio::fs::write(&path, &bytes)
                .await
                .with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), mime = format.mime_type(), "export written");
            println!("wrote {} bytes to {}", bytes.len(), path.display());
        }
        Command::Status => {
            println!("session  {}", session.id());
            println!("stage    {:?}", session.stage());
            println!(
                "model    {} ({})",
                session.model(),
                session.embeddings().backend()
            );
            if let Some(dataset) = session.dataset() {
                println!("dataset  {} rows", dataset.len());
            }
            if let Some(selection) = session.config() {
                println!(
                    "index    {} (text={}, id={}, display={})",
                    selection.index,
                    selection.text_column,
                    selection.identifier_column,
                    selection.display_columns.join(",")
                );
            }
            if let Some(result) = session.last_result() {
                println!("last     {:?} -> {} hits", result.query, result.hits.len());
            }
        }
        Command::Quit => return Ok(Flow::Quit),
    }

    Ok(Flow::Continue)
}
