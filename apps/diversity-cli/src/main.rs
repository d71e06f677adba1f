//! Diversity Explorer command line
//!
//! Runs the same analyses as the web app against the analysis service and
//! prints the results as text.

use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use diversity_client::{ClientConfig, HttpBackend, RetryPolicy, API_URL_ENV};
use diversity_core::templates::{load_catalog, load_models, MODELS_TIMEOUT};
use diversity_core::{
    load_dataset, ExactMatchesView, FileSlot, Finished, LoadOutcome, MemoryStore, MetricsBoard,
    PatternExplorer, Selection, SystemClock, TemplateMatcher,
};
use diversity_types::{Document, SamplingMode, DEFAULT_PATTERN_LENGTH};

mod report;

#[derive(Parser, Debug)]
#[command(name = "diversity")]
#[command(version, about = "Measure how repetitive a text corpus is")]
struct Args {
    /// Base URL of the analysis service
    #[arg(long, env = API_URL_ENV, global = true)]
    api_url: Option<String>,

    /// TOML file with client settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log requests and stream events
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Sampling {
    /// The first 100 documents
    #[value(name = "first100")]
    First100,
    /// 200 documents picked at random
    #[value(name = "random200")]
    Random200,
    /// Every document
    #[value(name = "full")]
    Full,
}

impl From<Sampling> for SamplingMode {
    fn from(sampling: Sampling) -> Self {
        match sampling {
            Sampling::First100 => SamplingMode::First100,
            Sampling::Random200 => SamplingMode::Random200,
            Sampling::Full => SamplingMode::Full,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Repeated part-of-speech patterns in a corpus
    Patterns {
        file: PathBuf,
        /// Second corpus to compare against
        #[arg(long)]
        compare: Option<PathBuf>,
        /// Pattern length (2-10)
        #[arg(short, long, default_value_t = DEFAULT_PATTERN_LENGTH)]
        length: u8,
        /// Used for corpora over 100 documents
        #[arg(long, value_enum, default_value_t = Sampling::Random200)]
        sampling: Sampling,
    },
    /// Phrases repeated verbatim across documents
    Exact {
        file: PathBuf,
        #[arg(long, default_value_t = diversity_core::exact::DEFAULT_MIN_LENGTH)]
        min_length: u8,
        #[arg(long, default_value_t = diversity_core::exact::DEFAULT_MIN_OCCURRENCES)]
        min_occurrences: usize,
    },
    /// Compression and repetition metrics for one or two corpora
    Metrics {
        file: PathBuf,
        file2: Option<PathBuf>,
    },
    /// Match text against known model templates
    Templates {
        /// Text to analyze; read from --file when omitted
        text: Option<String>,
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Models the service knows templates for
    Models,
    /// List built-in datasets, or print one
    Dataset {
        category: Option<String>,
        id: Option<String>,
    },
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    // stdout carries the report
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(level.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn client_config(args: &Args) -> Result<ClientConfig> {
    let mut config = match &args.config {
        Some(path) => ClientConfig::from_file(path)?,
        None => ClientConfig::from_env()?,
    };
    if let Some(url) = &args.api_url {
        config.base_url = url.clone();
        config.validate()?;
    }
    Ok(config)
}

fn read_document(path: &Path) -> Result<Document> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(Document::from_upload(&name, None, bytes)?)
}

async fn patterns(
    backend: &HttpBackend,
    file: &Path,
    compare: Option<&Path>,
    length: u8,
    mode: SamplingMode,
) -> Result<()> {
    let doc1 = read_document(file)?;
    let doc2 = compare.map(read_document).transpose()?;

    let mut explorer = PatternExplorer::new(MemoryStore::new(), SystemClock);
    let mut pending = match explorer.load_corpus(doc1, doc2) {
        LoadOutcome::Fetch(fetch) => fetch,
        LoadOutcome::AwaitingSampling => {
            info!(mode = %mode.as_str(), "Large corpus, sampling");
            explorer.apply_sampling(mode)?
        }
    };
    if length != pending.request().pattern_length {
        pending = match explorer.select_length(length)? {
            Selection::Fetch(fetch) => fetch,
            Selection::Served { .. } => bail!("Nothing to fetch for length {}", length),
        };
    }

    let outcome = pending.execute(backend).await;
    if let Finished::Failed(message) = explorer.finish(outcome) {
        bail!(message);
    }
    print!(
        "{}",
        report::patterns(&explorer.view().displayed(), &explorer.status_line())
    );
    if let Some(info) = &explorer.view().result().sampling_info {
        println!("\n{}", info);
    }
    Ok(())
}

async fn exact(
    backend: &HttpBackend,
    file: &Path,
    min_length: u8,
    min_occurrences: usize,
) -> Result<()> {
    let mut view = ExactMatchesView::new();
    view.set_min_length(min_length)?;
    view.set_min_occurrences(min_occurrences)?;

    let fetch = view.set_document(Rc::new(read_document(file)?));
    let outcome = fetch.execute(backend).await;
    view.finish(outcome);
    if let Some(error) = view.error() {
        bail!(error.to_string());
    }
    print!("{}", report::exact(view.matches(), &view.summary()));
    Ok(())
}

async fn metrics(backend: &HttpBackend, files: &[(FileSlot, PathBuf)]) -> Result<()> {
    let mut board = MetricsBoard::new();
    for (slot, path) in files {
        let run = board.begin(*slot, Rc::new(read_document(path)?));
        let outcome = run
            .execute(backend, |slot, generation, event| {
                tracing::debug!(%slot, metric = event.metric(), "Metric event");
                board.apply(slot, generation, event);
            })
            .await;
        board.finish(outcome);
    }
    let slots: Vec<FileSlot> = files.iter().map(|(slot, _)| *slot).collect();
    print!("{}", report::metrics(&board, &slots));
    Ok(())
}

async fn templates(backend: &HttpBackend, text: String) -> Result<()> {
    let policy = RetryPolicy::default();
    let (catalog, models) = tokio::join!(
        load_catalog(backend, &policy, tokio::time::sleep),
        load_models(backend, tokio::time::sleep(MODELS_TIMEOUT))
    );

    let mut matcher = TemplateMatcher::new();
    matcher.set_catalog(catalog);
    matcher.set_models(models);
    matcher.set_input(text);

    let Some(fetch) = matcher.analyze() else {
        bail!("Nothing to analyze");
    };
    let outcome = fetch.execute(backend).await;
    matcher.finish(outcome);
    if let Some(error) = matcher.error() {
        bail!(error.to_string());
    }

    print!("{}", report::coverage(&matcher.coverage()));
    if let Some(analysis) = matcher.analysis() {
        for m in &analysis.matches {
            println!("  [{}] {}  ({})", m.template_name, m.text, m.pattern);
        }
    }
    Ok(())
}

async fn run(args: Args) -> Result<()> {
    let config = client_config(&args)?;
    info!(api_url = %config.base_url, "Using analysis service");
    let backend = HttpBackend::new(config)?;

    match args.command {
        Command::Patterns {
            file,
            compare,
            length,
            sampling,
        } => patterns(&backend, &file, compare.as_deref(), length, sampling.into()).await,
        Command::Exact {
            file,
            min_length,
            min_occurrences,
        } => exact(&backend, &file, min_length, min_occurrences).await,
        Command::Metrics { file, file2 } => {
            let mut files = vec![(FileSlot::File1, file)];
            files.extend(file2.map(|f| (FileSlot::File2, f)));
            metrics(&backend, &files).await
        }
        Command::Templates { text, file } => {
            let text = match (text, file) {
                (Some(text), _) => text,
                (None, Some(path)) => fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                (None, None) => bail!("Pass text or --file"),
            };
            templates(&backend, text).await
        }
        Command::Models => {
            let colors = load_models(&backend, tokio::time::sleep(MODELS_TIMEOUT))
                .await
                .map_err(anyhow::Error::msg)?;
            print!("{}", report::models(&colors));
            Ok(())
        }
        Command::Dataset { category: None, .. } => {
            print!("{}", report::datasets());
            Ok(())
        }
        Command::Dataset {
            category: Some(category),
            id,
        } => {
            let document = load_dataset(&backend, &category, id.as_deref()).await?;
            print!("{}", document.text());
            Ok(())
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);
    run(args).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sampling_of(argv: &[&str]) -> Result<Sampling, clap::Error> {
        match Args::try_parse_from(argv)?.command {
            Command::Patterns { sampling, .. } => Ok(sampling),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_sampling_defaults_to_random200() {
        let sampling = sampling_of(&["diversity", "patterns", "a.txt"]).unwrap();
        assert_eq!(SamplingMode::from(sampling), SamplingMode::Random200);
    }

    #[test]
    fn test_sampling_values_match_wire_names() {
        for mode in SamplingMode::ALL {
            let sampling =
                sampling_of(&["diversity", "patterns", "a.txt", "--sampling", mode.as_str()])
                    .unwrap();
            assert_eq!(SamplingMode::from(sampling), mode);
        }
    }

    #[test]
    fn test_unknown_sampling_rejected() {
        let err = sampling_of(&["diversity", "patterns", "a.txt", "--sampling", "some"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }
}
