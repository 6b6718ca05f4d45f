use std::{
    io::{self, Write},
    process::ExitCode,
    sync::Arc,
};

use clap::{Parser, Subcommand};
use corpus_match::{
    assistant::{summarize, weather_answer, Assistant, DocumentChat},
    chat::{
        provider::{CompletionMode, ModelChoice, Provider},
        Conversation, MemoryPolicy,
    },
    config::{get_config, AppConfig},
    error::CorpusError,
    fetch::{read_url_content, WeatherClient},
    prompt::{join_sources, SummaryStyle},
    Document, FittedModel, Result, SimilarityMatcher,
};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "corpus-match", version, about = "Match questions to documents and answer with them")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fit the configured corpus and write both index artifacts
    Index,
    /// Print the best match and the top hits for a text
    Query {
        text: String,
        /// number of ranked hits to print
        #[arg(short, long, default_value_t = 5)]
        top: usize,
    },
    /// Answer a question grounded in the best matching document
    ///
    /// Without a question, reads one question per line from stdin and keeps
    /// the conversation across them.
    Ask {
        question: Option<String>,
        #[arg(short, long, default_value = "gpt-4o")]
        model: ModelChoice,
        /// full, questions[:N] or tokens[:N]
        #[arg(long, default_value = "full")]
        memory: MemoryPolicy,
    },
    /// Chat about the pages at one or two urls, one question per stdin line
    Chat {
        url: String,
        url2: Option<String>,
        #[arg(short, long, default_value = "gpt-4o")]
        model: ModelChoice,
        /// full, questions[:N] or tokens[:N]
        #[arg(long, default_value = "questions:5")]
        memory: MemoryPolicy,
    },
    /// Summarize the page at a url
    Summarize {
        url: String,
        #[arg(short, long, default_value = "100-words")]
        style: SummaryStyle,
        #[arg(short, long, default_value = "English")]
        language: String,
        #[arg(short, long, default_value = "gpt-4o")]
        model: ModelChoice,
    },
    /// Answer a question using the current weather in a city
    Weather {
        city: String,
        question: String,
        #[arg(short, long, default_value = "gpt-4o")]
        model: ModelChoice,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "command failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = get_config()?;
    match cli.command {
        Command::Index => {
            let documents = load_documents(&config)?;
            let model: FittedModel = FittedModel::fit(documents)?;
            config.index_store().write(&model)?;
            info!(documents = model.doc_num(), vocabulary = model.vocab_size(), "index written");
        }
        Command::Query { text, top } => {
            let model: Arc<FittedModel> = Arc::new(load_model(&config)?);
            let matcher = SimilarityMatcher::new(model.clone(), config.threshold);
            let vector = model.transform(&text);
            if vector.is_zero() {
                warn!("no query term is in the vocabulary, nothing can match");
            }
            let result = matcher.query(&text);
            let hits = model.rank(&vector, top)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            if hits.is_empty() {
                println!("no ranked hits");
            } else {
                info!(hits = hits.len(), "ranked");
                println!("{hits:#?}");
            }
        }
        Command::Ask { question, model, memory } => {
            let provider = Provider::select(model, &config)?;
            let store = config.index_store();
            let (fitted, documents): (FittedModel, Vec<Document>) = match load_documents(&config) {
                Ok(documents) => (store.load_or_fit_documents(&documents)?, documents),
                // without a source, the persisted index can still name the best document
                Err(err) if store.exists() => {
                    warn!(error = %err, "corpus source unavailable, answering from the persisted index without document text");
                    (store.read()?, Vec::new())
                }
                Err(err) => return Err(err),
            };
            let matcher = Arc::new(SimilarityMatcher::new(Arc::new(fitted), config.threshold));
            let assistant = Assistant::new(provider, matcher)
                .with_documents(&documents, config.max_context_chars)
                .with_memory(memory);

            let mut conversation = Conversation::new();
            match question {
                Some(question) => {
                    assistant.handle_turn(&mut conversation, &question, print_chunk).await?;
                    println!();
                }
                None => {
                    let mut lines = BufReader::new(tokio::io::stdin()).lines();
                    while let Some(question) = next_question(&mut lines).await? {
                        assistant.handle_turn(&mut conversation, &question, print_chunk).await?;
                        println!();
                    }
                }
            }
        }
        Command::Chat { url, url2, model, memory } => {
            let provider = Provider::select(model, &config)?;
            let http = provider.endpoint().http().clone();
            let mut sources = Vec::new();
            for url in std::iter::once(url).chain(url2) {
                let text = read_url_content(&http, &url, Some(config.max_context_chars)).await?;
                sources.push((url, text));
            }
            let chat = DocumentChat::new(provider, &join_sources(&sources)).with_memory(memory);

            let mut conversation = Conversation::new();
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Some(question) = next_question(&mut lines).await? {
                chat.handle_turn(&mut conversation, &question, print_chunk).await?;
                println!();
            }
        }
        Command::Summarize { url, style, language, model } => {
            let provider = Provider::select(model, &config)?;
            let text = read_url_content(provider.endpoint().http(), &url, Some(config.max_context_chars)).await?;
            summarize(&provider, &text, style, &language, CompletionMode::Stream, print_chunk).await?;
            println!();
        }
        Command::Weather { city, question, model } => {
            let provider = Provider::select(model, &config)?;
            let report = WeatherClient::from_config(&config)?.current(&city).await?;
            weather_answer(&provider, &report, &question, CompletionMode::Stream, print_chunk).await?;
            println!();
        }
    }
    Ok(())
}

fn load_documents(config: &AppConfig) -> Result<Vec<Document>> {
    let source = config.corpus_source().ok_or(CorpusError::NoSource)?;
    Ok(source.load()?)
}

fn load_model(config: &AppConfig) -> Result<FittedModel> {
    config.index_store().load_or_fit(|| load_documents(config))
}

/// Next non-blank stdin line, `None` at end of input or on `exit`
async fn next_question(lines: &mut Lines<BufReader<Stdin>>) -> Result<Option<String>> {
    while let Some(line) = lines.next_line().await? {
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question.eq_ignore_ascii_case("exit") {
            return Ok(None);
        }
        return Ok(Some(question.to_string()));
    }
    Ok(None)
}

fn print_chunk(chunk: &str) {
    let mut out = io::stdout().lock();
    // a closed stdout only loses the echo, the reply is still recorded
    let _ = out.write_all(chunk.as_bytes());
    let _ = out.flush();
}
