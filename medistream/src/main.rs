// Copyright 2026 The Medistream Project
// SPDX-License-Identifier: Apache-2.0

use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use medistream::client::ChatClient;
use medistream::config::{self, ConfigSource, FileSource, StringSource};
use medistream::normalize::{IdentityNormalizer, MarkdownNormalizer, Normalizer};
use medistream::session::{AnswerObserver, FailureNotice, IngestionSession, SessionState};
use medistream::stream::{frame_events, FramedItem, Source};

#[derive(Parser)]
#[command(name = "medistream", about = "Streaming medical chat answers, normalized")]
struct Cli {
    /// Path to the medistream.yaml config file (defaults apply when omitted)
    #[arg(long, env = "MEDISTREAM_CONFIG")]
    config: Option<PathBuf>,

    /// Override the chat backend base URL
    #[arg(long, env = "MEDISTREAM_BASE_URL")]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ask a question and stream the answer to stdout
    Ask {
        /// Conversation id; a fresh one is generated when omitted
        #[arg(long)]
        conversation: Option<String>,

        /// Fetch the complete answer in one response
        #[arg(long)]
        no_stream: bool,

        /// Print the model output without normalization
        #[arg(long)]
        raw: bool,

        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
    },
    /// Feed a captured event-stream body through a session
    Replay {
        file: PathBuf,

        /// Bytes per simulated network chunk
        #[arg(long, default_value_t = 64)]
        chunk_size: usize,

        /// Print framed events as JSON lines instead of the answer
        #[arg(long)]
        events: bool,
    },
    /// Normalize text from stdin
    Normalize,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .json()
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let source: Box<dyn ConfigSource> = match &cli.config {
        Some(path) => Box::new(FileSource { path: path.clone() }),
        None => Box::new(StringSource::minimal()),
    };
    let mut config = match config::load_config(source.as_ref()) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("failed to load config: {e}");
            std::process::exit(1);
        }
    };
    if let Some(base_url) = cli.base_url {
        config.transport.base_url = base_url.trim_end_matches('/').to_string();
    }

    tracing::info!(
        version = %config.version,
        base_url = %config.transport.base_url,
        renormalize = ?config.session.renormalize,
        config_hash = %config.config_hash,
        "config loaded"
    );

    let ok = match cli.command {
        Command::Ask {
            conversation,
            no_stream,
            raw,
            message,
        } => {
            let client = match ChatClient::from_config(&config) {
                Ok(c) => c,
                Err(e) => {
                    tracing::error!("failed to build chat client: {e}");
                    std::process::exit(1);
                }
            };
            let client = if raw {
                client.with_normalizer(Arc::new(IdentityNormalizer))
            } else {
                client
            };
            let conversation = conversation.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            let message = message.join(" ");

            let result = if no_stream {
                client
                    .ask_once(&conversation, &message, StdoutRenderer::default())
                    .await
            } else {
                client
                    .ask(&conversation, &message, StdoutRenderer::default())
                    .await
            };
            match result {
                Ok(report) => report.outcome != SessionState::Failed,
                Err(e) => {
                    tracing::error!("{e}");
                    false
                }
            }
        }
        Command::Replay {
            file,
            chunk_size,
            events,
        } => {
            let body = match tokio::fs::read(&file).await {
                Ok(b) => Bytes::from(b),
                Err(e) => {
                    tracing::error!(path = %file.display(), "failed to read replay file: {e}");
                    std::process::exit(1);
                }
            };
            let chunks = split_chunks(body, chunk_size.max(1));
            if events {
                dump_events(chunks, config.protocol).await
            } else {
                let session = IngestionSession::new(
                    uuid::Uuid::new_v4().to_string(),
                    config.protocol,
                    Arc::new(MarkdownNormalizer::new(&config.normalizer)),
                    config.session,
                    StdoutRenderer::default(),
                );
                let report = session.run(futures_util::stream::iter(chunks)).await;
                report.outcome != SessionState::Failed
            }
        }
        Command::Normalize => {
            let mut input = String::new();
            if let Err(e) = std::io::stdin().read_to_string(&mut input) {
                tracing::error!("failed to read stdin: {e}");
                std::process::exit(1);
            }
            let normalizer = MarkdownNormalizer::new(&config.normalizer);
            println!("{}", normalizer.normalize(&input));
            true
        }
    };

    if !ok {
        std::process::exit(1);
    }
}

fn split_chunks(
    body: Bytes,
    chunk_size: usize,
) -> Vec<Result<Bytes, medistream::transport::TransportError>> {
    (0..body.len())
        .step_by(chunk_size)
        .map(|start| Ok(body.slice(start..(start + chunk_size).min(body.len()))))
        .collect()
}

async fn dump_events(
    chunks: Vec<Result<Bytes, medistream::transport::TransportError>>,
    protocol: medistream::stream::FrameProtocol,
) -> bool {
    let events = frame_events(futures_util::stream::iter(chunks), protocol);
    futures_util::pin_mut!(events);
    let mut stdout = std::io::stdout().lock();
    while let Some(item) = events.next().await {
        match item {
            FramedItem::Event(event) => match serde_json::to_string(&event) {
                Ok(line) => {
                    let _ = writeln!(stdout, "{line}");
                }
                Err(e) => tracing::error!("failed to serialize event: {e}"),
            },
            FramedItem::Failed(e) => {
                tracing::error!("replay stream failed: {e}");
                return false;
            }
        }
    }
    true
}

// ---------------------------------------------------------------------------
// Terminal renderer
// ---------------------------------------------------------------------------

/// Writes the answer to stdout as it grows.
///
/// Each update is the full normalized answer. Only complete lines are
/// printed while streaming, since normalization may still rewrite the last
/// one. If an already printed line gets rewritten, the final answer is
/// printed again in full at the end.
#[derive(Default)]
struct StdoutRenderer {
    printed: String,
    latest: String,
    diverged: bool,
    sources: Vec<Source>,
}

impl StdoutRenderer {
    fn flush_committed(&mut self) {
        let committed = match self.latest.rfind('\n') {
            Some(idx) => &self.latest[..=idx],
            None => return,
        };
        if let Some(delta) = committed.strip_prefix(self.printed.as_str()) {
            if !delta.is_empty() {
                print!("{delta}");
                let _ = std::io::stdout().flush();
                self.printed = committed.to_string();
            }
        } else {
            self.diverged = true;
        }
    }

    fn finish(&mut self) {
        let mut out = std::io::stdout().lock();
        if self.diverged {
            tracing::debug!("printed lines were rewritten; reprinting final answer");
            let _ = writeln!(out, "\n{}", self.latest);
        } else if let Some(rest) = self.latest.strip_prefix(self.printed.as_str()) {
            let _ = writeln!(out, "{rest}");
        }
        if !self.sources.is_empty() {
            let _ = writeln!(out, "\nSources:");
            for (i, source) in self.sources.iter().enumerate() {
                let _ = writeln!(out, "  {}. {source}", i + 1);
            }
        }
        let _ = out.flush();
    }
}

impl AnswerObserver for StdoutRenderer {
    fn on_token(&mut self, normalized: &str) {
        self.latest = normalized.to_string();
        if !self.diverged {
            self.flush_committed();
        }
    }

    fn on_sources(&mut self, sources: &[Source]) {
        self.sources = sources.to_vec();
    }

    fn on_complete(&mut self) {
        self.finish();
    }

    fn on_failure(&mut self, notice: &FailureNotice) {
        self.finish();
        println!("\n{}", notice.message());
    }
}
