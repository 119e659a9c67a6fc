//! Morning market brief CLI
//!
//! # Usage
//!
//! ```bash
//! # Embed ./news/*.txt and persist the index
//! cargo run --bin market-brief -- build-index --docs news
//!
//! # One brief from the command line
//! cargo run --bin market-brief -- analyze --query "Asia tech earnings" --today 0.12 --yesterday 0.10
//!
//! # JSON lines over stdin/stdout
//! echo '{"query":"Asia tech earnings","asia_tech_today":0.12,"asia_tech_yesterday":0.10}' \
//!     | cargo run --bin market-brief -- serve
//! ```
//!
//! Settings come from `BRIEF_*` environment variables; see `BriefConfigBuilder::with_env`.

use agent_brief::context::{build_knowledge, embedder_from_settings, load_or_build_knowledge};
use agent_brief::retriever::Retriever;
use agent_brief::{BriefConfig, BriefContext, BriefRequest, BriefResponse, BriefService, Holding};
use agent_utils::{LogFormat, init_tracing_with};
use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "market-brief")]
#[command(about = "Morning market brief: retrieval, exposure trend and brief composition", long_about = None)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Persisted index snapshot (overrides BRIEF_INDEX_PATH)
    #[arg(long, global = true)]
    index: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Embed a news directory and save the index snapshot
    BuildIndex {
        /// Directory of *.txt files; the sample corpus is used when omitted
        #[arg(long)]
        docs: Option<PathBuf>,

        /// Where to write the snapshot
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Show the nearest documents for a query
    Search {
        #[arg(short, long)]
        query: String,

        #[arg(short, default_value_t = 3)]
        k: usize,
    },

    /// Compose the core brief
    Analyze(RequestArgs),

    /// Compose the brief with market snapshots and earnings
    Brief(RequestArgs),

    /// Answer JSON requests read line by line from stdin
    Serve {
        /// Include market snapshots and earnings in every answer
        #[arg(long)]
        full: bool,
    },
}

#[derive(Args, Debug)]
struct RequestArgs {
    #[arg(short, long)]
    query: String,

    /// Today's exposure as a fraction of AUM; derived from --holdings when omitted
    #[arg(long)]
    today: Option<f64>,

    /// Yesterday's exposure as a fraction of AUM
    #[arg(long)]
    yesterday: f64,

    /// JSON array of {"name", "value"} holdings
    #[arg(long)]
    holdings: Option<PathBuf>,

    /// Print the full result as JSON
    #[arg(long)]
    raw: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let format = if cli.log_json {
        LogFormat::Json
    } else {
        LogFormat::from_env()
    };
    init_tracing_with("warn,agent_brief=info", format);

    if let Err(e) = run(cli).await {
        error!(error = %e, "market-brief failed");
        return Err(e);
    }
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut builder = BriefConfig::builder().with_env()?;
    if let Some(index) = &cli.index {
        builder = builder.index_path(index);
    }

    match cli.command {
        Command::BuildIndex { docs, output } => {
            if let Some(docs) = docs {
                builder = builder.news_dir(docs);
            }
            let config = builder.build()?;
            build_index(&config, output.as_deref().unwrap_or(&config.index_path)).await
        }
        Command::Search { query, k } => search(builder.build()?, &query, k).await,
        Command::Analyze(args) => answer(builder, args, false).await,
        Command::Brief(args) => answer(builder, args, true).await,
        Command::Serve { full } => serve(builder.build()?, full).await,
    }
}

async fn build_index(config: &BriefConfig, output: &Path) -> anyhow::Result<()> {
    let embedder = embedder_from_settings(&config.embedding, config.request_timeout)?;
    let knowledge = build_knowledge(config, embedder.as_ref()).await?;
    knowledge.save(output).await?;

    println!(
        "Indexed {} documents with {} into {}",
        knowledge.store().len(),
        knowledge.model(),
        output.display()
    );
    Ok(())
}

async fn search(config: BriefConfig, query: &str, k: usize) -> anyhow::Result<()> {
    let embedder = embedder_from_settings(&config.embedding, config.request_timeout)?;
    let knowledge = load_or_build_knowledge(&config, embedder.as_ref()).await?;
    let retriever = Retriever::new(Arc::new(knowledge), embedder);

    let ranked = retriever.search(query, k).await?;

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Rank", "Doc", "Distance", "Content"]);
    for (rank, hit) in ranked.iter().enumerate() {
        table.add_row(vec![
            (rank + 1).to_string(),
            hit.document.id.to_string(),
            format!("{:.4}", hit.distance),
            hit.document.content.clone(),
        ]);
    }

    println!("{table}");
    Ok(())
}

async fn answer(
    mut builder: agent_brief::config::BriefConfigBuilder,
    args: RequestArgs,
    full: bool,
) -> anyhow::Result<()> {
    if let Some(path) = &args.holdings {
        builder = builder.holdings(read_holdings(path).await?);
    }
    let context = BriefContext::from_config(builder.build()?).await?;

    let today = match args.today {
        Some(today) => today,
        None if context.config().holdings.is_empty() => {
            bail!("either --today or --holdings is required")
        }
        None => {
            let category = &context.config().exposure_category;
            let exposure = context.portfolio().exposure(category)?;
            info!(category = %category, exposure, "derived today's exposure from holdings");
            exposure
        }
    };

    let service = BriefService::new(Arc::new(context));
    let request = BriefRequest::new(args.query, today, args.yesterday);

    if args.raw {
        let brief = if full {
            service.try_morning_brief(&request).await?
        } else {
            service.try_analyze(&request).await?
        };
        println!("{}", serde_json::to_string_pretty(&brief)?);
        return Ok(());
    }

    let response = if full {
        service.morning_brief(&request).await
    } else {
        service.analyze(&request).await
    };

    match response {
        BriefResponse::Success { result, warnings } => {
            println!("{result}");
            for warning in warnings {
                eprintln!("warning: {warning}");
            }
            Ok(())
        }
        BriefResponse::Failure { error } => bail!(error),
    }
}

async fn serve(config: BriefConfig, full: bool) -> anyhow::Result<()> {
    let context = BriefContext::from_config(config).await?;
    info!(
        documents = context.knowledge().store().len(),
        full, "serving JSON requests on stdin"
    );
    let service = BriefService::new(Arc::new(context));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let answer = service.handle_line(&line, full).await;
        stdout.write_all(answer.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }

    info!("stdin closed, shutting down");
    Ok(())
}

async fn read_holdings(path: &Path) -> anyhow::Result<Vec<Holding>> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("cannot read holdings file {}", path.display()))?;
    serde_json::from_slice(&bytes)
        .with_context(|| format!("holdings file {} is not a JSON array of holdings", path.display()))
}
