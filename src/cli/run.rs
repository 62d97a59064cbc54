use std::path::{Path, PathBuf};
use std::sync::Arc;

use action_flow::{CartEngine, RemoteRecoveryStrategy};
use action_primitives::{DefaultActionPrimitives, UiAgentClient};
use anyhow::{bail, Context, Result};
use cartpilot_core_types::{CartItemRequest, Platform, SessionId};
use clap::Args;
use serde::Deserialize;
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::context::CliContext;
use crate::cli::output::print_outcomes;

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// Batch file (YAML or JSON): a list of requests or `{ session, platform, items }`
    #[arg(short, long, value_name = "FILE")]
    pub batch: PathBuf,

    /// Session identifier; defaults to the batch file's or a fresh one
    #[arg(short, long)]
    pub session: Option<String>,

    /// Storefront platform
    #[arg(short, long)]
    pub platform: Option<String>,

    /// Skip the agent health check
    #[arg(long)]
    pub skip_health_check: bool,
}

/// Batch file document
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum BatchFile {
    Items(Vec<CartItemRequest>),
    Document {
        #[serde(default)]
        session: Option<String>,
        #[serde(default)]
        platform: Option<String>,
        items: Vec<CartItemRequest>,
    },
}

impl BatchFile {
    pub fn parse(path: &Path, raw: &str) -> Result<Self> {
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        let parsed = if is_json {
            serde_json::from_str(raw).with_context(|| format!("parsing {}", path.display()))?
        } else {
            serde_yaml::from_str(raw).with_context(|| format!("parsing {}", path.display()))?
        };
        Ok(parsed)
    }

    pub fn into_parts(self) -> (Option<String>, Option<String>, Vec<CartItemRequest>) {
        match self {
            BatchFile::Items(items) => (None, None, items),
            BatchFile::Document {
                session,
                platform,
                items,
            } => (session, platform, items),
        }
    }
}

pub async fn cmd_run(args: RunArgs, ctx: &CliContext) -> Result<()> {
    let config = ctx.config();
    config.validate()?;

    let raw = fs::read_to_string(&args.batch)
        .await
        .with_context(|| format!("reading {}", args.batch.display()))?;
    let (file_session, file_platform, items) = BatchFile::parse(&args.batch, &raw)?.into_parts();
    if items.is_empty() {
        bail!("batch file {} has no items", args.batch.display());
    }

    let platform = Platform::new(
        args.platform
            .or(file_platform)
            .unwrap_or_else(|| "amazon".to_string()),
    );
    let session = args
        .session
        .or(file_session)
        .map(|id| SessionId::from(id.as_str()))
        .unwrap_or_default();

    let client = UiAgentClient::new(config.agent.clone()).context("building UI agent client")?;
    if !args.skip_health_check {
        client
            .health()
            .await
            .with_context(|| format!("UI agent at {} is not reachable", client.base_url()))?;
    }

    let mut engine = CartEngine::new(Arc::new(ctx.locator_tables()?));
    if config.recovery.enabled {
        let strategy = RemoteRecoveryStrategy::new(config.recovery.remote())?;
        engine = engine.with_recovery(Arc::new(strategy));
    }
    engine.register_session(
        session.clone(),
        platform.clone(),
        Arc::new(DefaultActionPrimitives::new(Arc::new(client))),
    )?;

    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, finishing the current item");
                cancel.cancel();
            }
        })
    };

    info!(session = %session, platform = %platform, items = items.len(), "Running batch");
    let result = engine
        .run_batch_with_cancel(&session, &items, &config.engine(), cancel)
        .await;
    watcher.abort();
    let outcomes = result?;

    print_outcomes(ctx.output(), &outcomes)?;

    let failed = outcomes.iter().filter(|o| !o.is_success()).count();
    if failed > 0 {
        bail!("{} of {} items were not confirmed in the cart", failed, outcomes.len());
    }
    Ok(())
}
