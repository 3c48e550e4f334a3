use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::{info, warn};

use crate::aggregator::analyze;
use crate::config::Config;
use crate::source::{build_chain, FetchChain, SourceSettings};
use crate::stats::AnalysisResult;
use crate::Args;

#[derive(Debug)]
pub struct InboxAnalysis {
    /// Name of the source that served the records.
    pub source: String,
    pub result: AnalysisResult,
}

/// Command line flags layered over the loaded configuration.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub folder: String,
    pub limit: usize,
    pub top_senders: usize,
}

pub fn resolve_settings(args: &Args, config: &mut Config) -> (RunSettings, SourceSettings) {
    if !args.sources.is_empty() {
        config.fetch.sources = args.sources.clone();
    }
    if let Some(path) = &args.mbox {
        config.mbox.path = Some(path.clone());
    }
    if let Some(path) = &args.cache {
        config.cache.path = Some(path.clone());
    }

    let run = RunSettings {
        folder: args
            .folder
            .clone()
            .unwrap_or_else(|| config.fetch.folder.clone()),
        limit: args.limit.unwrap_or(config.fetch.limit),
        top_senders: args.top.unwrap_or(config.report.top_senders),
    };

    let sources = SourceSettings {
        token: args.token.clone(),
        timeout: Duration::from_secs(config.fetch.timeout_seconds),
        workers: args.workers,
        temp_path: args.temp_path.clone(),
    };

    (run, sources)
}

pub fn run_analysis(args: &Args, config: &mut Config) -> Result<(RunSettings, InboxAnalysis)> {
    let (run, source_settings) = resolve_settings(args, config);
    let chain = build_chain(&config.fetch.sources, config, &source_settings)?;
    let analysis = analyze_inbox(&chain, &run.folder, run.limit)?;
    Ok((run, analysis))
}

/// Fetches one bounded page from `folder` and aggregates it.
///
/// A folder with no messages is a successful, empty analysis; a failure of
/// every source is an error.
pub fn analyze_inbox(chain: &FetchChain, folder: &str, limit: usize) -> Result<InboxAnalysis> {
    let total_start_time = Instant::now();
    info!(action = "start", component = "inbox_analysis", folder, limit, "Starting inbox analysis");

    let fetched = chain.fetch(folder, limit)?;

    if fetched.records.is_empty() {
        warn!(action = "complete", component = "inbox_analysis", source = %fetched.source, "No emails found in folder");
    }

    let result = analyze(&fetched.records);

    info!(
        action = "complete",
        component = "inbox_analysis",
        source = %fetched.source,
        duration_ms = total_start_time.elapsed().as_millis(),
        "Analysis completed successfully"
    );

    Ok(InboxAnalysis {
        source: fetched.source,
        result,
    })
}
