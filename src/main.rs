use anyhow::Result;
use chrono::Local;
use clap::Parser;
use std::path::PathBuf;
use tracing::error;

use inboxee::report::{self, ReportOptions};
use inboxee::{export, utils, Args};

fn run(args: &Args) -> Result<()> {
    let mut config = inboxee::load_config(args.config.as_deref())?;
    let (settings, analysis) = inboxee::run_analysis(args, &mut config)?;

    if args.json {
        println!("{}", report::render_json(&analysis.result)?);
    } else {
        let options = ReportOptions {
            folder: settings.folder.clone(),
            source: Some(analysis.source.clone()),
            top_senders: settings.top_senders,
            redact: args.redact,
        };
        report::print_analysis_results(&analysis.result, &options);
    }

    if let Some(target) = &args.export {
        if analysis.result.is_empty() {
            eprintln!("Nothing to export: no emails found");
        } else {
            let path = target.clone().unwrap_or_else(|| {
                PathBuf::from(export::default_export_name(Local::now().date_naive()))
            });
            export::export_csv(&analysis.result, &path)?;
            eprintln!("Exported {} senders to {}", analysis.result.senders.len(), path.display());
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    utils::setup_logging(args.verbose);

    utils::validate_args(&args)?;

    if args.init {
        return inboxee::init_default_config();
    }

    if let Err(e) = run(&args) {
        error!(action = "exit", component = "main", error = %e, "Error");
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
