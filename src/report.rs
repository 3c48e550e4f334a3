use std::fmt;

use anyhow::Result;

use crate::domain::redact_address;
use crate::stats::AnalysisResult;
use crate::utils::format_number;

const BAR_WIDTH: usize = 20;

#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub folder: String,
    /// Transport that served the records, shown in the header.
    pub source: Option<String>,
    pub top_senders: usize,
    pub redact: bool,
}

/// Text summary panel for one analysis.
pub struct Summary<'a> {
    result: &'a AnalysisResult,
    options: &'a ReportOptions,
}

impl<'a> Summary<'a> {
    pub fn new(result: &'a AnalysisResult, options: &'a ReportOptions) -> Self {
        Self { result, options }
    }
}

impl fmt::Display for Summary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let result = self.result;
        let options = self.options;

        match &options.source {
            Some(source) => writeln!(f, "\n--- {} Analysis (via {}) ---", options.folder, source)?,
            None => writeln!(f, "\n--- {} Analysis ---", options.folder)?,
        }

        if result.is_empty() {
            return writeln!(f, "No emails found in this folder.");
        }

        writeln!(f, "Emails scanned: {}", format_number(result.total_emails))?;
        writeln!(f, "Unique senders: {}", format_number(result.unique_senders))?;
        writeln!(f, "Unique domains: {}", format_number(result.unique_domains))?;
        if let Some(range) = &result.date_range {
            writeln!(
                f,
                "Time span: {} ({} to {})",
                range.span_label(),
                range.oldest.format("%B %-d, %Y"),
                range.newest.format("%B %-d, %Y")
            )?;
        }

        let max_count = result.senders.first().map(|s| s.count).unwrap_or(1).max(1);

        writeln!(
            f,
            "\nTop {} senders:",
            std::cmp::min(options.top_senders, result.senders.len())
        )?;
        for sender in result.senders.iter().take(options.top_senders) {
            let email = if options.redact {
                redact_address(&sender.email)
            } else {
                sender.email.clone()
            };
            let filled = (sender.count * BAR_WIDTH).div_ceil(max_count);
            writeln!(
                f,
                "- {} <{}>: {} [{}{}]",
                sender.name,
                email,
                format_number(sender.count),
                "#".repeat(filled),
                " ".repeat(BAR_WIDTH - filled)
            )?;
        }

        writeln!(f, "\nTop {} domains:", result.domains.len())?;
        for domain in &result.domains {
            writeln!(f, "- {}: {} emails", domain.domain, format_number(domain.count))?;
        }

        Ok(())
    }
}

pub fn render_summary(result: &AnalysisResult, options: &ReportOptions) -> String {
    Summary::new(result, options).to_string()
}

pub fn print_analysis_results(result: &AnalysisResult, options: &ReportOptions) {
    print!("{}", render_summary(result, options));
}

pub fn render_json(result: &AnalysisResult) -> Result<String> {
    Ok(serde_json::to_string_pretty(result)?)
}
