pub mod aggregator;
pub mod args;
pub mod config;
pub mod domain;
pub mod export;
pub mod inbox;
pub mod record;
pub mod report;
pub mod source;
pub mod stats;
pub mod utils;

pub use aggregator::analyze;
pub use args::Args;
pub use config::{init_default_config, load_config, Config};
pub use inbox::{analyze_inbox, run_analysis, InboxAnalysis};
pub use record::MessageRecord;
pub use source::{FetchChain, FetchError, MessageSource, SourceError};
pub use stats::{AnalysisResult, DateRange, DomainStat, SenderStat};
