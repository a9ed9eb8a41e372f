use clap::{Args, Parser, Subcommand};

use crate::fulcrum::client::{DEFAULT_BASE_URL, DEFAULT_REPORT_URL};
use crate::types::{LedgerBackend, LogFormat, LogLevel, PhotoQuality};

#[derive(Parser, Debug)]
#[command(
    name = "fulcrum-photo-sync",
    version,
    about = "Archive photos and report PDFs from completed Fulcrum records"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log level (RUST_LOG overrides)
    #[arg(long, value_enum, default_value = "info", env = "LOG_LEVEL", global = true)]
    pub log_level: LogLevel,

    /// Log output format
    #[arg(long, value_enum, default_value = "text", global = true)]
    pub log_format: LogFormat,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a sync pass (or keep running with --watch-interval)
    Sync(SyncArgs),
    /// Show ledger totals and leftover staging files
    Status(StatusArgs),
}

/// Settings shared by every subcommand that touches Fulcrum or the ledger.
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// Fulcrum API token
    #[arg(long, env = "FULCRUM_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Fulcrum API base URL
    #[arg(long, env = "FULCRUM_API_URL", default_value = DEFAULT_BASE_URL)]
    pub api_url: String,

    /// Where processed access keys are recorded
    #[arg(long, value_enum, default_value = "lookup", env = "LEDGER_BACKEND")]
    pub ledger: LedgerBackend,

    /// Lookup form holding the ledger rows (lookup ledger)
    #[arg(long, env = "FULCRUM_FORM_LOOK_UP")]
    pub lookup_form_id: Option<String>,

    /// Ledger database file (sqlite ledger)
    #[arg(long, env = "LEDGER_DB", default_value = "~/.fulcrum-photo-sync/ledger.db")]
    pub ledger_db: String,

    /// Directory downloads are staged in before archiving
    #[arg(long, env = "STAGING_DIR", default_value = "~/.fulcrum-photo-sync/staging")]
    pub staging_dir: String,

    /// Lookup form field holding the photo access key
    #[arg(long, default_value = "2426")]
    pub lookup_access_key_field: String,

    /// Lookup form field holding the project number
    #[arg(long, default_value = "cb30")]
    pub lookup_project_number_field: String,

    /// HTTP connect timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub connect_timeout: u64,
}

#[derive(Args, Debug)]
pub struct SyncArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Inspection form whose records are archived
    #[arg(long, env = "FULCRUM_FORM_ID")]
    pub form_id: String,

    /// Root of the archive tree (<root>/<branch>/<project>/Field Docs/Photos)
    #[arg(long, env = "ARCHIVE_ROOT")]
    pub archive_root: String,

    /// Folder for records that cannot be routed (default: <root>/RecoveredUploads)
    #[arg(long, env = "FALLBACK_ROOT")]
    pub fallback_root: Option<String>,

    /// Only consider records updated within this window: an interval (7d),
    /// an ISO date or datetime, or "none"
    #[arg(long, default_value = "7d")]
    pub updated_within: String,

    /// Photo rendition to download
    #[arg(long, value_enum, default_value = "original")]
    pub quality: PhotoQuality,

    /// Number of concurrent photo downloads per record
    #[arg(long, default_value_t = 4)]
    pub concurrency: usize,

    /// Keep the existing photo instead of writing name(1).jpg on a name clash
    #[arg(long)]
    pub no_duplicates: bool,

    /// Report URL template ({record_id} and {token} are substituted)
    #[arg(long, env = "FULCRUM_REPORT_URL", default_value = DEFAULT_REPORT_URL)]
    pub report_url: String,

    /// Project number field key
    #[arg(long, default_value = "bfd0")]
    pub project_number_field: String,

    /// Field visit notes field key
    #[arg(long, default_value = "638f")]
    pub notes_field: String,

    /// Branch field key
    #[arg(long, default_value = "4730")]
    pub branch_field: String,

    /// Latitude stamped on lookup ledger rows
    #[arg(long, default_value_t = 27.770787, allow_negative_numbers = true)]
    pub lookup_latitude: f64,

    /// Longitude stamped on lookup ledger rows
    #[arg(long, default_value_t = -82.638039, allow_negative_numbers = true)]
    pub lookup_longitude: f64,

    /// Run continuously, waiting N seconds between passes
    #[arg(long)]
    pub watch_interval: Option<u64>,

    /// Disable progress bar
    #[arg(long)]
    pub no_progress_bar: bool,

    /// Exit non-zero when a single pass leaves failed records
    #[arg(long)]
    pub fail_on_record_errors: bool,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,
}
