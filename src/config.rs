use std::path::PathBuf;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Utc};

use crate::cli::{ConnectionArgs, StatusArgs, SyncArgs};
use crate::fulcrum::{ClientSettings, FieldKeys};
use crate::types::{LedgerBackend, PhotoQuality};

/// Which records a pass asks Fulcrum for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateWindow {
    /// Every record of the form.
    All,
    /// Records updated within this long before the pass starts.
    Within(chrono::Duration),
    /// Records updated at or after a fixed instant.
    Since(DateTime<Utc>),
}

impl UpdateWindow {
    /// `updated_since` cutoff for a pass starting at `now`.
    pub fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            UpdateWindow::All => None,
            UpdateWindow::Within(window) => Some(now - *window),
            UpdateWindow::Since(instant) => Some(*instant),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub backend: LedgerBackend,
    pub lookup_form_id: Option<String>,
    pub db_path: PathBuf,
}

/// Configuration of the `sync` command.
pub struct Config {
    pub client: ClientSettings,
    pub form_id: String,
    pub keys: FieldKeys,
    pub ledger: LedgerConfig,
    pub archive_root: PathBuf,
    pub fallback_root: Option<PathBuf>,
    pub staging_dir: PathBuf,
    pub update_window: UpdateWindow,
    pub watch_interval: Option<u64>,
    pub concurrency: usize,
    pub quality: PhotoQuality,
    pub allow_duplicates: bool,
    pub no_progress_bar: bool,
    pub fail_on_record_errors: bool,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("client", &self.client)
            .field("form_id", &self.form_id)
            .field("ledger", &self.ledger)
            .field("archive_root", &self.archive_root)
            .field("staging_dir", &self.staging_dir)
            .field("update_window", &self.update_window)
            .finish_non_exhaustive()
    }
}

/// Configuration of the `status` command.
#[derive(Debug)]
pub struct StatusConfig {
    /// Only present when a token was supplied.
    pub client: Option<ClientSettings>,
    pub keys: FieldKeys,
    pub ledger: LedgerConfig,
    pub staging_dir: PathBuf,
}

pub(crate) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

/// Load `.env` from the working directory, falling back to
/// `~/.fulcrum-photo-sync/.env`. Variables already set win.
pub fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }
    if let Some(path) = dirs::home_dir().map(|h| h.join(".fulcrum-photo-sync").join(".env")) {
        if path.is_file() {
            let _ = dotenvy::from_path(&path);
        }
    }
}

fn ledger_config(conn: &ConnectionArgs) -> anyhow::Result<LedgerConfig> {
    let lookup_form_id = conn
        .lookup_form_id
        .clone()
        .filter(|id| !id.trim().is_empty());
    if conn.ledger == LedgerBackend::LookupTable && lookup_form_id.is_none() {
        anyhow::bail!(
            "--lookup-form-id (or FULCRUM_FORM_LOOK_UP) is required with the lookup ledger; \
             use --ledger sqlite for a local ledger"
        );
    }
    Ok(LedgerConfig {
        backend: conn.ledger,
        lookup_form_id,
        db_path: expand_tilde(&conn.ledger_db),
    })
}

fn client_settings(
    conn: &ConnectionArgs,
    token: String,
    report_url: String,
    lookup_latitude: f64,
    lookup_longitude: f64,
) -> ClientSettings {
    ClientSettings {
        base_url: conn.api_url.clone(),
        token,
        report_url,
        lookup_latitude,
        lookup_longitude,
        connect_timeout_secs: conn.connect_timeout,
    }
}

fn non_empty_token(token: &Option<String>) -> Option<String> {
    token.clone().filter(|t| !t.trim().is_empty())
}

impl Config {
    pub fn from_cli(args: SyncArgs) -> anyhow::Result<Self> {
        let conn = &args.connection;
        let token = non_empty_token(&conn.token)
            .ok_or_else(|| anyhow::anyhow!("--token (or FULCRUM_TOKEN) is required"))?;
        if args.form_id.trim().is_empty() {
            anyhow::bail!("--form-id (or FULCRUM_FORM_ID) must not be empty");
        }
        if args.concurrency == 0 {
            anyhow::bail!("--concurrency must be at least 1");
        }
        if args.watch_interval == Some(0) {
            anyhow::bail!("--watch-interval must be at least 1 second");
        }

        let ledger = ledger_config(conn)?;
        let update_window = parse_update_window(&args.updated_within)?;
        let keys = FieldKeys {
            project_number: args.project_number_field.clone(),
            field_visit_notes: args.notes_field.clone(),
            branch: args.branch_field.clone(),
            lookup_access_key: conn.lookup_access_key_field.clone(),
            lookup_project_number: conn.lookup_project_number_field.clone(),
        };

        Ok(Self {
            client: client_settings(
                conn,
                token,
                args.report_url.clone(),
                args.lookup_latitude,
                args.lookup_longitude,
            ),
            form_id: args.form_id.clone(),
            keys,
            ledger,
            archive_root: expand_tilde(&args.archive_root),
            fallback_root: args.fallback_root.as_deref().map(expand_tilde),
            staging_dir: expand_tilde(&conn.staging_dir),
            update_window,
            watch_interval: args.watch_interval,
            concurrency: args.concurrency,
            quality: args.quality,
            allow_duplicates: !args.no_duplicates,
            no_progress_bar: args.no_progress_bar,
            fail_on_record_errors: args.fail_on_record_errors,
        })
    }
}

impl StatusConfig {
    pub fn from_cli(args: StatusArgs) -> anyhow::Result<Self> {
        let conn = &args.connection;
        let ledger = ledger_config(conn)?;
        let token = non_empty_token(&conn.token);
        if ledger.backend == LedgerBackend::LookupTable && token.is_none() {
            anyhow::bail!("--token (or FULCRUM_TOKEN) is required to read the lookup ledger");
        }
        let defaults = FieldKeys::default();
        Ok(Self {
            client: token.map(|token| {
                client_settings(
                    conn,
                    token,
                    crate::fulcrum::client::DEFAULT_REPORT_URL.to_string(),
                    0.0,
                    0.0,
                )
            }),
            keys: FieldKeys {
                lookup_access_key: conn.lookup_access_key_field.clone(),
                lookup_project_number: conn.lookup_project_number_field.clone(),
                ..defaults
            },
            ledger,
            staging_dir: expand_tilde(&conn.staging_dir),
        })
    }
}

/// Parse `--updated-within`.
///
/// Accepts:
/// - `"none"` (any case): no window
/// - Relative interval: `"7d"` (records updated in the last 7 days)
/// - ISO date: `"2025-01-02"` (midnight local time)
/// - ISO datetime: `"2025-01-02T14:30:00"` (local time)
pub(crate) fn parse_update_window(s: &str) -> anyhow::Result<UpdateWindow> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("none") {
        return Ok(UpdateWindow::All);
    }
    if let Some(days_str) = s.strip_suffix('d') {
        if let Ok(days) = days_str.parse::<i64>() {
            if days <= 0 {
                anyhow::bail!("Interval '{}' must be a positive number of days", s);
            }
            return Ok(UpdateWindow::Within(chrono::Duration::days(days)));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(naive_dt) = date.and_hms_opt(0, 0, 0) {
            if let Some(dt) = naive_dt.and_local_timezone(Local).single() {
                return Ok(UpdateWindow::Since(dt.with_timezone(&Utc)));
            }
        }
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        if let Some(local) = dt.and_local_timezone(Local).single() {
            return Ok(UpdateWindow::Since(local.with_timezone(&Utc)));
        }
    }
    anyhow::bail!(
        "Cannot parse '{}' as an update window. Expected interval (7d), \
         ISO date (2025-01-02), datetime (2025-01-02T14:30:00), or none",
        s
    )
}
