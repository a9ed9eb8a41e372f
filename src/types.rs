/// Rendition of a photo to download.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum PhotoQuality {
    #[default]
    Original,
    Large,
    Thumbnail,
}

impl PhotoQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhotoQuality::Original => "original",
            PhotoQuality::Large => "large",
            PhotoQuality::Thumbnail => "thumbnail",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Where processed access keys are recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LedgerBackend {
    /// Rows of the remote lookup form.
    #[value(name = "lookup")]
    LookupTable,
    /// Local SQLite database.
    Sqlite,
}
