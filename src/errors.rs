use thiserror::Error;

#[derive(Debug, Error)]
pub enum SheetPilotError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("LLM provider error: {0}")]
    LlmProvider(String),

    #[error("SSE parsing error: {0}")]
    SseParsing(String),

    #[error("Invalid cell address: {0}")]
    InvalidAddress(String),

    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Cell outside playground area")]
    OutsidePlayground,

    #[error("No playground area selected")]
    NoPlayground,

    #[error("Playground area {range} has {cells} cells; the limit is {max}")]
    PlaygroundTooLarge { range: String, cells: u64, max: u64 },

    #[error("Spreadsheet host error: {0}")]
    Host(String),

    #[error("Unrecognized action: {0}")]
    UnrecognizedAction(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

pub type SheetPilotResult<T> = Result<T, SheetPilotError>;
