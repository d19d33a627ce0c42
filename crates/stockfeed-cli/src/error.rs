use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] stockfeed_core::ConfigError),

    #[error(transparent)]
    Feed(#[from] stockfeed_core::FeedError),

    #[error("unknown provider '{0}'")]
    UnknownProvider(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) | Self::UnknownProvider(_) => 2,
            Self::Feed(_) => 3,
            Self::Serialization(_) => 4,
            Self::Io(_) => 10,
        }
    }

    /// Stable machine-readable code for the error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "cli.config",
            Self::Feed(error) => error.code(),
            Self::UnknownProvider(_) => "cli.unknown_provider",
            Self::Serialization(_) => "cli.serialization",
            Self::Io(_) => "cli.io",
        }
    }
}
