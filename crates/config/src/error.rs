use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("unsupported config format: .{0}")]
    UnsupportedFormat(String),

    #[error("missing credentials: {}", .0.join(", "))]
    MissingCredentials(Vec<&'static str>),

    #[error("invalid setting `{path}`: {message}")]
    InvalidSetting { path: &'static str, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;
