use std::{path::PathBuf, time::Duration};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("file-serving domain is not resolved yet")]
    DomainUnresolved,

    #[error("download failed with HTTP {0}")]
    HttpStatus(reqwest::StatusCode),

    #[error("download timed out after {}s", .0.as_secs())]
    DownloadTimeout(Duration),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("initial connection failed")]
    InitialConnect,

    #[error("giving up after {0} reconnect attempts")]
    ReconnectExhausted(u32),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
