//! Streams a signed attachment URL to a file on disk.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use {
    courier_protocol::DownloadDescriptor,
    futures::StreamExt,
    tokio::{fs::File, io::AsyncWriteExt},
    tracing::debug,
};

use crate::error::{Error, Result};

/// Extension used when the attachment path has none.
const FALLBACK_EXTENSION: &str = "bin";

/// Name collisions tolerated within the same millisecond before giving up.
const MAX_NAME_ATTEMPTS: u64 = 16;

/// Writes attachments under a fixed directory, one file per download.
#[derive(Debug, Clone)]
pub struct Downloader {
    http: reqwest::Client,
    dir: PathBuf,
    account_id: String,
    timeout: Duration,
    scheme: &'static str,
}

impl Downloader {
    pub fn new(
        http: reqwest::Client,
        dir: impl Into<PathBuf>,
        account_id: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            dir: dir.into(),
            account_id: account_id.into(),
            timeout,
            scheme: "https",
        }
    }

    /// Use plain `http` for the file server, e.g. a local object store.
    #[must_use]
    pub fn with_insecure_scheme(mut self) -> Self {
        self.scheme = "http";
        self
    }

    /// Download `descriptor` from `domain` and return the written path.
    ///
    /// Fails without touching the network when the domain is unresolved. A
    /// failed download, including one that runs past the timeout, leaves no
    /// partial file behind.
    pub async fn download(
        &self,
        domain: Option<&str>,
        descriptor: &DownloadDescriptor,
        dialog_id: &str,
    ) -> Result<PathBuf> {
        let domain = domain.ok_or(Error::DomainUnresolved)?;
        let url = build_url(self.scheme, domain, descriptor);
        let ext = file_extension(&descriptor.relative_path);

        debug!(
            dialog_id,
            path = %descriptor.relative_path,
            expires = %descriptor.query_params.temp_url_expires,
            "downloading attachment"
        );

        self.fetch(&url, dialog_id, &ext)
            .await
            .map_err(|e| match e {
                Error::Http(e) if e.is_timeout() => Error::DownloadTimeout(self.timeout),
                other => other,
            })
    }

    async fn fetch(&self, url: &str, dialog_id: &str, ext: &str) -> Result<PathBuf> {
        let response = self.http.get(url).timeout(self.timeout).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus(status));
        }

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(Error::io(&self.dir))?;
        let (file, path) = self.create_output(dialog_id, ext).await?;

        match write_stream(file, response.bytes_stream(), &path).await {
            Ok(bytes) => {
                debug!(path = %path.display(), bytes, "attachment written");
                Ok(path)
            },
            Err(e) => {
                let _ = tokio::fs::remove_file(&path).await;
                Err(e)
            },
        }
    }

    /// Create a fresh output file, stepping the timestamp past collisions.
    async fn create_output(&self, dialog_id: &str, ext: &str) -> Result<(File, PathBuf)> {
        let now = now_millis();
        let mut last_err = None;
        for offset in 0..MAX_NAME_ATTEMPTS {
            let name = output_file_name(&self.account_id, dialog_id, now + offset, ext);
            let path = self.dir.join(name);
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => return Ok((file, path)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => last_err = Some((path, e)),
                Err(e) => return Err(Error::io(path)(e)),
            }
        }
        let (path, source) = last_err.unwrap_or_else(|| {
            (
                self.dir.clone(),
                std::io::Error::from(ErrorKind::AlreadyExists),
            )
        });
        Err(Error::Io { path, source })
    }
}

async fn write_stream(
    mut file: File,
    stream: impl futures::Stream<Item = reqwest::Result<bytes::Bytes>>,
    path: &Path,
) -> Result<u64> {
    let mut stream = std::pin::pin!(stream);
    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await.map_err(Error::io(path))?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(Error::io(path))?;
    Ok(written)
}

/// Absolute, time-limited URL for a download descriptor.
#[must_use]
pub fn download_url(domain: &str, descriptor: &DownloadDescriptor) -> String {
    build_url("https", domain, descriptor)
}

fn build_url(scheme: &str, domain: &str, descriptor: &DownloadDescriptor) -> String {
    format!(
        "{scheme}://{domain}{}?temp_url_sig={}&temp_url_expires={}",
        descriptor.relative_path,
        urlencoding::encode(&descriptor.query_params.temp_url_sig),
        urlencoding::encode(&descriptor.query_params.temp_url_expires),
    )
}

/// Lower-cased extension of the last path segment, or `bin` when there is none.
#[must_use]
pub fn file_extension(relative_path: &str) -> String {
    let name = relative_path.rsplit('/').next().unwrap_or_default();
    match name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => ext.to_lowercase(),
        _ => FALLBACK_EXTENSION.to_string(),
    }
}

/// `<account>_<dialog>_<millis>.<ext>`
#[must_use]
pub fn output_file_name(account_id: &str, dialog_id: &str, timestamp_ms: u64, ext: &str) -> String {
    format!("{account_id}_{dialog_id}_{timestamp_ms}.{ext}")
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
