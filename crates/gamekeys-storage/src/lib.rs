//! HTTP page fetching + raw-page archive for the gamekeys pipeline.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::StatusCode;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs;
use tracing::{info_span, Instrument};

pub const CRATE_NAME: &str = "gamekeys-storage";

/// Raw-page archive laid out as `<host>/<YYYY-MM-DD>/<sha256>.html`, kept
/// for markup-drift debugging. Files are named by content hash, so a day
/// of refetches of an unchanged page costs one file.
#[derive(Debug, Clone)]
pub struct PageArchive {
    root: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ArchivedPage {
    pub path: PathBuf,
    pub content_hash: String,
    /// False when an identical body was already on disk for that day.
    pub fresh: bool,
}

impl PageArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn content_hash(body: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(body.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn page_path(&self, host: &str, fetched_on: NaiveDate, content_hash: &str) -> PathBuf {
        self.root
            .join(host)
            .join(fetched_on.format("%Y-%m-%d").to_string())
            .join(format!("{content_hash}.html"))
    }

    /// Archives one fetched page body. The write goes through a sibling
    /// temp file and a rename; because the final name is the content hash,
    /// concurrent writers of the same body produce identical files and the
    /// rename order does not matter.
    pub async fn archive_page(
        &self,
        host: &str,
        fetched_at: DateTime<Utc>,
        body: &str,
    ) -> anyhow::Result<ArchivedPage> {
        let content_hash = Self::content_hash(body);
        let path = self.page_path(host, fetched_at.date_naive(), &content_hash);

        if fs::try_exists(&path)
            .await
            .with_context(|| format!("checking archived page {}", path.display()))?
        {
            return Ok(ArchivedPage {
                path,
                content_hash,
                fresh: false,
            });
        }

        let parent = path.parent().context("archive path has no parent")?;
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating archive directory {}", parent.display()))?;

        let temp_path = parent.join(format!(".{content_hash}.tmp"));
        fs::write(&temp_path, body.as_bytes())
            .await
            .with_context(|| format!("writing archived page {}", temp_path.display()))?;
        fs::rename(&temp_path, &path)
            .await
            .with_context(|| format!("publishing archived page {}", path.display()))?;

        Ok(ArchivedPage {
            path,
            content_hash,
            fresh: true,
        })
    }
}

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub user_agent: Option<String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            user_agent: None,
        }
    }
}

/// One-shot page fetcher. A fetch is a single attempt bounded by the client
/// timeout; failed URLs are reported to the caller, never retried here.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: StatusCode,
    pub final_url: String,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String },
}

impl HttpFetcher {
    pub fn new(config: HttpClientConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout);

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        let client = builder.build().context("building reqwest client")?;
        Ok(Self { client })
    }

    pub async fn fetch_page(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let span = info_span!("http_fetch", url);
        async {
            let resp = self.client.get(url).send().await?;
            let status = resp.status();
            let final_url = resp.url().to_string();

            if !status.is_success() {
                return Err(FetchError::HttpStatus {
                    status: status.as_u16(),
                    url: final_url,
                });
            }

            let body = resp.text().await?;
            Ok(FetchedPage {
                status,
                final_url,
                body,
            })
        }
        .instrument(span)
        .await
    }
}
