use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;
use url::Url;

use crate::{BeatlineError, Result};

/// Retrieves the encoded bytes behind a resource URL.
///
/// A non-success response must fail with [`BeatlineError::Fetch`].
pub trait ResourceFetcher {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Vec<u8>>>;
}

/// Fetcher preferring its cache over the network.
///
/// `http(s)` URLs go through reqwest, `file` URLs and bare paths are read from
/// disk, relative paths resolving against the base directory. A resource that
/// loaded once is served from memory afterwards.
#[derive(Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
    base_dir: Option<PathBuf>,
    cache: Mutex<HashMap<String, Vec<u8>>>,
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

enum Location {
    Remote(Url),
    Local(PathBuf),
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            base_dir: None,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    /// Number of resources held in the cache.
    pub fn cached_count(&self) -> usize {
        self.cache.lock().map(|cache| cache.len()).unwrap_or(0)
    }

    fn locate(&self, url: &str) -> Result<Location> {
        match Url::parse(url) {
            Ok(parsed) if parsed.scheme() == "http" || parsed.scheme() == "https" => {
                Ok(Location::Remote(parsed))
            }
            Ok(parsed) if parsed.scheme() == "file" => parsed
                .to_file_path()
                .map(Location::Local)
                .map_err(|_| BeatlineError::Fetch {
                    url: url.to_string(),
                    status: 400,
                }),
            _ => {
                let path = Path::new(url);
                Ok(Location::Local(match &self.base_dir {
                    Some(base) if path.is_relative() => base.join(path),
                    _ => path.to_path_buf(),
                }))
            }
        }
    }

    fn cached(&self, url: &str) -> Result<Option<Vec<u8>>> {
        let cache = self.cache.lock().map_err(|_| BeatlineError::Poisoned("fetch cache"))?;
        Ok(cache.get(url).cloned())
    }

    fn store(&self, url: &str, bytes: &[u8]) -> Result<()> {
        let mut cache = self.cache.lock().map_err(|_| BeatlineError::Poisoned("fetch cache"))?;
        cache.insert(url.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn fetch_remote(&self, url: Url) -> Result<Vec<u8>> {
        let resp = self.client.get(url.clone()).send().await?;
        if !resp.status().is_success() {
            return Err(BeatlineError::Fetch {
                url: url.to_string(),
                status: resp.status().as_u16(),
            });
        }
        Ok(resp.bytes().await?.to_vec())
    }

    async fn fetch_local(&self, url: &str, path: PathBuf) -> Result<Vec<u8>> {
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(BeatlineError::Fetch {
                url: url.to_string(),
                status: 404,
            }),
            Err(e) => Err(e.into()),
        }
    }
}

impl ResourceFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        if let Some(bytes) = self.cached(url)? {
            debug!(url, "serving resource from cache");
            return Ok(bytes);
        }

        let bytes = match self.locate(url)? {
            Location::Remote(remote) => self.fetch_remote(remote).await?,
            Location::Local(path) => self.fetch_local(url, path).await?,
        };
        debug!(url, len = bytes.len(), "fetched resource");

        self.store(url, &bytes)?;
        Ok(bytes)
    }
}
