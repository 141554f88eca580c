use std::fs;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use log::{debug, info, warn};
use reqwest::Client;
use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::engine::models::{Release, TagField};
use crate::util::{SpeedSampler, progress_percent};

/// Bodies are written and reported in slices of this size.
pub const CHUNK_SIZE: usize = 8 * 1024;

/// Sent on every request; some release backends reject default agents.
pub const DEFAULT_USER_AGENT: &str = "StereoMix-Launcher";

/// Snapshot handed to progress callbacks after every chunk.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DownloadProgress {
    pub downloaded: u64,
    /// Content-Length, or 1 when the server did not send one.
    pub total: u64,
    pub percent: f32,
    /// MB/s, resampled at most every 0.2s.
    pub speed: f64,
}

#[derive(Clone)]
pub struct NetworkClient {
    client: Client,
}

impl NetworkClient {
    pub fn new(user_agent: &str) -> Self {
        let client = Client::builder()
            .user_agent(user_agent.to_owned())
            .connect_timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|err| {
                warn!("network client: falling back to default HTTP client configuration ({err})");
                Client::new()
            });
        Self { client }
    }

    async fn get_text(&self, url: &str) -> Result<String, String> {
        self.client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("request to {url} failed: {e}"))?
            .error_for_status()
            .map_err(|e| format!("release endpoint error: {e}"))?
            .text()
            .await
            .map_err(|e| format!("release body error: {e}"))
    }

    /// Fetch and parse the release document behind `endpoint`.
    pub async fn fetch_release(&self, endpoint: &str, field: TagField) -> Result<Release, String> {
        let body = self.get_text(endpoint).await?;
        let release = Release::parse(body, field)?;
        debug!(
            "release: {} -> tag {} with {} assets",
            endpoint,
            release.tag,
            release.assets.len()
        );
        Ok(release)
    }

    /// Latest tag published at `endpoint`; failures are logged and yield `None`.
    #[allow(dead_code)]
    pub async fn latest_tag(&self, endpoint: &str, field: TagField) -> Option<String> {
        match self.fetch_release(endpoint, field).await {
            Ok(release) => Some(release.tag),
            Err(err) => {
                warn!("release: latest tag lookup failed: {err}");
                None
            }
        }
    }

    /// URL of the first asset at `endpoint` ending with `extension`.
    #[allow(dead_code)]
    pub async fn download_url_for(
        &self,
        endpoint: &str,
        field: TagField,
        extension: &str,
    ) -> Option<String> {
        match self.fetch_release(endpoint, field).await {
            Ok(release) => release
                .asset_for(extension)
                .map(|asset| asset.download_url.clone()),
            Err(err) => {
                warn!("release: asset lookup failed: {err}");
                None
            }
        }
    }

    /// Stream `url` into `dest`, calling `progress` after every chunk.
    ///
    /// The destination is removed again if anything goes wrong.
    pub async fn download_to_path<F>(
        &self,
        url: &str,
        dest: &Path,
        mut progress: F,
    ) -> Result<(), String>
    where
        F: FnMut(DownloadProgress),
    {
        let result = self.stream_to_file(url, dest, &mut progress).await;
        if result.is_err() && dest.exists() {
            if let Err(err) = tokio::fs::remove_file(dest).await {
                warn!("download: failed to remove partial {}: {err}", dest.display());
            }
        }
        result
    }

    async fn stream_to_file<F>(
        &self,
        url: &str,
        dest: &Path,
        progress: &mut F,
    ) -> Result<(), String>
    where
        F: FnMut(DownloadProgress),
    {
        info!("download: {} -> {}", url, dest.display());
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("download request failed: {e}"))?
            .error_for_status()
            .map_err(|e| format!("download status error: {e}"))?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| format!("failed to create download dir: {e}"))?;
        }
        let mut file = File::create(dest)
            .await
            .map_err(|e| format!("failed to create file: {e}"))?;

        let declared = response.content_length();
        let total = declared.unwrap_or(1);
        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;
        let mut sampler = SpeedSampler::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| format!("stream error: {e}"))?;
            for slice in chunk.chunks(CHUNK_SIZE) {
                file.write_all(slice)
                    .await
                    .map_err(|e| format!("write error: {e}"))?;
                downloaded += slice.len() as u64;
                progress(DownloadProgress {
                    downloaded,
                    total,
                    percent: progress_percent(downloaded, total),
                    speed: sampler.sample(downloaded),
                });
            }
        }

        file.flush()
            .await
            .map_err(|e| format!("flush error: {e}"))?;

        if let Some(expected) = declared
            && downloaded < expected
        {
            return Err(format!(
                "download incomplete: received {downloaded} of {expected} bytes"
            ));
        }

        debug!("download: finished {} ({} bytes)", dest.display(), downloaded);
        Ok(())
    }
}

/// Compare the SHA-256 of `path` against a lowercase or uppercase hex digest.
pub fn verify_sha256(path: &Path, expected: &str) -> Result<(), String> {
    let mut file = fs::File::open(path).map_err(|e| format!("checksum open error: {e}"))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let read = file
            .read(&mut buf)
            .map_err(|e| format!("checksum read error: {e}"))?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    let actual = format!("{:x}", hasher.finalize());
    if actual != expected.to_lowercase() {
        return Err(format!(
            "checksum mismatch: expected {expected}, got {actual}"
        ));
    }
    Ok(())
}
