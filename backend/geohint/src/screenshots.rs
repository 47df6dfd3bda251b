//! Screenshot store — writes captured views to disk as
//! `screenshot_<unix-millis>.jpg`.

use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::errors::Result;

/// URL prefix under which the page serves the saved files.
pub const PUBLIC_PREFIX: &str = "/screenshots";

#[derive(Debug, Clone)]
pub struct ScreenshotStore {
    dir: PathBuf,
}

impl ScreenshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Decode a base64 payload (a bare string or a `data:` URL) and save it.
    pub async fn save_base64(&self, payload: &str) -> Result<String> {
        let encoded = match payload.split_once(";base64,") {
            Some((prefix, rest)) if prefix.starts_with("data:") => rest,
            _ => payload,
        };
        let bytes = STANDARD.decode(encoded.trim())?;
        self.save_bytes(&bytes).await
    }

    /// Save raw image bytes; returns the public path of the new file.
    pub async fn save_bytes(&self, bytes: &[u8]) -> Result<String> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let millis = Utc::now().timestamp_millis();
        let mut suffix = 0u32;
        loop {
            let filename = if suffix == 0 {
                format!("screenshot_{millis}.jpg")
            } else {
                format!("screenshot_{millis}_{suffix}.jpg")
            };
            let path = self.dir.join(&filename);

            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(mut file) => {
                    file.write_all(bytes).await?;
                    file.flush().await?;
                    info!("Saved screenshot {}", path.display());
                    return Ok(format!("{PUBLIC_PREFIX}/{filename}"));
                }
                // Two captures in the same millisecond.
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => suffix += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }
}
