// storage.rs
use std::{
    fmt,
    path::{Component, Path, PathBuf},
    str::FromStr,
};

use chrono::Utc;
use tokio::fs;
use uuid::Uuid;

use crate::{
    error::AppError,
    image_utils::{DEFAULT_QUALITY, NormalizedImage},
};

/// Folder inside the bucket, one per kind of upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPurpose {
    Bukti,
    Pengurus,
    Kegiatan,
    DutaGenre,
}

impl UploadPurpose {
    pub fn prefix(self) -> &'static str {
        match self {
            UploadPurpose::Bukti => "bukti",
            UploadPurpose::Pengurus => "pengurus",
            UploadPurpose::Kegiatan => "kegiatan",
            UploadPurpose::DutaGenre => "duta-genre",
        }
    }

    /// Registration screenshots are compressed harder than gallery pictures.
    pub fn quality(self) -> f32 {
        match self {
            UploadPurpose::Bukti => 0.7,
            _ => DEFAULT_QUALITY,
        }
    }
}

impl FromStr for UploadPurpose {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bukti" => Ok(UploadPurpose::Bukti),
            "pengurus" => Ok(UploadPurpose::Pengurus),
            "kegiatan" => Ok(UploadPurpose::Kegiatan),
            "duta-genre" => Ok(UploadPurpose::DutaGenre),
            other => Err(AppError::not_found(format!(
                "Tujuan unggahan tidak dikenal: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for UploadPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Local bucket served under `/uploads`.
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
    public_base_url: String,
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn public_url(&self, key: &str) -> String {
        format!("{}/uploads/{}", self.public_base_url, key)
    }

    /// Key of an object this bucket handed out, `None` for foreign URLs or
    /// anything that would resolve outside the bucket.
    pub fn key_from_url(&self, url: &str) -> Option<String> {
        let prefix = format!("{}/uploads/", self.public_base_url);
        let key = url.strip_prefix(&prefix)?;
        let key = key.split(['?', '#']).next().unwrap_or_default();
        if key.is_empty() {
            return None;
        }
        let safe = Path::new(key)
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        safe.then(|| key.to_string())
    }

    pub async fn put(&self, purpose: UploadPurpose, image: &NormalizedImage) -> Result<String, AppError> {
        let key = format!(
            "{}/{}-{}.webp",
            purpose.prefix(),
            Utc::now().timestamp_millis(),
            Uuid::new_v4()
        );
        let path = self.root.join(&key);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).await?;
        }
        fs::write(&path, &image.bytes).await?;

        log::info!(
            "Gambar {} disimpan sebagai {} ({} byte)",
            image.file_name,
            key,
            image.bytes.len()
        );
        Ok(self.public_url(&key))
    }

    /// Best-effort removal; failures are logged only.
    pub async fn remove_by_url(&self, url: &str) {
        let Some(key) = self.key_from_url(url) else {
            log::warn!("Lewati penghapusan berkas di luar bucket: {}", url);
            return;
        };
        match fs::remove_file(self.root.join(&key)).await {
            Ok(()) => log::info!("Berkas {} dihapus", key),
            Err(e) => log::warn!("Gagal menghapus berkas {}: {}", key, e),
        }
    }
}
