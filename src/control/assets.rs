//! Static assets for the control page

use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::error::{Error, Result};

/// Control page template file name
pub const INDEX_FILE: &str = "index.html";

/// Player script file name
pub const SCRIPT_FILE: &str = "jsmpg.js";

/// Control page template and player script, loaded once at startup
#[derive(Debug, Clone)]
pub struct Assets {
    pub index_template: String,
    pub script: Bytes,
}

impl Assets {
    /// Build from in-memory content
    pub fn new(index_template: impl Into<String>, script: impl Into<Bytes>) -> Self {
        Self {
            index_template: index_template.into(),
            script: script.into(),
        }
    }

    /// Read both assets from `dir`
    pub async fn load(dir: &Path) -> Result<Self> {
        let index_template = String::from_utf8_lossy(&read(dir.join(INDEX_FILE)).await?).into_owned();
        let script = read(dir.join(SCRIPT_FILE)).await?;

        tracing::debug!(
            dir = %dir.display(),
            index_len = index_template.len(),
            script_len = script.len(),
            "Assets loaded"
        );

        Ok(Self {
            index_template,
            script: Bytes::from(script),
        })
    }
}

async fn read(path: PathBuf) -> Result<Vec<u8>> {
    tokio::fs::read(&path)
        .await
        .map_err(|source| Error::Asset { path, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_missing_dir() {
        let dir = std::env::temp_dir().join("robocast-no-such-assets");
        let err = Assets::load(&dir).await.unwrap_err();

        match err {
            Error::Asset { path, .. } => assert!(path.ends_with(INDEX_FILE)),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_load_missing_player_script() {
        let dir = std::env::temp_dir().join(format!(
            "robocast-assets-noscript-{}",
            std::process::id()
        ));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join(INDEX_FILE), "<p></p>").await.unwrap();

        let err = Assets::load(&dir).await.unwrap_err();
        match err {
            Error::Asset { path, .. } => assert!(path.ends_with(SCRIPT_FILE)),
            other => panic!("unexpected error: {}", other),
        }

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn test_load() {
        let dir = std::env::temp_dir().join(format!("robocast-assets-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join(INDEX_FILE), "<p>$WIDTH</p>").await.unwrap();
        tokio::fs::write(dir.join(SCRIPT_FILE), "var x;").await.unwrap();

        let assets = Assets::load(&dir).await.unwrap();
        assert_eq!(assets.index_template, "<p>$WIDTH</p>");
        assert_eq!(assets.script, Bytes::from_static(b"var x;"));

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
