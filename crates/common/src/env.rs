//! Environment/runtime helpers
//!
//! Sanity checks to ensure expected directories exist at startup.

/// Ensure the media root exists so attachment writes do not fail later.
pub async fn ensure_media_root(media_root: &str) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(media_root)
        .await
        .map_err(|e| anyhow::anyhow!("cannot create {media_root}: {e}"))?;
    Ok(())
}
