use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

use crate::utils::Result;

/// Fixed prefix shared by every temp artifact so leftovers are easy to spot.
pub const TEMP_PREFIX: &str = "hevcwork-";

/// Builds a temp artifact path inside `dir` with a fresh random hex suffix.
///
/// The suffix is regenerated on every call so artifacts from the same job
/// never collide.
pub fn temp_artifact_path<P: AsRef<Path>>(dir: P, extension: &str) -> PathBuf {
    let suffix = Uuid::new_v4().simple().to_string();
    dir.as_ref()
        .join(format!("{}{}.{}", TEMP_PREFIX, &suffix[..8], extension))
}

/// Removes a temp artifact, tolerating one that was never written.
pub async fn remove_artifact(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!("Removed temp artifact: {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
