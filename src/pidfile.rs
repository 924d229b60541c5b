//! Startup PID file: written once the process has a final PID, unlinked on
//! clean shutdown.

use std::path::{Path, PathBuf};

use crate::error::ServerError;

pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub fn write(path: &Path) -> Result<PidFile, ServerError> {
        std::fs::write(path, format!("{}\n", std::process::id())).map_err(|source| {
            ServerError::PidFile {
                path: path.to_path_buf(),
                source,
            }
        })?;
        Ok(PidFile {
            path: path.to_path_buf(),
        })
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
