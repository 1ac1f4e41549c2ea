//! Temporary local copy of a downloaded voice note.
//!
//! The file is owned by exactly one handling invocation and removed when
//! the guard is dropped, whichever way the invocation ends.

use std::path::{Path, PathBuf};

use tracing::{info, warn};
use uuid::Uuid;

/// Container format of a voice note: file extension plus upload MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub extension: &'static str,
    pub mime_type: &'static str,
}

impl AudioFormat {
    /// Telegram voice notes are OGG Opus unless they say otherwise.
    pub const OGG: AudioFormat = AudioFormat { extension: "ogg", mime_type: "audio/ogg" };

    /// Pick a format from the MIME type Telegram declared for the file.
    pub fn from_mime(mime: Option<&str>) -> Self {
        let Some(mime) = mime else {
            return Self::OGG;
        };
        let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        match essence.as_str() {
            "audio/mpeg" | "audio/mp3" => AudioFormat { extension: "mp3", mime_type: "audio/mpeg" },
            "audio/mp4" | "audio/m4a" | "audio/x-m4a" => AudioFormat { extension: "m4a", mime_type: "audio/mp4" },
            "audio/wav" | "audio/x-wav" | "audio/wave" => AudioFormat { extension: "wav", mime_type: "audio/wav" },
            _ => Self::OGG,
        }
    }
}

/// A uniquely named file path, deleted on drop if it exists.
#[derive(Debug)]
pub struct TempArtifact {
    path: PathBuf,
}

impl TempArtifact {
    /// Reserve `<uuid>.<extension>` under `dir`. Nothing is created on disk.
    pub fn reserve(dir: &Path, extension: &str) -> Self {
        let path = dir.join(format!("{}.{}", Uuid::new_v4(), extension));
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => info!("Temporary file {} removed", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove temporary file {}: {e}", self.path.display()),
        }
    }
}
