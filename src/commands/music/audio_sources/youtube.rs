//! `SearchResolver` backed by the `yt-dlp` command-line tool.

use serenity::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use super::{AudioSource, AudioSourceResult, SearchResolver, TrackMetadata};
use crate::commands::music::utils::music_manager::MusicError;

/// Resolves queries with `yt-dlp`, searching YouTube for free text.
#[derive(Debug, Clone)]
pub struct YoutubeResolver {
    program: String,
}

impl Default for YoutubeResolver {
    fn default() -> Self {
        Self {
            program: "yt-dlp".to_string(),
        }
    }
}

impl YoutubeResolver {
    /// Use a different `yt-dlp` executable.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// The argument `yt-dlp` is given for `query`.
    pub fn target(query: &str) -> String {
        let query = query.trim();
        if AudioSource::is_url(query) {
            query.to_string()
        } else {
            format!("ytsearch:{}", query)
        }
    }
}

#[async_trait]
impl SearchResolver for YoutubeResolver {
    async fn resolve(&self, query: &str) -> AudioSourceResult<TrackMetadata> {
        if query.trim().is_empty() {
            return Err(MusicError::ResolveError("Empty query".to_string()));
        }

        let target = Self::target(query);
        info!("Resolving '{}' with {}", target, self.program);

        let output = Command::new(&self.program)
            .args([
                "-j",            // Output as JSON
                "--no-playlist", // Don't process playlists
                "-f",
                "bestaudio",
                target.as_str(),
            ])
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| MusicError::ResolveError(format!("Failed to run {}: {}", self.program, e)))?;

        let metadata = TrackMetadata::try_from(output)?;
        debug!("Resolved '{}' to '{}'", query, metadata.title);
        Ok(metadata)
    }
}
