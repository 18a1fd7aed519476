//! Defines the `TrackMetadata` struct, the resolver's view of a playable track,
//! and its conversion from `yt-dlp` output.

use crate::commands::music::utils::music_manager::MusicError;
use serde::{Deserialize, Serialize};
use std::process::Output;
use std::time::Duration;

/// Metadata for a playable track.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackMetadata {
    /// The title of the track.
    pub title: String,
    /// Direct media URL handed to the voice transport.
    pub stream_url: String,
    /// The page the track was found on, if any.
    pub webpage_url: Option<String>,
    /// The duration of the track, if available.
    #[serde(with = "humantime_serde")]
    pub duration: Option<Duration>,
    /// URL to a thumbnail image for the track, if available.
    pub thumbnail: Option<String>,
}

impl TrackMetadata {
    /// Parse one `yt-dlp -j` document.
    pub fn from_json(raw: &str) -> Result<Self, MusicError> {
        let metadata_json: serde_json::Value = serde_json::from_str(raw).map_err(|e| {
            MusicError::ResolveError(format!("Failed to parse video metadata: {}", e))
        })?;

        let stream_url = metadata_json["url"]
            .as_str()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| MusicError::ResolveError("No playable stream found".to_string()))?
            .to_string();

        let title = metadata_json["title"]
            .as_str()
            .unwrap_or("Unknown Title")
            .to_string();

        let duration = metadata_json["duration"]
            .as_f64()
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok());

        let webpage_url = metadata_json["webpage_url"].as_str().map(|s| s.to_string());
        let thumbnail = metadata_json["thumbnail"].as_str().map(|s| s.to_string());

        Ok(TrackMetadata {
            title,
            stream_url,
            webpage_url,
            duration,
            thumbnail,
        })
    }
}

/// Converts the output of `yt-dlp -j` into `TrackMetadata`.
///
/// Searches print nothing when there are no results, so empty output is a
/// resolve failure rather than a parse error.
impl TryFrom<Output> for TrackMetadata {
    type Error = MusicError;

    fn try_from(value: Output) -> Result<Self, Self::Error> {
        let stdout = String::from_utf8_lossy(&value.stdout);

        match stdout.lines().find(|line| !line.trim().is_empty()) {
            Some(line) => Self::from_json(line),
            None if !value.status.success() => {
                let stderr = String::from_utf8_lossy(&value.stderr);
                Err(MusicError::ResolveError(format!(
                    "yt-dlp failed: {}",
                    stderr.trim()
                )))
            }
            None => Err(MusicError::ResolveError("No results found".to_string())),
        }
    }
}
