//! Resolution of user queries into playable streams.
//!
//! The player only depends on the [`SearchResolver`] trait; `yt-dlp` backs the
//! production implementation.

/// Submodule defining the `TrackMetadata` struct produced by resolvers.
pub(crate) mod track_metadata;
/// Submodule implementing `SearchResolver` on top of `yt-dlp`.
pub(crate) mod youtube;

use crate::commands::music::utils::music_manager::MusicError;
use serenity::async_trait;
use url::Url;

pub use track_metadata::TrackMetadata;
pub use youtube::YoutubeResolver;

/// A specialized `Result` type for operations within the `audio_sources` module.
pub type AudioSourceResult<T> = Result<T, MusicError>;

/// Turns a free-text query (or a direct URL) into a playable stream.
///
/// Implementations must not touch any guild state; the player calls this
/// before it takes any lock.
#[async_trait]
pub trait SearchResolver: Send + Sync {
    /// Resolve `query` to the first matching track, or fail with
    /// [`MusicError::ResolveError`] when nothing matches.
    async fn resolve(&self, query: &str) -> AudioSourceResult<TrackMetadata>;
}

/// A utility struct providing general helper functions related to audio sources.
pub struct AudioSource;

impl AudioSource {
    /// Performs a basic check if the input string can be parsed as a URL.
    /// Does not validate if the URL is actually reachable.
    pub fn is_url(input: &str) -> bool {
        Url::parse(input).is_ok_and(|url| matches!(url.scheme(), "http" | "https"))
    }
}
