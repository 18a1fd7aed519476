//! Voice transport seam and its songbird implementation.

use serenity::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use serenity::prelude::Mutex as SerenityMutex;
use songbird::input::HttpRequest;
use songbird::tracks::TrackHandle;
use songbird::{Call, Event, Songbird, TrackEvent};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::event_handlers::{SongEndNotifier, TrackEndNotifier};
use super::music_manager::{MusicError, MusicResult};

/// Joins voice channels.
#[async_trait]
pub trait VoiceTransport: Send + Sync {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> MusicResult<Arc<dyn TransportHandle>>;
}

/// A live voice connection for one guild.
///
/// `play` reports completion exactly once through the notifier, whether the
/// stream ended, failed, or was halted with `stop`.
#[async_trait]
pub trait TransportHandle: Send + Sync {
    async fn play(&self, stream_url: &str, on_end: TrackEndNotifier) -> MusicResult<()>;
    fn stop(&self);
    fn pause(&self) -> MusicResult<()>;
    fn resume(&self) -> MusicResult<()>;
    async fn disconnect(&self);
    fn is_playing(&self) -> bool;
    fn is_paused(&self) -> bool;
}

/// Bounded reconnect policy for streams that fail mid-play.
#[derive(Debug, Clone, Copy)]
pub struct StreamPolicy {
    pub retries: u32,
    pub retry_delay: Duration,
}

/// What to do with a stream that failed on its `attempt`th reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StreamRecovery {
    /// Reconnect, as attempt number `attempt`.
    Retry { attempt: u32 },
    /// Out of retries; the song counts as finished.
    GiveUp,
    /// The call moved on (skip, stop, another song); nothing to reconnect.
    Superseded,
}

impl StreamPolicy {
    /// `current` tells whether the failed playback is still the call's latest one.
    pub(crate) fn after_failure(&self, attempt: u32, current: bool) -> StreamRecovery {
        if !current {
            StreamRecovery::Superseded
        } else if attempt >= self.retries {
            StreamRecovery::GiveUp
        } else {
            StreamRecovery::Retry {
                attempt: attempt + 1,
            }
        }
    }
}

/// Songbird-backed transport.
pub struct SongbirdTransport {
    songbird: Arc<Songbird>,
    http: reqwest::Client,
    policy: StreamPolicy,
}

impl SongbirdTransport {
    pub fn new(songbird: Arc<Songbird>, http: reqwest::Client, policy: StreamPolicy) -> Self {
        Self {
            songbird,
            http,
            policy,
        }
    }
}

#[async_trait]
impl VoiceTransport for SongbirdTransport {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> MusicResult<Arc<dyn TransportHandle>> {
        let call = self
            .songbird
            .join(guild_id, channel_id)
            .await
            .map_err(|e| MusicError::JoinError(e.to_string()))?;

        info!("Joined voice channel {} in guild {}", channel_id, guild_id);

        Ok(Arc::new(SongbirdCall {
            inner: Arc::new(CallInner {
                guild_id,
                songbird: Arc::clone(&self.songbird),
                call,
                http: self.http.clone(),
                policy: self.policy,
                playback: Mutex::new(Playback::default()),
            }),
        }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Mode {
    #[default]
    Idle,
    Playing,
    Paused,
    /// The stream failed and a reconnect is pending.
    Reconnecting,
}

#[derive(Default)]
struct Playback {
    track: Option<TrackHandle>,
    generation: u64,
    mode: Mode,
}

impl Playback {
    fn pausable(&self) -> MusicResult<TrackHandle> {
        match (&self.track, self.mode) {
            (Some(track), Mode::Playing) => Ok(track.clone()),
            _ => Err(MusicError::NothingPlaying),
        }
    }

    fn resumable(&self) -> MusicResult<TrackHandle> {
        match (&self.track, self.mode) {
            (Some(track), Mode::Paused) => Ok(track.clone()),
            _ => Err(MusicError::NotPaused),
        }
    }

    fn finish(&mut self, generation: u64, mode: Mode) {
        if self.generation == generation {
            self.mode = mode;
            self.track = None;
        }
    }
}

pub(crate) struct CallInner {
    guild_id: GuildId,
    songbird: Arc<Songbird>,
    call: Arc<SerenityMutex<Call>>,
    http: reqwest::Client,
    policy: StreamPolicy,
    playback: Mutex<Playback>,
}

impl CallInner {
    fn playback(&self) -> MutexGuard<'_, Playback> {
        self.playback.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn policy(&self) -> StreamPolicy {
        self.policy
    }

    pub(crate) fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    /// Start `stream_url`, replacing whatever the call was rendering.
    pub(crate) async fn start(
        self: &Arc<Self>,
        stream_url: String,
        on_end: TrackEndNotifier,
        attempt: u32,
    ) -> MusicResult<()> {
        let input = HttpRequest::new(self.http.clone(), stream_url.clone());

        let handle = {
            let mut call = self.call.lock().await;
            call.play_only_input(input.into())
        };

        let generation = {
            let mut playback = self.playback();
            playback.generation += 1;
            playback.track = Some(handle.clone());
            playback.mode = Mode::Playing;
            playback.generation
        };

        let notifier =
            SongEndNotifier::new(Arc::clone(self), stream_url, on_end, attempt, generation);
        for event in [TrackEvent::End, TrackEvent::Error] {
            handle
                .add_event(Event::Track(event), notifier.clone())
                .map_err(|e| MusicError::PlaybackError(e.to_string()))?;
        }

        debug!(
            "Started stream in guild {} (attempt {}, generation {})",
            self.guild_id, attempt, generation
        );
        Ok(())
    }

    /// Whether `generation` is still the call's latest playback.
    pub(crate) fn is_current(&self, generation: u64) -> bool {
        self.playback().generation == generation
    }

    pub(crate) fn mark_idle(&self, generation: u64) {
        self.playback().finish(generation, Mode::Idle);
    }

    /// The failed track is gone; controls wait for the reconnect.
    pub(crate) fn mark_reconnecting(&self, generation: u64) {
        self.playback().finish(generation, Mode::Reconnecting);
    }

    fn halt(&self) {
        let mut playback = self.playback();
        playback.generation += 1;
        playback.mode = Mode::Idle;
        if let Some(track) = playback.track.take() {
            // A track that already finished is fine to "stop" again
            match track.stop() {
                Ok(_) | Err(songbird::error::ControlError::Finished) => (),
                Err(e) => warn!("Error stopping track in guild {}: {}", self.guild_id, e),
            }
        }
    }
}

/// One guild's songbird call.
pub struct SongbirdCall {
    inner: Arc<CallInner>,
}

#[async_trait]
impl TransportHandle for SongbirdCall {
    async fn play(&self, stream_url: &str, on_end: TrackEndNotifier) -> MusicResult<()> {
        self.inner.start(stream_url.to_string(), on_end, 0).await
    }

    fn stop(&self) {
        self.inner.halt();
    }

    fn pause(&self) -> MusicResult<()> {
        let mut playback = self.inner.playback();
        let track = playback.pausable()?;
        track
            .pause()
            .map_err(|e| MusicError::PlaybackError(e.to_string()))?;
        playback.mode = Mode::Paused;
        Ok(())
    }

    fn resume(&self) -> MusicResult<()> {
        let mut playback = self.inner.playback();
        let track = playback.resumable()?;
        track
            .play()
            .map_err(|e| MusicError::PlaybackError(e.to_string()))?;
        playback.mode = Mode::Playing;
        Ok(())
    }

    async fn disconnect(&self) {
        self.inner.halt();

        if let Err(e) = self.inner.songbird.remove(self.inner.guild_id).await {
            warn!(
                "Failed to leave voice channel in guild {}: {}",
                self.inner.guild_id, e
            );
        } else {
            info!("Left voice channel in guild {}", self.inner.guild_id);
        }
    }

    fn is_playing(&self) -> bool {
        matches!(
            self.inner.playback().mode,
            Mode::Playing | Mode::Reconnecting
        )
    }

    fn is_paused(&self) -> bool {
        self.inner.playback().mode == Mode::Paused
    }
}
