use poise::serenity_prelude as serenity;
use serenity::client::Context;
use serenity::model::id::{ChannelId, GuildId};
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard, oneshot};
use tracing::{debug, info};

use crate::commands::music::audio_sources::SearchResolver;
use crate::config::PlayerConfig;

use super::message_tracker::{MessageTracker, UiCommand};
use super::messaging::Messenger;
use super::queue_manager::{
    GuildSlot, GuildState, GuildStore, PlayId, PlaybackState, QueueSnapshot, Song, SongId,
};
use super::transport::{TransportHandle, VoiceTransport};

/// Errors that can occur during music operations
#[derive(Error, Debug)]
pub enum MusicError {
    #[error("Not in a guild")]
    NotInGuild,

    #[error("Failed to join voice channel: {0}")]
    JoinError(String),

    #[error("Not connected to a voice channel")]
    NotConnected,

    #[error("User is not in a voice channel")]
    UserNotInVoiceChannel,

    #[error("No results: {0}")]
    ResolveError(String),

    #[error("Playback error: {0}")]
    PlaybackError(String),

    #[error("Messaging error: {0}")]
    MessagingError(String),

    #[error("No music is currently playing")]
    NothingPlaying,

    #[error("No music is currently paused")]
    NotPaused,

    #[error("No songs to shuffle")]
    QueueEmpty,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for music operations
pub type MusicResult<T> = Result<T, MusicError>;

/// A request to play `query` in a guild.
#[derive(Debug, Clone)]
pub struct PlayRequest {
    pub query: String,
    pub voice_channel: ChannelId,
    pub text_channel: ChannelId,
    pub requested_by: Option<String>,
}

/// Outcome of [`Player::enqueue`].
#[derive(Debug, Clone, PartialEq)]
pub enum Enqueued {
    /// The guild was idle and the song started right away.
    PlayingNow(Song),
    /// The song waits behind others; `position` is 1-based among the waiting songs.
    Queued { song: Song, position: usize },
}

struct PlayerInner {
    store: GuildStore,
    resolver: Arc<dyn SearchResolver>,
    transport: Arc<dyn VoiceTransport>,
    messenger: Arc<dyn Messenger>,
    config: PlayerConfig,
    // Serializes joining a guild's voice channel against leaving it
    voice_gates: DashMap<GuildId, Arc<Mutex<()>>>,
    next_song: AtomicU64,
    next_play: AtomicU64,
}

/// The network half of closing a session, run after the guild lock is released.
pub(crate) struct Teardown {
    player: Player,
    guild_id: GuildId,
    transport: Option<Arc<dyn TransportHandle>>,
    done: oneshot::Receiver<()>,
    gate: OwnedMutexGuard<()>,
}

impl Teardown {
    pub(crate) async fn run(self) {
        let Teardown {
            player,
            guild_id,
            transport,
            done,
            gate,
        } = self;

        if let Some(transport) = transport {
            transport.stop();
            transport.disconnect().await;
        }

        if done.await.is_err() {
            debug!("Message tracker for guild {} was already gone", guild_id);
        }

        drop(gate);
        player.prune_voice_gate(guild_id);
    }
}

/// Per-guild music player: the entry point for every playback operation.
///
/// Cheap to clone; all clones share the same guild sessions.
#[derive(Clone)]
pub struct Player {
    inner: Arc<PlayerInner>,
}

impl Player {
    pub fn new(
        resolver: Arc<dyn SearchResolver>,
        transport: Arc<dyn VoiceTransport>,
        messenger: Arc<dyn Messenger>,
        config: PlayerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(PlayerInner {
                store: GuildStore::new(),
                resolver,
                transport,
                messenger,
                config,
                voice_gates: DashMap::new(),
                next_song: AtomicU64::new(1),
                next_play: AtomicU64::new(1),
            }),
        }
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &GuildStore {
        &self.inner.store
    }

    pub(crate) fn next_play_id(&self) -> PlayId {
        PlayId::new(self.inner.next_play.fetch_add(1, Ordering::Relaxed))
    }

    fn next_song_id(&self) -> SongId {
        SongId::new(self.inner.next_song.fetch_add(1, Ordering::Relaxed))
    }

    fn voice_gate(&self, guild_id: GuildId) -> Arc<Mutex<()>> {
        Arc::clone(self.inner.voice_gates.entry(guild_id).or_default().value())
    }

    /// Forget the guild's gate unless a join or teardown still holds it.
    fn prune_voice_gate(&self, guild_id: GuildId) {
        self.inner
            .voice_gates
            .remove_if(&guild_id, |_, gate| Arc::strong_count(gate) == 1);
    }

    /// Resolve and queue a song, starting playback if the guild is idle.
    pub async fn enqueue(&self, guild_id: GuildId, request: PlayRequest) -> MusicResult<Enqueued> {
        let metadata = self.inner.resolver.resolve(&request.query).await?;
        let song = Song::new(self.next_song_id(), metadata, request.requested_by.clone());
        info!("Resolved '{}' to '{}' for guild {}", request.query, song.title, guild_id);

        // A slot closed by a concurrent stop/reap is gone from the store; retry once
        for _ in 0..2 {
            let slot = self.session(guild_id, &request).await?;

            let (outcome, start) = {
                let mut state = slot.lock().await;
                if state.is_closed() {
                    debug!("Session for guild {} closed under us, reconnecting", guild_id);
                    continue;
                }

                let position = state.push(song.clone());
                if state.current.is_none() {
                    let start = self.advance(&slot, &mut state);
                    (Enqueued::PlayingNow(song.clone()), start)
                } else {
                    state.notify(UiCommand::SongQueued {
                        song_id: song.id,
                        title: song.title.clone(),
                    });
                    info!(
                        "Queued '{}' at position {} in guild {}",
                        song.title, position, guild_id
                    );
                    (
                        Enqueued::Queued {
                            song: song.clone(),
                            position,
                        },
                        None,
                    )
                }
            };

            if let Some(start) = start {
                debug!("Starting '{}' in guild {}", start.song().title, guild_id);
                self.drive(&slot, start).await;
            }
            return Ok(outcome);
        }

        Err(MusicError::NotConnected)
    }

    /// The guild's live session, joining `request.voice_channel` if there is none.
    async fn session(&self, guild_id: GuildId, request: &PlayRequest) -> MusicResult<Arc<GuildSlot>> {
        if let Some(slot) = self.store().get(guild_id) {
            return Ok(slot);
        }

        let gate = self.voice_gate(guild_id);
        let joining = gate.lock().await;

        // Another join, or a teardown, may have finished while we waited
        if let Some(slot) = self.store().get(guild_id) {
            return Ok(slot);
        }

        let transport = match self
            .inner
            .transport
            .connect(guild_id, request.voice_channel)
            .await
        {
            Ok(transport) => transport,
            Err(e) => {
                drop(joining);
                drop(gate);
                self.prune_voice_gate(guild_id);
                return Err(e);
            }
        };

        let (slot, created) = self.store().create_or_get(
            guild_id,
            request.text_channel,
            Arc::clone(&transport),
            || {
                MessageTracker::new(
                    guild_id,
                    request.text_channel,
                    Arc::clone(&self.inner.messenger),
                    self.config().message_scan_limit,
                )
                .spawn()
            },
        );

        if created {
            info!("Started session for guild {}", guild_id);
        } else {
            debug!("Guild {} already had a session, reusing it", guild_id);
        }

        Ok(slot)
    }

    /// Stop playback, clear the queue, leave the channel and clean up messages.
    pub async fn stop(&self, guild_id: GuildId) -> MusicResult<()> {
        let slot = self
            .store()
            .get(guild_id)
            .ok_or(MusicError::NothingPlaying)?;

        let teardown = {
            let mut state = slot.lock().await;
            if state.is_closed() {
                return Err(MusicError::NothingPlaying);
            }
            self.close_session(&slot, &mut state).await
        };

        teardown.run().await;
        info!("Stopped playback in guild {}", guild_id);
        Ok(())
    }

    /// Close the session under its lock: no later operation can see it live.
    /// Rejoining the guild waits until the returned teardown has run.
    pub(crate) async fn close_session(
        &self,
        slot: &Arc<GuildSlot>,
        state: &mut GuildState,
    ) -> Teardown {
        let gate = self.voice_gate(slot.guild_id()).lock_owned().await;

        let transport = state.close();
        let (done_tx, done_rx) = oneshot::channel();
        state.notify(UiCommand::SessionEnded {
            done: Some(done_tx),
        });
        self.store().remove(slot.guild_id(), slot);

        Teardown {
            player: self.clone(),
            guild_id: slot.guild_id(),
            transport,
            done: done_rx,
            gate,
        }
    }

    /// Halt the current song; the scheduler moves on to the next one.
    pub async fn skip(&self, guild_id: GuildId) -> MusicResult<Song> {
        let slot = self
            .store()
            .get(guild_id)
            .ok_or(MusicError::NothingPlaying)?;

        let song = {
            let mut state = slot.lock().await;
            if state.is_closed() {
                return Err(MusicError::NothingPlaying);
            }
            let transport = state.transport.clone().ok_or(MusicError::NotConnected)?;
            let now = state.current.as_mut().ok_or(MusicError::NothingPlaying)?;

            // If the transport hasn't started this song yet, the scheduler halts it once it has
            now.halt_requested = true;
            transport.stop();
            now.song.clone()
        };

        info!("Skipped '{}' in guild {}", song.title, guild_id);
        Ok(song)
    }

    pub async fn pause(&self, guild_id: GuildId) -> MusicResult<Song> {
        let slot = self
            .store()
            .get(guild_id)
            .ok_or(MusicError::NothingPlaying)?;
        let mut state = slot.lock().await;

        let transport = state.transport.clone().ok_or(MusicError::NothingPlaying)?;
        let now = state
            .current
            .as_mut()
            .filter(|now| !now.paused)
            .ok_or(MusicError::NothingPlaying)?;

        transport.pause()?;
        now.paused = true;
        info!("Paused '{}' in guild {}", now.song.title, guild_id);
        Ok(now.song.clone())
    }

    pub async fn resume(&self, guild_id: GuildId) -> MusicResult<Song> {
        let slot = self.store().get(guild_id).ok_or(MusicError::NotPaused)?;
        let mut state = slot.lock().await;

        let transport = state.transport.clone().ok_or(MusicError::NotPaused)?;
        let now = state
            .current
            .as_mut()
            .filter(|now| now.paused)
            .ok_or(MusicError::NotPaused)?;

        transport.resume()?;
        now.paused = false;
        info!("Resumed '{}' in guild {}", now.song.title, guild_id);
        Ok(now.song.clone())
    }

    /// Shuffle the waiting songs. Returns how many were shuffled.
    pub async fn shuffle(&self, guild_id: GuildId) -> MusicResult<usize> {
        let slot = self.store().get(guild_id).ok_or(MusicError::QueueEmpty)?;
        let mut state = slot.lock().await;

        if state.is_closed() || state.songs.is_empty() {
            return Err(MusicError::QueueEmpty);
        }

        let count = state.shuffle();
        info!("Shuffled {} songs in guild {}", count, guild_id);
        Ok(count)
    }

    pub async fn queue(&self, guild_id: GuildId) -> Option<QueueSnapshot> {
        let slot = self.store().get(guild_id)?;
        let state = slot.lock().await;
        (!state.is_closed()).then(|| state.snapshot())
    }

    pub async fn state_of(&self, guild_id: GuildId) -> PlaybackState {
        let Some(slot) = self.store().get(guild_id) else {
            return PlaybackState::Idle;
        };
        let state = slot.lock().await;
        if state.is_closed() {
            PlaybackState::Idle
        } else {
            state.playback_state()
        }
    }

    /// Wait until the guild's messages reflect every change made so far.
    pub async fn flush_messages(&self, guild_id: GuildId) {
        if let Some(slot) = self.store().get(guild_id) {
            slot.ui().flush().await;
        }
    }

    /// Get the voice channel ID that the user is currently in
    pub fn get_user_voice_channel(
        ctx: &Context,
        guild_id: GuildId,
        user_id: serenity::UserId,
    ) -> MusicResult<ChannelId> {
        let guild = ctx.cache.guild(guild_id).ok_or(MusicError::NotInGuild)?;

        let voice_state = guild
            .voice_states
            .get(&user_id)
            .ok_or(MusicError::UserNotInVoiceChannel)?;

        voice_state
            .channel_id
            .ok_or(MusicError::UserNotInVoiceChannel)
    }
}
