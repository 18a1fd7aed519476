//! Per-guild session records and the registry that owns them.
//!
//! Every guild with a live voice session has exactly one [`GuildSlot`] in the
//! [`GuildStore`]. The slot wraps the guild's [`GuildState`] in its own async
//! mutex, so mutations of one guild never wait on another.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rand::seq::SliceRandom;
use serenity::model::id::{ChannelId, GuildId};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

use super::idle_reaper::IdleTimer;
use super::message_tracker::{UiCommand, UiSender};
use super::transport::TransportHandle;
use crate::commands::music::audio_sources::TrackMetadata;

/// Process-unique identity of a queued song.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SongId(u64);

impl SongId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for SongId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity of one started playback. A completion carrying any other id is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlayId(u64);

impl PlayId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// A resolved track waiting in (or popped from) a guild's queue.
#[derive(Debug, Clone, PartialEq)]
pub struct Song {
    pub id: SongId,
    pub title: String,
    pub stream_url: String,
    pub duration: Option<Duration>,
    pub requested_by: Option<String>,
}

impl Song {
    pub fn new(id: SongId, metadata: TrackMetadata, requested_by: Option<String>) -> Self {
        Self {
            id,
            title: metadata.title,
            stream_url: metadata.stream_url,
            duration: metadata.duration,
            requested_by,
        }
    }
}

/// The song the transport currently holds.
#[derive(Debug, Clone)]
pub struct NowPlaying {
    pub song: Song,
    pub play_id: PlayId,
    pub paused: bool,
    /// Set by skip; a playback that starts after this was set is halted immediately.
    pub halt_requested: bool,
}

/// Externally observable playback state of a guild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
    Paused,
    AwaitingTimeout,
}

/// Read-only view of a guild's queue.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueSnapshot {
    pub current: Option<Song>,
    pub upcoming: Vec<Song>,
    /// Where the session posts its player messages.
    pub text_channel: ChannelId,
}

/// The mutable record of one guild's session.
pub struct GuildState {
    pub songs: VecDeque<Song>,
    pub current: Option<NowPlaying>,
    pub transport: Option<Arc<dyn TransportHandle>>,
    text_channel: ChannelId,
    idle: Option<IdleTimer>,
    idle_epoch: u64,
    closed: bool,
    ui: UiSender,
}

impl GuildState {
    pub fn new(text_channel: ChannelId, transport: Arc<dyn TransportHandle>, ui: UiSender) -> Self {
        Self {
            songs: VecDeque::new(),
            current: None,
            transport: Some(transport),
            text_channel,
            idle: None,
            idle_epoch: 0,
            closed: false,
            ui,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn push(&mut self, song: Song) -> usize {
        self.songs.push_back(song);
        self.songs.len()
    }

    pub fn pop_next(&mut self) -> Option<Song> {
        self.songs.pop_front()
    }

    /// Uniformly permute the pending songs. The current song is not part of `songs`.
    pub fn shuffle(&mut self) -> usize {
        let mut rng = rand::rng();
        self.songs.make_contiguous().shuffle(&mut rng);
        self.songs.len()
    }

    /// Record `song` as current under a fresh play id.
    pub fn begin(&mut self, song: Song, play_id: PlayId) {
        self.current = Some(NowPlaying {
            song,
            play_id,
            paused: false,
            halt_requested: false,
        });
    }

    pub fn current_play_id(&self) -> Option<PlayId> {
        self.current.as_ref().map(|now| now.play_id)
    }

    pub fn playback_state(&self) -> PlaybackState {
        match (&self.current, &self.idle) {
            (Some(now), _) if now.paused => PlaybackState::Paused,
            (Some(_), _) => PlaybackState::Playing,
            (None, Some(_)) => PlaybackState::AwaitingTimeout,
            (None, None) => PlaybackState::Idle,
        }
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            current: self.current.as_ref().map(|now| now.song.clone()),
            upcoming: self.songs.iter().cloned().collect(),
            text_channel: self.text_channel,
        }
    }

    /// Start a new idle epoch, cancelling any armed timer, and return it.
    pub(crate) fn next_idle_epoch(&mut self) -> u64 {
        self.cancel_idle();
        self.idle_epoch
    }

    pub(crate) fn set_idle(&mut self, timer: IdleTimer) {
        self.idle = Some(timer);
    }

    pub(crate) fn idle_matches(&self, epoch: u64) -> bool {
        self.idle.as_ref().is_some_and(|timer| timer.epoch == epoch)
    }

    /// Detach the armed timer without aborting it. Used by the timer's own task.
    pub(crate) fn release_idle(&mut self) {
        self.idle.take();
    }

    /// Supersede any armed timer.
    pub(crate) fn cancel_idle(&mut self) {
        self.idle_epoch += 1;
        if let Some(timer) = self.idle.take() {
            debug!("Cancelling idle timer epoch {}", timer.epoch);
            timer.task.abort();
        }
    }

    /// Queue a UI update. Order of calls is the order the channel sees them.
    pub(crate) fn notify(&self, command: UiCommand) {
        self.ui.send(command);
    }

    /// Mark the session finished and hand back the transport for teardown.
    pub(crate) fn close(&mut self) -> Option<Arc<dyn TransportHandle>> {
        self.closed = true;
        self.songs.clear();
        self.current = None;
        self.cancel_idle();
        self.transport.take()
    }
}

/// A guild's entry in the store: its serialized state and its UI channel.
pub struct GuildSlot {
    guild_id: GuildId,
    ui: UiSender,
    state: Mutex<GuildState>,
}

impl GuildSlot {
    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub(crate) fn ui(&self) -> &UiSender {
        &self.ui
    }

    /// Enter the guild's mutation scope. Never hold the guard across network I/O.
    pub async fn lock(&self) -> MutexGuard<'_, GuildState> {
        self.state.lock().await
    }
}

/// Registry of live guild sessions.
#[derive(Default)]
pub struct GuildStore {
    guilds: DashMap<GuildId, Arc<GuildSlot>>,
}

impl GuildStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, guild_id: GuildId) -> Option<Arc<GuildSlot>> {
        self.guilds.get(&guild_id).map(|slot| Arc::clone(slot.value()))
    }

    /// Return the guild's slot, creating it when absent.
    ///
    /// `ui` is only invoked when a new slot is created. The returned flag
    /// tells whether this call created it.
    pub fn create_or_get(
        &self,
        guild_id: GuildId,
        text_channel: ChannelId,
        transport: Arc<dyn TransportHandle>,
        ui: impl FnOnce() -> UiSender,
    ) -> (Arc<GuildSlot>, bool) {
        match self.guilds.entry(guild_id) {
            Entry::Occupied(entry) => (Arc::clone(entry.get()), false),
            Entry::Vacant(entry) => {
                let ui = ui();
                let slot = Arc::new(GuildSlot {
                    guild_id,
                    ui: ui.clone(),
                    state: Mutex::new(GuildState::new(text_channel, transport, ui)),
                });
                entry.insert(Arc::clone(&slot));
                (slot, true)
            }
        }
    }

    /// Remove the guild's entry, but only if it is still `slot`.
    pub fn remove(&self, guild_id: GuildId, slot: &Arc<GuildSlot>) -> bool {
        self.guilds
            .remove_if(&guild_id, |_, current| Arc::ptr_eq(current, slot))
            .is_some()
    }

    pub fn contains(&self, guild_id: GuildId) -> bool {
        self.guilds.contains_key(&guild_id)
    }

    pub fn len(&self) -> usize {
        self.guilds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guilds.is_empty()
    }
}
