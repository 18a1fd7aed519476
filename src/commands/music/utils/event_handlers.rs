use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use poise::serenity_prelude as serenity;
use serenity::async_trait;
use songbird::tracks::PlayMode;
use tracing::{debug, info, warn};

use super::message_tracker::UiCommand;
use super::music_manager::Player;
use super::queue_manager::{GuildSlot, GuildState, PlayId, Song};
use super::transport::{CallInner, StreamRecovery, TransportHandle};

/// One-shot completion report for a single playback.
///
/// The transport calls [`TrackEndNotifier::notify`] from whatever task it
/// runs on; the report is handed to the runtime and applied inside the
/// guild's mutation scope.
#[derive(Clone)]
pub struct TrackEndNotifier {
    player: Player,
    guild_id: serenity::GuildId,
    play_id: PlayId,
    fired: Arc<AtomicBool>,
}

impl TrackEndNotifier {
    pub(crate) fn new(player: Player, guild_id: serenity::GuildId, play_id: PlayId) -> Self {
        Self {
            player,
            guild_id,
            play_id,
            fired: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Report that the playback ended, with the failure reason if it failed.
    /// Only the first report for a playback has any effect.
    pub fn notify(&self, error: Option<String>) {
        if self.fired.swap(true, Ordering::AcqRel) {
            debug!(
                "Duplicate end report for {:?} in guild {}",
                self.play_id, self.guild_id
            );
            return;
        }

        let player = self.player.clone();
        let guild_id = self.guild_id;
        let play_id = self.play_id;
        tokio::spawn(async move {
            player.on_track_end(guild_id, play_id, error).await;
        });
    }
}

/// Songbird event handler for the end or failure of a stream.
#[derive(Clone)]
pub(crate) struct SongEndNotifier {
    call: Arc<CallInner>,
    stream_url: String,
    on_end: TrackEndNotifier,
    attempt: u32,
    generation: u64,
    handled: Arc<AtomicBool>,
}

impl SongEndNotifier {
    pub(crate) fn new(
        call: Arc<CallInner>,
        stream_url: String,
        on_end: TrackEndNotifier,
        attempt: u32,
        generation: u64,
    ) -> Self {
        Self {
            call,
            stream_url,
            on_end,
            attempt,
            generation,
            handled: Arc::new(AtomicBool::new(false)),
        }
    }

    fn handle_track_end(&self) {
        debug!("Track ended for guild {}", self.call.guild_id());
        self.call.mark_idle(self.generation);
        self.on_end.notify(None);
    }

    fn handle_stream_error(&self, reason: String) {
        let policy = self.call.policy();
        let guild_id = self.call.guild_id();

        let attempt = match policy.after_failure(self.attempt, self.call.is_current(self.generation)) {
            StreamRecovery::Retry { attempt } => attempt,
            StreamRecovery::GiveUp | StreamRecovery::Superseded => {
                warn!("Stream failed for guild {}: {}", guild_id, reason);
                self.call.mark_idle(self.generation);
                self.on_end.notify(Some(reason));
                return;
            }
        };

        warn!(
            "Stream failed for guild {}: {}; reconnecting ({}/{})",
            guild_id, reason, attempt, policy.retries
        );
        self.call.mark_reconnecting(self.generation);

        let retry = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(policy.retry_delay).await;

            // Halted while waiting: report the failure as the end of the song
            let current = retry.call.is_current(retry.generation);
            if policy.after_failure(retry.attempt, current) == StreamRecovery::Superseded {
                retry.on_end.notify(Some(reason));
                return;
            }

            if let Err(e) = retry
                .call
                .start(retry.stream_url.clone(), retry.on_end.clone(), attempt)
                .await
            {
                warn!("Reconnect failed for guild {}: {}", guild_id, e);
                retry.on_end.notify(Some(e.to_string()));
            }
        });
    }
}

#[async_trait]
impl songbird::EventHandler for SongEndNotifier {
    async fn act(&self, ctx: &songbird::EventContext<'_>) -> Option<songbird::Event> {
        let songbird::EventContext::Track(tracks) = ctx else {
            return None;
        };

        // Registered for both End and Error; whichever arrives first wins
        if self.handled.swap(true, Ordering::AcqRel) {
            return Some(songbird::Event::Cancel);
        }

        let failure = tracks.iter().find_map(|(state, _)| match &state.playing {
            PlayMode::Errored(e) => Some(format!("{e:?}")),
            _ => None,
        });

        match failure {
            Some(reason) => self.handle_stream_error(reason),
            None => self.handle_track_end(),
        }

        Some(songbird::Event::Cancel)
    }
}

/// A song the scheduler has claimed, waiting to be handed to the transport.
pub(crate) struct Start {
    song: Song,
    play_id: PlayId,
    transport: Arc<dyn TransportHandle>,
}

impl Start {
    pub(crate) fn song(&self) -> &Song {
        &self.song
    }
}

impl Player {
    /// Move the guild to its next state: claim the head song, or arm the idle
    /// timer when the queue is empty. Must be called with the guild locked and
    /// nothing current.
    pub(crate) fn advance(&self, slot: &Arc<GuildSlot>, state: &mut GuildState) -> Option<Start> {
        let transport = state.transport.clone()?;

        match state.pop_next() {
            Some(song) => {
                state.cancel_idle();

                let play_id = self.next_play_id();
                state.begin(song.clone(), play_id);
                state.notify(UiCommand::SongStarted {
                    song_id: song.id,
                    title: song.title.clone(),
                });

                info!("Now playing '{}' in guild {}", song.title, slot.guild_id());
                Some(Start {
                    song,
                    play_id,
                    transport,
                })
            }
            None => {
                state.current = None;
                info!(
                    "Queue empty for guild {}, waiting {:?} before leaving",
                    slot.guild_id(),
                    self.config().idle_timeout
                );
                self.arm_idle_timer(slot, state);
                None
            }
        }
    }

    /// Hand claimed songs to the transport. A song that fails to start counts
    /// as finished and the next one is tried.
    pub(crate) async fn drive(&self, slot: &Arc<GuildSlot>, start: Start) {
        let mut next = Some(start);

        while let Some(Start {
            song,
            play_id,
            transport,
        }) = next.take()
        {
            let notifier = TrackEndNotifier::new(self.clone(), slot.guild_id(), play_id);

            match transport.play(&song.stream_url, notifier).await {
                Ok(()) => {
                    // The lock was released while the transport started; re-check
                    let halt = {
                        let state = slot.lock().await;
                        state.is_closed()
                            || state
                                .current
                                .as_ref()
                                .is_some_and(|now| now.play_id == play_id && now.halt_requested)
                    };

                    if halt {
                        debug!(
                            "'{}' was stopped while starting in guild {}",
                            song.title,
                            slot.guild_id()
                        );
                        transport.stop();
                    }
                }
                Err(e) => {
                    warn!(
                        "Failed to start '{}' in guild {}: {}",
                        song.title,
                        slot.guild_id(),
                        e
                    );
                    next = self.finish(slot, play_id).await;
                }
            }
        }
    }

    /// Retire playback `play_id` and advance. Stale ids are ignored.
    async fn finish(&self, slot: &Arc<GuildSlot>, play_id: PlayId) -> Option<Start> {
        let mut state = slot.lock().await;

        if state.is_closed() || state.current_play_id() != Some(play_id) {
            debug!(
                "Ignoring stale completion {:?} for guild {}",
                play_id,
                slot.guild_id()
            );
            return None;
        }

        state.current = None;
        self.advance(slot, &mut state)
    }

    /// Completion entry point for the transport.
    pub(crate) async fn on_track_end(
        &self,
        guild_id: serenity::GuildId,
        play_id: PlayId,
        error: Option<String>,
    ) {
        match &error {
            Some(reason) => warn!(
                "Playback failed in guild {}: {}; moving to the next song",
                guild_id, reason
            ),
            None => debug!("Playback {:?} ended in guild {}", play_id, guild_id),
        }

        let Some(slot) = self.store().get(guild_id) else {
            debug!("No session for guild {}, dropping completion", guild_id);
            return;
        };

        if let Some(start) = self.finish(&slot, play_id).await {
            self.drive(&slot, start).await;
        }
    }
}
