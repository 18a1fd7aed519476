//! Leaving the voice channel after the queue has sat empty.
//! Time is paused, so the five minute timeout passes instantly.

use std::time::Duration;

use jukebox::{Enqueued, PlaybackState, TransportHandle};
use tokio_test::assert_ok;

use crate::common::fixtures::{guild, text_channel};
use crate::common::{Harness, wait_for};
use crate::{assert_eq, assert_matches};

async fn settle() {
    for _ in 0..100 {
        tokio::task::yield_now().await;
    }
}

async fn advance(secs: u64) {
    tokio::time::advance(Duration::from_secs(secs)).await;
    settle().await;
}

/// Play one song to its end so the guild starts idling
async fn idle_harness() -> Harness {
    let h = Harness::new();
    h.play("song").await;
    h.live_messages().await;
    h.call().finish();
    h.wait_state(PlaybackState::AwaitingTimeout).await;
    h
}

#[tokio::test(start_paused = true)]
async fn test_idle_session_is_reaped_after_timeout() {
    let h = idle_harness().await;

    advance(299).await;
    assert!(h.player.store().contains(guild()));
    assert!(!h.call().is_disconnected());

    advance(2).await;
    wait_for(|| !h.player.store().contains(guild())).await;
    wait_for(|| h.call().is_disconnected()).await;
    wait_for(|| h.messenger.live(text_channel()).is_empty()).await;

    assert_eq!(h.player.state_of(guild()).await, PlaybackState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_enqueue_while_idle_cancels_the_timer() {
    let h = idle_harness().await;

    advance(200).await;
    assert_matches!(h.play("another").await, Enqueued::PlayingNow(_));

    advance(200).await;
    assert!(h.player.store().contains(guild()));
    assert_eq!(h.player.state_of(guild()).await, PlaybackState::Playing);

    // A song that keeps playing is never reaped
    advance(3600).await;
    assert!(h.player.store().contains(guild()));
    assert!(!h.call().is_disconnected());
    assert_eq!(h.transport.connects(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_timer_restarts_from_the_latest_idle_moment() {
    let h = idle_harness().await;

    advance(200).await;
    h.play("another").await;
    h.call().finish();
    h.wait_state(PlaybackState::AwaitingTimeout).await;

    // Past the first timer's deadline, but not the second's
    advance(150).await;
    assert!(h.player.store().contains(guild()));

    advance(151).await;
    wait_for(|| !h.player.store().contains(guild())).await;
    wait_for(|| h.call().is_disconnected()).await;
}

#[tokio::test(start_paused = true)]
async fn test_paused_song_is_never_reaped() {
    let h = Harness::new();
    h.play("song").await;
    assert_ok!(h.player.pause(guild()).await);

    advance(3600).await;

    assert!(h.player.store().contains(guild()));
    assert_eq!(h.player.state_of(guild()).await, PlaybackState::Paused);
    assert!(h.call().is_paused());
}

#[tokio::test(start_paused = true)]
async fn test_guild_can_play_again_after_being_reaped() {
    let h = idle_harness().await;

    advance(301).await;
    wait_for(|| !h.player.store().contains(guild())).await;
    wait_for(|| h.messenger.live(text_channel()).is_empty()).await;

    assert_matches!(h.play("comeback").await, Enqueued::PlayingNow(_));

    assert_eq!(h.transport.connects(), 2);
    assert!(!h.call().is_disconnected());
    assert_eq!(h.live_messages().await, vec!["Now playing: comeback"]);
}

#[tokio::test(start_paused = true)]
async fn test_stop_while_idle_disarms_the_timer() {
    let h = idle_harness().await;

    assert_ok!(h.player.stop(guild()).await);
    h.play("later").await;

    // The old session's timer must not tear down the new one
    advance(400).await;
    assert!(h.player.store().contains(guild()));
    assert_eq!(h.player.state_of(guild()).await, PlaybackState::Playing);
}
