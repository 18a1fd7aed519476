//! Queueing, skipping and pausing through the public player API

use fake::Fake;
use fake::faker::lorem::en::Sentence;
use jukebox::{Enqueued, MusicError, PlaybackState, TransportHandle};
use tokio_test::{assert_err, assert_ok};

use crate::common::fixtures::{guild, request, stream_url, text_channel};
use crate::common::mocks::MockResolver;
use crate::common::{Harness, eventually, wait_for};
use crate::{assert_eq, assert_matches};

fn titles(songs: &[jukebox::Song]) -> Vec<String> {
    songs.iter().map(|song| song.title.clone()).collect()
}

#[tokio::test]
async fn test_first_enqueue_plays_immediately() {
    let h = Harness::new();

    let outcome = h.play("song a").await;

    assert_matches!(outcome, Enqueued::PlayingNow(song) if song.title == "song a");
    assert_eq!(h.call().plays(), vec![stream_url("song a")]);
    assert_eq!(h.player.state_of(guild()).await, PlaybackState::Playing);
    assert_eq!(h.transport.connects(), 1);
}

#[tokio::test]
async fn test_later_enqueues_wait_in_order() {
    let h = Harness::new();

    h.play("song a").await;
    let b = h.play("song b").await;
    let c = h.play("song c").await;

    assert_matches!(b, Enqueued::Queued { position: 1, .. });
    assert_matches!(c, Enqueued::Queued { position: 2, .. });
    assert_eq!(h.call().plays(), vec![stream_url("song a")]);

    let snapshot = h.player.queue(guild()).await.expect("session is live");
    assert_eq!(snapshot.current.map(|song| song.title), Some("song a".to_string()));
    assert_eq!(titles(&snapshot.upcoming), vec!["song b", "song c"]);
    assert_eq!(snapshot.text_channel, text_channel());

    // One voice connection serves the whole session
    assert_eq!(h.transport.connects(), 1);
}

#[tokio::test]
async fn test_enqueue_titles_come_from_the_resolver() {
    let h = Harness::new();
    let query: String = Sentence(2..5).fake();

    let outcome = h.play(&query).await;

    assert_matches!(outcome, Enqueued::PlayingNow(song) if song.title == query);
    assert_eq!(h.call().plays(), vec![stream_url(&query)]);
}

#[tokio::test]
async fn test_play_skip_and_idle_walkthrough() {
    let h = Harness::new();

    assert_matches!(h.play("A").await, Enqueued::PlayingNow(_));
    assert_eq!(h.live_messages().await, vec!["Now playing: A"]);

    assert_matches!(h.play("B").await, Enqueued::Queued { position: 1, .. });
    assert_eq!(
        h.live_messages().await,
        vec!["Now playing: A", "Added to the queue: B"]
    );

    let skipped = assert_ok!(h.player.skip(guild()).await);
    assert_eq!(skipped.title, "A");
    h.wait_playing("B").await;
    assert_eq!(h.live_messages().await, vec!["Now playing: B"]);

    h.call().finish();
    h.wait_state(PlaybackState::AwaitingTimeout).await;

    assert_matches!(h.play("C").await, Enqueued::PlayingNow(_));
    assert_eq!(h.player.state_of(guild()).await, PlaybackState::Playing);
    assert_eq!(
        h.call().plays(),
        vec![stream_url("A"), stream_url("B"), stream_url("C")]
    );
}

#[tokio::test]
async fn test_finished_song_advances_to_the_next() {
    let h = Harness::new();
    h.play("one").await;
    h.play("two").await;

    h.call().finish();
    h.wait_playing("two").await;

    let snapshot = h.player.queue(guild()).await.expect("session is live");
    assert_eq!(snapshot.current.map(|song| song.title), Some("two".to_string()));
    assert!(snapshot.upcoming.is_empty());
}

#[tokio::test]
async fn test_skip_never_replays_the_skipped_song() {
    let h = Harness::new();
    for query in ["one", "two", "three"] {
        h.play(query).await;
    }

    assert_ok!(h.player.skip(guild()).await);
    h.wait_playing("two").await;
    assert_ok!(h.player.skip(guild()).await);
    h.wait_playing("three").await;
    assert_ok!(h.player.skip(guild()).await);
    h.wait_state(PlaybackState::AwaitingTimeout).await;

    assert_eq!(
        h.call().plays(),
        vec![stream_url("one"), stream_url("two"), stream_url("three")]
    );
}

#[tokio::test]
async fn test_skip_last_song_waits_for_more() {
    let h = Harness::new();
    h.play("only").await;

    assert_ok!(h.player.skip(guild()).await);
    h.wait_state(PlaybackState::AwaitingTimeout).await;

    // Still connected, ready for the next request
    assert!(h.player.store().contains(guild()));
    assert!(!h.call().is_disconnected());
    assert_matches!(
        h.player.skip(guild()).await,
        Err(MusicError::NothingPlaying)
    );
}

#[tokio::test]
async fn test_controls_without_a_session() {
    let h = Harness::new();

    assert_matches!(h.player.skip(guild()).await, Err(MusicError::NothingPlaying));
    assert_matches!(h.player.pause(guild()).await, Err(MusicError::NothingPlaying));
    assert_matches!(h.player.resume(guild()).await, Err(MusicError::NotPaused));
    assert_matches!(h.player.stop(guild()).await, Err(MusicError::NothingPlaying));
    assert_matches!(h.player.shuffle(guild()).await, Err(MusicError::QueueEmpty));
    assert_eq!(h.player.queue(guild()).await, None);
    assert_eq!(h.player.state_of(guild()).await, PlaybackState::Idle);
    assert_eq!(h.transport.connects(), 0);
}

#[tokio::test]
async fn test_pause_and_resume() {
    let h = Harness::new();
    h.play("song").await;

    let paused = assert_ok!(h.player.pause(guild()).await);
    assert_eq!(paused.title, "song");
    assert_eq!(h.player.state_of(guild()).await, PlaybackState::Paused);
    assert!(h.call().is_paused());
    assert_matches!(h.player.pause(guild()).await, Err(MusicError::NothingPlaying));

    assert_ok!(h.player.resume(guild()).await);
    assert_eq!(h.player.state_of(guild()).await, PlaybackState::Playing);
    assert!(h.call().is_playing());
    assert_matches!(h.player.resume(guild()).await, Err(MusicError::NotPaused));
}

#[tokio::test]
async fn test_skip_while_paused_plays_the_next_song() {
    let h = Harness::new();
    h.play("one").await;
    h.play("two").await;
    assert_ok!(h.player.pause(guild()).await);

    assert_ok!(h.player.skip(guild()).await);
    h.wait_playing("two").await;

    assert_eq!(h.player.state_of(guild()).await, PlaybackState::Playing);
    assert!(!h.call().is_paused());
}

#[tokio::test]
async fn test_shuffle_keeps_the_current_song() {
    let h = Harness::new();
    for query in ["now", "b", "c", "d"] {
        h.play(query).await;
    }

    assert_eq!(assert_ok!(h.player.shuffle(guild()).await), 3);

    let snapshot = h.player.queue(guild()).await.expect("session is live");
    assert_eq!(snapshot.current.map(|song| song.title), Some("now".to_string()));
    let mut upcoming = titles(&snapshot.upcoming);
    upcoming.sort();
    assert_eq!(upcoming, vec!["b", "c", "d"]);
}

#[tokio::test]
async fn test_shuffle_with_nothing_waiting() {
    let h = Harness::new();
    h.play("alone").await;

    assert_matches!(h.player.shuffle(guild()).await, Err(MusicError::QueueEmpty));
}

#[tokio::test]
async fn test_failed_stream_moves_on() {
    let h = Harness::new();
    h.play("one").await;
    h.play("two").await;

    h.call().fail("connection reset");
    h.wait_playing("two").await;

    assert_eq!(h.player.state_of(guild()).await, PlaybackState::Playing);
}

#[tokio::test]
async fn test_stream_that_cannot_start_is_skipped() {
    let h = Harness::new();
    h.transport.break_stream(&stream_url("broken"));
    h.play("one").await;
    h.play("broken").await;
    h.play("three").await;

    h.call().finish();
    h.wait_playing("three").await;

    assert_eq!(h.call().plays(), vec![stream_url("one"), stream_url("three")]);
    assert_eq!(h.live_messages().await, vec!["Now playing: three"]);
}

#[tokio::test]
async fn test_only_song_that_cannot_start_leaves_the_guild_waiting() {
    let h = Harness::new();
    h.transport.break_stream(&stream_url("broken"));

    assert_matches!(h.play("broken").await, Enqueued::PlayingNow(_));

    assert_eq!(
        h.player.state_of(guild()).await,
        PlaybackState::AwaitingTimeout
    );
    assert!(h.call().plays().is_empty());
}

#[tokio::test]
async fn test_duplicate_end_report_is_ignored() {
    let h = Harness::new();
    h.play("one").await;
    h.play("two").await;
    h.play("three").await;

    h.call().finish();
    h.wait_playing("two").await;

    // The transport reports the first song's end a second time
    h.call().notifier(0).notify(None);
    for _ in 0..100 {
        tokio::task::yield_now().await;
    }

    assert_eq!(h.call().now_playing(), Some(stream_url("two")));
    let snapshot = h.player.queue(guild()).await.expect("session is live");
    assert_eq!(titles(&snapshot.upcoming), vec!["three"]);
}

/// Wait until the sample guild has claimed `title` as its current song
async fn wait_current(h: &Harness, title: &'static str) {
    let player = h.player.clone();
    eventually(move || {
        let player = player.clone();
        async move {
            player
                .queue(guild())
                .await
                .and_then(|snapshot| snapshot.current)
                .is_some_and(|song| song.title == title)
        }
    })
    .await;
}

#[tokio::test]
async fn test_skip_while_the_stream_is_starting() {
    let h = Harness::new();
    for query in ["one", "two", "three"] {
        h.play(query).await;
    }

    let release = h.call().hold_next_play();
    h.call().finish();
    wait_current(&h, "two").await;

    // "two" is claimed but its stream has not started yet
    assert_eq!(assert_ok!(h.player.skip(guild()).await).title, "two");
    release.notify_one();

    // Once started, "two" is halted straight away and "three" follows
    h.wait_playing("three").await;
    assert_eq!(
        h.call().plays(),
        vec![stream_url("one"), stream_url("two"), stream_url("three")]
    );
    assert!(h.call().stops() >= 2);
    let snapshot = h.player.queue(guild()).await.expect("session is live");
    assert!(snapshot.upcoming.is_empty());
}

#[tokio::test]
async fn test_stop_while_the_stream_is_starting() {
    let h = Harness::new();
    h.play("one").await;
    h.play("two").await;

    let release = h.call().hold_next_play();
    h.call().finish();
    wait_current(&h, "two").await;

    assert_ok!(h.player.stop(guild()).await);
    release.notify_one();

    // The late stream is halted as soon as it starts
    wait_for(|| h.call().plays().len() == 2 && h.call().now_playing().is_none()).await;
    assert!(!h.player.store().contains(guild()));
    assert!(h.call().is_disconnected());
}

#[tokio::test]
async fn test_unresolvable_query_creates_no_session() {
    let mut resolver = MockResolver::new();
    resolver
        .expect_resolve()
        .times(1)
        .returning(|_| Err(MusicError::ResolveError("nothing matched".to_string())));
    let h = Harness::with_resolver(resolver);

    let result = h.player.enqueue(guild(), request("asdfghjkl")).await;

    assert_matches!(result, Err(MusicError::ResolveError(_)));
    assert!(!h.player.store().contains(guild()));
    assert_eq!(h.transport.connects(), 0);
    assert!(h.messenger.sent().is_empty());
}

#[tokio::test]
async fn test_failed_join_creates_no_session() {
    let h = Harness::new();
    h.transport.fail_connects();

    let result = h.player.enqueue(guild(), request("song")).await;

    assert_matches!(assert_err!(result), MusicError::JoinError(_));
    assert!(h.player.store().is_empty());
    assert!(h.messenger.sent().is_empty());
}
