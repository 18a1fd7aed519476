//! The now-playing message and queue announcements in the text channel

use jukebox::{PlaybackState, PlayerConfig, TransportHandle};
use tokio_test::assert_ok;

use crate::common::Harness;
use crate::common::fixtures::{guild, text_channel};
use crate::{assert_eq, assert_ne};

#[tokio::test]
async fn test_now_playing_message_is_edited_in_place() {
    let h = Harness::new();
    h.play("first").await;
    h.play("second").await;
    assert_eq!(
        h.live_messages().await,
        vec!["Now playing: first", "Added to the queue: second"]
    );
    let message_id = h.messenger.find("Now playing: first");
    assert!(message_id.is_some());
    assert!(h.messenger.has_controls("Now playing: first"));

    h.call().finish();
    h.wait_playing("second").await;

    assert_eq!(h.live_messages().await, vec!["Now playing: second"]);
    assert_eq!(h.messenger.find("Now playing: second"), message_id);
    assert!(h.messenger.has_controls("Now playing: second"));
    assert_eq!(h.messenger.edits(), 1);
}

#[tokio::test]
async fn test_deleted_now_playing_message_is_replaced() {
    let h = Harness::new();
    h.play("first").await;
    h.play("second").await;
    h.live_messages().await;

    let original = h.messenger.find("Now playing: first").expect("message was sent");
    h.messenger.remove_externally(original);

    assert_ok!(h.player.skip(guild()).await);
    h.wait_playing("second").await;

    assert_eq!(h.live_messages().await, vec!["Now playing: second"]);
    assert_ne!(h.messenger.find("Now playing: second"), Some(original));
    assert_eq!(
        h.messenger.sent(),
        vec![
            "Now playing: first",
            "Added to the queue: second",
            "Now playing: second"
        ]
    );
}

#[tokio::test]
async fn test_announcement_removed_is_the_started_songs_after_shuffle() {
    let h = Harness::new();
    for query in ["now", "b", "c", "d"] {
        h.play(query).await;
    }

    // Shuffle until a song other than the first announced one leads the queue
    let mut head = "b".to_string();
    for _ in 0..200 {
        assert_ok!(h.player.shuffle(guild()).await);
        let snapshot = h.player.queue(guild()).await.expect("session is live");
        head = snapshot.upcoming[0].title.clone();
        if head != "b" {
            break;
        }
    }
    assert_ne!(head, "b");

    assert_ok!(h.player.skip(guild()).await);
    h.wait_playing(&head).await;

    let mut expected = vec![format!("Now playing: {head}")];
    expected.extend(
        ["b", "c", "d"]
            .into_iter()
            .filter(|title| *title != head)
            .map(|title| format!("Added to the queue: {title}")),
    );
    assert_eq!(h.live_messages().await, expected);
}

#[tokio::test]
async fn test_stop_cleans_up_bot_messages_only() {
    let h = Harness::new();
    h.messenger
        .seed(text_channel(), "Now playing: from last night", true);
    h.messenger.seed(text_channel(), "great song!", false);

    h.play("first").await;
    h.play("second").await;
    h.live_messages().await;

    assert_ok!(h.player.stop(guild()).await);

    assert_eq!(h.messenger.live(text_channel()), vec!["great song!"]);
    assert!(h.call().is_disconnected());
    assert!(!h.call().is_playing());
    assert!(!h.player.store().contains(guild()));
    assert_eq!(h.player.state_of(guild()).await, PlaybackState::Idle);
}

#[tokio::test]
async fn test_cleanup_scan_is_bounded() {
    let config = PlayerConfig {
        message_scan_limit: 2,
        ..PlayerConfig::default()
    };
    let h = Harness::with_config(config);
    h.messenger.seed(text_channel(), "ancient bot message", true);
    h.messenger.seed(text_channel(), "hey", false);
    h.messenger.seed(text_channel(), "hello", false);

    h.play("song").await;
    h.live_messages().await;
    assert_ok!(h.player.stop(guild()).await);

    // Only the two most recent messages were looked at
    assert_eq!(
        h.messenger.live(text_channel()),
        vec!["ancient bot message", "hey", "hello"]
    );
}

#[tokio::test]
async fn test_messaging_failures_do_not_block_playback() {
    let h = Harness::new();
    h.messenger.fail_sends(true);

    h.play("first").await;
    h.play("second").await;
    assert_ok!(h.player.skip(guild()).await);
    h.wait_playing("second").await;

    assert_eq!(h.player.state_of(guild()).await, PlaybackState::Playing);
    assert!(h.live_messages().await.is_empty());

    // Once the channel works again the next song is announced
    h.messenger.fail_sends(false);
    h.play("third").await;
    h.call().finish();
    h.wait_playing("third").await;
    assert_eq!(h.live_messages().await, vec!["Now playing: third"]);
}

#[tokio::test]
async fn test_new_session_starts_with_fresh_messages() {
    let h = Harness::new();
    h.play("first").await;
    assert_ok!(h.player.stop(guild()).await);

    h.play("second").await;

    assert_eq!(h.live_messages().await, vec!["Now playing: second"]);
    assert_eq!(h.transport.connects(), 2);
    assert!(!h.call().is_disconnected());
}

#[tokio::test]
async fn test_enqueue_announcement_is_visible_after_flush() {
    let h = Harness::new();
    h.play("first").await;
    h.player.flush_messages(guild()).await;
    assert_eq!(h.messenger.live(text_channel()), vec!["Now playing: first"]);

    h.play("second").await;
    h.player.flush_messages(guild()).await;
    assert_eq!(
        h.messenger.live(text_channel()),
        vec!["Now playing: first", "Added to the queue: second"]
    );
}
