use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use serenity::model::permissions::Permissions;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::timeout;
use tokio_test::assert_ok;

use rusty_jukebox::commands::music::utils::music_manager::MusicError;
use rusty_jukebox::config::MusicSettings;

use crate::common::{Harness, eventually};
use crate::common::fixtures::{self, CHANNEL, GUILD, OTHER_CHANNEL, OTHER_GUILD, OTHER_USER, USER, queued_ids};

#[tokio::test]
async fn a_player_bound_elsewhere_refuses_other_channels() {
    let h = Harness::new();
    h.voice.join(USER, CHANNEL);
    h.voice.join(OTHER_USER, OTHER_CHANNEL);
    h.add(GUILD, USER, &["a"]).await.unwrap();

    let result = h.add(GUILD, OTHER_USER, &["b"]).await;

    assert_matches!(result, Err(MusicError::BoundToOtherChannel(channel)) if channel == CHANNEL);
    assert_eq!(queued_ids(&h.snapshot(GUILD).await.unwrap()), vec!["a"]);
}

#[tokio::test]
async fn missing_permissions_refuse_before_a_player_exists() {
    let h = Harness::new();
    h.voice.join(USER, CHANNEL);
    h.voice.set_permissions(Permissions::CONNECT);

    let result = h.add(GUILD, USER, &["a"]).await;

    assert_matches!(result, Err(MusicError::MissingPermissions(channel)) if channel == CHANNEL);
    assert!(!h.manager.is_active(GUILD).await);
    assert_eq!(h.transport.connects(), 0);
}

#[tokio::test]
async fn callers_outside_voice_are_refused() {
    let h = Harness::new();

    let result = h.add(GUILD, USER, &["a"]).await;

    assert_matches!(result, Err(MusicError::UserNotInVoiceChannel));
    assert!(!h.manager.is_active(GUILD).await);
}

#[tokio::test]
async fn with_existing_never_creates_a_player() {
    let h = Harness::new();

    let seen = h
        .manager
        .with_existing(GUILD, |player| Box::pin(async move { player.guild_id() }))
        .await;

    assert_eq!(seen, None);
    assert!(!h.manager.is_active(GUILD).await);
}

#[tokio::test]
async fn a_destroyed_player_is_replaced_by_a_fresh_one() {
    let h = Harness::new();
    h.voice.join(USER, CHANNEL);
    h.add(GUILD, USER, &["a", "b"]).await.unwrap();
    h.manager
        .get(GUILD, USER, |player| Box::pin(async move { player.set_volume(1.5) }))
        .await
        .unwrap();

    assert!(h.manager.destroy(GUILD).await);
    assert!(!h.manager.destroy(GUILD).await);
    assert!(!h.manager.is_active(GUILD).await);
    assert_eq!(h.transport.destroyed(GUILD), 1);
    assert_eq!(h.transport.connected_channel(GUILD), None);

    h.add(GUILD, USER, &["c"]).await.unwrap();

    let snapshot = h.snapshot(GUILD).await.unwrap();
    assert_eq!(queued_ids(&snapshot), vec!["c"]);
    assert!(snapshot.history.is_empty());
    assert_eq!(snapshot.volume, 0.5);
    assert_eq!(h.transport.plays(GUILD), vec!["a", "c"]);
    assert_eq!(h.transport.connects(), 2);
}

#[tokio::test]
async fn the_bot_leaving_voice_destroys_the_player() {
    let h = Harness::new();
    h.voice.join(USER, CHANNEL);
    h.add(GUILD, USER, &["a"]).await.unwrap();

    h.manager.voice_presence_changed(GUILD, Some(OTHER_CHANNEL)).await;
    assert_eq!(h.snapshot(GUILD).await.unwrap().channel_id, OTHER_CHANNEL);

    h.manager.voice_presence_changed(GUILD, None).await;
    assert!(!h.manager.is_active(GUILD).await);
    assert_eq!(h.transport.destroyed(GUILD), 1);
}

#[tokio::test]
async fn the_same_guild_is_served_one_caller_at_a_time() {
    let h = Harness::new();
    h.voice.join(USER, CHANNEL);
    let manager = h.manager.clone();

    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let second_ran = Arc::new(AtomicBool::new(false));

    let first = {
        let manager = manager.clone();
        let entered = entered.clone();
        let release = release.clone();
        tokio::spawn(async move {
            manager
                .get(GUILD, USER, move |_player| {
                    Box::pin(async move {
                        entered.notify_one();
                        release.notified().await;
                    })
                })
                .await
        })
    };
    entered.notified().await;

    let second = {
        let manager = manager.clone();
        let second_ran = second_ran.clone();
        tokio::spawn(async move {
            manager
                .get(GUILD, USER, move |_player| {
                    Box::pin(async move {
                        second_ran.store(true, Ordering::SeqCst);
                    })
                })
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!second_ran.load(Ordering::SeqCst));

    release.notify_one();
    assert_ok!(first.await.unwrap());
    assert_ok!(second.await.unwrap());
    assert!(second_ran.load(Ordering::SeqCst));
}

#[tokio::test]
async fn different_guilds_do_not_wait_for_each_other() {
    let h = Harness::new();
    h.voice.join(USER, CHANNEL);
    let manager = h.manager.clone();

    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());

    let blocked = {
        let manager = manager.clone();
        let entered = entered.clone();
        let release = release.clone();
        tokio::spawn(async move {
            manager
                .get(GUILD, USER, move |_player| {
                    Box::pin(async move {
                        entered.notify_one();
                        release.notified().await;
                    })
                })
                .await
        })
    };
    entered.notified().await;

    // Only the other guild's callback can release the first one.
    let release_from_other = release.clone();
    timeout(
        Duration::from_secs(1),
        manager.get(OTHER_GUILD, USER, move |_player| {
            Box::pin(async move { release_from_other.notify_one() })
        }),
    )
    .await
    .expect("other guild was blocked")
    .unwrap();

    timeout(Duration::from_secs(1), blocked)
        .await
        .expect("first guild never finished")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn destroy_cuts_short_a_play_that_is_still_resolving() {
    let h = Harness::with_settings(MusicSettings {
        resolve_timeout: Duration::from_secs(5),
        ..fixtures::settings()
    });
    h.voice.join(USER, CHANNEL);
    h.youtube.hang_video("slow");

    let adding = {
        let manager = h.manager.clone();
        tokio::spawn(async move {
            manager
                .get(GUILD, USER, |player| {
                    Box::pin(async move { player.add(vec![fixtures::song("slow")]).await })
                })
                .await
        })
    };
    eventually("resolution to start", || h.youtube.stream_attempts("slow") == 1).await;

    let destroyed = timeout(Duration::from_millis(500), h.manager.destroy(GUILD))
        .await
        .expect("destroy waited for the resolution");
    assert!(destroyed);

    let added = timeout(Duration::from_millis(500), adding)
        .await
        .expect("add never finished")
        .unwrap();
    assert_ok!(added);
    assert_eq!(h.transport.connects(), 0);
    assert!(h.transport.plays(GUILD).is_empty());
    assert!(!h.manager.is_active(GUILD).await);
}
