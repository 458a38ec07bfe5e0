use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use std::sync::Arc;

use rusty_jukebox::commands::music::audio_sources::{Resolvers, load_songs};
use rusty_jukebox::commands::music::utils::music_manager::MusicError;
use rusty_jukebox::commands::music::utils::song::{SongKind, SongRecord};

use crate::common::fixtures::USER;
use crate::common::mocks::{ScriptedMix, StaticPlaylists, StaticYoutube};

fn resolvers() -> (Resolvers, Arc<ScriptedMix>) {
    let mix = Arc::new(ScriptedMix::default());
    let resolvers = Resolvers {
        youtube: Arc::new(StaticYoutube::default()),
        mix: mix.clone(),
        playlists: Arc::new(StaticPlaylists),
    };
    (resolvers, mix)
}

#[tokio::test]
async fn free_text_plays_the_first_search_hit() {
    let (resolvers, _) = resolvers();

    let songs = load_songs("never gonna", USER, &resolvers, None).await.unwrap();

    assert_eq!(songs.len(), 1);
    assert_eq!(songs[0].id(), "search-never-gonna");
    assert_eq!(songs[0].kind(), SongKind::Youtube);
    assert_eq!(songs[0].meta().requestor_id, Some(USER));
}

#[tokio::test]
async fn a_search_without_hits_is_not_found() {
    let (resolvers, _) = resolvers();

    let result = load_songs("nothing", USER, &resolvers, None).await;

    assert_matches!(result, Err(MusicError::NotFound(query)) if query == "nothing");
}

#[tokio::test]
async fn playlists_arrive_expanded_in_order() {
    let (resolvers, _) = resolvers();

    let songs = load_songs(
        "https://www.youtube.com/playlist?list=PLx",
        USER,
        &resolvers,
        None,
    )
    .await
    .unwrap();

    let ids: Vec<&str> = songs.iter().map(|song| song.id()).collect();
    assert_eq!(ids, vec!["PLx-1", "PLx-2", "PLx-3"]);
    assert!(songs.iter().all(|song| song.kind() == SongKind::Youtube));
    assert!(songs.iter().all(|song| song.meta().requestor_id == Some(USER)));
}

#[tokio::test]
async fn a_mix_link_opens_one_renewable_entry() {
    let (resolvers, mix) = resolvers();
    mix.push_batch(&["v1", "v2", "v3"], None);

    let songs = load_songs(
        "https://www.youtube.com/watch?v=v1&list=RDv1",
        USER,
        &resolvers,
        None,
    )
    .await
    .unwrap();

    assert_eq!(songs.len(), 1);
    assert_eq!(songs[0].kind(), SongKind::YoutubeMix);
    assert!(songs[0].capabilities().renewable);
    assert_eq!(songs[0].title(), "Title v1");
    assert_eq!(mix.requests()[0].last_seen, None);
}

#[tokio::test]
async fn an_empty_mix_is_not_found() {
    let (resolvers, _) = resolvers();

    let result = load_songs(
        "https://www.youtube.com/watch?v=v1&list=RDempty",
        USER,
        &resolvers,
        None,
    )
    .await;

    assert_matches!(result, Err(MusicError::NotFound(_)));
}

#[tokio::test]
async fn unknown_links_are_refused() {
    let (resolvers, _) = resolvers();

    let result = load_songs("https://soundcloud.com/someone/track", USER, &resolvers, None).await;

    assert_matches!(result, Err(MusicError::AudioSourceError(_)));
}

#[tokio::test]
async fn a_stored_record_restores_the_same_song() {
    let (resolvers, _) = resolvers();
    let songs = load_songs("https://youtu.be/abc", USER, &resolvers, None)
        .await
        .unwrap();
    let record = songs[0].to_record();

    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["kind"], "youtube");
    assert_eq!(json["lengthSeconds"], 180);

    let restored: SongRecord = serde_json::from_value(json).unwrap();
    let song = restored.restore(&resolvers).await.unwrap();
    assert_eq!(song.id(), "abc");
    assert_eq!(song.title(), "Title abc");
}
