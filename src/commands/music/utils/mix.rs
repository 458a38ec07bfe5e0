//! Self-renewing YouTube mix entries.

use serenity::model::id::UserId;
use std::collections::VecDeque;
use tracing::{debug, warn};

use super::music_manager::{MusicError, MusicResult};
use super::song::{SongMeta, YoutubeSong};
use crate::commands::music::audio_sources::{AudioStream, MixBatch, MixEntry, MixProvider, MixRequest, Resolvers};

/// A YouTube mix occupying a single queue slot.
///
/// It owns an internal sub-queue of upcoming videos. Each `advance()` pops the
/// finished head, remembers it as `last_seen` and, once the sub-queue runs dry,
/// asks the [`MixProvider`] for the next batch. Entries at or before the last
/// seen video are dropped so a refill never replays what already played.
#[derive(Debug, Clone, PartialEq)]
pub struct YoutubeMixSong {
    mix_id: String,
    session_token: Option<String>,
    last_seen: Option<String>,
    upcoming: VecDeque<YoutubeSong>,
    display: SongMeta,
}

impl YoutubeMixSong {
    /// Fetches the first batch of a mix.
    pub async fn open(mix_id: impl Into<String>, provider: &dyn MixProvider) -> MusicResult<Self> {
        let mix_id = mix_id.into();
        let batch = provider
            .next_batch(&MixRequest {
                mix_id: mix_id.clone(),
                last_seen: None,
                session_token: None,
            })
            .await?;

        Self::from_batch(mix_id, batch)
    }

    /// Builds a mix from an already fetched batch. Fails when the batch is empty.
    pub fn from_batch(mix_id: impl Into<String>, batch: MixBatch) -> MusicResult<Self> {
        let mix_id = mix_id.into();
        if batch.entries.is_empty() {
            return Err(MusicError::NotFound(mix_id));
        }

        let mut mix = Self {
            display: SongMeta::new(mix_id.clone(), "YouTube Mix", mix_url(&mix_id, None)),
            mix_id,
            session_token: batch.session_token,
            last_seen: None,
            upcoming: batch.entries.into_iter().map(YoutubeSong::from).collect(),
        };
        mix.refresh_display();
        Ok(mix)
    }

    pub fn mix_id(&self) -> &str {
        &self.mix_id
    }

    pub fn last_seen(&self) -> Option<&str> {
        self.last_seen.as_deref()
    }

    pub fn upcoming(&self) -> impl ExactSizeIterator<Item = &YoutubeSong> {
        self.upcoming.iter()
    }

    pub fn meta(&self) -> &SongMeta {
        &self.display
    }

    pub(crate) fn set_requestor(&mut self, user_id: UserId) {
        self.display.requestor_id = Some(user_id);
        for song in &mut self.upcoming {
            song.meta.requestor_id = Some(user_id);
        }
    }

    pub(crate) async fn resolve_stream(&self, resolvers: &Resolvers) -> MusicResult<AudioStream> {
        let head = self.upcoming.front().ok_or_else(|| {
            MusicError::AudioSourceError(format!("Mix {} has no upcoming videos", self.mix_id))
        })?;

        resolvers.youtube.stream(head.video_id()).await
    }

    /// Moves the mix to its next video. Always keeps the slot, even when the
    /// refill came back empty; the player's failure guard takes over from there.
    pub async fn advance(&mut self, provider: &dyn MixProvider) -> bool {
        if let Some(finished) = self.upcoming.pop_front() {
            self.last_seen = Some(finished.meta.id);
        }

        if self.upcoming.is_empty() {
            match self.refill(provider).await {
                Ok(0) => warn!(mix_id = %self.mix_id, "Mix refill returned no unseen videos"),
                Ok(added) => debug!(mix_id = %self.mix_id, added, "Refilled mix"),
                Err(e) => warn!(mix_id = %self.mix_id, "Failed to refill mix: {}", e),
            }
        }

        self.refresh_display();
        true
    }

    async fn refill(&mut self, provider: &dyn MixProvider) -> MusicResult<usize> {
        let batch = provider
            .next_batch(&MixRequest {
                mix_id: self.mix_id.clone(),
                last_seen: self.last_seen.clone(),
                session_token: self.session_token.clone(),
            })
            .await?;

        if batch.session_token.is_some() {
            self.session_token = batch.session_token;
        }

        let requestor = self.display.requestor_id;
        let before = self.upcoming.len();
        self.upcoming.extend(
            unseen(batch.entries, self.last_seen.as_deref())
                .into_iter()
                .map(YoutubeSong::from)
                .map(|mut song| {
                    song.meta.requestor_id = requestor;
                    song
                }),
        );
        Ok(self.upcoming.len() - before)
    }

    fn refresh_display(&mut self) {
        let Some(head) = self.upcoming.front() else {
            return;
        };

        self.display = SongMeta {
            id: self.mix_id.clone(),
            title: head.meta.title.clone(),
            uri: mix_url(&self.mix_id, Some(head.video_id())),
            thumbnail: head.meta.thumbnail.clone(),
            length_seconds: head.meta.length_seconds,
            length_display: head.meta.length_display.clone(),
            requestor_id: self.display.requestor_id,
        };
    }
}

/// Drops every entry up to and including `last_seen`.
fn unseen(entries: Vec<MixEntry>, last_seen: Option<&str>) -> Vec<MixEntry> {
    match last_seen.and_then(|id| entries.iter().position(|entry| entry.id == id)) {
        Some(position) => entries.into_iter().skip(position + 1).collect(),
        None => entries,
    }
}

fn mix_url(mix_id: &str, video_id: Option<&str>) -> String {
    match video_id {
        Some(video_id) => format!("https://www.youtube.com/watch?v={}&list={}", video_id, mix_id),
        None => format!("https://www.youtube.com/playlist?list={}", mix_id),
    }
}

impl From<MixEntry> for YoutubeSong {
    fn from(entry: MixEntry) -> Self {
        let mut meta = SongMeta::new(
            entry.id.clone(),
            entry.title,
            YoutubeSong::watch_url(&entry.id),
        );
        if let Some(seconds) = entry.length_seconds {
            meta = meta.with_length(seconds);
        }
        meta.thumbnail = entry.thumbnail;
        YoutubeSong::new(meta)
    }
}
