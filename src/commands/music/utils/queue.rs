//! Ordered queue of songs plus a bounded history and the loop policy.
//!
//! The head of the queue is the song currently playing (or about to play).

use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::VecDeque;
use std::fmt;
use tracing::debug;

use super::music_manager::{MusicError, MusicResult};
use super::song::{Song, SongKind};
use crate::commands::music::audio_sources::Resolvers;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopPolicy {
    #[default]
    None,
    Song,
    All,
}

impl LoopPolicy {
    /// None, Song, All, then back to None.
    pub fn next(self) -> Self {
        match self {
            LoopPolicy::None => LoopPolicy::Song,
            LoopPolicy::Song => LoopPolicy::All,
            LoopPolicy::All => LoopPolicy::None,
        }
    }
}

impl fmt::Display for LoopPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LoopPolicy::None => "off",
            LoopPolicy::Song => "song",
            LoopPolicy::All => "queue",
        })
    }
}

/// Recently finished songs, oldest first. A capacity of zero records nothing.
#[derive(Debug, Clone, Default)]
pub struct History {
    entries: VecDeque<Song>,
    capacity: usize,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, song: Song) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(song);
    }

    /// Takes the most recently finished song.
    pub fn pop(&mut self) -> Option<Song> {
        self.entries.pop_back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Song> {
        self.entries.iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddOutcome {
    pub added: usize,
    /// The queue was empty before the add, so the caller should start playback.
    pub start_playback: bool,
}

/// What a skip did to the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipOutcome {
    /// The head renewed itself in place.
    Renewed,
    /// Loop policy `Song`: the head stays.
    Repeated,
    /// Loop policy `All`: the head moved to the back.
    Rotated,
    /// The head moved to history.
    Advanced,
    /// There was nothing to skip.
    Empty,
}

#[derive(Debug, Clone, Default)]
pub struct Queue {
    songs: VecDeque<Song>,
    history: History,
    loop_policy: LoopPolicy,
}

impl Queue {
    pub fn new(history_size: usize) -> Self {
        Self {
            songs: VecDeque::new(),
            history: History::new(history_size),
            loop_policy: LoopPolicy::None,
        }
    }

    /// Appends songs in order. Playlist pointers are refused before anything
    /// is appended.
    pub fn add(&mut self, songs: Vec<Song>) -> MusicResult<AddOutcome> {
        if let Some(playlist) = songs
            .iter()
            .find(|song| song.kind() == SongKind::YoutubePlaylist)
        {
            return Err(MusicError::UnexpandedPlaylist(playlist.title().to_string()));
        }

        let was_empty = self.songs.is_empty();
        let added = songs.len();
        self.songs.extend(songs);

        Ok(AddOutcome {
            added,
            start_playback: was_empty && added > 0,
        })
    }

    /// Moves past the head.
    ///
    /// Unless `force` is set, a renewable head is first asked to advance in
    /// place. Otherwise the loop policy decides where the head goes.
    pub async fn skip(&mut self, force: bool, resolvers: &Resolvers) -> SkipOutcome {
        if !force {
            if let Some(head) = self.songs.front_mut() {
                if head.advance(resolvers).await {
                    return SkipOutcome::Renewed;
                }
            }
        }
        self.apply_loop_policy()
    }

    /// The non-renewing part of [`Queue::skip`].
    pub fn apply_loop_policy(&mut self) -> SkipOutcome {
        if self.songs.is_empty() {
            return SkipOutcome::Empty;
        }

        match self.loop_policy {
            LoopPolicy::Song => SkipOutcome::Repeated,
            LoopPolicy::All => {
                self.songs.rotate_left(1);
                SkipOutcome::Rotated
            }
            LoopPolicy::None => {
                if let Some(finished) = self.songs.pop_front() {
                    self.history.push(finished);
                }
                SkipOutcome::Advanced
            }
        }
    }

    /// Puts the most recent history entry back at the head. Returns `false`
    /// when history is empty.
    pub fn back(&mut self) -> bool {
        match self.history.pop() {
            Some(song) => {
                self.songs.push_front(song);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, index: usize) -> MusicResult<Song> {
        let len = self.songs.len();
        self.songs
            .remove(index)
            .ok_or(MusicError::IndexOutOfRange { index, len })
    }

    /// Shuffles everything after the head. The head never moves.
    pub fn shuffle(&mut self) {
        self.shuffle_with(&mut rand::rng());
    }

    pub fn shuffle_with<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if self.songs.len() > 2 {
            self.songs.make_contiguous()[1..].shuffle(rng);
        }
    }

    /// Sets the policy, or cycles to the next one when `None` is given.
    pub fn set_loop_policy(&mut self, policy: Option<LoopPolicy>) -> LoopPolicy {
        self.loop_policy = policy.unwrap_or_else(|| self.loop_policy.next());
        debug!(policy = %self.loop_policy, "Loop policy changed");
        self.loop_policy
    }

    /// Moves the head straight into history, ignoring the loop policy.
    /// Returns the evicted title.
    pub fn evict_current(&mut self) -> Option<String> {
        let song = self.songs.pop_front()?;
        let title = song.title().to_string();
        self.history.push(song);
        Some(title)
    }

    pub fn loop_policy(&self) -> LoopPolicy {
        self.loop_policy
    }

    pub fn current(&self) -> Option<&Song> {
        self.songs.front()
    }

    pub fn songs(&self) -> impl ExactSizeIterator<Item = &Song> {
        self.songs.iter()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }
}
