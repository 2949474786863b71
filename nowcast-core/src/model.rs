//! Wire types delivered to connected viewers

use serde::{Deserialize, Serialize};

/// Whether the account is actively playing or paused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Playing,
    Paused,
}

/// One immutable record of "what is playing right now", produced by a
/// single successful poll and pushed verbatim to every viewer.
///
/// Field names are the stable wire format; every field except `state` is
/// absent when nothing is currently playing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackUpdate {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    #[serde(rename = "albumArt")]
    pub album_art: Option<String>,
    pub url: Option<String>,
    pub duration: Option<u64>,
    pub progress: Option<u64>,
    pub state: PlaybackState,
}

impl PlaybackUpdate {
    /// An update with no track metadata, for when nothing is playing.
    pub fn idle(state: PlaybackState) -> Self {
        Self {
            title: None,
            artist: None,
            album: None,
            album_art: None,
            url: None,
            duration: None,
            progress: None,
            state,
        }
    }
}
