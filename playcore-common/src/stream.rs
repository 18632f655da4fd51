//! Logical stream identity
//!
//! A player carries at most one audio and one video stream. Per-stream state
//! lives in a [`PerStream`] struct indexed by [`StreamType`] rather than in
//! bit masks.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};

/// One of the two logical elementary streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamType {
    Audio,
    Video,
}

impl StreamType {
    /// Both stream types, audio first
    pub const ALL: [StreamType; 2] = [StreamType::Audio, StreamType::Video];
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamType::Audio => write!(f, "audio"),
            StreamType::Video => write!(f, "video"),
        }
    }
}

/// A value per stream, indexable by [`StreamType`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PerStream<T> {
    pub audio: T,
    pub video: T,
}

impl<T> PerStream<T> {
    pub const fn new(audio: T, video: T) -> Self {
        Self { audio, video }
    }

    /// Iterate `(stream, &value)` pairs, audio first
    pub fn iter(&self) -> impl Iterator<Item = (StreamType, &T)> {
        [(StreamType::Audio, &self.audio), (StreamType::Video, &self.video)].into_iter()
    }
}

impl<T: Clone> PerStream<T> {
    pub fn splat(value: T) -> Self {
        Self {
            audio: value.clone(),
            video: value,
        }
    }
}

impl<T> Index<StreamType> for PerStream<T> {
    type Output = T;

    fn index(&self, stream: StreamType) -> &T {
        match stream {
            StreamType::Audio => &self.audio,
            StreamType::Video => &self.video,
        }
    }
}

impl<T> IndexMut<StreamType> for PerStream<T> {
    fn index_mut(&mut self, stream: StreamType) -> &mut T {
        match stream {
            StreamType::Audio => &mut self.audio,
            StreamType::Video => &mut self.video,
        }
    }
}

/// Per-stream boolean flags (replaces the audio|video bit mask)
pub type StreamFlags = PerStream<bool>;

impl StreamFlags {
    /// No stream flagged
    pub const NONE: StreamFlags = PerStream::new(false, false);

    /// True when any stream is flagged
    pub fn any(&self) -> bool {
        self.audio || self.video
    }

    /// True when every stream flagged in `mask` is also flagged here
    pub fn contains_all(&self, mask: &StreamFlags) -> bool {
        (!mask.audio || self.audio) && (!mask.video || self.video)
    }

    /// Streams flagged here, audio first
    pub fn streams(&self) -> impl Iterator<Item = StreamType> + '_ {
        self.iter().filter(|(_, flag)| **flag).map(|(stream, _)| stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_by_stream() {
        let mut values = PerStream::new(1, 2);
        assert_eq!(values[StreamType::Audio], 1);
        assert_eq!(values[StreamType::Video], 2);
        values[StreamType::Video] = 5;
        assert_eq!(values.video, 5);
    }

    #[test]
    fn test_flags_contains_all() {
        let both = StreamFlags::splat(true);
        let video_only = StreamFlags::new(false, true);
        assert!(both.contains_all(&video_only));
        assert!(!video_only.contains_all(&both));
        assert!(video_only.contains_all(&StreamFlags::NONE));
        assert!(!StreamFlags::NONE.any());
    }

    #[test]
    fn test_flag_streams_iteration() {
        let flags = StreamFlags::new(true, true);
        let streams: Vec<_> = flags.streams().collect();
        assert_eq!(streams, vec![StreamType::Audio, StreamType::Video]);
        assert_eq!(StreamFlags::new(false, true).streams().count(), 1);
    }

    #[test]
    fn test_display() {
        assert_eq!(StreamType::Audio.to_string(), "audio");
        assert_eq!(StreamType::Video.to_string(), "video");
    }
}
