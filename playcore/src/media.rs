//! Media and sample model
//!
//! Types describing what the media engine hands to the player: which codecs
//! the player was created with, and the encoded samples themselves with their
//! optional encryption and video geometry side data.

use playcore_common::{MediaTime, StreamFlags, StreamType};
use serde::Serialize;
use std::fmt;

/// Maximum IV size accepted from the media engine
pub const MAX_IV_SIZE: usize = 16;

/// Audio codec of a player's audio stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioCodec {
    /// No audio stream
    None,
    Aac,
    Ac3,
    Eac3,
    Opus,
    Vorbis,
    Mp3,
    Flac,
    Pcm,
}

/// Video codec of a player's video stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoCodec {
    /// No video stream
    None,
    H264,
    H265,
    Vp8,
    Vp9,
    Av1,
}

/// Codecs a player was created with
///
/// A stream whose codec is `None` is absent for the whole player lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Codecs {
    pub audio: AudioCodec,
    pub video: VideoCodec,
}

impl Codecs {
    pub fn new(audio: AudioCodec, video: VideoCodec) -> Self {
        Self { audio, video }
    }

    pub fn is_present(&self, stream: StreamType) -> bool {
        match stream {
            StreamType::Audio => self.audio != AudioCodec::None,
            StreamType::Video => self.video != VideoCodec::None,
        }
    }

    /// Flags of the streams this player carries
    pub fn present(&self) -> StreamFlags {
        StreamFlags::new(self.is_present(StreamType::Audio), self.is_present(StreamType::Video))
    }
}

/// Content key identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyId(Vec<u8>);

impl KeyId {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        KeyId(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<&[u8]> for KeyId {
    fn from(bytes: &[u8]) -> Self {
        KeyId(bytes.to_vec())
    }
}

impl From<&str> for KeyId {
    fn from(text: &str) -> Self {
        KeyId(text.as_bytes().to_vec())
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

/// Clear/encrypted byte run of a subsample-encrypted sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubsampleEntry {
    pub clear_bytes: u32,
    pub encrypted_bytes: u32,
}

/// Encryption scheme of a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncryptionScheme {
    /// AES-CTR (`cenc`)
    #[default]
    AesCtr,
    /// AES-CBC (`cbcs`)
    AesCbc,
}

/// Crypt/skip block pattern for pattern encryption
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EncryptionPattern {
    pub crypt_blocks: u32,
    pub skip_blocks: u32,
}

/// Encryption side data of an encrypted sample
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionInfo {
    pub key_id: KeyId,
    pub iv: Vec<u8>,
    pub subsamples: Vec<SubsampleEntry>,
    pub scheme: EncryptionScheme,
    pub pattern: EncryptionPattern,
}

impl EncryptionInfo {
    /// Build encryption info, normalizing the IV
    ///
    /// A 16-byte IV whose upper 8 bytes are all zero is an 8-byte IV padded by
    /// the container and is shortened to its first 8 bytes. IVs longer than
    /// [`MAX_IV_SIZE`] are truncated.
    pub fn new(key_id: KeyId, iv: Vec<u8>) -> Self {
        Self {
            key_id,
            iv: normalize_iv(iv),
            subsamples: Vec::new(),
            scheme: EncryptionScheme::default(),
            pattern: EncryptionPattern::default(),
        }
    }

    pub fn with_subsamples(mut self, subsamples: Vec<SubsampleEntry>) -> Self {
        self.subsamples = subsamples;
        self
    }

    pub fn with_scheme(mut self, scheme: EncryptionScheme, pattern: EncryptionPattern) -> Self {
        self.scheme = scheme;
        self.pattern = pattern;
        self
    }
}

fn normalize_iv(mut iv: Vec<u8>) -> Vec<u8> {
    iv.truncate(MAX_IV_SIZE);
    if iv.len() == MAX_IV_SIZE && iv[8..].iter().all(|b| *b == 0) {
        iv.truncate(8);
    }
    iv
}

/// Frame geometry carried by video samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoSampleInfo {
    pub frame_width: u32,
    pub frame_height: u32,
}

/// One encoded access unit handed to the player
///
/// The player owns the payload once the sample is written.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedSample {
    pub stream: StreamType,
    pub payload: Vec<u8>,
    pub timestamp: MediaTime,
    pub video_info: Option<VideoSampleInfo>,
    pub encryption: Option<EncryptionInfo>,
}

impl EncodedSample {
    /// Unencrypted sample
    pub fn clear(stream: StreamType, timestamp: MediaTime, payload: Vec<u8>) -> Self {
        Self {
            stream,
            payload,
            timestamp,
            video_info: None,
            encryption: None,
        }
    }

    /// Encrypted sample
    pub fn encrypted(stream: StreamType, timestamp: MediaTime, payload: Vec<u8>, encryption: EncryptionInfo) -> Self {
        Self {
            encryption: Some(encryption),
            ..Self::clear(stream, timestamp, payload)
        }
    }

    pub fn with_video_info(mut self, frame_width: u32, frame_height: u32) -> Self {
        self.video_info = Some(VideoSampleInfo {
            frame_width,
            frame_height,
        });
        self
    }

    pub fn is_encrypted(&self) -> bool {
        self.encryption.is_some()
    }
}

/// Video output rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Bounds {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }
}
