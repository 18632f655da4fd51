//! Sample builders

use playcore::sim::StaticDrmGate;
use playcore::{EncodedSample, EncryptionInfo, KeyId, MediaTime, StreamType};

pub const TEST_SESSION: &str = "test-session";

pub fn audio(millis: i64) -> EncodedSample {
    EncodedSample::clear(StreamType::Audio, MediaTime::from_millis(millis), vec![0xa0, millis as u8])
}

pub fn video(millis: i64) -> EncodedSample {
    EncodedSample::clear(StreamType::Video, MediaTime::from_millis(millis), vec![0x0f, millis as u8])
}

/// Video sample whose plaintext is `[0x0f, millis]`
pub fn encrypted_video(millis: i64, key: &KeyId) -> EncodedSample {
    let payload = StaticDrmGate::encrypt(&[0x0f, millis as u8]);
    EncodedSample::encrypted(
        StreamType::Video,
        MediaTime::from_millis(millis),
        payload,
        EncryptionInfo::new(key.clone(), vec![millis as u8; 8]),
    )
}
