//! Integration tests for construction, teardown, force stop and
//! presentation settings

mod helpers;

use helpers::{test_config, wait_until, TestPlayer};
use playcore::sim::SimulatedPipeline;
use playcore::{
    AudioCodec, Bounds, ChannelCallbacks, Codecs, Error, MediaTime, Pipeline, PipelineState, Player, PlayerConfig,
    PlayerEvent, PlayerState, VideoCodec,
};
use std::sync::Arc;

fn av() -> Codecs {
    Codecs::new(AudioCodec::Aac, VideoCodec::H264)
}

#[test]
fn test_build_brings_pipeline_to_ready_and_configures_sources() {
    let mut test = TestPlayer::new(av());
    test.wait_for_state(PlayerState::Initialized, 0);

    assert_eq!(test.pipeline.current_state(), PipelineState::Ready);
    assert!(wait_until(|| test.pipeline.configured_codecs() == Some(av())));
    assert!(test.registry.contains(test.player.id()));
}

#[test]
fn test_build_rejects_player_without_streams() {
    let (callbacks, _events) = ChannelCallbacks::new();
    let result = Player::builder(
        Codecs::new(AudioCodec::None, VideoCodec::None),
        Arc::new(SimulatedPipeline::new()),
        callbacks,
    )
    .build();
    assert!(matches!(result, Err(Error::InvalidState(_))));
}

#[test]
fn test_build_rejects_invalid_config() {
    let (callbacks, _events) = ChannelCallbacks::new();
    let config = PlayerConfig {
        watchdog_interval_ms: 0,
        ..test_config()
    };
    let result = Player::builder(av(), Arc::new(SimulatedPipeline::new()), callbacks)
        .config(config)
        .build();
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_drop_reports_destroyed_last_and_unregisters() {
    let mut test = TestPlayer::presenting(av());
    test.player.seek(MediaTime::from_secs(1), 4);
    test.wait_for_state(PlayerState::Presenting, 4);

    let registry = test.registry.clone();
    let pipeline = test.pipeline.clone();
    let events = test.shutdown();

    match events.last() {
        Some(PlayerEvent::PlayerStateChanged { state, ticket, .. }) => {
            assert_eq!(*state, PlayerState::Destroyed);
            assert_eq!(*ticket, 4);
        }
        other => panic!("unexpected last event {:?}", other),
    }
    assert!(registry.is_empty());
    assert_eq!(pipeline.current_state(), PipelineState::Null);
}

#[test]
fn test_force_stop_keeps_pipeline_at_ready() {
    let test = TestPlayer::presenting(av());
    assert_eq!(test.registry.force_stop(), 1);
    assert!(wait_until(|| test.pipeline.current_state() == PipelineState::Ready));

    // Pausing would need the pipeline above ready
    test.player.set_rate(0.0);
    assert_eq!(test.pipeline.current_state(), PipelineState::Ready);
}

#[test]
fn test_bounds_applied_once_video_sink_exists() {
    let config = PlayerConfig {
        source_setup_delay_ms: 300,
        ..test_config()
    };
    let mut test = TestPlayer::with(av(), SimulatedPipeline::new(), config);
    let bounds = Bounds::new(10, 20, 640, 360);

    test.player.set_bounds(bounds);
    assert_eq!(test.pipeline.rectangle(), None);

    assert!(wait_until(|| test.pipeline.configured_codecs().is_some()));
    test.player.seek(MediaTime::ZERO, 1);
    test.wait_for_state(PlayerState::Presenting, 1);
    assert!(wait_until(|| test.pipeline.rectangle() == Some(bounds)));
}

#[test]
fn test_volume_clamped_and_ignored_without_audio() {
    let test = TestPlayer::presenting(av());
    test.player.set_volume(1.5);
    assert_eq!(test.player.info().volume, 1.0);
    test.player.set_volume(0.25);
    assert_eq!(test.player.info().volume, 0.25);

    let video_only = TestPlayer::presenting(Codecs::new(AudioCodec::None, VideoCodec::Vp9));
    video_only.player.set_volume(0.3);
    assert_eq!(video_only.player.info().volume, 1.0);
}

#[test]
fn test_info_reports_duration_and_dropped_frames() {
    let test = TestPlayer::presenting(av());
    test.pipeline.set_duration(MediaTime::from_secs(90));
    test.pipeline.set_dropped_frames(7);

    let info = test.player.info();
    assert_eq!(info.duration, Some(MediaTime::from_secs(90)));
    assert_eq!(info.dropped_video_frames, 7);
    assert_eq!(info.corrupted_video_frames, 0);
    assert!(info.is_paused);

    let json = serde_json::to_value(&info).unwrap();
    assert_eq!(json["duration"], 90_000_000);
}
