//! Needs-data / has-enough flow control
//!
//! Tracks, per stream, whether a needs-data request is outstanding towards
//! the media engine, whether the pipeline input reported saturation, and
//! whether the stream reached end-of-stream. The controller only decides;
//! the caller turns the returned stream sets into decoder-status callbacks.

use playcore_common::{StreamFlags, StreamType};

#[derive(Debug, Clone)]
pub struct FlowController {
    present: StreamFlags,
    needs_data: StreamFlags,
    has_enough: StreamFlags,
    eos: StreamFlags,
}

impl FlowController {
    /// Every present stream starts saturated until the pipeline asks
    pub fn new(present: StreamFlags) -> Self {
        Self {
            present,
            needs_data: StreamFlags::NONE,
            has_enough: present,
            eos: StreamFlags::NONE,
        }
    }

    pub fn present(&self) -> StreamFlags {
        self.present
    }

    /// Mark streams as needing data
    ///
    /// Returns the streams a needs-data request must be emitted for. A stream
    /// already waiting for data, absent, or at end-of-stream is skipped, so
    /// repeated requests produce a single notification.
    pub fn request(&mut self, streams: StreamFlags) -> StreamFlags {
        let mut emit = StreamFlags::NONE;
        for stream in streams.streams() {
            if !self.present[stream] || self.needs_data[stream] || self.eos[stream] {
                continue;
            }
            self.needs_data[stream] = true;
            emit[stream] = true;
        }
        emit
    }

    /// A sample for `stream` was written
    pub fn data_written(&mut self, stream: StreamType) {
        self.needs_data[stream] = false;
    }

    pub fn needs_data(&self, stream: StreamType) -> bool {
        self.needs_data[stream]
    }

    /// Pipeline input for `stream` asked for data
    ///
    /// While prerolling after a seek, nothing is requested until every
    /// present stream has drained, then all of them are requested together.
    pub fn on_pipeline_need_data(&mut self, stream: StreamType, preroll_after_seek: bool) -> StreamFlags {
        self.has_enough[stream] = false;

        if preroll_after_seek {
            if self.present.streams().any(|s| self.has_enough[s]) {
                return StreamFlags::NONE;
            }
            let present = self.present;
            return self.request(present);
        }

        let mut streams = StreamFlags::NONE;
        streams[stream] = true;
        self.request(streams)
    }

    pub fn set_has_enough(&mut self, stream: StreamType) {
        self.has_enough[stream] = true;
    }

    pub fn has_enough(&self, stream: StreamType) -> bool {
        self.has_enough[stream]
    }

    /// Present streams the pipeline has not reported as saturated
    pub fn lacking_data(&self) -> StreamFlags {
        StreamFlags::new(
            self.present.audio && !self.has_enough.audio,
            self.present.video && !self.has_enough.video,
        )
    }

    pub fn mark_end_of_stream(&mut self, stream: StreamType) {
        self.eos[stream] = true;
    }

    pub fn is_end_of_stream(&self, stream: StreamType) -> bool {
        self.eos[stream]
    }

    /// Every present stream reached end-of-stream
    pub fn all_ended(&self) -> bool {
        self.present.streams().all(|stream| self.eos[stream])
    }

    /// A seek discards outstanding requests and end-of-stream marks
    pub fn reset_for_seek(&mut self) {
        self.needs_data = StreamFlags::NONE;
        self.eos = StreamFlags::NONE;
    }

    pub fn clear_end_of_stream(&mut self) {
        self.eos = StreamFlags::NONE;
    }

    /// Saturate all streams while retained samples are redelivered
    ///
    /// Returns the previous saturation flags for [`Self::finish_preroll_drain`].
    pub fn begin_preroll_drain(&mut self) -> StreamFlags {
        let previous = self.has_enough;
        self.has_enough = self.present;
        previous
    }

    /// Restore saturation after a drain and re-arm data requests
    ///
    /// Streams that were not saturated before the drain get a needs-data
    /// request unless one is already outstanding.
    pub fn finish_preroll_drain(&mut self, previous: StreamFlags) -> StreamFlags {
        let mut streams = StreamFlags::NONE;
        for stream in self.present.streams() {
            streams[stream] = !previous[stream];
        }
        let emit = self.request(streams);

        if self.has_enough == self.present {
            self.has_enough = previous;
        }
        emit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn both() -> FlowController {
        FlowController::new(StreamFlags::splat(true))
    }

    /// `true` when a notification for `stream` is due
    fn request_one(flow: &mut FlowController, stream: StreamType) -> bool {
        let mut streams = StreamFlags::NONE;
        streams[stream] = true;
        flow.request(streams)[stream]
    }

    #[test]
    fn test_needs_data_is_idempotent() {
        let mut flow = both();
        assert!(request_one(&mut flow, StreamType::Video));
        assert!(!request_one(&mut flow, StreamType::Video));
        assert!(flow.needs_data(StreamType::Video));

        flow.data_written(StreamType::Video);
        assert!(request_one(&mut flow, StreamType::Video));
    }

    #[test]
    fn test_no_request_after_end_of_stream() {
        let mut flow = both();
        flow.mark_end_of_stream(StreamType::Audio);
        assert!(!request_one(&mut flow, StreamType::Audio));
        assert!(request_one(&mut flow, StreamType::Video));
    }

    #[test]
    fn test_absent_stream_never_requested() {
        let mut flow = FlowController::new(StreamFlags::new(true, false));
        assert_eq!(flow.request(StreamFlags::splat(true)), StreamFlags::new(true, false));
        assert!(!flow.all_ended());
        flow.mark_end_of_stream(StreamType::Audio);
        assert!(flow.all_ended());
    }

    #[test]
    fn test_need_data_while_presenting_requests_that_stream() {
        let mut flow = both();
        let emit = flow.on_pipeline_need_data(StreamType::Audio, false);
        assert_eq!(emit, StreamFlags::new(true, false));
        assert!(!flow.has_enough(StreamType::Audio));
    }

    #[test]
    fn test_need_data_after_seek_waits_for_all_streams() {
        let mut flow = both();
        assert_eq!(flow.on_pipeline_need_data(StreamType::Audio, true), StreamFlags::NONE);
        assert_eq!(flow.on_pipeline_need_data(StreamType::Video, true), StreamFlags::splat(true));
    }

    #[test]
    fn test_seek_reset_clears_requests_and_eos() {
        let mut flow = both();
        request_one(&mut flow, StreamType::Audio);
        flow.mark_end_of_stream(StreamType::Video);
        flow.reset_for_seek();
        assert!(!flow.needs_data(StreamType::Audio));
        assert!(!flow.is_end_of_stream(StreamType::Video));
    }

    #[test]
    fn test_preroll_drain_rearms_unsaturated_streams() {
        let mut flow = both();
        flow.on_pipeline_need_data(StreamType::Video, false);
        flow.data_written(StreamType::Video);

        let previous = flow.begin_preroll_drain();
        assert!(flow.has_enough(StreamType::Video));

        let emit = flow.finish_preroll_drain(previous);
        assert_eq!(emit, StreamFlags::new(false, true));
        assert!(!flow.has_enough(StreamType::Video));
        assert!(flow.has_enough(StreamType::Audio));
    }

    #[test]
    fn test_lacking_data() {
        let mut flow = both();
        assert_eq!(flow.lacking_data(), StreamFlags::NONE);
        flow.on_pipeline_need_data(StreamType::Audio, false);
        assert_eq!(flow.lacking_data(), StreamFlags::new(true, false));
        flow.set_has_enough(StreamType::Audio);
        assert_eq!(flow.lacking_data(), StreamFlags::NONE);
    }
}
