/// RTP identifier and media-time value types
pub mod rtp;

/// Cast Streaming RTCP parsing, building, and session state
pub mod rtcp;

/// Test doubles for exercising the RTCP layer
pub mod tests {
    use super::rtcp::{Client, PacketNack, RtcpReceiverFrameLogMessage, RtcpReportBlock};
    use super::rtp::FrameId;
    use std::time::{Duration, Instant};

    /// A [`Client`] implementation that records every callback invocation
    /// for later inspection.
    #[derive(Debug, Default)]
    pub struct MockClient {
        /// Arguments of each `on_receiver_reference_time_advanced` call.
        pub reference_times: Vec<Instant>,
        /// Arguments of each `on_receiver_report` call.
        pub receiver_reports: Vec<RtcpReportBlock>,
        /// Argument batches of each `on_cast_receiver_frame_log_messages` call.
        pub frame_logs: Vec<Vec<RtcpReceiverFrameLogMessage>>,
        /// Arguments of each `on_receiver_checkpoint` call.
        pub checkpoints: Vec<(FrameId, Duration)>,
        /// Argument batches of each `on_receiver_has_frames` call.
        pub received_frames: Vec<Vec<FrameId>>,
        /// Argument batches of each `on_receiver_is_missing_packets` call.
        pub nacks: Vec<Vec<PacketNack>>,
        /// Number of `on_receiver_indicates_picture_loss` calls.
        pub picture_loss_count: usize,
    }

    impl MockClient {
        /// Creates a client with no recorded callbacks.
        pub fn new() -> Self {
            Self::default()
        }

        /// Total number of callback invocations recorded.
        pub fn callback_count(&self) -> usize {
            self.reference_times.len()
                + self.receiver_reports.len()
                + self.frame_logs.len()
                + self.checkpoints.len()
                + self.received_frames.len()
                + self.nacks.len()
                + self.picture_loss_count
        }
    }

    impl Client for MockClient {
        fn on_receiver_reference_time_advanced(&mut self, reference_time: Instant) {
            self.reference_times.push(reference_time);
        }

        fn on_receiver_report(&mut self, receiver_report: &RtcpReportBlock) {
            self.receiver_reports.push(*receiver_report);
        }

        fn on_cast_receiver_frame_log_messages(
            &mut self,
            messages: &[RtcpReceiverFrameLogMessage],
        ) {
            self.frame_logs.push(messages.to_vec());
        }

        fn on_receiver_checkpoint(&mut self, frame_id: FrameId, playout_delay: Duration) {
            self.checkpoints.push((frame_id, playout_delay));
        }

        fn on_receiver_has_frames(&mut self, acks: &[FrameId]) {
            self.received_frames.push(acks.to_vec());
        }

        fn on_receiver_is_missing_packets(&mut self, nacks: &[PacketNack]) {
            self.nacks.push(nacks.to_vec());
        }

        fn on_receiver_indicates_picture_loss(&mut self) {
            self.picture_loss_count += 1;
        }
    }
}

pub use self::rtcp::{Client, CompoundRtcpParser, RtcpSession, SenderReportBuilder};
pub use self::rtp::{FrameId, RtpTimeDelta, RtpTimeTicks, Ssrc};
