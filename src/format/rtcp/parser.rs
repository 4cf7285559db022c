use super::{
    canonicalize_packet_nacks, PacketNack, RtcpCommonHeader, RtcpReceiverEventLogMessage,
    RtcpReceiverEventType, RtcpReceiverFrameLogMessage, RtcpReportBlock, RtcpSession,
    ALL_PACKETS_LOST, CAST_IDENTIFIER_WORD, CST2_IDENTIFIER_WORD, FEEDBACK_CAST,
    FEEDBACK_PICTURE_LOSS, PT_APPLICATION_DEFINED, PT_EXTENDED_REPORTS, PT_PAYLOAD_SPECIFIC,
    PT_RECEIVER_REPORT, SUBTYPE_RECEIVER_LOG, TIME_NAME_WORD, XR_BLOCK_REFERENCE_TIME,
};
use crate::error::{CastError, Result};
use crate::format::rtp::{FrameId, RtpTimeTicks};
use crate::utils::ByteReader;
use log::{debug, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Receives the decoded contents of a compound RTCP packet.
///
/// All methods default to no-ops so implementers override only what they
/// care about. For one successful [`CompoundRtcpParser::parse`] call, each
/// method fires at most once, in the order the methods are declared here.
pub trait Client {
    /// The receiver's reference time advanced. Fires before any other
    /// callback for the same packet.
    fn on_receiver_reference_time_advanced(&mut self, _reference_time: Instant) {}

    /// A receiver report block about this sender's stream arrived.
    fn on_receiver_report(&mut self, _receiver_report: &RtcpReportBlock) {}

    /// The receiver sent event logs for one or more frames.
    fn on_cast_receiver_frame_log_messages(
        &mut self,
        _messages: &[RtcpReceiverFrameLogMessage],
    ) {
    }

    /// The receiver has fully received every frame up to and including
    /// `frame_id`, and is currently using the given playout delay.
    fn on_receiver_checkpoint(&mut self, _frame_id: FrameId, _playout_delay: Duration) {}

    /// The receiver has fully received these frames beyond the checkpoint,
    /// in ascending order.
    fn on_receiver_has_frames(&mut self, _acks: &[FrameId]) {}

    /// The receiver is missing these packets, in canonical order (see
    /// [`canonicalize_packet_nacks`]).
    fn on_receiver_is_missing_packets(&mut self, _nacks: &[PacketNack]) {}

    /// The receiver lost decoder state and needs a key frame.
    fn on_receiver_indicates_picture_loss(&mut self) {}
}

/// Everything decoded from one compound packet, staged locally so that a
/// parse failure partway through commits nothing.
struct Draft {
    receiver_reference_time: Option<Instant>,
    receiver_report: Option<RtcpReportBlock>,
    frame_logs: Vec<RtcpReceiverFrameLogMessage>,
    frame_log_rtp_timestamp: RtpTimeTicks,
    checkpoint: Option<(FrameId, Duration)>,
    received_frames: Vec<FrameId>,
    nacks: Vec<PacketNack>,
    picture_loss: bool,
}

impl Draft {
    fn new(frame_log_rtp_timestamp: RtpTimeTicks) -> Self {
        Draft {
            receiver_reference_time: None,
            receiver_report: None,
            frame_logs: Vec::new(),
            frame_log_rtp_timestamp,
            checkpoint: None,
            received_frames: Vec::new(),
            nacks: Vec::new(),
            picture_loss: false,
        }
    }
}

/// Parses compound RTCP packets arriving from the session's receiver and
/// reports their contents to a [`Client`].
///
/// The parser carries two values across calls: the latest receiver
/// reference time (for dropping out-of-order compound packets) and the
/// latest expanded frame-log RTP timestamp (the expansion base for the
/// next log entry). It is therefore not safe for concurrent `parse` calls;
/// confine each parser instance to one thread or task.
pub struct CompoundRtcpParser {
    session: Arc<RtcpSession>,
    latest_receiver_timestamp: Option<Instant>,
    latest_frame_log_rtp_timestamp: RtpTimeTicks,
}

impl CompoundRtcpParser {
    /// Creates a parser for one session.
    pub fn new(session: Arc<RtcpSession>) -> Self {
        CompoundRtcpParser {
            session,
            latest_receiver_timestamp: None,
            latest_frame_log_rtp_timestamp: RtpTimeTicks::default(),
        }
    }

    /// The most recent receiver reference time seen, if any.
    pub fn latest_receiver_timestamp(&self) -> Option<Instant> {
        self.latest_receiver_timestamp
    }

    /// Parses one compound packet and dispatches its contents to `client`.
    ///
    /// `max_feedback_frame_id` is the highest frame id the sender could
    /// possibly be receiving feedback about; truncated checkpoint frame
    /// ids expand against it.
    ///
    /// The call is atomic: either the whole buffer is well-formed and the
    /// client callbacks fire, or an error is returned and the client sees
    /// nothing, with the parser's cross-call state untouched. Unknown
    /// sub-packet types and sub-packets not addressed to this session are
    /// skipped, not errors.
    pub fn parse(
        &mut self,
        buffer: &[u8],
        max_feedback_frame_id: FrameId,
        client: &mut dyn Client,
    ) -> Result<()> {
        let mut draft = Draft::new(self.latest_frame_log_rtp_timestamp);
        let mut reader = ByteReader::new(buffer);
        while !reader.is_empty() {
            let header = RtcpCommonHeader::parse(&mut reader)?;
            let mut payload = ByteReader::new(reader.read_slice(header.payload_size)?);
            match (header.packet_type, header.count_or_subtype) {
                (PT_RECEIVER_REPORT, count) => {
                    self.parse_receiver_report(&header, &mut payload, count, &mut draft)?;
                }
                (PT_APPLICATION_DEFINED, subtype) => {
                    self.parse_application_defined(&header, &mut payload, subtype, &mut draft)?;
                }
                (PT_PAYLOAD_SPECIFIC, FEEDBACK_PICTURE_LOSS) => {
                    self.parse_picture_loss(&header, &mut payload, &mut draft)?;
                }
                (PT_PAYLOAD_SPECIFIC, FEEDBACK_CAST) => {
                    self.parse_feedback(&header, &mut payload, max_feedback_frame_id, &mut draft)?;
                }
                (PT_EXTENDED_REPORTS, _) => {
                    self.parse_extended_reports(&header, &mut payload, &mut draft)?;
                }
                (packet_type, subtype) => {
                    debug!(
                        "ignoring RTCP sub-packet type {} subtype {}",
                        packet_type, subtype
                    );
                }
            }
        }

        // A reference time older than one already seen means this whole
        // compound packet was reordered in the network; none of its
        // contents may roll back sender-visible state.
        if let Some(reference_time) = draft.receiver_reference_time {
            if let Some(latest) = self.latest_receiver_timestamp {
                if reference_time < latest {
                    warn!("discarding stale RTCP packet (receiver reference time regressed)");
                    return Ok(());
                }
            }
        }

        self.latest_frame_log_rtp_timestamp = draft.frame_log_rtp_timestamp;
        if let Some(reference_time) = draft.receiver_reference_time {
            self.latest_receiver_timestamp = Some(reference_time);
            client.on_receiver_reference_time_advanced(reference_time);
        }
        if let Some(report) = &draft.receiver_report {
            client.on_receiver_report(report);
        }
        if !draft.frame_logs.is_empty() {
            client.on_cast_receiver_frame_log_messages(&draft.frame_logs);
        }
        if let Some((frame_id, playout_delay)) = draft.checkpoint {
            client.on_receiver_checkpoint(frame_id, playout_delay);
        }
        if !draft.received_frames.is_empty() {
            client.on_receiver_has_frames(&draft.received_frames);
        }
        if !draft.nacks.is_empty() {
            canonicalize_packet_nacks(&mut draft.nacks);
            client.on_receiver_is_missing_packets(&draft.nacks);
        }
        if draft.picture_loss {
            client.on_receiver_indicates_picture_loss();
        }
        Ok(())
    }

    fn parse_receiver_report(
        &self,
        header: &RtcpCommonHeader,
        payload: &mut ByteReader<'_>,
        report_count: u8,
        draft: &mut Draft,
    ) -> Result<()> {
        if header.ssrc != self.session.receiver_ssrc() {
            return Ok(());
        }
        // Cast receivers only ever send a single report block, so just the
        // block about this sender is kept; any others are length-checked
        // and dropped rather than reported.
        for _ in 0..report_count {
            let block = RtcpReportBlock::parse(payload)?;
            if block.ssrc == self.session.sender_ssrc() && draft.receiver_report.is_none() {
                draft.receiver_report = Some(block);
            }
        }
        Ok(())
    }

    fn parse_application_defined(
        &self,
        header: &RtcpCommonHeader,
        payload: &mut ByteReader<'_>,
        subtype: u8,
        draft: &mut Draft,
    ) -> Result<()> {
        match payload.read_u32()? {
            CAST_IDENTIFIER_WORD => {}
            TIME_NAME_WORD => return Ok(()),
            name => {
                debug!("ignoring APP packet with unrecognized name {:#010x}", name);
                return Ok(());
            }
        }
        if header.ssrc != self.session.receiver_ssrc() {
            return Ok(());
        }
        if subtype != SUBTYPE_RECEIVER_LOG {
            debug!("ignoring CAST APP packet with subtype {}", subtype);
            return Ok(());
        }
        self.parse_receiver_log(payload, draft)
    }

    fn parse_receiver_log(&self, payload: &mut ByteReader<'_>, draft: &mut Draft) -> Result<()> {
        while !payload.is_empty() {
            // Each frame block chains its truncated RTP timestamp off the
            // previous expanded one, across blocks and across parse calls.
            let rtp_timestamp = draft
                .frame_log_rtp_timestamp
                .expand_nearest(payload.read_u32()?);
            draft.frame_log_rtp_timestamp = rtp_timestamp;

            let word = payload.read_u32()?;
            let event_count = (word >> 24) + 1;
            let base_timestamp =
                self.session.start_time() + Duration::from_millis((word & 0x00ff_ffff) as u64);

            let mut messages = Vec::with_capacity(event_count as usize);
            for _ in 0..event_count {
                let delay_or_packet_id = payload.read_u16()?;
                let packed = payload.read_u16()?;
                let event_type = RtcpReceiverEventType::from_wire((packed >> 12) as u8);
                let timestamp = base_timestamp + Duration::from_millis((packed & 0x0fff) as u64);
                match event_type {
                    RtcpReceiverEventType::Unknown => {
                        debug!(
                            "dropping receiver log event with unrecognized code {}",
                            packed >> 12
                        );
                    }
                    RtcpReceiverEventType::PacketReceived => {
                        messages.push(RtcpReceiverEventLogMessage {
                            event_type,
                            timestamp,
                            delay: chrono::Duration::zero(),
                            packet_id: delay_or_packet_id,
                        });
                    }
                    _ => {
                        messages.push(RtcpReceiverEventLogMessage {
                            event_type,
                            timestamp,
                            delay: chrono::Duration::milliseconds(delay_or_packet_id as i16 as i64),
                            packet_id: 0,
                        });
                    }
                }
            }
            draft.frame_logs.push(RtcpReceiverFrameLogMessage {
                rtp_timestamp,
                messages,
            });
        }
        Ok(())
    }

    fn parse_picture_loss(
        &self,
        header: &RtcpCommonHeader,
        payload: &mut ByteReader<'_>,
        draft: &mut Draft,
    ) -> Result<()> {
        let target_ssrc = payload.read_u32()?;
        if header.ssrc == self.session.receiver_ssrc()
            && target_ssrc == self.session.sender_ssrc()
        {
            draft.picture_loss = true;
        }
        Ok(())
    }

    fn parse_feedback(
        &self,
        header: &RtcpCommonHeader,
        payload: &mut ByteReader<'_>,
        max_feedback_frame_id: FrameId,
        draft: &mut Draft,
    ) -> Result<()> {
        let media_ssrc = payload.read_u32()?;
        let identifier = payload.read_u32()?;
        if header.ssrc != self.session.receiver_ssrc()
            || media_ssrc != self.session.sender_ssrc()
        {
            return Ok(());
        }
        if identifier != CAST_IDENTIFIER_WORD {
            return Err(CastError::InvalidData(format!(
                "bad Cast feedback identifier {:#010x}",
                identifier
            )));
        }

        let checkpoint_wire = payload.read_u8()?;
        let loss_field_count = payload.read_u8()?;
        let playout_delay = Duration::from_millis(payload.read_u16()? as u64);
        // The checkpoint can never be ahead of the newest frame the sender
        // could be expecting acknowledgment for.
        let checkpoint = max_feedback_frame_id.expand_less_than_or_equal(checkpoint_wire);

        if let Some((existing, _)) = draft.checkpoint {
            if checkpoint < existing {
                debug!(
                    "ignoring feedback with regressed checkpoint {} (have {})",
                    checkpoint, existing
                );
                return Ok(());
            }
        }
        // Only the newest feedback block in a compound packet counts.
        draft.checkpoint = Some((checkpoint, playout_delay));
        draft.received_frames.clear();
        draft.nacks.clear();

        for _ in 0..loss_field_count {
            let frame_wire = payload.read_u8()?;
            let packet_id = payload.read_u16()?;
            let bitmask = payload.read_u8()?;
            let frame_id = checkpoint.expand_greater_than(frame_wire);
            draft.nacks.push(PacketNack { frame_id, packet_id });
            if packet_id != ALL_PACKETS_LOST {
                // Bit N set means packet_id+1+N of the same frame is also
                // missing.
                for_each_set_bit(bitmask, |bit| {
                    draft.nacks.push(PacketNack {
                        frame_id,
                        packet_id: packet_id.wrapping_add(1 + bit as u16),
                    });
                });
            }
        }

        // Optional CST2 extension: frame-level ACKs from receivers new
        // enough to send them. Anything else trailing here is benign.
        if payload.remaining() < 4 {
            return Ok(());
        }
        if payload.read_u32()? != CST2_IDENTIFIER_WORD {
            return Ok(());
        }
        payload.skip(1)?; // feedback sequence counter
        let octet_count = payload.read_u8()? as usize;
        let octets = payload.read_slice(octet_count)?;
        // Bit 0 of the first octet is checkpoint+2: the checkpoint itself
        // and its successor are never represented in the bit vector.
        let mut ack_base = checkpoint + 2;
        for octet in octets {
            for_each_set_bit(*octet, |bit| {
                draft.received_frames.push(ack_base + bit as u64);
            });
            ack_base += 8;
        }
        Ok(())
    }

    fn parse_extended_reports(
        &self,
        header: &RtcpCommonHeader,
        payload: &mut ByteReader<'_>,
        draft: &mut Draft,
    ) -> Result<()> {
        if header.ssrc != self.session.receiver_ssrc() {
            return Ok(());
        }
        while !payload.is_empty() {
            let block_type = payload.read_u8()?;
            payload.skip(1)?; // reserved
            let block_length = payload.read_u16()? as usize * 4;
            if block_type == XR_BLOCK_REFERENCE_TIME {
                if block_length != 8 {
                    return Err(CastError::InvalidData(format!(
                        "bad receiver reference time report length {}",
                        block_length
                    )));
                }
                let ntp = payload.read_u64()?;
                draft.receiver_reference_time =
                    Some(self.session.ntp_converter().to_local_time(ntp));
            } else {
                debug!("skipping extended report block type {}", block_type);
                payload.skip(block_length)?;
            }
        }
        Ok(())
    }
}

/// Calls `f` with the index of each set bit in `mask`, lowest bit first.
///
/// Both loss bitmasks and CST2 ACK vectors expand through here so the two
/// call sites cannot drift apart in bit order; they differ only in the
/// base offset each applies.
fn for_each_set_bit(mask: u8, mut f: impl FnMut(u32)) {
    for bit in 0..8 {
        if mask & (1 << bit) != 0 {
            f(bit);
        }
    }
}
