//! # Cast Streaming RTCP Implementation
//!
//! This module implements the receiver-to-sender RTCP feedback channel of
//! Cast Streaming: parsing compound feedback packets and building outgoing
//! Sender Reports.
//!
//! ## Features
//!
//! - Compound packet parsing with per-type sub-parsers (receiver reports,
//!   Cast feedback, picture loss, receiver event logs, extended reports)
//! - Sender Report serialization with status-report-id correlation
//! - Shared per-session state (SSRC pair, NTP time conversion)
//! - Packet sniffing for RTP/RTCP transport demultiplexing
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Instant;
//! use castio::format::rtcp::{Client, CompoundRtcpParser, RtcpSession};
//! use castio::format::rtp::FrameId;
//!
//! struct Sender;
//! impl Client for Sender {
//!     fn on_receiver_indicates_picture_loss(&mut self) {
//!         // request a key frame
//!     }
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let session = Arc::new(RtcpSession::new(1, 2, Instant::now()));
//! let mut parser = CompoundRtcpParser::new(session);
//! let mut client = Sender;
//!
//! // An empty compound packet parses successfully and reports nothing.
//! parser.parse(&[], FrameId::first(), &mut client)?;
//! # Ok(())
//! # }
//! ```

use crate::error::{CastError, Result};
use crate::format::rtp::{FramePacketId, FrameId, RtpTimeDelta, RtpTimeTicks, Ssrc};
use crate::utils::{ByteReader, ByteWriter};
use std::time::Instant;

/// Session identity and NTP time conversion
pub mod session;

/// Compound feedback packet parsing
pub mod parser;

/// Sender Report serialization
pub mod builder;


pub use self::builder::{RtcpSenderReport, SenderReportBuilder, MAX_SENDER_REPORT_SIZE};
pub use self::parser::{Client, CompoundRtcpParser};
pub use self::session::{NtpTimeConverter, NtpTimestamp, RtcpSession};

/// RTCP packet types (RFC 3550 section 12.1 plus the Cast extensions).
pub(crate) const PT_SENDER_REPORT: u8 = 200;
pub(crate) const PT_RECEIVER_REPORT: u8 = 201;
pub(crate) const PT_APPLICATION_DEFINED: u8 = 204;
pub(crate) const PT_PAYLOAD_SPECIFIC: u8 = 206;
pub(crate) const PT_EXTENDED_REPORTS: u8 = 207;

/// Application-defined packet subtype carrying a Cast receiver event log.
pub(crate) const SUBTYPE_RECEIVER_LOG: u8 = 2;

/// Payload-specific feedback subtypes.
pub(crate) const FEEDBACK_PICTURE_LOSS: u8 = 1;
pub(crate) const FEEDBACK_CAST: u8 = 15;

/// ASCII "CAST", the required identifier word in feedback packets and the
/// expected application-defined name tag.
pub(crate) const CAST_IDENTIFIER_WORD: u32 = 0x4341_5354;

/// ASCII "CST2", marking the optional frame-level ACK extension.
pub(crate) const CST2_IDENTIFIER_WORD: u32 = 0x4353_5432;

/// ASCII "TIME", an application-defined name tag some receivers send;
/// recognized and intentionally ignored.
pub(crate) const TIME_NAME_WORD: u32 = 0x5449_4D45;

/// Extended-report block type for the Receiver Reference Time Report.
pub(crate) const XR_BLOCK_REFERENCE_TIME: u8 = 4;

/// Size of the common sub-packet header (first word plus SSRC word).
pub const RTCP_COMMON_HEADER_SIZE: usize = 8;

/// Size of one receiver-report block on the wire.
pub const RTCP_REPORT_BLOCK_SIZE: usize = 24;

/// Reserved packet id meaning "every packet in the frame is missing".
pub const ALL_PACKETS_LOST: FramePacketId = 0xffff;

/// Opaque token correlating a sent Sender Report with the receiver report
/// that later acknowledges it. Minted by [`SenderReportBuilder`] and echoed
/// back in [`RtcpReportBlock::last_status_report_id`].
pub type StatusReportId = u32;

/// The common header shared by every RTCP sub-packet: version/padding/count
/// byte, packet type, payload length, and the SSRC of the packet sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtcpCommonHeader {
    /// RTCP packet type.
    pub packet_type: u8,
    /// The 5-bit count-or-subtype field; a report count for (S/R)R packets,
    /// a subtype for application-defined and payload-specific packets.
    pub count_or_subtype: u8,
    /// SSRC of the endpoint that sent this sub-packet.
    pub ssrc: Ssrc,
    /// Size in bytes of the payload following the header.
    pub payload_size: usize,
}

impl RtcpCommonHeader {
    /// Parses one sub-packet header from the reader.
    ///
    /// Fails if the version is not 2 or the declared length does not cover
    /// the SSRC word. The padding bit is accepted and ignored; Cast never
    /// pads sub-packets.
    pub fn parse(reader: &mut ByteReader<'_>) -> Result<Self> {
        let byte0 = reader.read_u8()?;
        if (byte0 >> 6) != 2 {
            return Err(CastError::InvalidData(format!(
                "bad RTCP version in {:#04x}",
                byte0
            )));
        }
        let count_or_subtype = byte0 & 0x1f;
        let packet_type = reader.read_u8()?;
        let length_words = reader.read_u16()? as usize;
        if length_words < 1 {
            return Err(CastError::InvalidData(
                "RTCP sub-packet too short for SSRC".into(),
            ));
        }
        let ssrc = reader.read_u32()?;
        Ok(RtcpCommonHeader {
            packet_type,
            count_or_subtype,
            ssrc,
            payload_size: (length_words - 1) * 4,
        })
    }

    /// Serializes this header. `payload_size` must be a multiple of 4.
    pub fn write(&self, writer: &mut ByteWriter<'_>) -> Result<()> {
        debug_assert_eq!(self.payload_size % 4, 0);
        writer.write_u8(0b1000_0000 | (self.count_or_subtype & 0x1f))?;
        writer.write_u8(self.packet_type)?;
        writer.write_u16((self.payload_size / 4 + 1) as u16)?;
        writer.write_u32(self.ssrc)
    }
}

/// What a raw UDP payload appears to be, for transport demultiplexing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    /// An RTCP compound packet.
    Rtcp,
    /// An RTP media packet.
    Rtp,
}

/// Sniffs a raw packet to route it to the RTP or RTCP path, returning its
/// kind and the SSRC to key session lookup on.
///
/// RTCP packets carry a packet type of 200-207 in the second byte, a range
/// RTP payload types avoid; anything else with a version-2 header and a
/// full fixed header is treated as RTP. Returns `None` for packets that are
/// neither.
pub fn inspect_packet_for_routing(packet: &[u8]) -> Option<(PacketKind, Ssrc)> {
    if packet.len() < RTCP_COMMON_HEADER_SIZE || (packet[0] >> 6) != 2 {
        return None;
    }
    if (PT_SENDER_REPORT..=PT_EXTENDED_REPORTS).contains(&packet[1]) {
        let ssrc = u32::from_be_bytes([packet[4], packet[5], packet[6], packet[7]]);
        return Some((PacketKind::Rtcp, ssrc));
    }
    if packet.len() < 12 {
        return None;
    }
    let ssrc = u32::from_be_bytes([packet[8], packet[9], packet[10], packet[11]]);
    Some((PacketKind::Rtp, ssrc))
}

/// One receiver-report block: the receiver's view of the media stream it is
/// pulling from this sender.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RtcpReportBlock {
    /// SSRC of the source this report is about.
    pub ssrc: Ssrc,
    /// Fraction of packets lost since the previous report, out of 256.
    pub packet_fraction_lost_numerator: u8,
    /// Cumulative number of packets lost (24-bit signed; late arrivals can
    /// drive it negative).
    pub cumulative_packets_lost: i32,
    /// Extended highest sequence number received.
    pub extended_high_sequence_number: u32,
    /// Interarrival jitter, in RTP ticks.
    pub jitter: RtpTimeDelta,
    /// Status report id echoed from the last Sender Report the receiver saw.
    pub last_status_report_id: StatusReportId,
    /// Delay since that Sender Report arrived, in 1/65536-second units.
    pub delay_since_last_report: u32,
}

impl RtcpReportBlock {
    /// Parses one 24-byte report block.
    pub fn parse(reader: &mut ByteReader<'_>) -> Result<Self> {
        let ssrc = reader.read_u32()?;
        let packet_fraction_lost_numerator = reader.read_u8()?;
        let raw_lost = reader.read_u24()?;
        // Sign-extend the 24-bit two's-complement count.
        let cumulative_packets_lost = if raw_lost & 0x0080_0000 != 0 {
            (raw_lost | 0xff00_0000) as i32
        } else {
            raw_lost as i32
        };
        let extended_high_sequence_number = reader.read_u32()?;
        let jitter = RtpTimeDelta::from_ticks(reader.read_u32()? as i64);
        let last_status_report_id = reader.read_u32()?;
        let delay_since_last_report = reader.read_u32()?;
        Ok(RtcpReportBlock {
            ssrc,
            packet_fraction_lost_numerator,
            cumulative_packets_lost,
            extended_high_sequence_number,
            jitter,
            last_status_report_id,
            delay_since_last_report,
        })
    }

    /// Serializes this block as 24 bytes.
    pub fn write(&self, writer: &mut ByteWriter<'_>) -> Result<()> {
        writer.write_u32(self.ssrc)?;
        writer.write_u8(self.packet_fraction_lost_numerator)?;
        writer.write_u24(self.cumulative_packets_lost as u32)?;
        writer.write_u32(self.extended_high_sequence_number)?;
        writer.write_u32(self.jitter.ticks() as u32)?;
        writer.write_u32(self.last_status_report_id)?;
        writer.write_u32(self.delay_since_last_report)
    }
}

/// The kinds of events a Cast receiver logs about frames and packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtcpReceiverEventType {
    /// The receiver sent an ACK for a fully-received frame.
    FrameAckSent,
    /// The receiver finished decoding a frame.
    FrameDecoded,
    /// A frame was played out, after its playout delay elapsed.
    FramePlayedOut,
    /// A media packet arrived.
    PacketReceived,
    /// An event code this implementation does not recognize.
    Unknown,
}

impl RtcpReceiverEventType {
    /// Maps a 4-bit wire code to an event type.
    pub fn from_wire(code: u8) -> Self {
        match code {
            1 => RtcpReceiverEventType::FrameAckSent,
            2 => RtcpReceiverEventType::FrameDecoded,
            3 => RtcpReceiverEventType::FramePlayedOut,
            4 => RtcpReceiverEventType::PacketReceived,
            _ => RtcpReceiverEventType::Unknown,
        }
    }
}

/// One entry in a receiver's event log for a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtcpReceiverEventLogMessage {
    /// What happened.
    pub event_type: RtcpReceiverEventType,
    /// When it happened, on the sender's clock.
    pub timestamp: Instant,
    /// Event-specific delay (e.g. how far ahead of playout a frame was
    /// acknowledged). Zero for [`RtcpReceiverEventType::PacketReceived`].
    pub delay: chrono::Duration,
    /// Which packet arrived. Only meaningful for
    /// [`RtcpReceiverEventType::PacketReceived`].
    pub packet_id: FramePacketId,
}

/// The receiver's event log for one frame, identified by its expanded RTP
/// timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtcpReceiverFrameLogMessage {
    /// The frame's RTP timestamp, expanded to full width.
    pub rtp_timestamp: RtpTimeTicks,
    /// The logged events, in wire order.
    pub messages: Vec<RtcpReceiverEventLogMessage>,
}

/// Identifies one missing packet, or (with [`ALL_PACKETS_LOST`]) an entire
/// missing frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PacketNack {
    /// The frame the packet belongs to.
    pub frame_id: FrameId,
    /// The missing packet, or [`ALL_PACKETS_LOST`].
    pub packet_id: FramePacketId,
}

/// Sorts and de-duplicates a NACK list into canonical form.
///
/// Entries are ordered by (frame, packet) with an [`ALL_PACKETS_LOST`]
/// entry sorting before any concrete packet id of the same frame (the
/// comparison treats packet ids modulo 2^16, shifted by one, which wraps
/// the sentinel to the front). Exact duplicates are dropped, as is any
/// concrete-packet entry for a frame that already has a whole-frame entry.
/// Idempotent.
pub fn canonicalize_packet_nacks(nacks: &mut Vec<PacketNack>) {
    nacks.sort_by_key(|nack| (nack.frame_id, nack.packet_id.wrapping_add(1)));
    nacks.dedup_by(|later, earlier| {
        later == earlier
            || (earlier.frame_id == later.frame_id && earlier.packet_id == ALL_PACKETS_LOST)
    });
}
