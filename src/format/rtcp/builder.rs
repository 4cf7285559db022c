use super::{
    RtcpCommonHeader, RtcpReportBlock, RtcpSession, StatusReportId, PT_SENDER_REPORT,
    RTCP_COMMON_HEADER_SIZE, RTCP_REPORT_BLOCK_SIZE,
};
use crate::error::Result;
use crate::format::rtp::RtpTimeTicks;
use crate::utils::ByteWriter;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

/// Size of the sender-info fields following the common header: 64-bit NTP
/// timestamp, RTP timestamp, packet count, octet count.
const SENDER_INFO_SIZE: usize = 20;

/// The buffer size needed to build any Sender Report.
pub const MAX_SENDER_REPORT_SIZE: usize =
    RTCP_COMMON_HEADER_SIZE + SENDER_INFO_SIZE + RTCP_REPORT_BLOCK_SIZE;

/// How many recently-built reports are remembered for
/// [`SenderReportBuilder::recent_report_time`] lookups. Receivers only
/// ever acknowledge reports a round trip old, so a short history suffices.
const RECENT_REPORT_HISTORY: usize = 8;

/// One outgoing Sender Report, before serialization.
#[derive(Debug, Clone)]
pub struct RtcpSenderReport {
    /// The local clock reading this report describes.
    pub reference_time: Instant,
    /// The media-clock reading corresponding to `reference_time`.
    pub rtp_timestamp: RtpTimeTicks,
    /// Total RTP packets sent this session.
    pub send_packet_count: u32,
    /// Total RTP payload octets sent this session.
    pub send_octet_count: u32,
    /// Optional report block about the reverse direction.
    pub report_block: Option<RtcpReportBlock>,
}

/// Serializes Sender Reports and remembers when each one was sent.
///
/// Building a report mints a [`StatusReportId`], the middle 32 bits of
/// the report's NTP timestamp. Receivers echo that id back in their report
/// blocks (as [`RtcpReportBlock::last_status_report_id`]), letting the
/// sender recover the original send time for round-trip measurement via
/// [`SenderReportBuilder::recent_report_time`].
pub struct SenderReportBuilder {
    session: Arc<RtcpSession>,
    recent_reports: VecDeque<(StatusReportId, Instant)>,
}

impl SenderReportBuilder {
    /// Creates a builder for one session.
    pub fn new(session: Arc<RtcpSession>) -> Self {
        SenderReportBuilder {
            session,
            recent_reports: VecDeque::with_capacity(RECENT_REPORT_HISTORY),
        }
    }

    /// Serializes `sender_report` into the front of `buffer`.
    ///
    /// `buffer` must hold at least [`MAX_SENDER_REPORT_SIZE`] bytes when a
    /// report block is present. Returns the number of bytes written and
    /// the status report id minted for this report.
    pub fn build_packet(
        &mut self,
        sender_report: &RtcpSenderReport,
        buffer: &mut [u8],
    ) -> Result<(usize, StatusReportId)> {
        let mut writer = ByteWriter::new(buffer);
        let payload_size = SENDER_INFO_SIZE
            + sender_report
                .report_block
                .map_or(0, |_| RTCP_REPORT_BLOCK_SIZE);
        RtcpCommonHeader {
            packet_type: PT_SENDER_REPORT,
            count_or_subtype: sender_report.report_block.is_some() as u8,
            ssrc: self.session.sender_ssrc(),
            payload_size,
        }
        .write(&mut writer)?;

        let ntp = self
            .session
            .ntp_converter()
            .to_ntp_time(sender_report.reference_time);
        writer.write_u64(ntp)?;
        writer.write_u32(sender_report.rtp_timestamp.lower_32_bits())?;
        writer.write_u32(sender_report.send_packet_count)?;
        writer.write_u32(sender_report.send_octet_count)?;
        if let Some(report_block) = &sender_report.report_block {
            report_block.write(&mut writer)?;
        }

        let report_id = (ntp >> 16) as StatusReportId;
        self.recent_reports
            .push_front((report_id, sender_report.reference_time));
        self.recent_reports.truncate(RECENT_REPORT_HISTORY);
        Ok((writer.written(), report_id))
    }

    /// Looks up when the report identified by `report_id` was built.
    ///
    /// `on_or_before` bounds the search: status report ids repeat every
    /// ~18 hours, so the caller supplies a time the report cannot
    /// postdate (e.g. when the acknowledging packet arrived) and the
    /// newest qualifying report wins.
    pub fn recent_report_time(
        &self,
        report_id: StatusReportId,
        on_or_before: Instant,
    ) -> Option<Instant> {
        self.recent_reports
            .iter()
            .find(|(id, time)| *id == report_id && *time <= on_or_before)
            .map(|(_, time)| *time)
    }
}
