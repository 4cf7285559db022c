#[cfg(test)]
mod tests {
    use castio::format::rtcp::{
        inspect_packet_for_routing, CompoundRtcpParser, PacketKind, RtcpSenderReport,
        RtcpSession, SenderReportBuilder, MAX_SENDER_REPORT_SIZE,
    };
    use castio::format::rtp::FrameId;
    use castio::format::tests::MockClient;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    /// Drives one status-report round trip through the public API: build a
    /// Sender Report, then feed the parser a Receiver Report echoing the
    /// minted status report id, and recover the original send time.
    #[test]
    fn test_status_report_round_trip() {
        let session = Arc::new(RtcpSession::new(1, 2, Instant::now()));
        let mut builder = SenderReportBuilder::new(session.clone());
        let mut parser = CompoundRtcpParser::new(session.clone());

        let reference_time = session.start_time() + Duration::from_millis(500);
        let sender_report = RtcpSenderReport {
            reference_time,
            rtp_timestamp: Default::default(),
            send_packet_count: 100,
            send_octet_count: 16_000,
            report_block: None,
        };
        let mut buffer = [0u8; MAX_SENDER_REPORT_SIZE];
        let (len, report_id) = builder.build_packet(&sender_report, &mut buffer).unwrap();

        // The built packet routes to the RTCP path under the sender's SSRC.
        assert_eq!(
            inspect_packet_for_routing(&buffer[..len]),
            Some((PacketKind::Rtcp, 1))
        );

        // The receiver acknowledges that report in its next report block.
        let mut feedback = vec![
            0x81, 0xc9, 0x00, 0x07, // V=2, one block, RR(201)
            0x00, 0x00, 0x00, 0x02, // receiver SSRC
            0x00, 0x00, 0x00, 0x01, // about this sender
            0x00, // no loss
            0x00, 0x00, 0x00, // cumulative 0
            0x00, 0x00, 0x04, 0x00, // highest sequence number
            0x00, 0x00, 0x00, 0x08, // jitter
        ];
        feedback.extend_from_slice(&report_id.to_be_bytes());
        feedback.extend_from_slice(&0x0000_8000u32.to_be_bytes()); // DLSR 0.5 s

        let mut client = MockClient::new();
        parser
            .parse(&feedback, FrameId::first() + 50, &mut client)
            .unwrap();

        assert_eq!(client.receiver_reports.len(), 1);
        let block = &client.receiver_reports[0];
        assert_eq!(block.last_status_report_id, report_id);
        assert_eq!(block.delay_since_last_report, 0x8000);

        // The sender can now resolve when that report went out.
        let arrival = session.start_time() + Duration::from_secs(2);
        assert_eq!(
            builder.recent_report_time(block.last_status_report_id, arrival),
            Some(reference_time)
        );
    }

    /// A receiver's steady-state compound packet: extended report with a
    /// reference time, a receiver report, and Cast feedback, all decoded
    /// from one buffer in one call.
    #[test]
    fn test_full_compound_feedback_packet() {
        let session = Arc::new(RtcpSession::new(1, 2, Instant::now()));
        let mut parser = CompoundRtcpParser::new(session.clone());

        let reference_time = session.start_time() + Duration::from_secs(1);
        let ntp = session.ntp_converter().to_ntp_time(reference_time);

        let mut packet = vec![
            0x80, 0xcf, 0x00, 0x04, // XR with a reference time report
            0x00, 0x00, 0x00, 0x02, //
            0x04, 0x00, 0x00, 0x02, //
        ];
        packet.extend_from_slice(&ntp.to_be_bytes());
        packet.extend_from_slice(&[
            0x81, 0xc9, 0x00, 0x07, // receiver report
            0x00, 0x00, 0x00, 0x02, //
            0x00, 0x00, 0x00, 0x01, //
            0x02, 0x00, 0x00, 0x01, //
            0x00, 0x00, 0x10, 0x00, //
            0x00, 0x00, 0x00, 0x20, //
            0x00, 0x00, 0x00, 0x00, //
            0x00, 0x00, 0x00, 0x00, //
            0x8f, 0xce, 0x00, 0x05, // Cast feedback
            0x00, 0x00, 0x00, 0x02, //
            0x00, 0x00, 0x00, 0x01, //
            0x43, 0x41, 0x53, 0x54, // "CAST"
            0x05, // checkpoint frame 5
            0x01, // one loss field
            0x00, 0x64, // playout delay 100 ms
            0x07, 0x00, 0x01, 0x05, // frame 7: packets 1, 2, 4
        ]);

        let mut client = MockClient::new();
        let max_feedback_frame_id = FrameId::first() + 5;
        parser
            .parse(&packet, max_feedback_frame_id, &mut client)
            .unwrap();

        assert_eq!(client.reference_times.len(), 1);
        assert_eq!(client.receiver_reports.len(), 1);
        assert_eq!(
            client.checkpoints,
            vec![(FrameId::first() + 5, Duration::from_millis(100))]
        );
        let nacks = &client.nacks[0];
        assert_eq!(nacks.len(), 3);
        assert!(nacks
            .iter()
            .all(|nack| nack.frame_id == FrameId::first() + 7));
        assert_eq!(
            nacks.iter().map(|nack| nack.packet_id).collect::<Vec<_>>(),
            vec![1, 2, 4]
        );
    }
}
