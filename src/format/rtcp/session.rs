use crate::format::rtp::{Ssrc, NULL_SSRC};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// A 64-bit NTP timestamp: seconds since January 1, 1900 in the high 32
/// bits, binary fraction of a second in the low 32 bits.
pub type NtpTimestamp = u64;

/// Seconds between the NTP epoch (1900) and the Unix epoch (1970).
const NTP_EPOCH_OFFSET: u64 = 2_208_988_800;

fn duration_to_ntp_delta(duration: Duration) -> u64 {
    let frac = ((duration.subsec_nanos() as u64) << 32) / 1_000_000_000;
    (duration.as_secs() << 32) | frac
}

fn ntp_delta_to_duration(delta: u64) -> Duration {
    let secs = delta >> 32;
    let nanos = ((delta & 0xffff_ffff) * 1_000_000_000) >> 32;
    Duration::new(secs, nanos as u32)
}

/// Bidirectional mapping between the local monotonic clock and NTP wall
/// time, fixed at session start.
///
/// Both ends of a Cast session exchange NTP timestamps; the sender anchors
/// them to its own monotonic clock here so that every parsed wall-clock
/// value becomes an `Instant` comparable with local ones.
#[derive(Debug, Clone, Copy)]
pub struct NtpTimeConverter {
    start_time: Instant,
    start_ntp: NtpTimestamp,
}

impl NtpTimeConverter {
    /// Creates a converter anchoring `start_time` on the local monotonic
    /// clock to the wall clock, given as a duration since the Unix epoch.
    pub fn new(start_time: Instant, since_unix_epoch: Duration) -> Self {
        let secs = since_unix_epoch.as_secs() + NTP_EPOCH_OFFSET;
        let frac = ((since_unix_epoch.subsec_nanos() as u64) << 32) / 1_000_000_000;
        NtpTimeConverter {
            start_time,
            start_ntp: (secs << 32) | frac,
        }
    }

    /// Converts an NTP timestamp into the local clock domain.
    ///
    /// Values that map before the session anchor saturate to the anchor if
    /// the platform cannot represent an earlier `Instant`.
    pub fn to_local_time(&self, ntp: NtpTimestamp) -> Instant {
        let delta = ntp.wrapping_sub(self.start_ntp) as i64;
        if delta >= 0 {
            self.start_time + ntp_delta_to_duration(delta as u64)
        } else {
            self.start_time
                .checked_sub(ntp_delta_to_duration(delta.unsigned_abs()))
                .unwrap_or(self.start_time)
        }
    }

    /// Converts a local clock reading into an NTP timestamp.
    pub fn to_ntp_time(&self, time: Instant) -> NtpTimestamp {
        if time >= self.start_time {
            self.start_ntp
                .wrapping_add(duration_to_ntp_delta(time - self.start_time))
        } else {
            self.start_ntp
                .wrapping_sub(duration_to_ntp_delta(self.start_time - time))
        }
    }
}

/// Shared state for one Cast RTCP session: the two endpoint identities and
/// the session's time base.
///
/// Immutable after construction; the parser and builder each hold a shared
/// reference (an `Arc`) to one session, which outlives both. Read-only
/// access is safe across threads.
#[derive(Debug)]
pub struct RtcpSession {
    sender_ssrc: Ssrc,
    receiver_ssrc: Ssrc,
    start_time: Instant,
    ntp_converter: NtpTimeConverter,
}

impl RtcpSession {
    /// Creates the session state for one streaming session.
    ///
    /// # Panics
    ///
    /// Panics if either SSRC is the null value or the two are equal; a
    /// session between such endpoints is a programming error, not a
    /// runtime condition.
    pub fn new(sender_ssrc: Ssrc, receiver_ssrc: Ssrc, start_time: Instant) -> Self {
        assert_ne!(sender_ssrc, NULL_SSRC, "sender SSRC must not be null");
        assert_ne!(receiver_ssrc, NULL_SSRC, "receiver SSRC must not be null");
        assert_ne!(
            sender_ssrc, receiver_ssrc,
            "sender and receiver SSRCs must differ"
        );
        let since_unix_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        RtcpSession {
            sender_ssrc,
            receiver_ssrc,
            start_time,
            ntp_converter: NtpTimeConverter::new(start_time, since_unix_epoch),
        }
    }

    /// SSRC identifying the media sender (the local endpoint).
    pub fn sender_ssrc(&self) -> Ssrc {
        self.sender_ssrc
    }

    /// SSRC identifying the receiver this session streams to.
    pub fn receiver_ssrc(&self) -> Ssrc {
        self.receiver_ssrc
    }

    /// Local clock epoch for this session.
    pub fn start_time(&self) -> Instant {
        self.start_time
    }

    /// The session's wall-clock mapping.
    pub fn ntp_converter(&self) -> &NtpTimeConverter {
        &self.ntp_converter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ntp_round_trip() {
        let start = Instant::now();
        let converter = NtpTimeConverter::new(start, Duration::from_secs(1_700_000_000));

        for offset_ms in [0u64, 1, 250, 999, 1000, 65_537_000] {
            let local = start + Duration::from_millis(offset_ms);
            let ntp = converter.to_ntp_time(local);
            let back = converter.to_local_time(ntp);
            let error = if back >= local { back - local } else { local - back };
            // The 32-bit fraction quantizes to well under a microsecond.
            assert!(error < Duration::from_micros(1), "error {:?}", error);
        }
    }

    #[test]
    fn test_ntp_epoch_offset() {
        let start = Instant::now();
        let converter = NtpTimeConverter::new(start, Duration::ZERO);
        // A wall clock at the Unix epoch sits exactly NTP_EPOCH_OFFSET
        // seconds past the NTP epoch.
        assert_eq!(converter.to_ntp_time(start) >> 32, NTP_EPOCH_OFFSET);
    }

    #[test]
    fn test_to_local_time_before_anchor() {
        let start = Instant::now();
        let converter = NtpTimeConverter::new(start, Duration::from_secs(1_700_000_000));
        let earlier = converter.to_ntp_time(start).wrapping_sub(1u64 << 32);
        assert!(converter.to_local_time(earlier) <= start);
    }

    #[test]
    fn test_session_accessors() {
        let start = Instant::now();
        let session = RtcpSession::new(1, 2, start);
        assert_eq!(session.sender_ssrc(), 1);
        assert_eq!(session.receiver_ssrc(), 2);
        assert_eq!(session.start_time(), start);
    }

    #[test]
    #[should_panic(expected = "must not be null")]
    fn test_session_rejects_null_ssrc() {
        RtcpSession::new(0, 2, Instant::now());
    }

    #[test]
    #[should_panic(expected = "must differ")]
    fn test_session_rejects_equal_ssrcs() {
        RtcpSession::new(7, 7, Instant::now());
    }
}
