//! # RTP Identifier and Media-Time Types
//!
//! This module provides the identifier and clock value types shared by the
//! RTP/RTCP handling in this crate:
//!
//! - SSRC identifiers for session endpoints
//! - Logical frame counters (`FrameId`) with truncated wire encoding
//! - Monotonic media-clock values (`RtpTimeTicks`) and deltas
//! - Expansion of truncated wire fields back to full-width values
//!
//! Frame ids and RTP timestamps travel the wire as truncated fields (8 and
//! 32 bits respectively) and must be re-expanded against a full-width
//! reference value the two ends already agree on. The expansion operations
//! here select the unique value congruent to the wire field that satisfies
//! the documented bound, using plain modular arithmetic.
//!
//! ## Example: Expanding a truncated frame id
//!
//! ```rust
//! use castio::format::rtp::FrameId;
//!
//! let latest = FrameId::first() + 1000;
//! // A wire byte of 0xEA could mean frame 746, 1002, 1258, ... The
//! // receiver's checkpoint can never be ahead of the latest sent frame,
//! // so expand to the nearest candidate at or below it.
//! let checkpoint = latest.expand_less_than_or_equal(0xEA);
//! assert_eq!(checkpoint, FrameId::first() + 746);
//! ```

use std::fmt;
use std::ops::{Add, AddAssign, Sub};

/// Synchronization source identifier, as in RFC 3550.
pub type Ssrc = u32;

/// The reserved null SSRC; never identifies a real endpoint.
pub const NULL_SSRC: Ssrc = 0;

/// Identifies one packet within a frame.
pub type FramePacketId = u16;

/// Largest value congruent to `wire` modulo `modulus` that is <= `bound`.
fn expand_less_than_or_equal(bound: i64, wire: i64, modulus: i64) -> i64 {
    bound - (bound - wire).rem_euclid(modulus)
}

/// Smallest value congruent to `wire` modulo `modulus` that is > `bound`.
fn expand_greater_than(bound: i64, wire: i64, modulus: i64) -> i64 {
    expand_less_than_or_equal(bound + modulus, wire, modulus)
}

/// Value congruent to `wire` modulo `modulus` nearest to `reference`
/// (ties resolve upward).
fn expand_nearest(reference: i64, wire: i64, modulus: i64) -> i64 {
    expand_less_than_or_equal(reference + modulus / 2, wire, modulus)
}

/// A logical, monotonically increasing frame counter.
///
/// Locally a frame id has unbounded range, but it is transmitted on the
/// wire as its low 8 bits and re-expanded against a reference on receipt.
/// "Unset" frame ids are expressed as `Option<FrameId>`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameId(i64);

impl FrameId {
    const WIRE_MODULUS: i64 = 1 << 8;

    /// The id of the first frame in a stream.
    pub const fn first() -> Self {
        FrameId(0)
    }

    /// The low 8 bits, as sent on the wire.
    pub fn lower_8_bits(self) -> u8 {
        self.0 as u8
    }

    /// Expands a truncated wire value to the nearest frame id congruent to
    /// it that is less than or equal to `self`.
    ///
    /// Used for the receiver checkpoint, which can never be ahead of the
    /// latest frame the sender could expect acknowledgment for.
    pub fn expand_less_than_or_equal(self, wire: u8) -> FrameId {
        FrameId(expand_less_than_or_equal(
            self.0,
            wire as i64,
            Self::WIRE_MODULUS,
        ))
    }

    /// Expands a truncated wire value to the nearest frame id congruent to
    /// it that is strictly greater than `self`.
    ///
    /// Used for NACK loss-field frames, which always follow the checkpoint.
    pub fn expand_greater_than(self, wire: u8) -> FrameId {
        FrameId(expand_greater_than(self.0, wire as i64, Self::WIRE_MODULUS))
    }
}

impl Add<u64> for FrameId {
    type Output = FrameId;

    fn add(self, rhs: u64) -> FrameId {
        FrameId(self.0 + rhs as i64)
    }
}

impl AddAssign<u64> for FrameId {
    fn add_assign(&mut self, rhs: u64) {
        self.0 += rhs as i64;
    }
}

impl Sub<u64> for FrameId {
    type Output = FrameId;

    fn sub(self, rhs: u64) -> FrameId {
        FrameId(self.0 - rhs as i64)
    }
}

impl Sub for FrameId {
    type Output = i64;

    fn sub(self, rhs: FrameId) -> i64 {
        self.0 - rhs.0
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A monotonic media-clock reading, in ticks of the stream's RTP clock.
///
/// Like [`FrameId`], the full value has unbounded local range but travels
/// the wire as its low 32 bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RtpTimeTicks(i64);

impl RtpTimeTicks {
    const WIRE_MODULUS: i64 = 1 << 32;

    /// Creates a tick value from a raw tick count.
    pub const fn from_ticks(ticks: i64) -> Self {
        RtpTimeTicks(ticks)
    }

    /// The raw tick count.
    pub fn ticks(self) -> i64 {
        self.0
    }

    /// The low 32 bits, as sent on the wire.
    pub fn lower_32_bits(self) -> u32 {
        self.0 as u32
    }

    /// Expands a truncated wire value to the tick count congruent to it
    /// nearest to `self`.
    ///
    /// Used to re-expand the timestamps chained through receiver event
    /// logs, which may legitimately land slightly before or after the
    /// previous value in the chain.
    pub fn expand_nearest(self, wire: u32) -> RtpTimeTicks {
        RtpTimeTicks(expand_nearest(self.0, wire as i64, Self::WIRE_MODULUS))
    }

    /// Expands a truncated wire value to the nearest tick count congruent
    /// to it that is less than or equal to `self`.
    pub fn expand_less_than_or_equal(self, wire: u32) -> RtpTimeTicks {
        RtpTimeTicks(expand_less_than_or_equal(
            self.0,
            wire as i64,
            Self::WIRE_MODULUS,
        ))
    }

    /// Expands a truncated wire value to the nearest tick count congruent
    /// to it that is strictly greater than `self`.
    pub fn expand_greater_than(self, wire: u32) -> RtpTimeTicks {
        RtpTimeTicks(expand_greater_than(self.0, wire as i64, Self::WIRE_MODULUS))
    }
}

impl Add<RtpTimeDelta> for RtpTimeTicks {
    type Output = RtpTimeTicks;

    fn add(self, rhs: RtpTimeDelta) -> RtpTimeTicks {
        RtpTimeTicks(self.0 + rhs.0)
    }
}

impl Sub for RtpTimeTicks {
    type Output = RtpTimeDelta;

    fn sub(self, rhs: RtpTimeTicks) -> RtpTimeDelta {
        RtpTimeDelta(self.0 - rhs.0)
    }
}

/// A signed difference between two media-clock readings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RtpTimeDelta(i64);

impl RtpTimeDelta {
    /// Creates a delta from a raw tick count.
    pub const fn from_ticks(ticks: i64) -> Self {
        RtpTimeDelta(ticks)
    }

    /// The raw tick count.
    pub fn ticks(self) -> i64 {
        self.0
    }

    /// Converts the delta to wall time, given the stream's clock rate in
    /// ticks per second.
    pub fn to_duration(self, clock_rate: i32) -> chrono::Duration {
        let nanos = (self.0 as i128 * 1_000_000_000) / clock_rate as i128;
        chrono::Duration::nanoseconds(nanos as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_less_than_or_equal() {
        let bound = FrameId::first() + 1000; // 1000 & 0xFF == 0xE8
        assert_eq!(
            bound.expand_less_than_or_equal(0xE8),
            FrameId::first() + 1000
        );
        assert_eq!(
            bound.expand_less_than_or_equal(0xE7),
            FrameId::first() + 999
        );
        // Wire value "ahead" of the bound wraps back a full period.
        assert_eq!(
            bound.expand_less_than_or_equal(0xE9),
            FrameId::first() + 745
        );
    }

    #[test]
    fn test_expand_greater_than() {
        let bound = FrameId::first() + 1000;
        // Strictly greater: an equal wire value means one full period later.
        assert_eq!(bound.expand_greater_than(0xE8), FrameId::first() + 1256);
        assert_eq!(bound.expand_greater_than(0xE9), FrameId::first() + 1001);
        assert_eq!(bound.expand_greater_than(0xE7), FrameId::first() + 1255);
    }

    #[test]
    fn test_expansion_far_beyond_wire_width() {
        // Frame ids far past the 8-bit field still expand correctly.
        let bound = FrameId::first() + 0x0123_4567;
        for offset in 0u64..4 {
            let intended = bound - offset;
            let expanded = bound.expand_less_than_or_equal(intended.lower_8_bits());
            assert_eq!(expanded, intended);
        }
        for offset in 1u64..4 {
            let intended = bound + offset;
            let expanded = bound.expand_greater_than(intended.lower_8_bits());
            assert_eq!(expanded, intended);
        }
    }

    #[test]
    fn test_expand_small_bound() {
        // Early in a stream the congruent value at or below the bound can
        // precede the first frame.
        let bound = FrameId::first() + 5;
        assert_eq!(bound.expand_less_than_or_equal(0x05), FrameId::first() + 5);
        let expanded = bound.expand_less_than_or_equal(0x07);
        assert_eq!(expanded, FrameId::first() - 249);
    }

    #[test]
    fn test_frame_id_arithmetic() {
        let a = FrameId::first() + 10;
        let b = a + 5;
        assert_eq!(b - a, 5);
        assert!(b > a);
        assert_eq!(b - 5u64, a);
        let mut c = a;
        c += 2;
        assert_eq!(c - FrameId::first(), 12);
    }

    #[test]
    fn test_rtp_ticks_expand_nearest() {
        let reference = RtpTimeTicks::from_ticks(0x1_0000_0100);
        // Slightly behind and slightly ahead both resolve to the nearest
        // congruent value, crossing the 32-bit boundary when needed.
        assert_eq!(
            reference.expand_nearest(0x0000_00F0),
            RtpTimeTicks::from_ticks(0x1_0000_00F0)
        );
        assert_eq!(
            reference.expand_nearest(0xFFFF_FFF0),
            RtpTimeTicks::from_ticks(0x0_FFFF_FFF0)
        );
        assert_eq!(
            reference.expand_nearest(0x0000_0200),
            RtpTimeTicks::from_ticks(0x1_0000_0200)
        );
    }

    #[test]
    fn test_rtp_ticks_directional_expansion() {
        let bound = RtpTimeTicks::from_ticks(90_000);
        assert_eq!(
            bound.expand_less_than_or_equal(90_000),
            RtpTimeTicks::from_ticks(90_000)
        );
        assert_eq!(
            bound.expand_greater_than(90_000),
            RtpTimeTicks::from_ticks(90_000 + (1 << 32))
        );
    }

    #[test]
    fn test_delta_to_duration() {
        let delta = RtpTimeDelta::from_ticks(90_000);
        assert_eq!(delta.to_duration(90_000), chrono::Duration::seconds(1));
        let negative = RtpTimeDelta::from_ticks(-45_000);
        assert_eq!(
            negative.to_duration(90_000),
            chrono::Duration::milliseconds(-500)
        );
    }
}
