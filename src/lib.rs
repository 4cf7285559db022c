#![doc(html_root_url = "https://docs.rs/castio/0.1.0")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]

//! # castio - Rust Cast Streaming Toolkit
//!
//! `castio` is a toolkit for building Cast Streaming media senders in Rust.
//! It implements the receiver-to-sender RTCP feedback channel of the
//! protocol: decoding compound feedback packets from a receiver and
//! building the Sender Reports that flow the other way, together with the
//! per-session state both directions share.
//!
//! ## Features
//!
//! ### Feedback Parsing
//! - Compound RTCP packet parsing with atomic all-or-nothing semantics
//! - Receiver reports, frame ACK/NACK bitmaps, picture-loss indication
//! - Receiver event logs and wall-clock synchronization (extended reports)
//! - Staleness filtering for out-of-order network delivery
//!
//! ### Report Building
//! - Sender Report serialization into caller-provided buffers
//! - Status-report-id correlation for round-trip time measurement
//!
//! ## Quick Start
//!
//! Add this to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! castio = "0.1.0"
//! ```
//!
//! ### Parsing Receiver Feedback
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::{Duration, Instant};
//! use castio::format::rtcp::{Client, CompoundRtcpParser, PacketNack, RtcpSession};
//! use castio::format::rtp::FrameId;
//!
//! struct FeedbackHandler;
//!
//! impl Client for FeedbackHandler {
//!     fn on_receiver_checkpoint(&mut self, frame_id: FrameId, playout_delay: Duration) {
//!         println!("receiver has everything through {}", frame_id);
//!     }
//!
//!     fn on_receiver_is_missing_packets(&mut self, nacks: &[PacketNack]) {
//!         println!("{} packets need retransmission", nacks.len());
//!     }
//! }
//!
//! # fn main() -> castio::Result<()> {
//! let session = Arc::new(RtcpSession::new(1, 2, Instant::now()));
//! let mut parser = CompoundRtcpParser::new(session);
//! let mut handler = FeedbackHandler;
//!
//! let packet: &[u8] = &[]; // from the transport layer
//! let latest_sent_frame = FrameId::first();
//! parser.parse(packet, latest_sent_frame, &mut handler)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! - `format`: Protocol implementations
//!   - RTCP compound parsing, sender reports, session state
//!   - RTP identifier and media-time value types
//!
//! - `error`: Error handling types and utilities
//!   - Crate error type distinguishing malformed wire data
//!   - Result type alias for convenience
//!
//! - `utils`: Common utilities and helper functions
//!   - Checked big-endian byte reading/writing
//!
/// Error types and utilities
pub mod error;

/// Media protocol implementations (RTP value types, RTCP)
pub mod format;

/// Common utilities and helper functions
pub mod utils;

pub use error::{CastError, Result};
