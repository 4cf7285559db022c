//! # Utility Functions and Types
//!
//! This module provides common utilities used throughout the castio
//! library. It includes implementations for:
//!
//! - Checked big-endian byte reading/writing over packet buffers
//!
//! ## Byte Operations
//!
//! The bytes module provides cursors for working with wire data:
//!
//! ```rust
//! use castio::utils::ByteReader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let data = vec![0x00u8, 0x01, 0x02, 0x03];
//! let mut reader = ByteReader::new(&data);
//!
//! // Read a big-endian 32-bit field
//! let value = reader.read_u32()?;
//! assert_eq!(value, 0x00010203);
//! # Ok(())
//! # }
//! ```

/// Checked byte-level reading and writing utilities
pub mod bytes;

pub use self::bytes::{ByteReader, ByteWriter};
