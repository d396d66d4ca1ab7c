//! Payload fragmentation and reassembly.
//!
//! Round payloads (event metadata, layer images) routinely exceed what a
//! single frame should carry, so the sender splits them into fixed-size
//! [`Message::DataChunk`] fragments and the receiver reassembles them.
//!
//! - [`split`] turns a payload into a chunk sequence under a fresh
//!   [`GroupId`].
//! - [`send_paced`] pushes chunks through any sink with a periodic
//!   breather, so a large transfer never monopolizes the event loop.
//! - [`Assembler`] collects fragments (in any order, duplicates
//!   tolerated) and yields the payload exactly once when complete.
//!
//! [`Message::DataChunk`]: squall_protocol::Message::DataChunk

mod assemble;
mod error;
mod split;

pub use assemble::{Assembler, Reassembled};
pub use error::ChunkError;
pub use split::{CHUNK_SIZE, GroupId, YIELD_EVERY, send_paced, split};
