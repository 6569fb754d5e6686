//! DNS Module
//!
//! Wire-format handling on top of `hickory_proto`.

pub mod codec;
mod record;

pub use codec::MAX_DNS_PACKET_SIZE;
pub use record::ResourceRecord;
