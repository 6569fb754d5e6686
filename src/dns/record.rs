//! Resource Record Module
//!
//! Owned, hashable form of a DNS resource record. The cache and the snapshot
//! work on this type; the codec converts it to and from `hickory_proto` records.

use hickory_proto::rr::{Name, Record};
use hickory_proto::serialize::binary::{BinDecodable, BinEncodable, BinEncoder};
use serde::{Deserialize, Serialize};

use crate::error::{ResolverError, Result};

// == Resource Record ==
/// A single DNS answer unit with an opaque RDATA payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceRecord {
    /// Owner name as received (case preserved)
    pub name: String,
    /// Numeric record type (1 = A, 28 = AAAA, ...)
    pub record_type: u16,
    /// Numeric class, almost always 1 (IN)
    pub dns_class: u16,
    /// Time-to-live in seconds
    pub ttl: u32,
    /// Uncompressed RDATA bytes
    pub rdata: Vec<u8>,
}

impl ResourceRecord {
    /// Converts a decoded wire record into its owned form.
    ///
    /// RDATA is re-encoded with canonical (uncompressed) names so the payload
    /// stays meaningful outside the message it came from.
    pub fn from_record(record: &Record) -> Result<Self> {
        let mut rdata = Vec::new();
        if let Some(data) = record.data() {
            let mut encoder = BinEncoder::new(&mut rdata);
            encoder.set_canonical_names(true);
            data.emit(&mut encoder)?;
        }

        Ok(Self {
            name: record.name().to_ascii(),
            record_type: u16::from(record.record_type()),
            dns_class: u16::from(record.dns_class()),
            ttl: record.ttl(),
            rdata,
        })
    }

    /// Rebuilds a wire record, e.g. to place it in a synthesized answer.
    pub fn to_record(&self) -> Result<Record> {
        let name = Name::from_ascii(&self.name)?;
        let rdata_len = u16::try_from(self.rdata.len()).map_err(|_| {
            ResolverError::Format(format!("rdata of {} is too long", self.name))
        })?;

        let mut wire = Vec::with_capacity(self.name.len() + 12 + self.rdata.len());
        {
            let mut encoder = BinEncoder::new(&mut wire);
            encoder.set_canonical_names(true);
            name.emit(&mut encoder)?;
            encoder.emit_u16(self.record_type)?;
            encoder.emit_u16(self.dns_class)?;
            encoder.emit_u32(self.ttl)?;
            encoder.emit_u16(rdata_len)?;
            encoder.emit_vec(&self.rdata)?;
        }

        Ok(Record::from_bytes(&wire)?)
    }

    /// Returns a copy with a different TTL (used for remaining-TTL answers).
    pub fn with_ttl(&self, ttl: u32) -> Self {
        Self {
            ttl,
            ..self.clone()
        }
    }
}
