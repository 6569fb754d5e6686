//! DNS Codec Module
//!
//! Thin layer over `hickory_proto` messages: decoding, encoding, record
//! extraction, cached reply synthesis and upstream response correlation.

use hickory_proto::op::{Message, MessageType, ResponseCode};
use tracing::debug;

use crate::cache::CacheKey;
use crate::dns::ResourceRecord;
use crate::error::{ResolverError, Result};

/// Largest datagram accepted from clients or the upstream.
pub const MAX_DNS_PACKET_SIZE: usize = 4096;

/// Decodes a wire-format datagram.
pub fn decode(bytes: &[u8]) -> Result<Message> {
    Message::from_vec(bytes).map_err(|e| ResolverError::Format(e.to_string()))
}

/// Encodes a message back to wire format.
pub fn encode(message: &Message) -> Result<Vec<u8>> {
    Ok(message.to_vec()?)
}

/// Returns true when the message is a query rather than a response.
pub fn is_query(message: &Message) -> bool {
    message.message_type() == MessageType::Query
}

/// Cache key of the message's first question, if it has one.
pub fn question_key(message: &Message) -> Option<CacheKey> {
    message
        .queries()
        .first()
        .map(|q| CacheKey::new(&q.name().to_ascii(), u16::from(q.query_type())))
}

/// Collects every record in the answer, authority and additional sections.
///
/// Records that cannot be converted are skipped; the rest of the message is
/// still useful.
pub fn observed_records(message: &Message) -> Vec<ResourceRecord> {
    message
        .answers()
        .iter()
        .chain(message.name_servers())
        .chain(message.additionals())
        .filter_map(|record| match ResourceRecord::from_record(record) {
            Ok(rr) => Some(rr),
            Err(e) => {
                debug!(name = %record.name(), error = %e, "Skipping unconvertible record");
                None
            }
        })
        .collect()
}

/// Builds the reply for a cache hit: the query's header and question echoed
/// back with the cached records as the answer section.
pub fn build_cached_reply(query: &Message, records: &[ResourceRecord]) -> Result<Message> {
    let mut reply = Message::new();
    reply
        .set_id(query.id())
        .set_message_type(MessageType::Response)
        .set_op_code(query.op_code())
        .set_recursion_desired(query.recursion_desired())
        .set_recursion_available(true)
        .set_checking_disabled(query.checking_disabled())
        .set_response_code(ResponseCode::NoError);

    for q in query.queries() {
        reply.add_query(q.clone());
    }
    for record in records {
        reply.add_answer(record.to_record()?);
    }

    Ok(reply)
}

/// Checks that an upstream response belongs to the query it answers.
///
/// Same transaction id, marked as a response, and the same question section
/// (names compared case-insensitively).
pub fn response_matches(query: &Message, response: &Message) -> Result<()> {
    if response.id() != query.id() {
        return Err(ResolverError::UnexpectedResponse(format!(
            "id {} does not match query id {}",
            response.id(),
            query.id()
        )));
    }

    if response.message_type() != MessageType::Response {
        return Err(ResolverError::UnexpectedResponse(
            "upstream sent a query, not a response".to_string(),
        ));
    }

    if question_key(response).is_some() && question_key(response) != question_key(query) {
        return Err(ResolverError::UnexpectedResponse(
            "question section differs from the query".to_string(),
        ));
    }

    Ok(())
}
