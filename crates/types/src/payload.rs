//! Wire payload tagging for outbound engine messages (spec §4.4
//! `must_send`): protobuf-tagged messages are sent as-is, everything else
//! is JSON-encoded.
#[derive(Debug, Clone)]
pub enum OutboundPayload {
    Protobuf(Vec<u8>),
    Json(Vec<u8>),
}

impl OutboundPayload {
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            OutboundPayload::Protobuf(bytes) => bytes,
            OutboundPayload::Json(bytes) => bytes,
        }
    }
}
