//! Dashboard wire protocol (`spec.md` §6.3): length-prefixed JSON records
//! over the push channel, plus the `?since=<generation>:<seq>` resume
//! token.

use serde::Serialize;

use crate::bus::Delivery;

/// A client's resume position, parsed out of `?since=<generation>:<seq>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumeToken {
    pub generation: u64,
    pub seq: u64,
}

impl ResumeToken {
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let (generation, seq) = raw.split_once(':')?;
        Some(Self {
            generation: generation.parse().ok()?,
            seq: seq.parse().ok()?,
        })
    }
}

#[derive(Serialize)]
struct WireEvent<'a> {
    seq: u64,
    generation: u64,
    kind: &'a str,
    id: &'a str,
    op: &'a str,
    at: String,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireRecord<'a> {
    Event(WireEvent<'a>),
    Lagged { dropped: u64 },
}

/// Frames one record as a 4-byte big-endian length prefix followed by its
/// JSON body (`spec.md` §6.3's "length-prefixed records").
#[must_use]
pub fn encode_delivery(delivery: &Delivery) -> Vec<u8> {
    match delivery {
        Delivery::Event(event) => frame(&WireRecord::Event(WireEvent {
            seq: event.seq,
            generation: event.generation,
            kind: event.kind.cli_name(),
            id: &event.id,
            op: event.op.as_str(),
            at: event.at.to_string(),
        })),
        Delivery::Lagged { dropped } => frame(&WireRecord::Lagged { dropped: *dropped }),
    }
}

fn frame(record: &impl Serialize) -> Vec<u8> {
    let body = serde_json::to_vec(record).expect("wire records always serialize");
    let len = u32::try_from(body.len()).unwrap_or(u32::MAX);
    let mut framed = Vec::with_capacity(4 + body.len());
    framed.extend_from_slice(&len.to_be_bytes());
    framed.extend_from_slice(&body);
    framed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resume_token_parses_generation_and_seq() {
        let token = ResumeToken::parse("42:7").unwrap();
        assert_eq!(token.generation, 42);
        assert_eq!(token.seq, 7);
    }

    #[test]
    fn resume_token_rejects_malformed_input() {
        assert!(ResumeToken::parse("not-a-token").is_none());
        assert!(ResumeToken::parse("42").is_none());
    }

    #[test]
    fn encode_lagged_frames_dropped_count() {
        let framed = encode_delivery(&Delivery::Lagged { dropped: 3 });
        let len = u32::from_be_bytes(framed[..4].try_into().unwrap()) as usize;
        assert_eq!(framed.len(), 4 + len);
        let body: serde_json::Value = serde_json::from_slice(&framed[4..]).unwrap();
        assert_eq!(body["dropped"], 3);
        assert_eq!(body["type"], "lagged");
    }
}
