//! The transport-level packet union and its framing.
//!
//! A packet is encoded by flattening its tag and fields positionally into
//! the wire codec's sequence mode. Decoding reads a flat decoded sequence
//! and reconstructs packets by tag-driven arity: each tag consumes a fixed,
//! tag-specific number of subsequent slots, then the reader resumes at the
//! next slot. Packets of different tags may appear back-to-back in one
//! frame.

use hfn_wire::{decode_seq, encode_seq, Value};

use crate::ProtocolError;

/// A transport-level control or data packet.
///
/// Control packets (tags 1–7) carry a single map slot; keys are the short
/// names used on the wire (`pi`, `pt`, `delay`, `target`, `reason`). Absent
/// keys mean "use the default".
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// Tag 1, server → client. The connection-level handshake: the server
    /// announces its heartbeat timing.
    Open {
        /// Ping interval in seconds. Default is 25.
        ping_interval: Option<u64>,
        /// Ping timeout in seconds. Default is 20.
        ping_timeout: Option<u64>,
    },
    /// Tag 2. Reconnect with the same session id after `delay` seconds.
    Retry {
        /// Seconds to wait before reconnecting.
        delay: Option<u64>,
    },
    /// Tag 3. Reconnect with a fresh session after `delay` seconds.
    Reset {
        /// Seconds to wait before reconnecting.
        delay: Option<u64>,
    },
    /// Tag 4. Reconnect to a different endpoint.
    Redirect {
        /// Seconds to wait before reconnecting.
        delay: Option<u64>,
        /// The endpoint to connect to instead.
        target: String,
    },
    /// Tag 5. The peer is closing the connection.
    Close {
        /// Human-readable close reason, if any.
        reason: Option<String>,
    },
    /// Tag 6. Liveness probe; must be answered with [`Packet::Pong`].
    Ping,
    /// Tag 7. Answer to a [`Packet::Ping`].
    Pong,
    /// Tag 8. An application message addressed by package id.
    Message {
        /// Message id (used when the sender wants an ACK; 0 otherwise).
        id: u32,
        /// The package this message belongs to.
        package_id: u32,
        /// Transport-opaque key/value headers.
        headers: Vec<(String, String)>,
        /// Wire-encoded [`crate::MessagePayload`] bytes.
        payload: Vec<u8>,
    },
    /// Tag 9. Acknowledges receipt of a MESSAGE by id.
    Ack {
        /// The acknowledged message id.
        id: u32,
        /// The package the acknowledged message belonged to.
        package_id: u32,
    },
}

impl Packet {
    /// The packet's wire tag.
    pub fn tag(&self) -> u8 {
        match self {
            Packet::Open { .. } => 1,
            Packet::Retry { .. } => 2,
            Packet::Reset { .. } => 3,
            Packet::Redirect { .. } => 4,
            Packet::Close { .. } => 5,
            Packet::Ping => 6,
            Packet::Pong => 7,
            Packet::Message { .. } => 8,
            Packet::Ack { .. } => 9,
        }
    }
}

/// Encodes one packet to its byte form.
pub fn encode_packet(packet: &Packet) -> Vec<u8> {
    let tag = Value::Int(packet.tag() as i64);
    match packet {
        Packet::Open {
            ping_interval,
            ping_timeout,
        } => {
            let mut data = Vec::new();
            if let Some(pi) = ping_interval {
                data.push(("pi".to_string(), Value::Int(*pi as i64)));
            }
            if let Some(pt) = ping_timeout {
                data.push(("pt".to_string(), Value::Int(*pt as i64)));
            }
            encode_seq(&[tag, Value::Map(data)])
        }
        Packet::Retry { delay } | Packet::Reset { delay } => {
            let mut data = Vec::new();
            if let Some(d) = delay {
                data.push(("delay".to_string(), Value::Int(*d as i64)));
            }
            encode_seq(&[tag, Value::Map(data)])
        }
        Packet::Redirect { delay, target } => {
            let mut data = Vec::new();
            if let Some(d) = delay {
                data.push(("delay".to_string(), Value::Int(*d as i64)));
            }
            data.push(("target".to_string(), Value::Str(target.clone())));
            encode_seq(&[tag, Value::Map(data)])
        }
        Packet::Close { reason } => {
            let mut data = Vec::new();
            if let Some(r) = reason {
                data.push(("reason".to_string(), Value::Str(r.clone())));
            }
            encode_seq(&[tag, Value::Map(data)])
        }
        Packet::Ping | Packet::Pong => encode_seq(&[tag, Value::Map(vec![])]),
        Packet::Message {
            id,
            package_id,
            headers,
            payload,
        } => {
            let header_map = Value::Map(
                headers
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::Str(v.clone())))
                    .collect(),
            );
            encode_seq(&[
                tag,
                Value::Int(*id as i64),
                Value::Int(*package_id as i64),
                header_map,
                Value::Bytes(payload.clone()),
            ])
        }
        Packet::Ack { id, package_id } => encode_seq(&[
            tag,
            Value::Int(*id as i64),
            Value::Int(*package_id as i64),
        ]),
    }
}

/// Decodes every packet contained in one physical frame.
///
/// An unknown tag silently terminates parsing of the remaining buffer —
/// tolerance over strictness, so a newer server can introduce packet types
/// without breaking older clients. A structurally malformed buffer returns
/// [`ProtocolError::Wire`] and the caller discards the whole frame.
pub fn decode_packets(buf: &[u8]) -> Result<Vec<Packet>, ProtocolError> {
    let slots = decode_seq(buf)?;
    let mut packets = Vec::new();
    let mut pos = 0;

    while pos < slots.len() {
        let Some(tag) = slots[pos].as_int() else {
            break;
        };
        pos += 1;
        match tag {
            1..=7 => {
                let data = take_slot(&slots, &mut pos, tag as u8)?;
                packets.push(decode_control(tag as u8, data)?);
            }
            8 => {
                let id = int_slot(take_slot(&slots, &mut pos, 8)?, "id")?;
                let package_id =
                    int_slot(take_slot(&slots, &mut pos, 8)?, "package_id")?;
                let headers =
                    header_slot(take_slot(&slots, &mut pos, 8)?)?;
                let payload =
                    bytes_slot(take_slot(&slots, &mut pos, 8)?, "payload")?;
                packets.push(Packet::Message {
                    id,
                    package_id,
                    headers,
                    payload,
                });
            }
            9 => {
                let id = int_slot(take_slot(&slots, &mut pos, 9)?, "id")?;
                let package_id =
                    int_slot(take_slot(&slots, &mut pos, 9)?, "package_id")?;
                packets.push(Packet::Ack { id, package_id });
            }
            // Forward compatibility: a tag from a newer protocol revision.
            // We cannot know its arity, so stop here.
            _ => break,
        }
    }

    Ok(packets)
}

fn take_slot<'a>(
    slots: &'a [Value],
    pos: &mut usize,
    tag: u8,
) -> Result<&'a Value, ProtocolError> {
    let slot = slots.get(*pos).ok_or(ProtocolError::Truncated { tag })?;
    *pos += 1;
    Ok(slot)
}

fn decode_control(tag: u8, data: &Value) -> Result<Packet, ProtocolError> {
    let get_u64 = |key: &str| data.get(key).and_then(Value::as_int).map(|n| n as u64);
    let get_str =
        |key: &str| data.get(key).and_then(Value::as_str).map(str::to_string);

    Ok(match tag {
        1 => Packet::Open {
            ping_interval: get_u64("pi"),
            ping_timeout: get_u64("pt"),
        },
        2 => Packet::Retry {
            delay: get_u64("delay"),
        },
        3 => Packet::Reset {
            delay: get_u64("delay"),
        },
        4 => Packet::Redirect {
            delay: get_u64("delay"),
            target: get_str("target").unwrap_or_default(),
        },
        5 => Packet::Close {
            reason: get_str("reason"),
        },
        6 => Packet::Ping,
        7 => Packet::Pong,
        _ => unreachable!("decode_control called with non-control tag"),
    })
}

fn int_slot(slot: &Value, name: &'static str) -> Result<u32, ProtocolError> {
    slot.as_int()
        .and_then(|n| u32::try_from(n).ok())
        .ok_or(ProtocolError::InvalidField(name))
}

fn bytes_slot(
    slot: &Value,
    name: &'static str,
) -> Result<Vec<u8>, ProtocolError> {
    slot.as_bytes()
        .map(<[u8]>::to_vec)
        .ok_or(ProtocolError::InvalidField(name))
}

fn header_slot(slot: &Value) -> Result<Vec<(String, String)>, ProtocolError> {
    let entries = slot
        .as_map()
        .ok_or(ProtocolError::InvalidField("headers"))?;
    entries
        .iter()
        .map(|(k, v)| {
            v.as_str()
                .map(|s| (k.clone(), s.to_string()))
                .ok_or(ProtocolError::InvalidField("headers"))
        })
        .collect()
}
