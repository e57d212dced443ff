//! The application-level message union carried inside MESSAGE packets.
//!
//! A MESSAGE packet's payload bytes are themselves a wire sequence whose
//! first element is a small integer tag. Unlike packet framing, a payload
//! holds exactly one message.

use hfn_wire::{decode_seq, encode_seq, Value};

use crate::ProtocolError;

/// The content of a MESSAGE packet payload.
///
/// `cookies` slots carry a wire-encoded list of `[name, value]` pairs, or
/// nothing; `payload` slots carry a model-encoded byte buffer, or nothing.
#[derive(Debug, Clone, PartialEq)]
pub enum MessagePayload {
    /// Tag 1, client → server. Fire-and-forget invocation of a remote
    /// function identified by module + function id.
    CallFunction {
        /// The module the function lives in.
        module_id: u32,
        /// The function id within the module.
        function_id: u32,
        /// Wire-encoded cookie pairs scoped to the target package.
        cookies: Option<Vec<u8>>,
        /// Model-encoded request payload.
        payload: Option<Vec<u8>>,
    },
    /// Tag 2, server → client. A pushed state update for a module.
    SetState {
        /// The owning package.
        package_id: u32,
        /// The module whose state changed.
        module_id: u32,
        /// Model-encoded state, decoded against the module's state schema.
        payload: Vec<u8>,
    },
    /// Tag 3, server → client. Store a cookie on the client.
    SetCookie {
        /// Cookie name.
        name: String,
        /// Cookie value.
        value: String,
        /// Lifetime in seconds; 0 or -1 means non-expiring.
        max_age: i64,
        /// Private cookies are scoped to the sending package; public ones
        /// are global.
        is_private: bool,
    },
    /// Tag 4, client → server. A request expecting a correlated response.
    RpcRequest {
        /// The RPC id within the target package.
        rpc_id: u32,
        /// Locally assigned acknowledgement id correlating the response.
        ack_id: u32,
        /// Wire-encoded cookie pairs scoped to the target package.
        cookies: Option<Vec<u8>>,
        /// Model-encoded request payload.
        payload: Option<Vec<u8>>,
    },
    /// Tag 5, server → client. The response to an [`MessagePayload::RpcRequest`],
    /// matched by `ack_id`.
    RpcResponse {
        /// Echoes the request's RPC id.
        rpc_id: u32,
        /// Echoes the request's acknowledgement id.
        ack_id: u32,
        /// Model-encoded response payload.
        payload: Option<Vec<u8>>,
    },
    /// Tag 6, client → server. Invocation of a remote function by full name
    /// instead of module + function id.
    CallFunctionByName {
        /// The function's dotted full name.
        name: String,
        /// Model-encoded request payload.
        payload: Option<Vec<u8>>,
    },
    /// Tag 7, server → client. A history/navigation instruction for the
    /// host application.
    Navigate {
        /// Navigation verb, e.g. `push`, `replace`, `go`.
        action: String,
        /// Relative offset for `go`-style actions.
        delta: i64,
        /// Target path for `push`/`replace`-style actions.
        path: String,
    },
}

impl MessagePayload {
    /// The payload's wire tag.
    pub fn tag(&self) -> u8 {
        match self {
            MessagePayload::CallFunction { .. } => 1,
            MessagePayload::SetState { .. } => 2,
            MessagePayload::SetCookie { .. } => 3,
            MessagePayload::RpcRequest { .. } => 4,
            MessagePayload::RpcResponse { .. } => 5,
            MessagePayload::CallFunctionByName { .. } => 6,
            MessagePayload::Navigate { .. } => 7,
        }
    }

    /// Encodes the payload as a flat wire sequence.
    pub fn encode(&self) -> Vec<u8> {
        let tag = Value::Int(self.tag() as i64);
        let slots: Vec<Value> = match self {
            MessagePayload::CallFunction {
                module_id,
                function_id,
                cookies,
                payload,
            } => vec![
                tag,
                (*module_id).into(),
                (*function_id).into(),
                opt_bytes(cookies),
                opt_bytes(payload),
            ],
            MessagePayload::SetState {
                package_id,
                module_id,
                payload,
            } => vec![
                tag,
                (*package_id).into(),
                (*module_id).into(),
                Value::Bytes(payload.clone()),
            ],
            MessagePayload::SetCookie {
                name,
                value,
                max_age,
                is_private,
            } => vec![
                tag,
                Value::Str(name.clone()),
                Value::Str(value.clone()),
                Value::Int(*max_age),
                Value::Bool(*is_private),
            ],
            MessagePayload::RpcRequest {
                rpc_id,
                ack_id,
                cookies,
                payload,
            } => vec![
                tag,
                (*rpc_id).into(),
                (*ack_id).into(),
                opt_bytes(cookies),
                opt_bytes(payload),
            ],
            MessagePayload::RpcResponse {
                rpc_id,
                ack_id,
                payload,
            } => vec![tag, (*rpc_id).into(), (*ack_id).into(), opt_bytes(payload)],
            MessagePayload::CallFunctionByName { name, payload } => {
                vec![tag, Value::Str(name.clone()), opt_bytes(payload)]
            }
            MessagePayload::Navigate {
                action,
                delta,
                path,
            } => vec![
                tag,
                Value::Str(action.clone()),
                Value::Int(*delta),
                Value::Str(path.clone()),
            ],
        };
        encode_seq(&slots)
    }

    /// Decodes one payload from a MESSAGE packet's payload bytes.
    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        let slots = decode_seq(buf)?;
        let tag = slots
            .first()
            .and_then(Value::as_int)
            .ok_or(ProtocolError::InvalidMessage("tag"))?;

        match tag {
            1 => Ok(MessagePayload::CallFunction {
                module_id: uint(&slots, 1, "module_id")?,
                function_id: uint(&slots, 2, "function_id")?,
                cookies: opt_bytes_slot(&slots, 3, "cookies")?,
                payload: opt_bytes_slot(&slots, 4, "payload")?,
            }),
            2 => Ok(MessagePayload::SetState {
                package_id: uint(&slots, 1, "package_id")?,
                module_id: uint(&slots, 2, "module_id")?,
                payload: opt_bytes_slot(&slots, 3, "payload")?
                    .ok_or(ProtocolError::InvalidMessage("payload"))?,
            }),
            3 => Ok(MessagePayload::SetCookie {
                name: string(&slots, 1, "name")?,
                value: string(&slots, 2, "value")?,
                max_age: slots
                    .get(3)
                    .and_then(Value::as_int)
                    .ok_or(ProtocolError::InvalidMessage("max_age"))?,
                is_private: matches!(slots.get(4), Some(Value::Bool(true))),
            }),
            4 => Ok(MessagePayload::RpcRequest {
                rpc_id: uint(&slots, 1, "rpc_id")?,
                ack_id: uint(&slots, 2, "ack_id")?,
                cookies: opt_bytes_slot(&slots, 3, "cookies")?,
                payload: opt_bytes_slot(&slots, 4, "payload")?,
            }),
            5 => Ok(MessagePayload::RpcResponse {
                rpc_id: uint(&slots, 1, "rpc_id")?,
                ack_id: uint(&slots, 2, "ack_id")?,
                payload: opt_bytes_slot(&slots, 3, "payload")?,
            }),
            6 => Ok(MessagePayload::CallFunctionByName {
                name: string(&slots, 1, "name")?,
                payload: opt_bytes_slot(&slots, 2, "payload")?,
            }),
            7 => Ok(MessagePayload::Navigate {
                action: string(&slots, 1, "action")?,
                delta: slots.get(2).and_then(Value::as_int).unwrap_or(0),
                path: string(&slots, 3, "path")?,
            }),
            other => Err(ProtocolError::UnknownMessageTag(other)),
        }
    }
}

fn opt_bytes(bytes: &Option<Vec<u8>>) -> Value {
    match bytes {
        Some(b) => Value::Bytes(b.clone()),
        None => Value::Nil,
    }
}

fn uint(
    slots: &[Value],
    index: usize,
    name: &'static str,
) -> Result<u32, ProtocolError> {
    slots
        .get(index)
        .and_then(Value::as_int)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or(ProtocolError::InvalidMessage(name))
}

fn string(
    slots: &[Value],
    index: usize,
    name: &'static str,
) -> Result<String, ProtocolError> {
    slots
        .get(index)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(ProtocolError::InvalidMessage(name))
}

fn opt_bytes_slot(
    slots: &[Value],
    index: usize,
    name: &'static str,
) -> Result<Option<Vec<u8>>, ProtocolError> {
    match slots.get(index) {
        None | Some(Value::Nil) => Ok(None),
        Some(Value::Bytes(b)) => Ok(Some(b.clone())),
        Some(_) => Err(ProtocolError::InvalidMessage(name)),
    }
}
