//! Value → bytes.
//!
//! Encoding is infallible: every [`Value`] has a representation. Both peers
//! decode by tag, so an encoder that picks a wider size class than
//! necessary would still interoperate, but we keep the canonical "smallest
//! that fits" rule for byte-exact compatibility with the server.

use crate::Value;

/// Encodes a single value.
pub fn encode(value: &Value) -> Vec<u8> {
    let mut buf = Vec::with_capacity(128);
    write_value(&mut buf, value);
    buf
}

/// Encodes a slice of values in sequence mode: each element is serialized
/// as an independent top-level value, concatenated in order with no outer
/// length prefix.
pub fn encode_seq(values: &[Value]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(128);
    for value in values {
        write_value(&mut buf, value);
    }
    buf
}

fn write_value(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Nil => buf.push(0xc0),
        Value::Bool(false) => buf.push(0xc2),
        Value::Bool(true) => buf.push(0xc3),
        Value::Int(n) => write_int(buf, *n),
        Value::Float(f) => write_float(buf, *f),
        Value::Str(s) => write_str(buf, s),
        Value::Bytes(b) => write_bytes(buf, b),
        Value::List(items) => write_list(buf, items),
        Value::Map(entries) => write_map(buf, entries),
    }
}

/// Integers within the machine 32-bit signed range use the smallest
/// encoding that fits, tried in the reference order: positive fixint,
/// negative fixint, uint8, int8, uint16, int16, uint32, int32. Anything
/// outside that range degrades to a 64-bit float.
fn write_int(buf: &mut Vec<u8>, n: i64) {
    if !(-2_147_483_648..=2_147_483_647).contains(&n) {
        write_float(buf, n as f64);
        return;
    }

    if (0..=0x7f).contains(&n) {
        buf.push(n as u8);
    } else if (-0x20..0).contains(&n) {
        buf.push(n as i8 as u8);
    } else if n > 0 && n <= 0xff {
        buf.extend_from_slice(&[0xcc, n as u8]);
    } else if (-0x80..=0x7f).contains(&n) {
        buf.extend_from_slice(&[0xd0, n as i8 as u8]);
    } else if n > 0 && n <= 0xffff {
        buf.push(0xcd);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if (-0x8000..=0x7fff).contains(&n) {
        buf.push(0xd1);
        buf.extend_from_slice(&(n as i16).to_be_bytes());
    } else if n > 0 && n <= 0xffff_ffff {
        buf.push(0xce);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(0xd2);
        buf.extend_from_slice(&(n as i32).to_be_bytes());
    }
}

fn write_float(buf: &mut Vec<u8>, f: f64) {
    buf.push(0xcb);
    buf.extend_from_slice(&f.to_be_bytes());
}

fn write_str(buf: &mut Vec<u8>, s: &str) {
    let bytes = s.as_bytes();
    let len = bytes.len();
    if len <= 0x1f {
        buf.push(0xa0 + len as u8);
    } else if len <= 0xff {
        buf.extend_from_slice(&[0xd9, len as u8]);
    } else if len <= 0xffff {
        buf.push(0xda);
        buf.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        buf.push(0xdb);
        buf.extend_from_slice(&(len as u32).to_be_bytes());
    }
    buf.extend_from_slice(bytes);
}

fn write_bytes(buf: &mut Vec<u8>, b: &[u8]) {
    let len = b.len();
    if len < 0x100 {
        buf.extend_from_slice(&[0xc4, len as u8]);
    } else if len < 0x10000 {
        buf.push(0xc5);
        buf.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        buf.push(0xc6);
        buf.extend_from_slice(&(len as u32).to_be_bytes());
    }
    buf.extend_from_slice(b);
}

fn write_list(buf: &mut Vec<u8>, items: &[Value]) {
    let len = items.len();
    if len <= 0xf {
        buf.push(0x90 + len as u8);
    } else if len <= 0xffff {
        buf.push(0xdc);
        buf.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        buf.push(0xdd);
        buf.extend_from_slice(&(len as u32).to_be_bytes());
    }
    for item in items {
        write_value(buf, item);
    }
}

/// A map is serialized as alternating key/value writes in iteration order.
fn write_map(buf: &mut Vec<u8>, entries: &[(String, Value)]) {
    let len = entries.len();
    if len <= 0xf {
        buf.push(0x80 + len as u8);
    } else if len <= 0xffff {
        buf.push(0xde);
        buf.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        buf.push(0xdf);
        buf.extend_from_slice(&(len as u32).to_be_bytes());
    }
    for (key, value) in entries {
        write_str(buf, key);
        write_value(buf, value);
    }
}
