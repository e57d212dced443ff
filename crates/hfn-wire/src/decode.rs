//! Bytes → value.
//!
//! Decoding is tag-driven and fails fast on anything structurally wrong:
//! an unknown tag, the reserved 0xc1 byte, or a claimed length that runs
//! past the buffer end. The decoder additionally accepts a few encodings
//! our own encoder never produces (float32, uint64, int64) for tolerance
//! toward other implementations.

use crate::{Value, WireError};

/// Decodes a single value from the front of the buffer. Trailing bytes are
/// ignored.
pub fn decode(buf: &[u8]) -> Result<Value, WireError> {
    let mut reader = Reader { buf, pos: 0 };
    reader.read_value()
}

/// Decodes values until the buffer is exhausted (sequence mode).
///
/// An empty buffer yields an empty list.
pub fn decode_seq(buf: &[u8]) -> Result<Vec<Value>, WireError> {
    let mut reader = Reader { buf, pos: 0 };
    let mut values = Vec::new();
    while reader.pos < reader.buf.len() {
        values.push(reader.read_value()?);
    }
    Ok(values)
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn byte(&mut self) -> Result<u8, WireError> {
        let b = *self
            .buf
            .get(self.pos)
            .ok_or(WireError::UnexpectedEof(self.pos))?;
        self.pos += 1;
        Ok(b)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        let end = self
            .pos
            .checked_add(n)
            .ok_or(WireError::UnexpectedEof(self.pos))?;
        if end > self.buf.len() {
            return Err(WireError::UnexpectedEof(self.pos));
        }
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_uint(&mut self, size: usize) -> Result<u64, WireError> {
        let bytes = self.take(size)?;
        let mut value = 0u64;
        for b in bytes {
            value = (value << 8) | *b as u64;
        }
        Ok(value)
    }

    fn read_len(&mut self, size: usize) -> Result<usize, WireError> {
        Ok(self.read_uint(size)? as usize)
    }

    fn read_value(&mut self) -> Result<Value, WireError> {
        let offset = self.pos;
        let tag = self.byte()?;
        match tag {
            0x00..=0x7f => Ok(Value::Int(tag as i64)),
            0x80..=0x8f => self.read_map((tag - 0x80) as usize),
            0x90..=0x9f => self.read_list((tag - 0x90) as usize),
            0xa0..=0xbf => self.read_str((tag - 0xa0) as usize),
            0xc0 => Ok(Value::Nil),
            0xc1 => Err(WireError::Reserved(offset)),
            0xc2 => Ok(Value::Bool(false)),
            0xc3 => Ok(Value::Bool(true)),
            0xc4 => {
                let len = self.read_len(1)?;
                Ok(Value::Bytes(self.take(len)?.to_vec()))
            }
            0xc5 => {
                let len = self.read_len(2)?;
                Ok(Value::Bytes(self.take(len)?.to_vec()))
            }
            0xc6 => {
                let len = self.read_len(4)?;
                Ok(Value::Bytes(self.take(len)?.to_vec()))
            }
            0xca => {
                let bits = self.read_uint(4)? as u32;
                Ok(Value::Float(f32::from_bits(bits) as f64))
            }
            0xcb => {
                let bits = self.read_uint(8)?;
                Ok(Value::Float(f64::from_bits(bits)))
            }
            0xcc => Ok(Value::Int(self.read_uint(1)? as i64)),
            0xcd => Ok(Value::Int(self.read_uint(2)? as i64)),
            0xce => Ok(Value::Int(self.read_uint(4)? as i64)),
            0xcf => Ok(Value::Int(self.read_uint(8)? as i64)),
            0xd0 => Ok(Value::Int(self.read_uint(1)? as u8 as i8 as i64)),
            0xd1 => Ok(Value::Int(self.read_uint(2)? as u16 as i16 as i64)),
            0xd2 => Ok(Value::Int(self.read_uint(4)? as u32 as i32 as i64)),
            0xd3 => Ok(Value::Int(self.read_uint(8)? as i64)),
            0xd9 => {
                let len = self.read_len(1)?;
                self.read_str(len)
            }
            0xda => {
                let len = self.read_len(2)?;
                self.read_str(len)
            }
            0xdb => {
                let len = self.read_len(4)?;
                self.read_str(len)
            }
            0xdc => {
                let len = self.read_len(2)?;
                self.read_list(len)
            }
            0xdd => {
                let len = self.read_len(4)?;
                self.read_list(len)
            }
            0xde => {
                let len = self.read_len(2)?;
                self.read_map(len)
            }
            0xdf => {
                let len = self.read_len(4)?;
                self.read_map(len)
            }
            0xe0..=0xff => Ok(Value::Int(tag as i8 as i64)),
            _ => Err(WireError::UnknownTag { tag, offset }),
        }
    }

    fn read_str(&mut self, len: usize) -> Result<Value, WireError> {
        let offset = self.pos;
        let bytes = self.take(len)?;
        let s = std::str::from_utf8(bytes)
            .map_err(|_| WireError::InvalidUtf8(offset))?;
        Ok(Value::Str(s.to_string()))
    }

    fn read_list(&mut self, len: usize) -> Result<Value, WireError> {
        let mut items = Vec::with_capacity(len.min(64));
        for _ in 0..len {
            items.push(self.read_value()?);
        }
        Ok(Value::List(items))
    }

    fn read_map(&mut self, len: usize) -> Result<Value, WireError> {
        let mut entries = Vec::with_capacity(len.min(64));
        for _ in 0..len {
            let key_offset = self.pos;
            // Integer keys are tolerated and stringified; some servers
            // emit numeric map keys.
            let key = match self.read_value()? {
                Value::Str(s) => s,
                Value::Int(n) => n.to_string(),
                _ => return Err(WireError::InvalidKey(key_offset)),
            };
            let value = self.read_value()?;
            entries.push((key, value));
        }
        Ok(Value::Map(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{encode, encode_seq};

    fn round_trip(v: Value) {
        let buf = encode(&v);
        assert_eq!(decode(&buf).unwrap(), v, "round trip failed for {v:?}");
    }

    #[test]
    fn test_round_trip_scalars() {
        round_trip(Value::Nil);
        round_trip(Value::Bool(true));
        round_trip(Value::Bool(false));
        round_trip(Value::Float(3.25));
        round_trip(Value::Str("".into()));
        round_trip(Value::Str("héllo wörld".into()));
        round_trip(Value::Bytes(vec![]));
        round_trip(Value::Bytes(vec![0, 255, 128]));
    }

    #[test]
    fn test_round_trip_integer_boundaries() {
        for n in [
            0i64,
            1,
            0x7f,
            0x80,
            0xff,
            0x100,
            0xffff,
            0x10000,
            -1,
            -32,
            -33,
            -128,
            -129,
            -32768,
            -32769,
            -2_147_483_648,
            2_147_483_647,
        ] {
            round_trip(Value::Int(n));
        }
    }

    #[test]
    fn test_int_outside_i32_round_trips_as_float() {
        let buf = encode(&Value::Int(5_000_000_000));
        assert_eq!(decode(&buf).unwrap(), Value::Float(5e9));

        // Just past the signed 32-bit boundary.
        let buf = encode(&Value::Int(0x8000_0000));
        assert_eq!(decode(&buf).unwrap(), Value::Float(2_147_483_648.0));
    }

    #[test]
    fn test_round_trip_nested_collections() {
        round_trip(Value::List(vec![
            Value::Int(1),
            Value::Str("two".into()),
            Value::List(vec![Value::Bool(true), Value::Nil]),
            Value::Map(vec![(
                "inner".into(),
                Value::List(vec![Value::Bytes(vec![9])]),
            )]),
        ]));
    }

    #[test]
    fn test_round_trip_large_collections() {
        round_trip(Value::List(vec![Value::Int(7); 100]));
        let entries: Vec<(String, Value)> =
            (0..20).map(|i| (format!("k{i}"), Value::Int(i))).collect();
        round_trip(Value::Map(entries));
    }

    #[test]
    fn test_sequence_round_trip_heterogeneous() {
        let values = vec![
            Value::Int(8),
            Value::Str("rpc".into()),
            Value::Map(vec![("h".into(), Value::Str("v".into()))]),
            Value::Bytes(vec![1, 2]),
        ];
        let buf = encode_seq(&values);
        assert_eq!(decode_seq(&buf).unwrap(), values);
    }

    #[test]
    fn test_decode_seq_empty_buffer_yields_empty() {
        assert_eq!(decode_seq(&[]).unwrap(), Vec::<Value>::new());
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        let mut buf = encode(&Value::Int(1));
        buf.push(0xa1); // garbage tail
        assert_eq!(decode(&buf).unwrap(), Value::Int(1));
    }

    #[test]
    fn test_reserved_tag_fails_fast() {
        let result = decode(&[0xc1]);
        assert!(matches!(result, Err(WireError::Reserved(0))));
    }

    #[test]
    fn test_unknown_tag_is_rejected() {
        // 0xc7 (ext8) is outside the closed model.
        let result = decode(&[0xc7, 0x01]);
        assert!(matches!(
            result,
            Err(WireError::UnknownTag { tag: 0xc7, offset: 0 })
        ));
    }

    #[test]
    fn test_truncated_length_is_rejected() {
        // fixstr claiming 5 bytes with only 2 present.
        let result = decode(&[0xa5, b'h', b'i']);
        assert!(matches!(result, Err(WireError::UnexpectedEof(_))));

        // bin8 claiming 10 bytes with none present.
        let result = decode(&[0xc4, 10]);
        assert!(matches!(result, Err(WireError::UnexpectedEof(_))));
    }

    #[test]
    fn test_truncated_collection_is_rejected() {
        // fixarray of 3 with only one element present.
        let result = decode(&[0x93, 0x01]);
        assert!(matches!(result, Err(WireError::UnexpectedEof(_))));
    }

    #[test]
    fn test_decode_empty_buffer_is_eof() {
        assert!(matches!(decode(&[]), Err(WireError::UnexpectedEof(0))));
    }

    #[test]
    fn test_decode_accepts_float32() {
        let mut buf = vec![0xca];
        buf.extend_from_slice(&1.5f32.to_be_bytes());
        assert_eq!(decode(&buf).unwrap(), Value::Float(1.5));
    }

    #[test]
    fn test_decode_accepts_int64_and_uint64() {
        let mut buf = vec![0xd3];
        buf.extend_from_slice(&(-42i64).to_be_bytes());
        assert_eq!(decode(&buf).unwrap(), Value::Int(-42));

        let mut buf = vec![0xcf];
        buf.extend_from_slice(&42u64.to_be_bytes());
        assert_eq!(decode(&buf).unwrap(), Value::Int(42));
    }

    #[test]
    fn test_decode_map_with_integer_keys_stringifies() {
        // { 3: "x" } encoded with an int key.
        let buf = vec![0x81, 0x03, 0xa1, b'x'];
        assert_eq!(
            decode(&buf).unwrap(),
            Value::Map(vec![("3".into(), Value::Str("x".into()))])
        );
    }

    #[test]
    fn test_decode_map_with_list_key_is_invalid() {
        let buf = vec![0x81, 0x90, 0xa1, b'x'];
        assert!(matches!(decode(&buf), Err(WireError::InvalidKey(1))));
    }

    #[test]
    fn test_invalid_utf8_string_is_rejected() {
        let buf = vec![0xa2, 0xff, 0xfe];
        assert!(matches!(decode(&buf), Err(WireError::InvalidUtf8(1))));
    }
}
