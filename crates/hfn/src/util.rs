//! Small helpers: id generation and wall-clock timestamps.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;

// nanoid's URL-safe alphabet, biased toward common letters.
const URL_ALPHABET: &[u8] =
    b"useandom-26T198340PX75pxJACKVERYMINDBUSHWOLF_GQZbfghjklqvwyzrict";

const RANDOM_SUFFIX_LEN: usize = 13;

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Generates a unique, URL-safe id: the current timestamp in uppercase
/// base 36, followed by 13 random alphabet characters. Sortable by
/// creation time, unique enough for client and session ids.
pub fn unique_id() -> String {
    let mut id = to_base36_upper(now_ms());
    let mut rng = rand::rng();
    for _ in 0..RANDOM_SUFFIX_LEN {
        let i = rng.random_range(0..URL_ALPHABET.len());
        id.push(URL_ALPHABET[i] as char);
    }
    id
}

fn to_base36_upper(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    if n == 0 {
        return "0".into();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}
