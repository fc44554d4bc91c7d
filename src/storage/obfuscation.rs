//! Reversible passphrase obfuscation for values at rest.
//!
//! XOR with a fixed key, then lowercase hex so the result stays a printable
//! string.  This only keeps the passphrase out of casual flash dumps; it is
//! not encryption.

const KEY: &[u8] = b"GreenMesh/irrigation";

/// Obfuscate `plain` into a hex string (two characters per input byte).
pub fn obfuscate(plain: &str) -> heapless::String<128> {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = heapless::String::new();
    for (i, b) in plain.bytes().enumerate() {
        let x = b ^ KEY[i % KEY.len()];
        // Capacity is 2 × 64, the longest passphrase accepted upstream.
        if out.push(HEX[(x >> 4) as usize] as char).is_err()
            || out.push(HEX[(x & 0x0f) as usize] as char).is_err()
        {
            break;
        }
    }
    out
}

/// Undo [`obfuscate`].  Returns `None` for anything that is not a value this
/// module produced (odd length, non-hex digits, invalid UTF-8).
pub fn reveal(hidden: &str) -> Option<heapless::String<64>> {
    let bytes = hidden.as_bytes();
    if bytes.len() % 2 != 0 || bytes.len() / 2 > 64 {
        return None;
    }
    let mut raw: heapless::Vec<u8, 64> = heapless::Vec::new();
    for (i, pair) in bytes.chunks_exact(2).enumerate() {
        let hi = hex_value(pair[0])?;
        let lo = hex_value(pair[1])?;
        raw.push(((hi << 4) | lo) ^ KEY[i % KEY.len()]).ok()?;
    }
    let text = core::str::from_utf8(&raw).ok()?;
    let mut out = heapless::String::new();
    out.push_str(text).ok()?;
    Some(out)
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}
