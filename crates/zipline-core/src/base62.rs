//! Reversible Base62 encoding of record IDs.
//!
//! The alphabet is deliberately shuffled so that sequential IDs do not
//! produce visibly sequential short keys. It must never change once keys
//! have been handed out: every stored `short_key` is `encode(id)` under
//! this exact symbol order.

/// The 62-symbol alphabet. Position is the digit value.
const ALPHABET: &[u8; 62] = b"cLM01lmno26789abNOPQRSdefghij45stuUVWXvwxyzABCDEFGHIJKTYZkpqr3";

/// Encodes a non-negative ID as a Base62 string.
///
/// `encode(0)` yields the empty string. The store never issues ID 0, so the
/// empty string acts as a sentinel that cannot collide with a real key.
pub fn encode(mut num: i64) -> String {
    let mut buf = Vec::new();
    while num > 0 {
        buf.push(ALPHABET[(num % 62) as usize]);
        num /= 62;
    }
    buf.reverse();
    // ALPHABET is ASCII, so the bytes are valid UTF-8.
    String::from_utf8(buf).unwrap_or_default()
}

/// Decodes a Base62 string back to an ID.
///
/// Decoding is total: the first off-alphabet symbol stops the scan and the
/// accumulator so far is returned, as does input long enough to overflow an
/// `i64`. Callers that need strict validation must check
/// `encode(decode(s)) == s`.
pub fn decode(s: &str) -> i64 {
    let mut rs: i64 = 0;
    for b in s.bytes() {
        let Some(index) = ALPHABET.iter().position(|&c| c == b) else {
            return rs;
        };
        match rs.checked_mul(62).and_then(|v| v.checked_add(index as i64)) {
            Some(next) => rs = next,
            None => return rs,
        }
    }
    rs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_zero_is_empty() {
        assert_eq!(encode(0), "");
    }

    #[test]
    fn encode_single_digit() {
        assert_eq!(encode(1), "L");
        assert_eq!(encode(61), "3");
    }

    #[test]
    fn encode_carries_into_second_digit() {
        // 62 = 1 * 62 + 0
        assert_eq!(encode(62), "Lc");
    }

    #[test]
    fn roundtrip_positive_ids() {
        for id in [1, 7, 61, 62, 63, 3843, 3844, 123_456_789, i64::MAX] {
            assert_eq!(decode(&encode(id)), id, "roundtrip failed for {id}");
        }
    }

    #[test]
    fn decode_stops_at_off_alphabet_symbol() {
        let key = encode(1024);
        let poisoned = format!("{key}!{}", encode(7));
        assert_eq!(decode(&poisoned), 1024);
    }

    #[test]
    fn decode_empty_is_zero() {
        assert_eq!(decode(""), 0);
    }

    #[test]
    fn strict_validation_rejects_non_canonical_input() {
        // Leading "zero digit" decodes to the same ID but is not canonical.
        let id = 42;
        let canonical = encode(id);
        let padded = format!("c{canonical}");
        assert_eq!(decode(&padded), id);
        assert_ne!(encode(decode(&padded)), padded);
    }

    #[test]
    fn decode_stops_before_overflow() {
        let long = encode(i64::MAX).repeat(4);
        let id = decode(&long);
        assert!(id >= 0);
        assert_eq!(decode(&long), id);
    }

    #[test]
    fn alphabet_symbols_are_distinct() {
        let mut seen = [false; 256];
        for &b in ALPHABET.iter() {
            assert!(!seen[b as usize], "duplicate symbol {}", b as char);
            seen[b as usize] = true;
        }
    }
}
