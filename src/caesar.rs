//! Caesar-shift decoding of recovered text.

/// Number of distinct shifts over the Latin alphabet
pub const SHIFTS: u8 = 26;

/// One candidate plaintext and the shift that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedVariant {
    pub shift: u8,
    pub text: String,
}

/// Shift an ASCII letter by `offset` positions (mod 26), keeping its case.
/// Everything else passes through.
fn rotate(ch: char, offset: u8) -> char {
    let base = match ch {
        'a'..='z' => b'a',
        'A'..='Z' => b'A',
        _ => return ch,
    };
    let pos = ch as u8 - base;
    (base + (pos + offset % SHIFTS) % SHIFTS) as char
}

/// Undo a Caesar shift of `shift` positions
pub fn decode(text: &str, shift: u8) -> String {
    let back = (SHIFTS - shift % SHIFTS) % SHIFTS;
    text.chars().map(|ch| rotate(ch, back)).collect()
}

/// Apply a Caesar shift of `shift` positions
pub fn encode(text: &str, shift: u8) -> String {
    text.chars().map(|ch| rotate(ch, shift)).collect()
}

/// All 26 decodings of `text`, ordered by shift
pub fn decode_all(text: &str) -> Vec<DecodedVariant> {
    (0..SHIFTS)
        .map(|shift| DecodedVariant {
            shift,
            text: decode(text, shift),
        })
        .collect()
}
