/// Short correlation digest of a request body: 32-bit signed rolling
/// accumulator (`h = h*31 + unit` over UTF-16 code units), absolute value
/// in base-36. Not cryptographic; log correlation only.
pub fn payload_hash(payload: &str) -> String {
    let mut hash: i32 = 0;
    for unit in payload.encode_utf16() {
        hash = hash.wrapping_mul(31).wrapping_add(unit as i32);
    }
    to_base36(hash.unsigned_abs())
}

pub(crate) fn to_base36(mut n: u32) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}
