use rand::{thread_rng, Rng};

pub const PRICE_ID_ALPHABET: &[u8; 62] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
pub const PRICE_ID_LEN: usize = 12;

/// Random identifier for a price observation row: 12 characters from
/// `[0-9A-Za-z]`.
pub fn new_price_id() -> String {
    let mut rng = thread_rng();
    (0..PRICE_ID_LEN)
        .map(|_| PRICE_ID_ALPHABET[rng.gen_range(0..PRICE_ID_ALPHABET.len())] as char)
        .collect()
}
