use rand::RngExt;

/// Characters used for room codes; skips the easily confused 0, O, I and 1.
const CLEAN_CHARS: &[u8] = b"23456789ABCDEFGHJKLMNPQRSTUVWXYZ";

/// Shortest code length accepted by configuration (30 bits).
pub const MIN_ROOM_CODE_LENGTH: usize = 6;

/// Generate a clean room code of the requested length.
///
/// Each character carries 5 bits of entropy, so the default 12-character code
/// gives 60 bits.
pub fn generate_room_code(length: usize) -> String {
    if length == 0 {
        return String::new();
    }
    let mut rng = rand::rng();
    (0..length)
        .map(|_| {
            let idx = rng.random_range(0..CLEAN_CHARS.len());
            // SAFETY: `idx` is produced by `random_range(0..len)`, so it is
            // always within [0, len).
            #[allow(clippy::indexing_slicing)]
            let ch = CLEAN_CHARS[idx] as char;
            ch
        })
        .collect()
}

/// Whether `code` could have been produced by [`generate_room_code`].
pub fn is_valid_room_code(code: &str) -> bool {
    !code.is_empty() && code.bytes().all(|b| CLEAN_CHARS.contains(&b))
}
