use quire_core::{DocumentId, Fragment, OwnerId};

/// Generate deterministic base64-alphabet text using a seeded generator.
/// Same seed produces same output (reproducible tests).
pub fn seeded_text(seed: u64, len: usize) -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    let mut state = seed;
    (0..len)
        .map(|_| {
            // Simple LCG (Linear Congruential Generator)
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            ALPHABET[(state >> 58) as usize] as char
        })
        .collect()
}

pub fn test_owner() -> OwnerId {
    OwnerId::new("test-owner").unwrap()
}

/// A complete fragment set of `count` fragments of `size` bytes each.
pub fn fragment_set(document_id: DocumentId, count: u32, size: usize) -> Vec<Fragment> {
    (0..count)
        .map(|i| {
            Fragment::new(
                document_id,
                test_owner(),
                i,
                count,
                seeded_text(u64::from(i) + 1, size),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_text_is_deterministic() {
        assert_eq!(seeded_text(7, 64), seeded_text(7, 64));
        assert_ne!(seeded_text(7, 64), seeded_text(8, 64));
        assert_eq!(seeded_text(1, 100).len(), 100);
    }
}
