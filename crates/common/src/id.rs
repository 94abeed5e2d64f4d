//! ID generation utilities.

use rand::Rng;

const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Length of generated IDs.
pub const ID_LENGTH: usize = 7;

/// ID generator for stored records.
///
/// IDs are short random base-36 strings. They are not globally unique on
/// their own; callers that own a collection use [`IdGenerator::generate_unique`]
/// to rule out collisions with existing records.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    _private: (),
}

impl IdGenerator {
    /// Create a new ID generator.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }

    /// Generate a random base-36 ID.
    #[must_use]
    pub fn generate(&self) -> String {
        let mut rng = rand::thread_rng();
        (0..ID_LENGTH)
            .map(|_| char::from(ALPHABET[rng.gen_range(0..ALPHABET.len())]))
            .collect()
    }

    /// Generate an ID for which `is_taken` returns false.
    #[must_use]
    pub fn generate_unique<F>(&self, is_taken: F) -> String
    where
        F: Fn(&str) -> bool,
    {
        loop {
            let id = self.generate();
            if !is_taken(&id) {
                return id;
            }
            tracing::debug!(id = %id, "Generated ID collided, retrying");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_generate_base36() {
        let id_gen = IdGenerator::new();
        let id = id_gen.generate();

        assert_eq!(id.len(), ID_LENGTH);
        assert!(id.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn test_generate_unique_retries_on_collision() {
        let id_gen = IdGenerator::new();
        let attempts = Cell::new(0);

        let id = id_gen.generate_unique(|_| {
            attempts.set(attempts.get() + 1);
            attempts.get() < 3
        });

        assert_eq!(attempts.get(), 3);
        assert_eq!(id.len(), ID_LENGTH);
    }
}
