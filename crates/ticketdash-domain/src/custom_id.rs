//! Opaque custom identifiers for forms and fields.

use std::sync::Arc;

use rand::RngCore;

use crate::error::{DomainError, DomainResult};

/// Length of generated custom ids.
pub const CUSTOM_ID_LENGTH: usize = 30;

const ALPHABET: &[u8; 26] = b"abcdefghijklmnopqrstuvwxyz";

/// Largest multiple of the alphabet size that fits in a byte; bytes at or
/// above it are discarded so every letter is equally likely.
const REJECTION_THRESHOLD: u8 = 234;

/// Source of fresh custom ids.
pub trait CustomIdGenerator: Send + Sync {
    fn generate(&self) -> DomainResult<String>;
}

impl<T: CustomIdGenerator + ?Sized> CustomIdGenerator for Arc<T> {
    fn generate(&self) -> DomainResult<String> {
        (**self).generate()
    }
}

/// Generates lowercase ASCII ids from the thread-local RNG, which is seeded
/// from the operating system.
#[derive(Debug, Clone, Copy)]
pub struct RandomCustomIds {
    length: usize,
}

impl RandomCustomIds {
    pub fn new() -> Self {
        Self::with_length(CUSTOM_ID_LENGTH)
    }

    pub fn with_length(length: usize) -> Self {
        Self { length }
    }
}

impl Default for RandomCustomIds {
    fn default() -> Self {
        Self::new()
    }
}

impl CustomIdGenerator for RandomCustomIds {
    fn generate(&self) -> DomainResult<String> {
        letters_from(&mut rand::thread_rng(), self.length)
    }
}

/// Draws `length` letters from `rng`, rejecting bytes that would bias the
/// distribution.
fn letters_from<R: RngCore + ?Sized>(rng: &mut R, length: usize) -> DomainResult<String> {
    let mut id = String::with_capacity(length);
    let mut buf = [0u8; 64];

    while id.len() < length {
        rng.try_fill_bytes(&mut buf)
            .map_err(|e| DomainError::IdGeneration {
                message: e.to_string(),
            })?;

        for &byte in buf.iter().filter(|&&b| b < REJECTION_THRESHOLD) {
            if id.len() == length {
                break;
            }
            id.push(char::from(ALPHABET[usize::from(byte % 26)]));
        }
    }

    Ok(id)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_ids_have_expected_shape() {
        let id = RandomCustomIds::new().generate().unwrap();
        assert_eq!(id.len(), CUSTOM_ID_LENGTH);
        assert!(id.bytes().all(|b| b.is_ascii_lowercase()));
    }

    #[test]
    fn test_ids_are_distinct() {
        let generator = RandomCustomIds::new();
        let ids: HashSet<String> = (0..100).map(|_| generator.generate().unwrap()).collect();
        assert_eq!(ids.len(), 100);
    }

    #[test]
    fn test_custom_length() {
        let id = RandomCustomIds::with_length(100).generate().unwrap();
        assert_eq!(id.len(), 100);
    }

    struct BrokenRng;

    impl RngCore for BrokenRng {
        fn next_u32(&mut self) -> u32 {
            0
        }

        fn next_u64(&mut self) -> u64 {
            0
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            dest.fill(0);
        }

        fn try_fill_bytes(&mut self, _dest: &mut [u8]) -> Result<(), rand::Error> {
            Err(rand::Error::new(std::io::Error::other("entropy source unavailable")))
        }
    }

    #[test]
    fn test_rng_failure_is_reported() {
        let err = letters_from(&mut BrokenRng, CUSTOM_ID_LENGTH).unwrap_err();
        assert!(matches!(err, DomainError::IdGeneration { .. }));
        assert!(err.to_string().contains("entropy source unavailable"));
    }

    #[test]
    fn test_seeded_rng_gives_repeatable_ids() {
        use rand::{rngs::StdRng, SeedableRng};

        let first = letters_from(&mut StdRng::seed_from_u64(7), CUSTOM_ID_LENGTH).unwrap();
        let second = letters_from(&mut StdRng::seed_from_u64(7), CUSTOM_ID_LENGTH).unwrap();
        assert_eq!(first, second);
        assert!(first.bytes().all(|b| b.is_ascii_lowercase()));
    }

    #[test]
    fn test_shared_generator() {
        let shared: Arc<dyn CustomIdGenerator> = Arc::new(RandomCustomIds::with_length(8));
        assert_eq!(shared.generate().unwrap().len(), 8);
    }
}
