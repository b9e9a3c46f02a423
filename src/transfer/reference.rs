//! Transaction Reference Generator
//!
//! One generator per process, created at startup and injected into the
//! executor. References are `TXN` + a monotonic ULID:
//! - 48-bit millisecond timestamp + 80 bits from the thread CSPRNG
//! - within one millisecond the random part is incremented, so two calls in
//!   the same clock tick never return the same value

use std::sync::Mutex;

use tracing::warn;
use ulid::{Generator, Ulid};

use super::types::TransactionReference;

pub const REFERENCE_PREFIX: &str = "TXN";

pub trait ReferenceGenerator: Send + Sync {
    fn next_reference(&self) -> TransactionReference;
}

/// Monotonic ULID generator shared by every executor task
pub struct UlidReferenceGenerator {
    inner: Mutex<Generator>,
}

impl UlidReferenceGenerator {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Generator::new()),
        }
    }
}

impl Default for UlidReferenceGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceGenerator for UlidReferenceGenerator {
    fn next_reference(&self) -> TransactionReference {
        let ulid = {
            let mut generator = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            match generator.generate() {
                Ok(ulid) => ulid,
                Err(e) => {
                    // 2^80 references in one millisecond; take a fresh random value
                    warn!(error = %e, "ULID monotonic overflow, falling back to fresh ULID");
                    Ulid::new()
                }
            }
        };
        TransactionReference::new(format!("{}{}", REFERENCE_PREFIX, ulid))
    }
}

/// Scripted generator for tests
#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::VecDeque;

    /// Hands out the scripted references first, then falls back to ULIDs.
    pub struct ScriptedReferenceGenerator {
        scripted: Mutex<VecDeque<String>>,
        fallback: UlidReferenceGenerator,
    }

    impl ScriptedReferenceGenerator {
        pub fn new<I, S>(refs: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            Self {
                scripted: Mutex::new(refs.into_iter().map(Into::into).collect()),
                fallback: UlidReferenceGenerator::new(),
            }
        }

        /// Always returns the same reference
        pub fn constant(reference: &str, times: usize) -> Self {
            Self::new(std::iter::repeat_n(reference.to_string(), times))
        }
    }

    impl ReferenceGenerator for ScriptedReferenceGenerator {
        fn next_reference(&self) -> TransactionReference {
            match self.scripted.lock().unwrap().pop_front() {
                Some(r) => TransactionReference::new(r),
                None => self.fallback.next_reference(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_reference_format() {
        let r = UlidReferenceGenerator::new().next_reference();
        assert!(r.as_str().starts_with(REFERENCE_PREFIX));
        assert_eq!(r.as_str().len(), REFERENCE_PREFIX.len() + 26);
    }

    #[test]
    fn test_references_are_strictly_increasing() {
        let generator = UlidReferenceGenerator::new();
        let mut last = generator.next_reference();
        for _ in 0..10_000 {
            let next = generator.next_reference();
            assert!(next.as_str() > last.as_str());
            last = next;
        }
    }

    #[test]
    fn test_concurrent_references_unique() {
        let generator = Arc::new(UlidReferenceGenerator::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let g = generator.clone();
                std::thread::spawn(move || {
                    (0..2_000).map(|_| g.next_reference()).collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for h in handles {
            for r in h.join().unwrap() {
                assert!(seen.insert(r), "duplicate reference");
            }
        }
        assert_eq!(seen.len(), 16_000);
    }

    #[test]
    fn test_scripted_generator() {
        let g = mock::ScriptedReferenceGenerator::constant("TXNDUP", 2);
        assert_eq!(g.next_reference().as_str(), "TXNDUP");
        assert_eq!(g.next_reference().as_str(), "TXNDUP");
        assert_ne!(g.next_reference().as_str(), "TXNDUP");
    }
}
