//! Test fixtures for the catalog crates.
//!
//! - `TestDatabase`: Postgres container with the catalog migrations applied (feature `postgres`)
//! - `TestDataBuilder`: names, slugs and SKUs derived from the test name, so parallel
//!   tests sharing one database never collide on unique columns
//! - `assertions`: helpers with readable failure messages

use uuid::Uuid;

#[cfg(feature = "postgres")]
mod postgres;

#[cfg(feature = "postgres")]
pub use postgres::TestDatabase;

/// Deterministic test data keyed by a seed
pub struct TestDataBuilder {
    seed: u64,
}

impl TestDataBuilder {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Seed from a hash of the test name
    pub fn from_test_name(name: &str) -> Self {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self::new(hasher.finish())
    }

    /// Identity to put in the `sub` claim of test tokens
    pub fn user_id(&self) -> Uuid {
        let bytes = self.seed.to_le_bytes();
        let mut uuid_bytes = [0u8; 16];
        uuid_bytes[..8].copy_from_slice(&bytes);
        uuid_bytes[8..16].copy_from_slice(&bytes);
        Uuid::from_bytes(uuid_bytes)
    }

    /// `test-<prefix>-<seed>-<suffix>`
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// assert_eq!(TestDataBuilder::new(7).name("category", "main"), "test-category-7-main");
    /// ```
    pub fn name(&self, prefix: &str, suffix: &str) -> String {
        format!("test-{}-{}-{}", prefix, self.seed, suffix)
    }

    /// Generate a URL slug (`[a-z0-9-]+`) unique to this test
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let slug = TestDataBuilder::new(7).slug("Running Shoes", "a");
    /// assert_eq!(slug, "test-running-shoes-7-a");
    /// ```
    pub fn slug(&self, prefix: &str, suffix: &str) -> String {
        self.name(prefix, suffix)
            .to_lowercase()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect()
    }

    /// Generate a stock keeping unit unique to this test (at most 100 chars)
    pub fn sku(&self, suffix: &str) -> String {
        format!("SKU-{:X}-{}", self.seed, suffix.to_uppercase())
    }
}

/// Test assertion helpers
pub mod assertions {
    use uuid::Uuid;

    pub fn assert_uuid_eq(actual: Uuid, expected: Uuid, context: &str) {
        assert_eq!(
            actual, expected,
            "{}: expected UUID {}, got {}",
            context, expected, actual
        );
    }

    pub fn assert_some<T>(value: Option<T>, context: &str) -> T {
        value.unwrap_or_else(|| panic!("{}: expected Some, got None", context))
    }

    /// Assert that exactly one image flag is set and return its index
    pub fn assert_single_primary(flags: &[bool], context: &str) -> usize {
        let primaries: Vec<usize> = flags
            .iter()
            .enumerate()
            .filter_map(|(i, primary)| primary.then_some(i))
            .collect();
        assert_eq!(
            primaries.len(),
            1,
            "{}: expected exactly one primary image, got {:?}",
            context,
            primaries
        );
        primaries[0]
    }
}
