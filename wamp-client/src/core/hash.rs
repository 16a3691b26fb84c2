/// Hash map keyed with [`ahash`], used across the library.
pub type HashMap<K, V> = std::collections::HashMap<K, V, ahash::RandomState>;

/// Hash set keyed with [`ahash`], used across the library.
pub type HashSet<V> = std::collections::HashSet<V, ahash::RandomState>;
