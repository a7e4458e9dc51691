//! Hash collections keyed with the fast non-cryptographic `rustc-hash` hasher.

pub type HashMap<K, V> = rustc_hash::FxHashMap<K, V>;
pub type HashSet<T> = rustc_hash::FxHashSet<T>;
