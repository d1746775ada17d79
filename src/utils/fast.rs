// src/utils/fast.rs

//! 快表工具：`hashbrown + AHash`。
//!
//! 只用于查找；任何会影响输出顺序的遍历都走 `Vec`，保证生成结果可复现。

pub use ahash::RandomState as AHashBuilder;
pub use smallvec::SmallVec;

/// hashbrown + AHash
pub type FastMap<K, V> = hashbrown::HashMap<K, V, AHashBuilder>;
/// hashbrown + AHash
pub type FastSet<K>    = hashbrown::HashSet<K, AHashBuilder>;

/// 新建空 `FastMap`
#[inline]
pub fn fast_map<K, V>() -> FastMap<K, V> {
    FastMap::with_hasher(AHashBuilder::default())
}

/// 新建空 `FastSet`
#[inline]
pub fn fast_set<K>() -> FastSet<K> {
    FastSet::with_hasher(AHashBuilder::default())
}

/// 一个符号的重载通常不超过 4 个
pub type SmallVec4<T> = SmallVec<[T; 4]>;
