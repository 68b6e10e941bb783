use crate::value::Value;
use ahash::{AHashMap, RandomState};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Opaque group identity. Callers only compare it for equality; the hex form
/// is used to address a group from the outside (drill-down).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey(u64);

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{:016x}", self.0) }
}

impl FromStr for GroupKey {
    type Err = std::num::ParseIntError;
    fn from_str(s: &str) -> Result<Self, Self::Err> { u64::from_str_radix(s, 16).map(GroupKey) }
}

impl Serialize for GroupKey {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> { s.collect_str(self) }
}

/// The seed is fixed for the lifetime of a `Grouper`; the current and the
/// previous parse of one run must share the same instance so that equal
/// key tuples land on equal keys.
#[derive(Clone)]
pub struct Grouper {
    seed: u64,
    hasher: RandomState,
}

impl fmt::Debug for Grouper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.debug_struct("Grouper").field("seed", &self.seed).finish() }
}

impl Grouper {
    pub fn with_seed(seed: u64) -> Self {
        let hasher = RandomState::with_seeds(seed, seed.rotate_left(21) ^ 0x9e37_79b9_7f4a_7c15, seed.rotate_left(42) ^ 0xc2b2_ae3d_27d4_eb4f, !seed);
        Self { seed, hasher }
    }

    pub fn random() -> Self { Self::with_seed(RandomState::new().hash_one(0u8)) }

    pub fn seed(&self) -> u64 { self.seed }

    /// Hashes the rendered key values as a length-prefixed sequence, so
    /// `("ab", "c")` and `("a", "bc")` do not alias.
    pub fn key<'a, I>(&self, values: I) -> GroupKey
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let rendered: Vec<String> = values.into_iter().map(|v| v.to_string()).collect();
        GroupKey(self.hasher.hash_one(&rendered))
    }
}

pub type Row = Vec<Value>;

#[derive(Clone, Debug)]
pub struct Group {
    pub key: GroupKey,
    pub rows: Vec<Row>,
}

#[derive(Clone, Debug, Default)]
pub struct Groups {
    index: AHashMap<GroupKey, usize>,
    groups: Vec<Group>,
}

impl Groups {
    pub fn push(&mut self, key: GroupKey, row: Row) {
        match self.index.get(&key) {
            Some(&i) => self.groups[i].rows.push(row),
            None => {
                self.index.insert(key, self.groups.len());
                self.groups.push(Group { key, rows: vec![row] });
            }
        }
    }

    pub fn get(&self, key: &GroupKey) -> Option<&Group> { self.index.get(key).map(|&i| &self.groups[i]) }
    pub fn iter(&self) -> impl Iterator<Item = &Group> { self.groups.iter() }
    pub fn len(&self) -> usize { self.groups.len() }
    pub fn is_empty(&self) -> bool { self.groups.is_empty() }
}
