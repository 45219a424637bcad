//! Open-addressing hash table keyed by string literals.
//!
//! Linear probing with tombstones. A vacant slot is `(Nil, Nil)`, a deleted
//! one is `(Nil, true)`; lookups stop at the former and skip the latter.

use serde::{Deserialize, Serialize};

use super::bytecode::Literal;
use super::error::{InternalError, InternalResult};
use super::utils::type_name;

pub const MAX_LOAD: f64 = 0.75;
const MIN_CAPACITY: usize = 8;

/// Running hash over the key's bytes.
///
/// Note the order: the byte is multiplied in, not xored. Bucket placement
/// depends on it, so it is kept as is.
pub fn hash_string(s: &str) -> u32 {
    let mut hash: u32 = 2166136261;
    for byte in s.bytes() {
        hash = hash.wrapping_mul(byte as u32);
        hash = hash.wrapping_mul(16777619);
    }
    hash
}

fn grow_capacity(capacity: usize) -> usize {
    if capacity < MIN_CAPACITY {
        MIN_CAPACITY
    } else {
        capacity * 2
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Entry {
    pub key: Literal,
    pub value: Literal,
}

impl Entry {
    fn tombstone() -> Self {
        Self {
            key: Literal::Nil,
            value: Literal::Bool(true),
        }
    }

    pub fn is_vacant(&self) -> bool {
        self.key.is_nil() && self.value.is_nil()
    }

    pub fn is_tombstone(&self) -> bool {
        self.key.is_nil() && matches!(self.value, Literal::Bool(true))
    }

    pub fn is_live(&self) -> bool {
        !self.key.is_nil()
    }
}

enum Probe {
    Found(usize),
    Vacant(usize),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dictionary {
    /// Live keys plus tombstones; this is what the load factor is checked against.
    count: usize,
    live: usize,
    entries: Vec<Entry>,
}

impl Default for Dictionary {
    fn default() -> Self {
        Self::new()
    }
}

impl Dictionary {
    pub fn new() -> Self {
        Self {
            count: 0,
            live: 0,
            entries: vec![Entry::default(); MIN_CAPACITY],
        }
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Occupied slots, tombstones included.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Live keys.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn get(&self, key: &Literal) -> InternalResult<Option<&Literal>> {
        let name = key_str(key)?;
        Ok(match probe(&self.entries, name) {
            Probe::Found(index) => Some(&self.entries[index].value),
            Probe::Vacant(_) => None,
        })
    }

    /// Inserts or overwrites. Returns `true` when the key was not present.
    pub fn set(&mut self, key: Literal, value: Literal) -> InternalResult<bool> {
        key_str(&key)?;
        if (self.count + 1) as f64 > self.capacity() as f64 * MAX_LOAD {
            self.resize(grow_capacity(self.capacity()));
        }

        let name = key_str(&key)?;
        match probe(&self.entries, name) {
            Probe::Found(index) => {
                self.entries[index].value = value;
                Ok(false)
            }
            Probe::Vacant(index) => {
                if !self.entries[index].is_tombstone() {
                    self.count += 1;
                }
                self.live += 1;
                self.entries[index] = Entry { key, value };
                Ok(true)
            }
        }
    }

    /// Removes `key`, leaving a tombstone. Returns `true` when it was present.
    pub fn delete(&mut self, key: &Literal) -> InternalResult<bool> {
        let name = key_str(key)?;
        match probe(&self.entries, name) {
            Probe::Found(index) => {
                self.entries[index] = Entry::tombstone();
                self.live -= 1;
                Ok(true)
            }
            Probe::Vacant(_) => Ok(false),
        }
    }

    pub fn declared(&self, key: &Literal) -> InternalResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Inserts every live entry of `self` into `target`.
    pub fn copy_into(&self, target: &mut Dictionary) -> InternalResult<()> {
        for (key, value) in self.iter() {
            target.set(key.clone(), value.clone())?;
        }
        Ok(())
    }

    /// Live entries in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (&Literal, &Literal)> {
        self.entries
            .iter()
            .filter(|e| e.is_live())
            .map(|e| (&e.key, &e.value))
    }

    /// Consumes the table, yielding its live entries.
    pub fn into_entries(self) -> impl Iterator<Item = (Literal, Literal)> {
        self.entries
            .into_iter()
            .filter(Entry::is_live)
            .map(|e| (e.key, e.value))
    }

    fn resize(&mut self, capacity: usize) {
        let old = std::mem::replace(&mut self.entries, vec![Entry::default(); capacity]);
        self.count = 0;
        for entry in old.into_iter().filter(Entry::is_live) {
            // keys were validated on the way in
            if let Some(name) = entry.key.as_str() {
                if let Probe::Vacant(index) = probe(&self.entries, name) {
                    self.entries[index] = entry;
                    self.count += 1;
                }
            }
        }
        self.live = self.count;
    }
}

fn key_str(key: &Literal) -> InternalResult<&str> {
    key.as_str().ok_or(InternalError::UnsupportedKey {
        found: type_name(key),
    })
}

/// Shared by lookup and insertion: the slot holding `key`, or the slot an
/// insert should use (the first tombstone passed, else the vacant slot).
fn probe(entries: &[Entry], key: &str) -> Probe {
    let capacity = entries.len();
    let mut index = hash_string(key) as usize % capacity;
    let mut tombstone = None;
    loop {
        let entry = &entries[index];
        match &entry.key {
            Literal::String(k) if k == key => return Probe::Found(index),
            Literal::Nil if entry.is_tombstone() => {
                tombstone.get_or_insert(index);
            }
            Literal::Nil => return Probe::Vacant(tombstone.unwrap_or(index)),
            _ => {}
        }
        index = (index + 1) % capacity;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> Literal {
        Literal::from(s)
    }

    #[test]
    fn set_and_get() {
        let mut dict = Dictionary::new();
        assert_eq!(dict.set(key("foo"), Literal::Number(42.0)), Ok(true));
        assert_eq!(dict.get(&key("foo")), Ok(Some(&Literal::Number(42.0))));
        assert_eq!(dict.set(key("foo"), Literal::from("bar")), Ok(false));
        assert_eq!(dict.get(&key("foo")), Ok(Some(&Literal::from("bar"))));
        assert_eq!(dict.get(&key("missing")), Ok(None));
        assert_eq!(dict.len(), 1);
    }

    #[test]
    fn five_hundred_keys() {
        let mut dict = Dictionary::new();
        for i in 0..500 {
            dict.set(key(&i.to_string()), Literal::Number(i as f64))
                .unwrap();
            assert!(dict.count() as f64 <= dict.capacity() as f64 * MAX_LOAD);
        }
        assert_eq!(dict.capacity(), 1024);
        assert_eq!(dict.count(), 500);
        for i in 0..500 {
            assert_eq!(
                dict.get(&key(&i.to_string())),
                Ok(Some(&Literal::Number(i as f64)))
            );
        }

        let mut copy = Dictionary::new();
        dict.copy_into(&mut copy).unwrap();
        assert_eq!(copy.capacity(), 1024);
        assert_eq!(copy.count(), 500);
        for i in 0..500 {
            let name = key(&i.to_string());
            assert_eq!(copy.get(&name), dict.get(&name));
            assert_eq!(copy.get(&name), Ok(Some(&Literal::Number(i as f64))));
        }
    }

    #[test]
    fn delete_leaves_tombstone() {
        let mut dict = Dictionary::new();
        for (i, name) in ["alpha", "beta", "gamma", "delta", "epsilon"]
            .iter()
            .enumerate()
        {
            dict.set(key(name), Literal::Number(i as f64 + 1.0)).unwrap();
        }
        assert_eq!(dict.delete(&key("gamma")), Ok(true));
        assert_eq!(dict.delete(&key("gamma")), Ok(false));
        for name in ["foo", "bar", "baz", "fiz"] {
            dict.set(key(name), Literal::Bool(true)).unwrap();
        }

        assert_eq!(dict.get(&key("alpha")), Ok(Some(&Literal::Number(1.0))));
        assert_eq!(dict.get(&key("gamma")), Ok(None));
        assert_eq!(dict.get(&key("delta")), Ok(Some(&Literal::Number(4.0))));
        assert_eq!(dict.declared(&key("gamma")), Ok(false));
        assert_eq!(dict.declared(&key("omega")), Ok(false));
        assert_eq!(dict.len(), 8);
    }

    #[test]
    fn tombstone_is_reused() {
        let mut dict = Dictionary::new();
        dict.set(key("a"), Literal::Number(1.0)).unwrap();
        dict.set(key("b"), Literal::Number(2.0)).unwrap();
        dict.delete(&key("a")).unwrap();
        let before = dict.count();

        assert_eq!(dict.set(key("a"), Literal::Number(3.0)), Ok(true));
        assert_eq!(dict.count(), before);
        assert_eq!(dict.get(&key("a")), Ok(Some(&Literal::Number(3.0))));
        assert_eq!(dict.get(&key("b")), Ok(Some(&Literal::Number(2.0))));
    }

    #[test]
    fn resize_drops_tombstones() {
        let mut dict = Dictionary::new();
        for i in 0..6 {
            dict.set(key(&format!("k{i}")), Literal::Nil).unwrap();
        }
        for i in 0..3 {
            dict.delete(&key(&format!("k{i}"))).unwrap();
        }
        assert_eq!(dict.count(), 6);
        dict.set(key("fresh"), Literal::Nil).unwrap();
        assert_eq!(dict.capacity(), 16);
        assert_eq!(dict.count(), 4);
        assert_eq!(dict.len(), 4);
    }

    #[test]
    fn unsupported_key_is_internal_error() {
        let mut dict = Dictionary::new();
        assert_eq!(
            dict.set(Literal::Number(1.0), Literal::Nil),
            Err(InternalError::UnsupportedKey { found: "number" })
        );
        assert_eq!(
            dict.get(&Literal::Nil),
            Err(InternalError::UnsupportedKey { found: "null" })
        );
    }

    #[test]
    fn hash_multiplies_bytes() {
        assert_eq!(hash_string(""), 2166136261);
        let expected = 2166136261u32.wrapping_mul(b'a' as u32).wrapping_mul(16777619);
        assert_eq!(hash_string("a"), expected);
    }
}
