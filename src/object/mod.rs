use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::code::Instructions;

pub mod builtins;
pub use builtins::{BUILTINS, Builtin};

/// Tag of each object variant, used for hash keys and error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectKind {
    Null,
    Error,
    Integer,
    Boolean,
    String,
    Array,
    Hash,
    CompiledFunction,
    Closure,
    Builtin,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ObjectKind::Null => "NULL",
            ObjectKind::Error => "ERROR",
            ObjectKind::Integer => "INTEGER",
            ObjectKind::Boolean => "BOOLEAN",
            ObjectKind::String => "STRING",
            ObjectKind::Array => "ARRAY",
            ObjectKind::Hash => "HASH",
            ObjectKind::CompiledFunction => "COMPILED_FUNCTION",
            ObjectKind::Closure => "CLOSURE",
            ObjectKind::Builtin => "BUILTIN",
        };
        f.write_str(s)
    }
}

/// A runtime value. Aggregates share their contents through `Rc`, so
/// cloning an object never deep-copies.
#[derive(Debug, Clone)]
pub enum Object {
    Null,
    Error(Rc<str>),
    Integer(i64),
    Boolean(bool),
    Str(Rc<str>),
    Array(Rc<Vec<Object>>),
    Hash(Rc<HashObject>),
    CompiledFunction(Rc<CompiledFunction>),
    Closure(Rc<Closure>),
    Builtin(&'static Builtin),
}

impl Object {
    pub fn string(s: impl Into<Rc<str>>) -> Self {
        Object::Str(s.into())
    }

    pub fn error(message: impl Into<Rc<str>>) -> Self {
        Object::Error(message.into())
    }

    pub fn array(elements: Vec<Object>) -> Self {
        Object::Array(Rc::new(elements))
    }

    pub fn kind(&self) -> ObjectKind {
        match self {
            Object::Null => ObjectKind::Null,
            Object::Error(_) => ObjectKind::Error,
            Object::Integer(_) => ObjectKind::Integer,
            Object::Boolean(_) => ObjectKind::Boolean,
            Object::Str(_) => ObjectKind::String,
            Object::Array(_) => ObjectKind::Array,
            Object::Hash(_) => ObjectKind::Hash,
            Object::CompiledFunction(_) => ObjectKind::CompiledFunction,
            Object::Closure(_) => ObjectKind::Closure,
            Object::Builtin(_) => ObjectKind::Builtin,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }

    /// `false` and `null` are falsy; everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Object::Null | Object::Boolean(false))
    }

    /// Only integers, booleans and strings can key a hash.
    pub fn hash_key(&self) -> Option<HashKey> {
        match self {
            Object::Integer(n) => Some(HashKey { kind: ObjectKind::Integer, value: *n as u64 }),
            Object::Boolean(b) => Some(HashKey { kind: ObjectKind::Boolean, value: u64::from(*b) }),
            Object::Str(s) => Some(HashKey { kind: ObjectKind::String, value: u64::from(fnv1a(s)) }),
            Object::Null
            | Object::Error(_)
            | Object::Array(_)
            | Object::Hash(_)
            | Object::CompiledFunction(_)
            | Object::Closure(_)
            | Object::Builtin(_) => None,
        }
    }

    /// Language-level `==`. Scalars and strings compare by value, aggregates
    /// and functions by identity, builtins by registry entry.
    pub fn same_as(&self, other: &Object) -> bool {
        match (self, other) {
            (Object::Null, Object::Null) => true,
            (Object::Integer(a), Object::Integer(b)) => a == b,
            (Object::Boolean(a), Object::Boolean(b)) => a == b,
            (Object::Str(a), Object::Str(b)) => a == b,
            (Object::Error(a), Object::Error(b)) => a == b,
            (Object::Array(a), Object::Array(b)) => Rc::ptr_eq(a, b),
            (Object::Hash(a), Object::Hash(b)) => Rc::ptr_eq(a, b),
            (Object::CompiledFunction(a), Object::CompiledFunction(b)) => Rc::ptr_eq(a, b),
            (Object::Closure(a), Object::Closure(b)) => Rc::ptr_eq(a, b),
            (Object::Builtin(a), Object::Builtin(b)) => a.name == b.name,
            _ => false,
        }
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::Null => write!(f, "null"),
            Object::Error(message) => write!(f, "ERROR: {message}"),
            Object::Integer(n) => write!(f, "{n}"),
            Object::Boolean(b) => write!(f, "{b}"),
            Object::Str(s) => write!(f, "{s}"),
            Object::Array(elements) => {
                write!(f, "[")?;
                for (i, e) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{e}")?;
                }
                write!(f, "]")
            }
            Object::Hash(hash) => {
                write!(f, "{{")?;
                for (i, pair) in hash.pairs().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", pair.key, pair.value)?;
                }
                write!(f, "}}")
            }
            Object::CompiledFunction(func) => write!(f, "CompiledFunction[{:p}]", Rc::as_ptr(func)),
            Object::Closure(closure) => write!(f, "Closure[{:p}]", Rc::as_ptr(closure)),
            Object::Builtin(_) => write!(f, "builtin function"),
        }
    }
}

// ── Hashing ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HashKey {
    pub kind: ObjectKind,
    pub value: u64,
}

/// 32-bit FNV-1a over the UTF-8 bytes.
pub fn fnv1a(s: &str) -> u32 {
    let mut hash: u32 = 2_166_136_261;
    for b in s.bytes() {
        hash ^= u32::from(b);
        hash = hash.wrapping_mul(16_777_619);
    }
    hash
}

#[derive(Debug, Clone)]
pub struct HashPair {
    pub key: Object,
    pub value: Object,
}

/// Hash contents. Pairs keep insertion order so display is stable.
#[derive(Debug, Clone, Default)]
pub struct HashObject {
    pairs: Vec<HashPair>,
    index: HashMap<HashKey, usize>,
}

impl HashObject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite. A repeated key keeps its original position.
    pub fn insert(&mut self, key: HashKey, pair: HashPair) {
        match self.index.get(&key) {
            Some(&i) => self.pairs[i] = pair,
            None => {
                self.index.insert(key, self.pairs.len());
                self.pairs.push(pair);
            }
        }
    }

    pub fn get(&self, key: &HashKey) -> Option<&HashPair> {
        self.index.get(key).and_then(|&i| self.pairs.get(i))
    }

    pub fn pairs(&self) -> impl Iterator<Item = &HashPair> {
        self.pairs.iter()
    }
}

// ── Functions ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct CompiledFunction {
    pub instructions: Instructions,
    pub num_locals: usize,
    pub num_parameters: usize,
}

#[derive(Debug, Clone)]
pub struct Closure {
    pub func: Rc<CompiledFunction>,
    pub free: Vec<Object>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inspect_scalars() {
        assert_eq!(Object::Integer(-42).to_string(), "-42");
        assert_eq!(Object::Boolean(true).to_string(), "true");
        assert_eq!(Object::Null.to_string(), "null");
        assert_eq!(Object::string("raw text").to_string(), "raw text");
        assert_eq!(Object::error("boom").to_string(), "ERROR: boom");
    }

    #[test]
    fn inspect_aggregates() {
        let arr = Object::array(vec![Object::Integer(1), Object::string("two"), Object::Null]);
        assert_eq!(arr.to_string(), "[1, two, null]");

        let mut hash = HashObject::new();
        for (k, v) in [("b", 2), ("a", 1)] {
            let key = Object::string(k);
            hash.insert(key.hash_key().unwrap(), HashPair { key, value: Object::Integer(v) });
        }
        assert_eq!(Object::Hash(Rc::new(hash)).to_string(), "{b: 2, a: 1}");
    }

    #[test]
    fn equal_strings_share_hash_key() {
        let a = Object::string("monkey");
        let b = Object::string(String::from("mon") + "key");
        assert_eq!(a.hash_key(), b.hash_key());
        assert_ne!(a.hash_key(), Object::string("donkey").hash_key());
    }

    #[test]
    fn hash_keys_are_typed() {
        let one = Object::Integer(1).hash_key().unwrap();
        let yes = Object::Boolean(true).hash_key().unwrap();
        assert_eq!(one.value, yes.value);
        assert_ne!(one, yes);
        assert!(Object::array(vec![]).hash_key().is_none());
        assert!(Object::Null.hash_key().is_none());
    }

    #[test]
    fn fnv1a_known_values() {
        assert_eq!(fnv1a(""), 0x811c_9dc5);
        assert_eq!(fnv1a("a"), 0xe40c_292c);
    }

    #[test]
    fn repeated_key_overwrites_in_place() {
        let mut hash = HashObject::new();
        for (k, v) in [(1, 10), (2, 20), (1, 30)] {
            let key = Object::Integer(k);
            hash.insert(key.hash_key().unwrap(), HashPair { key, value: Object::Integer(v) });
        }
        assert_eq!(hash.pairs().count(), 2);
        let first = hash.pairs().next().unwrap();
        assert!(first.value.same_as(&Object::Integer(30)));
    }

    #[test]
    fn truthiness() {
        assert!(!Object::Null.is_truthy());
        assert!(!Object::Boolean(false).is_truthy());
        assert!(Object::Integer(0).is_truthy());
        assert!(Object::string("").is_truthy());
    }

    #[test]
    fn equality_rules() {
        assert!(Object::string("a").same_as(&Object::string("a")));
        assert!(!Object::Integer(1).same_as(&Object::Boolean(true)));
        let arr = Object::array(vec![Object::Integer(1)]);
        assert!(arr.same_as(&arr.clone()));
        assert!(!arr.same_as(&Object::array(vec![Object::Integer(1)])));
    }
}
