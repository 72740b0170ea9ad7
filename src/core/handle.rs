//! Purpose: Typed, generation-checked handle tables for objects lent to hosts.
//! Exports: `Handle`, `HandleTable`, `Family`.
//! Role: Replaces raw pointer casts at the ABI; every call looks objects up by handle.
//! Invariants: Raw value 0 is never issued and always means "no object".
//! Invariants: Releasing a slot bumps its generation, so stale handles are rejected.
//! Invariants: A handle issued by one family's table is rejected by every other table.
//! Notes: The table mutex guards slot bookkeeping only; objects are handed out as
//! `Arc` clones so no lock is held while the engine runs.
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::core::error::{Error, ErrorKind};

const INDEX_BITS: u32 = 32;
const GENERATION_BITS: u32 = 24;
const GENERATION_MASK: u64 = (1 << GENERATION_BITS) - 1;
const FAMILY_SHIFT: u32 = INDEX_BITS + GENERATION_BITS;

/// Object family encoded in the top byte of every handle.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum Family {
    Corpus = 1,
    Concordance = 2,
    Vector = 3,
}

impl Family {
    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::Corpus),
            2 => Some(Self::Concordance),
            3 => Some(Self::Vector),
            _ => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Corpus => "corpus",
            Self::Concordance => "concordance",
            Self::Vector => "vector",
        }
    }
}

#[derive(Clone, Copy, Eq, PartialEq, Hash)]
pub struct Handle(u64);

impl Handle {
    pub const NULL: Handle = Handle(0);

    fn new(family: Family, index: u32, generation: u32) -> Self {
        let raw = ((family as u64) << FAMILY_SHIFT)
            | ((generation as u64 & GENERATION_MASK) << INDEX_BITS)
            | index as u64;
        Self(raw)
    }

    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn into_raw(self) -> u64 {
        self.0
    }

    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    fn family_tag(self) -> u8 {
        (self.0 >> FAMILY_SHIFT) as u8
    }

    fn generation(self) -> u32 {
        ((self.0 >> INDEX_BITS) & GENERATION_MASK) as u32
    }

    fn index(self) -> usize {
        (self.0 & u32::MAX as u64) as usize
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return write!(f, "Handle(null)");
        }
        let family = Family::from_tag(self.family_tag())
            .map(Family::label)
            .unwrap_or("?");
        write!(
            f,
            "Handle({family}#{}@{})",
            self.index(),
            self.generation()
        )
    }
}

struct Slot<T> {
    generation: u32,
    value: Option<Arc<T>>,
}

struct Slots<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    live: usize,
}

pub struct HandleTable<T> {
    family: Family,
    inner: Mutex<Slots<T>>,
}

impl<T> HandleTable<T> {
    pub fn new(family: Family) -> Self {
        Self {
            family,
            inner: Mutex::new(Slots {
                slots: Vec::new(),
                free: Vec::new(),
                live: 0,
            }),
        }
    }

    pub fn insert(&self, value: T) -> Result<Handle, Error> {
        let mut inner = self.lock();
        let value = Some(Arc::new(value));
        let handle = match inner.free.pop() {
            Some(index) => {
                let slot = &mut inner.slots[index as usize];
                slot.value = value;
                Handle::new(self.family, index, slot.generation)
            }
            None => {
                let index = u32::try_from(inner.slots.len()).map_err(|_| {
                    Error::new(ErrorKind::Internal)
                        .with_message(format!("{} handle table is full", self.family.label()))
                })?;
                inner.slots.push(Slot {
                    generation: 1,
                    value,
                });
                Handle::new(self.family, index, 1)
            }
        };
        inner.live += 1;
        Ok(handle)
    }

    pub fn get(&self, handle: Handle) -> Result<Arc<T>, Error> {
        self.check_family(handle)?;
        let inner = self.lock();
        match inner.slots.get(handle.index()) {
            Some(slot) if slot.generation == handle.generation() => {
                slot.value.clone().ok_or_else(|| self.stale(handle))
            }
            _ => Err(self.stale(handle)),
        }
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.get(handle).is_ok()
    }

    /// Detaches the object and retires the handle. The object itself is dropped
    /// once the last in-flight `Arc` returned by `get` goes away.
    pub fn remove(&self, handle: Handle) -> Result<Arc<T>, Error> {
        self.check_family(handle)?;
        let mut inner = self.lock();
        let index = handle.index();
        let value = match inner.slots.get_mut(index) {
            Some(slot) if slot.generation == handle.generation() && slot.value.is_some() => {
                slot.generation = next_generation(slot.generation);
                slot.value.take()
            }
            _ => None,
        };
        match value {
            Some(value) => {
                inner.free.push(index as u32);
                inner.live -= 1;
                Ok(value)
            }
            None => Err(self.stale(handle)),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().live
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_family(&self, handle: Handle) -> Result<(), Error> {
        if handle.is_null() {
            return Err(Error::new(ErrorKind::InvalidHandle)
                .with_message(format!("{} handle is null", self.family.label())));
        }
        if handle.family_tag() != self.family as u8 {
            return Err(Error::new(ErrorKind::InvalidHandle).with_message(format!(
                "{handle:?} is not a {} handle",
                self.family.label()
            )));
        }
        Ok(())
    }

    fn stale(&self, handle: Handle) -> Error {
        Error::new(ErrorKind::InvalidHandle).with_message(format!(
            "{handle:?} does not refer to a live {}",
            self.family.label()
        ))
    }

    fn lock(&self) -> MutexGuard<'_, Slots<T>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!(
                    family = self.family.label(),
                    "handle table mutex was poisoned, recovering"
                );
                poisoned.into_inner()
            }
        }
    }
}

fn next_generation(generation: u32) -> u32 {
    let next = (generation as u64 + 1) & GENERATION_MASK;
    if next == 0 { 1 } else { next as u32 }
}

#[cfg(test)]
mod tests {
    use super::{Family, Handle, HandleTable, next_generation};
    use crate::core::error::ErrorKind;

    #[test]
    fn insert_then_get_returns_the_object() {
        let table = HandleTable::new(Family::Corpus);
        let handle = table.insert("susanne".to_string()).unwrap();
        assert!(!handle.is_null());
        assert_eq!(table.get(handle).unwrap().as_str(), "susanne");
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn removed_handle_is_rejected() {
        let table = HandleTable::new(Family::Corpus);
        let handle = table.insert(7u32).unwrap();
        assert_eq!(*table.remove(handle).unwrap(), 7);
        assert_eq!(
            table.get(handle).unwrap_err().kind(),
            ErrorKind::InvalidHandle
        );
        assert_eq!(
            table.remove(handle).unwrap_err().kind(),
            ErrorKind::InvalidHandle
        );
        assert!(table.is_empty());
    }

    #[test]
    fn reused_slot_does_not_revive_old_handle() {
        let table = HandleTable::new(Family::Vector);
        let first = table.insert(1u8).unwrap();
        table.remove(first).unwrap();
        let second = table.insert(2u8).unwrap();
        assert_ne!(first, second);
        assert!(table.get(first).is_err());
        assert_eq!(*table.get(second).unwrap(), 2);
    }

    #[test]
    fn null_and_foreign_handles_are_rejected() {
        let corpora = HandleTable::new(Family::Corpus);
        let concs = HandleTable::new(Family::Concordance);
        let corpus = corpora.insert(()).unwrap();
        let conc = concs.insert(()).unwrap();

        let err = corpora.get(Handle::NULL).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidHandle);
        assert!(concs.get(corpus).is_err());
        assert!(corpora.get(conc).is_err());
        assert!(corpora.get(Handle::from_raw(0xdead_beef)).is_err());
    }

    #[test]
    fn removal_keeps_in_flight_references_alive() {
        let table = HandleTable::new(Family::Corpus);
        let handle = table.insert(vec![1, 2, 3]).unwrap();
        let borrowed = table.get(handle).unwrap();
        table.remove(handle).unwrap();
        assert_eq!(borrowed.len(), 3);
    }

    #[test]
    fn generation_wraps_without_issuing_zero() {
        assert_eq!(next_generation(1), 2);
        assert_eq!(next_generation((1 << 24) - 1), 1);
    }
}
