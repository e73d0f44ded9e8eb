//! Slot+generation table backing the finalizer registry.
//!
//! A token names one slot at one generation. Removing an entry bumps the
//! slot's generation, so a stale token (an object unregistering twice, or a
//! token surviving its slot's reuse) resolves to nothing instead of to
//! another object's finalizer.

/// Opaque key for a registered finalizer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FinalizerToken {
    slot: u32,
    generation: u32,
}

struct Slot<T> {
    generation: u32,
    entry: Option<T>,
}

pub(crate) struct SlotTable<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    live: usize,
}

impl<T> SlotTable<T> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            live: 0,
        }
    }

    pub(crate) fn insert(&mut self, entry: T) -> FinalizerToken {
        self.live += 1;
        if let Some(slot) = self.free.pop() {
            let s = &mut self.slots[slot as usize];
            s.entry = Some(entry);
            return FinalizerToken {
                slot,
                generation: s.generation,
            };
        }
        let slot = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
        self.slots.push(Slot {
            generation: 0,
            entry: Some(entry),
        });
        FinalizerToken {
            slot,
            generation: 0,
        }
    }

    pub(crate) fn get(&self, token: FinalizerToken) -> Option<&T> {
        let s = self.slots.get(token.slot as usize)?;
        if s.generation != token.generation {
            return None;
        }
        s.entry.as_ref()
    }

    /// Take the entry out. Stale or unknown tokens yield `None`.
    pub(crate) fn remove(&mut self, token: FinalizerToken) -> Option<T> {
        let s = self.slots.get_mut(token.slot as usize)?;
        if s.generation != token.generation {
            return None;
        }
        let entry = s.entry.take()?;
        self.live -= 1;
        s.generation = s.generation.wrapping_add(1);
        // A wrapped generation would let epoch-0 tokens match again.
        if s.generation != 0 {
            self.free.push(token.slot);
        }
        Some(entry)
    }

    pub(crate) fn len(&self) -> usize {
        self.live
    }
}
