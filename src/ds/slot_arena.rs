//! Slot arena with stable handles.
//!
//! Vacant slots form a free chain threaded through the vector itself, so a
//! removal followed by an insert reuses the same index without allocating.
//! A [`SlotId`] stays valid until its slot is vacated.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(pub(crate) usize);

impl SlotId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug)]
enum Slot<T> {
    Occupied(T),
    Vacant { next_free: Option<usize> },
}

#[derive(Debug)]
pub struct SlotArena<T> {
    slots: Vec<Slot<T>>,
    first_free: Option<usize>,
    occupied: usize,
}

impl<T> SlotArena<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            first_free: None,
            occupied: 0,
        }
    }

    pub fn insert(&mut self, value: T) -> SlotId {
        self.occupied += 1;
        if let Some(index) = self.first_free {
            if let Slot::Vacant { next_free } = self.slots[index] {
                self.first_free = next_free;
            }
            self.slots[index] = Slot::Occupied(value);
            return SlotId(index);
        }
        self.slots.push(Slot::Occupied(value));
        SlotId(self.slots.len() - 1)
    }

    pub fn remove(&mut self, id: SlotId) -> Option<T> {
        let slot = self.slots.get_mut(id.0)?;
        if matches!(slot, Slot::Vacant { .. }) {
            return None;
        }
        let vacated = std::mem::replace(
            slot,
            Slot::Vacant {
                next_free: self.first_free,
            },
        );
        self.first_free = Some(id.0);
        self.occupied -= 1;
        match vacated {
            Slot::Occupied(value) => Some(value),
            Slot::Vacant { .. } => None,
        }
    }

    pub fn get(&self, id: SlotId) -> Option<&T> {
        match self.slots.get(id.0)? {
            Slot::Occupied(value) => Some(value),
            Slot::Vacant { .. } => None,
        }
    }

    pub fn get_mut(&mut self, id: SlotId) -> Option<&mut T> {
        match self.slots.get_mut(id.0)? {
            Slot::Occupied(value) => Some(value),
            Slot::Vacant { .. } => None,
        }
    }

    pub fn len(&self) -> usize {
        self.occupied
    }

    pub fn is_empty(&self) -> bool {
        self.occupied == 0
    }

    /// Drops every value and forgets all slots.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.first_free = None;
        self.occupied = 0;
    }
}

impl<T> Default for SlotArena<T> {
    fn default() -> Self {
        Self::new()
    }
}
