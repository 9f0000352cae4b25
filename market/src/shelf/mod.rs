/// Fixed-capacity circular shelf for one catalog item.
///
/// A slot holds the catalog index of the item stocked there, or nothing.
/// Insert and remove cursors advance independently so scans start where the
/// previous transfer of the same direction left off. Mutation must happen
/// under the item's mutex semaphore; the caller enforces that.
pub struct Shelf {
    slots: Vec<Option<usize>>,
    insert_cursor: usize,
    remove_cursor: usize,
    inventory: u32,
}

impl Shelf {
    pub fn new(capacity: usize) -> Shelf {
        Shelf {
            slots: vec![None; capacity],
            insert_cursor: 0,
            remove_cursor: 0,
            inventory: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Occupied-slot mirror, maintained by `place`/`clear`.
    pub fn inventory(&self) -> u32 {
        self.inventory
    }

    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn slot(&self, pos: usize) -> Option<usize> {
        self.slots[pos]
    }

    /// First vacant slot scanning circularly from the insert cursor, or None
    /// when the scan wraps without a match. The empty semaphore must have
    /// been acquired before calling this.
    pub fn find_empty_slot(&self) -> Option<usize> {
        let cap = self.slots.len();
        for k in 0..cap {
            let j = (self.insert_cursor + k) % cap;
            if self.slots[j].is_none() {
                return Some(j);
            }
        }
        None
    }

    /// First occupied slot scanning circularly from the remove cursor.
    pub fn find_filled_slot(&self) -> Option<usize> {
        let cap = self.slots.len();
        for k in 0..cap {
            let j = (self.remove_cursor + k) % cap;
            if self.slots[j].is_some() {
                return Some(j);
            }
        }
        None
    }

    pub fn place(&mut self, pos: usize, item: usize) {
        self.slots[pos] = Some(item);
        self.insert_cursor = (pos + 1) % self.slots.len();
        self.inventory += 1;
    }

    /// Vacates a slot, returning what it held.
    pub fn clear(&mut self, pos: usize) -> Option<usize> {
        let prev = self.slots[pos].take();
        self.remove_cursor = (pos + 1) % self.slots.len();
        if prev.is_some() {
            self.inventory -= 1;
        }
        prev
    }
}
