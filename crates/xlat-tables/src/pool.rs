//! Fixed pool of sub-tables and their mapped-region counters.

use core::cell::Cell;
use core::mem;

use xlat_interface::TABLE_ENTRIES;

/// One translation table: 512 descriptors, naturally aligned.
#[derive(Clone)]
#[repr(C, align(4096))]
pub struct Table(pub [u64; TABLE_ENTRIES]);

impl Table {
    pub const EMPTY: Self = Self([0; TABLE_ENTRIES]);

    pub fn addr(&self) -> usize {
        self as *const Self as usize
    }

    pub fn clear(&mut self) {
        self.0.fill(0);
    }
}

/// Sub-tables available to a context.
///
/// The counters are kept apart from the tables so that a walk can hold them
/// through shared references while it edits the tables.
pub struct TablePool<const N: usize> {
    tables: [Table; N],
    counts: RegionCounts<N>,
}

impl<const N: usize> TablePool<N> {
    pub const fn new() -> Self {
        Self {
            tables: [Table::EMPTY; N],
            counts: RegionCounts::new(),
        }
    }

    pub(crate) fn reset(&mut self) {
        for table in self.tables.iter_mut() {
            table.clear();
        }
        self.counts = RegionCounts::new();
    }

    pub fn table(&self, index: usize) -> &Table {
        &self.tables[index]
    }

    pub(crate) fn table_mut(&mut self, index: usize) -> &mut Table {
        &mut self.tables[index]
    }

    pub fn counts(&self) -> &RegionCounts<N> {
        &self.counts
    }

    /// Index of the table at `addr`, if it belongs to this pool.
    pub fn index_of(&self, addr: usize) -> Option<usize> {
        index_of(&self.tables, addr)
    }

    pub(crate) fn split(&mut self) -> (&mut [Table; N], &RegionCounts<N>) {
        (&mut self.tables, &self.counts)
    }
}

impl<const N: usize> Default for TablePool<N> {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn index_of(tables: &[Table], addr: usize) -> Option<usize> {
    let base = tables.as_ptr() as usize;
    let offset = addr.checked_sub(base)?;
    let index = offset / mem::size_of::<Table>();
    (offset % mem::size_of::<Table>() == 0 && index < tables.len()).then_some(index)
}

/// How many regions map something through each pool table.
///
/// With the `dynamic` feature a table is free while its count is zero.
/// Without it tables are handed out once, in order.
///
/// Outside this crate the counts are read-only:
///
/// ```compile_fail
/// fn drop_claim(counts: &xlat_tables::RegionCounts<4>) {
///     counts.release(0);
/// }
/// ```
pub struct RegionCounts<const N: usize> {
    mapped: [Cell<u32>; N],
    #[cfg(not(feature = "dynamic"))]
    next: Cell<usize>,
}

impl<const N: usize> RegionCounts<N> {
    const fn new() -> Self {
        Self {
            mapped: [const { Cell::new(0) }; N],
            #[cfg(not(feature = "dynamic"))]
            next: Cell::new(0),
        }
    }

    pub fn get(&self, index: usize) -> u32 {
        self.mapped[index].get()
    }

    pub fn is_empty(&self, index: usize) -> bool {
        self.get(index) == 0
    }

    /// Takes a free table.
    #[cfg(feature = "dynamic")]
    pub(crate) fn get_empty(&self) -> Option<usize> {
        self.mapped.iter().position(|c| c.get() == 0)
    }

    /// Takes the next unused table.
    #[cfg(not(feature = "dynamic"))]
    pub(crate) fn get_empty(&self) -> Option<usize> {
        let next = self.next.get();
        if next < N {
            self.next.set(next + 1);
            Some(next)
        } else {
            None
        }
    }

    pub fn used(&self) -> usize {
        #[cfg(feature = "dynamic")]
        {
            self.mapped.iter().filter(|c| c.get() != 0).count()
        }
        #[cfg(not(feature = "dynamic"))]
        {
            self.next.get()
        }
    }

    /// Counts one more region mapping through table `index`.
    pub(crate) fn acquire(&self, index: usize) -> RegionRef<'_> {
        let count = &self.mapped[index];
        count.set(count.get() + 1);
        RegionRef { count }
    }

    pub(crate) fn release(&self, index: usize) {
        let count = &self.mapped[index];
        debug_assert!(count.get() > 0, "table {index} released more than acquired");
        count.set(count.get().saturating_sub(1));
    }
}

/// A region's claim on a pool table while it is being mapped.
///
/// Dropping the claim gives it back; [`RegionRef::keep`] makes it permanent
/// until the region is unmapped.
#[must_use]
pub(crate) struct RegionRef<'a> {
    count: &'a Cell<u32>,
}

impl RegionRef<'_> {
    pub(crate) fn keep(self) {
        mem::forget(self);
    }
}

impl Drop for RegionRef<'_> {
    fn drop(&mut self) {
        self.count.set(self.count.get() - 1);
    }
}
