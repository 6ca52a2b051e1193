use log::trace;
use xlat_interface::{block_size, ArchOps, DescriptorCodec, VirtAddr};

use crate::action::{unmap_action, UnmapAction};
use crate::map::first_entry;
use crate::tree::{TableId, Tree};

impl<C: DescriptorCodec, A: ArchOps, const N: usize> Tree<'_, C, A, N> {
    /// Removes everything mapped in `[va, va + size)` and drops the range's
    /// claim on every pool table it passes through.
    ///
    /// Tables left without regions are unhooked and become free. TLB entries
    /// are invalidated per erased entry; the caller completes them with
    /// `invalidate_sync`.
    pub fn unmap_range(&mut self, va: usize, size: usize) {
        trace!("unmap [{:#x}, {:#x})", va, va + size);
        self.unmap_table(va, va + (size - 1), TableId::Root, 0, self.base_level);
        self.clean_table(TableId::Root);
    }

    fn unmap_table(&mut self, va: usize, end: usize, id: TableId, table_va: usize, level: usize) {
        let (mut idx, mut entry_va) = first_entry(va, table_va, level);

        while idx < self.entries(id).len() {
            let desc = self.entries(id)[idx];

            match unmap_action(va, end, C::kind(desc, level), entry_va, level) {
                UnmapAction::None => {}
                UnmapAction::EraseEntry => {
                    self.entries_mut(id)[idx] = C::INVALID;
                    self.arch.invalidate_va(VirtAddr::from(entry_va), self.regime);
                }
                UnmapAction::RecurseIntoTable => {
                    let child = self.child_of(desc);
                    self.unmap_table(va, end, TableId::Pool(child), entry_va, level + 1);
                    self.clean_table(TableId::Pool(child));
                    if self.counts.is_empty(child) {
                        self.entries_mut(id)[idx] = C::INVALID;
                        self.arch.invalidate_va(VirtAddr::from(entry_va), self.regime);
                    }
                }
            }

            idx += 1;
            entry_va += block_size(level);
            if entry_va > end {
                break;
            }
        }

        if let TableId::Pool(i) = id {
            self.counts.release(i);
        }
    }
}
