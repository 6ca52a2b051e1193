use log::trace;
use xlat_interface::{block_mask, block_shift, block_size, ArchOps, DescriptorCodec, PhysAddr, VirtAddr};

use crate::action::{map_action, MapAction};
use crate::pool::RegionRef;
use crate::tree::{TableId, Tree};
use crate::Region;

/// First entry of the table at `table_va` touched by a range starting at `va`.
pub(crate) fn first_entry(va: usize, table_va: usize, level: usize) -> (usize, usize) {
    if va > table_va {
        let entry_va = va & !block_mask(level);
        ((entry_va - table_va) >> block_shift(level), entry_va)
    } else {
        (0, table_va)
    }
}

impl<C: DescriptorCodec, A: ArchOps, const N: usize> Tree<'_, C, A, N> {
    /// Maps `region` into the tables.
    ///
    /// On pool exhaustion returns the first virtual address that could not
    /// be mapped. Everything below it stays mapped and counted so that
    /// unmapping `[region.va, va)` undoes the partial work.
    pub fn map_region(&mut self, region: &Region) -> Result<(), VirtAddr> {
        trace!("map {}", region);
        let res = self.map_table(region, TableId::Root, 0, self.base_level);
        self.clean_table(TableId::Root);
        res.map_err(|va| VirtAddr::from(va.max(region.va.as_usize())))
    }

    fn map_table(
        &mut self,
        region: &Region,
        id: TableId,
        table_va: usize,
        level: usize,
    ) -> Result<(), usize> {
        let region_end = region.end_va();
        let (mut idx, mut entry_va) = first_entry(region.va.as_usize(), table_va, level);
        let first_va = entry_va.max(region.va.as_usize());

        let counts = self.counts;
        let claim = match id {
            TableId::Pool(i) => Some(counts.acquire(i)),
            TableId::Root => None,
        };

        while idx < self.entries(id).len() {
            let desc = self.entries(id)[idx];
            let dest_pa = region.pa_of(entry_va);

            let res = match map_action(region, C::kind(desc, level), dest_pa, entry_va, level) {
                MapAction::None => Ok(()),
                MapAction::WriteBlock => {
                    self.entries_mut(id)[idx] =
                        C::block(region.attrs, PhysAddr::from(dest_pa), level, self.regime);
                    Ok(())
                }
                MapAction::CreateTable => match counts.get_empty() {
                    Some(child) => {
                        self.entries_mut(id)[idx] =
                            C::table(PhysAddr::from(self.table_addr(child)));
                        self.map_child(region, id, idx, child, entry_va, level)
                    }
                    None => {
                        trace!("no free table for {:#x} at level {}", entry_va, level + 1);
                        Err(entry_va)
                    }
                },
                MapAction::RecurseIntoTable => {
                    let child = self.child_of(desc);
                    self.map_child(region, id, idx, child, entry_va, level)
                }
            };
            if let Err(va) = res {
                return Err(fail(claim, first_va, va));
            }

            idx += 1;
            entry_va += block_size(level);
            if entry_va > region_end {
                break;
            }
        }

        if let Some(claim) = claim {
            claim.keep();
        }
        Ok(())
    }

    /// Descends into pool table `child`, hooked at `id[idx]`.
    ///
    /// A child left without any region after a failure is unhooked again.
    fn map_child(
        &mut self,
        region: &Region,
        id: TableId,
        idx: usize,
        child: usize,
        entry_va: usize,
        level: usize,
    ) -> Result<(), usize> {
        let res = self.map_table(region, TableId::Pool(child), entry_va, level + 1);
        self.clean_table(TableId::Pool(child));
        if res.is_err() && self.counts.is_empty(child) {
            self.entries_mut(id)[idx] = C::INVALID;
            self.arch.invalidate_va(VirtAddr::from(entry_va), self.regime);
        }
        res
    }
}

/// Settles a table's claim after a failure at `va`.
///
/// The claim is kept only if the region mapped something in the table,
/// which is exactly when the rollback walk over `[region.va, va)` visits it.
fn fail(claim: Option<RegionRef<'_>>, first_va: usize, va: usize) -> usize {
    if let Some(claim) = claim {
        if va > first_va {
            claim.keep();
        }
    }
    va
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_first_entry() {
        assert_eq!(first_entry(0x4020_3000, 0x4000_0000, 2), (1, 0x4020_0000));
        assert_eq!(first_entry(0x4020_3000, 0x4020_0000, 3), (3, 0x4020_3000));
        assert_eq!(first_entry(0x1000, 0x4000_0000, 2), (0, 0x4000_0000));
        assert_eq!(first_entry(0x8000_0000, 0, 1), (2, 0x8000_0000));
    }
}
