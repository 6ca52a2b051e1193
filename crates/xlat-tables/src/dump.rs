use log::{debug, log_enabled, trace, Level};
use xlat_interface::{block_size, ArchOps, DescKind, DescriptorCodec, MemAttr, PhysAddr, VirtAddr};

use crate::tree::TableId;
use crate::Context;

/// A valid descriptor visited by [`Context::walk`].
#[derive(Debug, Clone, Copy)]
pub struct WalkInfo {
    pub level: usize,
    pub vaddr: VirtAddr,
    /// Bytes of address space the descriptor covers.
    pub size: usize,
    pub entry: WalkEntry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkEntry {
    Table { paddr: PhysAddr },
    Block { paddr: PhysAddr, attrs: MemAttr },
}

const LEVEL_SPACERS: [&str; 4] = ["[LV0] ", "  [LV1] ", "    [LV2] ", "      [LV3] "];

impl<C, A, const REGIONS: usize, const TABLES: usize> Context<C, A, REGIONS, TABLES>
where
    C: DescriptorCodec,
    A: ArchOps,
{
    /// Calls `f` for every valid descriptor, parents before children.
    pub fn walk(&self, mut f: impl FnMut(&WalkInfo)) {
        self.check_anchor();
        self.walk_table(TableId::Root, 0, self.base_level, &mut f);
    }

    fn walk_table(&self, id: TableId, table_va: usize, level: usize, f: &mut impl FnMut(&WalkInfo)) {
        let size = block_size(level);
        let entries = self.entries(id);

        for (i, &desc) in entries.iter().enumerate() {
            let vaddr = table_va + i * size;
            let paddr = C::output_address(desc);
            match C::kind(desc, level) {
                DescKind::Invalid => {}
                DescKind::Block => f(&WalkInfo {
                    level,
                    vaddr: VirtAddr::from(vaddr),
                    size,
                    entry: WalkEntry::Block {
                        paddr,
                        attrs: C::decode(desc, self.regime),
                    },
                }),
                DescKind::Table => {
                    f(&WalkInfo {
                        level,
                        vaddr: VirtAddr::from(vaddr),
                        size,
                        entry: WalkEntry::Table { paddr },
                    });
                    if let Some(child) = self.pool.index_of(paddr.as_usize()) {
                        self.walk_table(TableId::Pool(child), vaddr, level + 1, f);
                    }
                }
            }
        }
    }

    /// Logs the registered regions.
    pub fn dump_regions(&self) {
        debug!("{} regions:", self.regime);
        for region in self.registry.iter() {
            debug!(
                "  VA:[{:>#12x}, {:>#12x}] PA:[{:>#12x}, {:>#12x}] {} granularity:{:#x}{}",
                region.va.as_usize(),
                region.end_va(),
                region.pa.as_usize(),
                region.end_pa(),
                region.attrs,
                region.granularity,
                if region.dynamic { " dynamic" } else { "" }
            );
        }
    }

    /// Logs the context limits and every table, one descriptor per line.
    pub fn dump_tables(&self) {
        debug!("Translation tables state:");
        debug!("  Xlat regime:     {}", self.regime);
        debug!("  Max allowed PA:  {:#x}", self.limits.pa);
        debug!("  Max allowed VA:  {:#x}", self.limits.va);
        debug!("  Max mapped PA:   {:#x}", self.max_pa);
        debug!("  Max mapped VA:   {:#x}", self.max_va);
        debug!("  Initial lookup level: {}", self.base_level);
        debug!("  Entries @initial lookup level: {}", self.base_entries);
        let used = self.tables_used();
        debug!("  Used {} sub-tables out of {} ({} spare)", used, TABLES, TABLES - used);

        if !log_enabled!(Level::Trace) {
            return;
        }
        self.check_anchor();
        self.dump_table(TableId::Root, 0, self.base_level);
    }

    fn dump_table(&self, id: TableId, table_va: usize, level: usize) {
        let size = block_size(level);
        let entries = self.entries(id);
        let spacer = LEVEL_SPACERS[level];
        let mut invalid = 0;

        for (i, &desc) in entries.iter().enumerate() {
            let vaddr = table_va + i * size;
            let kind = C::kind(desc, level);
            if kind == DescKind::Invalid {
                invalid += 1;
                continue;
            }
            if invalid > 0 {
                trace!("{}({} invalid descriptors omitted)", spacer, invalid);
                invalid = 0;
            }
            let paddr = C::output_address(desc).as_usize();
            match kind {
                DescKind::Table => {
                    trace!("{}VA:{:#x} size:{:#x}", spacer, vaddr, size);
                    if let Some(child) = self.pool.index_of(paddr) {
                        self.dump_table(TableId::Pool(child), vaddr, level + 1);
                    }
                }
                _ => trace!(
                    "{}VA:{:#x} PA:{:#x} size:{:#x} {}",
                    spacer,
                    vaddr,
                    paddr,
                    size,
                    C::decode(desc, self.regime)
                ),
            }
        }
        if invalid > 0 {
            trace!("{}({} invalid descriptors omitted)", spacer, invalid);
        }
    }
}
