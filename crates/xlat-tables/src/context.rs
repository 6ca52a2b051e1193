use core::marker::PhantomData;

use log::{debug, error, warn};
use xlat_interface::{
    base_entries, base_level, ArchOps, DescriptorCodec, PhysAddr, Regime, VirtAddr, XlatError,
    XlatResult, MAX_PA_SPACE_SIZE, MAX_VA_SPACE_SIZE, MIN_VA_SPACE_SIZE,
};

use crate::pool::{Table, TablePool};
use crate::registry::{Limits, Registry};
use crate::tree::Tree;
use crate::Region;

/// Translation tables of one regime together with the regions they map.
///
/// `REGIONS` bounds the number of registered regions and `TABLES` the number
/// of sub-tables below the root. Table descriptors hold the addresses of
/// their children, so a context must stay where it is once [`init`] has run.
/// The tables live inside the context, so a large pool belongs in a static:
/// build it there with [`Context::new_const`] and [`GlobalContext`].
///
/// [`init`]: Context::init
/// [`GlobalContext`]: crate::GlobalContext
pub struct Context<C, A, const REGIONS: usize, const TABLES: usize> {
    pub(crate) root: Table,
    pub(crate) pool: TablePool<TABLES>,
    pub(crate) registry: Registry<REGIONS>,
    pub(crate) arch: A,
    pub(crate) regime: Regime,
    pub(crate) limits: Limits,
    pub(crate) max_va: usize,
    pub(crate) max_pa: usize,
    pub(crate) base_level: usize,
    pub(crate) base_entries: usize,
    pub(crate) initialized: bool,
    /// Root table address recorded by `init`.
    anchor: usize,
    _codec: PhantomData<C>,
}

impl<C, A, const REGIONS: usize, const TABLES: usize> Context<C, A, REGIONS, TABLES>
where
    C: DescriptorCodec,
    A: ArchOps,
{
    /// Creates an empty context translating `va_space_size` bytes of virtual
    /// address space onto at most `pa_space_size` bytes of physical memory.
    ///
    /// The context is returned by value, tables included. Use
    /// [`Context::new_const`] to build it in place in a static.
    pub fn new(
        regime: Regime,
        va_space_size: usize,
        pa_space_size: usize,
        arch: A,
    ) -> XlatResult<Self> {
        if !valid_va_space(va_space_size) {
            warn!("unsupported virtual address space size {:#x}", va_space_size);
            return Err(XlatError::InvalidArgument);
        }
        if !valid_pa_space(pa_space_size) {
            warn!("unsupported physical address space size {:#x}", pa_space_size);
            return Err(XlatError::InvalidArgument);
        }
        Ok(Self::build(regime, va_space_size, pa_space_size, arch))
    }

    /// Same as [`Context::new`], usable in a static initializer.
    ///
    /// ```ignore
    /// static XLAT: GlobalContext<Vmsav8, ArmOps, 16, 32> =
    ///     GlobalContext::new(Context::new_const(Regime::El3, 1 << 32, 1 << 32, ArmOps));
    /// ```
    ///
    /// # Panics
    ///
    /// Panics, at compile time when evaluated in a const context, if either
    /// address space size is unsupported.
    pub const fn new_const(
        regime: Regime,
        va_space_size: usize,
        pa_space_size: usize,
        arch: A,
    ) -> Self {
        assert!(
            valid_va_space(va_space_size),
            "unsupported virtual address space size"
        );
        assert!(
            valid_pa_space(pa_space_size),
            "unsupported physical address space size"
        );
        Self::build(regime, va_space_size, pa_space_size, arch)
    }

    const fn build(regime: Regime, va_space_size: usize, pa_space_size: usize, arch: A) -> Self {
        Self {
            root: Table::EMPTY,
            pool: TablePool::new(),
            registry: Registry::new(),
            arch,
            regime,
            limits: Limits {
                va: va_space_size - 1,
                pa: pa_space_size - 1,
            },
            max_va: 0,
            max_pa: 0,
            base_level: base_level(va_space_size),
            base_entries: base_entries(va_space_size),
            initialized: false,
            anchor: 0,
            _codec: PhantomData,
        }
    }

    pub fn regime(&self) -> Regime {
        self.regime
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn regions(&self) -> &[Region] {
        self.registry.as_slice()
    }

    pub fn base_level(&self) -> usize {
        self.base_level
    }

    pub fn base_entries(&self) -> usize {
        self.base_entries
    }

    /// Highest physical address mapped so far.
    pub fn max_mapped_pa(&self) -> PhysAddr {
        PhysAddr::from(self.max_pa)
    }

    /// Highest virtual address mapped so far.
    pub fn max_mapped_va(&self) -> VirtAddr {
        VirtAddr::from(self.max_va)
    }

    pub fn va_limit(&self) -> VirtAddr {
        VirtAddr::from(self.limits.va)
    }

    pub fn pa_limit(&self) -> PhysAddr {
        PhysAddr::from(self.limits.pa)
    }

    /// Address to program into the translation table base register.
    pub fn root_address(&self) -> PhysAddr {
        PhysAddr::from(self.root.addr())
    }

    pub fn tables_used(&self) -> usize {
        self.pool.counts().used()
    }

    pub fn pool(&self) -> &TablePool<TABLES> {
        &self.pool
    }

    pub fn arch(&self) -> &A {
        &self.arch
    }

    /// Registers a region to be mapped by [`Context::init`].
    ///
    /// # Panics
    ///
    /// Panics if the tables are already initialized.
    pub fn add_static_region(&mut self, region: Region) -> XlatResult {
        assert!(
            !self.initialized,
            "static region {region} added after initialization"
        );
        if region.size == 0 {
            return Ok(());
        }
        let region = self.normalize(region, false);
        self.check(&region)?;
        self.registry.insert(region)?;
        self.raise_max(&region);
        Ok(())
    }

    /// Registers `regions` in order, stopping at the first error.
    pub fn add_static_regions(&mut self, regions: &[Region]) -> XlatResult {
        regions
            .iter()
            .try_for_each(|region| self.add_static_region(*region))
    }

    /// Builds the tables for every registered region.
    ///
    /// # Panics
    ///
    /// Panics if called twice, if translation is already enabled for the
    /// regime, if the pool runs out of tables, or if the physical address
    /// space is larger than the CPU supports.
    pub fn init(&mut self) {
        assert!(!self.initialized, "translation tables already initialized");
        assert!(
            !self.arch.mmu_enabled(self.regime),
            "translation already enabled for {}",
            self.regime
        );

        self.dump_regions();

        self.root.clear();
        self.pool.reset();
        self.anchor = self.root.addr();

        for i in 0..self.registry.len() {
            let region = self.registry[i];
            if let Err(va) = self.tree().map_region(&region) {
                error!("not enough translation tables to map region:");
                error!("  {}", region);
                panic!("failed to map region at {:#x}", va.as_usize());
            }
        }

        let max_pa = self.arch.max_supported_pa();
        assert!(
            self.limits.pa <= max_pa,
            "physical address space {:#x} exceeds the supported {:#x}",
            self.limits.pa,
            max_pa
        );

        self.initialized = true;
        debug!(
            "{} translation tables initialized, {} of {} tables used",
            self.regime,
            self.tables_used(),
            TABLES
        );
        self.dump_tables();
    }

    /// Regions keep the attributes that end up in the descriptors.
    fn normalize(&self, mut region: Region, dynamic: bool) -> Region {
        region.attrs = C::effective(region.attrs, self.regime);
        region.dynamic = dynamic;
        region
    }

    fn check(&self, region: &Region) -> XlatResult {
        self.registry
            .check(region, self.limits)
            .inspect_err(|e| warn!("rejected region {}: {}", region, e))
    }

    fn raise_max(&mut self, region: &Region) {
        self.max_va = self.max_va.max(region.end_va());
        self.max_pa = self.max_pa.max(region.end_pa());
    }

    pub(crate) fn tree(&mut self) -> Tree<'_, C, A, TABLES> {
        self.check_anchor();
        let (tables, counts) = self.pool.split();
        Tree {
            root: &mut self.root,
            tables,
            counts,
            arch: &self.arch,
            regime: self.regime,
            base_level: self.base_level,
            base_entries: self.base_entries,
            _codec: PhantomData,
        }
    }

    pub(crate) fn check_anchor(&self) {
        assert!(
            self.anchor == 0 || self.anchor == self.root.addr(),
            "translation context moved after tables were installed"
        );
    }
}

const fn valid_va_space(size: usize) -> bool {
    size.is_power_of_two() && size >= MIN_VA_SPACE_SIZE && size <= MAX_VA_SPACE_SIZE
}

const fn valid_pa_space(size: usize) -> bool {
    size.is_power_of_two() && size <= MAX_PA_SPACE_SIZE
}

#[cfg(feature = "dynamic")]
impl<C, A, const REGIONS: usize, const TABLES: usize> Context<C, A, REGIONS, TABLES>
where
    C: DescriptorCodec,
    A: ArchOps,
{
    /// Adds a region that can later be removed again.
    ///
    /// Before [`Context::init`] the region is only registered. Afterwards it
    /// is mapped right away; if the pool runs out the partial mapping is
    /// undone and `OutOfMemory` returned. Returns the region's virtual base.
    pub fn add_dynamic_region(&mut self, region: Region) -> XlatResult<VirtAddr> {
        if region.size == 0 {
            return Ok(region.va);
        }
        let region = self.normalize(region, true);
        self.check(&region)?;
        let index = self.registry.insert(region)?;

        if self.initialized {
            if let Err(va) = self.tree().map_region(&region) {
                warn!("not enough translation tables to map {}", region);
                self.registry.remove(index);
                let mapped = va.as_usize() - region.va.as_usize();
                if mapped > 0 {
                    self.tree().unmap_range(region.va.as_usize(), mapped);
                    self.arch.invalidate_sync();
                }
                return Err(XlatError::OutOfMemory);
            }
            self.arch.store_barrier();
        }

        self.raise_max(&region);
        Ok(region.va)
    }

    /// Adds a dynamic region for `pa` at a virtual address above everything
    /// mapped so far, congruent to `pa` modulo the default granularity.
    pub fn add_dynamic_region_alloc_va(
        &mut self,
        pa: PhysAddr,
        size: usize,
        attrs: crate::MemAttr,
    ) -> XlatResult<VirtAddr> {
        let mut region = Region::new(pa, VirtAddr::from(0), size, attrs);
        region.va = self.alloc_va(&region)?;
        self.add_dynamic_region(region)
    }

    fn alloc_va(&self, region: &Region) -> XlatResult<VirtAddr> {
        let align = region.granularity;
        let start = self.max_va.checked_add(1).ok_or(XlatError::OutOfRange)?;
        let offset = region.pa.as_usize() & (align - 1);
        let mut va = (start & !(align - 1)) | offset;
        if va < start {
            va = va.checked_add(align).ok_or(XlatError::OutOfRange)?;
        }
        Ok(VirtAddr::from(va))
    }

    /// Unmaps and forgets the dynamic region starting at `va` with `size` bytes.
    pub fn remove_dynamic_region(&mut self, va: VirtAddr, size: usize) -> XlatResult {
        let Some(index) = self.registry.position(va.as_usize(), size) else {
            warn!("no region at {:#x} with size {:#x}", va.as_usize(), size);
            return Err(XlatError::InvalidArgument);
        };
        let region = self.registry[index];
        if !region.dynamic {
            warn!("refusing to remove static region {}", region);
            return Err(XlatError::PermissionDenied);
        }

        if self.initialized {
            self.tree().unmap_range(region.va.as_usize(), region.size);
            self.arch.invalidate_sync();
        }
        self.registry.remove(index);
        Ok(())
    }
}
