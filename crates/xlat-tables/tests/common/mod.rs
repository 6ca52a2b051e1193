#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::vec::Vec;

use log::LevelFilter;
use xlat_arm::Vmsav8;
use xlat_tables::*;

pub fn init_log() {
    let _ = env_logger::builder()
        .filter_level(LevelFilter::Trace)
        .is_test(true)
        .try_init();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Clean,
    StoreBarrier,
    Invalidate(usize),
    Sync,
}

/// Arch double that records maintenance instead of performing it.
pub struct RecordingOps {
    pub ops: RefCell<Vec<Op>>,
    pub mmu_on: Cell<bool>,
    pub max_pa: usize,
}

impl RecordingOps {
    pub fn new() -> Self {
        Self {
            ops: RefCell::new(Vec::new()),
            mmu_on: Cell::new(false),
            max_pa: (1 << 48) - 1,
        }
    }

    pub fn take(&self) -> Vec<Op> {
        self.ops.take()
    }

    pub fn invalidated(&self) -> Vec<usize> {
        self.ops
            .borrow()
            .iter()
            .filter_map(|op| match op {
                Op::Invalidate(va) => Some(*va),
                _ => None,
            })
            .collect()
    }
}

impl ArchOps for RecordingOps {
    fn invalidate_va(&self, vaddr: VirtAddr, _regime: Regime) {
        self.ops.borrow_mut().push(Op::Invalidate(vaddr.as_usize()));
    }

    fn invalidate_sync(&self) {
        self.ops.borrow_mut().push(Op::Sync);
    }

    fn store_barrier(&self) {
        self.ops.borrow_mut().push(Op::StoreBarrier);
    }

    fn clean_dcache_range(&self, _addr: usize, _size: usize) {
        self.ops.borrow_mut().push(Op::Clean);
    }

    fn mmu_enabled(&self, _regime: Regime) -> bool {
        self.mmu_on.get()
    }

    fn max_supported_pa(&self) -> usize {
        self.max_pa
    }
}

pub type Ctx<const T: usize> = Context<Vmsav8, RecordingOps, 16, T>;

pub const GIB: usize = 1 << 30;
pub const MIB: usize = 1 << 20;

pub fn new_ctx<const T: usize>(regime: Regime, va_space: usize) -> Ctx<T> {
    init_log();
    Context::new(regime, va_space, 1 << 40, RecordingOps::new()).unwrap()
}

/// Every valid descriptor as `(level, va, entry)`.
pub fn snapshot<const T: usize>(ctx: &Ctx<T>) -> Vec<(usize, usize, WalkEntry)> {
    let mut out = Vec::new();
    ctx.walk(|info| out.push((info.level, info.vaddr.as_usize(), info.entry)));
    out
}

pub fn counts<const T: usize>(ctx: &Ctx<T>) -> Vec<u32> {
    (0..T).map(|i| ctx.pool().counts().get(i)).collect()
}

pub fn leaf<const T: usize>(ctx: &Ctx<T>, va: usize) -> Translation {
    ctx.translate(va!(va))
        .unwrap_or_else(|| panic!("{va:#x} not mapped"))
}
