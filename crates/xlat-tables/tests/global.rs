mod common;

use std::thread;

use common::init_log;
use xlat_arm::Vmsav8;
use xlat_tables::*;

/// Maintenance that does nothing, on any host.
struct NoOps;

impl ArchOps for NoOps {
    fn invalidate_va(&self, _vaddr: VirtAddr, _regime: Regime) {}
    fn invalidate_sync(&self) {}
    fn store_barrier(&self) {}
    fn clean_dcache_range(&self, _addr: usize, _size: usize) {}
    fn mmu_enabled(&self, _regime: Regime) -> bool {
        false
    }
    fn max_supported_pa(&self) -> usize {
        (1 << 48) - 1
    }
}

type Global<const T: usize> = GlobalContext<Vmsav8, NoOps, 16, T>;

static XLAT: Global<4> =
    GlobalContext::new(Context::new_const(Regime::El2, 1 << 39, 1 << 40, NoOps));
static UNUSED: Global<4> =
    GlobalContext::new(Context::new_const(Regime::El2, 1 << 39, 1 << 40, NoOps));
static LARGE: Global<32> =
    GlobalContext::new(Context::new_const(Regime::El3, 1 << 32, 1 << 32, NoOps));

#[test]
fn test_global_context() {
    init_log();
    assert!(XLAT.get().is_none());

    XLAT.init_once(|ctx| {
        ctx.add_static_region(Region::flat(pa!(0x4000_0000), 0x10_0000, MemAttr::CODE))
            .unwrap();
        ctx.init();
    });
    // a second setup is ignored
    XLAT.init_once(|_| panic!("context set up twice"));
    assert!(XLAT.get().is_some());

    let ctx = XLAT.lock();
    assert!(ctx.is_initialized());
    assert_eq!(ctx.regime(), Regime::El2);
    let t = ctx.translate(va!(0x4008_0000)).unwrap();
    assert_eq!(t.pa, pa!(0x4008_0000));
    assert_eq!(t.level, 3);
    assert_eq!(ctx.root_address().as_usize() % 4096, 0);
}

#[test]
#[should_panic(expected = "before init_once")]
fn test_global_uninit() {
    let _ctx = UNUSED.lock();
}

#[test]
fn test_large_pool_on_small_stack() {
    init_log();
    // 33 tables of 4 KiB, far more than the stack of the boot thread
    let boot = thread::Builder::new()
        .stack_size(64 * 1024)
        .spawn(|| {
            LARGE.init_once(|ctx| {
                ctx.add_static_region(Region::flat(pa!(0x8000_0000), 0x20_0000, MemAttr::CODE))
                    .unwrap();
                ctx.add_static_region(Region::flat(pa!(0x9000_0000), 0x1000, MemAttr::DEVICE_RW))
                    .unwrap();
                ctx.init();
            });
            let ctx = LARGE.lock();
            (ctx.tables_used(), ctx.translate(va!(0x9000_0000)))
        })
        .unwrap();

    let (used, t) = boot.join().unwrap();
    assert_eq!(used, 2);
    let t = t.unwrap();
    assert_eq!(t.pa, pa!(0x9000_0000));
    assert_eq!(t.level, 3);
}

#[test]
#[should_panic(expected = "unsupported virtual address space size")]
fn test_new_const_bad_size() {
    let _ctx: Context<Vmsav8, NoOps, 4, 1> =
        Context::new_const(Regime::El3, (1 << 32) + 1, 1 << 32, NoOps);
}
