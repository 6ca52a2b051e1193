mod common;

use common::*;
use xlat_tables::*;

fn ctx_with_pages() -> Ctx<8> {
    let mut ctx = new_ctx::<8>(Regime::El1El0, 1 << 32);
    ctx.add_static_regions(&[
        Region::flat(pa!(0x4000_0000), 0x4000, MemAttr::RW_DATA),
        Region::flat(pa!(0x900_0000), 0x1000, MemAttr::DEVICE_RW),
        Region::flat(pa!(0x8000_0000), 2 * MIB, MemAttr::CODE),
    ])
    .unwrap();
    ctx
}

#[test]
fn test_set_attributes() {
    let mut ctx = ctx_with_pages();
    ctx.init();

    ctx.set_region_attributes(va!(0x4000_1000), 0x2000, MemAttr::RO_DATA)
        .unwrap();
    assert_eq!(leaf(&ctx, 0x4000_0000).attrs, MemAttr::RW_DATA);
    assert_eq!(leaf(&ctx, 0x4000_1000).attrs, MemAttr::RO_DATA);
    assert_eq!(leaf(&ctx, 0x4000_2000).attrs, MemAttr::RO_DATA);
    assert_eq!(leaf(&ctx, 0x4000_3000).attrs, MemAttr::RW_DATA);
    assert_eq!(leaf(&ctx, 0x4000_2000).pa, pa!(0x4000_2000));

    // make one page executable for EL0
    ctx.set_region_attributes(va!(0x4000_1000), 0x1000, MemAttr::CODE | MemAttr::USER)
        .unwrap();
    assert_eq!(
        ctx.get_region_attributes(va!(0x4000_1000)),
        Ok(MemAttr::USER)
    );
}

#[test]
fn test_set_attributes_keeps_type() {
    let mut ctx = ctx_with_pages();
    ctx.init();

    ctx.set_region_attributes(va!(0x900_0000), 0x1000, MemAttr::RO_DATA)
        .unwrap();
    assert_eq!(
        leaf(&ctx, 0x900_0000).attrs,
        MemAttr::DEVICE | MemAttr::EXECUTE_NEVER
    );
}

#[test]
fn test_break_before_make() {
    let mut ctx = ctx_with_pages();
    ctx.init();
    ctx.arch().take();

    ctx.set_region_attributes(va!(0x4000_2000), 0x1000, MemAttr::RO_DATA)
        .unwrap();
    assert_eq!(
        ctx.arch().take(),
        [
            Op::Clean,
            Op::StoreBarrier,
            Op::Invalidate(0x4000_2000),
            Op::Sync,
            Op::Clean,
            Op::StoreBarrier,
        ]
    );
}

#[test]
fn test_refuses_writable_executable() {
    let mut ctx = ctx_with_pages();
    ctx.init();
    let before = snapshot(&ctx);

    assert_eq!(
        ctx.set_region_attributes(va!(0x4000_0000), 0x1000, MemAttr::RW),
        Err(XlatError::PermissionDenied)
    );
    assert_eq!(
        ctx.set_region_attributes(va!(0x900_0000), 0x1000, MemAttr::CODE),
        Err(XlatError::PermissionDenied)
    );
    assert_eq!(snapshot(&ctx), before);
}

#[test]
fn test_set_attributes_invalid() {
    let mut ctx = ctx_with_pages();
    ctx.init();
    let before = snapshot(&ctx);
    ctx.arch().take();

    for (va, size) in [
        (0x4000_0800, 0x1000),
        (0x4000_0000, 0),
        (0x4000_0000, 0x1800),
        // last page unmapped
        (0x4000_0000, 0x5000),
        // mapped by a 2 MiB block
        (0x8000_0000, 0x1000),
        (0x7000_0000, 0x1000),
    ] {
        assert_eq!(
            ctx.set_region_attributes(va!(va), size, MemAttr::RO_DATA),
            Err(XlatError::InvalidArgument),
            "{va:#x} {size:#x}"
        );
    }
    assert_eq!(snapshot(&ctx), before);
    assert!(ctx.arch().take().is_empty());
}

#[test]
fn test_attributes_need_init() {
    let mut ctx = ctx_with_pages();
    assert_eq!(
        ctx.get_region_attributes(va!(0x4000_0000)),
        Err(XlatError::InvalidArgument)
    );
    assert_eq!(
        ctx.set_region_attributes(va!(0x4000_0000), 0x1000, MemAttr::RO_DATA),
        Err(XlatError::InvalidArgument)
    );
    assert!(ctx.arch().take().is_empty());

    ctx.init();
    assert_eq!(
        ctx.get_region_attributes(va!(0x4000_0000)),
        Ok(MemAttr::RW_DATA)
    );
}
