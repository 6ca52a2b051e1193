use spin::{Mutex, MutexGuard, Once};

use crate::Context;

/// A [`Context`] kept in a static and set up once at a known point of boot.
///
/// The context, table pool included, is built at compile time and never
/// passes through the stack.
///
/// ```ignore
/// static XLAT: GlobalContext<Vmsav8, ArmOps, 16, 32> =
///     GlobalContext::new(Context::new_const(Regime::El3, 1 << 32, 1 << 32, ArmOps));
///
/// XLAT.init_once(|ctx| {
///     ctx.add_static_region(Region::flat(pa!(0x8000_0000), 0x20_0000, MemAttr::CODE))
///         .unwrap();
///     ctx.init();
/// });
/// ```
pub struct GlobalContext<C, A, const REGIONS: usize, const TABLES: usize> {
    ctx: Mutex<Context<C, A, REGIONS, TABLES>>,
    ready: Once,
}

impl<C, A, const REGIONS: usize, const TABLES: usize> GlobalContext<C, A, REGIONS, TABLES> {
    pub const fn new(ctx: Context<C, A, REGIONS, TABLES>) -> Self {
        Self {
            ctx: Mutex::new(ctx),
            ready: Once::new(),
        }
    }

    /// Runs the boot setup `f` on the context unless that already happened.
    ///
    /// `f` runs with the context locked and must not call back into `self`.
    pub fn init_once(
        &self,
        f: impl FnOnce(&mut Context<C, A, REGIONS, TABLES>),
    ) -> &Mutex<Context<C, A, REGIONS, TABLES>> {
        self.ready.call_once(|| f(&mut *self.ctx.lock()));
        &self.ctx
    }

    pub fn get(&self) -> Option<&Mutex<Context<C, A, REGIONS, TABLES>>> {
        self.ready.is_completed().then_some(&self.ctx)
    }

    /// # Panics
    ///
    /// Panics if [`GlobalContext::init_once`] has not run.
    pub fn lock(&self) -> MutexGuard<'_, Context<C, A, REGIONS, TABLES>> {
        match self.get() {
            Some(ctx) => ctx.lock(),
            None => panic!("translation context used before init_once"),
        }
    }
}
