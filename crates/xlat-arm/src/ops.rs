use xlat_interface::{ArchOps, Regime, VirtAddr, MAX_PA_SPACE_SIZE};

#[cfg(target_arch = "aarch64")]
use aarch64_cpu::{asm::barrier, registers::*};
#[cfg(target_arch = "aarch64")]
use core::arch::asm;

/// Maintenance operations of the running AArch64 core.
///
/// On other targets every operation is a no-op, the MMU reads as disabled
/// and the full 48-bit physical address range is reported, so that the table
/// engine can be exercised on a host.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArmOps;

#[cfg(target_arch = "aarch64")]
pub fn dcache_line_size() -> usize {
    let ctr: usize;
    unsafe { asm!("mrs {}, ctr_el0", out(reg) ctr) };
    // DminLine is log2 of the number of words in the smallest line.
    4 << ((ctr >> 16) & 0xf)
}

/// PARange encodings of ID_AA64MMFR0_EL1.
#[cfg(target_arch = "aarch64")]
const PA_RANGE_BITS: [usize; 7] = [32, 36, 40, 42, 44, 48, 52];

impl ArchOps for ArmOps {
    fn invalidate_va(&self, vaddr: VirtAddr, regime: Regime) {
        #[cfg(target_arch = "aarch64")]
        {
            let page = vaddr.as_usize() >> xlat_interface::PAGE_SHIFT;
            unsafe {
                match regime {
                    Regime::El1El0 => asm!("tlbi vaae1is, {}", in(reg) page),
                    Regime::El2 => asm!("tlbi vae2is, {}", in(reg) page),
                    Regime::El3 => asm!("tlbi vae3is, {}", in(reg) page),
                }
            }
        }
        #[cfg(not(target_arch = "aarch64"))]
        let _ = (vaddr, regime);
    }

    fn invalidate_sync(&self) {
        #[cfg(target_arch = "aarch64")]
        {
            barrier::dsb(barrier::ISH);
            barrier::isb(barrier::SY);
        }
    }

    fn store_barrier(&self) {
        #[cfg(target_arch = "aarch64")]
        barrier::dsb(barrier::ISHST);
    }

    fn clean_dcache_range(&self, addr: usize, size: usize) {
        #[cfg(target_arch = "aarch64")]
        {
            let line_size = dcache_line_size();
            let start = addr & !(line_size - 1);
            let end = (addr + size + line_size - 1) & !(line_size - 1);
            for line in (start..end).step_by(line_size) {
                unsafe { asm!("dc cvac, {0}", in(reg) line) };
            }
            barrier::dsb(barrier::ISH);
        }
        #[cfg(not(target_arch = "aarch64"))]
        let _ = (addr, size);
    }

    fn mmu_enabled(&self, regime: Regime) -> bool {
        #[cfg(target_arch = "aarch64")]
        {
            match regime {
                Regime::El1El0 => SCTLR_EL1.is_set(SCTLR_EL1::M),
                Regime::El2 => SCTLR_EL2.is_set(SCTLR_EL2::M),
                Regime::El3 => {
                    let sctlr: u64;
                    unsafe { asm!("mrs {}, sctlr_el3", out(reg) sctlr) };
                    sctlr & 1 != 0
                }
            }
        }
        #[cfg(not(target_arch = "aarch64"))]
        {
            let _ = regime;
            false
        }
    }

    fn max_supported_pa(&self) -> usize {
        #[cfg(target_arch = "aarch64")]
        {
            let mmfr0: usize;
            unsafe { asm!("mrs {}, id_aa64mmfr0_el1", out(reg) mmfr0) };
            // 52-bit output needs the 64 KiB granule, so 4 KiB tables top out at 48.
            let bits = PA_RANGE_BITS.get(mmfr0 & 0xf).copied().unwrap_or(48);
            ((1usize << bits) - 1).min(MAX_PA_SPACE_SIZE - 1)
        }
        #[cfg(not(target_arch = "aarch64"))]
        {
            MAX_PA_SPACE_SIZE - 1
        }
    }
}
