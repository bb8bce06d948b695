//! # Kernel Entry Point

use crate::memory::{self, KernelMemory};
use core::panic::PanicInfo;
use kernel_alloc::KernelHeap;
use kernel_info::memory::{HEAP_SIZE, HEAP_START};
use kernel_info::multiboot2::Multiboot2Info;
use kernel_qemu::{QemuLogger, qemu_trace};
use kernel_sync::{SpinLock, SyncOnceCell};
use kernel_vmem::HardwareMmu;
use log::{LevelFilter, debug, error, info};

extern crate alloc;

#[global_allocator]
static HEAP: KernelHeap = KernelHeap::new();

/// Paging state after boot.
static MEMORY: SyncOnceCell<SpinLock<KernelMemory<HardwareMmu>>> = SyncOnceCell::new();

/// Called by the entry stub in long mode, on the boot stack, with the
/// physical address of the multiboot2 information.
pub extern "C" fn kernel_main(multiboot_info: u64) -> ! {
    if QemuLogger::new(LevelFilter::Debug).init().is_err() {
        qemu_trace!("logger already installed\n");
    }
    info!("Kernel booted!");

    let boot = unsafe { Multiboot2Info::from_address(multiboot_info) }
        .unwrap_or_else(|err| panic!("invalid multiboot information: {err}"));
    let mmu = unsafe { HardwareMmu::new() };
    let memory = memory::init_mm(mmu, &boot);

    #[allow(clippy::cast_possible_truncation)]
    unsafe {
        HEAP.init(HEAP_START as usize, HEAP_SIZE as usize);
    }
    if MEMORY.set(SpinLock::new(memory)).is_err() {
        panic!("memory initialized twice");
    }

    exercise_heap();
    report_memory();
    info!("halting");
    halt()
}

fn exercise_heap() {
    use alloc::boxed::Box;
    use alloc::vec;

    let x = Box::new(0_u32);
    let y = vec![0_u32; 4];
    debug!("Allocated pointer x: {:p}", x);
    debug!("Allocated pointer y: {:p}", y.as_ptr());
    drop(y);
    drop(x);
    debug!("heap: {} bytes free", HEAP.free_bytes());
}

fn report_memory() {
    let Some(memory) = MEMORY.get() else {
        return;
    };
    memory.with_lock(|memory| {
        info!(
            "next free frame at {:?} of {:?}, {} temp frames available",
            memory.frames.next_free_frame(),
            memory.frames.end_of_memory(),
            memory.temp.available()
        );
    });
}

fn halt() -> ! {
    loop {
        unsafe { core::arch::asm!("cli", "hlt", options(nomem, nostack)) };
    }
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    error!("{info}");
    halt()
}
