//! # Multiboot2 Entry
//!
//! The boot loader enters `_start` in 32-bit protected mode with paging off,
//! `EAX` holding the multiboot2 magic and `EBX` the physical address of the
//! boot information. The stub builds the first page table hierarchy, enters
//! long mode and calls [`kernel_main`](crate::entry::kernel_main) with the
//! boot information address.
//!
//! The first hierarchy identity-maps the lowest GiB with 2 MiB pages and
//! points slot 511 of its level-4 table at itself; that is all the memory
//! core needs to take over.
//!
//! ```text
//! BOOT_MEMORY  ┌──────────────┐
//!              │ level 2      │
//!              │ level 3      │
//!              │ level 4      │  ◄─ becomes the guard page
//!              │ stack        │
//!              └──────────────┘  ◄─ initial RSP
//! ```

use crate::entry::kernel_main;
use core::mem::offset_of;
use kernel_info::memory::BOOT_STACK_SIZE;

const MULTIBOOT2_HEADER_MAGIC: u32 = 0xe852_50d6;
const MULTIBOOT2_BOOTLOADER_MAGIC: u32 = 0x36d7_6289;

/// Boot page tables with the boot stack directly above the level-4 table.
#[allow(dead_code)]
#[repr(C, align(4096))]
struct BootMemory {
    p2: [u64; 512],
    p3: [u64; 512],
    p4: [u64; 512],
    stack: [u8; BOOT_STACK_SIZE],
}

/// Written by the entry stub only.
#[unsafe(link_section = ".bss.boot")]
#[unsafe(no_mangle)]
static mut BOOT_MEMORY: BootMemory = BootMemory {
    p2: [0; 512],
    p3: [0; 512],
    p4: [0; 512],
    stack: [0; BOOT_STACK_SIZE],
};

const _: () = {
    assert!(offset_of!(BootMemory, stack) == offset_of!(BootMemory, p4) + 4096);
    assert!(size_of::<BootMemory>() % 16 == 0);
};

core::arch::global_asm!(
    r#"
    .section .multiboot_header, "a"
    .balign 8
multiboot_header_start:
    .long {header_magic}
    .long 0
    .long multiboot_header_end - multiboot_header_start
    .long 0x100000000 - ({header_magic} + (multiboot_header_end - multiboot_header_start))
    .short 0
    .short 0
    .long 8
multiboot_header_end:

    .section .text.boot, "ax"
    .code32
    .global _start
_start:
    cmpl ${loader_magic}, %eax
    jne 3f
    movl %ebx, %edi
    movl ${memory} + {stack_top}, %esp

    movl ${memory} + {p3}, %eax
    orl $0b11, %eax
    movl %eax, {memory} + {p4}
    movl ${memory} + {p4}, %eax
    orl $0b11, %eax
    movl %eax, {memory} + {p4} + 511 * 8

    movl ${memory} + {p2}, %eax
    orl $0b11, %eax
    movl %eax, {memory} + {p3}

    xorl %ecx, %ecx
2:
    movl $0x200000, %eax
    mull %ecx
    orl $0b10000011, %eax
    movl %eax, {memory} + {p2}(,%ecx,8)
    incl %ecx
    cmpl $512, %ecx
    jne 2b

    movl ${memory} + {p4}, %eax
    movl %eax, %cr3
    movl %cr4, %eax
    orl $(1 << 5), %eax
    movl %eax, %cr4
    movl $0xc0000080, %ecx
    rdmsr
    orl $(1 << 8), %eax
    wrmsr
    movl %cr0, %eax
    orl $0x80000000, %eax
    movl %eax, %cr0

    lgdt boot_gdt_pointer
    ljmp $8, $long_mode_start
3:
    hlt
    jmp 3b

    .code64
long_mode_start:
    xorw %ax, %ax
    movw %ax, %ss
    movw %ax, %ds
    movw %ax, %es
    movw %ax, %fs
    movw %ax, %gs
    movl %edi, %edi
    call {kernel_main}
4:
    cli
    hlt
    jmp 4b

    .section .rodata.boot, "a"
    .balign 8
boot_gdt:
    .quad 0
    .quad (1 << 43) | (1 << 44) | (1 << 47) | (1 << 53)
boot_gdt_pointer:
    .short boot_gdt_pointer - boot_gdt - 1
    .quad boot_gdt
"#,
    header_magic = const MULTIBOOT2_HEADER_MAGIC,
    loader_magic = const MULTIBOOT2_BOOTLOADER_MAGIC,
    memory = sym BOOT_MEMORY,
    p2 = const offset_of!(BootMemory, p2),
    p3 = const offset_of!(BootMemory, p3),
    p4 = const offset_of!(BootMemory, p4),
    stack_top = const size_of::<BootMemory>(),
    kernel_main = sym kernel_main,
    options(att_syntax)
);
