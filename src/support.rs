// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core helper functions for the Cortex-M0+ cores.

#[cfg(all(target_arch = "arm", target_os = "none"))]
pub fn nop() {
    use core::arch::asm;
    unsafe {
        asm!("nop", options(nomem, nostack, preserves_flags));
    }
}

/// Send an event to both cores.
#[cfg(all(target_arch = "arm", target_os = "none"))]
pub fn sev() {
    use core::arch::asm;
    unsafe {
        asm!("sev", options(nomem, nostack, preserves_flags));
    }
}

/// Sleep until an event is pending.
#[cfg(all(target_arch = "arm", target_os = "none"))]
pub fn wfe() {
    use core::arch::asm;
    unsafe {
        asm!("wfe", options(nomem, nostack, preserves_flags));
    }
}

/// Switch thread-mode execution to the process stack and jump to `entry`.
///
/// Sets PSP to `process_stack`, flips CONTROL.SPSEL so thread mode runs on
/// the process stack, rewinds MSP to `main_stack` (from here on the main
/// stack is only used by handlers) and branches to `entry`.
///
/// ## Safety
///
/// `process_stack` and `main_stack` must be the word-aligned tops of valid
/// stacks and `entry` must be the (thumb) address of a diverging function.
#[cfg(all(target_arch = "arm", target_os = "none"))]
pub unsafe fn switch_to_psp(process_stack: u32, main_stack: u32, entry: u32) -> ! {
    use core::arch::asm;
    asm!(
        "msr psp, {psp}",
        "mrs {tmp}, CONTROL",
        "movs {bit}, #2",
        "orrs {tmp}, {bit}",
        "msr CONTROL, {tmp}",
        "isb",
        "msr msp, {msp}",
        "bx {entry}",
        psp = in(reg) process_stack,
        msp = in(reg) main_stack,
        entry = in(reg) entry,
        tmp = out(reg) _,
        bit = out(reg) _,
        options(noreturn)
    )
}

/// Zero the memory between `start` (inclusive) and `end` (exclusive).
///
/// Used on the `.bss` section before any static is touched.
///
/// ## Safety
///
/// `start` and `end` must delimit a writable, word-aligned region, with
/// `start <= end`.
pub unsafe fn zero_bss(start: *mut u32, end: *mut u32) {
    let mut word = start;
    while word < end {
        core::ptr::write_volatile(word, 0);
        word = word.offset(1);
    }
}

// Mock implementations for tests on the host.
#[cfg(not(any(target_arch = "arm", target_os = "none")))]
pub fn nop() {
    unimplemented!()
}

#[cfg(not(any(target_arch = "arm", target_os = "none")))]
pub fn sev() {
    unimplemented!()
}

#[cfg(not(any(target_arch = "arm", target_os = "none")))]
pub fn wfe() {
    unimplemented!()
}

#[cfg(not(any(target_arch = "arm", target_os = "none")))]
pub unsafe fn switch_to_psp(_process_stack: u32, _main_stack: u32, _entry: u32) -> ! {
    unimplemented!()
}
