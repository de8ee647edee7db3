// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bare-metal chip support for the Raspberry Pi RP2040.
//!
//! Covers the boot path of the chip: vector tables, BSS initialization,
//! crystal and PLL bring-up with glitch-free clock switching, watchdog and
//! tick setup, and the mailbox handshake that releases core 1 from the boot
//! ROM. Peripheral drivers are limited to the blocks the boot path touches
//! (reset controller, clock tree, SIO, watchdog, UART, GPIO).

#![no_std]

pub mod clocks;
pub mod gpio;
pub mod multicore;
pub mod resets;
pub mod scb;
pub mod sio;
pub mod support;
pub mod uart;
pub mod watchdog;
pub mod xosc;

mod static_ref;

pub use static_ref::StaticRef;

use crate::clocks::{
    ClockPlan, Clocks, Pll, PeripheralAuxiliaryClockSource, SystemAuxiliaryClockSource,
    SystemClockSource, UsbAuxiliaryClockSource,
};
use crate::resets::{Peripheral, ResetControl, Resets};
use crate::scb::Scb;
use crate::watchdog::Watchdog;
use crate::xosc::Xosc;

/// Offsets of the atomic register alias windows carried by every APB
/// peripheral (but not by the SIO). A write of `mask` to an alias performs
/// the named operation on the underlying register without a read-modify-
/// write cycle.
pub const ATOMIC_XOR_OFFSET: usize = 0x1000;
pub const ATOMIC_SET_OFFSET: usize = 0x2000;
pub const ATOMIC_CLEAR_OFFSET: usize = 0x3000;

/// Core 0 boot-time bring-up. Must run before interrupts are enabled and
/// before anything relies on the timer or a peripheral clock.
///
/// Order matters throughout: the clock tree is parked on the crystal before
/// either PLL is touched, the system clock moves onto the system PLL only
/// after it reports lock, and the timer is released only once the tick
/// generator runs.
///
/// ## Safety
///
/// Must run exactly once, on core 0, before the rest of the crate is used.
pub unsafe fn init(plan: &ClockPlan) {
    let resets = Resets::new();
    let xosc = Xosc::new();
    let clocks = Clocks::new();
    let watchdog = Watchdog::new();
    let scb = Scb::new();

    // Everything onto the crystal; safe operating point for PLL work.
    clocks.init(&xosc, plan.crystal_hz);

    plan.sys_pll.validate(plan.crystal_hz);
    clocks::configure_pll(&Pll::sys(), &resets, &plan.sys_pll);
    let sys_hz = plan.sys_pll.frequency(plan.crystal_hz);
    clocks.configure_system(
        SystemClockSource::Auxiliary,
        SystemAuxiliaryClockSource::PllSys,
        sys_hz,
        sys_hz,
    );
    // The peripheral clock keeps tracking the system clock.
    clocks.configure_peripheral(PeripheralAuxiliaryClockSource::System, sys_hz);

    plan.usb_pll.validate(plan.crystal_hz);
    clocks::configure_pll(&Pll::usb(), &resets, &plan.usb_pll);
    let usb_hz = plan.usb_pll.frequency(plan.crystal_hz);
    clocks.configure_usb(UsbAuxiliaryClockSource::PllUsb, usb_hz, usb_hz);

    watchdog.disable();
    scb.configure_exception_priorities();

    resets.release(Peripheral::IOBank0);
    resets.release(Peripheral::PadsBank0);

    // 1 MHz timebase for the timer, then let the timer out of reset.
    watchdog.start_tick(plan.crystal_hz / 1_000_000);
    resets.release(Peripheral::Timer);
}

/// Core 1 side of the bring-up: exception priorities only. The clock tree
/// is shared and already configured by core 0.
pub fn init_core1() {
    Scb::new().configure_exception_priorities();
}

#[cfg(all(target_arch = "arm", target_os = "none"))]
extern "C" {
    // Symbols defined in the linker script.

    /// Top of core 0's main stack.
    fn _estack();
    /// Top of core 0's process stack.
    static _epstack: u32;
    /// Start of the region to zero at boot.
    static mut _szero: u32;
    /// End of the region to zero at boot.
    static mut _ezero: u32;

    /// Application entry point, entered on the process stack.
    fn main() -> !;
}

/// First instruction executed on core 0 after the boot ROM.
#[cfg(all(target_arch = "arm", target_os = "none"))]
#[no_mangle]
pub unsafe extern "C" fn reset_handler() {
    support::zero_bss(
        core::ptr::addr_of_mut!(_szero),
        core::ptr::addr_of_mut!(_ezero),
    );

    init(&ClockPlan::pico());

    support::switch_to_psp(
        core::ptr::addr_of!(_epstack) as u32,
        _estack as usize as u32,
        main as usize as u32,
    )
}

#[cfg(all(target_arch = "arm", target_os = "none"))]
unsafe extern "C" fn unhandled_exception() {
    loop {
        support::nop();
    }
}

#[cfg(all(target_arch = "arm", target_os = "none"))]
unsafe extern "C" fn unhandled_interrupt() {
    loop {
        support::nop();
    }
}

/// The sixteen ARMv6-M exception vectors.
#[cfg(all(target_arch = "arm", target_os = "none"))]
#[link_section = ".vectors"]
#[used]
pub static BASE_VECTORS: [unsafe extern "C" fn(); 16] = [
    _estack,             // Initial main stack pointer
    reset_handler,       // Reset
    unhandled_exception, // NMI
    unhandled_exception, // Hard fault
    unhandled_exception, // Reserved
    unhandled_exception, // Reserved
    unhandled_exception, // Reserved
    unhandled_exception, // Reserved
    unhandled_exception, // Reserved
    unhandled_exception, // Reserved
    unhandled_exception, // Reserved
    unhandled_exception, // SVCall
    unhandled_exception, // Reserved
    unhandled_exception, // Reserved
    unhandled_exception, // PendSV
    unhandled_exception, // SysTick
];

/// The 32 RP2040 interrupt vectors, placed directly after the exception
/// vectors. Applications install their own table through VTOR.
#[cfg(all(target_arch = "arm", target_os = "none"))]
#[link_section = ".irqs"]
#[used]
pub static IRQS: [unsafe extern "C" fn(); 32] = [unhandled_interrupt; 32];
