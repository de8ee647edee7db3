// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Watchdog and its tick generator.
//!
//! Besides the countdown itself the watchdog block houses the tick
//! generator that feeds the timer; the boot path disables the countdown and
//! starts the tick so the timer can be released.

use tock_registers::interfaces::{Readable, Writeable};
use tock_registers::registers::{ReadOnly, ReadWrite};
use tock_registers::{register_bitfields, register_structs};

use crate::static_ref::StaticRef;
use crate::ATOMIC_CLEAR_OFFSET;

register_structs! {
    WatchdogRegisters {
        /// Countdown control and time remaining
        (0x000 => ctrl: ReadWrite<u32, CTRL::Register>),
        /// Load the countdown timer, in microseconds
        (0x004 => load: ReadWrite<u32>),
        /// Why the last reset happened
        (0x008 => reason: ReadOnly<u32, REASON::Register>),
        /// Scratch registers, preserved over a watchdog reset
        (0x00c => scratch: [ReadWrite<u32>; 8]),
        /// Tick generator control
        (0x02c => tick: ReadWrite<u32, TICK::Register>),
        (0x030 => @END),
    }
}

register_bitfields![u32,
    CTRL [
        /// Trigger a watchdog reset immediately
        TRIGGER OFFSET(31) NUMBITS(1) [],
        /// Watchdog is running
        ENABLE OFFSET(30) NUMBITS(1) [],
        /// Pause the countdown while debugger access is active
        PAUSE_DBG1 OFFSET(26) NUMBITS(1) [],
        PAUSE_DBG0 OFFSET(25) NUMBITS(1) [],
        PAUSE_JTAG OFFSET(24) NUMBITS(1) [],
        /// Time remaining, in tick halves
        TIME OFFSET(0) NUMBITS(24) []
    ],
    REASON [
        FORCE OFFSET(1) NUMBITS(1) [],
        TIMER OFFSET(0) NUMBITS(1) []
    ],
    TICK [
        /// Count of ticks since the generator started
        COUNT OFFSET(11) NUMBITS(9) [],
        /// Tick generator is running
        RUNNING OFFSET(10) NUMBITS(1) [],
        ENABLE OFFSET(9) NUMBITS(1) [],
        /// Clock cycles per tick
        CYCLES OFFSET(0) NUMBITS(9) []
    ]
];

const WATCHDOG_BASE_ADDRESS: usize = 0x40058000;

const WATCHDOG_BASE: StaticRef<WatchdogRegisters> =
    unsafe { StaticRef::new(WATCHDOG_BASE_ADDRESS as *const WatchdogRegisters) };

const WATCHDOG_CLEAR_BASE: StaticRef<WatchdogRegisters> = unsafe {
    StaticRef::new((WATCHDOG_BASE_ADDRESS + ATOMIC_CLEAR_OFFSET) as *const WatchdogRegisters)
};

pub struct Watchdog {
    registers: StaticRef<WatchdogRegisters>,
    clear_registers: StaticRef<WatchdogRegisters>,
}

impl Watchdog {
    pub const fn new() -> Watchdog {
        Watchdog {
            registers: WATCHDOG_BASE,
            clear_registers: WATCHDOG_CLEAR_BASE,
        }
    }

    /// Stop the countdown. Atomic clear, the rest of CTRL is untouched.
    pub fn disable(&self) {
        self.clear_registers.ctrl.write(CTRL::ENABLE::SET);
    }

    /// Start the tick generator at one tick per `cycles` reference-clock
    /// cycles (12 for a 1 MHz timebase from a 12 MHz crystal) and wait
    /// until it reports running.
    pub fn start_tick(&self, cycles: u32) {
        self.registers
            .tick
            .write(TICK::ENABLE::SET + TICK::CYCLES.val(cycles));
        while !self.registers.tick.is_set(TICK::RUNNING) {}
    }

    /// The reset reason latched by the last watchdog event, if any.
    pub fn fired(&self) -> bool {
        self.registers.reason.is_set(REASON::TIMER)
            || self.registers.reason.is_set(REASON::FORCE)
    }
}
