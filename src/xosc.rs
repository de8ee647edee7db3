// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Crystal oscillator.
//!
//! The XOSC drives the reference and PLL inputs once it reports stable. The
//! enable and disable values are magic constants; anything else written to
//! the ENABLE field sets the BADWRITE flag.

use tock_registers::interfaces::{ReadWriteable, Readable, Writeable};
use tock_registers::registers::ReadWrite;
use tock_registers::{register_bitfields, register_structs};

use crate::static_ref::StaticRef;
use crate::ATOMIC_SET_OFFSET;

register_structs! {
    XoscRegisters {
        /// Frequency range select and magic enable
        (0x000 => ctrl: ReadWrite<u32, CTRL::Register>),
        /// Oscillator status
        (0x004 => status: ReadWrite<u32, STATUS::Register>),
        /// Dormant mode control
        (0x008 => dormant: ReadWrite<u32>),
        /// Startup delay, in units of 256 crystal cycles
        (0x00c => startup: ReadWrite<u32, STARTUP::Register>),
        (0x010 => _reserved0),
        /// Down counter running at the crystal frequency
        (0x01c => count: ReadWrite<u32, COUNT::Register>),
        (0x020 => @END),
    }
}

register_bitfields![u32,
    CTRL [
        ENABLE OFFSET(12) NUMBITS(12) [
            Disable = 0xd1e,
            Enable = 0xfab
        ],
        FREQ_RANGE OFFSET(0) NUMBITS(12) [
            _1_15MHZ = 0xaa0
        ]
    ],
    STATUS [
        /// Oscillator is running and stable
        STABLE OFFSET(31) NUMBITS(1) [],
        /// An invalid value was written to CTRL.ENABLE or DORMANT (w1c)
        BADWRITE OFFSET(24) NUMBITS(1) [],
        ENABLED OFFSET(12) NUMBITS(1) [],
        FREQ_RANGE OFFSET(0) NUMBITS(2) []
    ],
    STARTUP [
        X4 OFFSET(20) NUMBITS(1) [],
        DELAY OFFSET(0) NUMBITS(14) []
    ],
    COUNT [
        COUNT OFFSET(0) NUMBITS(8) []
    ]
];

const XOSC_BASE_ADDRESS: usize = 0x40024000;

const XOSC_BASE: StaticRef<XoscRegisters> =
    unsafe { StaticRef::new(XOSC_BASE_ADDRESS as *const XoscRegisters) };

const XOSC_SET_BASE: StaticRef<XoscRegisters> =
    unsafe { StaticRef::new((XOSC_BASE_ADDRESS + ATOMIC_SET_OFFSET) as *const XoscRegisters) };

/// Startup delay register value: 1 ms worth of crystal cycles, divided by
/// 256 and rounded up.
pub(crate) fn startup_delay(crystal_hz: u32) -> u32 {
    ((crystal_hz / 1000) + 255) / 256
}

pub struct Xosc {
    registers: StaticRef<XoscRegisters>,
    set_registers: StaticRef<XoscRegisters>,
}

impl Xosc {
    pub const fn new() -> Xosc {
        Xosc {
            registers: XOSC_BASE,
            set_registers: XOSC_SET_BASE,
        }
    }

    /// Start the crystal oscillator and wait until it reports stable.
    pub fn init(&self, crystal_hz: u32) {
        self.registers.ctrl.write(CTRL::FREQ_RANGE::_1_15MHZ);
        self.registers
            .startup
            .write(STARTUP::DELAY.val(startup_delay(crystal_hz)));
        // Atomic set so the frequency range field keeps its value.
        self.set_registers.ctrl.write(CTRL::ENABLE::Enable);
        while !self.registers.status.is_set(STATUS::STABLE) {}
    }

    /// Stop the oscillator. The caller must have moved every clock off the
    /// XOSC (and the PLLs it feeds) first.
    pub fn disable(&self) {
        self.registers.ctrl.modify(CTRL::ENABLE::Disable);
    }
}

#[cfg(test)]
mod tests {
    use super::startup_delay;

    #[test]
    fn startup_delay_rounds_up_to_256_cycle_units() {
        // 12 MHz crystal: 12_000 cycles per millisecond -> ceil(12000 / 256)
        assert_eq!(startup_delay(12_000_000), 47);
        // 15 MHz: ceil(15000 / 256)
        assert_eq!(startup_delay(15_000_000), 59);
        // Exact multiple does not round up further.
        assert_eq!(startup_delay(256 * 1000 * 4), 4);
    }
}
