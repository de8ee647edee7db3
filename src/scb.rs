// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! ARMv6-M System Control Block.
//!
//! Only the registers present on the Cortex-M0+ are mapped; SHPR1 does not
//! exist on ARMv6-M (SVCall, PendSV and SysTick are the only configurable
//! priorities).

use tock_registers::interfaces::Writeable;
use tock_registers::registers::{ReadOnly, ReadWrite};
use tock_registers::{register_bitfields, register_structs};

use crate::static_ref::StaticRef;

register_structs! {
    ScbRegisters {
        /// CPUID base register
        (0x00 => cpuid: ReadOnly<u32>),
        /// Interrupt control and state register
        (0x04 => icsr: ReadWrite<u32, InterruptControlAndState::Register>),
        /// Vector table offset register
        (0x08 => vtor: ReadWrite<u32, VectorTableOffset::Register>),
        /// Application interrupt and reset control register
        (0x0c => aircr: ReadWrite<u32, ApplicationInterruptAndReset::Register>),
        /// System control register
        (0x10 => scr: ReadWrite<u32>),
        /// Configuration and control register (read-only on ARMv6-M)
        (0x14 => ccr: ReadOnly<u32>),
        (0x18 => _reserved0),
        /// System handler priority register 2 (SVCall)
        (0x1c => shpr2: ReadWrite<u32, SystemHandlerPriority2::Register>),
        /// System handler priority register 3 (PendSV, SysTick)
        (0x20 => shpr3: ReadWrite<u32, SystemHandlerPriority3::Register>),
        /// System handler control and state register
        (0x24 => shcsr: ReadWrite<u32>),
        (0x28 => @END),
    }
}

register_bitfields![u32,
    InterruptControlAndState [
        NMIPENDSET OFFSET(31) NUMBITS(1) [],
        PENDSVSET OFFSET(28) NUMBITS(1) [],
        PENDSVCLR OFFSET(27) NUMBITS(1) [],
        PENDSTSET OFFSET(26) NUMBITS(1) [],
        PENDSTCLR OFFSET(25) NUMBITS(1) [],
        VECTPENDING OFFSET(12) NUMBITS(9) [],
        VECTACTIVE OFFSET(0) NUMBITS(9) []
    ],
    VectorTableOffset [
        TBLOFF OFFSET(8) NUMBITS(24) []
    ],
    ApplicationInterruptAndReset [
        VECTKEY OFFSET(16) NUMBITS(16) [],
        ENDIANNESS OFFSET(15) NUMBITS(1) [],
        SYSRESETREQ OFFSET(2) NUMBITS(1) [],
        VECTCLRACTIVE OFFSET(1) NUMBITS(1) []
    ],
    SystemHandlerPriority2 [
        /// SVCall priority
        PRI_11 OFFSET(30) NUMBITS(2) []
    ],
    SystemHandlerPriority3 [
        /// SysTick priority
        PRI_15 OFFSET(30) NUMBITS(2) [],
        /// PendSV priority
        PRI_14 OFFSET(22) NUMBITS(2) []
    ]
];

const SCB_BASE: StaticRef<ScbRegisters> =
    unsafe { StaticRef::new(0xe000ed00 as *const ScbRegisters) };

pub struct Scb {
    registers: StaticRef<ScbRegisters>,
}

impl Scb {
    pub const fn new() -> Scb {
        Scb {
            registers: SCB_BASE,
        }
    }

    /// Relocate the vector table. `address` must be 256-byte aligned.
    pub unsafe fn set_vector_table_offset(&self, address: u32) {
        self.registers.vtor.set(address);
    }

    /// SVCall at the highest priority, PendSV and SysTick at the lowest.
    ///
    /// Both cores run this once during their startup, before any exception
    /// can be taken.
    pub fn configure_exception_priorities(&self) {
        self.registers.shpr2.write(SystemHandlerPriority2::PRI_11.val(0));
        self.registers.shpr3.write(
            SystemHandlerPriority3::PRI_14.val(0b11) + SystemHandlerPriority3::PRI_15.val(0b11),
        );
    }

    /// Request a system reset of the core.
    pub fn system_reset(&self) {
        self.registers.aircr.write(
            ApplicationInterruptAndReset::VECTKEY.val(0x05fa)
                + ApplicationInterruptAndReset::SYSRESETREQ::SET,
        );
    }
}
