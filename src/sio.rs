// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Single-cycle IO block.
//!
//! Core-local registers on the processor bus: the CPUID register, the
//! single-cycle GPIO out/oe registers and the inter-core mailbox FIFOs.
//! This block has no atomic alias windows; set/clear/xor exist as separate
//! registers instead.

use tock_registers::interfaces::{Readable, Writeable};
use tock_registers::registers::{ReadOnly, ReadWrite};
use tock_registers::{register_bitfields, register_structs};

use crate::static_ref::StaticRef;
use crate::support;

register_structs! {
    SioRegisters {
        /// Processor core identifier: 0 on core 0, 1 on core 1
        (0x000 => cpuid: ReadOnly<u32>),
        /// Input value for GPIO0..29
        (0x004 => gpio_in: ReadOnly<u32>),
        (0x008 => _reserved0),
        /// GPIO output value
        (0x010 => gpio_out: ReadWrite<u32>),
        /// GPIO output value set
        (0x014 => gpio_out_set: ReadWrite<u32>),
        /// GPIO output value clear
        (0x018 => gpio_out_clr: ReadWrite<u32>),
        /// GPIO output value XOR
        (0x01c => gpio_out_xor: ReadWrite<u32>),
        /// GPIO output enable
        (0x020 => gpio_oe: ReadWrite<u32>),
        /// GPIO output enable set
        (0x024 => gpio_oe_set: ReadWrite<u32>),
        /// GPIO output enable clear
        (0x028 => gpio_oe_clr: ReadWrite<u32>),
        /// GPIO output enable XOR
        (0x02c => gpio_oe_xor: ReadWrite<u32>),
        (0x030 => _reserved1),
        /// Status of the inter-core FIFOs
        (0x050 => fifo_st: ReadWrite<u32, FIFO_ST::Register>),
        /// Write access to this core's outgoing FIFO
        (0x054 => fifo_wr: ReadWrite<u32>),
        /// Read access to this core's incoming FIFO
        (0x058 => fifo_rd: ReadOnly<u32>),
        /// Spinlock state, one bit per lock
        (0x05c => spinlock_st: ReadOnly<u32>),
        (0x060 => @END),
    }
}

register_bitfields![u32,
    FIFO_ST [
        /// Incoming FIFO read when empty (sticky, w1c)
        ROE OFFSET(3) NUMBITS(1) [],
        /// Outgoing FIFO written when full (sticky, w1c)
        WOF OFFSET(2) NUMBITS(1) [],
        /// Outgoing FIFO has room for a new value
        RDY OFFSET(1) NUMBITS(1) [],
        /// Incoming FIFO holds valid data
        VLD OFFSET(0) NUMBITS(1) []
    ]
];

const SIO_BASE: StaticRef<SioRegisters> =
    unsafe { StaticRef::new(0xd0000000 as *const SioRegisters) };

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Processor {
    Processor0 = 0,
    Processor1 = 1,
}

/// This core's end of the inter-core mailbox, abstracted so the launch
/// handshake can be driven against a scripted peer.
pub trait InterCoreFifo {
    /// Outgoing FIFO has room for another word.
    fn fifo_ready(&self) -> bool;
    /// Incoming FIFO holds at least one word.
    fn fifo_valid(&self) -> bool;
    fn write_fifo(&self, value: u32);
    fn read_fifo(&self) -> u32;
    /// Wake the other core if it is sleeping in WFE.
    fn signal_event(&self);
}

pub struct Sio {
    registers: StaticRef<SioRegisters>,
}

impl Sio {
    pub const fn new() -> Sio {
        Sio {
            registers: SIO_BASE,
        }
    }

    /// Identity of the core executing this call.
    pub fn get_processor(&self) -> Processor {
        match self.registers.cpuid.get() {
            0 => Processor::Processor0,
            1 => Processor::Processor1,
            id => panic!("SIO CPUID returned unknown processor {}", id),
        }
    }

    /// Clear the sticky FIFO overflow/underflow flags.
    pub fn clear_fifo_status(&self) {
        self.registers
            .fifo_st
            .write(FIFO_ST::ROE::SET + FIFO_ST::WOF::SET);
    }

    pub(crate) fn gpio_set(&self, pin: usize) {
        self.registers.gpio_out_set.set(1 << pin);
    }

    pub(crate) fn gpio_clear(&self, pin: usize) {
        self.registers.gpio_out_clr.set(1 << pin);
    }

    pub(crate) fn gpio_toggle(&self, pin: usize) {
        self.registers.gpio_out_xor.set(1 << pin);
    }

    pub(crate) fn gpio_oe_set(&self, pin: usize) {
        self.registers.gpio_oe_set.set(1 << pin);
    }

    pub(crate) fn gpio_oe_clear(&self, pin: usize) {
        self.registers.gpio_oe_clr.set(1 << pin);
    }

    pub(crate) fn gpio_read(&self, pin: usize) -> bool {
        self.registers.gpio_in.get() & (1 << pin) != 0
    }
}

impl InterCoreFifo for Sio {
    fn fifo_ready(&self) -> bool {
        self.registers.fifo_st.is_set(FIFO_ST::RDY)
    }

    fn fifo_valid(&self) -> bool {
        self.registers.fifo_st.is_set(FIFO_ST::VLD)
    }

    fn write_fifo(&self, value: u32) {
        self.registers.fifo_wr.set(value);
    }

    fn read_fifo(&self) -> u32 {
        self.registers.fifo_rd.get()
    }

    fn signal_event(&self) {
        support::sev();
    }
}
