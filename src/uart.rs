// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Polled PL011 UART driver, 8N1 with FIFOs.

use tock_registers::interfaces::{Readable, Writeable};
use tock_registers::registers::{ReadOnly, ReadWrite, WriteOnly};
use tock_registers::{register_bitfields, register_structs};

use crate::resets::{Peripheral, ResetControl};
use crate::static_ref::StaticRef;

register_structs! {
    UartRegisters {
        /// Data, with receive status in the upper bits
        (0x000 => dr: ReadWrite<u32, DR::Register>),
        /// Receive status / error clear
        (0x004 => rsr: ReadWrite<u32>),
        (0x008 => _reserved0),
        /// Flags
        (0x018 => fr: ReadOnly<u32, FR::Register>),
        (0x01c => _reserved1),
        /// IrDA low-power counter
        (0x020 => ilpr: ReadWrite<u32>),
        /// Integer baud rate divisor
        (0x024 => ibrd: ReadWrite<u32>),
        /// Fractional baud rate divisor (1/64ths)
        (0x028 => fbrd: ReadWrite<u32>),
        /// Line control
        (0x02c => lcr_h: ReadWrite<u32, LCR_H::Register>),
        /// Control
        (0x030 => cr: ReadWrite<u32, CR::Register>),
        /// Interrupt FIFO level select
        (0x034 => ifls: ReadWrite<u32>),
        /// Interrupt mask
        (0x038 => imsc: ReadWrite<u32>),
        /// Raw interrupt status
        (0x03c => ris: ReadOnly<u32>),
        /// Masked interrupt status
        (0x040 => mis: ReadOnly<u32>),
        /// Interrupt clear
        (0x044 => icr: WriteOnly<u32>),
        /// DMA control
        (0x048 => dmacr: ReadWrite<u32>),
        (0x04c => @END),
    }
}

register_bitfields![u32,
    DR [
        OE OFFSET(11) NUMBITS(1) [],
        BE OFFSET(10) NUMBITS(1) [],
        PE OFFSET(9) NUMBITS(1) [],
        FE OFFSET(8) NUMBITS(1) [],
        DATA OFFSET(0) NUMBITS(8) []
    ],
    FR [
        /// Transmit FIFO empty
        TXFE OFFSET(7) NUMBITS(1) [],
        /// Receive FIFO full
        RXFF OFFSET(6) NUMBITS(1) [],
        /// Transmit FIFO full
        TXFF OFFSET(5) NUMBITS(1) [],
        /// Receive FIFO empty
        RXFE OFFSET(4) NUMBITS(1) [],
        /// Transmitter busy
        BUSY OFFSET(3) NUMBITS(1) [],
        CTS OFFSET(0) NUMBITS(1) []
    ],
    LCR_H [
        /// Stick parity select
        SPS OFFSET(7) NUMBITS(1) [],
        /// Word length
        WLEN OFFSET(5) NUMBITS(2) [
            Bits5 = 0,
            Bits6 = 1,
            Bits7 = 2,
            Bits8 = 3
        ],
        /// Enable FIFOs
        FEN OFFSET(4) NUMBITS(1) [],
        /// Two stop bits select
        STP2 OFFSET(3) NUMBITS(1) [],
        /// Even parity select
        EPS OFFSET(2) NUMBITS(1) [],
        /// Parity enable
        PEN OFFSET(1) NUMBITS(1) [],
        /// Send break
        BRK OFFSET(0) NUMBITS(1) []
    ],
    CR [
        /// Receive enable
        RXE OFFSET(9) NUMBITS(1) [],
        /// Transmit enable
        TXE OFFSET(8) NUMBITS(1) [],
        /// Loopback enable
        LBE OFFSET(7) NUMBITS(1) [],
        /// UART enable
        UARTEN OFFSET(0) NUMBITS(1) []
    ]
];

const UART0_BASE: StaticRef<UartRegisters> =
    unsafe { StaticRef::new(0x40034000 as *const UartRegisters) };

const UART1_BASE: StaticRef<UartRegisters> =
    unsafe { StaticRef::new(0x40038000 as *const UartRegisters) };

/// The requested rate cannot be produced from the given peripheral clock.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum BaudRateError {
    /// The divisor would be below 1; the clock is too slow for this rate.
    TooFast,
    /// The divisor overflows the 16-bit integer field.
    TooSlow,
}

/// Integer and fractional (1/64ths, rounded) baud divisors for a PL011 fed
/// with `clock_hz`.
pub(crate) fn baud_divisors(clock_hz: u32, baud: u32) -> Result<(u32, u32), BaudRateError> {
    if baud == 0 {
        return Err(BaudRateError::TooSlow);
    }
    // 64ths of the divisor, i.e. (8 * clock) / baud with the fractional
    // part kept in the low 7 bits.
    let divisor_64ths = (8 * clock_hz as u64 / baud as u64) as u32;
    let ibrd = divisor_64ths >> 7;
    if ibrd == 0 {
        return Err(BaudRateError::TooFast);
    }
    if ibrd > 0xffff {
        return Err(BaudRateError::TooSlow);
    }
    let fbrd = ((divisor_64ths & 0x7f) + 1) / 2;
    Ok((ibrd, fbrd))
}

pub struct Uart {
    registers: StaticRef<UartRegisters>,
    reset_peripheral: Peripheral,
}

impl Uart {
    pub const fn uart0() -> Uart {
        Uart {
            registers: UART0_BASE,
            reset_peripheral: Peripheral::Uart0,
        }
    }

    pub const fn uart1() -> Uart {
        Uart {
            registers: UART1_BASE,
            reset_peripheral: Peripheral::Uart1,
        }
    }

    /// Reset the block and bring it up at `baud`, 8N1 with FIFOs, given the
    /// peripheral clock it runs from. Fails if the rate is unreachable.
    pub fn init<R: ResetControl>(
        &self,
        resets: &R,
        peripheral_hz: u32,
        baud: u32,
    ) -> Result<(), BaudRateError> {
        let (ibrd, fbrd) = baud_divisors(peripheral_hz, baud)?;

        resets.reset(self.reset_peripheral);

        self.registers.ibrd.set(ibrd);
        self.registers.fbrd.set(fbrd);
        self.registers
            .lcr_h
            .write(LCR_H::WLEN::Bits8 + LCR_H::FEN::SET);
        self.registers
            .cr
            .write(CR::UARTEN::SET + CR::TXE::SET + CR::RXE::SET);
        Ok(())
    }

    /// Blocking write of one byte.
    pub fn transmit_byte(&self, byte: u8) {
        while self.registers.fr.is_set(FR::TXFF) {}
        self.registers.dr.write(DR::DATA.val(byte as u32));
    }

    /// Blocking read of one byte.
    pub fn receive_byte(&self) -> u8 {
        while self.registers.fr.is_set(FR::RXFE) {}
        self.registers.dr.read(DR::DATA) as u8
    }

    /// Wait until the transmit path has fully drained.
    pub fn flush(&self) {
        while self.registers.fr.is_set(FR::BUSY) {}
    }
}

#[cfg(test)]
mod tests {
    use super::{baud_divisors, BaudRateError};

    #[test]
    fn divisors_match_the_hardware_tables() {
        // 12 MHz peripheral clock at 115200 baud.
        assert_eq!(baud_divisors(12_000_000, 115_200), Ok((6, 33)));
        // 133 MHz peripheral clock at 115200 baud.
        assert_eq!(baud_divisors(133_000_000, 115_200), Ok((72, 10)));
        // 12 MHz at 9600: divisor 78.125 -> fractional 8/64.
        assert_eq!(baud_divisors(12_000_000, 9_600), Ok((78, 8)));
    }

    #[test]
    fn unreachable_rates_are_rejected() {
        // Divisor overflows the 16-bit integer field.
        assert_eq!(baud_divisors(12_000_000, 1), Err(BaudRateError::TooSlow));
        // Faster than the clock can produce (divisor < 1).
        assert_eq!(
            baud_divisors(12_000_000, 12_000_000),
            Err(BaudRateError::TooFast)
        );
        assert_eq!(baud_divisors(12_000_000, 0), Err(BaudRateError::TooSlow));
    }
}
