// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Subsystem reset controller.
//!
//! A peripheral whose bit is set in `RESET` is held in reset; clearing the
//! bit releases it and the corresponding `RESET_DONE` bit goes high once the
//! peripheral is ready to be accessed.

use tock_registers::fields::FieldValue;
use tock_registers::interfaces::{Readable, Writeable};
use tock_registers::registers::{ReadOnly, ReadWrite};
use tock_registers::{register_bitfields, register_structs};

use crate::static_ref::StaticRef;
use crate::{ATOMIC_CLEAR_OFFSET, ATOMIC_SET_OFFSET};

register_structs! {
    ResetsRegisters {
        /// Reset control: 1 holds the peripheral in reset
        (0x000 => reset: ReadWrite<u32, RESET::Register>),
        /// Watchdog select: 1 resets the peripheral on a watchdog fire
        (0x004 => wdsel: ReadWrite<u32, RESET::Register>),
        /// Reset done: 1 once the released peripheral is accessible
        (0x008 => reset_done: ReadOnly<u32, RESET_DONE::Register>),
        (0x00C => @END),
    }
}

register_bitfields![u32,
    RESET [
        USBCTRL OFFSET(24) NUMBITS(1) [],
        UART1 OFFSET(23) NUMBITS(1) [],
        UART0 OFFSET(22) NUMBITS(1) [],
        TIMER OFFSET(21) NUMBITS(1) [],
        TBMAN OFFSET(20) NUMBITS(1) [],
        SYSINFO OFFSET(19) NUMBITS(1) [],
        SYSCFG OFFSET(18) NUMBITS(1) [],
        SPI1 OFFSET(17) NUMBITS(1) [],
        SPI0 OFFSET(16) NUMBITS(1) [],
        RTC OFFSET(15) NUMBITS(1) [],
        PWM OFFSET(14) NUMBITS(1) [],
        PLL_USB OFFSET(13) NUMBITS(1) [],
        PLL_SYS OFFSET(12) NUMBITS(1) [],
        PIO1 OFFSET(11) NUMBITS(1) [],
        PIO0 OFFSET(10) NUMBITS(1) [],
        PADS_QSPI OFFSET(9) NUMBITS(1) [],
        PADS_BANK0 OFFSET(8) NUMBITS(1) [],
        JTAG OFFSET(7) NUMBITS(1) [],
        IO_QSPI OFFSET(6) NUMBITS(1) [],
        IO_BANK0 OFFSET(5) NUMBITS(1) [],
        I2C1 OFFSET(4) NUMBITS(1) [],
        I2C0 OFFSET(3) NUMBITS(1) [],
        DMA OFFSET(2) NUMBITS(1) [],
        BUSCTRL OFFSET(1) NUMBITS(1) [],
        ADC OFFSET(0) NUMBITS(1) []
    ],
    RESET_DONE [
        USBCTRL OFFSET(24) NUMBITS(1) [],
        UART1 OFFSET(23) NUMBITS(1) [],
        UART0 OFFSET(22) NUMBITS(1) [],
        TIMER OFFSET(21) NUMBITS(1) [],
        TBMAN OFFSET(20) NUMBITS(1) [],
        SYSINFO OFFSET(19) NUMBITS(1) [],
        SYSCFG OFFSET(18) NUMBITS(1) [],
        SPI1 OFFSET(17) NUMBITS(1) [],
        SPI0 OFFSET(16) NUMBITS(1) [],
        RTC OFFSET(15) NUMBITS(1) [],
        PWM OFFSET(14) NUMBITS(1) [],
        PLL_USB OFFSET(13) NUMBITS(1) [],
        PLL_SYS OFFSET(12) NUMBITS(1) [],
        PIO1 OFFSET(11) NUMBITS(1) [],
        PIO0 OFFSET(10) NUMBITS(1) [],
        PADS_QSPI OFFSET(9) NUMBITS(1) [],
        PADS_BANK0 OFFSET(8) NUMBITS(1) [],
        JTAG OFFSET(7) NUMBITS(1) [],
        IO_QSPI OFFSET(6) NUMBITS(1) [],
        IO_BANK0 OFFSET(5) NUMBITS(1) [],
        I2C1 OFFSET(4) NUMBITS(1) [],
        I2C0 OFFSET(3) NUMBITS(1) [],
        DMA OFFSET(2) NUMBITS(1) [],
        BUSCTRL OFFSET(1) NUMBITS(1) [],
        ADC OFFSET(0) NUMBITS(1) []
    ]
];

const RESETS_BASE_ADDRESS: usize = 0x4000c000;

const RESETS_BASE: StaticRef<ResetsRegisters> =
    unsafe { StaticRef::new(RESETS_BASE_ADDRESS as *const ResetsRegisters) };

// Atomic alias windows over the same layout. Writing 1 to a bit through the
// set window sets it, through the clear window clears it; other bits are
// untouched. Note that on registers with w1c "sticky" bits the set window
// has no effect on those bits, while the clear and toggle windows do clear
// them.
const RESETS_SET_BASE: StaticRef<ResetsRegisters> = unsafe {
    StaticRef::new((RESETS_BASE_ADDRESS + ATOMIC_SET_OFFSET) as *const ResetsRegisters)
};
const RESETS_CLEAR_BASE: StaticRef<ResetsRegisters> = unsafe {
    StaticRef::new((RESETS_BASE_ADDRESS + ATOMIC_CLEAR_OFFSET) as *const ResetsRegisters)
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Peripheral {
    Adc,
    BusController,
    Dma,
    I2c0,
    I2c1,
    IOBank0,
    IOQSpi,
    Jtag,
    PadsBank0,
    PadsQSpi,
    Pio0,
    Pio1,
    PllSys,
    PllUsb,
    Pwm,
    Rtc,
    Spi0,
    Spi1,
    Syscfg,
    SysInfo,
    TBMan,
    Timer,
    Uart0,
    Uart1,
    UsbCtrl,
}

impl Peripheral {
    fn reset_field(self) -> FieldValue<u32, RESET::Register> {
        match self {
            Peripheral::Adc => RESET::ADC::SET,
            Peripheral::BusController => RESET::BUSCTRL::SET,
            Peripheral::Dma => RESET::DMA::SET,
            Peripheral::I2c0 => RESET::I2C0::SET,
            Peripheral::I2c1 => RESET::I2C1::SET,
            Peripheral::IOBank0 => RESET::IO_BANK0::SET,
            Peripheral::IOQSpi => RESET::IO_QSPI::SET,
            Peripheral::Jtag => RESET::JTAG::SET,
            Peripheral::PadsBank0 => RESET::PADS_BANK0::SET,
            Peripheral::PadsQSpi => RESET::PADS_QSPI::SET,
            Peripheral::Pio0 => RESET::PIO0::SET,
            Peripheral::Pio1 => RESET::PIO1::SET,
            Peripheral::PllSys => RESET::PLL_SYS::SET,
            Peripheral::PllUsb => RESET::PLL_USB::SET,
            Peripheral::Pwm => RESET::PWM::SET,
            Peripheral::Rtc => RESET::RTC::SET,
            Peripheral::Spi0 => RESET::SPI0::SET,
            Peripheral::Spi1 => RESET::SPI1::SET,
            Peripheral::Syscfg => RESET::SYSCFG::SET,
            Peripheral::SysInfo => RESET::SYSINFO::SET,
            Peripheral::TBMan => RESET::TBMAN::SET,
            Peripheral::Timer => RESET::TIMER::SET,
            Peripheral::Uart0 => RESET::UART0::SET,
            Peripheral::Uart1 => RESET::UART1::SET,
            Peripheral::UsbCtrl => RESET::USBCTRL::SET,
        }
    }

    fn reset_done_field(self) -> FieldValue<u32, RESET_DONE::Register> {
        match self {
            Peripheral::Adc => RESET_DONE::ADC::SET,
            Peripheral::BusController => RESET_DONE::BUSCTRL::SET,
            Peripheral::Dma => RESET_DONE::DMA::SET,
            Peripheral::I2c0 => RESET_DONE::I2C0::SET,
            Peripheral::I2c1 => RESET_DONE::I2C1::SET,
            Peripheral::IOBank0 => RESET_DONE::IO_BANK0::SET,
            Peripheral::IOQSpi => RESET_DONE::IO_QSPI::SET,
            Peripheral::Jtag => RESET_DONE::JTAG::SET,
            Peripheral::PadsBank0 => RESET_DONE::PADS_BANK0::SET,
            Peripheral::PadsQSpi => RESET_DONE::PADS_QSPI::SET,
            Peripheral::Pio0 => RESET_DONE::PIO0::SET,
            Peripheral::Pio1 => RESET_DONE::PIO1::SET,
            Peripheral::PllSys => RESET_DONE::PLL_SYS::SET,
            Peripheral::PllUsb => RESET_DONE::PLL_USB::SET,
            Peripheral::Pwm => RESET_DONE::PWM::SET,
            Peripheral::Rtc => RESET_DONE::RTC::SET,
            Peripheral::Spi0 => RESET_DONE::SPI0::SET,
            Peripheral::Spi1 => RESET_DONE::SPI1::SET,
            Peripheral::Syscfg => RESET_DONE::SYSCFG::SET,
            Peripheral::SysInfo => RESET_DONE::SYSINFO::SET,
            Peripheral::TBMan => RESET_DONE::TBMAN::SET,
            Peripheral::Timer => RESET_DONE::TIMER::SET,
            Peripheral::Uart0 => RESET_DONE::UART0::SET,
            Peripheral::Uart1 => RESET_DONE::UART1::SET,
            Peripheral::UsbCtrl => RESET_DONE::USBCTRL::SET,
        }
    }
}

/// Reset-cycle access used by the clock bring-up, so that the sequencing
/// logic can be exercised without the memory-mapped registers.
pub trait ResetControl {
    /// Put a peripheral into reset, then bring it back out and wait for it.
    fn reset(&self, peripheral: Peripheral);
    /// Bring a peripheral out of reset and wait until it is accessible.
    fn release(&self, peripheral: Peripheral);
}

pub struct Resets {
    registers: StaticRef<ResetsRegisters>,
    set_registers: StaticRef<ResetsRegisters>,
    clear_registers: StaticRef<ResetsRegisters>,
}

impl Resets {
    pub const fn new() -> Resets {
        Resets {
            registers: RESETS_BASE,
            set_registers: RESETS_SET_BASE,
            clear_registers: RESETS_CLEAR_BASE,
        }
    }
}

impl ResetControl for Resets {
    fn reset(&self, peripheral: Peripheral) {
        self.set_registers.reset.write(peripheral.reset_field());
        self.release(peripheral);
    }

    fn release(&self, peripheral: Peripheral) {
        self.clear_registers.reset.write(peripheral.reset_field());
        while !self
            .registers
            .reset_done
            .matches_all(peripheral.reset_done_field())
        {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tock_registers::registers::InMemoryRegister;

    fn reset_mask(peripheral: Peripheral) -> u32 {
        let reg: InMemoryRegister<u32, RESET::Register> = InMemoryRegister::new(0);
        reg.write(peripheral.reset_field());
        reg.get()
    }

    #[test]
    fn reset_bits_match_the_datasheet() {
        assert_eq!(reset_mask(Peripheral::Adc), 0x0000_0001);
        assert_eq!(reset_mask(Peripheral::IOBank0), 0x0000_0020);
        assert_eq!(reset_mask(Peripheral::PllSys), 0x0000_1000);
        assert_eq!(reset_mask(Peripheral::PllUsb), 0x0000_2000);
        assert_eq!(reset_mask(Peripheral::Timer), 0x0020_0000);
        assert_eq!(reset_mask(Peripheral::Uart0), 0x0040_0000);
        assert_eq!(reset_mask(Peripheral::UsbCtrl), 0x0100_0000);
    }

    #[test]
    fn done_bits_mirror_reset_bits() {
        let done: InMemoryRegister<u32, RESET_DONE::Register> = InMemoryRegister::new(0);
        done.write(Peripheral::PllSys.reset_done_field());
        assert_eq!(done.get(), reset_mask(Peripheral::PllSys));
    }
}
