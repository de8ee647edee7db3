// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! User-bank GPIO: function select, pad control and SIO-driven outputs.

use tock_registers::interfaces::{ReadWriteable, Writeable};
use tock_registers::registers::{ReadOnly, ReadWrite};
use tock_registers::{register_bitfields, register_structs};

use crate::sio::Sio;
use crate::static_ref::StaticRef;

register_structs! {
    GpioPinRegisters {
        /// Pin status, after and before overrides
        (0x000 => status: ReadOnly<u32>),
        /// Function select and overrides
        (0x004 => ctrl: ReadWrite<u32, GPIOx_CTRL::Register>),
        (0x008 => @END),
    },
    GpioRegisters {
        (0x000 => pin: [GpioPinRegisters; 30]),
        // Interrupt registers, not driven here.
        (0x0f0 => @END),
    },
    /// User Bank Pad Control Registers
    GpioPadRegisters {
        /// Voltage select
        (0x00 => voltage: ReadWrite<u32, VOLTAGE_SELECT::Register>),
        /// Pads control
        (0x04 => gpio_pad: [ReadWrite<u32, GPIO_PAD::Register>; 32]),
        (0x84 => @END),
    }
}

register_bitfields![u32,
    GPIOx_CTRL [
        /// Function select
        FUNCSEL OFFSET(0) NUMBITS(5) []
    ],
    VOLTAGE_SELECT [
        VOLTAGE OFFSET(0) NUMBITS(1) [
            Set3V3 = 0,
            Set1V8 = 1
        ]
    ],
    GPIO_PAD [
        /// Output disable
        OD OFFSET(7) NUMBITS(1) [],
        /// Input enable
        IE OFFSET(6) NUMBITS(1) [],
        /// Drive strength
        DRIVE OFFSET(4) NUMBITS(2) [],
        /// Pull-up enable
        PUE OFFSET(3) NUMBITS(1) [],
        /// Pull-down enable
        PDE OFFSET(2) NUMBITS(1) [],
        SCHMITT OFFSET(1) NUMBITS(1) [],
        SLEWFAST OFFSET(0) NUMBITS(1) []
    ]
];

const GPIO_BASE: StaticRef<GpioRegisters> =
    unsafe { StaticRef::new(0x40014000 as *const GpioRegisters) };

const GPIO_PAD_BASE: StaticRef<GpioPadRegisters> =
    unsafe { StaticRef::new(0x4001c000 as *const GpioPadRegisters) };

pub const NUM_PINS: usize = 30;

#[derive(Copy, Clone, PartialEq, Debug)]
#[repr(u32)]
pub enum GpioFunction {
    Xip = 0,
    Spi = 1,
    Uart = 2,
    I2c = 3,
    Pwm = 4,
    Sio = 5,
    Pio0 = 6,
    Pio1 = 7,
    Gpck = 8,
    Usb = 9,
    Null = 0x1f,
}

#[derive(Copy, Clone, PartialEq, Debug)]
pub enum Pull {
    Up,
    Down,
    Neither,
}

pub struct GpioPin {
    pin: usize,
    gpio_registers: StaticRef<GpioRegisters>,
    pad_registers: StaticRef<GpioPadRegisters>,
    sio: Sio,
}

impl GpioPin {
    pub const fn new(pin: usize) -> GpioPin {
        assert!(pin < NUM_PINS);
        GpioPin {
            pin,
            gpio_registers: GPIO_BASE,
            pad_registers: GPIO_PAD_BASE,
            sio: Sio::new(),
        }
    }

    /// Route the pin to a peripheral function, enabling its pad.
    pub fn set_function(&self, function: GpioFunction) {
        self.activate_pads();
        self.gpio_registers.pin[self.pin]
            .ctrl
            .write(GPIOx_CTRL::FUNCSEL.val(function as u32));
    }

    pub fn activate_pads(&self) {
        self.pad_registers.gpio_pad[self.pin].modify(GPIO_PAD::OD::CLEAR + GPIO_PAD::IE::SET);
    }

    pub fn deactivate_pads(&self) {
        self.pad_registers.gpio_pad[self.pin].modify(GPIO_PAD::OD::SET + GPIO_PAD::IE::CLEAR);
    }

    pub fn set_pull(&self, pull: Pull) {
        let pad = &self.pad_registers.gpio_pad[self.pin];
        match pull {
            Pull::Up => pad.modify(GPIO_PAD::PUE::SET + GPIO_PAD::PDE::CLEAR),
            Pull::Down => pad.modify(GPIO_PAD::PUE::CLEAR + GPIO_PAD::PDE::SET),
            Pull::Neither => pad.modify(GPIO_PAD::PUE::CLEAR + GPIO_PAD::PDE::CLEAR),
        }
    }

    /// Software-controlled output, initially driven low.
    pub fn make_output(&self) {
        self.set_function(GpioFunction::Sio);
        self.sio.gpio_clear(self.pin);
        self.sio.gpio_oe_set(self.pin);
    }

    /// Software-readable input.
    pub fn make_input(&self) {
        self.set_function(GpioFunction::Sio);
        self.sio.gpio_oe_clear(self.pin);
    }

    pub fn set(&self) {
        self.sio.gpio_set(self.pin);
    }

    pub fn clear(&self) {
        self.sio.gpio_clear(self.pin);
    }

    pub fn toggle(&self) {
        self.sio.gpio_toggle(self.pin);
    }

    pub fn read(&self) -> bool {
        self.sio.gpio_read(self.pin)
    }
}

#[cfg(test)]
mod tests {
    use super::GpioFunction;

    #[test]
    fn function_select_values_match_the_datasheet() {
        assert_eq!(GpioFunction::Uart as u32, 2);
        assert_eq!(GpioFunction::Sio as u32, 5);
        assert_eq!(GpioFunction::Null as u32, 0x1f);
    }
}
