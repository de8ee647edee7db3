// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Clock tree and PLL control.
//!
//! The clock generators fall into two groups. The reference and system
//! clocks have glitchless primary muxes that can be switched while the
//! downstream logic is running; every other generator has only an auxiliary
//! mux that glitches on change and must be disabled around it. Both PLLs
//! share one register layout and are configured through [`configure_pll`].

use core::cell::Cell;

use tock_registers::interfaces::{ReadWriteable, Readable, Writeable};
use tock_registers::registers::{ReadOnly, ReadWrite};
use tock_registers::{register_bitfields, register_structs};

use crate::resets::{Peripheral, ResetControl};
use crate::static_ref::StaticRef;
use crate::xosc::Xosc;
use crate::ATOMIC_CLEAR_OFFSET;

register_structs! {
    ClocksRegisters {
        // Four general-purpose clock output slices, not driven here.
        (0x000 => _reserved0),
        /// Clock control, can be changed on-the-fly (except for auxsrc)
        (0x030 => clk_ref_ctrl: ReadWrite<u32, CLK_REF_CTRL::Register>),
        /// Clock divisor, can be changed on-the-fly
        (0x034 => clk_ref_div: ReadWrite<u32>),
        /// Indicates which src is currently selected (one-hot)
        (0x038 => clk_ref_selected: ReadOnly<u32>),
        /// Clock control, can be changed on-the-fly (except for auxsrc)
        (0x03C => clk_sys_ctrl: ReadWrite<u32, CLK_SYS_CTRL::Register>),
        /// Clock divisor, can be changed on-the-fly
        (0x040 => clk_sys_div: ReadWrite<u32>),
        /// Indicates which src is currently selected (one-hot)
        (0x044 => clk_sys_selected: ReadOnly<u32>),
        /// Clock control, can be changed on-the-fly (except for auxsrc)
        (0x048 => clk_peri_ctrl: ReadWrite<u32, CLK_PERI_CTRL::Register>),
        (0x04C => _reserved1),
        /// Indicates which src is currently selected (one-hot)
        (0x050 => clk_peri_selected: ReadOnly<u32>),
        /// Clock control, can be changed on-the-fly (except for auxsrc)
        (0x054 => clk_usb_ctrl: ReadWrite<u32, CLK_USB_CTRL::Register>),
        /// Clock divisor, can be changed on-the-fly
        (0x058 => clk_usb_div: ReadWrite<u32>),
        /// Indicates which src is currently selected (one-hot)
        (0x05C => clk_usb_selected: ReadOnly<u32>),
        /// Clock control, can be changed on-the-fly (except for auxsrc)
        (0x060 => clk_adc_ctrl: ReadWrite<u32, CLK_ADC_CTRL::Register>),
        /// Clock divisor, can be changed on-the-fly
        (0x064 => clk_adc_div: ReadWrite<u32>),
        /// Indicates which src is currently selected (one-hot)
        (0x068 => clk_adc_selected: ReadOnly<u32>),
        // RTC clock slice, not driven here.
        (0x06C => _reserved2),
        (0x078 => clk_sys_resus_ctrl: ReadWrite<u32, CLK_SYS_RESUS_CTRL::Register>),
        (0x07C => clk_sys_resus_status: ReadOnly<u32, CLK_SYS_RESUS_STATUS::Register>),
        // Frequency counter, wake/sleep enables and resus interrupt.
        (0x080 => _reserved3),
        (0x0C8 => @END),
    },
    PllRegisters {
        /// Control and Status
        /// GENERAL CONSTRAINTS:
        /// Reference clock frequency min=5MHz, max=800MHz
        /// Feedback divider min=16, max=320
        /// VCO frequency min=400MHz, max=1600MHz
        (0x000 => cs: ReadWrite<u32, CS::Register>),
        /// Controls the PLL power modes.
        (0x004 => pwr: ReadWrite<u32, PWR::Register>),
        /// Feedback divisor
        /// (note: this PLL does not support fractional division)
        (0x008 => fbdiv_int: ReadWrite<u32, FBDIV_INT::Register>),
        /// Controls the PLL post dividers for the primary output
        /// (note: this PLL does not have a secondary output)
        /// the primary output is driven from VCO divided by postdiv1*postdiv2
        (0x00C => prim: ReadWrite<u32, PRIM::Register>),
        (0x010 => @END),
    }
}

register_bitfields![u32,
    CLK_REF_CTRL [
        /// Selects the auxiliary clock source, will glitch when switching
        AUXSRC OFFSET(5) NUMBITS(2) [
            CLKSRC_PLL_USB = 0x0,
            CLKSRC_GPIN0 = 0x1,
            CLKSRC_GPIN1 = 0x2
        ],
        /// Selects the clock source glitchlessly, can be changed on-the-fly
        SRC OFFSET(0) NUMBITS(2) [
            ROSC_CLKSRC_PH = 0x0,
            CLKSRC_CLK_REF_AUX = 0x1,
            XOSC_CLKSRC = 0x2
        ]
    ],
    CLK_SYS_CTRL [
        /// Selects the auxiliary clock source, will glitch when switching
        AUXSRC OFFSET(5) NUMBITS(3) [
            CLKSRC_PLL_SYS = 0x0,
            CLKSRC_PLL_USB = 0x1,
            ROSC_CLKSRC = 0x2,
            XOSC_CLKSRC = 0x3,
            CLKSRC_GPIN0 = 0x4,
            CLKSRC_GPIN1 = 0x5
        ],
        /// Selects the clock source glitchlessly, can be changed on-the-fly
        SRC OFFSET(0) NUMBITS(1) [
            CLKSRC_CLK_SYS_AUX = 1,
            CLK_REF = 0
        ]
    ],
    CLK_PERI_CTRL [
        /// Starts and stops the clock generator cleanly
        ENABLE OFFSET(11) NUMBITS(1) [],
        /// Asynchronously kills the clock generator
        KILL OFFSET(10) NUMBITS(1) [],
        /// Selects the auxiliary clock source, will glitch when switching
        AUXSRC OFFSET(5) NUMBITS(3) [
            CLK_SYS = 0,
            CLKSRC_PLL_SYS = 1,
            CLKSRC_PLL_USB = 2,
            ROSC_CLKSRC_PH = 3,
            XOSC_CLKSRC = 4,
            CLKSRC_GPIN0 = 5,
            CLKSRC_GPIN1 = 6
        ]
    ],
    CLK_USB_CTRL [
        /// Starts and stops the clock generator cleanly
        ENABLE OFFSET(11) NUMBITS(1) [],
        /// Asynchronously kills the clock generator
        KILL OFFSET(10) NUMBITS(1) [],
        /// Selects the auxiliary clock source, will glitch when switching
        AUXSRC OFFSET(5) NUMBITS(3) [
            CLKSRC_PLL_USB = 0,
            CLKSRC_PLL_SYS = 1,
            ROSC_CLKSRC_PH = 2,
            XOSC_CLKSRC = 3,
            CLKSRC_GPIN0 = 4,
            CLKSRC_GPIN1 = 5
        ]
    ],
    CLK_ADC_CTRL [
        /// Starts and stops the clock generator cleanly
        ENABLE OFFSET(11) NUMBITS(1) [],
        /// Asynchronously kills the clock generator
        KILL OFFSET(10) NUMBITS(1) [],
        /// Selects the auxiliary clock source, will glitch when switching
        AUXSRC OFFSET(5) NUMBITS(3) [
            CLKSRC_PLL_USB = 0,
            CLKSRC_PLL_SYS = 1,
            ROSC_CLKSRC_PH = 2,
            XOSC_CLKSRC = 3,
            CLKSRC_GPIN0 = 4,
            CLKSRC_GPIN1 = 5
        ]
    ],
    CLK_SYS_RESUS_CTRL [
        /// For clearing the resus after the fault that triggered it has been corrected
        CLEAR OFFSET(16) NUMBITS(1) [],
        /// Force a resus, for test purposes only
        FRCE OFFSET(12) NUMBITS(1) [],
        /// Enable resus
        ENABLE OFFSET(8) NUMBITS(1) [],
        /// This is expressed as a number of clk_ref cycles
        /// and must be >= 2x clk_ref_freq/min_clk_tst_freq
        TIMEOUT OFFSET(0) NUMBITS(8) []
    ],
    CLK_SYS_RESUS_STATUS [
        /// Clock has been resuscitated, correct the error then send ctrl_clear=1
        RESUSSED OFFSET(0) NUMBITS(1) []
    ],
    CS [
        /// PLL is locked
        LOCK OFFSET(31) NUMBITS(1) [],
        /// Passes the reference clock to the output instead of the divided VCO
        BYPASS OFFSET(8) NUMBITS(1) [],
        /// Divides the PLL input reference clock.
        /// Behaviour is undefined for div=0.
        REFDIV OFFSET(0) NUMBITS(6) []
    ],
    PWR [
        /// PLL VCO powerdown
        VCOPD OFFSET(5) NUMBITS(1) [],
        /// PLL post divider powerdown
        POSTDIVPD OFFSET(3) NUMBITS(1) [],
        /// PLL DSM powerdown
        /// Nothing is achieved by setting this low.
        DSMPD OFFSET(2) NUMBITS(1) [],
        /// PLL powerdown
        PD OFFSET(0) NUMBITS(1) []
    ],
    FBDIV_INT [
        FBDIV_INT OFFSET(0) NUMBITS(12) []
    ],
    PRIM [
        /// divide by 1-7
        POSTDIV1 OFFSET(16) NUMBITS(3) [],
        /// divide by 1-7
        POSTDIV2 OFFSET(12) NUMBITS(3) []
    ]
];

const CLOCKS_BASE: StaticRef<ClocksRegisters> =
    unsafe { StaticRef::new(0x40008000 as *const ClocksRegisters) };

const PLL_SYS_BASE_ADDRESS: usize = 0x40028000;
const PLL_USB_BASE_ADDRESS: usize = 0x4002c000;

const VCO_MIN_HZ: u64 = 400_000_000;
const VCO_MAX_HZ: u64 = 1_600_000_000;

const NUM_CLOCKS: usize = 5;

#[derive(Copy, Clone, PartialEq, Debug)]
#[repr(usize)]
pub enum Clock {
    Reference = 0,
    System = 1,
    Peripheral = 2,
    Usb = 3,
    Adc = 4,
}

#[derive(Copy, Clone, PartialEq, Debug)]
#[repr(u8)]
pub enum ReferenceClockSource {
    Rosc = 0,
    Auxiliary = 1,
    Xosc = 2,
}

#[derive(Copy, Clone, PartialEq, Debug)]
#[repr(u8)]
pub enum ReferenceAuxiliaryClockSource {
    PllUsb = 0,
    Gpio0 = 1,
    Gpio1 = 2,
}

#[derive(Copy, Clone, PartialEq, Debug)]
#[repr(u8)]
pub enum SystemClockSource {
    Reference = 0,
    Auxiliary = 1,
}

#[derive(Copy, Clone, PartialEq, Debug)]
#[repr(u8)]
pub enum SystemAuxiliaryClockSource {
    PllSys = 0,
    PllUsb = 1,
    Rosc = 2,
    Xosc = 3,
    Gpio0 = 4,
    Gpio1 = 5,
}

#[derive(Copy, Clone, PartialEq, Debug)]
#[repr(u8)]
pub enum PeripheralAuxiliaryClockSource {
    System = 0,
    PllSys = 1,
    PllUsb = 2,
    Rosc = 3,
    Xosc = 4,
    Gpio0 = 5,
    Gpio1 = 6,
}

#[derive(Copy, Clone, PartialEq, Debug)]
#[repr(u8)]
pub enum UsbAuxiliaryClockSource {
    PllUsb = 0,
    PllSys = 1,
    Rosc = 2,
    Xosc = 3,
    Gpio0 = 4,
    Gpio1 = 5,
}

#[derive(Copy, Clone, PartialEq, Debug)]
#[repr(u8)]
pub enum AdcAuxiliaryClockSource {
    PllUsb = 0,
    PllSys = 1,
    Rosc = 2,
    Xosc = 3,
    Gpio0 = 4,
    Gpio1 = 5,
}

/// Divider configuration of one PLL.
///
/// `f_out = (f_xtal / refdiv) * fbdiv / (postdiv1 * postdiv2)`
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct PllConfig {
    pub refdiv: u32,
    pub fbdiv: u32,
    pub postdiv1: u32,
    pub postdiv2: u32,
}

impl PllConfig {
    /// Panics if a divider is outside its hardware range. The VCO range
    /// depends on the crystal and is checked by [`PllConfig::validate`].
    pub fn new(refdiv: u32, fbdiv: u32, postdiv1: u32, postdiv2: u32) -> PllConfig {
        if refdiv == 0 {
            panic!("PLL refdiv must be at least 1");
        }
        if !(16..=320).contains(&fbdiv) {
            panic!("Invalid feedback divider {} not in [16, 320]", fbdiv);
        }
        if !(1..=7).contains(&postdiv1) || !(1..=7).contains(&postdiv2) {
            panic!(
                "Invalid post divider {} or {} not in [1, 7]",
                postdiv1, postdiv2
            );
        }
        if postdiv2 > postdiv1 {
            panic!(
                "postdiv2 must not exceed postdiv1 ({} > {})",
                postdiv2, postdiv1
            );
        }
        PllConfig {
            refdiv,
            fbdiv,
            postdiv1,
            postdiv2,
        }
    }

    /// VCO frequency this configuration produces from `crystal_hz`.
    pub fn vco_frequency(&self, crystal_hz: u32) -> u64 {
        (crystal_hz / self.refdiv) as u64 * self.fbdiv as u64
    }

    /// Output frequency this configuration produces from `crystal_hz`.
    pub fn frequency(&self, crystal_hz: u32) -> u32 {
        (self.vco_frequency(crystal_hz) / (self.postdiv1 * self.postdiv2) as u64) as u32
    }

    /// Panics if the VCO would run outside 400-1600 MHz or the divided
    /// reference violates the VCO/16 constraint.
    pub fn validate(&self, crystal_hz: u32) {
        let vco = self.vco_frequency(crystal_hz);
        if !(VCO_MIN_HZ..=VCO_MAX_HZ).contains(&vco) {
            panic!("VCO frequency {} not in [400 MHz, 1600 MHz]", vco);
        }
        let ref_hz = (crystal_hz / self.refdiv) as u64;
        if ref_hz > vco / 16 {
            panic!(
                "reference frequency must not exceed vco / 16 ({} > {})",
                ref_hz,
                vco / 16
            );
        }
    }
}

/// One PLL instance, abstracted so the configuration sequence can run
/// against a scripted device.
pub trait PllInstance {
    /// Lock status.
    fn locked(&self) -> bool;
    /// Divider configuration currently held by the hardware.
    fn configuration(&self) -> PllConfig;
    /// Reset-controller slot of this instance.
    fn reset_peripheral(&self) -> Peripheral;
    /// Program the reference and feedback dividers.
    fn load_dividers(&self, config: &PllConfig);
    /// Power up the VCO (main power and VCO power).
    fn power_on_vco(&self);
    /// Program both post dividers.
    fn set_post_dividers(&self, config: &PllConfig);
    /// Power up the post divider stage.
    fn power_on_post_dividers(&self);
}

/// Bring a PLL to `config` and wait for lock.
///
/// A locked PLL already running `config` is left untouched, so a watchdog
/// reboot does not glitch a PLL that still feeds the system clock. The post
/// dividers are programmed only after lock; until then their stage stays
/// powered down.
pub fn configure_pll<P: PllInstance, R: ResetControl>(pll: &P, resets: &R, config: &PllConfig) {
    if pll.locked() && pll.configuration() == *config {
        return;
    }

    resets.reset(pll.reset_peripheral());
    pll.load_dividers(config);
    pll.power_on_vco();
    while !pll.locked() {}
    pll.set_post_dividers(config);
    pll.power_on_post_dividers();
}

pub struct Pll {
    registers: StaticRef<PllRegisters>,
    clear_registers: StaticRef<PllRegisters>,
    reset_peripheral: Peripheral,
}

impl Pll {
    const fn new(base_address: usize, reset_peripheral: Peripheral) -> Pll {
        Pll {
            registers: unsafe { StaticRef::new(base_address as *const PllRegisters) },
            clear_registers: unsafe {
                StaticRef::new((base_address + ATOMIC_CLEAR_OFFSET) as *const PllRegisters)
            },
            reset_peripheral,
        }
    }

    pub const fn sys() -> Pll {
        Pll::new(PLL_SYS_BASE_ADDRESS, Peripheral::PllSys)
    }

    pub const fn usb() -> Pll {
        Pll::new(PLL_USB_BASE_ADDRESS, Peripheral::PllUsb)
    }

    /// Power the instance fully down. The caller must have moved every
    /// consumer off this PLL first.
    pub fn deinit(&self) {
        self.registers
            .pwr
            .modify(PWR::PD::SET + PWR::DSMPD::SET + PWR::POSTDIVPD::SET + PWR::VCOPD::SET);
    }
}

impl PllInstance for Pll {
    fn locked(&self) -> bool {
        self.registers.cs.is_set(CS::LOCK)
    }

    fn configuration(&self) -> PllConfig {
        PllConfig {
            refdiv: self.registers.cs.read(CS::REFDIV),
            fbdiv: self.registers.fbdiv_int.read(FBDIV_INT::FBDIV_INT),
            postdiv1: self.registers.prim.read(PRIM::POSTDIV1),
            postdiv2: self.registers.prim.read(PRIM::POSTDIV2),
        }
    }

    fn reset_peripheral(&self) -> Peripheral {
        self.reset_peripheral
    }

    fn load_dividers(&self, config: &PllConfig) {
        self.registers.cs.modify(CS::REFDIV.val(config.refdiv));
        self.registers
            .fbdiv_int
            .write(FBDIV_INT::FBDIV_INT.val(config.fbdiv));
    }

    fn power_on_vco(&self) {
        // Atomic clear of the powerdown bits; DSMPD stays set (integer mode).
        self.clear_registers.pwr.write(PWR::PD::SET + PWR::VCOPD::SET);
    }

    fn set_post_dividers(&self, config: &PllConfig) {
        self.registers.prim.write(
            PRIM::POSTDIV1.val(config.postdiv1) + PRIM::POSTDIV2.val(config.postdiv2),
        );
    }

    fn power_on_post_dividers(&self) {
        self.clear_registers.pwr.write(PWR::POSTDIVPD::SET);
    }
}

/// The system clock glitchless mux, abstracted so the two-step switch can
/// run against a scripted device.
pub trait SystemClockMux {
    fn set_system_source(&self, source: SystemClockSource);
    fn set_system_auxiliary_source(&self, source: SystemAuxiliaryClockSource);
    fn system_source_selected(&self, source: SystemClockSource) -> bool;
}

/// Switch the system clock, never letting a changing aux mux reach the
/// downstream logic.
///
/// When moving onto an aux source the glitchless primary mux is parked on
/// the reference clock first, the aux mux is changed in its shadow, and the
/// primary mux flip is the final write of the sequence.
pub fn switch_system_clock<M: SystemClockMux>(
    mux: &M,
    source: SystemClockSource,
    auxiliary_source: SystemAuxiliaryClockSource,
) {
    if source == SystemClockSource::Auxiliary {
        mux.set_system_source(SystemClockSource::Reference);
        while !mux.system_source_selected(SystemClockSource::Reference) {}
    }

    mux.set_system_auxiliary_source(auxiliary_source);
    mux.set_system_source(source);
    while !mux.system_source_selected(source) {}
}

/// 24.8 fixed-point divisor for a clock generator.
pub(crate) fn divider_for(source_freq: u32, freq: u32) -> u32 {
    (((source_freq as u64) << 8) / freq as u64) as u32
}

pub struct Clocks {
    registers: StaticRef<ClocksRegisters>,
    frequencies: [Cell<u32>; NUM_CLOCKS],
}

impl Clocks {
    pub const fn new() -> Clocks {
        Clocks {
            registers: CLOCKS_BASE,
            frequencies: [
                Cell::new(0),
                Cell::new(0),
                Cell::new(0),
                Cell::new(0),
                Cell::new(0),
            ],
        }
    }

    /// Move every boot-relevant generator onto the crystal: resus off, XOSC
    /// started and stable, reference from XOSC, system from reference,
    /// peripheral from XOSC. Safe operating point for PLL work.
    pub fn init(&self, xosc: &Xosc, crystal_hz: u32) {
        self.disable_resus();
        xosc.init(crystal_hz);
        self.configure_reference(
            ReferenceClockSource::Xosc,
            ReferenceAuxiliaryClockSource::PllUsb,
            crystal_hz,
            crystal_hz,
        );
        self.configure_system(
            SystemClockSource::Reference,
            SystemAuxiliaryClockSource::PllSys,
            crystal_hz,
            crystal_hz,
        );
        self.configure_peripheral(PeripheralAuxiliaryClockSource::Xosc, crystal_hz);
    }

    pub fn enable_resus(&self) {
        self.registers
            .clk_sys_resus_ctrl
            .modify(CLK_SYS_RESUS_CTRL::ENABLE::SET);
    }

    /// An enabled resus would silently swap a stopped system clock back to
    /// the reference mid-sequence; it stays off during bring-up.
    pub fn disable_resus(&self) {
        self.registers
            .clk_sys_resus_ctrl
            .modify(CLK_SYS_RESUS_CTRL::ENABLE::CLEAR);
    }

    pub fn set_frequency(&self, clock: Clock, freq: u32) {
        self.frequencies[clock as usize].set(freq);
    }

    pub fn get_frequency(&self, clock: Clock) -> u32 {
        self.frequencies[clock as usize].get()
    }

    fn set_divider(&self, clock: Clock, div: u32) {
        match clock {
            Clock::Reference => self.registers.clk_ref_div.set(div),
            Clock::System => self.registers.clk_sys_div.set(div),
            Clock::Usb => self.registers.clk_usb_div.set(div),
            Clock::Adc => self.registers.clk_adc_div.set(div),
            // The peripheral generator has no divisor.
            Clock::Peripheral => panic!("clk_peri has no divider"),
        }
    }

    #[inline]
    fn loop_3_cycles(&self, clock: Clock) {
        if self.get_frequency(clock) > 0 {
            let _delay_cyc: u32 =
                self.get_frequency(Clock::System) / self.get_frequency(clock) + 1;
            #[cfg(target_arch = "arm")]
            unsafe {
                core::arch::asm!(
                    "1:",
                    "subs {0}, #1",
                    "bne 1b",
                    in (reg) _delay_cyc
                );
            }
        }
    }

    pub fn configure_reference(
        &self,
        source: ReferenceClockSource,
        auxiliary_source: ReferenceAuxiliaryClockSource,
        source_freq: u32,
        freq: u32,
    ) {
        if freq > source_freq {
            panic!(
                "freq is greater than source freq ({} > {})",
                freq, source_freq
            );
        }
        let div = divider_for(source_freq, freq);

        // If increasing the divisor, set it before the source to avoid a
        // momentary overspeed; the other direction is handled after the
        // switch.
        if div > self.registers.clk_ref_div.get() {
            self.set_divider(Clock::Reference, div);
        }

        // Park the glitchless mux away from aux before touching the aux mux.
        if source == ReferenceClockSource::Auxiliary {
            self.registers
                .clk_ref_ctrl
                .modify(CLK_REF_CTRL::SRC::ROSC_CLKSRC_PH);
            while self.registers.clk_ref_selected.get()
                & (1 << (ReferenceClockSource::Rosc as u32))
                == 0
            {}
        }

        self.registers
            .clk_ref_ctrl
            .modify(CLK_REF_CTRL::AUXSRC.val(auxiliary_source as u32));
        self.registers
            .clk_ref_ctrl
            .modify(CLK_REF_CTRL::SRC.val(source as u32));
        while self.registers.clk_ref_selected.get() & (1 << (source as u32)) == 0 {}

        self.set_divider(Clock::Reference, div);
        self.set_frequency(Clock::Reference, freq);
    }

    pub fn configure_system(
        &self,
        source: SystemClockSource,
        auxiliary_source: SystemAuxiliaryClockSource,
        source_freq: u32,
        freq: u32,
    ) {
        if freq > source_freq {
            panic!(
                "freq is greater than source freq ({} > {})",
                freq, source_freq
            );
        }
        let div = divider_for(source_freq, freq);

        if div > self.registers.clk_sys_div.get() {
            self.set_divider(Clock::System, div);
        }

        switch_system_clock(self, source, auxiliary_source);

        self.set_divider(Clock::System, div);
        self.set_frequency(Clock::System, freq);
    }

    pub fn configure_peripheral(
        &self,
        auxiliary_source: PeripheralAuxiliaryClockSource,
        freq: u32,
    ) {
        self.registers
            .clk_peri_ctrl
            .modify(CLK_PERI_CTRL::ENABLE::CLEAR);

        // Delay for 3 cycles of the target clock for ENABLE propagation;
        // neither XOSC_COUNT nor the timer is necessarily running yet.
        self.loop_3_cycles(Clock::Peripheral);

        self.registers
            .clk_peri_ctrl
            .modify(CLK_PERI_CTRL::AUXSRC.val(auxiliary_source as u32));
        self.registers
            .clk_peri_ctrl
            .modify(CLK_PERI_CTRL::ENABLE::SET);

        self.set_frequency(Clock::Peripheral, freq);
    }

    pub fn configure_usb(
        &self,
        auxiliary_source: UsbAuxiliaryClockSource,
        source_freq: u32,
        freq: u32,
    ) {
        if freq > source_freq {
            panic!(
                "freq is greater than source freq ({} > {})",
                freq, source_freq
            );
        }
        let div = divider_for(source_freq, freq);

        if div > self.registers.clk_usb_div.get() {
            self.set_divider(Clock::Usb, div);
        }

        self.registers
            .clk_usb_ctrl
            .modify(CLK_USB_CTRL::ENABLE::CLEAR);
        self.loop_3_cycles(Clock::Usb);

        self.registers
            .clk_usb_ctrl
            .modify(CLK_USB_CTRL::AUXSRC.val(auxiliary_source as u32));
        self.registers.clk_usb_ctrl.modify(CLK_USB_CTRL::ENABLE::SET);

        self.set_divider(Clock::Usb, div);
        self.set_frequency(Clock::Usb, freq);
    }

    pub fn configure_adc(
        &self,
        auxiliary_source: AdcAuxiliaryClockSource,
        source_freq: u32,
        freq: u32,
    ) {
        if freq > source_freq {
            panic!(
                "freq is greater than source freq ({} > {})",
                freq, source_freq
            );
        }
        let div = divider_for(source_freq, freq);

        if div > self.registers.clk_adc_div.get() {
            self.set_divider(Clock::Adc, div);
        }

        self.registers
            .clk_adc_ctrl
            .modify(CLK_ADC_CTRL::ENABLE::CLEAR);
        self.loop_3_cycles(Clock::Adc);

        self.registers
            .clk_adc_ctrl
            .modify(CLK_ADC_CTRL::AUXSRC.val(auxiliary_source as u32));
        self.registers.clk_adc_ctrl.modify(CLK_ADC_CTRL::ENABLE::SET);

        self.set_divider(Clock::Adc, div);
        self.set_frequency(Clock::Adc, freq);
    }
}

impl SystemClockMux for Clocks {
    fn set_system_source(&self, source: SystemClockSource) {
        self.registers
            .clk_sys_ctrl
            .modify(CLK_SYS_CTRL::SRC.val(source as u32));
    }

    fn set_system_auxiliary_source(&self, source: SystemAuxiliaryClockSource) {
        self.registers
            .clk_sys_ctrl
            .modify(CLK_SYS_CTRL::AUXSRC.val(source as u32));
    }

    fn system_source_selected(&self, source: SystemClockSource) -> bool {
        // SELECTED is one-hot over the primary mux inputs.
        self.registers.clk_sys_selected.get() & (1 << (source as u32)) != 0
    }
}

/// The crystal and PLL operating point a board boots to.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct ClockPlan {
    pub crystal_hz: u32,
    pub sys_pll: PllConfig,
    pub usb_pll: PllConfig,
}

impl ClockPlan {
    /// Raspberry Pi Pico operating point: 12 MHz crystal, 133 MHz system
    /// clock (VCO 1596 MHz / 6 / 2), 48 MHz USB clock (VCO 1440 MHz / 6 / 5).
    pub const fn pico() -> ClockPlan {
        ClockPlan {
            crystal_hz: 12_000_000,
            sys_pll: PllConfig {
                refdiv: 1,
                fbdiv: 133,
                postdiv1: 6,
                postdiv2: 2,
            },
            usb_pll: PllConfig {
                refdiv: 1,
                fbdiv: 120,
                postdiv1: 6,
                postdiv2: 5,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::{Cell, RefCell};

    #[derive(Copy, Clone, Debug, PartialEq)]
    enum PllOp {
        ObserveLock,
        LoadDividers,
        PowerOnVco,
        SetPostDividers,
        PowerOnPostDividers,
    }

    /// Scripted PLL: locks a fixed number of polls after the VCO powers up
    /// and logs every operation in order.
    struct ScriptedPll {
        locked: Cell<bool>,
        vco_powered: Cell<bool>,
        config: Cell<PllConfig>,
        polls_until_lock: Cell<u32>,
        register_writes: Cell<usize>,
        log: RefCell<[Option<PllOp>; 16]>,
        log_len: Cell<usize>,
    }

    impl ScriptedPll {
        fn new(polls_until_lock: u32) -> ScriptedPll {
            ScriptedPll {
                locked: Cell::new(false),
                vco_powered: Cell::new(false),
                config: Cell::new(PllConfig {
                    refdiv: 0,
                    fbdiv: 0,
                    postdiv1: 0,
                    postdiv2: 0,
                }),
                polls_until_lock: Cell::new(polls_until_lock),
                register_writes: Cell::new(0),
                log: RefCell::new([None; 16]),
                log_len: Cell::new(0),
            }
        }

        fn record(&self, op: PllOp) {
            let len = self.log_len.get();
            self.log.borrow_mut()[len] = Some(op);
            self.log_len.set(len + 1);
        }

        fn record_write(&self, op: PllOp) {
            self.register_writes.set(self.register_writes.get() + 1);
            self.record(op);
        }

        fn ops(&self) -> ([Option<PllOp>; 16], usize) {
            (*self.log.borrow(), self.log_len.get())
        }
    }

    impl PllInstance for ScriptedPll {
        fn locked(&self) -> bool {
            self.record(PllOp::ObserveLock);
            if self.vco_powered.get() && !self.locked.get() {
                let polls = self.polls_until_lock.get();
                if polls == 0 {
                    self.locked.set(true);
                } else {
                    self.polls_until_lock.set(polls - 1);
                }
            }
            self.locked.get()
        }

        fn configuration(&self) -> PllConfig {
            self.config.get()
        }

        fn reset_peripheral(&self) -> Peripheral {
            Peripheral::PllSys
        }

        fn load_dividers(&self, config: &PllConfig) {
            self.record_write(PllOp::LoadDividers);
            let mut current = self.config.get();
            current.refdiv = config.refdiv;
            current.fbdiv = config.fbdiv;
            self.config.set(current);
        }

        fn power_on_vco(&self) {
            self.record_write(PllOp::PowerOnVco);
            self.vco_powered.set(true);
        }

        fn set_post_dividers(&self, config: &PllConfig) {
            assert!(
                self.locked.get(),
                "post dividers written before the PLL locked"
            );
            self.record_write(PllOp::SetPostDividers);
            let mut current = self.config.get();
            current.postdiv1 = config.postdiv1;
            current.postdiv2 = config.postdiv2;
            self.config.set(current);
        }

        fn power_on_post_dividers(&self) {
            self.record_write(PllOp::PowerOnPostDividers);
        }
    }

    struct CountingResets {
        cycles: Cell<usize>,
    }

    impl CountingResets {
        fn new() -> CountingResets {
            CountingResets {
                cycles: Cell::new(0),
            }
        }
    }

    impl ResetControl for CountingResets {
        fn reset(&self, _peripheral: Peripheral) {
            self.cycles.set(self.cycles.get() + 1);
        }

        fn release(&self, _peripheral: Peripheral) {}
    }

    fn sys_config() -> PllConfig {
        PllConfig::new(1, 133, 6, 2)
    }

    #[test]
    fn pll_configuration_runs_in_order() {
        let pll = ScriptedPll::new(2);
        let resets = CountingResets::new();
        configure_pll(&pll, &resets, &sys_config());

        let (log, len) = pll.ops();
        assert_eq!(
            &log[..len],
            &[
                // Idempotence probe.
                Some(PllOp::ObserveLock),
                Some(PllOp::LoadDividers),
                Some(PllOp::PowerOnVco),
                // Two polls miss, the third sees the lock.
                Some(PllOp::ObserveLock),
                Some(PllOp::ObserveLock),
                Some(PllOp::ObserveLock),
                Some(PllOp::SetPostDividers),
                Some(PllOp::PowerOnPostDividers),
            ]
        );
        assert_eq!(resets.cycles.get(), 1);
    }

    #[test]
    fn locked_pll_with_matching_dividers_is_untouched() {
        let pll = ScriptedPll::new(0);
        let resets = CountingResets::new();
        configure_pll(&pll, &resets, &sys_config());

        let writes_after_first = pll.register_writes.get();
        configure_pll(&pll, &resets, &sys_config());

        assert_eq!(pll.register_writes.get(), writes_after_first);
        assert_eq!(resets.cycles.get(), 1);
    }

    #[test]
    fn locked_pll_with_different_dividers_is_reconfigured() {
        let pll = ScriptedPll::new(0);
        let resets = CountingResets::new();
        configure_pll(&pll, &resets, &sys_config());

        // Same VCO, different post dividers.
        configure_pll(&pll, &resets, &PllConfig::new(1, 133, 4, 3));

        assert_eq!(resets.cycles.get(), 2);
        assert_eq!(pll.configuration(), PllConfig::new(1, 133, 4, 3));
    }

    #[derive(Copy, Clone, Debug, PartialEq)]
    enum MuxWrite {
        Source(SystemClockSource),
        AuxiliarySource(SystemAuxiliaryClockSource),
    }

    struct ScriptedSystemMux {
        source: Cell<SystemClockSource>,
        writes: RefCell<[Option<MuxWrite>; 8]>,
        writes_len: Cell<usize>,
    }

    impl ScriptedSystemMux {
        fn new() -> ScriptedSystemMux {
            ScriptedSystemMux {
                source: Cell::new(SystemClockSource::Reference),
                writes: RefCell::new([None; 8]),
                writes_len: Cell::new(0),
            }
        }

        fn record(&self, write: MuxWrite) {
            let len = self.writes_len.get();
            self.writes.borrow_mut()[len] = Some(write);
            self.writes_len.set(len + 1);
        }
    }

    impl SystemClockMux for ScriptedSystemMux {
        fn set_system_source(&self, source: SystemClockSource) {
            self.record(MuxWrite::Source(source));
            self.source.set(source);
        }

        fn set_system_auxiliary_source(&self, source: SystemAuxiliaryClockSource) {
            self.record(MuxWrite::AuxiliarySource(source));
        }

        fn system_source_selected(&self, source: SystemClockSource) -> bool {
            self.source.get() == source
        }
    }

    #[test]
    fn switch_to_aux_parks_on_reference_and_flips_last() {
        let mux = ScriptedSystemMux::new();
        switch_system_clock(
            &mux,
            SystemClockSource::Auxiliary,
            SystemAuxiliaryClockSource::PllSys,
        );

        let writes = *mux.writes.borrow();
        assert_eq!(
            &writes[..mux.writes_len.get()],
            &[
                Some(MuxWrite::Source(SystemClockSource::Reference)),
                Some(MuxWrite::AuxiliarySource(SystemAuxiliaryClockSource::PllSys)),
                Some(MuxWrite::Source(SystemClockSource::Auxiliary)),
            ]
        );
    }

    #[test]
    fn switch_to_reference_needs_no_parking_step() {
        let mux = ScriptedSystemMux::new();
        switch_system_clock(
            &mux,
            SystemClockSource::Reference,
            SystemAuxiliaryClockSource::PllSys,
        );

        let writes = *mux.writes.borrow();
        assert_eq!(
            &writes[..mux.writes_len.get()],
            &[
                Some(MuxWrite::AuxiliarySource(SystemAuxiliaryClockSource::PllSys)),
                Some(MuxWrite::Source(SystemClockSource::Reference)),
            ]
        );
    }

    #[test]
    fn pico_plan_hits_the_documented_frequencies() {
        let plan = ClockPlan::pico();
        assert_eq!(plan.sys_pll.vco_frequency(plan.crystal_hz), 1_596_000_000);
        assert_eq!(plan.sys_pll.frequency(plan.crystal_hz), 133_000_000);
        assert_eq!(plan.usb_pll.vco_frequency(plan.crystal_hz), 1_440_000_000);
        assert_eq!(plan.usb_pll.frequency(plan.crystal_hz), 48_000_000);
        plan.sys_pll.validate(plan.crystal_hz);
        plan.usb_pll.validate(plan.crystal_hz);
    }

    #[test]
    fn unity_divider_is_one_in_24_8_fixed_point() {
        assert_eq!(divider_for(12_000_000, 12_000_000), 1 << 8);
        assert_eq!(divider_for(48_000_000, 48_000_000), 1 << 8);
        assert_eq!(divider_for(48_000_000, 12_000_000), 4 << 8);
    }

    #[test]
    #[should_panic(expected = "feedback divider")]
    fn fbdiv_below_16_is_rejected() {
        let _ = PllConfig::new(1, 15, 6, 2);
    }

    #[test]
    #[should_panic(expected = "post divider")]
    fn postdiv_zero_is_rejected() {
        let _ = PllConfig::new(1, 133, 0, 2);
    }

    #[test]
    #[should_panic(expected = "postdiv2 must not exceed postdiv1")]
    fn postdiv2_above_postdiv1_is_rejected() {
        let _ = PllConfig::new(1, 133, 2, 6);
    }

    #[test]
    #[should_panic(expected = "VCO frequency")]
    fn vco_below_range_is_rejected() {
        PllConfig::new(1, 16, 1, 1).validate(12_000_000);
    }

    #[test]
    #[should_panic(expected = "VCO frequency")]
    fn vco_above_range_is_rejected() {
        // 12 MHz * 320 = 3.84 GHz.
        PllConfig::new(1, 320, 7, 7).validate(12_000_000);
    }

    #[test]
    #[should_panic(expected = "refdiv")]
    fn refdiv_zero_is_rejected() {
        let _ = PllConfig::new(0, 133, 6, 2);
    }
}
