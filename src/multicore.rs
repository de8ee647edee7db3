// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core 1 launch.
//!
//! After reset core 1 sleeps in the boot ROM, polling its incoming mailbox
//! FIFO. Core 0 wakes it by posting a fixed six-word sequence; core 1 echoes
//! every word it accepts, and a wrong echo restarts the whole sequence from
//! the beginning.

use crate::sio::InterCoreFifo;
use crate::sio::Sio;

/// Start core 1 at `entry`.
///
/// `vector_table` must point at a vector table readable by core 1 (the boot
/// ROM installs it in VTOR before jumping), `stack_pointer` is the initial
/// top of core 1's stack and `entry` the (thumb) address core 1 jumps to.
///
/// ## Safety
///
/// Core 1 starts executing `entry` with no further synchronization; the
/// caller is responsible for the code and stack being ready.
pub unsafe fn launch_core1(sio: &Sio, vector_table: u32, stack_pointer: u32, entry: u32) {
    let commands = [0, 0, 1, vector_table, stack_pointer, entry];
    run_start_sequence(sio, &commands);
}

fn run_start_sequence<F: InterCoreFifo>(fifo: &F, commands: &[u32; 6]) {
    let mut seq = 0;
    while seq < commands.len() {
        let command = commands[seq];
        if command == 0 {
            // A zero resynchronizes the boot ROM state machine: throw away
            // anything it sent earlier and make sure it is awake to see the
            // drained FIFO.
            while fifo.fifo_valid() {
                let _ = fifo.read_fifo();
            }
            fifo.signal_event();
        }
        while !fifo.fifo_ready() {}
        fifo.write_fifo(command);
        // The boot ROM misses words without this extra event; the protocol
        // as documented does not require it.
        fifo.signal_event();
        while !fifo.fifo_valid() {}
        let response = fifo.read_fifo();
        if response == command {
            seq += 1;
        } else {
            seq = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::{Cell, RefCell};

    const FIFO_DEPTH: usize = 8;

    /// Scripted stand-in for core 1's end of the mailbox: echoes each word
    /// it receives, optionally corrupting the echo of one posted word, and
    /// counts every FIFO access and event.
    struct ScriptedCore1 {
        inbound: RefCell<[u32; FIFO_DEPTH]>,
        inbound_head: Cell<usize>,
        inbound_len: Cell<usize>,
        writes: RefCell<[u32; 16]>,
        writes_len: Cell<usize>,
        reads: Cell<usize>,
        events: Cell<usize>,
        // Echo the n-th posted word (counting from 0) incorrectly, once.
        corrupt_at: Cell<Option<usize>>,
    }

    impl ScriptedCore1 {
        fn new() -> ScriptedCore1 {
            ScriptedCore1 {
                inbound: RefCell::new([0; FIFO_DEPTH]),
                inbound_head: Cell::new(0),
                inbound_len: Cell::new(0),
                writes: RefCell::new([0; 16]),
                writes_len: Cell::new(0),
                reads: Cell::new(0),
                events: Cell::new(0),
                corrupt_at: Cell::new(None),
            }
        }

        fn push_inbound(&self, value: u32) {
            let len = self.inbound_len.get();
            assert!(len < FIFO_DEPTH, "scripted FIFO overflow");
            let tail = (self.inbound_head.get() + len) % FIFO_DEPTH;
            self.inbound.borrow_mut()[tail] = value;
            self.inbound_len.set(len + 1);
        }

        fn posted_words(&self) -> ([u32; 16], usize) {
            (*self.writes.borrow(), self.writes_len.get())
        }
    }

    impl InterCoreFifo for ScriptedCore1 {
        fn fifo_ready(&self) -> bool {
            true
        }

        fn fifo_valid(&self) -> bool {
            self.inbound_len.get() > 0
        }

        fn write_fifo(&self, value: u32) {
            let n = self.writes_len.get();
            self.writes.borrow_mut()[n] = value;
            self.writes_len.set(n + 1);

            let echo = match self.corrupt_at.get() {
                Some(at) if at == n => {
                    self.corrupt_at.set(None);
                    !value
                }
                _ => value,
            };
            self.push_inbound(echo);
        }

        fn read_fifo(&self) -> u32 {
            let len = self.inbound_len.get();
            assert!(len > 0, "read from empty scripted FIFO");
            let head = self.inbound_head.get();
            let value = self.inbound.borrow()[head];
            self.inbound_head.set((head + 1) % FIFO_DEPTH);
            self.inbound_len.set(len - 1);
            self.reads.set(self.reads.get() + 1);
            value
        }

        fn signal_event(&self) {
            self.events.set(self.events.get() + 1);
        }
    }

    const COMMANDS: [u32; 6] = [0, 0, 1, 0x2000_0100, 0x2004_2000, 0x1000_02c1];

    #[test]
    fn clean_echo_terminates_after_one_pass() {
        let core1 = ScriptedCore1::new();
        run_start_sequence(&core1, &COMMANDS);

        let (words, n) = core1.posted_words();
        assert_eq!(&words[..n], &COMMANDS);
        assert_eq!(core1.reads.get(), 6);
        // One event per posted word plus one per drain of the two zeros.
        assert_eq!(core1.events.get(), 8);
    }

    #[test]
    fn stale_words_are_drained_before_the_first_zero() {
        let core1 = ScriptedCore1::new();
        core1.push_inbound(0xdead);
        core1.push_inbound(0xbeef);
        core1.push_inbound(0x0777);
        run_start_sequence(&core1, &COMMANDS);

        let (words, n) = core1.posted_words();
        assert_eq!(&words[..n], &COMMANDS);
        // Three stale reads plus the six echoes.
        assert_eq!(core1.reads.get(), 9);
    }

    #[test]
    fn wrong_echo_restarts_the_whole_sequence() {
        let core1 = ScriptedCore1::new();
        // Corrupt the echo of the fourth posted word (the vector table).
        core1.corrupt_at.set(Some(3));
        run_start_sequence(&core1, &COMMANDS);

        let (words, n) = core1.posted_words();
        // First pass stops after the corrupted word; the retry posts the
        // sequence from the top.
        assert_eq!(&words[..4], &COMMANDS[..4]);
        assert_eq!(&words[4..n], &COMMANDS);
        assert_eq!(n, 10);
    }
}
