//! Simulated loopback serial port for exercising the exchange engine on the
//! host. Every transmitted byte is echoed into the receive FIFO, so a test
//! can tell exactly which wire byte an operation ended up observing.

use core::cell::Cell;
use core::convert::Infallible;

use std::collections::VecDeque;
use std::vec::Vec;

use embedded_hal::digital::v2::OutputPin;

use super::{DmaSink, DmaSource, SspDma, FIFO_DEPTH};

#[derive(Default)]
pub(crate) struct SimPin {
    pub high: Cell<bool>,
}

impl OutputPin for SimPin {
    type Error = Infallible;

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.high.set(true);
        Ok(())
    }

    fn set_low(&mut self) -> Result<(), Infallible> {
        self.high.set(false);
        Ok(())
    }
}

pub(crate) struct SimSsp {
    fifo: VecDeque<u8>,
    transmitted: Vec<u8>,
    tx_done: bool,
    rx_done: bool,
    overrun: bool,
    force_overrun: bool,
    aborted: bool,
    pub bits: u8,
    pub mode: u8,
    pub frequency: u32,
}

impl SimSsp {
    pub fn new() -> Self {
        Self {
            fifo: VecDeque::new(),
            transmitted: Vec::new(),
            tx_done: false,
            rx_done: false,
            overrun: false,
            force_overrun: false,
            aborted: false,
            bits: 0,
            mode: 0xFF,
            frequency: 0,
        }
    }

    /// Every byte ever pushed toward the wire, in order.
    pub fn transmitted(&self) -> &[u8] {
        &self.transmitted
    }

    /// Make the next bulk transfer overflow the receive FIFO partway
    /// through, leaving stale bytes behind for the recovery path to drain.
    pub fn force_overrun(&mut self) {
        self.force_overrun = true;
    }

    pub fn receive_aborted(&self) -> bool {
        self.aborted
    }
}

impl SspDma for SimSsp {
    fn configure(&mut self, bits: u8, mode: u8) {
        self.bits = bits;
        self.mode = mode;
    }

    fn set_frequency(&mut self, hz: u32) {
        self.frequency = hz;
    }

    fn is_readable(&self) -> bool {
        !self.fifo.is_empty()
    }

    fn is_writeable(&self) -> bool {
        true
    }

    fn is_busy(&self) -> bool {
        false
    }

    fn read_data(&mut self) -> u8 {
        self.fifo.pop_front().unwrap_or(0xFF)
    }

    fn write_data(&mut self, byte: u8) {
        self.transmitted.push(byte);
        if self.fifo.len() >= FIFO_DEPTH {
            self.overrun = true;
        } else {
            self.fifo.push_back(byte);
        }
    }

    fn rx_overrun(&self) -> bool {
        self.overrun
    }

    fn clear_rx_overrun(&mut self) {
        self.overrun = false;
    }

    fn start_transfer(&mut self, source: DmaSource, sink: DmaSink) {
        self.tx_done = true;
        if self.force_overrun {
            self.force_overrun = false;
            self.overrun = true;
            self.rx_done = false;
            // Model a partially filled FIFO at the moment of overflow.
            self.fifo.extend([0xEE, 0xEE, 0xEE]);
            return;
        }

        let mut delivered = 0usize;
        let mut deliver = |byte: u8, delivered: &mut usize| {
            if *delivered < sink.count {
                let offset = if sink.increment { *delivered } else { 0 };
                unsafe { *sink.address.add(offset) = byte };
                *delivered += 1;
            }
        };

        // The receive channel services whatever is already in the FIFO
        // before the new beats arrive.
        while let Some(byte) = self.fifo.pop_front() {
            deliver(byte, &mut delivered);
        }
        for beat in 0..source.count {
            let offset = if source.increment { beat } else { 0 };
            let byte = unsafe { *source.address.add(offset) };
            self.transmitted.push(byte);
            if delivered < sink.count {
                deliver(byte, &mut delivered);
            } else {
                self.fifo.push_back(byte);
            }
        }
        self.rx_done = true;
    }

    fn tx_complete(&self) -> bool {
        self.tx_done
    }

    fn rx_complete(&self) -> bool {
        self.rx_done
    }

    fn abort_receive(&mut self) {
        self.aborted = true;
    }

    fn stop_transfer(&mut self) {
        self.tx_done = false;
        self.rx_done = false;
    }
}
