//! Pulsdauer-Encoder (Sende-Seite)
//!
//! Pro Byte: Referenz-Puls (eine Einheit), dann 8 Bits LSB zuerst,
//! 1 = zwei Einheiten High, 0 = eine Einheit High. Jeder Puls wird mit Low
//! auf eine feste Slot-Breite aufgefüllt. Busy-Wait über `DelayNs`.

use embedded_hal::delay::DelayNs;

use crate::config::LinkConfig;
use crate::decoder::TERMINATOR;
use crate::link::LinkError;
use crate::port::{LinePins, PortMultiplexer};

#[derive(Debug, Clone, Copy)]
pub struct PulseEncoder {
    unit_us: u32,
    slot_us: u32,
}

impl PulseEncoder {
    pub fn new(config: &LinkConfig) -> Self {
        Self {
            unit_us: config.unit_us,
            slot_us: config.slot_us(),
        }
    }

    pub fn transmit_byte<P: LinePins, D: DelayNs>(
        &self,
        mux: &mut PortMultiplexer<P>,
        delay: &mut D,
        byte: u8,
    ) -> Result<(), LinkError> {
        self.pulse(mux, delay, self.unit_us)?;
        for bit in 0..8 {
            let high_us = if byte & (1 << bit) != 0 {
                2 * self.unit_us
            } else {
                self.unit_us
            };
            self.pulse(mux, delay, high_us)?;
        }
        Ok(())
    }

    pub fn transmit<P: LinePins, D: DelayNs>(
        &self,
        mux: &mut PortMultiplexer<P>,
        delay: &mut D,
        bytes: &[u8],
    ) -> Result<(), LinkError> {
        for &byte in bytes {
            self.transmit_byte(mux, delay, byte)?;
        }
        Ok(())
    }

    /// Nutzlast + Zeilenende
    pub fn transmit_line<P: LinePins, D: DelayNs>(
        &self,
        mux: &mut PortMultiplexer<P>,
        delay: &mut D,
        payload: &[u8],
    ) -> Result<(), LinkError> {
        self.transmit(mux, delay, payload)?;
        self.transmit_byte(mux, delay, TERMINATOR)
    }

    fn pulse<P: LinePins, D: DelayNs>(
        &self,
        mux: &mut PortMultiplexer<P>,
        delay: &mut D,
        high_us: u32,
    ) -> Result<(), LinkError> {
        mux.drive(true)?;
        delay.delay_us(high_us);
        mux.drive(false)?;
        delay.delay_us(self.slot_us.saturating_sub(high_us));
        Ok(())
    }
}
