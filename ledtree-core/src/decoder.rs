//! Selbst-kalibrierender Pulsdauer-Decoder
//!
//! Wandelt Flanken-Ereignisse in Bytes und Bytes in Kommando-Zeilen um.
//!
//! # Leitungsformat
//!
//! ```text
//!  Referenz   Bit 0 (=1)   Bit 1 (=0)         Bit 7
//!  ┌──┐       ┌────┐       ┌──┐               ┌──┐
//! ─┘  └───────┘    └───────┘  └─────── ... ───┘  └──────
//!  |  Slot   |   Slot     |   Slot    |
//! ```
//!
//! Der erste High-Puls eines Bytes ist der Referenz-Puls: seine Länge ist die
//! Einheit `d` für die folgenden acht Bits (LSB zuerst). Ein Puls, der um mehr
//! als `d / 2` von `d` abweicht, ist eine 1, sonst eine 0.
//!
//! Nach jedem Byte wird die Kalibrierung verworfen. Zwei Knoten ohne
//! gemeinsamen Takt müssen deshalb nur innerhalb eines Bytes übereinstimmen.

use heapless::Vec;

use crate::edge::{EdgeEvent, EdgeKind};
use crate::timebase::{Ticks, Timestamp, elapsed};

/// Zeilenende
pub const TERMINATOR: u8 = b'\n';

/// Maximale Nutzlast einer Zeile (Puffer 32 = 31 Bytes + Zeilenende)
pub const MAX_COMMAND_LEN: usize = 31;

/// Kommando-Zeile ohne Zeilenende
pub type Command = Vec<u8, MAX_COMMAND_LEN>;

/// Behebbare Decoder-Fehler; der Decoder ist danach wieder im Ruhezustand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// Zeile länger als `MAX_COMMAND_LEN`, Rest bis zum Zeilenende wird übersprungen
    Overflow,
    /// Zu lange Pause zwischen zwei Flanken mitten in Byte oder Zeile
    Timeout,
    /// Puls länger als der Zählerbereich
    Timing,
}

impl core::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DecodeError::Overflow => f.write_str("line buffer overflow"),
            DecodeError::Timeout => f.write_str("inter-byte timeout"),
            DecodeError::Timing => f.write_str("pulse exceeds counter range"),
        }
    }
}

pub struct PulseDecoder {
    timeout: Ticks,
    reference: Option<Ticks>,
    rise: Option<Timestamp>,
    last_edge: Option<Timestamp>,
    bit_index: u8,
    byte: u8,
    line: Command,
    resync: bool,
    last_unit: Option<Ticks>,
}

impl PulseDecoder {
    /// `timeout`: maximale Pause zwischen zwei Flanken, bevor ein halb
    /// empfangenes Byte bzw. eine halbe Zeile verworfen wird.
    pub fn new(timeout: Ticks) -> Self {
        Self {
            timeout,
            reference: None,
            rise: None,
            last_edge: None,
            bit_index: 0,
            byte: 0,
            line: Vec::new(),
            resync: false,
            last_unit: None,
        }
    }

    /// Zurück in den Ruhezustand (wartet auf Referenz-Puls, leere Zeile)
    pub fn reset(&mut self) {
        self.reference = None;
        self.rise = None;
        self.last_edge = None;
        self.bit_index = 0;
        self.byte = 0;
        self.line.clear();
        self.resync = false;
        self.last_unit = None;
    }

    /// Einheit des zuletzt vollständig empfangenen Bytes
    ///
    /// Bleibt bis zum nächsten `reset()` erhalten; daraus ergibt sich, wie
    /// lange die Gegenseite nach ihrer letzten Flanke die Leitung noch hält.
    pub fn last_unit(&self) -> Option<Ticks> {
        self.last_unit
    }

    /// Kein halbes Byte und keine halbe Zeile im Puffer
    pub fn is_idle(&self) -> bool {
        self.rise.is_none()
            && self.reference.is_none()
            && self.bit_index == 0
            && self.line.is_empty()
            && !self.resync
    }

    /// Byte-Ebene: eine Flanke verarbeiten
    ///
    /// Liefert `Some(byte)` sobald acht Bits nach einem Referenz-Puls
    /// empfangen wurden.
    pub fn push_edge(&mut self, event: EdgeEvent) -> Result<Option<u8>, DecodeError> {
        self.last_edge = Some(event.time);

        match event.kind {
            EdgeKind::Rising => {
                self.rise = Some(event.time);
                Ok(None)
            }
            EdgeKind::Falling => {
                // Fallende Flanke ohne steigende: nicht synchron, ignorieren
                let Some(start) = self.rise.take() else {
                    trace!("decoder: falling edge without rising edge dropped");
                    return Ok(None);
                };

                match elapsed(start, event.time) {
                    Ok(width) => Ok(self.push_pulse(width)),
                    Err(_) => {
                        self.reset();
                        Err(DecodeError::Timing)
                    }
                }
            }
        }
    }

    fn push_pulse(&mut self, width: Ticks) -> Option<u8> {
        let Some(reference) = self.reference else {
            if width == 0 {
                trace!("decoder: zero-width reference pulse dropped");
                return None;
            }
            self.reference = Some(width);
            self.bit_index = 0;
            self.byte = 0;
            return None;
        };

        if width.abs_diff(reference) > reference / 2 {
            self.byte |= 1 << self.bit_index;
        }
        self.bit_index += 1;

        if self.bit_index < 8 {
            return None;
        }

        // Byte fertig: neu kalibrieren für das nächste Byte
        let byte = self.byte;
        self.last_unit = Some(reference);
        self.reference = None;
        self.bit_index = 0;
        self.byte = 0;
        Some(byte)
    }

    /// Zeilen-Ebene: ein empfangenes Byte anhängen
    ///
    /// Liefert die komplette Zeile beim Zeilenende. Bei Überlauf wird die
    /// Zeile verworfen und alles bis zum nächsten Zeilenende übersprungen.
    pub fn push_byte(&mut self, byte: u8) -> Result<Option<Command>, DecodeError> {
        if byte == TERMINATOR {
            if self.resync {
                self.resync = false;
                return Ok(None);
            }
            return Ok(Some(core::mem::take(&mut self.line)));
        }

        if self.resync {
            return Ok(None);
        }

        if self.line.push(byte).is_err() {
            warn!("decoder: line exceeds {} bytes, resynchronizing", MAX_COMMAND_LEN);
            self.line.clear();
            self.resync = true;
            return Err(DecodeError::Overflow);
        }
        Ok(None)
    }

    /// Flanke → Byte → Zeile
    pub fn on_edge(&mut self, event: EdgeEvent) -> Result<Option<Command>, DecodeError> {
        match self.push_edge(event)? {
            Some(byte) => self.push_byte(byte),
            None => Ok(None),
        }
    }

    /// Prüft den Flanken-Timeout
    ///
    /// Im Ruhezustand passiert nichts. Sonst wird der Decoder zurückgesetzt,
    /// wenn seit der letzten Flanke mehr als `timeout` vergangen ist.
    pub fn poll_timeout(&mut self, now: Timestamp) -> Result<(), DecodeError> {
        if self.is_idle() {
            return Ok(());
        }
        let Some(last) = self.last_edge else {
            return Ok(());
        };

        let expired = match elapsed(last, now) {
            Ok(gap) => gap > self.timeout,
            Err(_) => true,
        };
        if expired {
            debug!("decoder: timeout, {} bytes dropped", self.line.len());
            self.reset();
            return Err(DecodeError::Timeout);
        }
        Ok(())
    }
}
