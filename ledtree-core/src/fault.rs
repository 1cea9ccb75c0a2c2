//! FaultSink: terminaler Fehlerzustand nach Flanken-Überlauf
//!
//! Der Knoten kennt genau zwei Zustände. `Faulted` wird nur durch einen
//! Reset verlassen; danach wird kein Protokoll-Verkehr mehr verarbeitet und
//! die LED zeigt dauerhaft das Fehler-Muster.

use rgb::RGB8;

use crate::edge::EventPort;
use crate::link::LinkError;
use crate::traits::{LedError, SmartLedWriter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NodeState {
    Operational,
    Faulted,
}

pub struct FaultSink {
    state: NodeState,
}

impl FaultSink {
    pub const fn new() -> Self {
        Self {
            state: NodeState::Operational,
        }
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn is_faulted(&self) -> bool {
        self.state == NodeState::Faulted
    }

    /// Prüft das `DataLost`-Flag der EventPort
    pub fn check(&mut self, events: &EventPort) -> NodeState {
        if events.is_data_lost() {
            self.enter();
        }
        self.state
    }

    /// Wertet das Ergebnis einer Link-Operation aus
    pub fn observe<T>(&mut self, result: &Result<T, LinkError>) -> NodeState {
        if let Err(LinkError::DataLost) = result {
            self.enter();
        }
        self.state
    }

    fn enter(&mut self) {
        if self.state == NodeState::Operational {
            warn!("fault: edge overrun, node halted until reset");
        }
        self.state = NodeState::Faulted;
    }
}

impl Default for FaultSink {
    fn default() -> Self {
        Self::new()
    }
}

/// Ein Schritt des Fehler-Musters: Farbe für `hold_ms` anzeigen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultStep {
    pub color: RGB8,
    pub hold_ms: u32,
}

const FAULT_RED: RGB8 = RGB8 { r: 255, g: 0, b: 0 };
const DARK: RGB8 = RGB8 { r: 0, g: 0, b: 0 };

/// Doppel-Blitz rot, dann Pause; unterscheidbar von jeder Farb-Anzeige
pub const FAULT_PATTERN: [FaultStep; 4] = [
    FaultStep { color: FAULT_RED, hold_ms: 100 },
    FaultStep { color: DARK, hold_ms: 100 },
    FaultStep { color: FAULT_RED, hold_ms: 100 },
    FaultStep { color: DARK, hold_ms: 700 },
];

/// Endlos wiederholtes Fehler-Muster
#[derive(Debug, Default)]
pub struct FaultPattern {
    step: usize,
}

impl FaultPattern {
    pub fn new() -> Self {
        Self::default()
    }

    /// Nächsten Schritt auf die LED schreiben, liefert die Haltezeit
    pub fn show_next<L: SmartLedWriter>(&mut self, led: &mut L) -> Result<u32, LedError> {
        let step = self.next_step();
        led.write(step.color)?;
        Ok(step.hold_ms)
    }

    pub fn next_step(&mut self) -> FaultStep {
        let step = FAULT_PATTERN[self.step];
        self.step = (self.step + 1) % FAULT_PATTERN.len();
        step
    }
}
