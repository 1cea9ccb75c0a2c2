//! Flanken-Erfassung und Übergabe an den Decoder
//!
//! Der Interrupt-Handler (Producer) schreibt jede Flanke der überwachten
//! Leitung in einen Puffer mit genau EINEM Platz. Die Hauptschleife
//! (Consumer) holt das Ereignis mit `try_recv()` ab.
//!
//! Ist der Platz beim nächsten Interrupt noch belegt, bleibt das alte
//! Ereignis erhalten, das neue wird verworfen und das Flag `DataLost` wird
//! gesetzt. Das Flag bleibt bis zum Reset gesetzt.

use core::cell::Cell;

use critical_section::Mutex;

use crate::timebase::Timestamp;

/// Richtung der Flanke
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EdgeKind {
    Rising,
    Falling,
}

impl EdgeKind {
    /// Leitet die Flanke aus dem Pegel NACH dem Wechsel ab:
    /// Leitung high → es war eine steigende Flanke.
    pub fn from_level(line_high: bool) -> Self {
        if line_high {
            EdgeKind::Rising
        } else {
            EdgeKind::Falling
        }
    }
}

/// Eine erfasste Flanke mit Zeitstempel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EdgeEvent {
    pub kind: EdgeKind,
    pub time: Timestamp,
}

/// Überlauf des Ereignis-Puffers (sticky, fatal)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DataLost;

impl core::fmt::Display for DataLost {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("edge event overrun")
    }
}

/// Single-Slot Queue zwischen Interrupt und Hauptschleife
///
/// Wird als `static` angelegt, der Interrupt-Handler ruft `capture()` auf,
/// der Decoder-Pfad `try_recv()`.
pub struct EventPort {
    slot: Mutex<Cell<Option<EdgeEvent>>>,
    data_lost: Mutex<Cell<bool>>,
}

impl EventPort {
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(Cell::new(None)),
            data_lost: Mutex::new(Cell::new(false)),
        }
    }

    /// Interrupt-Seite: Flanke erfassen
    ///
    /// `line_high` ist der aktuelle Pegel der Leitung, `now` der Zeitpunkt
    /// der Flanke.
    pub fn capture(&self, line_high: bool, now: Timestamp) {
        let event = EdgeEvent {
            kind: EdgeKind::from_level(line_high),
            time: now,
        };

        critical_section::with(|cs| {
            let slot = self.slot.borrow(cs);
            if slot.get().is_some() {
                self.data_lost.borrow(cs).set(true);
            } else {
                slot.set(Some(event));
            }
        });
    }

    /// Hauptschleifen-Seite: Ereignis abholen (non-blocking)
    ///
    /// Lesen und Leeren passieren in einer Critical Section.
    /// Nach einem Überlauf liefert die Funktion nur noch `Err(DataLost)`.
    pub fn try_recv(&self) -> Result<Option<EdgeEvent>, DataLost> {
        critical_section::with(|cs| {
            if self.data_lost.borrow(cs).get() {
                return Err(DataLost);
            }
            Ok(self.slot.borrow(cs).take())
        })
    }

    pub fn is_data_lost(&self) -> bool {
        critical_section::with(|cs| self.data_lost.borrow(cs).get())
    }

    /// Verwirft ein noch anstehendes Ereignis (z.B. nach Richtungswechsel).
    /// Das `DataLost`-Flag bleibt unverändert.
    pub fn discard(&self) {
        critical_section::with(|cs| {
            self.slot.borrow(cs).set(None);
        });
    }
}

impl Default for EventPort {
    fn default() -> Self {
        Self::new()
    }
}
