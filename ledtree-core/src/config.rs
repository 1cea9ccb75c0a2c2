//! Timing- und Retry-Parameter des Link-Protokolls

use crate::timebase::{COUNTER_RANGE, Ticks};

/// Parameter für Encoder, Decoder und CommandLink
///
/// Alle Zeiten in Mikrosekunden (= Timebase-Ticks).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LinkConfig {
    /// Dauer einer Einheit (Referenz-Puls, 0-Bit)
    pub unit_us: u32,
    /// Slot-Breite in Einheiten (High + Low pro Puls)
    pub slot_units: u32,
    /// Pause nach dem Umschalten auf Output, bevor gesendet wird
    pub turnaround_us: u32,
    /// Maximale Pause zwischen zwei Flanken innerhalb einer Zeile
    pub byte_timeout_us: Ticks,
    /// Wartezeit auf das Quittungs-Byte
    pub ack_timeout_us: Ticks,
    /// Wartezeit auf eine komplette Antwort-Zeile
    pub reply_timeout_us: Ticks,
    /// Maximale Sendeversuche pro Zeile
    pub max_attempts: u8,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            unit_us: 500,
            slot_units: 4,
            turnaround_us: 2_000,
            byte_timeout_us: 10_000,
            ack_timeout_us: 60_000,
            reply_timeout_us: 1_500_000,
            max_attempts: 5,
        }
    }
}

impl LinkConfig {
    pub fn with_unit_us(mut self, unit_us: u32) -> Self {
        self.unit_us = unit_us;
        self
    }

    pub fn with_slot_units(mut self, slot_units: u32) -> Self {
        self.slot_units = slot_units;
        self
    }

    pub fn with_turnaround_us(mut self, turnaround_us: u32) -> Self {
        self.turnaround_us = turnaround_us;
        self
    }

    pub fn with_byte_timeout_us(mut self, timeout: Ticks) -> Self {
        self.byte_timeout_us = timeout;
        self
    }

    pub fn with_ack_timeout_us(mut self, timeout: Ticks) -> Self {
        self.ack_timeout_us = timeout;
        self
    }

    pub fn with_reply_timeout_us(mut self, timeout: Ticks) -> Self {
        self.reply_timeout_us = timeout;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u8) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Slot-Breite in Mikrosekunden
    pub fn slot_us(&self) -> u32 {
        self.unit_us.saturating_mul(self.slot_units)
    }

    /// Prüft die Parameter auf Konsistenz
    ///
    /// - nach einem 1-Bit (zwei Einheiten High) muss mindestens eine Einheit
    ///   Low folgen, also mindestens drei Einheiten pro Slot
    /// - der Flanken-Timeout muss unterhalb des Zählerbereichs liegen,
    ///   sonst ist er mit `elapsed()` nicht messbar
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.unit_us == 0 {
            return Err(ConfigError::ZeroUnit);
        }
        if self.slot_units < 3 {
            return Err(ConfigError::SlotTooShort);
        }
        if self.slot_us() >= COUNTER_RANGE || self.byte_timeout_us >= COUNTER_RANGE {
            return Err(ConfigError::TimeoutOutOfRange);
        }
        if self.byte_timeout_us <= self.slot_us() {
            return Err(ConfigError::TimeoutOutOfRange);
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::NoAttempts);
        }
        Ok(())
    }
}

/// Ungültige `LinkConfig`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    ZeroUnit,
    SlotTooShort,
    TimeoutOutOfRange,
    NoAttempts,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ConfigError::ZeroUnit => f.write_str("unit duration must not be zero"),
            ConfigError::SlotTooShort => f.write_str("slot must span at least three units"),
            ConfigError::TimeoutOutOfRange => {
                f.write_str("byte timeout must lie between slot width and counter range")
            }
            ConfigError::NoAttempts => f.write_str("at least one send attempt required"),
        }
    }
}
