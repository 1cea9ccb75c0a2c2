//! Core Types für die LED-Steuerung
//!
//! Datenstrukturen ohne Hardware-Dependencies

use rgb::RGB8;

/// LED Command für den LED-Task
///
/// Wird vom Link-Task (Kommando-Verarbeitung) an den LED-Task gesendet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LedCommand {
    /// Setze LED auf eine spezifische Farbe
    SetColor {
        target_color: RGB8,
        name: &'static str,
    },
    /// Fehler-Muster anzeigen (terminal, nur Reset beendet es)
    Fault,
}

impl LedCommand {
    /// Kommando aus Farbname mit gegebener Helligkeit
    ///
    /// Namen sind ASCII, da sie über die Leitung kommen.
    pub fn from_name(name: &str, brightness: u8) -> Option<Self> {
        let (target_color, name) = match name {
            "rot" => (RGB8 { r: brightness, g: 0, b: 0 }, "rot"),
            "gruen" => (RGB8 { r: 0, g: brightness, b: 0 }, "gruen"),
            "blau" => (RGB8 { r: 0, g: 0, b: brightness }, "blau"),
            "weiss" => (
                RGB8 {
                    r: brightness,
                    g: brightness,
                    b: brightness,
                },
                "weiss",
            ),
            "aus" => (RGB8::default(), "aus"),
            _ => return None,
        };
        Some(Self::SetColor { target_color, name })
    }
}

// ============================================================================
// defmt::Format Implementations (optional feature)
// ============================================================================

#[cfg(feature = "defmt")]
impl defmt::Format for LedCommand {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            LedCommand::SetColor { target_color, name } => {
                defmt::write!(
                    fmt,
                    "SetColor {{ name: {}, rgb: ({}, {}, {}) }}",
                    name,
                    target_color.r,
                    target_color.g,
                    target_color.b
                )
            }
            LedCommand::Fault => {
                defmt::write!(fmt, "Fault")
            }
        }
    }
}
