// Projekt-Konfiguration: Konstanten und Hardware-Zuordnungen
#![allow(dead_code)]

use ledtree_core::LinkConfig;

// ============================================================================
// LED Konfiguration
// ============================================================================

/// GPIO-Pin für die RGB Status-LED (WS2812/Neopixel)
pub const LED_GPIO_PIN: u8 = 8;

/// Helligkeits-Level für Farb-Kommandos (0-255)
/// Wert ist gedimmt für Augenschonung
pub const LED_BRIGHTNESS: u8 = 10;

/// RMT Taktfrequenz in MHz
/// 80 MHz ist optimal für WS2812 LED-Timing
pub const RMT_CLOCK_MHZ: u32 = 80;

/// Kapazität des LED-Kommando-Channels
pub const LED_COMMAND_QUEUE: usize = 4;

// ============================================================================
// Leitungs-Pins
// ============================================================================

/// GPIO für die Leitung zum Eltern-Knoten
pub const PARENT_GPIO_PIN: u8 = 2;

/// GPIO für die Leitung zu Kind 0
pub const CHILD0_GPIO_PIN: u8 = 3;

/// GPIO für die Leitung zu Kind 1
pub const CHILD1_GPIO_PIN: u8 = 4;

// ============================================================================
// Link-Protokoll
// ============================================================================

/// Einheit des Pulsdauer-Codes in µs
/// Muss nicht mit den Nachbarn übereinstimmen, jedes Byte kalibriert neu
pub const LINK_UNIT_US: u32 = 500;

/// Slot-Breite in Einheiten (mindestens 3)
pub const LINK_SLOT_UNITS: u32 = 4;

/// Wartezeit vor dem Senden, damit die Gegenseite auf Eingang umschalten kann
/// Untergrenze; nach Verkehr der Gegenseite wird mindestens ein Slot in deren Einheit gewartet
pub const LINK_TURNAROUND_US: u32 = 2_000;

/// Maximale Pause zwischen zwei Flanken innerhalb einer Zeile
pub const LINK_BYTE_TIMEOUT_US: u32 = 10_000;

/// Wartezeit auf die Quittung nach dem Senden
pub const LINK_ACK_TIMEOUT_US: u32 = 60_000;

/// Wartezeit auf die Antwortzeile eines Kind-Knotens
/// Ein Kind kann seinerseits weiterleiten, daher großzügig
pub const LINK_REPLY_TIMEOUT_US: u32 = 1_500_000;

/// Sendeversuche bis `RetriesExhausted`
pub const LINK_MAX_ATTEMPTS: u8 = 5;

/// Link-Konfiguration aus den obigen Konstanten
pub fn link_config() -> LinkConfig {
    LinkConfig::default()
        .with_unit_us(LINK_UNIT_US)
        .with_slot_units(LINK_SLOT_UNITS)
        .with_turnaround_us(LINK_TURNAROUND_US)
        .with_byte_timeout_us(LINK_BYTE_TIMEOUT_US)
        .with_ack_timeout_us(LINK_ACK_TIMEOUT_US)
        .with_reply_timeout_us(LINK_REPLY_TIMEOUT_US)
        .with_max_attempts(LINK_MAX_ATTEMPTS)
}
