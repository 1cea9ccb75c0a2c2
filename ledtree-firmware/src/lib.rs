// Library-Root: Firmware eines Knotens im LED-Baum
// Keine Standard-Bibliothek (Embedded System)
#![no_std]

// Module
pub mod config;
pub mod hal;
pub mod processor;
pub mod tasks;

// Re-exports von ledtree-core
pub use ledtree_core::{CommandLink, LedCommand, LedError, SmartLedWriter};

// Embassy Channel-Typen
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};
use esp_hal::delay::Delay;

use crate::config::LED_COMMAND_QUEUE;
use crate::hal::{FlexLinePins, SystemClock};

// ============================================================================
// Type-Aliase
// ============================================================================

/// Channel für LED-Kommandos (Link Task → LED Task)
pub type LedCommandChannel = Channel<NoopRawMutex, LedCommand, LED_COMMAND_QUEUE>;

/// Sender für LED-Kommandos (Link Task sendet)
pub type LedCommandSender = Sender<'static, NoopRawMutex, LedCommand, LED_COMMAND_QUEUE>;

/// Receiver für LED-Kommandos (LED Task empfängt)
pub type LedCommandReceiver = Receiver<'static, NoopRawMutex, LedCommand, LED_COMMAND_QUEUE>;

/// Link des Knotens auf der echten Hardware
pub type NodeLink = CommandLink<'static, FlexLinePins, SystemClock, Delay>;
