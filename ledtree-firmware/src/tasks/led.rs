// LED Task - Status-LED über RMT Peripheral
use defmt::{error, info, warn};
use embassy_time::{Duration, Timer};
use esp_hal_smartled::smart_led_buffer;
use ledtree_core::FaultPattern;
use rgb::RGB8;

use crate::config::RMT_CLOCK_MHZ;
use crate::hal::RmtLedWriter;
use crate::{LedCommand, LedCommandReceiver, SmartLedWriter};

/// Wartezeit, wenn die LED im Fehler-Muster nicht geschrieben werden kann
const FAULT_RETRY_MS: u64 = 500;

/// LED Logic - Business Logic ohne Hardware-Abhängigkeit
///
/// - Startet mit ausgeschalteter LED
/// - Setzt Farben aus `SetColor`-Kommandos des Link-Tasks
/// - Bei `Fault`: Fehler-Muster, endlos (nur Reset beendet es)
///
/// # Trait-basierte Abstraktion
/// Der generische Parameter `L: SmartLedWriter` ermöglicht:
/// - Real Hardware (RmtLedWriter) im Production-Code
/// - Mock Implementation (MockLedWriter) in Tests
pub async fn led_logic<L: SmartLedWriter>(mut led: L, command_receiver: LedCommandReceiver) -> ! {
    if led.write(RGB8::default()).is_err() {
        error!("LED: initial write failed");
    }

    loop {
        match command_receiver.receive().await {
            LedCommand::SetColor { target_color, name } => {
                info!("LED: {}", name);
                if let Err(e) = led.write(target_color) {
                    error!("LED: write failed: {}", e);
                }
            }
            LedCommand::Fault => show_fault(&mut led).await,
        }
    }
}

async fn show_fault<L: SmartLedWriter>(led: &mut L) -> ! {
    warn!("LED: showing fault pattern");
    let mut pattern = FaultPattern::new();
    loop {
        let hold_ms = match pattern.show_next(led) {
            Ok(hold_ms) => u64::from(hold_ms),
            Err(e) => {
                error!("LED: write failed: {}", e);
                FAULT_RETRY_MS
            }
        };
        Timer::after(Duration::from_millis(hold_ms)).await;
    }
}

/// LED Task - Embassy Task für parallele Ausführung
///
/// Initialisiert die Hardware und ruft dann `led_logic()` auf.
///
/// # Parameter
/// - `gpio8`: GPIO8 Peripheral für LED-Datenleitung
/// - `rmt_peripheral`: RMT Peripheral für präzises Timing
/// - `command_receiver`: Channel Receiver für Kommandos des Link-Tasks
#[embassy_executor::task]
pub async fn led_task(
    gpio8: esp_hal::peripherals::GPIO8<'static>,
    rmt_peripheral: esp_hal::peripherals::RMT<'static>,
    command_receiver: LedCommandReceiver,
) {
    // Buffer für SmartLED Daten erstellen (1 LED)
    let mut rmt_buffer = smart_led_buffer!(1);

    let led = match RmtLedWriter::new(gpio8, rmt_peripheral, RMT_CLOCK_MHZ, &mut rmt_buffer) {
        Ok(led) => led,
        Err(e) => {
            error!("LED: RMT init failed: {}", e);
            return;
        }
    };

    led_logic(led, command_receiver).await
}
