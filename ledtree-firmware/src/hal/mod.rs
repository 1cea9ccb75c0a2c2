// Hardware Abstraction Layer (HAL) Module
//
// Implementiert die Traits aus ledtree-core für den ESP32-C6:
// Leitungs-Pins + Flanken-Interrupt, Zeitquelle, Status-LED.

pub mod clock;
pub mod led_writer;
pub mod line_pins;

pub use clock::SystemClock;
pub use led_writer::RmtLedWriter;
pub use line_pins::{EDGE_EVENTS, FlexLinePins, edge_capture_handler};
