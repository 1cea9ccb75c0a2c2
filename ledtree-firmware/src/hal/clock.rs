// Zeitquelle für das Link-Protokoll
//
// SYSTIMER zählt in µs seit Boot (64 Bit). Der Core rechnet mit einem 16-Bit
// Zähler plus Überlauf-Zähler, daher wird der Wert hier zerlegt.

use esp_hal::time::Instant;
use ledtree_core::{Clock, Timestamp};

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> Timestamp {
        Timestamp::from_ticks(Instant::now().duration_since_epoch().as_micros())
    }
}
