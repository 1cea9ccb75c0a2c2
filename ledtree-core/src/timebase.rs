//! Timebase: monotone Zeitstempel aus Hardware-Zähler + Überlauf-Zähler
//!
//! Ein Tick entspricht einer Mikrosekunde. Der Hardware-Zähler ist 16 Bit
//! breit, die Anzahl der Überläufe wird in Software mitgezählt. Zwischen zwei
//! Zeitstempeln darf höchstens EIN Überlauf liegen, sonst ist die Differenz
//! nicht mehr eindeutig (`TimingFault`).

/// Wertebereich des Hardware-Zählers (16 Bit)
pub const COUNTER_RANGE: u32 = 1 << 16;

/// Zeitdauer in Zähler-Ticks (Mikrosekunden)
pub type Ticks = u32;

/// Zeitpunkt: Überlauf-Zähler + aktueller Zählerstand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timestamp {
    pub overflows: u16,
    pub counter: u16,
}

impl Timestamp {
    pub const fn new(overflows: u16, counter: u16) -> Self {
        Self { overflows, counter }
    }

    /// Zerlegt einen breiten Tick-Zähler (z.B. 64-Bit Systemzeit in µs)
    /// in Zählerstand und Überlauf-Anzahl.
    pub const fn from_ticks(ticks: u64) -> Self {
        Self {
            overflows: (ticks >> 16) as u16,
            counter: ticks as u16,
        }
    }
}

/// Zwei oder mehr Zähler-Überläufe zwischen zwei Zeitstempeln
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimingFault;

impl core::fmt::Display for TimingFault {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("timestamp gap exceeds counter range")
    }
}

/// Vergangene Zeit zwischen `start` und `end`
///
/// - kein Überlauf, `start <= end`: `end - start`
/// - genau ein Überlauf, `end < start`: `COUNTER_RANGE - start + end`
/// - alles andere: `TimingFault` (wird nicht stillschweigend umgerechnet)
pub fn elapsed(start: Timestamp, end: Timestamp) -> Result<Ticks, TimingFault> {
    let start_count = u32::from(start.counter);
    let end_count = u32::from(end.counter);

    match end.overflows.wrapping_sub(start.overflows) {
        0 if start_count <= end_count => Ok(end_count - start_count),
        1 if end_count < start_count => Ok(COUNTER_RANGE - start_count + end_count),
        _ => Err(TimingFault),
    }
}

/// Zeitquelle für das Link-Protokoll
///
/// # Implementierungen
/// - **Production:** SystemClock (ESP32 SYSTIMER, µs seit Boot)
/// - **Testing:** simulierte Uhr im Test-Bus
pub trait Clock {
    fn now(&self) -> Timestamp;
}

/// Summiert kurze Intervalle auf, damit auch Wartezeiten länger als
/// `COUNTER_RANGE` gemessen werden können.
///
/// Jeder Aufruf von `update()` darf nur ein Intervall unterhalb des
/// Zählerbereichs abdecken.
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    last: Timestamp,
    total: Ticks,
}

impl Stopwatch {
    pub fn start(now: Timestamp) -> Self {
        Self { last: now, total: 0 }
    }

    /// Liefert die seit `start()` vergangene Gesamtzeit
    pub fn update(&mut self, now: Timestamp) -> Result<Ticks, TimingFault> {
        let step = elapsed(self.last, now)?;
        self.last = now;
        self.total = self.total.saturating_add(step);
        Ok(self.total)
    }
}
