//! CommandLink: Anfrage/Antwort mit Quittung und Wiederholung
//!
//! Ablauf einer Anfrage auf einer Halbduplex-Leitung:
//!
//! ```text
//! Sender                         Empfänger
//!   ── Zeile + '\n' ──────────────▶
//!   ◀────────────── Quittung (0) ──
//!   ◀──────────── Antwort + '\n' ──
//!   ── Quittung (0) ──────────────▶
//! ```
//!
//! Eine Quittung ungleich 0 (oder keine Quittung) löst eine Wiederholung aus,
//! bis `max_attempts` erreicht ist. Vor jedem Senden wartet die sendende Seite
//! `turnaround_us`, damit die Gegenseite auf Eingang umschalten konnte. Hat
//! die Gegenseite gerade gesendet, wird mindestens ein Slot in ihrer zuletzt
//! gemessenen Einheit gewartet.

use embedded_hal::delay::DelayNs;

use crate::config::{ConfigError, LinkConfig};
use crate::decoder::{Command, DecodeError, MAX_COMMAND_LEN, PulseDecoder, TERMINATOR};
use crate::edge::{DataLost, EdgeEvent, EventPort};
use crate::encoder::PulseEncoder;
use crate::port::{LinePins, LinkDirection, Port, PortMultiplexer};
use crate::timebase::{Clock, Stopwatch, Ticks, Timestamp};

/// Quittung: angenommen
pub const ACK_OK: u8 = 0;
/// Quittung: bitte wiederholen
pub const ACK_RETRY: u8 = 1;

/// Fehler des Link-Protokolls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkError {
    /// Flanken-Überlauf, fatal (siehe `FaultSink`)
    DataLost,
    /// Senden auf einem Eingang oder Lesen auf einem Ausgang
    Direction,
    /// Nutzlast zu lang oder enthält das Zeilenende
    InvalidPayload,
    /// Gegenseite hat nach `max_attempts` Versuchen nicht mit 0 quittiert
    RetriesExhausted,
    /// Keine vollständige Zeile innerhalb von `reply_timeout_us`
    Timeout,
    Decode(DecodeError),
}

impl From<DataLost> for LinkError {
    fn from(_: DataLost) -> Self {
        LinkError::DataLost
    }
}

impl From<DecodeError> for LinkError {
    fn from(e: DecodeError) -> Self {
        LinkError::Decode(e)
    }
}

impl core::fmt::Display for LinkError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            LinkError::DataLost => f.write_str("edge events lost"),
            LinkError::Direction => f.write_str("port not in required direction"),
            LinkError::InvalidPayload => f.write_str("invalid payload"),
            LinkError::RetriesExhausted => f.write_str("peer did not acknowledge"),
            LinkError::Timeout => f.write_str("no reply in time"),
            LinkError::Decode(e) => write!(f, "decode error: {}", e),
        }
    }
}

pub struct CommandLink<'a, P: LinePins, C: Clock, D: DelayNs> {
    mux: PortMultiplexer<P>,
    events: &'a EventPort,
    clock: C,
    delay: D,
    decoder: PulseDecoder,
    encoder: PulseEncoder,
    config: LinkConfig,
}

impl<'a, P: LinePins, C: Clock, D: DelayNs> CommandLink<'a, P, C, D> {
    /// Erstellt den Link, alle Ports sind danach aus (`Port::None`)
    pub fn new(
        pins: P,
        events: &'a EventPort,
        clock: C,
        delay: D,
        config: LinkConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            mux: PortMultiplexer::new(pins),
            events,
            clock,
            delay,
            decoder: PulseDecoder::new(config.byte_timeout_us),
            encoder: PulseEncoder::new(&config),
            config,
        })
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn multiplexer(&self) -> &PortMultiplexer<P> {
        &self.mux
    }

    pub fn events(&self) -> &'a EventPort {
        self.events
    }

    /// Auf `port` horchen; bei Wechsel von Port oder Richtung werden
    /// Decoder und anstehendes Ereignis verworfen.
    pub fn listen(&mut self, port: Port) {
        if self.mux.active() == port && self.mux.direction() == LinkDirection::Input {
            return;
        }
        self.mux.select(port, LinkDirection::Input);
        self.events.discard();
        self.decoder.reset();
    }

    /// Alle Ports aus, Flanken-Interrupt aus
    pub fn release(&mut self) {
        self.mux.select(Port::None, LinkDirection::Input);
        self.events.discard();
        self.decoder.reset();
    }

    /// Zeile an `port` senden und Antwort abwarten
    ///
    /// Die Antwort wird mit 0 quittiert, danach horcht der Port wieder.
    pub fn send_command(&mut self, port: Port, payload: &[u8]) -> Result<Command, LinkError> {
        check_payload(payload)?;
        self.transmit_acked(port, payload)?;

        let reply = self.await_line(port, self.config.reply_timeout_us)?;
        self.send_ack(port)?;
        Ok(reply)
    }

    /// Eine Zeile empfangen, mit `processor` beantworten
    ///
    /// Blockiert höchstens `reply_timeout_us` bis eine Zeile ankommt.
    /// Gibt die empfangene Zeile zurück.
    pub fn receive_command<F>(&mut self, port: Port, processor: F) -> Result<Command, LinkError>
    where
        F: FnOnce(&Command) -> Command,
    {
        let mut waited = Stopwatch::start(self.clock.now());
        loop {
            match self.accept(port) {
                Ok(Some(command)) => {
                    let reply = processor(&command);
                    self.reply(port, &reply)?;
                    return Ok(command);
                }
                Ok(None) => {}
                Err(LinkError::Decode(DecodeError::Overflow)) => {
                    return Err(LinkError::Decode(DecodeError::Overflow));
                }
                Err(LinkError::Decode(e)) => debug!("link: receive on {}: {}", port, e),
                Err(e) => return Err(e),
            }

            if expired(&mut waited, self.clock.now(), self.config.reply_timeout_us) {
                return Err(LinkError::Timeout);
            }
        }
    }

    /// Non-blocking: eine Flanke von `port` verarbeiten
    ///
    /// Ist damit eine Zeile komplett, wird sie mit 0 quittiert und
    /// zurückgegeben. Die Antwort folgt danach mit `reply()`.
    pub fn accept(&mut self, port: Port) -> Result<Option<Command>, LinkError> {
        self.listen(port);

        if let Some(event) = self.poll_edge(port)? {
            if let Some(command) = self.decoder.on_edge(event)? {
                debug!("link: {} bytes received on {}", command.len(), port);
                self.send_ack(port)?;
                return Ok(Some(command));
            }
        }

        self.decoder.poll_timeout(self.clock.now())?;
        Ok(None)
    }

    /// Antwort auf eine mit `accept()` angenommene Zeile senden
    pub fn reply(&mut self, port: Port, payload: &[u8]) -> Result<(), LinkError> {
        check_payload(payload)?;
        self.transmit_acked(port, payload)?;
        self.listen(port);
        Ok(())
    }

    fn transmit_acked(&mut self, port: Port, payload: &[u8]) -> Result<(), LinkError> {
        for attempt in 1..=self.config.max_attempts {
            self.talk(port);
            self.encoder
                .transmit_line(&mut self.mux, &mut self.delay, payload)?;
            self.listen(port);

            match self.await_ack(port)? {
                Some(ACK_OK) => return Ok(()),
                Some(code) => warn!("link: attempt {} on {} rejected ({})", attempt, port, code),
                None => warn!("link: attempt {} on {} not acknowledged", attempt, port),
            }
        }
        Err(LinkError::RetriesExhausted)
    }

    fn send_ack(&mut self, port: Port) -> Result<(), LinkError> {
        self.talk(port);
        self.encoder
            .transmit_byte(&mut self.mux, &mut self.delay, ACK_OK)?;
        self.listen(port);
        Ok(())
    }

    /// Auf Output schalten und warten, bis die Gegenseite die Leitung frei hat
    ///
    /// Nach ihrer letzten fallenden Flanke hält die Gegenseite die Leitung
    /// noch bis zum Ende ihres Slots, also bis zu `slot_units - 1` ihrer
    /// eigenen Einheiten. Gewartet wird deshalb mindestens einen ganzen Slot
    /// in der zuletzt gemessenen Einheit.
    fn talk(&mut self, port: Port) {
        let peer_slot = self
            .decoder
            .last_unit()
            .map_or(0, |unit| unit.saturating_mul(self.config.slot_units));
        self.mux.select(port, LinkDirection::Output);
        self.delay.delay_us(self.config.turnaround_us.max(peer_slot));
    }

    /// Ereignis abholen; nur erlaubt, solange `port` Eingang ist
    fn poll_edge(&mut self, port: Port) -> Result<Option<EdgeEvent>, LinkError> {
        self.mux.ensure_input(port)?;
        Ok(self.events.try_recv()?)
    }

    /// Wartet auf genau ein Byte (Quittung); `None` bei Timeout
    fn await_ack(&mut self, port: Port) -> Result<Option<u8>, LinkError> {
        let mut waited = Stopwatch::start(self.clock.now());
        loop {
            if let Some(event) = self.poll_edge(port)? {
                match self.decoder.push_edge(event) {
                    Ok(Some(byte)) => return Ok(Some(byte)),
                    Ok(None) => {}
                    Err(e) => debug!("link: ack on {}: {}", port, e),
                }
            }

            // Zeit erst NACH dem Abholen lesen, sonst kann die letzte Flanke
            // jünger sein als `now`
            let now = self.clock.now();
            if self.decoder.poll_timeout(now).is_err() {
                debug!("link: partial ack on {} dropped", port);
            }
            if expired(&mut waited, now, self.config.ack_timeout_us) {
                return Ok(None);
            }
        }
    }

    fn await_line(&mut self, port: Port, timeout: Ticks) -> Result<Command, LinkError> {
        let mut waited = Stopwatch::start(self.clock.now());
        loop {
            if let Some(event) = self.poll_edge(port)? {
                match self.decoder.on_edge(event) {
                    Ok(Some(line)) => return Ok(line),
                    Ok(None) => {}
                    Err(DecodeError::Overflow) => {
                        return Err(LinkError::Decode(DecodeError::Overflow));
                    }
                    Err(e) => debug!("link: reply on {}: {}", port, e),
                }
            }

            let now = self.clock.now();
            if self.decoder.poll_timeout(now).is_err() {
                debug!("link: partial reply on {} dropped", port);
            }
            if expired(&mut waited, now, timeout) {
                return Err(LinkError::Timeout);
            }
        }
    }
}

fn expired(waited: &mut Stopwatch, now: Timestamp, limit: Ticks) -> bool {
    waited.update(now).map_or(true, |total| total > limit)
}

fn check_payload(payload: &[u8]) -> Result<(), LinkError> {
    if payload.len() > MAX_COMMAND_LEN || payload.contains(&TERMINATOR) {
        return Err(LinkError::InvalidPayload);
    }
    Ok(())
}
