//! Gemeinsame Test-Helfer: Signalform-Generator und simulierter Bus
#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use ledtree_core::{
    Clock, Command, EdgeEvent, EdgeKind, EventPort, LinePins, LinkDirection, Port, PulseDecoder,
    Timestamp,
};

/// Standard-Einheit der Tests (µs), wie `LinkConfig::default()`
pub const UNIT: u64 = 500;
/// Slot-Breite in Einheiten, wie `LinkConfig::default()`
pub const SLOT_UNITS: u64 = 4;
/// Zeit pro `Clock::now()` Aufruf im simulierten Bus
pub const POLL_STEP: u64 = 2;
/// Wartezeit der simulierten Gegenseite, bevor sie antwortet
pub const PEER_TURNAROUND: u64 = 3_000;

// ============================================================================
// Signalform-Generator (unabhängig vom PulseEncoder)
// ============================================================================

fn push_pulse(out: &mut Vec<(u64, bool)>, t: &mut u64, high: u64, slot: u64) {
    out.push((*t, true));
    out.push((*t + high, false));
    *t += slot;
}

/// Pegelwechsel (Zeit, high) für eine Byte-Folge, jedes Byte mit eigener Einheit
pub fn waveform_with_units(bytes: &[(u8, u64)], start: u64) -> Vec<(u64, bool)> {
    let mut out = Vec::new();
    let mut t = start;
    for &(byte, unit) in bytes {
        let slot = SLOT_UNITS * unit;
        push_pulse(&mut out, &mut t, unit, slot);
        for bit in 0..8 {
            let high = if (byte >> bit) & 1 == 1 { 2 * unit } else { unit };
            push_pulse(&mut out, &mut t, high, slot);
        }
    }
    out
}

pub fn waveform(bytes: &[u8], unit: u64, start: u64) -> Vec<(u64, bool)> {
    let units: Vec<(u8, u64)> = bytes.iter().map(|&b| (b, unit)).collect();
    waveform_with_units(&units, start)
}

pub fn to_edges(levels: &[(u64, bool)]) -> Vec<EdgeEvent> {
    levels
        .iter()
        .map(|&(t, high)| EdgeEvent {
            kind: EdgeKind::from_level(high),
            time: Timestamp::from_ticks(t),
        })
        .collect()
}

/// Dekodiert Pegelwechsel auf Byte-Ebene
pub fn decode_bytes(levels: &[(u64, bool)]) -> Vec<u8> {
    let mut decoder = PulseDecoder::new(10_000);
    to_edges(levels)
        .into_iter()
        .filter_map(|e| decoder.push_edge(e).expect("decode failed"))
        .collect()
}

/// Dekodiert Pegelwechsel auf Zeilen-Ebene
pub fn decode_lines(levels: &[(u64, bool)]) -> Vec<Command> {
    let mut decoder = PulseDecoder::new(10_000);
    to_edges(levels)
        .into_iter()
        .filter_map(|e| decoder.on_edge(e).expect("decode failed"))
        .collect()
}

pub fn command(text: &[u8]) -> Command {
    Command::from_slice(text).expect("command too long")
}

// ============================================================================
// Simulierter Bus
// ============================================================================

/// Richtungswechsel an den Pins (für Halbduplex-Assertions)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinOp {
    Output(Port),
    Input(Port),
    Listen(Port),
    Unlisten,
}

type Responder = Box<dyn FnMut(&[u8]) -> Vec<u8>>;

struct SimState {
    now: u64,
    events: &'static EventPort,
    directions: [Option<LinkDirection>; 3],
    armed: Option<Port>,
    incoming: VecDeque<(u64, bool)>,
    outgoing: Vec<(u64, bool)>,
    sent: Vec<Vec<u8>>,
    ops: Vec<PinOp>,
    violations: Vec<String>,
    responder: Option<Responder>,
    peer_unit: u64,
    peer_holds_until: u64,
}

impl SimState {
    /// Zeit vorstellen; fällige Flanken der Gegenseite lösen den
    /// "Interrupt" aus, sofern gerade ein Pin überwacht wird.
    fn advance(&mut self, dt: u64) {
        let target = self.now + dt;
        while let Some(&(t, high)) = self.incoming.front() {
            if t > target {
                break;
            }
            self.incoming.pop_front();
            if self.armed.is_some() {
                self.events.capture(high, Timestamp::from_ticks(t));
            }
        }
        self.now = target;
    }

    fn schedule(&mut self, levels: Vec<(u64, bool)>) {
        self.incoming.extend(levels);
        self.incoming.make_contiguous().sort_by_key(|&(t, _)| t);
    }

    /// Gegenseite sendet `bytes` ab `start`; sie treibt die Leitung bis zum
    /// Ende ihres letzten Slots (Low nach der letzten fallenden Flanke)
    fn schedule_peer(&mut self, bytes: &[u8], start: u64) {
        let end = start + bytes.len() as u64 * 9 * SLOT_UNITS * self.peer_unit;
        self.peer_holds_until = self.peer_holds_until.max(end);
        let levels = waveform(bytes, self.peer_unit, start);
        self.schedule(levels);
    }

    /// Sendephase des Knotens abgeschlossen: dekodieren, Gegenseite antworten lassen
    fn flush_outgoing(&mut self) {
        if self.outgoing.is_empty() {
            return;
        }
        let levels = std::mem::take(&mut self.outgoing);
        let bytes = decode_bytes(&levels);
        self.sent.push(bytes.clone());

        let reply = match self.responder.as_mut() {
            Some(responder) => responder(&bytes),
            None => Vec::new(),
        };
        if !reply.is_empty() {
            let start = self.now + PEER_TURNAROUND;
            self.schedule_peer(&reply, start);
        }
    }

    fn direction(&self, port: Port) -> Option<LinkDirection> {
        port.index().and_then(|i| self.directions[i])
    }
}

/// Simulierter Bus: Uhr, Pins und Delay in einem
///
/// Klone teilen denselben Zustand, so dass eine Instanz als `Clock`,
/// eine als `LinePins` und eine als `DelayNs` an den Link gehen kann.
#[derive(Clone)]
pub struct Sim {
    state: Rc<RefCell<SimState>>,
    events: &'static EventPort,
}

impl Sim {
    pub fn new() -> Self {
        let events: &'static EventPort = Box::leak(Box::new(EventPort::new()));
        let state = SimState {
            now: 0,
            events,
            directions: [None; 3],
            armed: None,
            incoming: VecDeque::new(),
            outgoing: Vec::new(),
            sent: Vec::new(),
            ops: Vec::new(),
            violations: Vec::new(),
            responder: None,
            peer_unit: UNIT,
            peer_holds_until: 0,
        };
        Self {
            state: Rc::new(RefCell::new(state)),
            events,
        }
    }

    pub fn events(&self) -> &'static EventPort {
        self.events
    }

    /// Antwort der Gegenseite auf jede Sendephase des Knotens
    pub fn respond_with(&self, responder: impl FnMut(&[u8]) -> Vec<u8> + 'static) {
        self.state.borrow_mut().responder = Some(Box::new(responder));
    }

    /// Einheit der Gegenseite (eigener, abweichender Takt)
    pub fn set_peer_unit(&self, unit: u64) {
        self.state.borrow_mut().peer_unit = unit;
    }

    /// Gegenseite sendet `bytes`, Start `delay` µs ab jetzt
    pub fn schedule_bytes(&self, bytes: &[u8], delay: u64) {
        let mut state = self.state.borrow_mut();
        let start = state.now + delay;
        state.schedule_peer(bytes, start);
    }

    pub fn schedule_levels(&self, levels: Vec<(u64, bool)>) {
        self.state.borrow_mut().schedule(levels);
    }

    pub fn now(&self) -> u64 {
        self.state.borrow().now
    }

    /// Vom Knoten gesendete Byte-Folgen, eine pro Sendephase
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.state.borrow().sent.clone()
    }

    pub fn ops(&self) -> Vec<PinOp> {
        self.state.borrow().ops.clone()
    }

    pub fn armed(&self) -> Option<Port> {
        self.state.borrow().armed
    }

    pub fn violations(&self) -> Vec<String> {
        self.state.borrow().violations.clone()
    }

    /// Noch nicht abgeschlossene Sendephase (Pegelwechsel)
    pub fn outgoing(&self) -> Vec<(u64, bool)> {
        self.state.borrow().outgoing.clone()
    }
}

impl Clock for Sim {
    fn now(&self) -> Timestamp {
        let mut state = self.state.borrow_mut();
        state.advance(POLL_STEP);
        Timestamp::from_ticks(state.now)
    }
}

impl DelayNs for Sim {
    fn delay_ns(&mut self, ns: u32) {
        self.state.borrow_mut().advance(u64::from(ns).div_ceil(1_000));
    }

    fn delay_us(&mut self, us: u32) {
        self.state.borrow_mut().advance(u64::from(us));
    }
}

impl LinePins for Sim {
    fn make_output(&mut self, port: Port) {
        let mut state = self.state.borrow_mut();
        if state.armed == Some(port) {
            state
                .violations
                .push(format!("{:?} switched to output while listening", port));
        }
        if let Some(i) = port.index() {
            state.directions[i] = Some(LinkDirection::Output);
        }
        state.ops.push(PinOp::Output(port));
    }

    fn make_input(&mut self, port: Port) {
        let mut state = self.state.borrow_mut();
        if let Some(i) = port.index() {
            state.directions[i] = Some(LinkDirection::Input);
        }
        state.ops.push(PinOp::Input(port));
    }

    fn set_level(&mut self, port: Port, high: bool) {
        let mut state = self.state.borrow_mut();
        if state.direction(port) != Some(LinkDirection::Output) {
            state.violations.push(format!("{:?} driven while input", port));
        }
        if state.armed.is_some() {
            state
                .violations
                .push(format!("{:?} driven while edge interrupt armed", port));
        }
        let now = state.now;
        if high && now < state.peer_holds_until {
            let overlap = state.peer_holds_until - now;
            state.violations.push(format!(
                "{:?} driven high {} us while peer still drives low",
                port, overlap
            ));
        }
        state.outgoing.push((now, high));
    }

    fn listen(&mut self, port: Port) {
        let mut state = self.state.borrow_mut();
        if state.direction(port) != Some(LinkDirection::Input) {
            state
                .violations
                .push(format!("{:?} listened while output", port));
        }
        state.ops.push(PinOp::Listen(port));
        state.flush_outgoing();
        state.armed = Some(port);
    }

    fn unlisten(&mut self) {
        let mut state = self.state.borrow_mut();
        state.armed = None;
        state.ops.push(PinOp::Unlisten);
    }
}
