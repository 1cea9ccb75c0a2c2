//! Kommando-Zeilen eines Knotens
//!
//! - `<n>><cmd>`: `<cmd>` an Kind `n` (0 oder 1) weiterleiten
//! - `rot`, `gruen`, `blau`, `weiss`, `aus`: Farbe der Status-LED
//!
//! Antwort ist `ok`, `err` oder bei Weiterleitung die Antwort des Kindes.

use crate::port::Port;
use crate::types::LedCommand;

pub const REPLY_OK: &[u8] = b"ok";
pub const REPLY_ERR: &[u8] = b"err";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request<'a> {
    Forward { port: Port, payload: &'a [u8] },
    Led(LedCommand),
}

impl<'a> Request<'a> {
    pub fn parse(line: &'a [u8], brightness: u8) -> Option<Self> {
        if let [digit, b'>', payload @ ..] = line {
            let port = digit.checked_sub(b'0').and_then(Port::child)?;
            return Some(Request::Forward { port, payload });
        }

        let name = core::str::from_utf8(line).ok()?;
        LedCommand::from_name(name, brightness).map(Request::Led)
    }
}
