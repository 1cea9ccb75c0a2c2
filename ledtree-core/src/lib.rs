//! LED Tree Core - Link-Protokoll ohne Hardware-Dependencies
//!
//! Diese Crate enthält KEINE Hardware-Dependencies.
//! Sie definiert das Knoten-zu-Knoten Protokoll (Pulsdauer-Kodierung über
//! Halbduplex-Leitungen) und die Traits, hinter denen die Hardware steckt.
//!
//! Schichten, von unten nach oben:
//! `timebase` → `edge` → `decoder` / `encoder` → `port` → `link` → `fault`

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod config;
pub mod decoder;
pub mod edge;
pub mod encoder;
pub mod fault;
pub mod link;
pub mod port;
pub mod request;
pub mod timebase;
pub mod traits;
pub mod types;

// Re-exports für einfachen Zugriff
pub use config::{ConfigError, LinkConfig};
pub use decoder::{Command, DecodeError, MAX_COMMAND_LEN, PulseDecoder, TERMINATOR};
pub use edge::{DataLost, EdgeEvent, EdgeKind, EventPort};
pub use encoder::PulseEncoder;
pub use fault::{FAULT_PATTERN, FaultPattern, FaultSink, FaultStep, NodeState};
pub use link::{ACK_OK, ACK_RETRY, CommandLink, LinkError};
pub use port::{LinePins, LinkDirection, Port, PortMultiplexer};
pub use request::{REPLY_ERR, REPLY_OK, Request};
pub use timebase::{COUNTER_RANGE, Clock, Stopwatch, Ticks, TimingFault, Timestamp, elapsed};
pub use traits::{LedError, SmartLedWriter};
pub use types::LedCommand;
