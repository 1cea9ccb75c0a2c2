//! Port-Multiplexer für die Halbduplex-Leitungen
//!
//! Jeder Knoten hat drei Leitungen (Parent, Child0, Child1). Es ist immer
//! höchstens EINE davon aktiv, entweder als Eingang (Flanken-Interrupt scharf)
//! oder als Ausgang (Interrupt aus, Encoder treibt die Leitung).

use crate::link::LinkError;

/// Logischer Port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Port {
    None,
    Parent,
    Child0,
    Child1,
}

impl Port {
    /// Index in der Pin-Tabelle (`None` hat keinen Pin)
    pub fn index(self) -> Option<usize> {
        match self {
            Port::None => None,
            Port::Parent => Some(0),
            Port::Child0 => Some(1),
            Port::Child1 => Some(2),
        }
    }

    /// Kind-Port nach Nummer (0 oder 1)
    pub fn child(n: u8) -> Option<Self> {
        match n {
            0 => Some(Port::Child0),
            1 => Some(Port::Child1),
            _ => None,
        }
    }
}

/// Richtung des aktiven Ports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkDirection {
    Input,
    Output,
}

/// Trait für den Zugriff auf die Leitungs-Pins
///
/// Wird nur mit echten Ports (nie `Port::None`) aufgerufen.
///
/// # Implementierungen
/// - **Production:** FlexLinePins (ESP32 GPIO Flex-Pins + GPIO-Interrupt)
/// - **Testing:** aufzeichnende Mocks im Test-Crate
pub trait LinePins {
    /// Pin als Ausgang schalten, Leitung low
    fn make_output(&mut self, port: Port);

    /// Pin loslassen (Eingang, hochohmig)
    fn make_input(&mut self, port: Port);

    /// Pegel eines als Ausgang geschalteten Pins setzen
    fn set_level(&mut self, port: Port, high: bool);

    /// Flanken-Interrupt auf diesen Pin legen
    fn listen(&mut self, port: Port);

    /// Flanken-Interrupt abschalten
    fn unlisten(&mut self);
}

pub struct PortMultiplexer<P: LinePins> {
    pins: P,
    active: Port,
    direction: LinkDirection,
}

impl<P: LinePins> PortMultiplexer<P> {
    pub fn new(pins: P) -> Self {
        Self {
            pins,
            active: Port::None,
            direction: LinkDirection::Input,
        }
    }

    pub fn active(&self) -> Port {
        self.active
    }

    pub fn direction(&self) -> LinkDirection {
        self.direction
    }

    pub fn pins(&self) -> &P {
        &self.pins
    }

    /// Schaltet `port` aktiv in die gewünschte Richtung
    ///
    /// - `Output`: Interrupt aus, Pin treibt low
    /// - `Input`: Pin loslassen, Interrupt auf diesen Pin
    /// - `Port::None`: alles aus (Ruhezustand)
    pub fn select(&mut self, port: Port, direction: LinkDirection) {
        if self.active == port && self.direction == direction {
            return;
        }

        // Interrupt immer zuerst aus, damit beim Umschalten keine Flanke
        // vom eigenen Pin erfasst wird
        self.pins.unlisten();

        if self.active != port && self.active != Port::None {
            self.pins.make_input(self.active);
        }

        self.active = port;
        self.direction = direction;
        if port == Port::None {
            return;
        }

        match direction {
            LinkDirection::Output => self.pins.make_output(port),
            LinkDirection::Input => {
                self.pins.make_input(port);
                self.pins.listen(port);
            }
        }
    }

    /// Pegel auf dem aktiven Port setzen; nur im Output-Modus erlaubt
    pub fn drive(&mut self, high: bool) -> Result<(), LinkError> {
        if self.active == Port::None || self.direction != LinkDirection::Output {
            return Err(LinkError::Direction);
        }
        self.pins.set_level(self.active, high);
        Ok(())
    }

    /// Prüft, ob auf `port` gelesen werden darf
    pub fn ensure_input(&self, port: Port) -> Result<(), LinkError> {
        if port == Port::None || self.active != port || self.direction != LinkDirection::Input {
            return Err(LinkError::Direction);
        }
        Ok(())
    }
}
