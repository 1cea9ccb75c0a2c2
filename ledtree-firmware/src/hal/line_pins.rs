// Leitungs-Pins (Parent, Child0, Child1) als GPIO Flex-Pins
//
// Die Pins liegen in einem `static`, weil der GPIO-Interrupt-Handler sie
// ebenfalls braucht (Interrupt-Flag lesen/löschen, Pegel lesen). Zugriff
// von beiden Seiten nur in einer Critical Section.
//
// Es ist immer höchstens EIN Pin scharf (`ARMED`). Flanken anderer Pins
// werden gelöscht und nicht erfasst.

use core::cell::{Cell, RefCell};

use critical_section::Mutex;
use esp_hal::gpio::{Event, Flex, InputConfig, Level, OutputConfig, Pull};
use esp_hal::{handler, ram};
use ledtree_core::{Clock, EventPort, LinePins, Port};

use super::clock::SystemClock;

/// Übergabe der Flanken vom Interrupt an den Link-Task
pub static EDGE_EVENTS: EventPort = EventPort::new();

static LINE_PINS: Mutex<RefCell<Option<[Flex<'static>; 3]>>> = Mutex::new(RefCell::new(None));
static ARMED: Mutex<Cell<Option<usize>>> = Mutex::new(Cell::new(None));

/// GPIO-Interrupt: Flanke mit Zeitstempel in `EDGE_EVENTS` ablegen
#[handler]
#[ram]
pub fn edge_capture_handler() {
    // Zeit zuerst, bevor die Critical Section Latenz dazu kommt
    let now = SystemClock.now();

    critical_section::with(|cs| {
        let armed = ARMED.borrow(cs).get();
        let mut pins = LINE_PINS.borrow_ref_mut(cs);
        let Some(pins) = pins.as_mut() else {
            return;
        };

        for (index, pin) in pins.iter_mut().enumerate() {
            if !pin.is_interrupt_set() {
                continue;
            }
            pin.clear_interrupt();
            if armed == Some(index) {
                EDGE_EVENTS.capture(pin.is_high(), now);
            }
        }
    });
}

/// Handle auf die Pins im `static`; selbst ohne Zustand
pub struct FlexLinePins {
    _private: (),
}

impl FlexLinePins {
    /// Übernimmt die drei Leitungs-Pins, alle als Eingang mit Pull-Down
    ///
    /// Darf nur einmal aufgerufen werden.
    pub fn new(parent: Flex<'static>, child0: Flex<'static>, child1: Flex<'static>) -> Self {
        let mut pins = [parent, child0, child1];
        for pin in pins.iter_mut() {
            // Beide Seiten Eingang: Leitung liegt low
            pin.apply_input_config(&InputConfig::default().with_pull(Pull::Down));
            pin.apply_output_config(&OutputConfig::default());
            pin.set_level(Level::Low);
            pin.set_output_enable(false);
            pin.set_input_enable(true);
        }

        critical_section::with(|cs| {
            LINE_PINS.borrow_ref_mut(cs).replace(pins);
            ARMED.borrow(cs).set(None);
        });
        Self { _private: () }
    }

    fn with_pin(&mut self, port: Port, f: impl FnOnce(&mut Flex<'static>)) {
        let Some(index) = port.index() else {
            return;
        };
        critical_section::with(|cs| {
            if let Some(pins) = LINE_PINS.borrow_ref_mut(cs).as_mut() {
                f(&mut pins[index]);
            }
        });
    }
}

impl LinePins for FlexLinePins {
    fn make_output(&mut self, port: Port) {
        self.with_pin(port, |pin| {
            pin.set_level(Level::Low);
            pin.set_output_enable(true);
        });
    }

    fn make_input(&mut self, port: Port) {
        self.with_pin(port, |pin| pin.set_output_enable(false));
    }

    fn set_level(&mut self, port: Port, high: bool) {
        self.with_pin(port, |pin| pin.set_level(Level::from(high)));
    }

    fn listen(&mut self, port: Port) {
        let Some(index) = port.index() else {
            return;
        };
        critical_section::with(|cs| {
            if let Some(pins) = LINE_PINS.borrow_ref_mut(cs).as_mut() {
                let pin = &mut pins[index];
                pin.clear_interrupt();
                pin.listen(Event::AnyEdge);
            }
            ARMED.borrow(cs).set(Some(index));
        });
    }

    fn unlisten(&mut self) {
        critical_section::with(|cs| {
            ARMED.borrow(cs).set(None);
            if let Some(pins) = LINE_PINS.borrow_ref_mut(cs).as_mut() {
                for pin in pins.iter_mut() {
                    pin.unlisten();
                    pin.clear_interrupt();
                }
            }
        });
    }
}
