// Task-Modul: Enthält alle Embassy Tasks
//
// Link Task → LED Task über einen Embassy Channel (Farben, Fehler-Muster).

pub mod led;
pub mod link;

// Re-export Tasks für einfachen Import
pub use led::led_task;
pub use link::link_task;
