// Keine Standard-Bibliothek verwenden (Embedded System)
#![no_std]
// Kein normaler main() Einstiegspunkt (wird von esp_rtos bereitgestellt)
#![no_main]
// Verbiete mem::forget - gefährlich bei ESP HAL Types mit DMA-Buffern
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
// Verbiete große Stack-Frames (Stack ist auf Embedded Systemen begrenzt)
#![deny(clippy::large_stack_frames)]

// Embassy Async Runtime
use defmt::info;
use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};

// ESP32-C6 HAL
use esp_hal::clock::CpuClock;
use esp_hal::delay::Delay;
use esp_hal::gpio::{Flex, Io};
use esp_hal::interrupt::software::SoftwareInterruptControl;
use esp_hal::timer::timg::TimerGroup;

// Backtrace bei Panic und println!() Support
use {esp_backtrace as _, esp_println as _};

// Projekt-Module und Konfiguration
use ledtree::config::link_config;
use ledtree::hal::{EDGE_EVENTS, FlexLinePins, SystemClock, edge_capture_handler};
use ledtree::tasks::{led_task, link_task};
use ledtree::{CommandLink, LedCommandChannel};

// ESP-IDF App Descriptor - erforderlich für den Bootloader!
// Ohne diesen schlägt das Flashen mit "ESP-IDF App Descriptor missing" fehl
esp_bootloader_esp_idf::esp_app_desc!();

/// Main Entry Point
///
/// Initialisiert Hardware, Leitungen und Embassy Runtime und spawnt Tasks.
/// Danach schläft main() - alle Arbeit läuft in Tasks.
#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    // ESP32-C6 Konfiguration: CPU auf maximale Taktfrequenz (160 MHz)
    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    // Embassy Runtime initialisieren (Timer + Software Interrupt)
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    let sw_interrupt = SoftwareInterruptControl::new(peripherals.SW_INTERRUPT);
    esp_rtos::start(timg0.timer0, sw_interrupt.software_interrupt0);

    // Leitungen: alle Eingang, noch kein Interrupt scharf
    let pins = FlexLinePins::new(
        Flex::new(peripherals.GPIO2),
        Flex::new(peripherals.GPIO3),
        Flex::new(peripherals.GPIO4),
    );

    // GPIO-Interrupt für die Flanken-Erfassung
    let mut io = Io::new(peripherals.IO_MUX);
    io.set_interrupt_handler(edge_capture_handler);

    let link = CommandLink::new(pins, &EDGE_EVENTS, SystemClock, Delay::new(), link_config())
        .expect("invalid link configuration");

    // LED Command-Channel erstellen (Link Task → LED Task)
    static COMMAND_CHANNEL: static_cell::StaticCell<LedCommandChannel> =
        static_cell::StaticCell::new();
    let command_channel = COMMAND_CHANNEL.init(LedCommandChannel::new());

    spawner
        .spawn(led_task(
            peripherals.GPIO8,
            peripherals.RMT,
            command_channel.receiver(),
        ))
        .unwrap();
    spawner
        .spawn(link_task(link, command_channel.sender()))
        .unwrap();

    info!("Node up");

    // Main-Loop: schläft (alle Arbeit läuft in Tasks)
    loop {
        Timer::after(Duration::from_secs(3600)).await;
    }
}
