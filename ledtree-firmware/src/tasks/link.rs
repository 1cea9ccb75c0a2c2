// Link Task - horcht auf den Eltern-Knoten und beantwortet Kommandos
use defmt::{debug, error, info, warn};
use embassy_futures::yield_now;
use embassy_time::{Duration, Timer};
use embedded_hal::delay::DelayNs;
use ledtree_core::{Clock, CommandLink, FaultSink, LinePins, NodeState, Port};

use crate::processor::process;
use crate::{LedCommand, LedCommandSender, NodeLink};

/// Link Logic - ohne Hardware-Abhängigkeit
///
/// Pollt `accept()` auf Parent und gibt nach jedem Aufruf die CPU ab.
/// Eine empfangene Zeile ist bereits quittiert; die Antwort kommt aus
/// `process()`. Bei Flanken-Überlauf geht der Knoten in den Fehlerzustand:
/// Leitungen aus, LED-Task zeigt das Fehler-Muster, kein Verkehr mehr.
pub async fn link_logic<P: LinePins, C: Clock, D: DelayNs>(
    mut link: CommandLink<'static, P, C, D>,
    leds: LedCommandSender,
) -> ! {
    let mut sink = FaultSink::new();
    info!("Link: listening on parent");

    loop {
        let result = link.accept(Port::Parent);
        if sink.observe(&result) == NodeState::Faulted {
            break;
        }

        match result {
            Ok(Some(line)) => {
                info!("Link: received {=[u8]:a}", line.as_slice());
                let reply = process(&mut link, &leds, &line);
                if sink.check(link.events()) == NodeState::Faulted {
                    break;
                }

                let sent = link.reply(Port::Parent, &reply);
                if sink.observe(&sent) == NodeState::Faulted {
                    break;
                }
                if let Err(e) = sent {
                    warn!("Link: reply failed: {}", e);
                }
            }
            Ok(None) => {}
            Err(e) => debug!("Link: {}", e),
        }

        yield_now().await;
    }

    error!("Link: edge overrun, node halted until reset");
    link.release();
    leds.send(LedCommand::Fault).await;

    loop {
        Timer::after(Duration::from_secs(3600)).await;
    }
}

/// Link Task - Embassy Task für parallele Ausführung
#[embassy_executor::task]
pub async fn link_task(link: NodeLink, leds: LedCommandSender) {
    link_logic(link, leds).await
}
