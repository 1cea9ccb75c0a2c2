// Verarbeitung einer vom Eltern-Knoten empfangenen Zeile
//
// Weiterleitungen laufen synchron über denselben Link: der Port wechselt
// auf das Kind, danach geht die Antwort auf Parent zurück.

use defmt::warn;
use embedded_hal::delay::DelayNs;
use ledtree_core::{Clock, Command, CommandLink, LinePins, REPLY_ERR, REPLY_OK, Request};

use crate::LedCommandSender;
use crate::config::LED_BRIGHTNESS;

/// Führt `line` aus und liefert die Antwort für den Eltern-Knoten
pub fn process<P: LinePins, C: Clock, D: DelayNs>(
    link: &mut CommandLink<'_, P, C, D>,
    leds: &LedCommandSender,
    line: &Command,
) -> Command {
    let reply = match Request::parse(line, LED_BRIGHTNESS) {
        Some(Request::Forward { port, payload }) => match link.send_command(port, payload) {
            Ok(reply) => return reply,
            Err(e) => {
                warn!("Link: forward to {} failed: {}", port, e);
                REPLY_ERR
            }
        },
        Some(Request::Led(command)) => match leds.try_send(command) {
            Ok(()) => REPLY_OK,
            Err(_) => {
                warn!("LED: command queue full, {} dropped", command);
                REPLY_ERR
            }
        },
        None => {
            warn!("Link: unknown command {=[u8]:a}", line.as_slice());
            REPLY_ERR
        }
    };

    // Antworten sind kürzer als MAX_COMMAND_LEN
    Command::from_slice(reply).unwrap_or_default()
}
