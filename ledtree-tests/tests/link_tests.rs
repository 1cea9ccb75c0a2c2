//! Integration Tests für CommandLink auf dem simulierten Bus
//!
//! Die Gegenseite ist ein Skript (`Sim::respond_with`): nach jeder
//! Sendephase des Knotens bekommt sie die dekodierten Bytes und antwortet
//! nach `PEER_TURNAROUND` mit ihrer eigenen Einheit.

mod common;

use std::cell::Cell;
use std::rc::Rc;

use common::{PinOp, Sim, command};
use ledtree_core::{
    ACK_OK, ACK_RETRY, CommandLink, ConfigError, DecodeError, FaultSink, LinkConfig,
    LinkDirection, LinkError, NodeState, Port,
};

type SimLink = CommandLink<'static, Sim, Sim, Sim>;

fn link_with(sim: &Sim, config: LinkConfig) -> SimLink {
    CommandLink::new(sim.clone(), sim.events(), sim.clone(), sim.clone(), config).unwrap()
}

fn line(text: &[u8]) -> Vec<u8> {
    let mut out = text.to_vec();
    out.push(b'\n');
    out
}

/// Quittung + Antwortzeile in einem Zug, wie ein echter Empfänger
fn ack_and_reply(reply: &[u8]) -> Vec<u8> {
    let mut out = vec![ACK_OK];
    out.extend(line(reply));
    out
}

/// Pollt `accept()` bis eine Zeile ankommt
fn accept_line(link: &mut SimLink, port: Port, max_polls: usize) -> Result<Vec<u8>, LinkError> {
    for _ in 0..max_polls {
        if let Some(cmd) = link.accept(port)? {
            return Ok(cmd.to_vec());
        }
    }
    panic!("no line within {max_polls} polls");
}

// ============================================================================
// Tests: Konfiguration
// ============================================================================

#[test]
fn test_invalid_config_is_rejected() {
    let sim = Sim::new();
    let result = CommandLink::new(
        sim.clone(),
        sim.events(),
        sim.clone(),
        sim.clone(),
        LinkConfig::default().with_max_attempts(0),
    );
    assert!(matches!(result, Err(ConfigError::NoAttempts)));
}

#[test]
fn test_new_link_drives_nothing() {
    let sim = Sim::new();
    let link = link_with(&sim, LinkConfig::default());
    assert_eq!(link.multiplexer().active(), Port::None);
    assert!(sim.ops().is_empty());
}

// ============================================================================
// Tests: send_command
// ============================================================================

#[test]
fn test_send_command_returns_reply() {
    let sim = Sim::new();
    sim.respond_with(|sent| {
        if sent == b"rot\n" {
            ack_and_reply(b"ok")
        } else {
            Vec::new()
        }
    });
    let mut link = link_with(&sim, LinkConfig::default());

    let reply = link.send_command(Port::Child0, b"rot").unwrap();

    assert_eq!(reply, command(b"ok"));
    assert_eq!(sim.sent(), [line(b"rot"), vec![ACK_OK]]);
    assert!(sim.violations().is_empty(), "{:?}", sim.violations());
    // Danach horcht der Port wieder
    assert_eq!(link.multiplexer().active(), Port::Child0);
    assert_eq!(link.multiplexer().direction(), LinkDirection::Input);
    assert_eq!(sim.armed(), Some(Port::Child0));
}

#[test]
fn test_send_command_direction_sequence() {
    let sim = Sim::new();
    sim.respond_with(|sent| {
        if sent == b"blau\n" {
            ack_and_reply(b"ok")
        } else {
            Vec::new()
        }
    });
    let mut link = link_with(&sim, LinkConfig::default());
    link.send_command(Port::Child1, b"blau").unwrap();

    use PinOp::*;
    assert_eq!(
        sim.ops(),
        [
            // Anfrage senden
            Unlisten,
            Output(Port::Child1),
            // Quittung + Antwort empfangen
            Unlisten,
            Input(Port::Child1),
            Listen(Port::Child1),
            // Antwort quittieren
            Unlisten,
            Output(Port::Child1),
            Unlisten,
            Input(Port::Child1),
            Listen(Port::Child1),
        ]
    );
}

#[test]
fn test_send_command_tolerates_slower_peer() {
    let sim = Sim::new();
    sim.set_peer_unit(740);
    sim.respond_with(|sent| {
        if sent == b"weiss\n" {
            ack_and_reply(b"ok")
        } else {
            Vec::new()
        }
    });
    let mut link = link_with(&sim, LinkConfig::default());
    assert_eq!(link.send_command(Port::Child0, b"weiss"), Ok(command(b"ok")));
    assert!(sim.violations().is_empty(), "{:?}", sim.violations());
}

#[test]
fn test_retry_waits_for_slower_peer_to_release_line() {
    let sim = Sim::new();
    sim.set_peer_unit(700);
    let attempts = Rc::new(Cell::new(0));
    let seen = attempts.clone();
    sim.respond_with(move |sent| {
        if sent != b"rot\n" {
            return Vec::new();
        }
        seen.set(seen.get() + 1);
        if seen.get() == 1 {
            vec![ACK_RETRY]
        } else {
            ack_and_reply(b"ok")
        }
    });
    let mut link = link_with(&sim, LinkConfig::default());

    assert_eq!(link.send_command(Port::Child0, b"rot"), Ok(command(b"ok")));
    // Wiederholung und Quittung erst nach dem Slot-Ende der Gegenseite
    assert_eq!(sim.sent(), [line(b"rot"), line(b"rot"), vec![ACK_OK]]);
    assert!(sim.violations().is_empty(), "{:?}", sim.violations());
}

#[test]
fn test_send_command_retries_after_nak() {
    let sim = Sim::new();
    let attempts = Rc::new(Cell::new(0));
    let seen = attempts.clone();
    sim.respond_with(move |sent| {
        if sent != b"gruen\n" {
            return Vec::new();
        }
        seen.set(seen.get() + 1);
        if seen.get() == 1 {
            vec![ACK_RETRY]
        } else {
            ack_and_reply(b"ok")
        }
    });
    let mut link = link_with(&sim, LinkConfig::default());

    assert_eq!(link.send_command(Port::Child0, b"gruen"), Ok(command(b"ok")));
    assert_eq!(attempts.get(), 2);
    assert_eq!(sim.sent(), [line(b"gruen"), line(b"gruen"), vec![ACK_OK]]);
}

#[test]
fn test_send_command_gives_up_after_max_attempts() {
    let sim = Sim::new();
    sim.respond_with(|_| vec![ACK_RETRY]);
    let config = LinkConfig::default().with_max_attempts(3);
    let mut link = link_with(&sim, config);

    assert_eq!(
        link.send_command(Port::Child0, b"rot"),
        Err(LinkError::RetriesExhausted)
    );
    // Genau max_attempts Übertragungen, keine Quittung von uns
    assert_eq!(sim.sent(), vec![line(b"rot"); 3]);
    assert!(sim.violations().is_empty());
}

#[test]
fn test_missing_ack_counts_as_attempt() {
    let sim = Sim::new();
    let config = LinkConfig::default()
        .with_max_attempts(2)
        .with_ack_timeout_us(30_000);
    let mut link = link_with(&sim, config);

    let start = sim.now();
    assert_eq!(
        link.send_command(Port::Child1, b"aus"),
        Err(LinkError::RetriesExhausted)
    );
    assert_eq!(sim.sent(), vec![line(b"aus"); 2]);
    // Beide Versuche haben das Ack-Timeout abgewartet
    assert!(sim.now() - start >= 2 * 30_000);
}

#[test]
fn test_send_command_reply_timeout() {
    let sim = Sim::new();
    sim.respond_with(|sent| {
        if sent == b"rot\n" {
            vec![ACK_OK]
        } else {
            Vec::new()
        }
    });
    let config = LinkConfig::default().with_reply_timeout_us(200_000);
    let mut link = link_with(&sim, config);

    assert_eq!(link.send_command(Port::Child0, b"rot"), Err(LinkError::Timeout));
    // Anfrage wurde angenommen, also kein zweiter Versuch
    assert_eq!(sim.sent(), [line(b"rot")]);
}

#[test]
fn test_invalid_payload_is_not_sent() {
    let sim = Sim::new();
    let mut link = link_with(&sim, LinkConfig::default());

    assert_eq!(
        link.send_command(Port::Child0, b"a\nb"),
        Err(LinkError::InvalidPayload)
    );
    assert_eq!(
        link.send_command(Port::Child0, &[b'x'; 32]),
        Err(LinkError::InvalidPayload)
    );
    assert!(sim.ops().is_empty());
    assert!(sim.sent().is_empty());
}

// ============================================================================
// Tests: receive_command / accept
// ============================================================================

#[test]
fn test_receive_command_acks_and_replies() {
    let sim = Sim::new();
    sim.respond_with(|sent| {
        if sent == b"ok\n" {
            vec![ACK_OK]
        } else {
            Vec::new()
        }
    });
    let mut link = link_with(&sim, LinkConfig::default());
    sim.schedule_bytes(b"blau\n", 1_000);

    let received = link
        .receive_command(Port::Parent, |cmd| {
            assert_eq!(cmd.as_slice(), b"blau");
            command(b"ok")
        })
        .unwrap();

    assert_eq!(received, command(b"blau"));
    // Zuerst die Quittung, dann die Antwort
    assert_eq!(sim.sent(), [vec![ACK_OK], line(b"ok")]);
    assert!(sim.violations().is_empty(), "{:?}", sim.violations());
    assert_eq!(sim.armed(), Some(Port::Parent));
}

#[test]
fn test_receive_command_times_out_without_traffic() {
    let sim = Sim::new();
    let config = LinkConfig::default().with_reply_timeout_us(100_000);
    let mut link = link_with(&sim, config);

    let mut called = false;
    let result = link.receive_command(Port::Parent, |_| {
        called = true;
        command(b"")
    });
    assert_eq!(result, Err(LinkError::Timeout));
    assert!(!called);
    assert!(sim.sent().is_empty());
}

#[test]
fn test_accept_then_reply() {
    let sim = Sim::new();
    sim.respond_with(|sent| {
        if sent == b"err\n" {
            vec![ACK_OK]
        } else {
            Vec::new()
        }
    });
    let mut link = link_with(&sim, LinkConfig::default());
    sim.schedule_bytes(b"lila\n", 500);

    let cmd = accept_line(&mut link, Port::Parent, 100_000).unwrap();
    assert_eq!(cmd, b"lila");
    assert_eq!(sim.sent(), [vec![ACK_OK]]);

    link.reply(Port::Parent, b"err").unwrap();
    assert_eq!(sim.sent(), [vec![ACK_OK], line(b"err")]);
}

#[test]
fn test_accept_acks_slower_peer_after_its_slot() {
    let sim = Sim::new();
    sim.set_peer_unit(700);
    let mut link = link_with(&sim, LinkConfig::default());
    sim.schedule_bytes(b"rot\n", 1_000);

    let cmd = accept_line(&mut link, Port::Parent, 100_000).unwrap();
    assert_eq!(cmd, b"rot");
    assert_eq!(sim.sent(), [vec![ACK_OK]]);
    // 3 × 700 µs Slot-Rest der Gegenseite, länger als `turnaround_us`
    assert!(sim.violations().is_empty(), "{:?}", sim.violations());
}

#[test]
fn test_accept_reports_overflow_once() {
    let sim = Sim::new();
    let mut link = link_with(&sim, LinkConfig::default());

    let mut long = vec![b'a'; 40];
    long.push(b'\n');
    sim.schedule_bytes(&long, 500);

    let mut overflows = 0;
    for _ in 0..400_000 {
        match link.accept(Port::Parent) {
            Ok(Some(cmd)) => panic!("unexpected line {cmd:?}"),
            Ok(None) => {}
            Err(LinkError::Decode(DecodeError::Overflow)) => overflows += 1,
            Err(e) => panic!("unexpected error {e}"),
        }
    }
    assert_eq!(overflows, 1);
    // Überlange Zeile wird nicht quittiert
    assert!(sim.sent().is_empty());
}

#[test]
fn test_switching_port_drops_partial_line() {
    let sim = Sim::new();
    let mut link = link_with(&sim, LinkConfig::default());

    // Halbe Zeile auf Parent, dann Wechsel auf Child0
    sim.schedule_bytes(b"ro", 500);
    for _ in 0..20_000 {
        assert_eq!(link.accept(Port::Parent), Ok(None));
    }
    link.listen(Port::Child0);
    assert_eq!(sim.armed(), Some(Port::Child0));

    sim.schedule_bytes(b"t\n", 500);
    let cmd = accept_line(&mut link, Port::Child0, 100_000).unwrap();
    assert_eq!(cmd, b"t");
}

// ============================================================================
// Tests: Flanken-Überlauf
// ============================================================================

#[test]
fn test_overrun_is_fatal() {
    let sim = Sim::new();
    let mut link = link_with(&sim, LinkConfig::default());
    let mut sink = FaultSink::new();

    link.listen(Port::Parent);
    // Zwei Flanken zur selben Zeit: die zweite findet den Platz belegt
    let t = sim.now() + 100;
    sim.schedule_levels(vec![(t, true), (t, false)]);
    sim.schedule_bytes(b"rot\n", 1_000);

    let mut result = Ok(None);
    for _ in 0..100 {
        result = link.accept(Port::Parent);
        if result.is_err() {
            break;
        }
    }
    assert_eq!(result, Err(LinkError::DataLost));
    assert_eq!(sink.observe(&result), NodeState::Faulted);
    assert_eq!(sink.check(link.events()), NodeState::Faulted);

    // Auch gültiger Verkehr danach wird nicht mehr dekodiert
    for _ in 0..50_000 {
        assert_eq!(link.accept(Port::Parent), Err(LinkError::DataLost));
    }
    assert!(sim.sent().is_empty());
}

#[test]
fn test_own_transmission_is_not_captured() {
    let sim = Sim::new();
    sim.respond_with(|sent| {
        if sent == b"rot\n" {
            ack_and_reply(b"ok")
        } else {
            Vec::new()
        }
    });
    let mut link = link_with(&sim, LinkConfig::default());

    link.send_command(Port::Child0, b"rot").unwrap();
    assert!(!link.events().is_data_lost());
}
