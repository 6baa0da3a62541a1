use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;

fn local() -> NodeID {
    NodeID::new(0x0501_0101_0301)
}

fn peer() -> NodeID {
    NodeID::new(0x0201_12FE_056C)
}

fn callback_channel() -> (DatagramCallback, mpsc::Receiver<DatagramOutcome>) {
    let (tx, rx) = mpsc::channel();
    (
        Box::new(move |outcome| {
            tx.send(outcome).unwrap();
        }),
        rx,
    )
}

#[test]
fn send_emits_one_datagram_message() {
    let mut service = DatagramService::new(local());
    let mut out = Vec::new();
    service.send_datagram(DatagramWriteMemo::new(peer(), vec![0x20, 0x41]), &mut out);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].mti, Mti::DATAGRAM);
    assert_eq!(out[0].source, local());
    assert_eq!(out[0].destination, Some(peer()));
    assert_eq!(out[0].data, vec![0x20, 0x41]);
    assert_eq!(service.outstanding(), 1);
}

#[test]
fn ok_reply_fires_callback_exactly_once() {
    let mut service = DatagramService::new(local());
    let fired = Arc::new(AtomicUsize::new(0));
    let fired2 = fired.clone();
    let memo = DatagramWriteMemo::new(peer(), vec![1]).on_complete(Box::new(move |outcome| {
        assert_eq!(outcome, DatagramOutcome::Ok { flags: REPLY_PENDING });
        fired2.fetch_add(1, Ordering::SeqCst);
    }));
    let mut out = Vec::new();
    service.send_datagram(memo, &mut out);

    let ok = Message::addressed(
        Mti::DATAGRAM_RECEIVED_OK,
        peer(),
        local(),
        vec![REPLY_PENDING],
    );
    assert!(service.handle_message(&ok).is_none());
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(service.outstanding(), 0);

    // A second ok has nothing to match; dropped.
    assert!(service.handle_message(&ok).is_none());
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[test]
fn rejected_reply_carries_code() {
    let mut service = DatagramService::new(local());
    let (cb, rx) = callback_channel();
    let mut out = Vec::new();
    service.send_datagram(DatagramWriteMemo::new(peer(), vec![1]).on_complete(cb), &mut out);

    let nak = Message::addressed(Mti::DATAGRAM_REJECTED, peer(), local(), vec![0x10, 0x44]);
    service.handle_message(&nak);
    assert_eq!(rx.try_recv().unwrap(), DatagramOutcome::Rejected { code: 0x1044 });
}

#[test]
fn reply_without_payload_defaults() {
    let mut service = DatagramService::new(local());
    let (cb, rx) = callback_channel();
    let mut out = Vec::new();
    service.send_datagram(DatagramWriteMemo::new(peer(), vec![1]).on_complete(cb), &mut out);
    let ok = Message::addressed(Mti::DATAGRAM_RECEIVED_OK, peer(), local(), vec![]);
    service.handle_message(&ok);
    assert_eq!(rx.try_recv().unwrap(), DatagramOutcome::Ok { flags: 0 });

    let (cb, rx) = callback_channel();
    service.send_datagram(DatagramWriteMemo::new(peer(), vec![1]).on_complete(cb), &mut out);
    let nak = Message::addressed(Mti::DATAGRAM_REJECTED, peer(), local(), vec![]);
    service.handle_message(&nak);
    assert_eq!(rx.try_recv().unwrap(), DatagramOutcome::Rejected { code: 0 });
}

#[test]
fn matching_is_fifo_per_destination() {
    let mut service = DatagramService::new(local());
    let other = NodeID::new(0x0999);
    let order = Arc::new(std::sync::Mutex::new(Vec::new()));
    let mut out = Vec::new();
    for (dest, tag) in [(peer(), "p1"), (other, "o1"), (peer(), "p2")] {
        let order = order.clone();
        service.send_datagram(
            DatagramWriteMemo::new(dest, vec![]).on_complete(Box::new(move |_| {
                order.lock().unwrap().push(tag);
            })),
            &mut out,
        );
    }
    let ok = |from: NodeID| Message::addressed(Mti::DATAGRAM_RECEIVED_OK, from, local(), vec![]);
    service.handle_message(&ok(peer()));
    service.handle_message(&ok(peer()));
    service.handle_message(&ok(other));
    assert_eq!(*order.lock().unwrap(), vec!["p1", "p2", "o1"]);
}

#[test]
fn replies_from_other_nodes_do_not_match() {
    let mut service = DatagramService::new(local());
    let (cb, rx) = callback_channel();
    let mut out = Vec::new();
    service.send_datagram(DatagramWriteMemo::new(peer(), vec![1]).on_complete(cb), &mut out);

    // Ack from a different source leaves the memo pending.
    let stray = Message::addressed(
        Mti::DATAGRAM_RECEIVED_OK,
        NodeID::new(0x0999),
        local(),
        vec![],
    );
    service.handle_message(&stray);
    assert!(rx.try_recv().is_err());
    assert_eq!(service.outstanding(), 1);

    // Ack addressed to someone else is ignored outright.
    let not_ours = Message::addressed(Mti::DATAGRAM_RECEIVED_OK, peer(), NodeID::new(0x0999), vec![]);
    service.handle_message(&not_ours);
    assert_eq!(service.outstanding(), 1);
}

#[test]
fn callbackless_memo_surfaces_completed_event() {
    let mut service = DatagramService::new(local());
    let mut out = Vec::new();
    service.send_datagram(DatagramWriteMemo::new(peer(), vec![0x20, 0x41]), &mut out);
    let nak = Message::addressed(Mti::DATAGRAM_REJECTED, peer(), local(), vec![0x20, 0x20]);
    match service.handle_message(&nak) {
        Some(DatagramEvent::Completed { memo, outcome }) => {
            assert_eq!(memo.destination, peer());
            assert_eq!(memo.data, vec![0x20, 0x41]);
            assert_eq!(outcome, DatagramOutcome::Rejected { code: 0x2020 });
        }
        other => panic!("expected Completed event, got {:?}", other),
    }
}

#[test]
fn inbound_datagram_surfaces_received_event() {
    let mut service = DatagramService::new(local());
    let dg = Message::addressed(Mti::DATAGRAM, peer(), local(), vec![0x20, 0x51, 0, 0, 0, 0]);
    match service.handle_message(&dg) {
        Some(DatagramEvent::Received(memo)) => {
            assert_eq!(memo.source, peer());
            assert_eq!(memo.protocol_id(), DatagramProtocolId::MemoryOperation);
        }
        other => panic!("expected Received event, got {:?}", other),
    }
}

#[test]
fn reply_helpers_shape_messages() {
    let service = DatagramService::new(local());
    let memo = DatagramReadMemo {
        source: peer(),
        destination: local(),
        data: vec![0x01],
    };
    let mut out = Vec::new();
    service.positive_reply(&memo, 0, &mut out);
    service.positive_reply(&memo, REPLY_PENDING, &mut out);
    service.negative_reply(&memo, 0x1044, &mut out);
    assert_eq!(out[0].mti, Mti::DATAGRAM_RECEIVED_OK);
    assert!(out[0].data.is_empty());
    assert_eq!(out[1].data, vec![REPLY_PENDING]);
    assert_eq!(out[2].mti, Mti::DATAGRAM_REJECTED);
    assert_eq!(out[2].data, vec![0x10, 0x44]);
    assert_eq!(out.iter().filter(|m| m.destination == Some(peer())).count(), 3);
}

#[test]
fn protocol_id_classification() {
    assert_eq!(DatagramProtocolId::from_payload(&[0x01]), DatagramProtocolId::LogRequest);
    assert_eq!(DatagramProtocolId::from_payload(&[0x02]), DatagramProtocolId::LogReply);
    assert_eq!(DatagramProtocolId::from_payload(&[0x20]), DatagramProtocolId::MemoryOperation);
    assert_eq!(DatagramProtocolId::from_payload(&[0x21]), DatagramProtocolId::RemoteButton);
    assert_eq!(DatagramProtocolId::from_payload(&[0x28]), DatagramProtocolId::Display);
    assert_eq!(DatagramProtocolId::from_payload(&[0x30]), DatagramProtocolId::TrainControl);
    assert_eq!(DatagramProtocolId::from_payload(&[0x7F]), DatagramProtocolId::Unrecognized);
    assert_eq!(DatagramProtocolId::from_payload(&[]), DatagramProtocolId::Unrecognized);
}

#[test]
fn link_down_fails_outstanding_sends() {
    let mut service = DatagramService::new(local());
    let (cb, rx) = callback_channel();
    let mut out = Vec::new();
    service.send_datagram(DatagramWriteMemo::new(peer(), vec![1]).on_complete(cb), &mut out);
    let events = service.link_down();
    assert!(events.is_empty(), "memo with a callback fires directly");
    assert_eq!(
        rx.try_recv().unwrap(),
        DatagramOutcome::Rejected { code: codes::TEMPORARY_ERROR }
    );
    assert_eq!(service.outstanding(), 0);
}

#[test]
fn link_down_surfaces_callbackless_memos() {
    let mut service = DatagramService::new(local());
    let mut out = Vec::new();
    service.send_datagram(DatagramWriteMemo::new(peer(), vec![0x20, 0x41]), &mut out);
    let events = service.link_down();
    assert_eq!(events.len(), 1);
    match &events[0] {
        DatagramEvent::Completed { memo, outcome } => {
            assert_eq!(memo.destination, peer());
            assert_eq!(*outcome, DatagramOutcome::Rejected { code: codes::TEMPORARY_ERROR });
        }
        other => panic!("expected Completed event, got {:?}", other),
    }
    assert_eq!(service.outstanding(), 0);
}
