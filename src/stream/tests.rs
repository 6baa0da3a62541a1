use super::*;
use std::sync::mpsc;

fn local() -> NodeID {
    NodeID::new(0x0501_0101_0301)
}

fn peer() -> NodeID {
    NodeID::new(0x0201_12FE_056C)
}

fn outcome_channel() -> (StreamCallback, mpsc::Receiver<StreamOutcome>) {
    let (tx, rx) = mpsc::channel();
    (Box::new(move |o| tx.send(o).unwrap()), rx)
}

fn accept_reply(offered: u16, echoed: u8, dest_id: u8) -> Message {
    let [hi, lo] = offered.to_be_bytes();
    Message::addressed(
        Mti::STREAM_INITIATE_REPLY,
        peer(),
        local(),
        vec![hi, lo, 0x00, 0x00, echoed, dest_id],
    )
}

fn proceed(dest_id: u8, our_id: u8) -> Message {
    Message::addressed(
        Mti::STREAM_DATA_PROCEED,
        peer(),
        local(),
        vec![dest_id, our_id],
    )
}

#[test]
fn initiate_request_proposes_buffer_and_stream_id() {
    let mut service = StreamService::new(local());
    let (cb, _rx) = outcome_channel();
    let mut out = Vec::new();
    service.write(
        StreamWriteMemo::new(peer(), vec![0; 10], cb).buffer_size(128),
        &mut out,
    );
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].mti, Mti::STREAM_INITIATE_REQUEST);
    assert_eq!(out[0].destination, Some(peer()));
    assert_eq!(out[0].data, vec![0x00, 0x80, 0x00, 0x00, 1]);
    assert_eq!(service.outstanding(), 1);
}

#[test]
fn stop_and_wait_chunks_then_complete() {
    let mut service = StreamService::new(local());
    let (cb, rx) = outcome_channel();
    let payload: Vec<u8> = (0..148).map(|i| i as u8).collect();
    let mut out = Vec::new();
    service.write(
        StreamWriteMemo::new(peer(), payload.clone(), cb).buffer_size(128),
        &mut out,
    );
    out.clear();

    // Accepted: first chunk goes out, prefixed by the peer's stream id.
    service.handle_message(&accept_reply(128, 1, 0x2A), &mut out);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].mti, Mti::STREAM_DATA_SEND);
    assert_eq!(out[0].data[0], 0x2A);
    assert_eq!(&out[0].data[1..], &payload[..128]);
    assert!(rx.try_recv().is_err());

    // Proceed releases the remainder plus the close.
    let mut out2 = Vec::new();
    service.handle_message(&proceed(0x2A, 1), &mut out2);
    assert_eq!(out2.len(), 2);
    assert_eq!(out2[0].mti, Mti::STREAM_DATA_SEND);
    assert_eq!(out2[0].data[0], 0x2A);
    assert_eq!(&out2[0].data[1..], &payload[128..]);
    assert_eq!(out2[1].mti, Mti::STREAM_DATA_COMPLETE);
    assert_eq!(out2[1].data, vec![1, 0x2A]);

    let sent: usize = [&out[0], &out2[0]].iter().map(|m| m.data.len() - 1).sum();
    assert_eq!(sent, 148);
    assert_eq!(rx.try_recv().unwrap(), StreamOutcome::Ok);
    assert_eq!(service.outstanding(), 0);
}

#[test]
fn negotiated_size_is_the_minimum() {
    let mut service = StreamService::new(local());
    let (cb, _rx) = outcome_channel();
    let mut out = Vec::new();
    service.write(
        StreamWriteMemo::new(peer(), vec![0; 100], cb).buffer_size(512),
        &mut out,
    );
    out.clear();
    service.handle_message(&accept_reply(64, 1, 7), &mut out);
    assert_eq!(out[0].data.len(), 65);
}

#[test]
fn nonzero_code_rejects() {
    let mut service = StreamService::new(local());
    let (cb, rx) = outcome_channel();
    let mut out = Vec::new();
    service.write(StreamWriteMemo::new(peer(), vec![1, 2, 3], cb), &mut out);
    out.clear();

    let reply = Message::addressed(
        Mti::STREAM_INITIATE_REPLY,
        peer(),
        local(),
        vec![0x02, 0x00, 0x20, 0x20, 1, 7],
    );
    service.handle_message(&reply, &mut out);
    assert!(out.is_empty());
    assert_eq!(rx.try_recv().unwrap(), StreamOutcome::Rejected(0x2020));
    assert_eq!(service.outstanding(), 0);
}

#[test]
fn mismatched_echoed_stream_id_rejects() {
    let mut service = StreamService::new(local());
    let (cb, rx) = outcome_channel();
    let mut out = Vec::new();
    service.write(StreamWriteMemo::new(peer(), vec![1], cb), &mut out);
    out.clear();
    service.handle_message(&accept_reply(512, 99, 7), &mut out);
    assert_eq!(rx.try_recv().unwrap(), StreamOutcome::Rejected(0));
}

#[test]
fn empty_payload_completes_after_reply() {
    let mut service = StreamService::new(local());
    let (cb, rx) = outcome_channel();
    let mut out = Vec::new();
    service.write(StreamWriteMemo::new(peer(), Vec::new(), cb), &mut out);
    out.clear();
    service.handle_message(&accept_reply(512, 1, 7), &mut out);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].mti, Mti::STREAM_DATA_COMPLETE);
    assert_eq!(rx.try_recv().unwrap(), StreamOutcome::Ok);
}

#[test]
fn unmatched_proceed_is_dropped() {
    let mut service = StreamService::new(local());
    let (cb, rx) = outcome_channel();
    let mut out = Vec::new();
    service.write(StreamWriteMemo::new(peer(), vec![0; 20], cb), &mut out);
    out.clear();
    service.handle_message(&accept_reply(8, 1, 7), &mut out);
    out.clear();

    // Wrong stream id: the transfer stalls, nothing fires.
    service.handle_message(&proceed(7, 42), &mut out);
    assert!(out.is_empty());
    assert!(rx.try_recv().is_err());
    assert_eq!(service.outstanding(), 1);
}

#[test]
fn quiesce_defers_and_restart_resumes() {
    let mut service = StreamService::new(local());
    let (cb, rx) = outcome_channel();
    let mut out = Vec::new();
    service.write(
        StreamWriteMemo::new(peer(), vec![9; 16], cb).buffer_size(8),
        &mut out,
    );
    out.clear();
    service.handle_message(&accept_reply(8, 1, 7), &mut out);
    assert_eq!(out.len(), 1);
    out.clear();

    let quiesce = Message::global(Mti::LINK_LAYER_QUIESCE, local(), vec![]);
    service.handle_message(&quiesce, &mut out);
    service.handle_message(&proceed(7, 1), &mut out);
    assert!(out.is_empty(), "no sends while quiesced");

    let restarted = Message::global(Mti::LINK_LAYER_RESTARTED, local(), vec![]);
    service.handle_message(&restarted, &mut out);
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].mti, Mti::STREAM_DATA_SEND);
    assert_eq!(out[1].mti, Mti::STREAM_DATA_COMPLETE);
    assert_eq!(rx.try_recv().unwrap(), StreamOutcome::Ok);
}

#[test]
fn concurrent_streams_use_distinct_ids() {
    let mut service = StreamService::new(local());
    let mut out = Vec::new();
    let (cb1, _rx1) = outcome_channel();
    let (cb2, _rx2) = outcome_channel();
    service.write(StreamWriteMemo::new(peer(), vec![1], cb1), &mut out);
    service.write(StreamWriteMemo::new(peer(), vec![2], cb2), &mut out);
    assert_eq!(out[0].data[4], 1);
    assert_eq!(out[1].data[4], 2);
}

#[test]
fn link_down_rejects_open_streams() {
    let mut service = StreamService::new(local());
    let (cb, rx) = outcome_channel();
    let mut out = Vec::new();
    service.write(StreamWriteMemo::new(peer(), vec![0; 16], cb), &mut out);
    out.clear();

    let down = Message::global(Mti::LINK_LAYER_DOWN, NodeID::ZERO, Vec::new());
    service.handle_message(&down, &mut out);
    assert!(out.is_empty());
    assert_eq!(
        rx.try_recv().unwrap(),
        StreamOutcome::Rejected(codes::TEMPORARY_ERROR)
    );
    assert_eq!(service.outstanding(), 0);
}
