use super::*;
use crate::message::{Message, Mti};

fn local() -> NodeID {
    NodeID::new(0x0501_0101_0301)
}

fn peer() -> NodeID {
    NodeID::new(0x0201_12FE_056C)
}

fn event(n: u16) -> EventID {
    EventID::from_node(peer(), n)
}

mod pip {
    use super::*;

    #[test]
    fn round_trips_three_bytes() {
        let mut set = PipSet::default();
        set.insert(PipSet::DATAGRAM);
        set.insert(PipSet::MEMORY_CONFIGURATION);
        set.insert(PipSet::SIMPLE_NODE_IDENT);
        assert_eq!(set.to_payload(), vec![0x50, 0x10, 0x00]);
        assert_eq!(PipSet::from_payload(&[0x50, 0x10, 0x00]), set);
        assert!(set.contains(PipSet::DATAGRAM));
        assert!(!set.contains(PipSet::STREAM));
    }

    #[test]
    fn short_payload_parses_what_is_there() {
        let set = PipSet::from_payload(&[0x80]);
        assert!(set.contains(PipSet::SIMPLE_PROTOCOL));
        assert!(PipSet::from_payload(&[]).is_empty());
    }

    #[test]
    fn extra_payload_bytes_are_ignored() {
        let set = PipSet::from_payload(&[0x44, 0x10, 0x00, 0xAA, 0xBB]);
        assert!(set.contains(PipSet::DATAGRAM));
        assert!(set.contains(PipSet::EVENT_EXCHANGE));
        assert!(set.contains(PipSet::SIMPLE_NODE_IDENT));
    }
}

mod snip {
    use super::*;

    #[test]
    fn parses_full_reply() {
        let mut payload = vec![4];
        for s in ["Acme", "Widget", "1.2", "0.9.1"] {
            payload.extend_from_slice(s.as_bytes());
            payload.push(0);
        }
        payload.push(2);
        for s in ["Yard throat", "west ladder"] {
            payload.extend_from_slice(s.as_bytes());
            payload.push(0);
        }
        let mut snip = Snip::default();
        snip.add_data(&payload);
        assert_eq!(snip.manufacturer, "Acme");
        assert_eq!(snip.model, "Widget");
        assert_eq!(snip.hardware_version, "1.2");
        assert_eq!(snip.software_version, "0.9.1");
        assert_eq!(snip.user_name, "Yard throat");
        assert_eq!(snip.user_description, "west ladder");
    }

    #[test]
    fn truncated_reply_parses_best_effort() {
        let mut snip = Snip::default();
        snip.add_data(&[4, b'A', b'c', b'm', b'e', 0, b'W']);
        assert_eq!(snip.manufacturer, "Acme");
        // Unterminated tail is taken as-is; later fields stay empty.
        assert_eq!(snip.model, "W");
        assert_eq!(snip.user_name, "");
    }

    #[test]
    fn accumulates_across_messages() {
        let mut snip = Snip::default();
        snip.add_data(&[4, b'A', b'c']);
        // Model terminator, two empty version strings, the second
        // version byte, then the user strings.
        snip.add_data(&[b'm', b'e', 0, b'W', 0, 0, 0, 2, b'N', 0, 0]);
        assert_eq!(snip.manufacturer, "Acme");
        assert_eq!(snip.model, "W");
        assert_eq!(snip.user_name, "N");
    }

    #[test]
    fn payload_round_trip() {
        let mut snip = Snip::default();
        snip.add_data(&Snip {
            manufacturer: "Acme".into(),
            user_name: "Tower".into(),
            ..Snip::default()
        }
        .to_payload());
        assert_eq!(snip.manufacturer, "Acme");
        assert_eq!(snip.user_name, "Tower");
    }
}

mod local_processor {
    use super::*;

    fn store() -> NodeStore {
        let mut store = NodeStore::new();
        let mut node = Node::new(local());
        node.pip.insert(PipSet::DATAGRAM);
        node.pip.insert(PipSet::SIMPLE_NODE_IDENT);
        node.snip.add_data(&Snip {
            manufacturer: "Acme".into(),
            ..Snip::default()
        }
        .to_payload());
        node.events_produced.insert(event(1));
        node.events_consumed.insert(event(2));
        store.register(node);
        store.add_processor(Box::new(LocalNodeProcessor::new()));
        store
    }

    #[test]
    fn link_up_announces_and_enquires() {
        let mut store = store();
        let mut out = Vec::new();
        let up = Message::global(Mti::LINK_LAYER_UP, NodeID::ZERO, Vec::new());
        assert!(store.dispatch(&up, &mut out));
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].mti, Mti::INITIALIZATION_COMPLETE);
        assert_eq!(out[0].source, local());
        assert_eq!(out[0].data, local().to_bytes().to_vec());
        assert_eq!(out[1].mti, Mti::VERIFY_NODE_ID_GLOBAL);
        assert_eq!(store.node(local()).unwrap().state, NodeState::Initialized);
    }

    #[test]
    fn verify_global_answers_empty_or_matching() {
        let mut store = store();
        let mut out = Vec::new();
        store.dispatch(&Message::global(Mti::VERIFY_NODE_ID_GLOBAL, peer(), vec![]), &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].mti, Mti::VERIFIED_NODE_ID);
        assert_eq!(out[0].data, local().to_bytes().to_vec());

        out.clear();
        store.dispatch(
            &Message::global(Mti::VERIFY_NODE_ID_GLOBAL, peer(), peer().to_bytes().to_vec()),
            &mut out,
        );
        assert!(out.is_empty(), "someone else's id is not answered");
    }

    #[test]
    fn protocol_support_and_snip_replies() {
        let mut store = store();
        let mut out = Vec::new();
        store.dispatch(
            &Message::addressed(Mti::PROTOCOL_SUPPORT_INQUIRY, peer(), local(), vec![]),
            &mut out,
        );
        assert_eq!(out[0].mti, Mti::PROTOCOL_SUPPORT_REPLY);
        assert_eq!(out[0].destination, Some(peer()));
        assert_eq!(out[0].data, vec![0x40, 0x10, 0x00]);

        out.clear();
        store.dispatch(
            &Message::addressed(Mti::SIMPLE_NODE_IDENT_INFO_REQUEST, peer(), local(), vec![]),
            &mut out,
        );
        assert_eq!(out[0].mti, Mti::SIMPLE_NODE_IDENT_INFO_REPLY);
        assert!(out[0].data.starts_with(&[4, b'A', b'c', b'm', b'e', 0]));
    }

    #[test]
    fn identify_events_lists_both_directions() {
        let mut store = store();
        let mut out = Vec::new();
        store.dispatch(&Message::global(Mti::IDENTIFY_EVENTS_GLOBAL, peer(), vec![]), &mut out);
        assert_eq!(out.len(), 2);
        assert!(out.iter().any(|m| m.mti == Mti::PRODUCER_IDENTIFIED_UNKNOWN
            && m.data == event(1).to_bytes().to_vec()));
        assert!(out.iter().any(|m| m.mti == Mti::CONSUMER_IDENTIFIED_UNKNOWN
            && m.data == event(2).to_bytes().to_vec()));
    }

    #[test]
    fn identify_producer_answers_only_matches() {
        let mut store = store();
        let mut out = Vec::new();
        store.dispatch(
            &Message::global(Mti::IDENTIFY_PRODUCER, peer(), event(1).to_bytes().to_vec()),
            &mut out,
        );
        assert_eq!(out.len(), 1);
        out.clear();
        store.dispatch(
            &Message::global(Mti::IDENTIFY_PRODUCER, peer(), event(9).to_bytes().to_vec()),
            &mut out,
        );
        assert!(out.is_empty());
    }

    #[test]
    fn unknown_addressed_mti_is_rejected_with_offender() {
        let mut store = store();
        let mut out = Vec::new();
        let odd = Message::addressed(Mti::from_raw(0x0AA8), peer(), local(), vec![]);
        store.dispatch(&odd, &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].mti, Mti::OPTIONAL_INTERACTION_REJECTED);
        assert_eq!(out[0].destination, Some(peer()));
        assert_eq!(out[0].data, vec![0x10, 0x40, 0x0A, 0xA8]);
    }

    #[test]
    fn unknown_global_mti_is_ignored() {
        let mut store = store();
        let mut out = Vec::new();
        store.dispatch(&Message::global(Mti::from_raw(0x0AA0), peer(), vec![]), &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn service_mtis_are_not_rejected() {
        let mut store = store();
        let mut out = Vec::new();
        store.dispatch(
            &Message::addressed(Mti::DATAGRAM, peer(), local(), vec![0x20]),
            &mut out,
        );
        store.dispatch(
            &Message::addressed(Mti::STREAM_DATA_PROCEED, peer(), local(), vec![1, 2]),
            &mut out,
        );
        assert!(out.is_empty());
    }

    #[test]
    fn solicited_replies_are_not_rejected() {
        // The replies our own discovery requests pull in must not bounce
        // back as Optional_Interaction_Rejected.
        let mut store = store();
        let mut out = Vec::new();
        store.dispatch(
            &Message::addressed(
                Mti::PROTOCOL_SUPPORT_REPLY,
                peer(),
                local(),
                vec![0x44, 0x10, 0x00],
            ),
            &mut out,
        );
        store.dispatch(
            &Message::addressed(
                Mti::SIMPLE_NODE_IDENT_INFO_REPLY,
                peer(),
                local(),
                vec![4, b'A', 0, 0, 0, 0, 2, 0, 0],
            ),
            &mut out,
        );
        assert!(out.is_empty());
    }

    #[test]
    fn messages_to_other_nodes_are_ignored() {
        let mut store = store();
        let mut out = Vec::new();
        store.dispatch(
            &Message::addressed(Mti::PROTOCOL_SUPPORT_INQUIRY, peer(), peer(), vec![]),
            &mut out,
        );
        assert!(out.is_empty());
    }
}

mod remote_processor {
    use super::*;

    fn store() -> NodeStore {
        let mut store = NodeStore::create_on_sight();
        store.add_processor(Box::new(RemoteNodeProcessor::new(local())));
        store
    }

    #[test]
    fn first_sight_creates_node_and_discovers() {
        let mut store = store();
        let mut out = Vec::new();
        let init = Message::global(
            Mti::INITIALIZATION_COMPLETE,
            peer(),
            peer().to_bytes().to_vec(),
        );
        assert!(store.dispatch(&init, &mut out));
        assert_eq!(store.len(), 1);
        assert_eq!(store.node(peer()).unwrap().state, NodeState::Initialized);
        // Discovery fired before the triggering message was processed.
        let mtis: Vec<Mti> = out.iter().map(|m| m.mti).collect();
        assert_eq!(
            mtis,
            vec![
                Mti::PROTOCOL_SUPPORT_INQUIRY,
                Mti::SIMPLE_NODE_IDENT_INFO_REQUEST,
                Mti::IDENTIFY_EVENTS_ADDRESSED,
            ]
        );
        assert!(out.iter().all(|m| m.destination == Some(peer()) && m.source == local()));
    }

    #[test]
    fn zero_source_is_never_a_node() {
        let mut store = store();
        let mut out = Vec::new();
        store.dispatch(&Message::global(Mti::LINK_LAYER_UP, NodeID::ZERO, vec![]), &mut out);
        assert!(store.is_empty());
    }

    #[test]
    fn known_source_is_not_recreated() {
        let mut store = store();
        let mut out = Vec::new();
        let report = Message::global(
            Mti::PRODUCER_CONSUMER_EVENT_REPORT,
            peer(),
            event(3).to_bytes().to_vec(),
        );
        store.dispatch(&report, &mut out);
        let queries = out.len();
        out.clear();
        store.dispatch(&report, &mut out);
        assert_eq!(store.len(), 1);
        assert!(out.is_empty());
        assert!(queries > 0);
    }

    #[test]
    fn replies_fill_in_the_record() {
        let mut store = store();
        let mut out = Vec::new();
        store.dispatch(
            &Message::addressed(Mti::PROTOCOL_SUPPORT_REPLY, peer(), local(), vec![0x44, 0x10, 0x00]),
            &mut out,
        );
        let snip_payload = Snip {
            manufacturer: "Acme".into(),
            user_name: "Turnout 5".into(),
            ..Snip::default()
        }
        .to_payload();
        store.dispatch(
            &Message::addressed(Mti::SIMPLE_NODE_IDENT_INFO_REPLY, peer(), local(), snip_payload),
            &mut out,
        );
        let node = store.node(peer()).unwrap();
        assert!(node.pip.contains(PipSet::DATAGRAM));
        assert!(node.pip.contains(PipSet::EVENT_EXCHANGE));
        assert_eq!(node.snip.user_name, "Turnout 5");
        assert_eq!(node.name(), "Turnout 5");
    }

    #[test]
    fn event_traffic_populates_sets() {
        let mut store = store();
        let mut out = Vec::new();
        store.dispatch(
            &Message::global(Mti::PRODUCER_IDENTIFIED_ACTIVE, peer(), event(1).to_bytes().to_vec()),
            &mut out,
        );
        store.dispatch(
            &Message::global(Mti::CONSUMER_IDENTIFIED_INACTIVE, peer(), event(2).to_bytes().to_vec()),
            &mut out,
        );
        store.dispatch(
            &Message::global(Mti::PRODUCER_CONSUMER_EVENT_REPORT, peer(), event(3).to_bytes().to_vec()),
            &mut out,
        );
        let node = store.node(peer()).unwrap();
        assert!(node.events_produced.contains(&event(1)));
        assert!(node.events_produced.contains(&event(3)));
        assert!(node.events_consumed.contains(&event(2)));
    }

    #[test]
    fn reinitialization_clears_caches() {
        let mut store = store();
        let mut out = Vec::new();
        store.dispatch(
            &Message::addressed(Mti::PROTOCOL_SUPPORT_REPLY, peer(), local(), vec![0x44, 0x10, 0x00]),
            &mut out,
        );
        assert!(!store.node(peer()).unwrap().pip.is_empty());
        store.dispatch(
            &Message::global(Mti::INITIALIZATION_COMPLETE, peer(), peer().to_bytes().to_vec()),
            &mut out,
        );
        assert!(store.node(peer()).unwrap().pip.is_empty());
    }
}
