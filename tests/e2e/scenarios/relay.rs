use crate::harness::{Conformance, MockService, ServiceBehavior};
use pairtest_core::{PairedConnection, Received, RelayFrame, ScenarioKind, INITIATE_PATH};

#[test]
fn test_simple_relay() {
    Conformance::new("simple_relay")
        .scenario(ScenarioKind::SimpleRelay)
        .run()
        .expect("conforming service should relay");
}

#[test]
fn test_full_exchange() {
    let summary = Conformance::new("full_exchange")
        .scenario(ScenarioKind::FullExchange)
        .run()
        .unwrap();
    assert_eq!(summary.passed.len(), 1);
    assert_eq!(summary.passed[0].scenario, ScenarioKind::FullExchange);
}

#[test]
fn test_channel_id_derived_from_link() {
    Conformance::new("link_only_handshake")
        .against(ServiceBehavior::conforming().without_channel_id())
        .scenario(ScenarioKind::SimpleRelay)
        .scenario(ScenarioKind::BadChannel)
        .run()
        .unwrap();
}

#[test]
fn test_missing_remote_sender_fails_full_exchange() {
    Conformance::new("no_sender_metadata")
        .against(ServiceBehavior::conforming().without_sender_metadata())
        .scenario(ScenarioKind::FullExchange)
        .run()
        .expect_failure("No remote in sender data");
}

#[test]
fn test_altered_relay_fails_simple_relay() {
    let result = Conformance::new("mangled_relay")
        .against(ServiceBehavior::conforming().mangling_relays())
        .scenario(ScenarioKind::SimpleRelay)
        .scenario(ScenarioKind::FullExchange)
        .run();
    assert_eq!(result.started, vec![ScenarioKind::SimpleRelay]);
    result.expect_failure("simple_relay: assertion failed: relayed message didn't match");
}

#[test]
fn test_paired_connection_by_hand() {
    let service = MockService::start(ServiceBehavior::conforming()).unwrap();
    let base = service.base_url();

    let mut initiator = PairedConnection::connect(&format!("{base}{INITIATE_PATH}")).unwrap();
    assert_eq!(initiator.link(), format!("/v1/ws/{}", initiator.channel_id()));
    let mut peer = PairedConnection::connect(&format!("{base}{}", initiator.link())).unwrap();
    assert_eq!(peer.channel_id(), initiator.channel_id());

    initiator.send("ping").unwrap();
    let Received::Message(text) = peer.receive().unwrap() else {
        panic!("peer closed before the relay arrived");
    };
    let frame = RelayFrame::parse(&text).unwrap();
    assert_eq!(frame.message, "ping");
    assert_eq!(frame.sender["remote"], "127.0.0.1");

    // Relay works in both directions.
    peer.send("pong").unwrap();
    let Received::Message(text) = initiator.receive().unwrap() else {
        panic!("initiator closed before the relay arrived");
    };
    assert_eq!(RelayFrame::parse(&text).unwrap().message, "pong");

    initiator.close("Goodbye").unwrap();
    assert!(initiator.is_closed());
    assert!(peer.receive().unwrap().is_closed());
    assert!(peer.is_closed());
    assert_eq!(service.connections(), 2);
}
