use super::*;
use crate::frame::{EVENT_CLEAR_CANVAS, EVENT_USER_JOINED, EVENT_USER_LEFT, EVENT_USERS_IN_BOARD};
use crate::services::registry::TransportError;
use crate::state::test_helpers::{assert_no_frame, recv_frame, test_app_state};
use serde_json::{Value, json};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

// =============================================================================
// RECORDING TRANSPORT
// =============================================================================

/// In-memory transport that records every delivery as `(to, frame)`.
#[derive(Default)]
struct RecordingTransport {
    rooms: HashMap<String, HashSet<ConnectionId>>,
    sent: RefCell<Vec<(ConnectionId, Frame)>>,
}

impl RecordingTransport {
    fn take(&self) -> Vec<(ConnectionId, Frame)> {
        std::mem::take(&mut *self.sent.borrow_mut())
    }

    fn received_by(deliveries: &[(ConnectionId, Frame)], conn: ConnectionId) -> Vec<Frame> {
        deliveries
            .iter()
            .filter(|(to, _)| *to == conn)
            .map(|(_, frame)| frame.clone())
            .collect()
    }
}

impl RoomTransport for RecordingTransport {
    fn subscribe(&mut self, connection: ConnectionId, board_id: &str) {
        self.rooms.entry(board_id.to_owned()).or_default().insert(connection);
    }

    fn unsubscribe(&mut self, connection: ConnectionId, board_id: &str) {
        if let Some(members) = self.rooms.get_mut(board_id) {
            members.remove(&connection);
        }
    }

    fn publish(&self, board_id: &str, frame: &Frame, except: Option<ConnectionId>) -> usize {
        let Some(members) = self.rooms.get(board_id) else {
            return 0;
        };
        let mut sent = self.sent.borrow_mut();
        let mut count = 0;
        for conn in members {
            if except == Some(*conn) {
                continue;
            }
            sent.push((*conn, frame.clone()));
            count += 1;
        }
        count
    }

    fn send(&self, connection: ConnectionId, frame: Frame) -> Result<(), TransportError> {
        self.sent.borrow_mut().push((connection, frame));
        Ok(())
    }
}

struct Harness {
    directory: BoardDirectory,
    transport: RecordingTransport,
}

impl Harness {
    fn new() -> Self {
        Self { directory: BoardDirectory::new(), transport: RecordingTransport::default() }
    }

    fn run(&mut self, from: ConnectionId, event: ClientEvent) -> Vec<(ConnectionId, Frame)> {
        let effects = handle(&mut self.directory, from, event);
        apply(&mut self.transport, from, effects);
        self.transport.take()
    }

    fn disconnect(&mut self, from: ConnectionId) -> Vec<(ConnectionId, Frame)> {
        let effects = lifecycle::part(&mut self.directory, from);
        apply(&mut self.transport, from, effects);
        self.transport.take()
    }
}

fn join(board_id: &str, user_id: &str, username: &str) -> ClientEvent {
    ClientEvent::JoinBoard(JoinBoard { board_id: board_id.into(), user_id: user_id.into(), username: username.into() })
}

fn draw(board_id: &str) -> (ClientEvent, Value) {
    let payload = json!({
        "boardId": board_id,
        "x0": 0, "y0": 0, "x1": 10, "y1": 10,
        "color": "red", "size": 3
    });
    let Value::Object(map) = payload.clone() else {
        unreachable!();
    };
    (ClientEvent::Draw(Relayed { board_id: Some(board_id.into()), payload: map }), payload)
}

fn roster_ids(frame: &Frame) -> HashSet<String> {
    frame
        .data
        .as_array()
        .expect("roster should be an array")
        .iter()
        .map(|p| p["userId"].as_str().unwrap_or_default().to_owned())
        .collect()
}

// =============================================================================
// PURE HANDLER
// =============================================================================

#[test]
fn join_effects_subscribe_announce_and_reply() {
    let mut dir = BoardDirectory::new();
    let conn = ConnectionId::new();

    let effects = handle(&mut dir, conn, join("room1", "u-1", "Alice"));

    let alice = Participant { user_id: "u-1".into(), username: "Alice".into() };
    assert_eq!(
        effects,
        vec![
            Effect::Subscribe { board_id: "room1".into() },
            Effect::Publish { board_id: "room1".into(), frame: Frame::user_joined(&alice) },
            Effect::Reply(Frame::users_in_board(std::slice::from_ref(&alice))),
        ]
    );
    assert_eq!(dir.list_participants("room1"), vec![alice]);
}

#[test]
fn relayed_event_without_board_has_no_effects() {
    let mut dir = BoardDirectory::new();
    let effects = handle(
        &mut dir,
        ConnectionId::new(),
        ClientEvent::Draw(Relayed { board_id: None, payload: crate::frame::Data::new() }),
    );
    assert!(effects.is_empty());

    let effects = handle(&mut dir, ConnectionId::new(), ClientEvent::ClearCanvas { board_id: None });
    assert!(effects.is_empty());
}

#[test]
fn relayed_events_do_not_touch_directory() {
    let mut dir = BoardDirectory::new();
    let (event, _) = draw("room1");
    handle(&mut dir, ConnectionId::new(), event);
    assert_eq!(dir.board_count(), 0);
}

// =============================================================================
// FAN-OUT
// =============================================================================

#[test]
fn join_sends_roster_to_joiner_and_announces_to_others() {
    let mut h = Harness::new();
    let a = ConnectionId::new();
    let b = ConnectionId::new();

    let first = h.run(a, join("room1", "u-a", "Alice"));
    assert_eq!(first.len(), 1, "lone joiner only gets the roster");
    assert_eq!(first[0].0, a);
    assert_eq!(first[0].1.event, EVENT_USERS_IN_BOARD);

    let second = h.run(b, join("room1", "u-b", "Bob"));
    let to_a = RecordingTransport::received_by(&second, a);
    let to_b = RecordingTransport::received_by(&second, b);

    assert_eq!(to_a.len(), 1);
    assert_eq!(to_a[0].event, EVENT_USER_JOINED);
    assert_eq!(to_a[0].data, json!({"userId": "u-b", "username": "Bob"}));

    assert_eq!(to_b.len(), 1);
    assert_eq!(to_b[0].event, EVENT_USERS_IN_BOARD);
    assert_eq!(roster_ids(&to_b[0]), HashSet::from(["u-a".to_owned(), "u-b".to_owned()]));
}

#[test]
fn draw_reaches_every_other_member_and_never_the_sender() {
    let mut h = Harness::new();
    let conns: Vec<ConnectionId> = (0..4).map(|_| ConnectionId::new()).collect();
    for (i, conn) in conns.iter().enumerate() {
        h.run(*conn, join("room1", &format!("u-{i}"), "x"));
    }
    let outsider = ConnectionId::new();
    h.run(outsider, join("room2", "u-out", "y"));

    let (event, payload) = draw("room1");
    let deliveries = h.run(conns[0], event);

    let recipients: HashSet<ConnectionId> = deliveries.iter().map(|(to, _)| *to).collect();
    assert_eq!(recipients, conns[1..].iter().copied().collect());
    assert!(deliveries.iter().all(|(_, f)| f.event == EVENT_DRAW && f.data == payload));
}

#[test]
fn add_text_is_relayed_verbatim() {
    let mut h = Harness::new();
    let a = ConnectionId::new();
    let b = ConnectionId::new();
    h.run(a, join("room1", "u-a", "Alice"));
    h.run(b, join("room1", "u-b", "Bob"));

    let payload = json!({"boardId": "room1", "text": "hello", "x": 5, "y": 6, "color": "#00f", "size": 20});
    let Value::Object(map) = payload.clone() else {
        unreachable!();
    };
    let deliveries = h.run(b, ClientEvent::AddText(Relayed { board_id: Some("room1".into()), payload: map }));

    assert_eq!(deliveries, vec![(a, Frame::new(EVENT_ADD_TEXT, payload))]);
}

#[test]
fn event_for_unknown_board_reaches_nobody() {
    let mut h = Harness::new();
    let a = ConnectionId::new();
    h.run(a, join("room1", "u-a", "Alice"));

    let (event, _) = draw("ghost");
    assert!(h.run(a, event).is_empty());
}

#[test]
fn duplicate_draw_is_relayed_twice() {
    let mut h = Harness::new();
    let a = ConnectionId::new();
    let b = ConnectionId::new();
    h.run(a, join("room1", "u-a", "Alice"));
    h.run(b, join("room1", "u-b", "Bob"));

    let (event, payload) = draw("room1");
    let mut deliveries = h.run(a, event.clone());
    deliveries.extend(h.run(a, event));

    let to_b = RecordingTransport::received_by(&deliveries, b);
    assert_eq!(to_b.len(), 2, "identical payloads are not deduplicated");
    assert!(to_b.iter().all(|f| f.data == payload));
}

#[test]
fn per_connection_order_is_preserved() {
    let mut h = Harness::new();
    let a = ConnectionId::new();
    let b = ConnectionId::new();
    h.run(a, join("room1", "u-a", "Alice"));
    h.run(b, join("room1", "u-b", "Bob"));

    let mut seen = Vec::new();
    for i in 0..10 {
        let mut map = crate::frame::Data::new();
        map.insert("boardId".into(), json!("room1"));
        map.insert("seq".into(), json!(i));
        seen.extend(h.run(a, ClientEvent::Draw(Relayed { board_id: Some("room1".into()), payload: map })));
    }

    let seqs: Vec<i64> = RecordingTransport::received_by(&seen, b)
        .iter()
        .map(|f| f.data["seq"].as_i64().unwrap_or(-1))
        .collect();
    assert_eq!(seqs, (0..10).collect::<Vec<_>>());
}

// =============================================================================
// SCENARIOS
// =============================================================================

#[test]
fn scenario_draw_clear_disconnect() {
    let mut h = Harness::new();
    let a = ConnectionId::new();
    let b = ConnectionId::new();
    h.run(a, join("room1", "id-alice", "Alice"));
    h.run(b, join("room1", "id-bob", "Bob"));

    // A draws; only B receives exactly that payload.
    let (event, payload) = draw("room1");
    let deliveries = h.run(a, event);
    assert_eq!(deliveries, vec![(b, Frame::new(EVENT_DRAW, payload))]);

    // B clears; A receives a bare signal.
    let deliveries = h.run(b, ClientEvent::ClearCanvas { board_id: Some("room1".into()) });
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].0, a);
    assert_eq!(deliveries[0].1.event, EVENT_CLEAR_CANVAS);
    assert!(deliveries[0].1.data.is_null());

    // A disconnects; B is told, directory keeps only B.
    let deliveries = h.disconnect(a);
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].0, b);
    assert_eq!(deliveries[0].1.event, EVENT_USER_LEFT);
    assert_eq!(deliveries[0].1.data, json!({"userId": "id-alice", "username": "Alice"}));
    assert_eq!(
        h.directory.list_participants("room1"),
        vec![Participant { user_id: "id-bob".into(), username: "Bob".into() }]
    );
}

#[test]
fn scenario_lone_join_then_leave_prunes_board() {
    let mut h = Harness::new();
    let a = ConnectionId::new();
    h.run(a, join("room1", "u-a", "Alice"));

    assert!(h.disconnect(a).is_empty(), "nobody left to notify");
    assert!(!h.directory.contains_board("room1"));

    let c = ConnectionId::new();
    let deliveries = h.run(c, join("room1", "u-c", "Carol"));
    assert_eq!(deliveries.len(), 1);
    assert_eq!(roster_ids(&deliveries[0].1), HashSet::from(["u-c".to_owned()]), "no stale roster entries");
}

#[test]
fn moving_to_another_board_leaves_no_stale_membership() {
    let mut h = Harness::new();
    let a = ConnectionId::new();
    let b = ConnectionId::new();
    h.run(a, join("room1", "u-a", "Alice"));
    h.run(b, join("room1", "u-b", "Bob"));

    let deliveries = h.run(a, join("room2", "u-a", "Alice"));

    let to_b = RecordingTransport::received_by(&deliveries, b);
    assert_eq!(to_b.len(), 1);
    assert_eq!(to_b[0].event, EVENT_USER_LEFT);
    assert_eq!(h.directory.board_of(a), Some("room2"));

    // A no longer receives room1 traffic.
    let (event, _) = draw("room1");
    let deliveries = h.run(b, event);
    assert!(RecordingTransport::received_by(&deliveries, a).is_empty());
}

#[test]
fn rejoining_same_board_keeps_single_membership() {
    let mut h = Harness::new();
    let a = ConnectionId::new();
    let b = ConnectionId::new();
    h.run(a, join("room1", "u-a", "Alice"));
    h.run(b, join("room1", "u-b", "Bob"));
    h.run(a, join("room1", "u-a", "Alicia"));

    assert_eq!(h.directory.participant_count("room1"), 2);

    let (event, _) = draw("room1");
    let deliveries = h.run(b, event);
    assert_eq!(RecordingTransport::received_by(&deliveries, a).len(), 1, "no duplicate broadcast target");
}

#[test]
fn numeric_board_id_does_not_share_room_with_string_id() {
    let decode = |text: &str| Frame::parse(text).and_then(ClientEvent::try_from).expect("frame should decode");
    let mut h = Harness::new();
    let a = ConnectionId::new();
    let b = ConnectionId::new();

    h.run(a, decode(r#"{"event":"join-board","data":{"boardId":7,"userId":"a","username":"A"}}"#));
    let deliveries = h.run(b, decode(r#"{"event":"join-board","data":{"boardId":"7","userId":"b","username":"B"}}"#));

    assert!(RecordingTransport::received_by(&deliveries, a).is_empty());
    assert_eq!(h.directory.board_count(), 2);
    assert_eq!(h.directory.participant_count("7"), 1);
}

// =============================================================================
// DISPATCH (shared state + registry)
// =============================================================================

#[tokio::test]
async fn dispatch_routes_through_registry() {
    let state = test_app_state();
    let (mut alice, mut rx_a) = lifecycle::connect(&state).await;
    let (mut bob, mut rx_b) = lifecycle::connect(&state).await;

    dispatch(&state, alice.id(), join("room1", "u-a", "Alice")).await;
    assert_eq!(recv_frame(&mut rx_a).await.event, EVENT_USERS_IN_BOARD);

    dispatch(&state, bob.id(), join("room1", "u-b", "Bob")).await;
    assert_eq!(recv_frame(&mut rx_a).await.event, EVENT_USER_JOINED);
    assert_eq!(recv_frame(&mut rx_b).await.event, EVENT_USERS_IN_BOARD);

    let (event, payload) = draw("room1");
    dispatch(&state, alice.id(), event).await;
    assert_eq!(recv_frame(&mut rx_b).await, Frame::new(EVENT_DRAW, payload));
    assert_no_frame(&mut rx_a).await;

    lifecycle::disconnect(&state, &mut alice).await;
    lifecycle::disconnect(&state, &mut bob).await;
    assert_eq!(state.active_boards().await, 0);
}
