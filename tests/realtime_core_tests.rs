mod common;

use chrono::Duration;
use common::{FakeTransport, clock, core_with, drop_event, t0};
use rs_livedrops::dispatcher::{Category, Handler, Subscription};
use rs_livedrops::transport::TransportEvent;
use rs_livedrops::types::{ConnectionState, DropEvent, NotificationEvent, NotificationKind};
use std::sync::{Arc, Mutex};

fn collect<T: Clone + Send + 'static>() -> (Arc<Mutex<Vec<T>>>, Handler<T>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let handler = Handler::new(move |value: &T| {
        sink.lock().unwrap().push(value.clone());
        Ok(())
    });
    (seen, handler)
}

#[test]
fn ensure_connected_is_idempotent_while_the_connection_is_live() {
    let transport = FakeTransport::connecting();
    let clock = clock();
    let core = core_with(&transport, &clock);

    let first = core.ensure_connected();
    let second = core.ensure_connected();

    assert_eq!(transport.opened(), 1);
    assert_eq!(first.connection_id, second.connection_id);
    assert_eq!(second.state, ConnectionState::Connected);
    assert_eq!(core.connection_state(), ConnectionState::Connected);
}

#[test]
fn a_pending_connection_is_reused_not_replaced() {
    let transport = FakeTransport::silent();
    let clock = clock();
    let core = core_with(&transport, &clock);

    core.ensure_connected();
    let info = core.ensure_connected();

    assert_eq!(transport.opened(), 1);
    assert_eq!(info.state, ConnectionState::Connecting);
}

#[test]
fn a_connection_that_gave_up_is_replaced() {
    let transport = FakeTransport::connecting();
    let clock = clock();
    let core = core_with(&transport, &clock);

    let first = core.ensure_connected();
    transport.give_up();
    let second = core.ensure_connected();

    assert_eq!(transport.opened(), 2);
    assert_eq!(transport.closed(), 1);
    assert_ne!(first.connection_id, second.connection_id);
    assert!(second.generation > first.generation);
}

#[test]
fn connection_state_follows_transport_callbacks() {
    let transport = FakeTransport::silent();
    let clock = clock();
    let core = core_with(&transport, &clock);
    let (states, handler) = collect::<ConnectionState>();
    core.subscribe(Subscription::Connection(handler));

    core.ensure_connected();
    transport.emit(TransportEvent::Connect);
    transport.emit(TransportEvent::Disconnect {
        reason: "transport close".to_string(),
    });
    transport.emit(TransportEvent::Reconnecting { attempt: 1 });
    transport.emit(TransportEvent::ConnectError {
        error: "ECONNREFUSED".to_string(),
    });

    assert_eq!(
        *states.lock().unwrap(),
        vec![
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Disconnected,
            ConnectionState::Reconnecting,
            ConnectionState::Disconnected,
        ]
    );
    assert_eq!(core.connection_state(), ConnectionState::Disconnected);
}

#[test]
fn online_count_reaches_every_subscriber_unchanged() {
    let transport = FakeTransport::connecting();
    let clock = clock();
    let core = core_with(&transport, &clock);
    let (first, h1) = collect::<u64>();
    let (second, h2) = collect::<u64>();

    core.ensure_connected();
    core.subscribe(Subscription::OnlineCount(h1));
    core.subscribe(Subscription::OnlineCount(h2));
    transport.emit(TransportEvent::OnlineUsersUpdate { count: 42 });

    // delivered before emit returns
    assert_eq!(*first.lock().unwrap(), vec![42]);
    assert_eq!(*second.lock().unwrap(), vec![42]);
    assert_eq!(core.online_count(), Some(42));
}

#[test]
fn duplicate_drop_inside_window_is_published_once() {
    let transport = FakeTransport::connecting();
    let clock = clock();
    let core = core_with(&transport, &clock);
    let (drops, handler) = collect::<DropEvent>();

    core.ensure_connected();
    core.subscribe(Subscription::Drop(handler));

    transport.emit(TransportEvent::LiveDrop(drop_event("A", t0())));
    clock.advance(Duration::seconds(1));
    transport.emit(TransportEvent::LiveDrop(drop_event("B", t0())));
    clock.advance(Duration::seconds(2));
    transport.emit(TransportEvent::LiveDrop(drop_event("A", t0())));

    let ids: Vec<String> = drops
        .lock()
        .unwrap()
        .iter()
        .filter_map(|d| d.id.clone())
        .collect();
    assert_eq!(ids, vec!["A", "B"]);
}

#[test]
fn stale_and_anonymous_drops_are_never_published() {
    let transport = FakeTransport::connecting();
    let clock = clock();
    let core = core_with(&transport, &clock);
    let (drops, handler) = collect::<DropEvent>();

    core.ensure_connected();
    core.subscribe(Subscription::Drop(handler));

    transport.emit(TransportEvent::LiveDrop(drop_event(
        "replayed",
        t0() - Duration::minutes(10),
    )));
    let mut anonymous = drop_event("anon", t0());
    anonymous.id = None;
    transport.emit(TransportEvent::LiveDrop(anonymous));
    let mut undated = drop_event("undated", t0());
    undated.drop_time = None;
    transport.emit(TransportEvent::LiveDrop(undated));

    assert!(drops.lock().unwrap().is_empty());
}

#[test]
fn notifications_are_not_deduplicated() {
    let transport = FakeTransport::connecting();
    let clock = clock();
    let core = core_with(&transport, &clock);
    let (notes, handler) = collect::<NotificationEvent>();

    core.ensure_connected();
    core.subscribe(Subscription::Notification(handler));

    let note = NotificationEvent {
        kind: NotificationKind::System,
        title: "Maintenance at 03:00".to_string(),
        link: None,
    };
    transport.emit(TransportEvent::Notification(note.clone()));
    transport.emit(TransportEvent::Notification(note.clone()));

    assert_eq!(*notes.lock().unwrap(), vec![note.clone(), note]);
}

#[test]
fn last_unsubscribe_closes_the_connection_exactly_once() {
    let transport = FakeTransport::connecting();
    let clock = clock();
    let core = core_with(&transport, &clock);

    let subs: Vec<Subscription> = (0..3)
        .flat_map(|_| {
            core.ensure_connected();
            [
                Subscription::Connection(Handler::new(|_: &ConnectionState| Ok(()))),
                Subscription::Drop(Handler::new(|_: &DropEvent| Ok(()))),
            ]
        })
        .collect();
    for sub in &subs {
        core.subscribe(sub.clone());
    }
    assert_eq!(transport.opened(), 1);
    assert_eq!(core.total_subscribers(), 6);

    for sub in &subs {
        core.unsubscribe(sub);
    }
    // repeated removals after teardown change nothing
    core.unsubscribe(&subs[0]);

    assert_eq!(transport.closed(), 1);
    assert_eq!(core.total_subscribers(), 0);
    assert!(!core.has_connection());
    assert_eq!(core.connection_state(), ConnectionState::Disconnected);
    for category in [
        Category::Connection,
        Category::OnlineCount,
        Category::Drop,
        Category::Notification,
    ] {
        assert_eq!(core.dispatcher().count(category), 0);
    }

    core.ensure_connected();
    assert_eq!(transport.opened(), 2);
}

#[test]
fn events_from_a_retired_connection_are_ignored() {
    let transport = FakeTransport::connecting();
    let clock = clock();
    let core = core_with(&transport, &clock);
    let (counts, handler) = collect::<u64>();
    let sub = Subscription::OnlineCount(handler.clone());

    core.ensure_connected();
    core.subscribe(sub.clone());
    core.unsubscribe(&sub);
    let retired = transport.sink(0);

    core.ensure_connected();
    core.subscribe(sub);
    retired.emit(TransportEvent::OnlineUsersUpdate { count: 1 });
    transport.emit(TransportEvent::OnlineUsersUpdate { count: 2 });

    assert_eq!(*counts.lock().unwrap(), vec![2]);
}

#[test]
fn handler_can_unsubscribe_itself_and_trigger_teardown() {
    let transport = FakeTransport::connecting();
    let clock = clock();
    let core = core_with(&transport, &clock);
    let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
    let calls = Arc::new(Mutex::new(0));

    let handler = {
        let core = core.clone();
        let slot = Arc::clone(&slot);
        let calls = Arc::clone(&calls);
        Handler::new(move |_: &u64| {
            *calls.lock().unwrap() += 1;
            if let Some(me) = slot.lock().unwrap().take() {
                core.unsubscribe(&me);
            }
            Ok(())
        })
    };
    let sub = Subscription::OnlineCount(handler);
    *slot.lock().unwrap() = Some(sub.clone());

    core.ensure_connected();
    core.subscribe(sub);
    transport.emit(TransportEvent::OnlineUsersUpdate { count: 5 });
    transport.emit(TransportEvent::OnlineUsersUpdate { count: 6 });

    assert_eq!(*calls.lock().unwrap(), 1);
    assert_eq!(transport.closed(), 1);
    assert!(!core.has_connection());
}

#[test]
fn failing_handler_does_not_disturb_delivery_or_bookkeeping() {
    let transport = FakeTransport::connecting();
    let clock = clock();
    let core = core_with(&transport, &clock);
    let (counts, good) = collect::<u64>();

    core.ensure_connected();
    core.subscribe(Subscription::OnlineCount(Handler::new(|_: &u64| {
        panic!("render crashed")
    })));
    core.subscribe(Subscription::OnlineCount(Handler::new(|_: &u64| {
        anyhow::bail!("widget detached")
    })));
    core.subscribe(Subscription::OnlineCount(good));

    transport.emit(TransportEvent::OnlineUsersUpdate { count: 9 });
    transport.emit(TransportEvent::OnlineUsersUpdate { count: 10 });

    assert_eq!(*counts.lock().unwrap(), vec![9, 10]);
    assert_eq!(core.total_subscribers(), 3);
    assert!(core.has_connection());
}

#[test]
fn dispose_clears_registries_and_closes() {
    let transport = FakeTransport::connecting();
    let clock = clock();
    let core = core_with(&transport, &clock);

    core.ensure_connected();
    core.subscribe(Subscription::Drop(Handler::new(|_: &DropEvent| Ok(()))));
    core.dispose();

    assert_eq!(core.total_subscribers(), 0);
    assert_eq!(transport.closed(), 1);
    assert!(core.connection_info().is_none());
}
