//! Integration tests for tracing and event monitoring.
//!
//! The trace callback sees every registry interaction in order, which is useful
//! for debugging and for wiring a registry into an application's own logging.

use resource_registry::{BoxError, Registry, RegistryEvent, Resource};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;

struct Handle;

impl Resource for Handle {
    fn release(&self) -> Result<(), BoxError> {
        Ok(())
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::TRACE)
        .try_init();
}

fn recorded_registry() -> (Registry<bool, Handle>, Arc<Mutex<Vec<RegistryEvent>>>) {
    let registry = Registry::new(|ok: &bool| -> Result<Handle, BoxError> {
        if *ok {
            Ok(Handle)
        } else {
            Err("refused".into())
        }
    });

    let events = Arc::new(Mutex::new(Vec::new()));
    let events_clone = events.clone();
    registry.set_trace_callback(move |event| {
        events_clone.lock().unwrap().push(event.clone());
    });

    (registry, events)
}

#[test]
fn test_basic_tracing() {
    init_tracing();
    let (registry, events) = recorded_registry();

    registry.add("db", true);
    registry.get("db").unwrap();
    registry.get("db").unwrap();
    registry.close_all().unwrap();

    let captured: Vec<String> = events.lock().unwrap().iter().map(|e| e.to_string()).collect();
    assert_eq!(
        captured,
        vec![
            "add { name: db }",
            "build { name: db }",
            "built { name: db, ok: true }",
            "hit { name: db }",
            "close { released: 1 }",
        ]
    );
}

#[test]
fn test_failed_build_event() {
    init_tracing();
    let (registry, events) = recorded_registry();

    registry.add("db", false);
    assert!(registry.get("db").is_err());

    let captured = events.lock().unwrap();
    assert_eq!(
        captured.last(),
        Some(&RegistryEvent::Built {
            name: "db".to_string(),
            ok: false
        })
    );
}

#[test]
fn test_missing_config_emits_nothing() {
    let (registry, events) = recorded_registry();

    assert!(registry.get("nothing").is_err());
    assert!(events.lock().unwrap().is_empty());
}

#[test]
fn test_wait_and_discard_events() {
    init_tracing();

    let (release_tx, release_rx) = mpsc::channel::<()>();
    let (started_tx, started_rx) = mpsc::channel::<()>();
    let release_rx = Mutex::new(release_rx);
    let started_tx = Mutex::new(started_tx);

    let registry = Arc::new(Registry::new(move |_: &()| -> Result<Handle, BoxError> {
        started_tx.lock().unwrap().send(()).unwrap();
        release_rx.lock().unwrap().recv().unwrap();
        Ok(Handle)
    }));
    registry.add("db", ());

    let (event_tx, event_rx) = mpsc::channel::<RegistryEvent>();
    let event_tx = Mutex::new(event_tx);
    registry.set_trace_callback(move |event| {
        let _ = event_tx.lock().unwrap().send(event.clone());
    });

    let builder = {
        let registry = registry.clone();
        thread::spawn(move || registry.get("db"))
    };
    started_rx.recv().unwrap();

    let waiter = {
        let registry = registry.clone();
        thread::spawn(move || registry.get("db"))
    };

    // Wait until the second caller has joined the build.
    loop {
        if let RegistryEvent::Wait { name } = event_rx.recv().unwrap() {
            assert_eq!(name, "db");
            break;
        }
    }

    let closer = {
        let registry = registry.clone();
        thread::spawn(move || registry.close_all())
    };
    while !registry.is_closing() {
        thread::yield_now();
    }
    release_tx.send(()).unwrap();

    assert!(builder.join().unwrap().is_err());
    assert!(waiter.join().unwrap().is_err());
    closer.join().unwrap().unwrap();
    registry.clear_trace_callback();

    let rest: Vec<RegistryEvent> = event_rx.try_iter().collect();
    assert!(rest.contains(&RegistryEvent::Discard {
        name: "db".to_string()
    }));
    assert!(rest.contains(&RegistryEvent::Built {
        name: "db".to_string(),
        ok: false
    }));
    assert!(rest.contains(&RegistryEvent::Close { released: 0 }));
}

#[test]
fn test_clear_trace_callback_stops_events() {
    let (registry, events) = recorded_registry();

    registry.add("a", true);
    registry.clear_trace_callback();
    registry.add("b", true);
    registry.get("b").unwrap();

    let captured = events.lock().unwrap();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].to_string(), "add { name: a }");
}
