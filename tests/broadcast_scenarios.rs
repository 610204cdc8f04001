use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use phiclear::{
    BroadcastReport, ClearCoordinator, ClearObserver, FailureKind, ListenerFailure, PhiState,
    RegistrationOptions,
};

#[derive(Default)]
struct Recorder {
    failures: Mutex<Vec<ListenerFailure>>,
    broadcasts: Mutex<usize>,
}

impl ClearObserver for Recorder {
    fn on_listener_failure(&self, failure: &ListenerFailure) {
        self.failures.lock().push(failure.clone());
    }

    fn on_broadcast(&self, _report: &BroadcastReport) {
        *self.broadcasts.lock() += 1;
    }
}

/// Listener over a shared value, mirroring what a screen component holds
fn shared_listener<T: Clone + Send + 'static>(
    coordinator: &ClearCoordinator,
    current: T,
    cleared: T,
) -> (phiclear::ListenerGuard, Arc<Mutex<T>>) {
    let value = Arc::new(Mutex::new(current));
    let target = Arc::clone(&value);
    let guard = coordinator.register_listener(move || {
        *target.lock() = cleared.clone();
    });
    (guard, value)
}

#[test]
fn clears_lab_value_and_note_list() {
    let coordinator = ClearCoordinator::new();
    let (_a, a) = shared_listener(&coordinator, "A1c 8.7".to_string(), String::new());
    let (_b, b) = shared_listener(
        &coordinator,
        vec!["note1".to_string(), "note2".to_string()],
        Vec::<String>::new(),
    );

    let report = coordinator.broadcast_clear();

    assert_eq!(*a.lock(), "");
    assert!(b.lock().is_empty());
    assert_eq!(report.cleared(), 2);
}

#[test]
fn unregistered_listener_keeps_its_value() {
    let coordinator = ClearCoordinator::new();
    let (guard, a) = shared_listener(&coordinator, "A1c 8.7".to_string(), String::new());

    guard.unregister();
    let report = coordinator.broadcast_clear();

    assert_eq!(*a.lock(), "A1c 8.7");
    assert_eq!(report.registered, 0);
}

#[test]
fn second_broadcast_changes_nothing() {
    let coordinator = ClearCoordinator::new();
    let dictation = PhiState::new(&coordinator, String::new());
    let meds = PhiState::with_cleared(&coordinator, vec!["metformin".to_string()], Vec::new());
    dictation.set("Follow up in 3 months".to_string());

    coordinator.broadcast_clear();
    let after_first = (dictation.get(), meds.get());
    coordinator.broadcast_clear();

    assert_eq!((dictation.get(), meds.get()), after_first);
    assert!(dictation.is_cleared());
    assert!(meds.is_cleared());
}

#[test]
fn failing_listener_does_not_block_siblings() {
    let recorder = Arc::new(Recorder::default());
    let coordinator = ClearCoordinator::with_observer(recorder.clone());

    let before = PhiState::new(&coordinator, String::new());
    let _broken = coordinator.register_listener_with(
        RegistrationOptions::new().label("gad7-form"),
        || panic!("form state already torn down"),
    );
    let _erroring = coordinator.register_fallible(
        RegistrationOptions::new().label("provider-report"),
        || {
            Err::<(), _>(phiclear::PhiClearError::listener(
                "provider-report",
                "render cache busy",
            ))
        },
    );
    let after = PhiState::new(&coordinator, Vec::<u32>::new());

    before.set("PHQ-9: 14".to_string());
    after.set(vec![1, 2, 3]);

    let report = coordinator.broadcast_clear();

    assert!(before.is_cleared());
    assert!(after.is_cleared());
    assert_eq!(report.notified, 4);
    assert_eq!(report.failures.len(), 2);
    assert_eq!(report.failures[0].kind, FailureKind::Panic);
    assert_eq!(report.failures[1].kind, FailureKind::Error);
    assert!(report.failures[1].message.contains("render cache busy"));

    assert_eq!(recorder.failures.lock().len(), 2);
    assert_eq!(*recorder.broadcasts.lock(), 1);
}

#[test]
fn late_registration_gets_no_replay() {
    let coordinator = ClearCoordinator::new();
    coordinator.broadcast_clear();

    let opened_after = PhiState::with_cleared(&coordinator, "MRN 1234".to_string(), String::new());
    assert_eq!(opened_after.get(), "MRN 1234");
}

#[test]
fn priorities_order_dependent_listeners() {
    let coordinator = ClearCoordinator::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    let mut guards = Vec::new();
    for (label, priority) in [("derived-summary", 10), ("source-notes", -10), ("plain", 0)] {
        let order = Arc::clone(&order);
        guards.push(coordinator.register_listener_with(
            RegistrationOptions::new().label(label).priority(priority),
            move || order.lock().push(label),
        ));
    }

    coordinator.broadcast_clear();
    assert_eq!(
        *order.lock(),
        vec!["source-notes", "plain", "derived-summary"]
    );
}

#[test]
fn guard_dropped_during_unwind_unregisters() {
    let coordinator = ClearCoordinator::new();

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _screen = PhiState::new(&coordinator, "Jane Doe".to_string());
        assert_eq!(coordinator.listener_count(), 1);
        panic!("component crashed while mounted");
    }));

    assert!(result.is_err());
    assert_eq!(coordinator.listener_count(), 0);
}

#[test]
fn independent_coordinators_do_not_interfere() {
    let tab_one = ClearCoordinator::new();
    let tab_two = ClearCoordinator::new();
    let one = PhiState::with_cleared(&tab_one, "note".to_string(), String::new());
    let two = PhiState::with_cleared(&tab_two, "note".to_string(), String::new());

    tab_one.broadcast_clear();

    assert!(one.is_cleared());
    assert!(!two.is_cleared());
}

#[test]
fn broadcast_from_another_thread() {
    let coordinator = ClearCoordinator::new();
    let state = PhiState::with_cleared(&coordinator, 42u32, 0);

    let remote = coordinator.clone();
    std::thread::spawn(move || remote.broadcast_clear())
        .join()
        .expect("broadcast thread panicked");

    assert_eq!(state.get(), 0);
}

#[test]
fn listener_registered_during_broadcast_waits_for_the_next_one() {
    let coordinator = ClearCoordinator::new();
    let opened = Arc::new(AtomicUsize::new(0));
    let late_guards = Arc::new(Mutex::new(Vec::new()));

    let registrar = coordinator.clone();
    let counter = Arc::clone(&opened);
    let guards = Arc::clone(&late_guards);
    let _opener = coordinator.register_listener(move || {
        if guards.lock().is_empty() {
            let counter = Arc::clone(&counter);
            guards.lock().push(registrar.register_listener(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }
    });

    let first = coordinator.broadcast_clear();
    assert_eq!(first.registered, 1);
    assert_eq!(first.notified, 1);
    assert_eq!(opened.load(Ordering::SeqCst), 0);
    assert_eq!(coordinator.listener_count(), 2);

    let second = coordinator.broadcast_clear();
    assert_eq!(second.notified, 2);
    assert_eq!(opened.load(Ordering::SeqCst), 1);
}

#[test]
fn concurrent_broadcasts_run_one_after_another() {
    let coordinator = ClearCoordinator::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();

    let counter = Arc::clone(&calls);
    let _slow = coordinator.register_listener(move || {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            let _ = entered_tx.send(());
            let _ = release_rx.recv();
        }
    });

    let first_handle = coordinator.clone();
    let first = std::thread::spawn(move || first_handle.broadcast_clear());
    entered_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("first broadcast never reached the listener");

    let second_handle = coordinator.clone();
    let second = std::thread::spawn(move || second_handle.broadcast_clear());
    std::thread::sleep(Duration::from_millis(50));
    assert!(!second.is_finished());
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    release_tx.send(()).expect("listener dropped its receiver");
    let first = first.join().expect("first broadcast panicked");
    let second = second.join().expect("second broadcast panicked");

    assert_eq!(first.notified, 1);
    assert_eq!(second.notified, 1);
    assert_eq!(second.reentrant_skips, 0);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}
