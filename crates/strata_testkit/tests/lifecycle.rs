//! Lifecycle manager scenarios driven through recording objects.

use parking_lot::Mutex;
use proptest::prelude::*;
use std::sync::Arc;
use strata_lifecycle::phase::{DISPOSE, INITIALISE, NOT_IN_LIFECYCLE, START, STOP};
use strata_lifecycle::{
    BoxError, ConnectionRecovery, LifecycleError, LifecycleManager, LifecycleRegistry,
    LifecycleResult, SimpleLifecycleManager, TransitionTable,
};
use strata_testkit::prelude::*;

fn manager_for(table: &TransitionTable, object: Arc<RecordingObject>) -> LifecycleManager<RecordingObject> {
    let mut builder = LifecycleManager::builder("test").transitions(table);
    for phase in [INITIALISE, START, STOP, DISPOSE] {
        builder = builder.callback(phase, RecordingObject::record);
    }
    builder.build(object)
}

fn canonical(object: Arc<RecordingObject>) -> LifecycleManager<RecordingObject> {
    manager_for(&TransitionTable::canonical(), object)
}

#[derive(Clone, Default)]
struct CountingRecovery {
    losses: Arc<Mutex<Vec<(String, String)>>>,
}

impl ConnectionRecovery for CountingRecovery {
    fn on_connection_lost(&self, manager: &str, phase: &str, _error: BoxError) -> LifecycleResult<()> {
        self.losses.lock().push((manager.to_string(), phase.to_string()));
        Ok(())
    }
}

#[test]
fn scenario_from_reduced_graph() {
    let mut table = TransitionTable::new();
    table.add_direct_transition(NOT_IN_LIFECYCLE, INITIALISE);
    table.add_direct_transition(INITIALISE, START);
    table.add_direct_transition(START, STOP);
    table.add_direct_transition(STOP, START);
    table.add_direct_transition(STOP, DISPOSE);

    let object = Arc::new(RecordingObject::new("svc"));
    let manager = manager_for(&table, Arc::clone(&object));

    let err = manager.fire_lifecycle(START).unwrap_err();
    assert!(err.is_illegal_state());

    for phase in [INITIALISE, START, STOP, START] {
        manager.fire_lifecycle(phase).unwrap();
    }
    let err = manager.fire_lifecycle(DISPOSE).unwrap_err();
    assert!(matches!(err, LifecycleError::IllegalTransition { .. }));
    assert_eq!(object.phases(), vec![INITIALISE, START, STOP, START]);
}

#[test]
fn every_direct_pair_succeeds_and_others_fail() {
    let table = TransitionTable::canonical();
    let phases = [INITIALISE, START, STOP, DISPOSE];
    let paths: [(&str, &[&str]); 5] = [
        (NOT_IN_LIFECYCLE, &[]),
        (INITIALISE, &[INITIALISE]),
        (START, &[INITIALISE, START]),
        (STOP, &[INITIALISE, STOP]),
        (DISPOSE, &[DISPOSE]),
    ];

    for (from, path) in paths {
        for to in phases {
            let manager = canonical(Arc::new(RecordingObject::new("o")));
            for step in path {
                manager.fire_lifecycle(step).unwrap();
            }
            let result = manager.fire_lifecycle(to);
            assert_eq!(
                result.is_ok(),
                table.is_direct(from, to),
                "{from} -> {to}: {result:?}"
            );
        }
    }
}

#[test]
fn failed_phase_can_be_retried() {
    let object = Arc::new(RecordingObject::new("db"));
    let manager = canonical(Arc::clone(&object));
    manager.fire_lifecycle(INITIALISE).unwrap();

    object.fail_on(START, PhaseFailure::Failed);
    let err = manager.fire_lifecycle(START).unwrap_err();
    assert!(matches!(err, LifecycleError::PhaseFailed { ref phase, .. } if phase == START));
    assert!(manager.is_last_phase_execution_failed());
    assert_eq!(manager.last_phase_executed().as_deref(), Some(START));
    assert!(manager.executing_phase().is_none());

    object.heal();
    manager.fire_lifecycle(START).unwrap();
    assert!(manager.is_phase_complete(START));
    assert!(!manager.is_last_phase_execution_failed());
    assert!(manager.fire_lifecycle(START).is_err());
}

#[test]
fn connection_loss_goes_to_recovery() {
    let recovery = CountingRecovery::default();
    let object = Arc::new(RecordingObject::new("broker"));
    let manager = LifecycleManager::builder("jms")
        .transitions(&TransitionTable::canonical())
        .callback(INITIALISE, RecordingObject::record)
        .callback(START, RecordingObject::record)
        .recovery(recovery.clone())
        .build(Arc::clone(&object));

    manager.fire_lifecycle(INITIALISE).unwrap();
    object.fail_on(START, PhaseFailure::ConnectionLost);

    manager.fire_lifecycle(START).unwrap();
    assert_eq!(
        *recovery.losses.lock(),
        vec![("jms".to_string(), START.to_string())]
    );
    assert!(manager.is_last_phase_execution_failed());
    assert!(!manager.is_phase_complete(START));

    object.heal();
    manager.fire_lifecycle(START).unwrap();
    assert!(manager.is_phase_complete(START));
}

#[test]
fn late_object_replays_completed_phases() {
    let manager = canonical(Arc::new(RecordingObject::new("first")));
    for phase in [INITIALISE, START, STOP, START] {
        manager.fire_lifecycle(phase).unwrap();
    }

    let late = RecordingObject::new("late");
    manager.apply_completed_phases(&late).unwrap();
    assert_eq!(late.phases(), vec![INITIALISE, START]);
}

#[test]
fn apply_phase_replays_declared_range() {
    let manager = canonical(Arc::new(RecordingObject::new("first")));
    let object = RecordingObject::new("other");

    manager.apply_phase(&object, NOT_IN_LIFECYCLE, START).unwrap();
    assert_eq!(object.phases(), vec![INITIALISE, START]);
    assert_eq!(manager.current_phase(), NOT_IN_LIFECYCLE);

    let err = manager.apply_phase(&object, "", START).unwrap_err();
    assert!(matches!(err, LifecycleError::InvalidArgument { .. }));
    let err = manager.apply_phase(&object, INITIALISE, "reload").unwrap_err();
    assert!(matches!(err, LifecycleError::InvalidArgument { .. }));
}

#[test]
fn registry_brings_late_objects_up_to_date() {
    let registry = LifecycleRegistry::new("connectors", &TransitionTable::canonical());
    for phase in [INITIALISE, START, STOP, DISPOSE] {
        registry.on_phase(phase, RecordingObject::record);
    }

    let early = Arc::new(RecordingObject::new("early"));
    registry.register("early", Arc::clone(&early)).unwrap();
    registry.fire_lifecycle(INITIALISE).unwrap();
    registry.fire_lifecycle(START).unwrap();

    let late = Arc::new(RecordingObject::new("late"));
    registry.register("late", Arc::clone(&late)).unwrap();
    registry.fire_lifecycle(STOP).unwrap();

    assert_eq!(early.phases(), vec![INITIALISE, START, STOP]);
    assert_eq!(late.phases(), vec![INITIALISE, START, STOP]);
}

#[test]
fn late_object_losing_connection_during_replay_is_not_registered() {
    let registry = LifecycleRegistry::new("connectors", &TransitionTable::canonical());
    for phase in [INITIALISE, START, STOP, DISPOSE] {
        registry.on_phase(phase, RecordingObject::record);
    }
    registry.fire_lifecycle(INITIALISE).unwrap();
    registry.fire_lifecycle(START).unwrap();

    let late = Arc::new(RecordingObject::new("late"));
    late.fail_on(START, PhaseFailure::ConnectionLost);
    let err = registry.register("late", Arc::clone(&late)).unwrap_err();

    assert!(matches!(err, LifecycleError::PhaseFailed { ref phase, .. } if phase == START));
    assert!(registry.lookup("late").is_none());
    assert!(registry.is_empty());
    assert_eq!(late.phases(), vec![INITIALISE]);

    late.heal();
    registry.register("late", Arc::clone(&late)).unwrap();
    assert_eq!(late.phases(), vec![INITIALISE, INITIALISE, START]);
}

#[test]
fn simple_manager_drives_recording_object() {
    let object = Arc::new(RecordingObject::new("component"));
    let lifecycle = SimpleLifecycleManager::new("component", Arc::clone(&object));

    lifecycle.fire_initialise_phase(&RecordingObject::record).unwrap();
    lifecycle.fire_start_phase(&RecordingObject::record).unwrap();
    lifecycle.fire_stop_phase(&RecordingObject::record).unwrap();
    lifecycle.fire_dispose_phase(&RecordingObject::record).unwrap();

    assert!(lifecycle.is_disposed());
    assert_eq!(object.phases(), vec![INITIALISE, START, STOP, DISPOSE]);
}

proptest! {
    #[test]
    fn reset_behaves_like_a_fresh_manager(
        before in phase_sequence_strategy(6),
        after in phase_sequence_strategy(6),
    ) {
        let used = canonical(Arc::new(RecordingObject::new("used")));
        for phase in &before {
            let _ = used.fire_lifecycle(phase);
        }
        used.reset();

        let fresh = canonical(Arc::new(RecordingObject::new("fresh")));
        for phase in &after {
            prop_assert_eq!(
                used.fire_lifecycle(phase).is_ok(),
                fresh.fire_lifecycle(phase).is_ok()
            );
            prop_assert_eq!(used.current_phase(), fresh.current_phase());
            prop_assert_eq!(used.completed_phases(), fresh.completed_phases());
        }
    }

    #[test]
    fn opposing_phases_are_never_both_complete(sequence in phase_sequence_strategy(12)) {
        let manager = canonical(Arc::new(RecordingObject::new("o")));
        for phase in &sequence {
            let _ = manager.fire_lifecycle(phase);
            prop_assert!(!(manager.is_phase_complete(START) && manager.is_phase_complete(STOP)));
            prop_assert!(!(manager.is_phase_complete(INITIALISE) && manager.is_phase_complete(DISPOSE)));
        }
    }
}
