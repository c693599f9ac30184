//! Transaction template actions.

use std::sync::Arc;
use strata_testkit::prelude::*;
use strata_tx::{
    Transaction, TransactionAction, TransactionConfig, TransactionCoordinator, TransactionError,
    TransactionFactory, TransactionTemplate, XaTransactionFactory,
};

const RETURN_VALUE: &str = "done";

#[derive(Debug)]
enum WorkError {
    Tx(TransactionError),
    Failed,
}

impl From<TransactionError> for WorkError {
    fn from(error: TransactionError) -> Self {
        Self::Tx(error)
    }
}

type WorkResult = Result<&'static str, WorkError>;

fn empty() -> WorkResult {
    Ok(RETURN_VALUE)
}

fn mark_rollback_only() -> WorkResult {
    let transaction = TransactionCoordinator::transaction().ok_or(WorkError::Failed)?;
    transaction.set_rollback_only()?;
    Ok(RETURN_VALUE)
}

fn failure() -> WorkResult {
    Err(WorkError::Failed)
}

fn template(action: TransactionAction) -> TransactionTemplate {
    TransactionTemplate::new(TransactionConfig::new().action(action))
}

fn template_with(action: TransactionAction, factory: TestTransactionFactory) -> TransactionTemplate {
    TransactionTemplate::new(
        TransactionConfig::new()
            .action(action)
            .factory(Arc::new(factory)),
    )
}

fn bound_id() -> Option<String> {
    TransactionCoordinator::transaction().map(|tx| tx.id().to_string())
}

#[test]
fn no_config() {
    TransactionCoordinator::clear();
    let result = TransactionTemplate::unconfigured().execute(empty).unwrap();
    assert_eq!(result, RETURN_VALUE);
    assert!(bound_id().is_none());
}

#[test]
fn indifferent_runs_work_as_is() {
    TransactionCoordinator::clear();
    let tx = RecordingTransaction::new();
    tx.bind().unwrap();

    let result = template(TransactionAction::Indifferent).execute(empty).unwrap();
    assert_eq!(result, RETURN_VALUE);
    assert!(tx.calls().is_empty());
    assert_eq!(bound_id().as_deref(), Some(tx.id()));
    TransactionCoordinator::clear();
}

#[test]
fn never_without_transaction() {
    TransactionCoordinator::clear();
    assert_eq!(template(TransactionAction::Never).execute(empty).unwrap(), RETURN_VALUE);
}

#[test]
fn never_with_transaction_fails() {
    TransactionCoordinator::clear();
    RecordingTransaction::new().bind().unwrap();

    let err = template(TransactionAction::Never).execute(empty).unwrap_err();
    assert!(matches!(err, WorkError::Tx(TransactionError::IllegalState { .. })));
    TransactionCoordinator::clear();
}

#[test]
fn none_without_transaction() {
    TransactionCoordinator::clear();
    assert_eq!(template(TransactionAction::None).execute(empty).unwrap(), RETURN_VALUE);
}

#[test]
fn none_commits_bound_transaction() {
    TransactionCoordinator::clear();
    let tx = RecordingTransaction::new();
    tx.bind().unwrap();

    let result = template(TransactionAction::None).execute(empty).unwrap();
    assert_eq!(result, RETURN_VALUE);
    assert_eq!(tx.calls(), vec!["commit"]);
    assert!(bound_id().is_none());
}

#[test]
fn none_rolls_back_rollback_only_transaction() {
    TransactionCoordinator::clear();
    let tx = RecordingTransaction::new();
    tx.set_rollback_only().unwrap();
    tx.bind().unwrap();

    template(TransactionAction::None).execute(empty).unwrap();
    assert_eq!(tx.count("rollback"), 1);
    assert_eq!(tx.count("commit"), 0);
}

#[test]
fn none_suspends_and_resumes_xa_transaction() {
    TransactionCoordinator::clear();
    let tx = RecordingTransaction::xa();
    tx.bind().unwrap();

    let seen_inside = template(TransactionAction::None)
        .execute(|| Ok::<_, WorkError>(bound_id()))
        .unwrap();

    assert!(seen_inside.is_none());
    assert_eq!(tx.calls(), vec!["suspend", "resume"]);
    assert_eq!(bound_id().as_deref(), Some(tx.id()));
    TransactionCoordinator::clear();
}

#[test]
fn none_resumes_xa_transaction_after_failure() {
    TransactionCoordinator::clear();
    let tx = RecordingTransaction::xa();
    tx.bind().unwrap();

    let result = template(TransactionAction::None).execute(failure);
    assert!(matches!(result, Err(WorkError::Failed)));
    assert_eq!(tx.calls(), vec!["suspend", "resume"]);
    assert_eq!(bound_id().as_deref(), Some(tx.id()));
    TransactionCoordinator::clear();
}

#[test]
fn none_commits_joined_external_transaction() {
    TransactionCoordinator::clear();
    let external = RecordingTransaction::new();
    let template = TransactionTemplate::new(
        TransactionConfig::new()
            .action(TransactionAction::None)
            .interact_with_external(true)
            .factory(Arc::new(TestTransactionFactory::external(external.clone()))),
    );

    assert_eq!(template.execute(empty).unwrap(), RETURN_VALUE);
    assert_eq!(external.calls(), vec!["commit"]);
    assert!(bound_id().is_none());
}

#[test]
fn never_refusing_external_transaction_leaves_thread_unbound() {
    TransactionCoordinator::clear();
    let external = RecordingTransaction::new();
    let template = TransactionTemplate::new(
        TransactionConfig::new()
            .action(TransactionAction::Never)
            .interact_with_external(true)
            .factory(Arc::new(TestTransactionFactory::external(external.clone()))),
    );

    let err = template.execute(empty).unwrap_err();
    assert!(matches!(err, WorkError::Tx(TransactionError::IllegalState { .. })));
    assert!(external.calls().is_empty());
    assert!(bound_id().is_none());
}

#[test]
fn joined_external_transaction_is_unbound_after_failed_work() {
    TransactionCoordinator::clear();
    let external = RecordingTransaction::new();
    let template = TransactionTemplate::new(
        TransactionConfig::new()
            .action(TransactionAction::JoinIfPossible)
            .interact_with_external(true)
            .factory(Arc::new(TestTransactionFactory::external(external.clone()))),
    );

    let seen_inside = std::cell::RefCell::new(None);
    let result = template.execute(|| {
        *seen_inside.borrow_mut() = bound_id();
        failure()
    });

    assert!(matches!(result, Err(WorkError::Failed)));
    assert_eq!(seen_inside.into_inner().as_deref(), Some(external.id()));
    assert!(external.calls().is_empty());
    assert!(bound_id().is_none());
}

#[test]
fn external_is_not_joined_over_a_bound_transaction() {
    TransactionCoordinator::clear();
    let bound = RecordingTransaction::new();
    bound.bind().unwrap();
    let external = RecordingTransaction::new();
    let template = TransactionTemplate::new(
        TransactionConfig::new()
            .action(TransactionAction::None)
            .interact_with_external(true)
            .factory(Arc::new(TestTransactionFactory::external(external.clone()))),
    );

    template.execute(empty).unwrap();
    assert_eq!(bound.calls(), vec!["commit"]);
    assert!(external.calls().is_empty());
    assert!(bound_id().is_none());
}

#[test]
fn always_begin_without_transaction() {
    TransactionCoordinator::clear();
    let new_tx = RecordingTransaction::new();
    let template = template_with(
        TransactionAction::AlwaysBegin,
        TestTransactionFactory::new(new_tx.clone()),
    );

    let seen_inside = template.execute(|| Ok::<_, WorkError>(bound_id())).unwrap();
    assert_eq!(seen_inside.as_deref(), Some(new_tx.id()));
    assert_eq!(new_tx.calls(), vec!["begin", "commit"]);
    assert!(bound_id().is_none());
}

#[test]
fn always_begin_commits_bound_then_commits_new() {
    TransactionCoordinator::clear();
    let tx = RecordingTransaction::new();
    tx.bind().unwrap();
    let new_tx = RecordingTransaction::new();
    let template = template_with(
        TransactionAction::AlwaysBegin,
        TestTransactionFactory::new(new_tx.clone()),
    );

    assert_eq!(template.execute(empty).unwrap(), RETURN_VALUE);
    assert_eq!(tx.calls(), vec!["commit"]);
    assert_eq!(new_tx.calls(), vec!["begin", "commit"]);
    assert!(bound_id().is_none());
}

#[test]
fn always_begin_rolls_back_bound_then_commits_new() {
    TransactionCoordinator::clear();
    let tx = RecordingTransaction::new();
    tx.set_rollback_only().unwrap();
    tx.bind().unwrap();
    let new_tx = RecordingTransaction::new();
    let template = template_with(
        TransactionAction::AlwaysBegin,
        TestTransactionFactory::new(new_tx.clone()),
    );

    template.execute(empty).unwrap();
    assert_eq!(tx.count("rollback"), 1);
    assert_eq!(tx.count("commit"), 0);
    assert_eq!(new_tx.calls(), vec!["begin", "commit"]);
    assert!(bound_id().is_none());
}

#[test]
fn always_begin_rolls_back_new_when_marked_inside() {
    TransactionCoordinator::clear();
    let tx = RecordingTransaction::new();
    tx.set_rollback_only().unwrap();
    tx.bind().unwrap();
    let new_tx = RecordingTransaction::new();
    let template = template_with(
        TransactionAction::AlwaysBegin,
        TestTransactionFactory::new(new_tx.clone()),
    );

    assert_eq!(template.execute(mark_rollback_only).unwrap(), RETURN_VALUE);
    assert_eq!(tx.count("rollback"), 1);
    assert_eq!(new_tx.count("rollback"), 1);
    assert_eq!(new_tx.count("commit"), 0);
    assert!(bound_id().is_none());
}

#[test]
fn always_begin_suspends_xa_and_commits_new() {
    TransactionCoordinator::clear();
    let xa = RecordingTransaction::xa();
    xa.bind().unwrap();
    let new_tx = RecordingTransaction::new();
    let template = template_with(
        TransactionAction::AlwaysBegin,
        TestTransactionFactory::new(new_tx.clone()),
    );

    template.execute(empty).unwrap();
    assert_eq!(new_tx.calls(), vec!["begin", "commit"]);
    assert_eq!(xa.calls(), vec!["suspend", "resume"]);
    assert_eq!(bound_id().as_deref(), Some(xa.id()));
    TransactionCoordinator::clear();
}

#[test]
fn always_begin_suspends_xa_and_rolls_back_new() {
    TransactionCoordinator::clear();
    let xa = RecordingTransaction::xa();
    xa.bind().unwrap();
    let new_tx = RecordingTransaction::new();
    let template = template_with(
        TransactionAction::AlwaysBegin,
        TestTransactionFactory::new(new_tx.clone()),
    );

    template.execute(mark_rollback_only).unwrap();
    assert_eq!(new_tx.count("rollback"), 1);
    assert_eq!(new_tx.count("commit"), 0);
    assert_eq!(xa.calls(), vec!["suspend", "resume"]);
    assert_eq!(bound_id().as_deref(), Some(xa.id()));
    TransactionCoordinator::clear();
}

#[test]
fn always_begin_failure_rolls_back_new_and_resumes_xa() {
    TransactionCoordinator::clear();
    let xa = RecordingTransaction::xa();
    xa.bind().unwrap();
    let new_tx = RecordingTransaction::new();
    let template = template_with(
        TransactionAction::AlwaysBegin,
        TestTransactionFactory::new(new_tx.clone()),
    );

    let result = template.execute(failure);
    assert!(matches!(result, Err(WorkError::Failed)));
    assert_eq!(new_tx.calls(), vec!["begin", "rollback"]);
    assert_eq!(xa.calls(), vec!["suspend", "resume"]);
    assert_eq!(bound_id().as_deref(), Some(xa.id()));
    TransactionCoordinator::clear();
}

#[test]
fn always_join_without_transaction_fails() {
    TransactionCoordinator::clear();
    let err = template(TransactionAction::AlwaysJoin)
        .execute(mark_rollback_only)
        .unwrap_err();
    assert!(matches!(err, WorkError::Tx(TransactionError::IllegalState { .. })));
}

#[test]
fn always_join_uses_bound_transaction() {
    TransactionCoordinator::clear();
    let tx = RecordingTransaction::new();
    tx.bind().unwrap();

    template(TransactionAction::AlwaysJoin)
        .execute(mark_rollback_only)
        .unwrap();
    assert_eq!(tx.calls(), vec!["set_rollback_only"]);
    assert_eq!(bound_id().as_deref(), Some(tx.id()));
    TransactionCoordinator::clear();
}

#[test]
fn begin_or_join_begins_when_nothing_is_bound() {
    TransactionCoordinator::clear();
    let new_tx = RecordingTransaction::new();
    let factory = TestTransactionFactory::new(new_tx.clone());
    let template = template_with(TransactionAction::BeginOrJoin, factory);

    template.execute(empty).unwrap();
    assert_eq!(new_tx.calls(), vec!["begin", "commit"]);
    assert!(bound_id().is_none());
}

#[test]
fn begin_or_join_joins_bound_transaction() {
    TransactionCoordinator::clear();
    let tx = RecordingTransaction::new();
    tx.bind().unwrap();
    let new_tx = RecordingTransaction::new();
    let template = template_with(
        TransactionAction::BeginOrJoin,
        TestTransactionFactory::new(new_tx.clone()),
    );

    template.execute(empty).unwrap();
    assert!(tx.calls().is_empty());
    assert!(new_tx.calls().is_empty());
    assert_eq!(bound_id().as_deref(), Some(tx.id()));
    TransactionCoordinator::clear();
}

#[test]
fn join_if_possible_without_transaction() {
    TransactionCoordinator::clear();
    template(TransactionAction::JoinIfPossible)
        .execute(empty)
        .unwrap();
    assert!(bound_id().is_none());
}

#[test]
fn join_if_possible_with_transaction() {
    TransactionCoordinator::clear();
    let tx = RecordingTransaction::new();
    tx.bind().unwrap();

    template(TransactionAction::JoinIfPossible)
        .execute(empty)
        .unwrap();
    assert!(tx.calls().is_empty());
    assert_eq!(bound_id().as_deref(), Some(tx.id()));
    TransactionCoordinator::clear();
}

#[test]
fn nested_templates_over_xa_factory() {
    TransactionCoordinator::clear();
    let log = CallLog::new();
    let tm = Arc::new(MockTransactionManager::new(log.clone()));
    let factory: Arc<dyn TransactionFactory> = Arc::new(XaTransactionFactory::new(tm.clone()));
    let outer = TransactionTemplate::new(
        TransactionConfig::new()
            .action(TransactionAction::AlwaysBegin)
            .factory(Arc::clone(&factory)),
    );
    let inner = TransactionTemplate::new(
        TransactionConfig::new()
            .action(TransactionAction::AlwaysBegin)
            .factory(Arc::clone(&factory)),
    );

    let result = outer.execute(|| {
        let outer_id = bound_id();
        let inner_id = inner.execute(|| Ok::<_, WorkError>(bound_id()))?;
        assert_ne!(outer_id, inner_id);
        assert_eq!(bound_id(), outer_id);
        Ok::<_, WorkError>(RETURN_VALUE)
    });

    assert_eq!(result.unwrap(), RETURN_VALUE);
    assert_eq!(tm.begun_count(), 2);
    assert_eq!(log.count("tx.commit"), 2);
    assert!(log.called_before("tm.suspend", "tm.resume"));
    assert!(bound_id().is_none());
}
