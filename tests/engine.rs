//! End-to-end lifecycle scenarios against a fresh store: submission
//! through chains to terminal states, conversion under low balances,
//! concurrent approver races, cancellation sub-flows and the sweeps.

use std::sync::Arc;
use std::thread;

use chrono::NaiveDate;

use hrm_leave::audit::AuditAction;
use hrm_leave::config::PolicyConfig;
use hrm_leave::engine::{LeaveEngine, SubmitLeave, SubmitOutcome};
use hrm_leave::error::EngineError;
use hrm_leave::model::{
    ApprovalDecision, Balance, Holiday, LeaveStatus, LeaveType, Role, User,
};
use hrm_leave::notify::{Recipient, RecordingNotifier, TemplateKind};
use hrm_leave::policy::WarningKind;
use hrm_leave::store::MemoryStore;

const EMPLOYEE: u64 = 1;
const DEPT_HEAD: u64 = 2;
const HR_ADMIN: u64 = 3;
const HR_HEAD: u64 = 4;
const CEO: u64 = 5;

const YEAR: i32 = 2026;

fn d(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(YEAR, month, day).unwrap()
}

fn setup() -> (Arc<MemoryStore>, Arc<RecordingNotifier>, Arc<LeaveEngine>) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let store = Arc::new(MemoryStore::new());
    store
        .transaction(|state| {
            for (id, name, role) in [
                (EMPLOYEE, "asha", Role::Employee),
                (DEPT_HEAD, "farid", Role::DeptHead),
                (HR_ADMIN, "nusrat", Role::HrAdmin),
                (HR_HEAD, "kamal", Role::HrHead),
                (CEO, "rahim", Role::Ceo),
            ] {
                state.insert_user(User {
                    id,
                    name: name.into(),
                    role,
                    department_id: Some(1),
                    active: true,
                });
            }
            Ok(())
        })
        .unwrap();
    let notifier = Arc::new(RecordingNotifier::new());
    let engine = Arc::new(LeaveEngine::new(
        store.clone(),
        PolicyConfig::v1(),
        notifier.clone(),
    ));
    (store, notifier, engine)
}

fn seed_balance(
    store: &MemoryStore,
    employee_id: u64,
    leave_type: LeaveType,
    opening: i32,
    accrued: i32,
    used: i32,
) {
    store
        .transaction(|state| {
            let cfg = PolicyConfig::v1();
            let b = state.ensure_balance(&cfg, employee_id, leave_type, YEAR);
            b.opening = opening;
            b.accrued = accrued;
            b.used = used;
            b.recompute();
            Ok(())
        })
        .unwrap();
}

fn balance(store: &MemoryStore, employee_id: u64, leave_type: LeaveType) -> Balance {
    store
        .read(|s| s.balances.get(&(employee_id, leave_type, YEAR)).cloned())
        .unwrap()
        .expect("balance row")
}

fn submit(
    engine: &LeaveEngine,
    leave_type: LeaveType,
    start: NaiveDate,
    end: NaiveDate,
    certificate_url: Option<&str>,
    today: NaiveDate,
) -> SubmitOutcome {
    engine
        .submit(
            SubmitLeave {
                employee_id: EMPLOYEE,
                leave_type,
                start_date: start,
                end_date: end,
                certificate_url: certificate_url.map(String::from),
            },
            today,
        )
        .unwrap()
}

/// Forwards through DEPT_HEAD, HR_ADMIN and HR_HEAD, then the CEO
/// approves. The full chain for a long-type request from an EMPLOYEE.
fn approve_through_long_chain(engine: &LeaveEngine, leave_id: u64) {
    engine.forward(leave_id, DEPT_HEAD, None).unwrap();
    engine.forward(leave_id, HR_ADMIN, None).unwrap();
    engine.forward(leave_id, HR_HEAD, None).unwrap();
    engine.approve(leave_id, CEO, None).unwrap();
}

fn audit_count(store: &MemoryStore, action: AuditAction) -> usize {
    store
        .read(|s| s.audit_log.iter().filter(|r| r.action == action).count())
        .unwrap()
}

/* =========================
Scenario A: the short casual request
========================= */

#[test]
fn casual_two_days_single_step_chain() {
    let (store, notifier, engine) = setup();
    let today = d(8, 10);

    let outcome = submit(&engine, LeaveType::Casual, d(8, 12), d(8, 13), None, today);
    let leave_id = outcome.leave.id;
    assert_eq!(outcome.leave.status, LeaveStatus::Submitted);
    assert_eq!(outcome.leave.working_days, 2);
    assert_eq!(outcome.leave.policy_version, 1);
    assert!(outcome.warnings.is_empty());

    // nothing debited at submission
    assert!(store
        .read(|s| s.balances.get(&(EMPLOYEE, LeaveType::Casual, YEAR)).cloned())
        .unwrap()
        .is_none());

    let leave = engine.approve(leave_id, DEPT_HEAD, None).unwrap();
    assert_eq!(leave.status, LeaveStatus::Approved);
    assert_eq!(leave.allocation.len(), 1);
    assert_eq!(leave.allocation[0].leave_type, LeaveType::Casual);
    assert_eq!(leave.allocation[0].days, 2);

    let casual = balance(&store, EMPLOYEE, LeaveType::Casual);
    assert_eq!(casual.used, 2);
    assert_eq!(casual.closing, 8);

    let sent = notifier.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].recipient, Recipient::Role(Role::DeptHead));
    assert_eq!(sent[0].template, TemplateKind::ApprovalRequested);
    assert_eq!(sent[1].recipient, Recipient::Employee(EMPLOYEE));
    assert_eq!(sent[1].template, TemplateKind::Approved);

    assert_eq!(audit_count(&store, AuditAction::Submitted), 1);
    assert_eq!(audit_count(&store, AuditAction::Approved), 1);
}

/* =========================
Scenario B: medical overrun converts down the priority list
========================= */

#[test]
fn medical_overrun_converts_to_earned_then_unpaid() {
    let (store, _notifier, engine) = setup();
    let today = d(8, 10);
    seed_balance(&store, EMPLOYEE, LeaveType::Earned, 0, 4, 0);

    // 2026-08-10 .. 2026-09-04 spans 20 working days
    let outcome = submit(
        &engine,
        LeaveType::Medical,
        d(8, 10),
        d(9, 4),
        Some("doc://cert/17"),
        today,
    );
    assert_eq!(outcome.leave.working_days, 20);
    assert!(outcome.plan.converted);
    let parts: Vec<(LeaveType, u32)> = outcome
        .plan
        .parts
        .iter()
        .map(|p| (p.leave_type, p.days))
        .collect();
    assert_eq!(
        parts,
        vec![
            (LeaveType::Medical, 14),
            (LeaveType::Earned, 4),
            (LeaveType::Extraordinary, 2),
        ]
    );

    approve_through_long_chain(&engine, outcome.leave.id);

    assert_eq!(balance(&store, EMPLOYEE, LeaveType::Medical).used, 14);
    assert_eq!(balance(&store, EMPLOYEE, LeaveType::Medical).closing, 0);
    assert_eq!(balance(&store, EMPLOYEE, LeaveType::Earned).used, 4);
    let unpaid = balance(&store, EMPLOYEE, LeaveType::Extraordinary);
    assert_eq!(unpaid.used, 2);
    assert_eq!(unpaid.closing, -2);
}

/* =========================
Scenario C: casual conversion has no unpaid fallback
========================= */

#[test]
fn infeasible_casual_fails_submission_without_writes() {
    let (store, notifier, engine) = setup();
    seed_balance(&store, EMPLOYEE, LeaveType::Casual, 0, 3, 0);

    let err = engine
        .submit(
            SubmitLeave {
                employee_id: EMPLOYEE,
                leave_type: LeaveType::Casual,
                start_date: d(8, 10),
                end_date: d(8, 14),
                certificate_url: None,
            },
            d(8, 10),
        )
        .unwrap_err();
    match err {
        EngineError::InsufficientBalance {
            leave_type,
            requested,
            ..
        } => {
            assert_eq!(leave_type, LeaveType::Casual);
            assert_eq!(requested, 5);
        }
        other => panic!("unexpected error: {other}"),
    }

    // the failed transaction left nothing behind
    assert!(store.read(|s| s.requests.is_empty()).unwrap());
    assert!(store.read(|s| s.audit_log.is_empty()).unwrap());
    assert!(notifier.sent().is_empty());
    assert_eq!(balance(&store, EMPLOYEE, LeaveType::Casual).used, 0);
}

/* =========================
Scenario D: concurrent approver actions
========================= */

#[test]
fn concurrent_forwards_leave_one_winner() {
    let (store, _notifier, engine) = setup();
    seed_balance(&store, EMPLOYEE, LeaveType::Earned, 0, 24, 0);
    let outcome = submit(&engine, LeaveType::Earned, d(8, 24), d(8, 28), None, d(8, 10));
    let leave_id = outcome.leave.id;

    let mut handles = Vec::new();
    for _ in 0..2 {
        let engine = engine.clone();
        handles.push(thread::spawn(move || {
            engine.forward(leave_id, DEPT_HEAD, None)
        }));
    }
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let oks = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(oks, 1);
    let loser = results.into_iter().find(|r| r.is_err()).unwrap();
    assert!(matches!(
        loser.unwrap_err(),
        EngineError::StateConflict { .. }
    ));

    // exactly one step-2 row, exactly one pending
    let rows = store
        .read(|s| s.approvals_for(leave_id).to_vec())
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].step, 1);
    assert_eq!(rows[0].decision, ApprovalDecision::Forwarded);
    assert_eq!(rows[1].step, 2);
    assert_eq!(rows[1].approver_role, Role::HrAdmin);
    assert_eq!(rows[1].decision, ApprovalDecision::Pending);
}

#[test]
fn concurrent_approvals_debit_exactly_once() {
    let (store, _notifier, engine) = setup();
    let outcome = submit(&engine, LeaveType::Casual, d(8, 12), d(8, 13), None, d(8, 10));
    let leave_id = outcome.leave.id;

    let mut handles = Vec::new();
    for _ in 0..2 {
        let engine = engine.clone();
        handles.push(thread::spawn(move || {
            engine.approve(leave_id, DEPT_HEAD, None)
        }));
    }
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    let loser = results.into_iter().find(|r| r.is_err()).unwrap();
    assert!(matches!(
        loser.unwrap_err(),
        EngineError::StateConflict { .. }
    ));
    assert_eq!(balance(&store, EMPLOYEE, LeaveType::Casual).used, 2);
    assert_eq!(audit_count(&store, AuditAction::Approved), 1);
}

/* =========================
Scenario E: shortening restores the tail and re-checks overflow
========================= */

#[test]
fn shorten_restores_tail_and_overflows_into_special() {
    let (store, _notifier, engine) = setup();
    seed_balance(&store, EMPLOYEE, LeaveType::Earned, 58, 8, 0); // closing 66

    let outcome = submit(&engine, LeaveType::Earned, d(8, 10), d(8, 21), None, d(8, 3));
    let leave_id = outcome.leave.id;
    assert_eq!(outcome.leave.working_days, 10);
    approve_through_long_chain(&engine, leave_id);
    assert_eq!(balance(&store, EMPLOYEE, LeaveType::Earned).closing, 56);

    // mid-leave, keep Mon-Thu of the first week only
    let leave = engine.shorten(leave_id, EMPLOYEE, d(8, 13), d(8, 12)).unwrap();
    assert_eq!(leave.status, LeaveStatus::Approved);
    assert_eq!(leave.working_days, 4);
    assert_eq!(leave.end_date, d(8, 13));
    assert_eq!(leave.original_end_date, Some(d(8, 21)));
    assert_eq!(leave.allocation.len(), 1);
    assert_eq!(leave.allocation[0].days, 4);

    // 6 restored days push EARNED to 62; 2 spill into SPECIAL at the cap
    let earned = balance(&store, EMPLOYEE, LeaveType::Earned);
    assert_eq!(earned.used, 4);
    assert_eq!(earned.closing, 60);
    assert_eq!(balance(&store, EMPLOYEE, LeaveType::Special).closing, 2);
    assert_eq!(audit_count(&store, AuditAction::BalanceOverflow), 1);
    assert_eq!(audit_count(&store, AuditAction::Shortened), 1);
}

/* =========================
Chain discipline
========================= */

#[test]
fn intermediate_approver_must_forward_not_approve_or_reject() {
    let (store, _notifier, engine) = setup();
    seed_balance(&store, EMPLOYEE, LeaveType::Earned, 0, 24, 0);
    let leave_id = submit(&engine, LeaveType::Earned, d(8, 24), d(8, 28), None, d(8, 10))
        .leave
        .id;

    let err = engine.approve(leave_id, DEPT_HEAD, None).unwrap_err();
    assert!(matches!(err, EngineError::Authorization { .. }));
    let err = engine.reject(leave_id, DEPT_HEAD, None).unwrap_err();
    assert!(matches!(err, EngineError::Authorization { .. }));

    // the chain is untouched
    let rows = store.read(|s| s.approvals_for(leave_id).to_vec()).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].decision, ApprovalDecision::Pending);
}

#[test]
fn out_of_turn_actor_is_rejected() {
    let (_store, _notifier, engine) = setup();
    let leave_id = submit(&engine, LeaveType::Casual, d(8, 12), d(8, 13), None, d(8, 10))
        .leave
        .id;
    // CASUAL chain for an employee pends with DEPT_HEAD, not HR_HEAD
    let err = engine.approve(leave_id, HR_HEAD, None).unwrap_err();
    assert!(matches!(err, EngineError::Authorization { .. }));
}

#[test]
fn requester_cannot_act_on_own_chain() {
    let (store, _notifier, engine) = setup();
    seed_balance(&store, DEPT_HEAD, LeaveType::Casual, 0, 10, 0);

    // a department head's own CASUAL request pends with HR_ADMIN
    let outcome = engine
        .submit(
            SubmitLeave {
                employee_id: DEPT_HEAD,
                leave_type: LeaveType::Casual,
                start_date: d(8, 12),
                end_date: d(8, 13),
                certificate_url: None,
            },
            d(8, 10),
        )
        .unwrap();
    let err = engine.approve(outcome.leave.id, DEPT_HEAD, None).unwrap_err();
    assert!(matches!(err, EngineError::Authorization { .. }));
}

#[test]
fn hr_admin_rejects_from_any_chain_position() {
    let (store, _notifier, engine) = setup();
    seed_balance(&store, EMPLOYEE, LeaveType::Earned, 0, 24, 0);
    let leave_id = submit(&engine, LeaveType::Earned, d(8, 24), d(8, 28), None, d(8, 10))
        .leave
        .id;

    // step 1 pends with DEPT_HEAD; HR_ADMIN cross-cuts
    let leave = engine
        .reject(leave_id, HR_ADMIN, Some("overlaps the audit window".into()))
        .unwrap();
    assert_eq!(leave.status, LeaveStatus::Rejected);
    assert_eq!(balance(&store, EMPLOYEE, LeaveType::Earned).used, 0);

    let rows = store.read(|s| s.approvals_for(leave_id).to_vec()).unwrap();
    assert_eq!(rows[0].decision, ApprovalDecision::Rejected);
    assert_eq!(rows[0].approver_id, Some(HR_ADMIN));
}

#[test]
fn every_step_keeps_a_single_pending_row() {
    let (store, _notifier, engine) = setup();
    seed_balance(&store, EMPLOYEE, LeaveType::Earned, 0, 24, 0);
    let leave_id = submit(&engine, LeaveType::Earned, d(8, 24), d(8, 28), None, d(8, 10))
        .leave
        .id;

    for actor in [DEPT_HEAD, HR_ADMIN, HR_HEAD] {
        engine.forward(leave_id, actor, None).unwrap();
        let rows = store.read(|s| s.approvals_for(leave_id).to_vec()).unwrap();
        let pending: Vec<_> = rows.iter().filter(|a| a.is_pending()).collect();
        assert_eq!(pending.len(), 1);
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(row.step, i as u32 + 1);
        }
    }
    engine.approve(leave_id, CEO, None).unwrap();
    let rows = store.read(|s| s.approvals_for(leave_id).to_vec()).unwrap();
    assert_eq!(rows.len(), 4);
    assert!(rows.iter().all(|a| !a.is_pending()));
}

/* =========================
Return / resubmit and pre-approval cancel
========================= */

#[test]
fn returned_request_resubmits_with_a_fresh_chain() {
    let (store, notifier, engine) = setup();
    let leave_id = submit(&engine, LeaveType::Casual, d(8, 12), d(8, 13), None, d(8, 10))
        .leave
        .id;

    let leave = engine
        .return_request(leave_id, DEPT_HEAD, Some("pick dates after the release".into()))
        .unwrap();
    assert_eq!(leave.status, LeaveStatus::Returned);
    assert!(store
        .read(|s| s.current_pending(leave_id).is_none())
        .unwrap());

    let outcome = engine
        .resubmit(leave_id, EMPLOYEE, d(8, 19), d(8, 20), None, d(8, 10))
        .unwrap();
    assert_eq!(outcome.leave.status, LeaveStatus::Submitted);
    assert_eq!(outcome.leave.start_date, d(8, 19));
    assert_eq!(outcome.leave.working_days, 2);

    let rows = store.read(|s| s.approvals_for(leave_id).to_vec()).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].step, 1);
    assert_eq!(rows[0].approver_role, Role::DeptHead);
    assert!(rows[0].is_pending());

    let sent = notifier.sent();
    assert_eq!(
        sent.last().map(|i| i.template),
        Some(TemplateKind::ApprovalRequested)
    );
}

#[test]
fn requester_cancels_before_approval_without_balance_movement() {
    let (store, _notifier, engine) = setup();
    let leave_id = submit(&engine, LeaveType::Casual, d(8, 12), d(8, 13), None, d(8, 10))
        .leave
        .id;

    let leave = engine.cancel(leave_id, EMPLOYEE).unwrap();
    assert_eq!(leave.status, LeaveStatus::Cancelled);
    assert!(store
        .read(|s| s.current_pending(leave_id).is_none())
        .unwrap());
    assert!(store
        .read(|s| s.balances.get(&(EMPLOYEE, LeaveType::Casual, YEAR)).cloned())
        .unwrap()
        .is_none());

    // terminal: no further chain action sticks
    let err = engine.approve(leave_id, DEPT_HEAD, None).unwrap_err();
    assert!(matches!(err, EngineError::StateConflict { .. }));
}

/* =========================
Post-approval cancellation
========================= */

fn approved_earned_leave(
    store: &MemoryStore,
    engine: &LeaveEngine,
    start: NaiveDate,
    end: NaiveDate,
    today: NaiveDate,
) -> u64 {
    seed_balance(store, EMPLOYEE, LeaveType::Earned, 0, 24, 0);
    let leave_id = submit(engine, LeaveType::Earned, start, end, None, today).leave.id;
    approve_through_long_chain(engine, leave_id);
    leave_id
}

#[test]
fn full_cancellation_restores_the_whole_debit() {
    let (store, _notifier, engine) = setup();
    let leave_id = approved_earned_leave(&store, &engine, d(8, 24), d(8, 28), d(8, 10));
    assert_eq!(balance(&store, EMPLOYEE, LeaveType::Earned).used, 5);

    let leave = engine
        .request_cancellation(leave_id, EMPLOYEE, None, "plans changed".into(), d(8, 10))
        .unwrap();
    assert_eq!(leave.status, LeaveStatus::CancellationRequested);
    assert!(!leave.partial_cancellation);

    // review pends with HR_ADMIN on a fresh step-1 row
    let rows = store.read(|s| s.approvals_for(leave_id).to_vec()).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].approver_role, Role::HrAdmin);

    let leave = engine.approve(leave_id, HR_ADMIN, None).unwrap();
    assert_eq!(leave.status, LeaveStatus::Cancelled);
    assert!(leave.allocation.is_empty());
    assert_eq!(balance(&store, EMPLOYEE, LeaveType::Earned).used, 0);
    assert_eq!(audit_count(&store, AuditAction::CancellationApproved), 1);
}

#[test]
fn started_leave_cancels_partially_with_past_days_locked() {
    let (store, _notifier, engine) = setup();
    let leave_id = approved_earned_leave(&store, &engine, d(8, 10), d(8, 21), d(8, 3));
    let today = d(8, 12);

    // full cancellation of started leave is refused
    let err = engine
        .request_cancellation(leave_id, EMPLOYEE, None, "x".into(), today)
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::PolicyViolation { rule: "LEAVE_STARTED", .. }
    ));

    // a proposed end before today is refused
    let err = engine
        .request_cancellation(leave_id, EMPLOYEE, Some(d(8, 11)), "x".into(), today)
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation { .. }));

    engine
        .request_cancellation(
            leave_id,
            EMPLOYEE,
            Some(d(8, 14)),
            "returning early".into(),
            today,
        )
        .unwrap();
    let leave = engine.approve(leave_id, HR_ADMIN, None).unwrap();
    assert_eq!(leave.status, LeaveStatus::Approved);
    assert_eq!(leave.end_date, d(8, 14));
    assert_eq!(leave.original_end_date, Some(d(8, 21)));
    assert_eq!(leave.working_days, 5);
    assert_eq!(balance(&store, EMPLOYEE, LeaveType::Earned).used, 5);
}

#[test]
fn rejected_cancellation_reverts_to_approved_untouched() {
    let (store, _notifier, engine) = setup();
    let leave_id = approved_earned_leave(&store, &engine, d(8, 10), d(8, 21), d(8, 3));

    engine
        .request_cancellation(leave_id, EMPLOYEE, Some(d(8, 14)), "maybe".into(), d(8, 12))
        .unwrap();
    let leave = engine
        .reject(leave_id, HR_ADMIN, Some("coverage is thin".into()))
        .unwrap();

    assert_eq!(leave.status, LeaveStatus::Approved);
    assert_eq!(leave.end_date, d(8, 21));
    assert_eq!(leave.proposed_end_date, None);
    assert!(!leave.partial_cancellation);
    assert_eq!(leave.cancellation_reason, None);
    assert_eq!(balance(&store, EMPLOYEE, LeaveType::Earned).used, 10);
    assert_eq!(audit_count(&store, AuditAction::CancellationRejected), 1);
}

/* =========================
Recall
========================= */

#[test]
fn management_recalls_future_dated_leave() {
    let (store, notifier, engine) = setup();
    let leave_id = approved_earned_leave(&store, &engine, d(8, 24), d(8, 28), d(8, 10));

    let leave = engine.recall(leave_id, DEPT_HEAD, d(8, 10)).unwrap();
    assert_eq!(leave.status, LeaveStatus::Recalled);
    assert!(leave.allocation.is_empty());
    assert_eq!(balance(&store, EMPLOYEE, LeaveType::Earned).used, 0);
    assert_eq!(
        notifier.sent().last().map(|i| i.template),
        Some(TemplateKind::Recalled)
    );
}

#[test]
fn recall_needs_management_and_a_future_start() {
    let (store, _notifier, engine) = setup();
    let leave_id = approved_earned_leave(&store, &engine, d(8, 24), d(8, 28), d(8, 10));

    let err = engine.recall(leave_id, HR_HEAD, d(8, 10)).unwrap_err();
    assert!(matches!(err, EngineError::Authorization { .. }));

    // once the leave has started the recall window is gone
    let err = engine.recall(leave_id, DEPT_HEAD, d(8, 24)).unwrap_err();
    assert!(matches!(err, EngineError::Validation { .. }));
    assert_eq!(balance(&store, EMPLOYEE, LeaveType::Earned).used, 5);
}

/* =========================
Overstay and duty return
========================= */

#[test]
fn overstay_flagged_once_and_cleared_by_duty_return() {
    let (store, notifier, engine) = setup();
    let leave_id = submit(
        &engine,
        LeaveType::Medical,
        d(8, 11),
        d(8, 12),
        None,
        d(8, 10),
    )
    .leave
    .id;
    approve_through_long_chain(&engine, leave_id);

    let flagged = engine.detect_overstays(d(8, 20)).unwrap();
    assert_eq!(flagged, vec![leave_id]);
    let status = store.read(|s| s.request(leave_id).map(|r| r.status)).unwrap().unwrap();
    assert_eq!(status, LeaveStatus::OverstayPending);
    assert_eq!(
        notifier.sent().last().map(|i| i.template),
        Some(TemplateKind::OverstayFlagged)
    );

    // the sweep is idempotent
    assert!(engine.detect_overstays(d(8, 20)).unwrap().is_empty());

    // short medical leave needs no fitness certificate
    let leave = engine
        .confirm_duty_return(leave_id, EMPLOYEE, None, d(8, 20))
        .unwrap();
    assert_eq!(leave.status, LeaveStatus::Approved);
    assert!(leave.return_confirmed);
    assert!(engine.detect_overstays(d(8, 20)).unwrap().is_empty());
}

#[test]
fn overstay_needs_a_missed_working_day_not_just_a_past_end_date() {
    let (_store, _notifier, engine) = setup();
    // Thursday and Friday
    let leave_id = submit(
        &engine,
        LeaveType::Medical,
        d(8, 13),
        d(8, 14),
        None,
        d(8, 10),
    )
    .leave
    .id;
    approve_through_long_chain(&engine, leave_id);

    // Saturday after the leave: no duty day missed yet
    assert!(engine.detect_overstays(d(8, 15)).unwrap().is_empty());
    // Monday is the due-back day itself, still confirmable
    assert!(engine.detect_overstays(d(8, 17)).unwrap().is_empty());
    // by Tuesday the Monday duty day has been missed
    assert_eq!(engine.detect_overstays(d(8, 18)).unwrap(), vec![leave_id]);
}

#[test]
fn long_medical_duty_return_requires_fitness_certificate() {
    let (_store, _notifier, engine) = setup();
    let leave_id = submit(
        &engine,
        LeaveType::Medical,
        d(8, 10),
        d(8, 21),
        Some("doc://cert/9"),
        d(8, 10),
    )
    .leave
    .id;
    approve_through_long_chain(&engine, leave_id);

    let err = engine
        .confirm_duty_return(leave_id, EMPLOYEE, None, d(8, 24))
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::PolicyViolation { rule: "FITNESS_CERTIFICATE_REQUIRED", .. }
    ));

    let leave = engine
        .confirm_duty_return(leave_id, EMPLOYEE, Some("doc://fitness/9".into()), d(8, 24))
        .unwrap();
    assert!(leave.return_confirmed);
    assert_eq!(leave.fitness_certificate_url.as_deref(), Some("doc://fitness/9"));
}

/* =========================
Sweeps
========================= */

#[test]
fn monthly_accrual_credits_each_user_once_per_period() {
    let (store, _notifier, engine) = setup();

    assert_eq!(engine.accrue_earned_monthly(YEAR, 8).unwrap(), 5);
    assert_eq!(balance(&store, EMPLOYEE, LeaveType::Earned).closing, 2);

    // a re-run of the same period credits nobody
    assert_eq!(engine.accrue_earned_monthly(YEAR, 8).unwrap(), 0);
    assert_eq!(balance(&store, EMPLOYEE, LeaveType::Earned).closing, 2);

    // the next period credits again
    assert_eq!(engine.accrue_earned_monthly(YEAR, 9).unwrap(), 5);
    assert_eq!(balance(&store, EMPLOYEE, LeaveType::Earned).closing, 4);
}

#[test]
fn accrual_over_the_cap_spills_into_special() {
    let (store, _notifier, engine) = setup();
    seed_balance(&store, EMPLOYEE, LeaveType::Earned, 59, 0, 0);

    engine.accrue_earned_monthly(YEAR, 8).unwrap();

    assert_eq!(balance(&store, EMPLOYEE, LeaveType::Earned).closing, 60);
    assert_eq!(balance(&store, EMPLOYEE, LeaveType::Special).closing, 1);
    assert_eq!(audit_count(&store, AuditAction::BalanceOverflow), 1);
}

#[test]
fn casual_lapse_zeroes_remainder_once() {
    let (store, _notifier, engine) = setup();
    seed_balance(&store, EMPLOYEE, LeaveType::Casual, 0, 10, 4);

    assert_eq!(engine.lapse_casual_year_end(YEAR).unwrap(), 1);
    let casual = balance(&store, EMPLOYEE, LeaveType::Casual);
    assert_eq!(casual.closing, 0);
    assert_eq!(casual.used, 4);

    assert_eq!(engine.lapse_casual_year_end(YEAR).unwrap(), 0);
}

/* =========================
Submission-time policy
========================= */

#[test]
fn backdated_earned_request_is_refused() {
    let (_store, _notifier, engine) = setup();
    let err = engine
        .submit(
            SubmitLeave {
                employee_id: EMPLOYEE,
                leave_type: LeaveType::Earned,
                start_date: d(8, 5),
                end_date: d(8, 7),
                certificate_url: None,
            },
            d(8, 10),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::PolicyViolation { rule: "BACKDATE_LIMIT", .. }
    ));
}

#[test]
fn short_notice_warns_but_submits() {
    let (store, _notifier, engine) = setup();
    seed_balance(&store, EMPLOYEE, LeaveType::Earned, 0, 24, 0);

    let outcome = submit(&engine, LeaveType::Earned, d(8, 12), d(8, 13), None, d(8, 10));
    assert_eq!(outcome.leave.status, LeaveStatus::Submitted);
    assert!(outcome
        .warnings
        .iter()
        .any(|w| w.kind == WarningKind::ShortNotice));
}

#[test]
fn reversed_range_is_a_validation_error() {
    let (_store, _notifier, engine) = setup();
    let err = engine
        .submit(
            SubmitLeave {
                employee_id: EMPLOYEE,
                leave_type: LeaveType::Casual,
                start_date: d(8, 13),
                end_date: d(8, 12),
                certificate_url: None,
            },
            d(8, 10),
        )
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidRange { .. }));
}

#[test]
fn mandatory_holidays_do_not_count_as_working_days() {
    let (store, _notifier, engine) = setup();
    store
        .transaction(|state| {
            state.insert_holiday(Holiday {
                date: d(8, 12),
                name: "independence day".into(),
                mandatory: true,
            });
            Ok(())
        })
        .unwrap();

    let outcome = submit(&engine, LeaveType::Casual, d(8, 12), d(8, 13), None, d(8, 10));
    assert_eq!(outcome.leave.working_days, 1);
}
