//! Integration tests for the room and call-session lifecycle: entry,
//! extension, termination and cancellation.

mod common;

use assert_matches::assert_matches;
use common::{enqueue, paired_room, participant, room_count, secs, t0};
use sqlx::PgPool;
use tandem_core::error::CoreError;
use tandem_core::session::SessionPolicy;
use tandem_db::models::call_session::ExtendOutcome;
use tandem_db::models::queue_entry::{CancelOutcome, Enqueue, EnqueueOutcome};
use tandem_core::liveness::LivenessPolicy;
use tandem_db::models::room::{EndReason, EnterOutcome, TerminateIf, TerminationOutcome};
use tandem_db::models::status::{CallSessionStatus, MatchPhase, RoomStatus};
use tandem_db::repositories::{BlockRepo, CallSessionRepo, ParticipantRepo, QueueRepo, RoomRepo};

// ---------------------------------------------------------------------------
// Enter
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_first_entry_activates_room_and_starts_session(pool: PgPool) {
    let room = paired_room(&pool, 1, 2, t0()).await;
    let policy = SessionPolicy::default();
    let entered_at = t0() + secs(10);

    let outcome = RoomRepo::enter(&pool, room.id, 1, &policy, entered_at).await.unwrap();
    let (active, session, activated) = assert_matches!(
        outcome,
        EnterOutcome::Entered { room, session, activated } => (room, session, activated)
    );
    assert!(activated);
    assert_eq!(active.status_id, RoomStatus::Active.id());
    assert_eq!(active.participant_a_heartbeat_at, Some(entered_at));
    assert_eq!(active.participant_b_heartbeat_at, None);
    assert_eq!(session.started_at, entered_at);
    assert_eq!(session.ends_at, entered_at + secs(300));
    assert_eq!(session.max_minutes_cap, 30);

    // The partner joining later does not restart the session.
    let outcome = RoomRepo::enter(&pool, room.id, 2, &policy, entered_at + secs(5))
        .await
        .unwrap();
    let (session, activated) = assert_matches!(
        outcome,
        EnterOutcome::Entered { session, activated, .. } => (session, activated)
    );
    assert!(!activated);
    assert_eq!(session.started_at, entered_at);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_enter_rejects_outsiders_and_missing_rooms(pool: PgPool) {
    let room = paired_room(&pool, 1, 2, t0()).await;
    let policy = SessionPolicy::default();

    let outcome = RoomRepo::enter(&pool, room.id, 3, &policy, t0()).await.unwrap();
    assert_matches!(outcome, EnterOutcome::NotMember);

    let outcome = RoomRepo::enter(&pool, room.id + 100, 1, &policy, t0()).await.unwrap();
    assert_matches!(outcome, EnterOutcome::NotFound);
}

// ---------------------------------------------------------------------------
// Extend
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_extension_near_deadline(pool: PgPool) {
    let room = paired_room(&pool, 1, 2, t0()).await;
    let policy = SessionPolicy::default();
    RoomRepo::enter(&pool, room.id, 1, &policy, t0()).await.unwrap();

    // Session ends at T; extend by 60s at T - 30s.
    let deadline = t0() + secs(300);
    let outcome = CallSessionRepo::extend(&pool, room.id, 2, 60, &policy, deadline - secs(30))
        .await
        .unwrap();
    let (session, extension) = assert_matches!(
        outcome,
        ExtendOutcome::Extended { session, extension } => (session, extension)
    );
    assert_eq!(session.ends_at, deadline + secs(60));
    assert_eq!(extension.actor_id, 2);
    assert_eq!(extension.seconds_added, 60);
    assert_eq!(extension.ends_at_after, deadline + secs(60));

    let history = CallSessionRepo::list_extensions(&pool, room.id).await.unwrap();
    assert_eq!(history.len(), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_extension_policy_violations(pool: PgPool) {
    let room = paired_room(&pool, 1, 2, t0()).await;
    let policy = SessionPolicy::default();
    RoomRepo::enter(&pool, room.id, 1, &policy, t0()).await.unwrap();

    let outcome = CallSessionRepo::extend(&pool, room.id, 1, 45, &policy, t0())
        .await
        .unwrap();
    assert_matches!(outcome, ExtendOutcome::Rejected(CoreError::PolicyViolation(_)));

    // 5 + 5 * 5 = 30 minutes exactly; one more step crosses the cap.
    for _ in 0..5 {
        let outcome = CallSessionRepo::extend(&pool, room.id, 1, 300, &policy, t0())
            .await
            .unwrap();
        assert_matches!(outcome, ExtendOutcome::Extended { .. });
    }
    let outcome = CallSessionRepo::extend(&pool, room.id, 1, 60, &policy, t0())
        .await
        .unwrap();
    assert_matches!(outcome, ExtendOutcome::Rejected(CoreError::PolicyViolation(_)));

    let session = CallSessionRepo::find(&pool, room.id).await.unwrap().unwrap();
    assert_eq!(session.ends_at, t0() + chrono::Duration::minutes(30));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_extension_requires_active_membership(pool: PgPool) {
    let room = paired_room(&pool, 1, 2, t0()).await;
    let policy = SessionPolicy::default();

    let outcome = CallSessionRepo::extend(&pool, room.id, 1, 60, &policy, t0()).await.unwrap();
    assert_matches!(outcome, ExtendOutcome::NotActive);

    RoomRepo::enter(&pool, room.id, 1, &policy, t0()).await.unwrap();
    let outcome = CallSessionRepo::extend(&pool, room.id, 3, 60, &policy, t0()).await.unwrap();
    assert_matches!(outcome, ExtendOutcome::NotMember);

    let outcome = CallSessionRepo::extend(&pool, room.id + 100, 1, 60, &policy, t0())
        .await
        .unwrap();
    assert_matches!(outcome, ExtendOutcome::RoomNotFound);
}

// ---------------------------------------------------------------------------
// Terminate
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_end_is_idempotent(pool: PgPool) {
    let room = paired_room(&pool, 1, 2, t0()).await;
    let policy = SessionPolicy::default();
    RoomRepo::enter(&pool, room.id, 1, &policy, t0()).await.unwrap();
    let ended_at = t0() + secs(60);

    let first = RoomRepo::terminate(&pool, room.id, EndReason::Ended, TerminateIf::Member(1), ended_at)
        .await
        .unwrap();
    assert_matches!(first, TerminationOutcome::Terminated { session_ended: true, .. });

    let second = RoomRepo::terminate(&pool, room.id, EndReason::Ended, TerminateIf::Member(2), ended_at)
        .await
        .unwrap();
    assert_matches!(second, TerminationOutcome::AlreadyGone { session_ended: false });

    assert_eq!(room_count(&pool).await, 0);
    for id in [1, 2] {
        let p = participant(&pool, id).await;
        assert!(p.is_idle());
    }

    let session = CallSessionRepo::find(&pool, room.id).await.unwrap().unwrap();
    assert_eq!(session.status_id, CallSessionStatus::Ended.id());
    assert_eq!(session.ended_at, Some(ended_at));
    assert_eq!(session.end_reason.as_deref(), Some("ended"));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_concurrent_end_requests_converge(pool: PgPool) {
    let room = paired_room(&pool, 1, 2, t0()).await;
    RoomRepo::enter(&pool, room.id, 1, &SessionPolicy::default(), t0())
        .await
        .unwrap();

    let (a, b) = tokio::join!(
        RoomRepo::terminate(&pool, room.id, EndReason::Ended, TerminateIf::Member(1), t0() + secs(1)),
        RoomRepo::terminate(&pool, room.id, EndReason::Ended, TerminateIf::Member(2), t0() + secs(1)),
    );
    let terminated = [a.unwrap(), b.unwrap()]
        .iter()
        .filter(|o| o.terminated_room().is_some())
        .count();
    assert_eq!(terminated, 1);

    assert_eq!(room_count(&pool).await, 0);
    assert!(participant(&pool, 1).await.is_idle());
    assert!(participant(&pool, 2).await.is_idle());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_late_cleanup_keeps_newer_placement(pool: PgPool) {
    let room = paired_room(&pool, 1, 2, t0()).await;

    // Participant 1 already points elsewhere.
    sqlx::query("UPDATE participants SET active_room_id = $1 WHERE id = 1")
        .bind(room.id + 1000)
        .execute(&pool)
        .await
        .unwrap();

    RoomRepo::terminate(&pool, room.id, EndReason::Abandoned, TerminateIf::Always, t0())
        .await
        .unwrap();

    assert_eq!(participant(&pool, 1).await.active_room_id, Some(room.id + 1000));
    assert!(participant(&pool, 2).await.is_idle());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_expiry_decided_before_extension_is_declined(pool: PgPool) {
    let room = paired_room(&pool, 1, 2, t0()).await;
    let policy = SessionPolicy::default();
    RoomRepo::enter(&pool, room.id, 1, &policy, t0()).await.unwrap();
    let now = t0() + secs(301);

    // The sweep lists the session as due...
    let due = CallSessionRepo::list_expired(&pool, now).await.unwrap();
    assert_eq!(due.len(), 1);

    // ...a member extends before the teardown runs.
    let outcome = CallSessionRepo::extend(&pool, room.id, 2, 300, &policy, now).await.unwrap();
    assert_matches!(outcome, ExtendOutcome::Extended { .. });

    let outcome = RoomRepo::terminate(&pool, room.id, EndReason::Expired, TerminateIf::SessionDue, now)
        .await
        .unwrap();
    assert_matches!(outcome, TerminationOutcome::Declined);

    assert_eq!(room_count(&pool).await, 1);
    let session = CallSessionRepo::find(&pool, room.id).await.unwrap().unwrap();
    assert_eq!(session.status_id, CallSessionStatus::Active.id());
    assert_eq!(session.ends_at, now + secs(300));
    assert_eq!(participant(&pool, 1).await.active_room_id, Some(room.id));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_abandonment_decided_before_entry_is_declined(pool: PgPool) {
    let liveness = LivenessPolicy::default();
    let room = paired_room(&pool, 1, 2, t0()).await;
    let now = room.created_at + secs(liveness.pending_timeout_secs + 1);

    let snapshot = RoomRepo::find_by_id(&pool, room.id).await.unwrap().unwrap();
    assert!(snapshot.is_abandoned(now, &liveness));

    RoomRepo::enter(&pool, room.id, 1, &SessionPolicy::default(), now)
        .await
        .unwrap();

    let outcome = RoomRepo::terminate(
        &pool,
        room.id,
        EndReason::Abandoned,
        TerminateIf::Abandoned(liveness),
        now,
    )
    .await
    .unwrap();
    assert_matches!(outcome, TerminationOutcome::Declined);

    let kept = RoomRepo::find_by_id(&pool, room.id).await.unwrap().unwrap();
    assert_eq!(kept.status_id, RoomStatus::Active.id());
    let session = CallSessionRepo::find(&pool, room.id).await.unwrap().unwrap();
    assert_eq!(session.status_id, CallSessionStatus::Active.id());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_member_end_requires_membership(pool: PgPool) {
    let room = paired_room(&pool, 1, 2, t0()).await;

    let outcome = RoomRepo::terminate(&pool, room.id, EndReason::Ended, TerminateIf::Member(3), t0())
        .await
        .unwrap();
    assert_matches!(outcome, TerminationOutcome::Declined);
    assert_eq!(room_count(&pool).await, 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_member_end_leaves_orphaned_session_alone(pool: PgPool) {
    let room = paired_room(&pool, 1, 2, t0()).await;
    RoomRepo::enter(&pool, room.id, 1, &SessionPolicy::default(), t0())
        .await
        .unwrap();
    sqlx::query("DELETE FROM rooms WHERE id = $1")
        .bind(room.id)
        .execute(&pool)
        .await
        .unwrap();

    let outcome = RoomRepo::terminate(&pool, room.id, EndReason::Ended, TerminateIf::Member(99), t0())
        .await
        .unwrap();
    assert_matches!(outcome, TerminationOutcome::AlreadyGone { session_ended: false });

    let session = CallSessionRepo::find(&pool, room.id).await.unwrap().unwrap();
    assert_eq!(session.status_id, CallSessionStatus::Active.id());
    assert_eq!(session.end_reason, None);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_heal_dangling_pointers(pool: PgPool) {
    ParticipantRepo::ensure(&pool, 1).await.unwrap();
    sqlx::query("UPDATE participants SET active_room_id = 4242, match_phase_id = $1 WHERE id = 1")
        .bind(MatchPhase::Matched.id())
        .execute(&pool)
        .await
        .unwrap();

    let healed = ParticipantRepo::heal_dangling_pointers(&pool).await.unwrap();
    assert_eq!(healed, vec![1]);
    assert!(participant(&pool, 1).await.is_idle());
}

// ---------------------------------------------------------------------------
// Cancel
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_cancel_while_waiting_twice(pool: PgPool) {
    enqueue(&pool, 1, "m", "any", &[], t0()).await;

    let first = QueueRepo::cancel(&pool, 1, t0()).await.unwrap();
    assert_eq!(
        first,
        CancelOutcome {
            dequeued: true,
            terminated_room_id: None,
            partner_id: None,
        }
    );

    let second = QueueRepo::cancel(&pool, 1, t0()).await.unwrap();
    assert_eq!(second, CancelOutcome::default());
    assert!(QueueRepo::find(&pool, 1).await.unwrap().is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_cancel_while_placed_releases_both(pool: PgPool) {
    let room = paired_room(&pool, 1, 2, t0()).await;

    let outcome = QueueRepo::cancel(&pool, 2, t0() + secs(3)).await.unwrap();
    assert_eq!(outcome.terminated_room_id, Some(room.id));
    assert_eq!(outcome.partner_id, Some(1));
    assert!(!outcome.dequeued);

    assert_eq!(room_count(&pool).await, 0);
    assert!(participant(&pool, 1).await.is_idle());
    assert!(participant(&pool, 2).await.is_idle());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_refresh_waits_behind_pairing_lock_order(pool: PgPool) {
    enqueue(&pool, 1, "m", "any", &[], t0()).await;

    // Queue row first, participant second, as the pairing transaction does.
    let mut tx = pool.begin().await.unwrap();
    sqlx::query("SELECT participant_id FROM queue_entries WHERE participant_id = 1 FOR UPDATE")
        .execute(&mut *tx)
        .await
        .unwrap();

    let refresh = tokio::spawn({
        let pool = pool.clone();
        async move {
            let input = Enqueue {
                gender: "m".to_string(),
                want_gender: "f".to_string(),
                exclusions: vec![],
            };
            QueueRepo::enqueue(&pool, 1, &input, t0() + secs(5)).await
        }
    });
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    sqlx::query("SELECT id FROM participants WHERE id = 1 FOR UPDATE")
        .execute(&mut *tx)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let outcome = refresh.await.unwrap().unwrap();
    let entry = assert_matches!(outcome, EnqueueOutcome::Queued(entry) => entry);
    assert_eq!(entry.want_gender.as_deref(), Some("f"));
    assert_eq!(entry.last_heartbeat_at, t0() + secs(5));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_cancel_for_unknown_participant_is_noop(pool: PgPool) {
    let outcome = QueueRepo::cancel(&pool, 77, t0()).await.unwrap();
    assert_eq!(outcome, CancelOutcome::default());
}

// ---------------------------------------------------------------------------
// Blocks
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_block_reactivation_and_listing(pool: PgPool) {
    ParticipantRepo::ensure(&pool, 1).await.unwrap();
    ParticipantRepo::ensure(&pool, 2).await.unwrap();

    let block = BlockRepo::create(&pool, 1, 2, t0()).await.unwrap();
    assert!(block.is_active);
    assert!(BlockRepo::revoke(&pool, 1, 2, t0() + secs(1)).await.unwrap());
    assert!(!BlockRepo::revoke(&pool, 1, 2, t0() + secs(2)).await.unwrap());
    assert!(BlockRepo::list_by_blocker(&pool, 1).await.unwrap().is_empty());

    let again = BlockRepo::create(&pool, 1, 2, t0() + secs(3)).await.unwrap();
    assert_eq!(again.id, block.id);
    assert!(again.is_active);
    assert_eq!(again.revoked_at, None);

    let listed = BlockRepo::list_by_blocker(&pool, 1).await.unwrap();
    assert_eq!(listed.len(), 1);
}
