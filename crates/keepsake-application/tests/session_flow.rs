mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{Gate, Harness, MockChatApi, answer_until_file_step, photo, questions, wait_for_state};
use keepsake_application::{AuthReaction, SessionConfig, StartOutcome, SubmitOutcome, TurnOutcome};
use keepsake_core::chat::{ChatState, InputKind, KeyValueStore, PROGRESS_STORAGE_KEY, notice};
use keepsake_core::error::KeepsakeError;

#[tokio::test]
async fn test_happy_path_submits_once_and_completes() {
    let harness = Harness::new(MockChatApi::new(questions()));
    harness.auth.login("token-1");
    let session = harness.session();

    assert_eq!(session.start().await, StartOutcome::Fresh);
    assert_eq!(session.view().await.input_kind, Some(InputKind::Name));

    answer_until_file_step(&session).await;
    assert_eq!(session.view().await.input_kind, Some(InputKind::File));
    assert!(session.select_file(Some(photo())).await);
    assert!(harness.has_stored_file());

    let outcome = session.confirm_file().await;
    assert_eq!(outcome, TurnOutcome::Submitted(SubmitOutcome::Completed));

    let submissions = harness.api.submissions();
    assert_eq!(submissions.len(), 1);
    let (token, payload) = &submissions[0];
    assert_eq!(token, "token-1");
    assert_eq!(payload.name, "홍길동");
    assert_eq!(payload.birth_start, "1990-01-01");
    assert_eq!(payload.prompts, "좋은 기억입니다");
    assert_eq!(payload.profile, photo());
    assert!(payload.idempotency_key.is_some());

    assert_eq!(session.state().await, ChatState::Complete);
    let transcript = session.transcript().await;
    assert_eq!(transcript.last().unwrap().text, notice::SUBMIT_COMPLETE);

    let stored = harness.stored_progress().unwrap();
    assert!(stored.is_complete);
    assert!(!stored.submit_pending);
    assert!(stored.file_meta.is_none());
    assert!(!harness.has_stored_file());

    // Inert after completion.
    assert_eq!(session.send_answer("more").await, TurnOutcome::Ignored);
    assert_eq!(session.submit().await, SubmitOutcome::Ignored);
    assert_eq!(harness.api.submit_calls(), 1);
}

#[tokio::test]
async fn test_failed_question_fetch_blocks_conversation() {
    let harness = Harness::new(MockChatApi::failing_questions(KeepsakeError::api("fail")));
    let session = harness.session();

    assert_eq!(session.start().await, StartOutcome::Blocked);
    assert!(session.transcript().await.is_empty());

    let view = session.view().await;
    assert!(view.is_blocked);
    assert!(view.disabled);
    assert_eq!(view.current_prompt, None);

    assert_eq!(session.send_answer("홍길동").await, TurnOutcome::Ignored);
    assert!(harness.kv.is_empty());
}

#[tokio::test]
async fn test_auth_deferral_survives_reload_and_resumes_once() {
    let harness = Harness::new(MockChatApi::new(questions()));

    {
        let session = harness.session();
        session.start().await;
        answer_until_file_step(&session).await;
        session.select_file(Some(photo())).await;

        let outcome = session.confirm_file().await;
        assert_eq!(outcome, TurnOutcome::Submitted(SubmitOutcome::Deferred));
        assert_eq!(session.state().await, ChatState::AwaitingAuth);
        assert_eq!(
            session.transcript().await.last().unwrap().text,
            notice::LOGIN_REQUIRED
        );
        assert!(harness.stored_progress().unwrap().submit_pending);
    }

    let reloaded = harness.session();
    assert_eq!(reloaded.start().await, StartOutcome::Restored);
    assert_eq!(reloaded.state().await, ChatState::AwaitingAuth);
    assert_eq!(reloaded.pending_file_name().await.as_deref(), Some("memorial.jpg"));
    assert_eq!(harness.api.submit_calls(), 0);

    harness.auth.login("token-1");
    let reaction = reloaded.on_auth_changed().await;
    assert_eq!(reaction, AuthReaction::Resumed(SubmitOutcome::Completed));

    // A second trigger for the same change does nothing.
    assert_eq!(reloaded.on_auth_changed().await, AuthReaction::Ignored);
    assert_eq!(harness.api.submit_calls(), 1);
    assert_eq!(harness.api.memorial_calls(), 1);
    assert_eq!(reloaded.state().await, ChatState::Complete);
}

#[tokio::test]
async fn test_overlapping_triggers_submit_exactly_once() {
    let gate = Arc::new(Gate::default());
    let harness = Harness::new(MockChatApi::new(questions()).with_gate(gate.clone()));
    harness.auth.login("token-1");
    let session = Arc::new(harness.session());

    session.start().await;
    answer_until_file_step(&session).await;
    session.select_file(Some(photo())).await;

    let first = tokio::spawn({
        let session = session.clone();
        async move { session.confirm_file().await }
    });
    gate.wait_entered().await;

    assert!(session.view().await.is_submitting);
    assert_eq!(session.submit().await, SubmitOutcome::Ignored);
    assert_eq!(session.on_auth_changed().await, AuthReaction::Ignored);
    assert_eq!(session.confirm_file().await, TurnOutcome::Ignored);

    gate.release();
    assert_eq!(
        first.await.unwrap(),
        TurnOutcome::Submitted(SubmitOutcome::Completed)
    );
    assert_eq!(harness.api.submit_calls(), 1);
}

#[tokio::test]
async fn test_rejected_credential_waits_for_a_new_one() {
    let harness = Harness::new(MockChatApi::new(questions()));
    harness.api.push_submit_result(Err(KeepsakeError::http(401, "expired")));
    harness.auth.login("stale");
    let session = harness.session();

    session.start().await;
    answer_until_file_step(&session).await;
    session.select_file(Some(photo())).await;

    assert_eq!(
        session.confirm_file().await,
        TurnOutcome::Submitted(SubmitOutcome::AuthRejected)
    );
    assert_eq!(session.state().await, ChatState::AwaitingAuth);
    assert!(session.view().await.awaiting_auth);
    assert!(harness.stored_progress().unwrap().submit_pending);

    // Same credential again: no retry storm.
    harness.auth.login("stale");
    assert_eq!(session.on_auth_changed().await, AuthReaction::Ignored);
    assert_eq!(harness.api.submit_calls(), 1);

    harness.auth.login("fresh");
    assert_eq!(
        session.on_auth_changed().await,
        AuthReaction::Resumed(SubmitOutcome::Completed)
    );

    let submissions = harness.api.submissions();
    assert_eq!(submissions.len(), 2);
    assert_eq!(submissions[1].0, "fresh");
    assert_eq!(
        submissions[0].1.idempotency_key,
        submissions[1].1.idempotency_key
    );
}

#[tokio::test]
async fn test_sign_out_and_back_in_retries_same_credential() {
    let harness = Harness::new(MockChatApi::new(questions()));
    harness.api.push_submit_result(Err(KeepsakeError::http(401, "expired")));
    harness.auth.login("token-1");
    let session = harness.session();

    session.start().await;
    answer_until_file_step(&session).await;
    session.select_file(Some(photo())).await;
    assert_eq!(
        session.confirm_file().await,
        TurnOutcome::Submitted(SubmitOutcome::AuthRejected)
    );

    harness.auth.logout();
    assert_eq!(session.on_auth_changed().await, AuthReaction::Ignored);
    assert_eq!(session.state().await, ChatState::AwaitingAuth);

    harness.auth.login("token-1");
    assert_eq!(
        session.on_auth_changed().await,
        AuthReaction::Resumed(SubmitOutcome::Completed)
    );
    assert_eq!(harness.api.submit_calls(), 2);
    assert_eq!(session.state().await, ChatState::Complete);
}

#[tokio::test]
async fn test_server_error_allows_manual_retry() {
    let harness = Harness::new(MockChatApi::new(questions()));
    harness
        .api
        .push_submit_result(Err(KeepsakeError::http(500, "database down")));
    harness.auth.login("token-1");
    let session = harness.session();

    session.start().await;
    answer_until_file_step(&session).await;
    session.select_file(Some(photo())).await;

    let outcome = session.confirm_file().await;
    assert_eq!(
        outcome,
        TurnOutcome::Submitted(SubmitOutcome::Failed(KeepsakeError::http(
            500,
            "database down"
        )))
    );
    assert_eq!(session.state().await, ChatState::Active { step: 3 });
    assert_eq!(
        session.transcript().await.last().unwrap().text,
        notice::submit_failed("500 database down")
    );
    assert!(harness.has_stored_file());

    assert_eq!(session.submit().await, SubmitOutcome::Completed);
    assert_eq!(harness.api.submit_calls(), 2);
}

#[tokio::test]
async fn test_existing_memorial_discards_progress() {
    let harness = Harness::new(MockChatApi::new(questions()).with_memorial(Ok(true)));
    {
        let session = harness.session();
        session.start().await;
        answer_until_file_step(&session).await;
        session.select_file(Some(photo())).await;
    }
    assert!(harness.stored_progress().is_some());
    assert!(harness.has_stored_file());

    harness.auth.login("token-1");
    let session = harness.session();
    assert_eq!(session.start().await, StartOutcome::AlreadyRegistered);

    assert!(harness.kv.get(PROGRESS_STORAGE_KEY).unwrap().is_none());
    assert!(!harness.has_stored_file());
    assert!(session.is_already_registered().await);
    assert!(session.view().await.disabled);
    assert_eq!(session.send_answer("홍길동").await, TurnOutcome::Ignored);
}

#[tokio::test]
async fn test_memorial_check_failure_is_ignored() {
    let harness = Harness::new(
        MockChatApi::new(questions()).with_memorial(Err(KeepsakeError::network("offline"))),
    );
    harness.auth.login("token-1");
    let session = harness.session();

    assert_eq!(session.start().await, StartOutcome::Fresh);
    assert_eq!(harness.api.memorial_calls(), 1);
    assert!(!session.view().await.disabled);
}

#[tokio::test]
async fn test_memorial_check_runs_on_first_sign_in() {
    let harness = Harness::new(MockChatApi::new(questions()).with_memorial(Ok(true)));
    let session = harness.session();
    assert_eq!(session.start().await, StartOutcome::Fresh);
    session.send_answer("홍길동").await;

    harness.auth.login("token-1");
    assert_eq!(session.on_auth_changed().await, AuthReaction::AlreadyRegistered);
    assert!(harness.stored_progress().is_none());

    // The check is not repeated.
    assert_eq!(session.on_auth_changed().await, AuthReaction::AlreadyRegistered);
    assert_eq!(harness.api.memorial_calls(), 1);
}

#[tokio::test]
async fn test_missing_file_without_network_call() {
    let harness = Harness::new(MockChatApi::new(vec!["이름?".into()]));
    harness.auth.login("token-1");
    let session = harness.session();
    session.start().await;

    let outcome = session.send_answer("홍길동").await;
    assert_eq!(outcome, TurnOutcome::Submitted(SubmitOutcome::MissingFile));
    assert_eq!(
        session.transcript().await.last().unwrap().text,
        notice::FILE_MISSING
    );
    assert_eq!(session.state().await, ChatState::Active { step: 0 });
    assert_eq!(harness.api.submit_calls(), 0);
}

#[tokio::test]
async fn test_restore_with_lost_attachment_reopens_file_step() {
    let harness = Harness::new(MockChatApi::new(questions()));
    {
        let session = harness.session();
        session.start().await;
        answer_until_file_step(&session).await;
        session.select_file(Some(photo())).await;
        session.confirm_file().await;
    }
    harness.blobs.set_fail(true);

    let session = harness.session();
    assert_eq!(session.start().await, StartOutcome::Restored);
    assert_eq!(session.state().await, ChatState::Active { step: 3 });

    let view = session.view().await;
    assert!(!view.has_file);
    assert_eq!(view.input_kind, Some(InputKind::File));
    assert_eq!(
        session.transcript().await.last().unwrap().text,
        notice::FILE_MISSING
    );
    assert!(!harness.stored_progress().unwrap().submit_pending);
}

#[tokio::test]
async fn test_restore_is_idempotent() {
    let harness = Harness::new(MockChatApi::new(questions()));
    {
        let session = harness.session();
        session.start().await;
        session.send_answer("홍길동").await;
    }

    let first = harness.session();
    first.start().await;
    let second = harness.session();
    second.start().await;

    let a = first.transcript().await;
    let b = second.transcript().await;
    assert_eq!(a, b);
    assert_eq!(a.len(), 3);
    assert_eq!(first.view().await, second.view().await);
}

#[tokio::test]
async fn test_storage_failure_keeps_session_running() {
    let harness = Harness::new(MockChatApi::new(questions()));
    harness.kv.set_fail_writes(true);
    harness.blobs.set_fail(true);
    harness.auth.login("token-1");
    let session = harness.session();

    session.start().await;
    answer_until_file_step(&session).await;
    assert!(session.select_file(Some(photo())).await);
    assert_eq!(
        session.confirm_file().await,
        TurnOutcome::Submitted(SubmitOutcome::Completed)
    );
    assert!(harness.stored_progress().is_none());
}

#[tokio::test]
async fn test_shutdown_discards_in_flight_result() {
    let gate = Arc::new(Gate::default());
    let harness = Harness::new(MockChatApi::new(questions()).with_gate(gate.clone()));
    harness.auth.login("token-1");
    let session = Arc::new(harness.session());

    session.start().await;
    answer_until_file_step(&session).await;
    session.select_file(Some(photo())).await;

    let pending = tokio::spawn({
        let session = session.clone();
        async move { session.confirm_file().await }
    });
    gate.wait_entered().await;

    session.shutdown();
    gate.release();
    assert_eq!(
        pending.await.unwrap(),
        TurnOutcome::Submitted(SubmitOutcome::Cancelled)
    );

    let stored = harness.stored_progress().unwrap();
    assert!(!stored.is_complete);
    assert!(harness.has_stored_file());
    assert_eq!(session.send_answer("x").await, TurnOutcome::Ignored);
}

#[tokio::test]
async fn test_watcher_resumes_on_sign_in() {
    let harness = Harness::new(MockChatApi::new(questions()));
    let session = Arc::new(harness.session());
    let watcher = session.watch_auth();

    session.start().await;
    answer_until_file_step(&session).await;
    session.select_file(Some(photo())).await;
    session.confirm_file().await;
    assert_eq!(session.state().await, ChatState::AwaitingAuth);

    harness.auth.login("token-1");
    assert!(wait_for_state(&session, ChatState::Complete).await);
    assert_eq!(harness.api.submit_calls(), 1);

    session.shutdown();
    watcher.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_typing_delay_follows_the_persisted_transition() {
    let harness = Harness::new(MockChatApi::new(questions()));
    let session = harness.session_with(SessionConfig {
        typing_delay: Duration::from_millis(800),
    });
    session.start().await;

    let before = tokio::time::Instant::now();
    assert_eq!(
        session.send_answer("홍길동").await,
        TurnOutcome::Advanced { step: 1 }
    );
    assert!(before.elapsed() >= Duration::from_millis(800));
    assert_eq!(harness.stored_progress().unwrap().current_step_index, 1);
}
