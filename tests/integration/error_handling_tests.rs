// Error mapping at the command boundary

mod support;

use chrono::NaiveDate;
use serde_json::json;

use goal_coach_lib::commands::goal::{goal_analyze, goal_complete, goal_submit};
use goal_coach_lib::commands::quiz::quiz_submit;
use goal_coach_lib::commands::settings::{ai_cache_clear, settings_get, settings_update};
use goal_coach_lib::commands::student::{student_ensure, student_get};
use goal_coach_lib::commands::CommandError;
use goal_coach_lib::error::{AiErrorCode, AppError};
use goal_coach_lib::models::quiz::{Quiz, QuizSubmission};
use goal_coach_lib::models::session::SessionContext;
use goal_coach_lib::models::settings::CoachSettingsUpdate;
use goal_coach_lib::models::smart::SmartScore;

use support::{harness, register};

#[test]
fn ai_errors_keep_code_and_correlation_id() {
    let error = AppError::ai_with_details(
        AiErrorCode::RateLimited,
        "analyzer rate limit reached, try again later",
        Some("corr-42"),
        Some(json!({ "status": 429 })),
    );
    let command: CommandError = error.into();

    assert_eq!(command.code, "RATE_LIMITED");
    assert_eq!(command.message, "analyzer rate limit reached, try again later");
    let details = command.details.expect("details");
    assert_eq!(details["correlationId"], "corr-42");
    assert_eq!(details["status"], 429);
}

#[test]
fn gate_errors_carry_structured_details() {
    let command: CommandError = AppError::reflection_invalid(
        "Too generic.",
        vec!["Name one concrete obstacle.".to_string()],
    )
    .into();
    assert_eq!(command.code, "REFLECTION_INVALID");
    assert_eq!(command.message, "Too generic.");
    assert_eq!(
        command.details.expect("details")["suggestions"][0],
        "Name one concrete obstacle."
    );

    let command: CommandError = AppError::student_not_found("ghost").into();
    assert_eq!(command.code, "STUDENT_NOT_FOUND");
    assert_eq!(command.details.expect("details")["studentId"], "ghost");

    let command: CommandError = AppError::conflict("progress update kept losing").into();
    assert_eq!(command.code, "CONFLICT");
}

#[test]
fn internal_failures_surface_as_unknown() {
    let command: CommandError = AppError::database("disk I/O error").into();
    assert_eq!(command.code, "UNKNOWN");
    assert!(command.details.is_none());

    let command: CommandError = AppError::other("worker vanished").into();
    assert_eq!(command.code, "UNKNOWN");
    assert_eq!(command.message, "worker vanished");
}

#[tokio::test]
async fn empty_goal_text_is_a_validation_error() {
    let h = harness();
    register(&h.state, "stu-1", "Ada");

    let err = goal_analyze(
        &h.state,
        &SessionContext::student("stu-1"),
        "stu-1".to_string(),
        "   ".to_string(),
    )
    .await
    .expect_err("blank goal");
    assert_eq!(err.code, "VALIDATION_ERROR");
}

#[tokio::test]
async fn unknown_students_are_reported_by_id() {
    let h = harness();

    let err = student_get(&h.state, &SessionContext::admin("admin"), "ghost".to_string())
        .await
        .expect_err("no such student");
    assert_eq!(err.code, "STUDENT_NOT_FOUND");
    assert_eq!(err.details.expect("details")["studentId"], "ghost");
}

#[tokio::test]
async fn student_ensure_is_idempotent() {
    let h = harness();
    let session = SessionContext::student("stu-1");

    let first = student_ensure(&h.state, &session, Some("Ada".to_string()), None)
        .await
        .expect("created");
    let second = student_ensure(&h.state, &session, Some("Someone Else".to_string()), None)
        .await
        .expect("loaded");
    assert_eq!(first.name, "Ada");
    assert_eq!(second.name, "Ada");
}

#[tokio::test]
async fn completing_a_missing_entry_is_not_found() {
    let h = harness();
    register(&h.state, "stu-1", "Ada");

    let err = goal_complete(
        &h.state,
        &SessionContext::student("stu-1"),
        "stu-1".to_string(),
        NaiveDate::from_ymd_opt(2024, 1, 1).expect("date"),
        true,
    )
    .await
    .expect_err("no entry on that day");
    assert_eq!(err.code, "NOT_FOUND");
}

#[tokio::test]
async fn quiz_without_questions_is_rejected() {
    let h = harness();
    register(&h.state, "stu-1", "Ada");
    h.analyzer.score_goal("Sketch for 30 minutes", SmartScore::uniform(4));
    goal_submit(
        &h.state,
        &SessionContext::student("stu-1"),
        "stu-1".to_string(),
        "Sketch for 30 minutes".to_string(),
    )
    .await
    .expect("goal stored");

    let submission = QuizSubmission {
        quiz: Quiz {
            title: "Empty".to_string(),
            description: String::new(),
            questions: Vec::new(),
        },
        answers: Vec::new(),
    };
    let err = quiz_submit(
        &h.state,
        &SessionContext::student("stu-1"),
        "stu-1".to_string(),
        submission,
    )
    .await
    .expect_err("empty quiz");
    assert_eq!(err.code, "VALIDATION_ERROR");
}

#[tokio::test]
async fn settings_changes_are_admin_only_and_validated() {
    let h = harness();

    let err = settings_update(
        &h.state,
        &SessionContext::student("stu-1"),
        CoachSettingsUpdate {
            reflection_min_words: Some(60),
            ..Default::default()
        },
    )
    .await
    .expect_err("students cannot change settings");
    assert_eq!(err.code, "FORBIDDEN");

    let err = settings_update(
        &h.state,
        &SessionContext::admin("admin"),
        CoachSettingsUpdate {
            timezone: Some("Mars/Olympus".to_string()),
            ..Default::default()
        },
    )
    .await
    .expect_err("unknown timezone");
    assert_eq!(err.code, "VALIDATION_ERROR");

    let err = settings_update(
        &h.state,
        &SessionContext::admin("admin"),
        CoachSettingsUpdate {
            reflection_min_words: Some(20),
            ..Default::default()
        },
    )
    .await
    .expect_err("word floor cannot drop below 50");
    assert_eq!(err.code, "VALIDATION_ERROR");

    let updated = settings_update(
        &h.state,
        &SessionContext::admin("admin"),
        CoachSettingsUpdate {
            reflection_min_words: Some(60),
            ..Default::default()
        },
    )
    .await
    .expect("admin update");
    assert_eq!(updated.reflection_min_words, 60);
    assert_eq!(
        settings_get(&h.state).await.expect("settings").reflection_min_words,
        60
    );

    let err = ai_cache_clear(&h.state, &SessionContext::student("stu-1"))
        .await
        .expect_err("students cannot clear the cache");
    assert_eq!(err.code, "FORBIDDEN");
}
