mod support;

use std::sync::atomic::Ordering;

use chrono::NaiveDate;
use futures::future::join_all;

use goal_coach_lib::commands::goal::goal_submit;
use goal_coach_lib::commands::student::student_get;
use goal_coach_lib::error::AppError;
use goal_coach_lib::models::ai_types::AiResponseSource;
use goal_coach_lib::models::session::SessionContext;
use goal_coach_lib::models::settings::{CoachSettingsUpdate, ProgressUpdatePolicy};
use goal_coach_lib::models::smart::SmartScore;

use support::{harness, march, register};

const STUDENT: &str = "stu-1";

#[tokio::test]
async fn goal_at_threshold_is_accepted_and_starts_progress() {
    let h = harness();
    register(&h.state, STUDENT, "Ada");
    h.analyzer.score_goal("Read 20 pages tonight", SmartScore::uniform(2));
    let session = SessionContext::student(STUDENT);
    let coaching = h.state.coaching();

    let outcome = coaching
        .analyze_goal(&session, STUDENT, "Read 20 pages tonight", march(1))
        .await
        .expect("analysis");
    assert_eq!(outcome.analysis.percentage, 40);
    assert_eq!(outcome.analysis.source, AiResponseSource::Online);
    assert!(outcome.decision.accepted);
    let progress = outcome.progress.expect("progress created").progress;
    assert_eq!(progress.goals_analyzed, 1);
    assert_eq!(progress.average_smart_score, 40);
    assert_eq!(progress.current_smart_threshold, 40);

    let submitted = coaching
        .submit_goal(&session, STUDENT, "Read 20 pages tonight", march(1))
        .await
        .expect("submission");
    assert_eq!(submitted.analysis.source, AiResponseSource::Cache);
    assert_eq!(submitted.entry.goal.smart_percentage, Some(40));
    assert!(!submitted.entry.goal.completed);
    assert_eq!(
        submitted.entry.entry_date,
        NaiveDate::from_ymd_opt(2024, 3, 1).expect("date")
    );
    assert_eq!(h.analyzer.goal_calls.load(Ordering::SeqCst), 1);

    // submission under the analysis-time policy does not count the goal twice
    let progress = h.state.progress().get(STUDENT).expect("progress").expect("row");
    assert_eq!(progress.goals_analyzed, 1);
}

#[tokio::test]
async fn goal_below_threshold_is_rejected_and_not_stored() {
    let h = harness();
    register(&h.state, STUDENT, "Ada");
    h.analyzer.score_goal("study", SmartScore::uniform(1));
    let session = SessionContext::student(STUDENT);

    let err = goal_submit(&h.state, &session, STUDENT.to_string(), "study".to_string())
        .await
        .expect_err("vague goal must be rejected");
    assert_eq!(err.code, "GOAL_BELOW_THRESHOLD");
    assert_eq!(
        err.message,
        "Goal quality too low! Your score: 20%. Required: 40%."
    );
    let details = err.details.expect("details");
    assert_eq!(details["percentage"], 20);
    assert_eq!(details["threshold"], 40);

    let student = student_get(&h.state, &session, STUDENT.to_string())
        .await
        .expect("student");
    assert!(student.entries.is_empty());
}

#[tokio::test]
async fn threshold_rises_once_the_interval_passes_and_average_keeps_up() {
    let h = harness();
    register(&h.state, STUDENT, "Ada");
    h.analyzer.score_goal("Run 5 km before 8am on Monday", SmartScore::uniform(4));
    h.analyzer.score_goal("Write 500 words by 6pm", SmartScore::uniform(4));
    h.analyzer.score_goal("do stuff", SmartScore::uniform(1));
    let session = SessionContext::student(STUDENT);
    let coaching = h.state.coaching();

    let first = coaching
        .analyze_goal(&session, STUDENT, "Run 5 km before 8am on Monday", march(1))
        .await
        .expect("first analysis");
    assert_eq!(first.decision.threshold, 40);

    let second = coaching
        .analyze_goal(&session, STUDENT, "Write 500 words by 6pm", march(3))
        .await
        .expect("second analysis");
    // gated on the threshold in force before this analysis raised it
    assert_eq!(second.decision.threshold, 40);
    let report = second.progress.expect("report");
    assert_eq!(report.progress.current_smart_threshold, 45);
    assert_eq!(report.progress.last_threshold_increase, march(3));
    assert_eq!(report.progress.days_active, 2);
    assert_eq!(report.days_until_next_increase, 2);
    assert_eq!(
        report.message,
        "📈 Keep improving! 2 days until next level-up opportunity."
    );

    let third = coaching
        .analyze_goal(&session, STUDENT, "do stuff", march(4))
        .await
        .expect("third analysis");
    assert!(!third.decision.accepted);
    let report = third.progress.expect("report");
    assert_eq!(report.progress.goals_analyzed, 3);
    assert_eq!(report.progress.average_smart_score, 60);
    assert_eq!(report.progress.current_smart_threshold, 45);
}

#[tokio::test]
async fn goal_meeting_the_prior_threshold_survives_its_own_escalation() {
    let h = harness();
    register(&h.state, STUDENT, "Ada");
    h.analyzer.score_goal("Solve 10 algebra problems by 5pm", SmartScore::uniform(5));
    h.analyzer.score_goal("Tidy my desk", SmartScore::uniform(2));
    let session = SessionContext::student(STUDENT);
    let coaching = h.state.coaching();

    coaching
        .analyze_goal(&session, STUDENT, "Solve 10 algebra problems by 5pm", march(1))
        .await
        .expect("first analysis");
    let outcome = coaching
        .analyze_goal(&session, STUDENT, "Tidy my desk", march(3))
        .await
        .expect("second analysis");
    assert_eq!(outcome.analysis.percentage, 40);
    assert_eq!(outcome.decision.threshold, 40);
    assert!(outcome.decision.accepted);
    let report = outcome.progress.expect("report");
    assert_eq!(report.progress.current_smart_threshold, 45);

    let submitted = coaching
        .submit_goal(&session, STUDENT, "Tidy my desk", march(3))
        .await
        .expect("goal accepted on the threshold it was analyzed against");
    assert_eq!(submitted.decision.threshold, 40);
    assert_eq!(submitted.entry.goal.smart_percentage, Some(40));
    let progress = h.state.progress().get(STUDENT).expect("progress").expect("row");
    assert_eq!(progress.goals_analyzed, 2);
}

#[tokio::test]
async fn submitting_without_prior_analysis_counts_toward_progress() {
    let h = harness();
    register(&h.state, STUDENT, "Ada");
    h.analyzer.score_goal("Meditate 10 minutes at 7am", SmartScore::uniform(5));
    h.analyzer.score_goal("try", SmartScore::uniform(1));
    let session = SessionContext::student(STUDENT);

    let submitted = goal_submit(
        &h.state,
        &session,
        STUDENT.to_string(),
        "Meditate 10 minutes at 7am".to_string(),
    )
    .await
    .expect("submission");
    assert_eq!(h.analyzer.goal_calls.load(Ordering::SeqCst), 1);
    let report = submitted.progress.expect("progress created");
    assert_eq!(report.progress.goals_analyzed, 1);
    assert_eq!(report.progress.average_smart_score, 100);

    // rejected submissions are still analyses
    let err = goal_submit(&h.state, &session, STUDENT.to_string(), "try".to_string())
        .await
        .expect_err("vague goal");
    assert_eq!(err.code, "GOAL_BELOW_THRESHOLD");
    let progress = h.state.progress().get(STUDENT).expect("progress").expect("row");
    assert_eq!(progress.goals_analyzed, 2);
    assert_eq!(progress.average_smart_score, 60);
}

#[tokio::test]
async fn threshold_holds_when_average_falls_short() {
    let h = harness();
    register(&h.state, STUDENT, "Ada");
    h.analyzer.score_goal("Practice piano", SmartScore::uniform(2));
    h.analyzer.score_goal("be better", SmartScore::uniform(1));
    let session = SessionContext::student(STUDENT);
    let coaching = h.state.coaching();

    coaching
        .analyze_goal(&session, STUDENT, "Practice piano", march(1))
        .await
        .expect("first analysis");
    let outcome = coaching
        .analyze_goal(&session, STUDENT, "be better", march(5))
        .await
        .expect("second analysis");

    let report = outcome.progress.expect("report");
    assert_eq!(report.progress.average_smart_score, 30);
    assert_eq!(report.progress.current_smart_threshold, 40);
    assert_eq!(report.days_until_next_increase, 0);
    assert_eq!(
        report.message,
        "📈 Keep improving! Reach an average of 40% to unlock the next level."
    );
}

#[tokio::test]
async fn analyzer_outage_scores_provisionally_without_touching_progress() {
    let h = harness();
    register(&h.state, STUDENT, "Ada");
    let session = SessionContext::student(STUDENT);
    let coaching = h.state.coaching();

    let outcome = coaching
        .analyze_goal(&session, STUDENT, "Learn Rust lifetimes this week", march(1))
        .await
        .expect("fallback analysis");
    assert_eq!(outcome.analysis.source, AiResponseSource::Fallback);
    assert_eq!(outcome.analysis.percentage, 60);
    assert!(outcome.decision.accepted);
    assert!(outcome.progress.is_none());

    let submitted = coaching
        .submit_goal(&session, STUDENT, "Learn Rust lifetimes this week", march(1))
        .await
        .expect("provisional goal is stored");
    assert_eq!(submitted.entry.goal.smart_percentage, Some(60));
    assert!(h.state.progress().get(STUDENT).expect("progress").is_none());
    // provisional results are never cached, so the analyzer was asked twice
    assert_eq!(h.analyzer.goal_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_analyses_each_count_once() {
    let h = harness();
    register(&h.state, STUDENT, "Ada");
    let goals: Vec<String> = (0..5)
        .map(|index| format!("Finish chapter {index} notes by Friday"))
        .collect();
    for goal in &goals {
        h.analyzer.score_goal(goal, SmartScore::uniform(4));
    }

    let handles = goals.into_iter().map(|goal| {
        let coaching = h.state.coaching();
        let session = SessionContext::student(STUDENT);
        tokio::spawn(async move {
            coaching
                .analyze_goal(&session, STUDENT, &goal, march(1))
                .await
        })
    });

    for joined in join_all(handles).await {
        joined.expect("task joined").expect("analysis");
    }

    let progress = h.state.progress().get(STUDENT).expect("progress").expect("row");
    assert_eq!(progress.goals_analyzed, 5);
    assert_eq!(progress.average_smart_score, 80);
}

#[tokio::test]
async fn concurrent_analyses_on_a_single_thread_runtime_each_count_once() {
    let h = harness();
    register(&h.state, STUDENT, "Ada");
    let goals: Vec<String> = (0..5)
        .map(|index| format!("Sketch {index} thumbnails before lunch"))
        .collect();
    for goal in &goals {
        h.analyzer.score_goal(goal, SmartScore::uniform(3));
    }
    let session = SessionContext::student(STUDENT);
    let coaching = h.state.coaching();

    let analyses = goals
        .iter()
        .map(|goal| coaching.analyze_goal(&session, STUDENT, goal, march(1)));
    for outcome in join_all(analyses).await {
        outcome.expect("analysis");
    }

    let progress = h.state.progress().get(STUDENT).expect("progress").expect("row");
    assert_eq!(progress.goals_analyzed, 5);
    assert_eq!(progress.average_smart_score, 60);
}

#[tokio::test]
async fn acceptance_policy_stores_nothing_when_progress_cannot_be_written() {
    let h = harness();
    register(&h.state, STUDENT, "Ada");
    h.state
        .settings()
        .update(CoachSettingsUpdate {
            progress_update_policy: Some(ProgressUpdatePolicy::OnAcceptance),
            ..Default::default()
        })
        .expect("settings");
    h.state
        .db()
        .with_connection(|conn| {
            conn.execute_batch(
                "CREATE TRIGGER block_progress BEFORE INSERT ON user_progress
                 BEGIN SELECT RAISE(ABORT, 'progress writes disabled'); END;",
            )?;
            Ok(())
        })
        .expect("trigger");
    h.analyzer.score_goal("Bake bread by Sunday noon", SmartScore::uniform(4));
    let session = SessionContext::student(STUDENT);

    let result = h
        .state
        .coaching()
        .submit_goal(&session, STUDENT, "Bake bread by Sunday noon", march(1))
        .await;
    assert!(result.is_err());

    let student = h.state.students().load(STUDENT).expect("student");
    assert!(student.entries.is_empty());
    assert!(h.state.progress().get(STUDENT).expect("progress").is_none());
}

#[tokio::test]
async fn acceptance_policy_counts_only_stored_goals() {
    let h = harness();
    register(&h.state, STUDENT, "Ada");
    h.state
        .settings()
        .update(CoachSettingsUpdate {
            progress_update_policy: Some(ProgressUpdatePolicy::OnAcceptance),
            ..Default::default()
        })
        .expect("settings");
    h.analyzer.score_goal("Swim 20 laps at 7am", SmartScore::uniform(4));
    h.analyzer.score_goal("exercise", SmartScore::uniform(1));
    let session = SessionContext::student(STUDENT);
    let coaching = h.state.coaching();

    let analyzed = coaching
        .analyze_goal(&session, STUDENT, "Swim 20 laps at 7am", march(1))
        .await
        .expect("analysis");
    assert!(analyzed.progress.is_none());

    let submitted = coaching
        .submit_goal(&session, STUDENT, "Swim 20 laps at 7am", march(1))
        .await
        .expect("submission");
    assert_eq!(submitted.progress.expect("report").progress.goals_analyzed, 1);

    let rejected = coaching
        .submit_goal(&session, STUDENT, "exercise", march(2))
        .await;
    assert!(matches!(
        rejected,
        Err(AppError::GoalBelowThreshold {
            percentage: 20,
            threshold: 40
        })
    ));
    let progress = h.state.progress().get(STUDENT).expect("progress").expect("row");
    assert_eq!(progress.goals_analyzed, 1);
}

#[tokio::test]
async fn completing_goals_builds_streak_and_consistency() {
    let h = harness();
    register(&h.state, STUDENT, "Ada");
    let session = SessionContext::student(STUDENT);
    let coaching = h.state.coaching();
    for day in 1..=3 {
        let goal = format!("Review flashcards for 15 minutes on day {day}");
        h.analyzer.score_goal(&goal, SmartScore::uniform(4));
        coaching
            .submit_goal(&session, STUDENT, &goal, march(day))
            .await
            .expect("submission");
    }

    for day in 1..=3 {
        let date = NaiveDate::from_ymd_opt(2024, 3, day).expect("date");
        let entry = coaching
            .complete_goal(&session, STUDENT, date, true)
            .expect("completion");
        assert!(entry.goal.completed);
    }
    let student = h.state.students().load(STUDENT).expect("student");
    assert_eq!(student.streak, 3);
    assert_eq!(student.consistency_score, 100);

    let middle = NaiveDate::from_ymd_opt(2024, 3, 2).expect("date");
    coaching
        .complete_goal(&session, STUDENT, middle, false)
        .expect("undo completion");
    let student = h.state.students().load(STUDENT).expect("student");
    assert_eq!(student.streak, 1);
    assert_eq!(student.consistency_score, 67);

    let missing = NaiveDate::from_ymd_opt(2024, 2, 1).expect("date");
    assert!(matches!(
        coaching.complete_goal(&session, STUDENT, missing, true),
        Err(AppError::NotFound)
    ));
}

#[tokio::test]
async fn replacing_todays_goal_resets_completion() {
    let h = harness();
    register(&h.state, STUDENT, "Ada");
    h.analyzer.score_goal("Cycle 10 km after class", SmartScore::uniform(4));
    h.analyzer.score_goal("Cycle 15 km after class", SmartScore::uniform(5));
    let session = SessionContext::student(STUDENT);
    let coaching = h.state.coaching();

    coaching
        .submit_goal(&session, STUDENT, "Cycle 10 km after class", march(1))
        .await
        .expect("first goal");
    let today = NaiveDate::from_ymd_opt(2024, 3, 1).expect("date");
    coaching
        .complete_goal(&session, STUDENT, today, true)
        .expect("completion");

    let replaced = coaching
        .submit_goal(&session, STUDENT, "Cycle 15 km after class", march(1))
        .await
        .expect("replacement");
    assert_eq!(replaced.entry.goal.text, "Cycle 15 km after class");
    assert_eq!(replaced.entry.goal.smart_percentage, Some(100));
    assert!(!replaced.entry.goal.completed);

    let student = h.state.students().load(STUDENT).expect("student");
    assert_eq!(student.entries.len(), 1);
}

#[tokio::test]
async fn students_cannot_reach_other_students() {
    let h = harness();
    register(&h.state, STUDENT, "Ada");
    register(&h.state, "stu-2", "Grace");
    let coaching = h.state.coaching();

    let foreign = coaching
        .analyze_goal(&SessionContext::student("stu-2"), STUDENT, "Read", march(1))
        .await;
    assert!(matches!(foreign, Err(AppError::Forbidden { .. })));

    let unknown = coaching
        .analyze_goal(&SessionContext::admin("admin"), "ghost", "Read", march(1))
        .await;
    assert!(matches!(
        unknown,
        Err(AppError::StudentNotFound { ref student_id }) if student_id == "ghost"
    ));
}
