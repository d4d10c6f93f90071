mod support;

use chrono::NaiveDate;

use goal_coach_lib::commands::admin::{admin_dashboard, admin_student_detail, admin_weekly_summary};
use goal_coach_lib::db::repositories::entry_repository::EntryRepository;
use goal_coach_lib::models::ai_types::AiResponseSource;
use goal_coach_lib::models::entry::{ConfidenceLevel, DailyEntryPatch, Goal, QuizEvaluation, Reflection};
use goal_coach_lib::models::session::SessionContext;
use goal_coach_lib::models::settings::CoachSettingsUpdate;

use support::{harness, march, register, Harness};

fn record_day(
    h: &Harness,
    student_id: &str,
    day: u32,
    completed: bool,
    depth: Option<u8>,
    quiz: Option<(u32, u32)>,
) {
    let patch = DailyEntryPatch {
        goal: Some(Goal {
            text: format!("Goal for day {day}"),
            smart_score: None,
            smart_percentage: Some(80),
            completed,
        }),
        reflection: depth.map(|depth| Reflection {
            text: "Worked through the hard part first.".to_string(),
            depth,
            confidence_level: ConfidenceLevel::Medium,
        }),
        quiz_evaluation: quiz.map(|(score, total)| QuizEvaluation {
            score,
            total,
            correct_answers: score,
            incorrect_answers: total.saturating_sub(score),
            feedback: String::new(),
        }),
    };
    let date = NaiveDate::from_ymd_opt(2024, 3, day).expect("date");
    h.state
        .db()
        .with_transaction(|conn| EntryRepository::merge(conn, student_id, date, march(day), &patch))
        .expect("entry stored");
}

/// Four students: one thriving, one missing goals, one inconsistent, one silent.
fn seeded_cohort() -> Harness {
    let h = harness();
    register(&h.state, "stu-a", "Ada");
    register(&h.state, "stu-b", "Ben");
    register(&h.state, "stu-c", "Cy");
    register(&h.state, "stu-d", "Di");

    for day in 1..=3 {
        record_day(&h, "stu-a", day, true, Some(4), Some((1, 1)));
        record_day(&h, "stu-b", day, false, None, None);
    }
    record_day(&h, "stu-c", 1, false, Some(3), Some((0, 1)));
    h
}

#[tokio::test]
async fn dashboard_is_admin_only() {
    let h = seeded_cohort();

    let err = admin_dashboard(&h.state, &SessionContext::student("stu-a"))
        .await
        .expect_err("students cannot open the dashboard");
    assert_eq!(err.code, "FORBIDDEN");

    let err = admin_student_detail(&h.state, &SessionContext::student("stu-a"), "stu-a".to_string())
        .await
        .expect_err("detail view is admin only too");
    assert_eq!(err.code, "FORBIDDEN");
}

#[tokio::test]
async fn dashboard_reports_kpis_and_at_risk_students() {
    let h = seeded_cohort();

    let snapshot = admin_dashboard(&h.state, &SessionContext::admin("admin"))
        .await
        .expect("dashboard");
    assert!(!snapshot.stale);
    assert_eq!(snapshot.total_students, 4);
    assert_eq!(snapshot.total_entries, 7);

    let kpis = &snapshot.data.kpis;
    assert_eq!(kpis.goal_completion, 43);
    assert_eq!(kpis.avg_reflection_depth, 3.8);
    assert_eq!(kpis.avg_test_performance, 75);

    let flagged: Vec<(&str, &str)> = snapshot
        .data
        .at_risk_students
        .iter()
        .map(|student| (student.id.as_str(), student.reason.as_str()))
        .collect();
    assert_eq!(
        flagged,
        vec![
            ("stu-b", "Missed 3 goals"),
            ("stu-c", "Low consistency score"),
            ("stu-d", "Low reflection depth"),
        ]
    );
    let ben = &snapshot.data.at_risk_students[0];
    assert_eq!(ben.missed_goals, 3);
    assert_eq!(ben.avg_reflection_depth, 0.0);

    assert_eq!(snapshot.data.students.len(), 4);
    let weeks: Vec<u32> = snapshot.data.engagement_data.iter().map(|point| point.goals).collect();
    assert_eq!(weeks, vec![43, 38, 46, 43]);
}

#[tokio::test]
async fn at_risk_list_respects_configured_limit() {
    let h = seeded_cohort();
    h.state
        .settings()
        .update(CoachSettingsUpdate {
            at_risk_limit: Some(2),
            ..Default::default()
        })
        .expect("settings");

    let snapshot = h
        .state
        .cohort()
        .dashboard(&SessionContext::admin("admin"))
        .expect("dashboard");
    let ids: Vec<&str> = snapshot
        .data
        .at_risk_students
        .iter()
        .map(|student| student.id.as_str())
        .collect();
    assert_eq!(ids, vec!["stu-b", "stu-c"]);
}

#[tokio::test]
async fn failed_aggregation_serves_last_snapshot_as_stale() {
    let h = seeded_cohort();
    let admin = SessionContext::admin("admin");
    let cohort = h.state.cohort();

    let fresh = cohort.dashboard(&admin).expect("dashboard");
    let stored: i64 = h
        .state
        .db()
        .with_connection(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM dashboard_snapshots", [], |row| row.get(0))?)
        })
        .expect("snapshot count");
    assert_eq!(stored, 1);

    h.state
        .db()
        .with_connection(|conn| {
            conn.execute(
                "UPDATE daily_entries SET quiz_json = 'not json' WHERE student_id = 'stu-b'",
                [],
            )?;
            Ok(())
        })
        .expect("corrupt entry");

    let stale = cohort.dashboard(&admin).expect("stale dashboard");
    assert!(stale.stale);
    assert_eq!(stale.data.kpis, fresh.data.kpis);
    assert_eq!(stale.total_entries, 7);
}

#[tokio::test]
async fn weekly_summary_falls_back_without_analyzer_answer() {
    let h = seeded_cohort();
    let admin = SessionContext::admin("admin");

    let summary = admin_weekly_summary(&h.state, &admin).await.expect("summary");
    assert_eq!(summary.source, AiResponseSource::Fallback);
    assert!(summary.summary.starts_with(
        "Goal completion is 43% with an average reflection depth of 3.8 and quiz performance of 75%."
    ));
    assert!(summary.summary.contains("3 student(s) need attention"));
    assert!(summary.summary.contains("Ben (Missed 3 goals)"));

    h.analyzer
        .answer_summary("Completion dipped this week; check in with Ben.");
    let summary = admin_weekly_summary(&h.state, &admin).await.expect("summary");
    assert_eq!(summary.source, AiResponseSource::Online);
    assert_eq!(summary.summary, "Completion dipped this week; check in with Ben.");
}

#[tokio::test]
async fn admin_can_open_a_student_detail() {
    let h = seeded_cohort();

    let student = admin_student_detail(&h.state, &SessionContext::admin("admin"), "stu-a".to_string())
        .await
        .expect("detail");
    assert_eq!(student.name, "Ada");
    assert_eq!(student.entries.len(), 3);
    assert_eq!(student.streak, 3);
    assert_eq!(student.consistency_score, 100);

    let err = admin_student_detail(&h.state, &SessionContext::admin("admin"), "ghost".to_string())
        .await
        .expect_err("unknown student");
    assert_eq!(err.code, "STUDENT_NOT_FOUND");
}
