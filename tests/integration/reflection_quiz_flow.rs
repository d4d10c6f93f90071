mod support;

use std::sync::atomic::Ordering;

use goal_coach_lib::commands::reflection::reflection_submit;
use goal_coach_lib::error::AppError;
use goal_coach_lib::models::ai_types::AiResponseSource;
use goal_coach_lib::models::badge::BadgeId;
use goal_coach_lib::models::entry::ConfidenceLevel;
use goal_coach_lib::models::quiz::{Quiz, QuizQuestion, QuizSubmission};
use goal_coach_lib::models::session::SessionContext;
use goal_coach_lib::models::smart::SmartScore;

use support::{harness, march, register, words, Harness};

const STUDENT: &str = "stu-1";
const GOAL: &str = "Solve 10 algebra problems before dinner";

async fn submit_goal_on(h: &Harness, day: u32) {
    h.analyzer.score_goal(GOAL, SmartScore::uniform(4));
    h.state
        .coaching()
        .submit_goal(&SessionContext::student(STUDENT), STUDENT, GOAL, march(day))
        .await
        .expect("goal submission");
}

fn single_question_quiz(correct: &str) -> Quiz {
    Quiz {
        title: "Algebra habits".to_string(),
        description: "Check your practice routine".to_string(),
        questions: vec![QuizQuestion {
            question: "When is practice most effective?".to_string(),
            options: vec!["Spaced over days".to_string(), "Crammed at night".to_string()],
            correct_answer: correct.to_string(),
            explanation: None,
        }],
    }
}

#[tokio::test]
async fn short_reflection_is_rejected_before_analysis() {
    let h = harness();
    register(&h.state, STUDENT, "Ada");
    submit_goal_on(&h, 1).await;

    let err = reflection_submit(
        &h.state,
        &SessionContext::student(STUDENT),
        STUDENT.to_string(),
        words(10),
    )
    .await
    .expect_err("ten words are not enough");

    assert_eq!(err.code, "REFLECTION_INVALID");
    assert!(err.message.contains("10 words"));
    assert!(err.message.contains("at least 50 words"));
    let suggestions = err.details.expect("details")["suggestions"].clone();
    assert_eq!(suggestions.as_array().map(Vec::len), Some(3));
    assert_eq!(h.analyzer.reflection_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn reflection_requires_todays_goal() {
    let h = harness();
    register(&h.state, STUDENT, "Ada");
    h.analyzer.answer_reflection(true, 4, "HIGH");

    let result = h
        .state
        .coaching()
        .submit_reflection(&SessionContext::student(STUDENT), STUDENT, &words(60), march(2))
        .await;

    assert!(matches!(result, Err(AppError::Validation { .. })));
    assert_eq!(h.analyzer.reflection_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn accepted_reflection_merges_into_todays_entry() {
    let h = harness();
    register(&h.state, STUDENT, "Ada");
    submit_goal_on(&h, 1).await;
    h.analyzer.answer_reflection(true, 4, "HIGH");

    let outcome = h
        .state
        .coaching()
        .submit_reflection(&SessionContext::student(STUDENT), STUDENT, &words(60), march(1))
        .await
        .expect("reflection");

    assert_eq!(outcome.analysis.source, AiResponseSource::Online);
    let reflection = outcome.entry.reflection.expect("stored reflection");
    assert_eq!(reflection.depth, 4);
    assert_eq!(reflection.confidence_level, ConfidenceLevel::High);
    assert_eq!(outcome.entry.goal.text, GOAL);
    assert_eq!(outcome.entry.goal.smart_percentage, Some(80));
}

#[tokio::test]
async fn analyzer_verdict_can_reject_a_long_reflection() {
    let h = harness();
    register(&h.state, STUDENT, "Ada");
    submit_goal_on(&h, 1).await;
    h.analyzer.answer_reflection(false, 1, "LOW");

    let result = h
        .state
        .coaching()
        .submit_reflection(&SessionContext::student(STUDENT), STUDENT, &words(80), march(1))
        .await;

    match result {
        Err(AppError::ReflectionInvalid {
            feedback,
            suggestions,
        }) => {
            assert_eq!(feedback, "This reads like a list of facts.");
            assert_eq!(suggestions.len(), 1);
        }
        other => panic!("expected rejected reflection, got {other:?}"),
    }

    let student = h.state.students().load(STUDENT).expect("student");
    assert!(student.entries[0].reflection.is_none());
}

#[tokio::test]
async fn analyzer_outage_accepts_reflection_provisionally() {
    let h = harness();
    register(&h.state, STUDENT, "Ada");
    submit_goal_on(&h, 1).await;

    let outcome = h
        .state
        .coaching()
        .submit_reflection(&SessionContext::student(STUDENT), STUDENT, &words(55), march(1))
        .await
        .expect("provisional reflection");

    assert_eq!(outcome.analysis.source, AiResponseSource::Fallback);
    let reflection = outcome.entry.reflection.expect("stored reflection");
    assert_eq!(reflection.depth, 3);
    assert_eq!(reflection.confidence_level, ConfidenceLevel::Medium);
}

#[tokio::test]
async fn quiz_falls_back_and_grades_into_todays_entry() {
    let h = harness();
    register(&h.state, STUDENT, "Ada");
    let session = SessionContext::student(STUDENT);
    let coaching = h.state.coaching();

    let generated = coaching
        .generate_quiz(&session, STUDENT, march(1))
        .await
        .expect("quiz");
    assert_eq!(generated.source, AiResponseSource::Fallback);
    assert_eq!(generated.quiz.questions.len(), 6);

    let all_correct: Vec<String> = generated
        .quiz
        .questions
        .iter()
        .map(|question| question.correct_answer.clone())
        .collect();
    let submission = QuizSubmission {
        quiz: generated.quiz.clone(),
        answers: all_correct,
    };

    let early = coaching.submit_quiz(&session, STUDENT, &submission, march(1));
    assert!(matches!(early, Err(AppError::Validation { .. })));

    submit_goal_on(&h, 1).await;
    let entry = coaching
        .submit_quiz(&session, STUDENT, &submission, march(1))
        .expect("graded quiz");
    let evaluation = entry.quiz_evaluation.expect("evaluation");
    assert_eq!(evaluation.score, 6);
    assert_eq!(evaluation.total, 6);
    assert_eq!(evaluation.correct_answers, 6);
    assert_eq!(evaluation.incorrect_answers, 0);
    assert!(evaluation.feedback.starts_with("Outstanding!"));
    assert_eq!(entry.goal.text, GOAL);
}

#[tokio::test]
async fn generated_quiz_is_used_only_when_answers_match_options() {
    let h = harness();
    register(&h.state, STUDENT, "Ada");
    submit_goal_on(&h, 1).await;
    let session = SessionContext::student(STUDENT);
    let coaching = h.state.coaching();

    h.analyzer.answer_quiz(single_question_quiz("Spaced over days"));
    let online = coaching
        .generate_quiz(&session, STUDENT, march(1))
        .await
        .expect("quiz");
    assert_eq!(online.source, AiResponseSource::Online);
    assert_eq!(online.quiz.title, "Algebra habits");

    h.analyzer.answer_quiz(single_question_quiz("Never"));
    let malformed = coaching
        .generate_quiz(&session, STUDENT, march(1))
        .await
        .expect("quiz");
    assert_eq!(malformed.source, AiResponseSource::Fallback);
    assert_eq!(malformed.quiz.title, "Personal Development Quiz");
}

#[tokio::test]
async fn deep_reflections_and_quiz_scores_earn_badges() {
    let h = harness();
    register(&h.state, STUDENT, "Ada");
    let session = SessionContext::student(STUDENT);
    let coaching = h.state.coaching();

    for (day, depth) in [(1, 4), (2, 5), (3, 4)] {
        submit_goal_on(&h, day).await;
        h.analyzer.answer_reflection(true, depth, "MEDIUM");
        coaching
            .submit_reflection(&session, STUDENT, &words(60), march(day))
            .await
            .expect("reflection");

        let quiz = single_question_quiz("Spaced over days");
        let submission = QuizSubmission {
            quiz,
            answers: vec!["Spaced over days".to_string()],
        };
        coaching
            .submit_quiz(&session, STUDENT, &submission, march(day))
            .expect("quiz");
    }

    let student = h.state.students().load(STUDENT).expect("student");
    let earned: Vec<BadgeId> = student.badges.iter().map(|badge| badge.id).collect();
    assert_eq!(earned, vec![BadgeId::DeepThinker, BadgeId::QuizWhiz]);

    let record = h.state.students().require(STUDENT).expect("record");
    assert_eq!(record.badge_ids, earned);
}
