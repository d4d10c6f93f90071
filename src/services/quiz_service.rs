use crate::error::{AppError, AppResult};
use crate::models::entry::QuizEvaluation;
use crate::models::quiz::{Quiz, QuizQuestion, QuizSubmission};

fn question(prompt: &str, options: [&str; 4], correct: &str, explanation: &str) -> QuizQuestion {
    QuizQuestion {
        question: prompt.to_string(),
        options: options.iter().map(|option| option.to_string()).collect(),
        correct_answer: correct.to_string(),
        explanation: Some(explanation.to_string()),
    }
}

/// Fixed quiz served when the analyzer cannot generate one.
pub fn fallback_quiz() -> Quiz {
    Quiz {
        title: "Personal Development Quiz".to_string(),
        description: "Test your knowledge about achieving your goals".to_string(),
        questions: vec![
            question(
                "What is the most important factor in achieving goals?",
                ["Luck", "Consistent daily action", "Perfect planning", "Waiting for motivation"],
                "Consistent daily action",
                "Consistency beats perfection when it comes to achieving goals.",
            ),
            question(
                "What makes a goal 'SMART'?",
                [
                    "Simple, Meaningful, Achievable, Realistic, Timely",
                    "Specific, Measurable, Achievable, Relevant, Time-bound",
                    "Strong, Motivating, Ambitious, Rewarding, Trackable",
                    "Strategic, Manageable, Actionable, Results-focused, Targeted",
                ],
                "Specific, Measurable, Achievable, Relevant, Time-bound",
                "SMART goals are Specific, Measurable, Achievable, Relevant and Time-bound.",
            ),
            question(
                "What is the most effective way to build a new habit?",
                [
                    "Start with 30-minute sessions",
                    "Begin with tiny, 2-minute actions",
                    "Only practice when motivated",
                    "Set multiple habits at once",
                ],
                "Begin with tiny, 2-minute actions",
                "Starting small makes consistency easier and builds momentum.",
            ),
            question(
                "When facing a setback, what is the best approach?",
                [
                    "Give up and try something else",
                    "Analyze what went wrong and adjust",
                    "Push harder with the same strategy",
                    "Take a long break",
                ],
                "Analyze what went wrong and adjust",
                "Setbacks show you where the strategy needs refining.",
            ),
            question(
                "What sustains long-term motivation best?",
                [
                    "Rewards and incentives",
                    "Connecting goals to your values",
                    "Peer pressure",
                    "Fear of failure",
                ],
                "Connecting goals to your values",
                "Goals aligned with your values provide lasting intrinsic motivation.",
            ),
            question(
                "How should you break down a large goal?",
                [
                    "Monthly milestones only",
                    "Small, actionable daily tasks",
                    "Yearly phases",
                    "Keep it as one big goal",
                ],
                "Small, actionable daily tasks",
                "Daily tasks make large goals manageable.",
            ),
        ],
    }
}

pub fn feedback_for(percentage: u32) -> &'static str {
    match percentage {
        90.. => "Outstanding! You have excellent knowledge about goal achievement. Keep applying these principles!",
        70..=89 => "Great job! You understand most key concepts. Review the areas you missed to strengthen your goal-setting skills.",
        50..=69 => "Good effort! You're on the right track. Consider studying more about SMART goals and productivity techniques.",
        _ => "Keep learning! Goal achievement is a skill that improves with practice. Review the explanations and try again.",
    }
}

/// Grades answers positionally; unanswered questions count as incorrect.
pub fn grade(submission: &QuizSubmission) -> AppResult<QuizEvaluation> {
    let questions = &submission.quiz.questions;
    if questions.is_empty() {
        return Err(AppError::validation("quiz has no questions"));
    }
    if submission.answers.len() > questions.len() {
        return Err(AppError::validation_with_details(
            "more answers than quiz questions",
            serde_json::json!({
                "questions": questions.len(),
                "answers": submission.answers.len(),
            }),
        ));
    }

    let score = questions
        .iter()
        .enumerate()
        .filter(|(index, question)| {
            submission.answers.get(*index).map(|a| a.trim()) == Some(question.correct_answer.trim())
        })
        .count() as u32;
    let total = questions.len() as u32;
    let percentage = ((f64::from(score) * 100.0) / f64::from(total)).round() as u32;

    Ok(QuizEvaluation {
        score,
        total,
        correct_answers: score,
        incorrect_answers: total - score,
        feedback: feedback_for(percentage).to_string(),
    })
}
