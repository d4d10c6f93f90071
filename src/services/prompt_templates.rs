use serde_json::{json, Value as JsonValue};

use crate::models::analytics::AdminDashboardData;

pub const QUIZ_QUESTION_COUNT: usize = 12;

/// System prompt for rating a goal against the SMART criteria.
pub fn goal_analysis_system_prompt() -> &'static str {
    r#"You are a goal-setting coach for students. Rate the student's goal on a scale of 1 to 5
for each SMART principle (specific, measurable, achievable, realistic, timeBound) and give brief,
constructive feedback. Respond with valid UTF-8 JSON only, without markdown code fences:
{
  "score": {
    "specific": integer 1-5,
    "measurable": integer 1-5,
    "achievable": integer 1-5,
    "realistic": integer 1-5,
    "timeBound": integer 1-5
  },
  "feedback": string
}"#
}

pub fn reflection_analysis_system_prompt() -> &'static str {
    r#"You assess daily student reflections written against a goal. Evaluate:
1. isValid: is it a proper, detailed reflection (at least 50 words, not generic statements)?
2. depth: 1-5 based on self-awareness, insight and level of detail.
3. confidenceLevel: HIGH, MEDIUM or LOW based on the tone and conviction shown.
4. feedback and concrete suggestions for improvement.

A good reflection shows honest self-assessment, specific examples, insight about challenges
and successes, a growth mindset and a clear connection to the goal. Reject reflections that are
too short, generic or copy-pasted, merely factual, or unrelated to the goal.
Respond with valid UTF-8 JSON only, without markdown code fences:
{
  "isValid": boolean,
  "depth": integer 1-5,
  "confidenceLevel": "HIGH" | "MEDIUM" | "LOW",
  "feedback": string,
  "suggestions": string[]
}"#
}

pub fn quiz_generation_system_prompt() -> &'static str {
    r#"You write personalized multiple-choice quizzes that help a student succeed with their goal.
Generate exactly 12 questions directly relevant to the goal's domain. When a reflection is given,
draw on its insights. Cover domain strategies, common obstacles, best practices, motivation,
progress measurement, time management, supporting habits, setbacks, tools, milestones,
advanced techniques and long-term sustainability. Each question has 4 realistic options with
exactly one correct answer, which must appear verbatim in the options, and an explanation that
teaches something useful. Respond with valid UTF-8 JSON only, without markdown code fences:
{
  "title": string,
  "description": string,
  "questions": [
    { "question": string, "options": string[4], "correctAnswer": string, "explanation": string }
  ]
}"#
}

pub fn cohort_summary_system_prompt() -> &'static str {
    r#"You are an expert educational analyst. Based on weekly data for a student cohort, write a
concise, actionable summary of 3-4 sentences. Highlight overall trends, identify potential areas
of concern and suggest one specific action for the administrator.
Respond with valid UTF-8 JSON only, without markdown code fences: { "summary": string }"#
}

pub fn build_goal_payload(goal_text: &str) -> JsonValue {
    json!({
        "task": "analyzeGoal",
        "goal": goal_text,
    })
}

pub fn build_reflection_payload(reflection_text: &str, goal_text: &str) -> JsonValue {
    json!({
        "task": "analyzeReflection",
        "goal": goal_text,
        "reflection": reflection_text,
    })
}

pub fn build_quiz_payload(goal_text: &str, reflection_text: Option<&str>) -> JsonValue {
    let mut payload = json!({
        "task": "generateQuiz",
        "goal": goal_text,
        "questionCount": QUIZ_QUESTION_COUNT,
    });
    if let (Some(reflection), Some(map)) = (reflection_text, payload.as_object_mut()) {
        map.insert("reflection".to_string(), json!(reflection));
    }
    payload
}

/// Cohort payload carrying KPIs, the at-risk list as `name (reason)` and the trend.
pub fn build_cohort_payload(data: &AdminDashboardData) -> JsonValue {
    let at_risk: Vec<String> = data
        .at_risk_students
        .iter()
        .map(|student| format!("{} ({})", student.name, student.reason))
        .collect();

    json!({
        "task": "summarizeCohort",
        "kpis": data.kpis,
        "atRiskStudents": at_risk,
        "engagementTrend": data.engagement_data,
    })
}

pub fn goal_response_schema() -> JsonValue {
    let rating = json!({ "type": "integer", "minimum": 1, "maximum": 5 });
    json!({
        "type": "object",
        "required": ["score", "feedback"],
        "properties": {
            "score": {
                "type": "object",
                "required": ["specific", "measurable", "achievable", "realistic", "timeBound"],
                "properties": {
                    "specific": rating,
                    "measurable": rating,
                    "achievable": rating,
                    "realistic": rating,
                    "timeBound": rating
                }
            },
            "feedback": { "type": "string" }
        }
    })
}

pub fn reflection_response_schema() -> JsonValue {
    json!({
        "type": "object",
        "required": ["isValid", "depth", "confidenceLevel", "feedback", "suggestions"],
        "properties": {
            "isValid": { "type": "boolean" },
            "depth": { "type": "integer", "minimum": 1, "maximum": 5 },
            "confidenceLevel": { "type": "string" },
            "feedback": { "type": "string" },
            "suggestions": { "type": "array", "items": { "type": "string" } }
        }
    })
}

pub fn quiz_response_schema() -> JsonValue {
    json!({
        "type": "object",
        "required": ["title", "description", "questions"],
        "properties": {
            "title": { "type": "string" },
            "description": { "type": "string" },
            "questions": {
                "type": "array",
                "minItems": 1,
                "items": {
                    "type": "object",
                    "required": ["question", "options", "correctAnswer"],
                    "properties": {
                        "question": { "type": "string" },
                        "options": {
                            "type": "array",
                            "minItems": 2,
                            "items": { "type": "string" }
                        },
                        "correctAnswer": { "type": "string" },
                        "explanation": { "type": "string" }
                    }
                }
            }
        }
    })
}

pub fn cohort_summary_response_schema() -> JsonValue {
    json!({
        "type": "object",
        "required": ["summary"],
        "properties": {
            "summary": { "type": "string", "minLength": 1 }
        }
    })
}
