use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BadgeId {
    #[serde(rename = "streak-7")]
    Streak7,
    #[serde(rename = "consistency-90")]
    Consistency90,
    #[serde(rename = "deep-thinker")]
    DeepThinker,
    #[serde(rename = "quiz-whiz")]
    QuizWhiz,
    #[serde(rename = "perfect-week")]
    PerfectWeek,
}

impl BadgeId {
    pub const ALL: [BadgeId; 5] = [
        BadgeId::Streak7,
        BadgeId::Consistency90,
        BadgeId::DeepThinker,
        BadgeId::QuizWhiz,
        BadgeId::PerfectWeek,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BadgeId::Streak7 => "streak-7",
            BadgeId::Consistency90 => "consistency-90",
            BadgeId::DeepThinker => "deep-thinker",
            BadgeId::QuizWhiz => "quiz-whiz",
            BadgeId::PerfectWeek => "perfect-week",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.as_str() == value)
    }

    pub fn badge(self) -> Badge {
        let (name, description, icon) = match self {
            BadgeId::Streak7 => (
                "7-Day Streak",
                "Maintained a consistent streak for 7 days in a row!",
                "🔥",
            ),
            BadgeId::Consistency90 => (
                "High Achiever",
                "Achieved a consistency score of 90% or higher.",
                "🏆",
            ),
            BadgeId::DeepThinker => (
                "Deep Thinker",
                "Consistently provided deep, thoughtful reflections (average depth of 4+).",
                "🧠",
            ),
            BadgeId::QuizWhiz => (
                "Quiz Whiz",
                "Mastered the daily quizzes with an average score of 90% or higher.",
                "🎯",
            ),
            BadgeId::PerfectWeek => (
                "Perfect Week",
                "Completed every goal for a full 7 days.",
                "⭐",
            ),
        };

        Badge {
            id: self,
            name: name.to_string(),
            description: description.to_string(),
            icon: icon.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Badge {
    pub id: BadgeId,
    pub name: String,
    pub description: String,
    pub icon: String,
}

/// Full badge catalog in display order.
pub fn badge_catalog() -> Vec<Badge> {
    BadgeId::ALL.into_iter().map(BadgeId::badge).collect()
}
