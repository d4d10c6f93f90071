use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;
use tracing::{debug, warn};

use crate::models::badge::{Badge, BadgeId};
use crate::models::entry::DailyEntry;

const STREAK_BADGE_DAYS: u32 = 7;
const CONSISTENCY_BADGE_SCORE: u32 = 90;
const DEEP_THINKER_MIN_REFLECTIONS: u32 = 3;
const DEEP_THINKER_MIN_AVG_DEPTH: u32 = 4;
const QUIZ_WHIZ_MIN_RATIO: f64 = 0.9;
const CACHE_CAPACITY: usize = 256;

/// Everything the badge rules read, reduced from a student's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BadgeInputs {
    pub streak: u32,
    pub consistency_score: u32,
    pub reflection_count: u32,
    pub depth_sum: u32,
    pub quiz_count: u32,
    quiz_ratio_sum_bits: u64,
}

impl BadgeInputs {
    pub fn collect(streak: u32, consistency_score: u32, entries: &[DailyEntry]) -> Self {
        let mut reflection_count = 0;
        let mut depth_sum = 0;
        let mut quiz_count = 0;
        let mut quiz_ratio_sum = 0.0_f64;

        for entry in entries {
            if let Some(reflection) = entry.reflection.as_ref() {
                reflection_count += 1;
                depth_sum += u32::from(reflection.depth);
            }
            if let Some(quiz) = entry.quiz_evaluation.as_ref() {
                if !quiz.is_consistent() {
                    warn!(
                        target: "app::badges",
                        student_id = %entry.student_id,
                        date = %entry.entry_date,
                        score = quiz.score,
                        total = quiz.total,
                        "quiz score exceeds total"
                    );
                }
                if let Some(ratio) = quiz.ratio() {
                    quiz_count += 1;
                    quiz_ratio_sum += ratio;
                }
            }
        }

        Self {
            streak,
            consistency_score,
            reflection_count,
            depth_sum,
            quiz_count,
            quiz_ratio_sum_bits: quiz_ratio_sum.to_bits(),
        }
    }

    pub fn average_quiz_ratio(&self) -> Option<f64> {
        if self.quiz_count == 0 {
            None
        } else {
            Some(f64::from_bits(self.quiz_ratio_sum_bits) / f64::from(self.quiz_count))
        }
    }
}

/// Badge ids earned for the given inputs, in catalog order.
pub fn earned_badges(inputs: &BadgeInputs) -> Vec<BadgeId> {
    BadgeId::ALL
        .into_iter()
        .filter(|id| match id {
            BadgeId::Streak7 => inputs.streak >= STREAK_BADGE_DAYS,
            BadgeId::Consistency90 => inputs.consistency_score >= CONSISTENCY_BADGE_SCORE,
            BadgeId::DeepThinker => {
                inputs.reflection_count >= DEEP_THINKER_MIN_REFLECTIONS
                    && inputs.depth_sum >= DEEP_THINKER_MIN_AVG_DEPTH * inputs.reflection_count
            }
            BadgeId::QuizWhiz => inputs
                .average_quiz_ratio()
                .map(|ratio| ratio >= QUIZ_WHIZ_MIN_RATIO)
                .unwrap_or(false),
            // Catalogued but never awarded.
            BadgeId::PerfectWeek => false,
        })
        .collect()
}

pub fn compute_badges(streak: u32, consistency_score: u32, entries: &[DailyEntry]) -> Vec<Badge> {
    let inputs = BadgeInputs::collect(streak, consistency_score, entries);
    earned_badges(&inputs).into_iter().map(BadgeId::badge).collect()
}

/// Memoizes badge evaluation by the reduced inputs.
pub struct BadgeEngine {
    cache: Mutex<LruCache<BadgeInputs, Vec<BadgeId>>>,
}

impl Default for BadgeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl BadgeEngine {
    pub fn new() -> Self {
        let capacity = NonZeroUsize::new(CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn compute(&self, streak: u32, consistency_score: u32, entries: &[DailyEntry]) -> Vec<Badge> {
        let inputs = BadgeInputs::collect(streak, consistency_score, entries);

        if let Ok(mut cache) = self.cache.lock() {
            if let Some(ids) = cache.get(&inputs) {
                return ids.iter().copied().map(BadgeId::badge).collect();
            }
        }

        let ids = earned_badges(&inputs);
        debug!(
            target: "app::badges",
            streak,
            consistency_score,
            earned = ids.len(),
            "badges evaluated"
        );

        if let Ok(mut cache) = self.cache.lock() {
            cache.put(inputs, ids.clone());
        }

        ids.into_iter().map(BadgeId::badge).collect()
    }
}
