pub mod ai_cache;
pub mod ai_service;
pub mod badge_engine;
pub mod cache_service;
pub mod coaching_service;
pub mod cohort_analytics;
pub mod goal_gate;
pub mod progress_tracker;
pub mod prompt_templates;
pub mod quiz_service;
pub mod reflection_gate;
pub mod settings_service;
pub mod smart_score;
pub mod student_service;
