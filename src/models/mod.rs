pub mod ai_types;
pub mod analytics;
pub mod badge;
pub mod entry;
pub mod progress;
pub mod quiz;
pub mod session;
pub mod settings;
pub mod smart;
pub mod student;
