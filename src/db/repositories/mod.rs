pub mod dashboard_repository;
pub mod entry_repository;
pub mod progress_repository;
pub mod settings_repository;
pub mod student_repository;
