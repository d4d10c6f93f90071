pub mod commands;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

use std::path::Path;

use tracing::info;

use crate::commands::AppState;
use crate::db::DbPool;
use crate::error::AppResult;

const DATABASE_FILE: &str = "goal-coach.sqlite";

/// Prepares logging and storage under `data_dir` and wires the services.
pub fn bootstrap(data_dir: &Path) -> AppResult<AppState> {
    std::fs::create_dir_all(data_dir)?;
    crate::utils::logger::init_logging(&data_dir.join("logs"))?;

    let pool = DbPool::new(data_dir.join(DATABASE_FILE))?;
    let state = AppState::new(pool)?;

    info!(target: "app::command", data_dir = %data_dir.display(), "goal coach ready");
    Ok(state)
}
