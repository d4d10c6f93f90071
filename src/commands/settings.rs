use crate::models::ai_types::AiStatusDto;
use crate::models::session::SessionContext;
use crate::models::settings::{CoachSettings, CoachSettingsUpdate};

use super::{run_blocking, AppState, CommandResult};

pub async fn settings_get(state: &AppState) -> CommandResult<CoachSettings> {
    let settings = state.settings();
    run_blocking(move || settings.get()).await
}

pub async fn settings_update(
    state: &AppState,
    session: &SessionContext,
    payload: CoachSettingsUpdate,
) -> CommandResult<CoachSettings> {
    session.ensure_admin()?;
    let settings = state.settings();
    run_blocking(move || settings.update(payload)).await
}

pub async fn ai_status(state: &AppState) -> CommandResult<AiStatusDto> {
    Ok(state.ai().status().await?)
}

/// Drops every cached analyzer response; returns the number of rows removed.
pub async fn ai_cache_clear(state: &AppState, session: &SessionContext) -> CommandResult<usize> {
    session.ensure_admin()?;
    Ok(state.ai().cache().clear().await?)
}
