use chrono::Utc;

use crate::models::session::SessionContext;
use crate::services::coaching_service::ReflectionSubmissionOutcome;

use super::{AppState, CommandResult};

pub async fn reflection_submit(
    state: &AppState,
    session: &SessionContext,
    student_id: String,
    reflection_text: String,
) -> CommandResult<ReflectionSubmissionOutcome> {
    Ok(state
        .coaching()
        .submit_reflection(session, &student_id, &reflection_text, Utc::now())
        .await?)
}
