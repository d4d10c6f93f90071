use chrono::{NaiveDate, Utc};

use crate::models::entry::DailyEntry;
use crate::models::session::SessionContext;
use crate::services::coaching_service::{GoalAnalysisOutcome, GoalSubmissionOutcome};

use super::{run_blocking, AppState, CommandResult};

pub async fn goal_analyze(
    state: &AppState,
    session: &SessionContext,
    student_id: String,
    goal_text: String,
) -> CommandResult<GoalAnalysisOutcome> {
    Ok(state
        .coaching()
        .analyze_goal(session, &student_id, &goal_text, Utc::now())
        .await?)
}

pub async fn goal_submit(
    state: &AppState,
    session: &SessionContext,
    student_id: String,
    goal_text: String,
) -> CommandResult<GoalSubmissionOutcome> {
    Ok(state
        .coaching()
        .submit_goal(session, &student_id, &goal_text, Utc::now())
        .await?)
}

pub async fn goal_complete(
    state: &AppState,
    session: &SessionContext,
    student_id: String,
    entry_date: NaiveDate,
    completed: bool,
) -> CommandResult<DailyEntry> {
    let coaching = state.coaching();
    let session = session.clone();
    run_blocking(move || coaching.complete_goal(&session, &student_id, entry_date, completed)).await
}
