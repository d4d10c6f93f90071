use chrono::Utc;

use crate::models::progress::ProgressReport;
use crate::models::session::SessionContext;
use crate::models::student::StudentData;

use super::{run_blocking, AppState, CommandResult};

/// Registers the signed-in student on first use and returns their data.
pub async fn student_ensure(
    state: &AppState,
    session: &SessionContext,
    display_name: Option<String>,
    email: Option<String>,
) -> CommandResult<StudentData> {
    let students = state.students();
    let student_id = session.user_id.clone();
    run_blocking(move || {
        students.ensure_student(&student_id, display_name.as_deref(), email.as_deref())
    })
    .await
}

pub async fn student_get(
    state: &AppState,
    session: &SessionContext,
    student_id: String,
) -> CommandResult<StudentData> {
    session.ensure_can_access(&student_id)?;
    let students = state.students();
    run_blocking(move || students.load(&student_id)).await
}

pub async fn student_progress(
    state: &AppState,
    session: &SessionContext,
    student_id: String,
) -> CommandResult<Option<ProgressReport>> {
    let coaching = state.coaching();
    let session = session.clone();
    run_blocking(move || coaching.progress_report(&session, &student_id, Utc::now())).await
}
