use crate::models::ai_types::CohortSummary;
use crate::models::analytics::DashboardSnapshot;
use crate::models::badge::{badge_catalog, Badge};
use crate::models::session::SessionContext;
use crate::models::student::StudentData;

use super::{run_blocking, AppState, CommandResult};

pub async fn admin_dashboard(
    state: &AppState,
    session: &SessionContext,
) -> CommandResult<DashboardSnapshot> {
    let cohort = state.cohort();
    let session = session.clone();
    run_blocking(move || cohort.dashboard(&session)).await
}

pub async fn admin_student_detail(
    state: &AppState,
    session: &SessionContext,
    student_id: String,
) -> CommandResult<StudentData> {
    let cohort = state.cohort();
    let session = session.clone();
    run_blocking(move || cohort.student_detail(&session, &student_id)).await
}

pub async fn admin_weekly_summary(
    state: &AppState,
    session: &SessionContext,
) -> CommandResult<CohortSummary> {
    let cohort = state.cohort();
    let admin = session.clone();
    let snapshot = run_blocking(move || cohort.dashboard(&admin)).await?;
    Ok(state.cohort().summarize(session, &snapshot).await?)
}

pub fn badges_catalog() -> Vec<Badge> {
    badge_catalog()
}
