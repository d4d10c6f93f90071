use chrono::Utc;

use crate::models::entry::DailyEntry;
use crate::models::quiz::{GeneratedQuiz, QuizSubmission};
use crate::models::session::SessionContext;

use super::{run_blocking, AppState, CommandResult};

pub async fn quiz_generate(
    state: &AppState,
    session: &SessionContext,
    student_id: String,
) -> CommandResult<GeneratedQuiz> {
    Ok(state
        .coaching()
        .generate_quiz(session, &student_id, Utc::now())
        .await?)
}

pub async fn quiz_submit(
    state: &AppState,
    session: &SessionContext,
    student_id: String,
    submission: QuizSubmission,
) -> CommandResult<DailyEntry> {
    let coaching = state.coaching();
    let session = session.clone();
    run_blocking(move || coaching.submit_quiz(&session, &student_id, &submission, Utc::now())).await
}
