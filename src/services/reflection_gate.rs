use crate::error::{AppError, AppResult};
use crate::models::ai_types::ReflectionAnalysis;
use crate::models::entry::Reflection;

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Local floor checked before the analyzer is ever called.
pub fn prefilter(text: &str, min_words: u32) -> AppResult<()> {
    let words = word_count(text);
    if words < min_words as usize {
        return Err(AppError::reflection_invalid(
            format!(
                "Your reflection has {words} words. Please write at least {min_words} words so it captures what you learned."
            ),
            vec![
                "Describe what went well and what did not.".to_string(),
                "Explain how today's work connects to your goal.".to_string(),
                "Note one thing you will do differently tomorrow.".to_string(),
            ],
        ));
    }
    Ok(())
}

/// Accepts an analyzed reflection, taking depth and confidence verbatim from the analysis.
pub fn validate(text: &str, analysis: &ReflectionAnalysis) -> AppResult<Reflection> {
    if !analysis.is_valid {
        return Err(AppError::reflection_invalid(
            analysis.feedback.clone(),
            analysis.suggestions.clone(),
        ));
    }

    Ok(Reflection {
        text: text.trim().to_string(),
        depth: analysis.depth,
        confidence_level: analysis.confidence_level,
    })
}
