use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use sha2::{Digest, Sha256};

/// Deterministic hash of analyzer input, insensitive to case and whitespace runs.
///
/// `context` distinguishes inputs that are analyzed against something else,
/// e.g. a reflection analyzed against the day's goal.
pub fn semantic_hash(input: &str, context: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize(input).as_bytes());

    if let Some(context) = context {
        hasher.update(b"\x1f");
        hasher.update(normalize(context).as_bytes());
    }

    STANDARD_NO_PAD.encode(hasher.finalize())
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}
