//! User-facing rendering of fail-over failures.
//!
//! The orchestrator keeps only the message of each failed attempt; these
//! helpers turn that list into the single string handed to the result sink.

use crate::orchestrator::AttemptError;

/// Render the attempt errors of a failed fail-over run.
///
/// - one attempt: the error message as-is
/// - several attempts: a header line followed by one line per configuration,
///   in attempt order
pub fn format_failures(errors: &[AttemptError]) -> String {
    match errors {
        [] => "no configuration available".to_string(),
        [single] => single.message.clone(),
        many => {
            let mut out = format!("All {} configurations failed:", many.len());
            for attempt in many {
                out.push_str(&format!(
                    "\n  [config {}] {}",
                    attempt.config_index, attempt.message
                ));
            }
            out
        }
    }
}
