//! Replace raw equations in an answer with their verbal descriptions.
//!
//! Symbolic equations compare poorly under sentence-embedding models, so the
//! similarity scorers run on these "descriptive" texts instead.

use regex::{NoExpand, RegexBuilder};

use crate::model::EquationRecord;

/// Rewrite `text`, replacing every case-insensitive occurrence of each
/// record's raw equation with its description.
///
/// Records are applied in order and each one sees the output of the
/// previous substitutions. Equations that do not occur are no-ops.
pub fn substitute(text: &str, equations: &[EquationRecord]) -> String {
    let mut out = text.to_string();

    for record in equations {
        let source = if record.raw_equation.trim().is_empty() {
            record.equation.trim()
        } else {
            record.raw_equation.trim()
        };
        if source.is_empty() {
            continue;
        }

        let pattern = match RegexBuilder::new(&regex::escape(source))
            .case_insensitive(true)
            .build()
        {
            Ok(pattern) => pattern,
            Err(e) => {
                // only reachable if the escaped pattern exceeds the size limit
                tracing::warn!(equation = %source, "skipping substitution: {e}");
                continue;
            }
        };

        out = pattern
            .replace_all(&out, NoExpand(&record.description))
            .into_owned();
    }

    out
}
