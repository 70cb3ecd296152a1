//! Fuzzy name matching for app launch and window switching.
//!
//! Scores combine Jaro-Winkler similarity with a substring bonus: a query
//! fully contained in a candidate ("code" in "Visual Studio Code") is
//! almost certainly the intended target even when edit similarity is low.

use strsim::jaro_winkler;

/// Minimum score to accept a launch or window-switch target.
pub const MATCH_CUTOFF: f64 = 0.7;

/// Minimum score for is-something-running checks.  Window titles carry
/// document names and separators, so the bar is lower.
pub const RUNNING_CUTOFF: f64 = 0.6;

const SUBSTRING_SCORE: f64 = 0.9;

/// Similarity in `0.0..=1.0`, case-insensitive.
pub fn score(query: &str, candidate: &str) -> f64 {
    let query = query.trim().to_lowercase();
    let candidate_lower = candidate.trim().to_lowercase();
    if query.is_empty() || candidate_lower.is_empty() {
        return 0.0;
    }
    if query == candidate_lower {
        return 1.0;
    }
    let base = jaro_winkler(&query, &candidate_lower);
    if candidate_lower.contains(&query) {
        base.max(SUBSTRING_SCORE)
    } else {
        base
    }
}

/// Best-scoring candidate at or above `cutoff`, with its score.
pub fn best_match<'a, T, F>(
    query: &str,
    candidates: &'a [T],
    name_of: F,
    cutoff: f64,
) -> Option<(&'a T, f64)>
where
    F: Fn(&T) -> &str,
{
    candidates
        .iter()
        .map(|c| (c, score(query, name_of(c))))
        .filter(|(_, s)| *s >= cutoff)
        .max_by(|a, b| a.1.total_cmp(&b.1))
}

/// Top `limit` candidate names by score, for "did you mean" output.
pub fn suggestions<T, F>(query: &str, candidates: &[T], name_of: F, limit: usize) -> Vec<String>
where
    F: Fn(&T) -> &str,
{
    let mut scored: Vec<(String, f64)> = candidates
        .iter()
        .map(|c| (name_of(c).to_owned(), score(query, name_of(c))))
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(limit);
    scored.into_iter().map(|(name, _)| name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_and_case_insensitive() {
        assert_eq!(score("Notepad", "notepad"), 1.0);
        assert_eq!(score("", "notepad"), 0.0);
        assert_eq!(score("notepad", ""), 0.0);
    }

    #[test]
    fn test_substring_bonus() {
        let s = score("code", "Visual Studio Code");
        assert!(s >= SUBSTRING_SCORE, "substring match scored {s}");
        assert!(score("chrome", "Google Chrome") >= MATCH_CUTOFF);
    }

    #[test]
    fn test_typo_tolerance() {
        assert!(score("notepda", "Notepad") >= MATCH_CUTOFF);
        assert!(score("slack", "Calculator") < RUNNING_CUTOFF);
    }

    #[test]
    fn test_best_match_picks_highest() {
        let apps = ["Google Chrome", "Google Drive", "Calculator"];
        let (found, s) = best_match("chrome", &apps, |a| a, MATCH_CUTOFF).unwrap();
        assert_eq!(*found, "Google Chrome");
        assert!(s >= MATCH_CUTOFF);

        assert!(best_match("zzzz", &apps, |a| a, MATCH_CUTOFF).is_none());
    }

    #[test]
    fn test_two_tier_cutoffs() {
        // A window title with decoration passes the running cutoff but may
        // miss the stricter launch cutoff.
        let s = score("report", "report_final_v2.docx - Word");
        assert!(s >= RUNNING_CUTOFF);
    }

    #[test]
    fn test_suggestions_ordered_and_limited() {
        let apps = [
            "Google Chrome",
            "Google Drive",
            "Calculator",
            "Notepad",
            "Paint",
            "Terminal",
        ];
        let top = suggestions("google", &apps, |a| a, 5);
        assert_eq!(top.len(), 5);
        assert!(top[0].starts_with("Google"));
        assert!(top[1].starts_with("Google"));
    }
}
