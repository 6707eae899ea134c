//! Picks which files are worth spending inference budget on. Grounded in
//! `original_source/core/triage/ai_vibe_check.py`'s target-selection order:
//! files the rule engine already flagged come first, since those are the
//! highest-signal candidates; only when nothing was flagged do we fall back
//! to the extension's declared entry points.

const MAX_FALLBACK_TARGETS: usize = 2;

/// Returns the files to analyze, in priority order. An empty result means
/// the caller should treat this package as having no analyzable source.
pub fn select_targets(
    flagged_files: &[String],
    manifest_main: Option<&str>,
    manifest_browser: Option<&str>,
) -> Vec<String> {
    if !flagged_files.is_empty() {
        let mut targets: Vec<String> = flagged_files.to_vec();
        targets.dedup();
        return targets;
    }

    let mut fallback = Vec::new();
    for entry in [manifest_main, manifest_browser].into_iter().flatten() {
        if fallback.contains(&entry.to_string()) {
            continue;
        }
        fallback.push(entry.to_string());
        if fallback.len() >= MAX_FALLBACK_TARGETS {
            break;
        }
    }
    fallback
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_flagged_files_over_manifest_entries() {
        let flagged = vec!["extension/suspicious.js".to_string()];
        let targets = select_targets(&flagged, Some("extension/main.js"), None);
        assert_eq!(targets, vec!["extension/suspicious.js".to_string()]);
    }

    #[test]
    fn falls_back_to_manifest_entries_when_nothing_flagged() {
        let targets = select_targets(&[], Some("extension/main.js"), Some("extension/browser.js"));
        assert_eq!(
            targets,
            vec!["extension/main.js".to_string(), "extension/browser.js".to_string()]
        );
    }

    #[test]
    fn caps_fallback_at_two_entries() {
        let targets = select_targets(&[], Some("a.js"), Some("b.js"));
        assert_eq!(targets.len(), 2);
    }

    #[test]
    fn empty_when_nothing_flagged_and_no_manifest_entries() {
        let targets = select_targets(&[], None, None);
        assert!(targets.is_empty());
    }
}
