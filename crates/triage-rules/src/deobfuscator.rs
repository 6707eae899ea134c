//! Deobfuscator: heuristic packer detection and an obfuscation score, plus
//! best-effort hex/unicode escape decoding. Advisory only — it never
//! contributes to the composite risk score, and it never fails the scan.
//! Grounded in `original_source/core/triage/deobfuscator.py`.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

fn packer_signatures() -> &'static Vec<(&'static str, Regex)> {
    static SIGS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    SIGS.get_or_init(|| {
        vec![
            ("webpack", Regex::new(r"__webpack_require__").unwrap()),
            ("uglifyjs", Regex::new(r"!function\(\w,\w\)\{").unwrap()),
            (
                "javascript_obfuscator",
                Regex::new(r"_0x[a-f0-9]{4,6}\s*=").unwrap(),
            ),
            ("jsfuck", Regex::new(r"\[\]\[\(!!\[\]\+\[\]\)").unwrap()),
            ("eval_packer", Regex::new(r"\bp,a,c,k,e\b").unwrap()),
            ("obfuscator_io", Regex::new(r"_0x[a-f0-9]{4,8}\(0x[a-f0-9]+\)").unwrap()),
        ]
    })
}

fn hex_escape_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\\x([0-9a-fA-F]{2})").unwrap())
}

fn unicode_escape_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\\u([0-9a-fA-F]{4})").unwrap())
}

fn obf_var_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"_0x[a-f0-9]+").unwrap())
}

fn charcode_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"String\.fromCharCode").unwrap())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeobfuscationResult {
    pub source: String,
    pub packers_detected: Vec<String>,
    pub obfuscation_score: f64,
    pub transforms_applied: Vec<String>,
}

pub struct Deobfuscator;

impl Deobfuscator {
    pub fn deobfuscate(source: &str) -> DeobfuscationResult {
        let packers_detected: Vec<String> = packer_signatures()
            .iter()
            .filter(|(_, re)| re.is_match(source))
            .map(|(name, _)| name.to_string())
            .collect();

        let obfuscation_score = estimate_obfuscation(source, &packers_detected);

        let mut transforms_applied = Vec::new();
        let mut transformed = source.to_string();

        let hex_count = hex_escape_re().find_iter(source).count();
        if hex_count > 10 {
            transformed = decode_hex_escapes(&transformed);
            transforms_applied.push("hex_escape_decode".to_string());
        }

        let unicode_count = unicode_escape_re().find_iter(source).count();
        if unicode_count > 10 {
            transformed = decode_unicode_escapes(&transformed);
            transforms_applied.push("unicode_escape_decode".to_string());
        }

        DeobfuscationResult {
            source: transformed,
            packers_detected,
            obfuscation_score,
            transforms_applied,
        }
    }
}

fn estimate_obfuscation(source: &str, packers: &[String]) -> f64 {
    let mut score = 0.0;

    let hex_count = hex_escape_re().find_iter(source).count();
    if hex_count > 20 {
        score += 0.2;
    }

    let lines: Vec<&str> = source.lines().collect();
    let long_lines = lines.iter().filter(|l| l.len() > 500).count();
    if long_lines > 0 && lines.len() < 10 {
        score += 0.2;
    }

    if source.len() > 100 {
        let alnum = source.chars().filter(|c| c.is_alphanumeric()).count();
        let ratio = alnum as f64 / source.len() as f64;
        if ratio < 0.4 {
            score += 0.2;
        }
    }

    let obf_vars = obf_var_re().find_iter(source).count();
    if obf_vars > 10 {
        score += 0.2;
    }

    let charcode_count = charcode_re().find_iter(source).count();
    if charcode_count > 3 {
        score += 0.1;
    }

    if !packers.is_empty() {
        score += 0.1;
    }

    score.min(1.0)
}

fn decode_hex_escapes(source: &str) -> String {
    hex_escape_re()
        .replace_all(source, |caps: &regex::Captures| {
            u8::from_str_radix(&caps[1], 16)
                .map(|byte| (byte as char).to_string())
                .unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}

fn decode_unicode_escapes(source: &str) -> String {
    unicode_escape_re()
        .replace_all(source, |caps: &regex::Captures| {
            u32::from_str_radix(&caps[1], 16)
                .ok()
                .and_then(char::from_u32)
                .map(|c| c.to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_javascript_obfuscator_identifiers() {
        let source = "var _0xabcd = 1; var _0x1234 = 2;";
        let result = Deobfuscator::deobfuscate(source);
        assert!(result.packers_detected.contains(&"javascript_obfuscator".to_string()));
    }

    #[test]
    fn decodes_hex_escapes_past_threshold() {
        let mut source = String::new();
        for _ in 0..12 {
            source.push_str("\\x41");
        }
        let result = Deobfuscator::deobfuscate(&source);
        assert!(result.transforms_applied.contains(&"hex_escape_decode".to_string()));
        assert!(result.source.contains('A'));
    }

    #[test]
    fn leaves_short_hex_sequences_undecoded() {
        let source = "\\x41\\x42";
        let result = Deobfuscator::deobfuscate(source);
        assert!(!result.transforms_applied.contains(&"hex_escape_decode".to_string()));
        assert_eq!(result.source, source);
    }

    #[test]
    fn clean_source_scores_near_zero() {
        let source = "function add(a, b) { return a + b; }";
        let result = Deobfuscator::deobfuscate(source);
        assert_eq!(result.obfuscation_score, 0.0);
    }
}
