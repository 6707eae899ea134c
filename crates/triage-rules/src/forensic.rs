//! ForensicChecker: magic-byte signature detection to catch files that
//! masquerade as something else — a PE binary wearing a `.png` extension, a
//! `.js` file that's actually an ELF. Grounded in
//! `original_source/core/triage/forensic_check.py`.

use serde::{Deserialize, Serialize};
use triage_archive::ArchiveReader;
use triage_core::{weighted_risk, Finding, Severity};

use crate::error::RulesError;

/// Magic byte signatures, longest-first so a longer, more specific prefix
/// wins over a shorter one that happens to also match.
///
/// `\xca\xfe\xba\xbe` is shared by 32-bit Mach-O "fat" binaries and Java
/// class files. The original Python table defines this signature twice in
/// the same dict literal — once as "Mach-O (Universal)", then immediately
/// again as "Java Class" — so only the second assignment ever took effect at
/// runtime. We make that the documented, deliberate behavior rather than an
/// accident: this table maps the byte sequence to "Java Class" only (see
/// DESIGN.md).
fn magic_signatures() -> &'static [(&'static [u8], &'static str)] {
    const TABLE: &[(&[u8], &str)] = &[
        (b"7z\xbc\xaf\x27\x1c", "7Z"),
        (b"\xfe\xed\xfa\xce", "Mach-O (32-bit)"),
        (b"\xfe\xed\xfa\xcf", "Mach-O (64-bit)"),
        (b"\xca\xfe\xba\xbe", "Java Class"),
        (b"GIF87a", "GIF"),
        (b"GIF89a", "GIF"),
        (b"Rar!\x1a\x07", "RAR"),
        (b"\x89PNG\r\n\x1a\n", "PNG"),
        (b"%PDF", "PDF"),
        (b"RIFF", "WEBP/AVI/WAV"),
        (b"PK\x03\x04", "ZIP/JAR"),
        (b"\x1f\x8b", "GZIP"),
        (b"\xff\xd8\xff", "JPEG"),
        (b"\x7fELF", "ELF"),
        (b"MZ", "PE/EXE/DLL"),
        (b"BM", "BMP"),
        (b"#!", "Shell Script"),
    ];
    TABLE
}

const SUSPICIOUS_BINARY_TYPES: &[&str] = &[
    "PE/EXE/DLL",
    "ELF",
    "Mach-O (32-bit)",
    "Mach-O (64-bit)",
];

/// Extensions whose content is always text/structured-text and so get no
/// magic check at all — only bookkeeping.
const SKIP_EXTENSIONS: &[&str] = &[
    "js", "ts", "mjs", "cjs", "map", "json", "md", "txt", "yml", "yaml", "xml", "css", "html",
    "htm", "svg", "lock", "d.ts",
];

const NATIVE_PATH_SEGMENTS: &[&str] = &["node_modules", "bin/", "native/", "prebuilds/"];

const DOUBLE_EXT_SUSPICIOUS: &[&str] = &[
    "exe", "dll", "so", "bat", "cmd", "ps1", "sh", "vbs", "js", "py", "rb", "pl",
];
const DOUBLE_EXT_BENIGN: &[&str] = &["png", "jpg", "gif", "txt", "doc", "pdf"];

fn expected_types(ext: &str) -> Option<&'static [&'static str]> {
    match ext {
        "png" => Some(&["PNG"]),
        "jpg" | "jpeg" => Some(&["JPEG"]),
        "gif" => Some(&["GIF"]),
        "bmp" => Some(&["BMP"]),
        "webp" => Some(&["WEBP/AVI/WAV"]),
        "ico" => Some(&["PNG", "BMP"]),
        "pdf" => Some(&["PDF"]),
        _ => None,
    }
}

fn identify_magic(prefix: &[u8]) -> Option<&'static str> {
    magic_signatures()
        .iter()
        .filter(|(sig, _)| prefix.starts_with(sig))
        .max_by_key(|(sig, _)| sig.len())
        .map(|(_, name)| *name)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForensicScanResult {
    pub files_scanned: usize,
    pub findings: Vec<Finding>,
    pub risk_score: f64,
}

pub struct ForensicChecker {
    read_cap_bytes: u64,
}

impl ForensicChecker {
    pub fn new(read_cap_bytes: u64) -> Self {
        Self { read_cap_bytes }
    }

    pub fn scan(&self, archive: &mut ArchiveReader) -> Result<ForensicScanResult, RulesError> {
        let mut result = ForensicScanResult::default();
        let mut findings = Vec::new();

        let names: Vec<String> = archive
            .entries()
            .iter()
            .filter(|e| !e.is_dir)
            .map(|e| e.name.clone())
            .collect();

        for name in names {
            result.files_scanned += 1;
            let ext = extension_of(&name);

            if double_extension_is_suspicious(&name) {
                findings.push(
                    Finding::new(
                        Severity::Medium,
                        "DOUBLE_EXTENSION",
                        format!("{name} has a suspicious double extension"),
                    )
                    .with_file(name.clone()),
                );
            }

            if SKIP_EXTENSIONS.contains(&ext.as_str()) {
                continue;
            }

            let prefix = match archive.read(&name, self.read_cap_bytes) {
                Ok(bytes) if bytes.len() >= 4 => bytes[..32.min(bytes.len())].to_vec(),
                _ => continue,
            };

            let detected = identify_magic(&prefix);
            let is_suspicious_binary = detected.is_some_and(|d| SUSPICIOUS_BINARY_TYPES.contains(&d));

            if is_suspicious_binary
                && !in_native_path(&name)
                && !matches!(ext.as_str(), "exe" | "dll" | "so" | "dylib")
            {
                // HIDDEN_EXECUTABLE and UNEXPECTED_BINARY/MAGIC_MISMATCH are
                // mutually exclusive per entry: once an entry is flagged as
                // a hidden executable, it cannot also be flagged for a
                // magic/type mismatch (the underlying Python source allows
                // both to fire independently; this checker enforces the
                // stricter invariant instead, see DESIGN.md).
                findings.push(
                    Finding::new(
                        Severity::Critical,
                        "HIDDEN_EXECUTABLE",
                        format!("{name} is a {} disguised as .{ext}", detected.unwrap()),
                    )
                    .with_file(name.clone()),
                );
                continue;
            }

            if let Some(expected) = expected_types(&ext) {
                if let Some(detected) = detected {
                    if !expected.contains(&detected) {
                        findings.push(
                            Finding::new(
                                Severity::High,
                                "MAGIC_MISMATCH",
                                format!("{name} has extension .{ext} but content looks like {detected}"),
                            )
                            .with_file(name.clone()),
                        );
                    }
                    continue;
                }
            }

            if is_suspicious_binary && !in_native_path(&name) {
                findings.push(
                    Finding::new(
                        Severity::High,
                        "UNEXPECTED_BINARY",
                        format!("{name} contains a {} binary outside native/bin paths", detected.unwrap()),
                    )
                    .with_file(name.clone()),
                );
            }
        }

        result.risk_score = weighted_risk(&findings);
        result.findings = findings;
        Ok(result)
    }
}

fn extension_of(name: &str) -> String {
    if name.ends_with(".d.ts") {
        return "d.ts".to_string();
    }
    name.rsplit('.').next().unwrap_or("").to_lowercase()
}

fn in_native_path(name: &str) -> bool {
    let lower = name.to_lowercase();
    NATIVE_PATH_SEGMENTS.iter().any(|seg| lower.contains(seg))
}

fn double_extension_is_suspicious(name: &str) -> bool {
    let base = name.rsplit('/').next().unwrap_or(name);
    let parts: Vec<&str> = base.split('.').collect();
    if parts.len() < 3 {
        return false;
    }
    let last = parts[parts.len() - 1].to_lowercase();
    let penultimate = parts[parts.len() - 2].to_lowercase();

    let penultimate_recognized =
        expected_types(&penultimate).is_some() || DOUBLE_EXT_BENIGN.contains(&penultimate.as_str());

    DOUBLE_EXT_SUSPICIOUS.contains(&last.as_str()) && penultimate_recognized
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
    fn detects_hidden_executable_disguised_as_png() {
        let mut elf_bytes = vec![0x7f, b'E', b'L', b'F'];
        elf_bytes.extend(vec![0u8; 28]);
        let mut archive = archive_with(&[("icon.png", &elf_bytes)]);
        let checker = ForensicChecker::new(2 * 1024 * 1024);
        let result = checker.scan(&mut archive).unwrap();
        assert!(result
            .findings
            .iter()
            .any(|f| f.category == "HIDDEN_EXECUTABLE" && f.severity == Severity::Critical));
    }

    #[test]
    fn hidden_executable_and_unexpected_binary_are_mutually_exclusive() {
        let mut elf_bytes = vec![0x7f, b'E', b'L', b'F'];
        elf_bytes.extend(vec![0u8; 28]);
        let mut archive = archive_with(&[("assets/icon.png", &elf_bytes)]);
        let checker = ForensicChecker::new(2 * 1024 * 1024);
        let result = checker.scan(&mut archive).unwrap();
        let on_same_file: Vec<_> = result
            .findings
            .iter()
            .filter(|f| f.file_path.as_deref() == Some("assets/icon.png"))
            .collect();
        assert_eq!(on_same_file.len(), 1);
        assert_eq!(on_same_file[0].category, "HIDDEN_EXECUTABLE");
    }

    #[test]
    fn native_module_binaries_are_not_flagged() {
        let mut elf_bytes = vec![0x7f, b'E', b'L', b'F'];
        elf_bytes.extend(vec![0u8; 28]);
        let mut archive = archive_with(&[(
            "extension/node_modules/foo/prebuilds/linux-x64/foo.node",
            &elf_bytes,
        )]);
        let checker = ForensicChecker::new(2 * 1024 * 1024);
        let result = checker.scan(&mut archive).unwrap();
        assert!(result.findings.is_empty());
    }

    #[test]
    fn double_extension_is_flagged() {
        let mut archive = archive_with(&[("invoice.pdf.exe", b"not really a pdf")]);
        let checker = ForensicChecker::new(2 * 1024 * 1024);
        let result = checker.scan(&mut archive).unwrap();
        assert!(result.findings.iter().any(|f| f.category == "DOUBLE_EXTENSION"));
    }

    #[test]
    fn magic_mismatch_for_wrong_image_content() {
        let mut jpeg_bytes = vec![0xff, 0xd8, 0xff];
        jpeg_bytes.extend(vec![0u8; 29]);
        let mut archive = archive_with(&[("icon.png", &jpeg_bytes)]);
        let checker = ForensicChecker::new(2 * 1024 * 1024);
        let result = checker.scan(&mut archive).unwrap();
        assert!(result.findings.iter().any(|f| f.category == "MAGIC_MISMATCH"));
    }
}
