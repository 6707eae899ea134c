use triage_core::ScanState;

#[test]
fn forward_transitions_are_legal() {
    assert!(ScanState::Queued.can_transition_to(ScanState::Downloading));
    assert!(ScanState::Downloading.can_transition_to(ScanState::StaticScanning));
    assert!(ScanState::StaticScanning.can_transition_to(ScanState::StaticScanned));
    assert!(ScanState::StaticScanning.can_transition_to(ScanState::Heavyweight));
    assert!(ScanState::Heavyweight.can_transition_to(ScanState::StaticScanned));
    assert!(ScanState::StaticScanned.can_transition_to(ScanState::Clean));
    assert!(ScanState::StaticScanned.can_transition_to(ScanState::Flagged));
}

#[test]
fn any_state_may_reset_to_queued() {
    for state in [
        ScanState::Downloading,
        ScanState::StaticScanning,
        ScanState::StaticScanned,
        ScanState::Heavyweight,
        ScanState::Clean,
        ScanState::Flagged,
    ] {
        assert!(state.can_transition_to(ScanState::Queued));
    }
}

#[test]
fn backward_non_reset_transitions_are_illegal() {
    assert!(!ScanState::Clean.can_transition_to(ScanState::StaticScanning));
    assert!(!ScanState::Flagged.can_transition_to(ScanState::Downloading));
    assert!(!ScanState::StaticScanned.can_transition_to(ScanState::Downloading));
}

#[test]
fn latest_state_bucket_derivation() {
    assert_eq!(ScanState::Clean.latest_state().to_string(), "clean");
    assert_eq!(ScanState::Flagged.latest_state().to_string(), "flagged");
    assert_eq!(ScanState::StaticScanning.latest_state().to_string(), "scanning");
    assert_eq!(ScanState::Queued.latest_state().to_string(), "pending");
}
