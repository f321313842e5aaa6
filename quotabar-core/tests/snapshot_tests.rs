//! Integration tests for core snapshot types.

use quotabar_core::{ProviderKind, QuotaStatus, QuotaType, UsageQuota, UsageSnapshot};

#[test]
fn test_snapshot_serialization_roundtrip() {
    let quota = UsageQuota::new(ProviderKind::Codex, QuotaType::Weekly, 41.0)
        .unwrap()
        .with_reset_description("Resets in 2d 3h");
    let snapshot = UsageSnapshot::new(ProviderKind::Codex, vec![quota]).unwrap();

    let json = serde_json::to_string(&snapshot).unwrap();
    let parsed: UsageSnapshot = serde_json::from_str(&json).unwrap();

    assert_eq!(parsed, snapshot);
    assert_eq!(parsed.status(), QuotaStatus::Warning);
}

#[test]
fn test_deserialize_empty_snapshot_rejected() {
    let json = r#"{"provider":"gemini","quotas":[],"captured_at":"2026-01-01T00:00:00Z"}"#;
    assert!(serde_json::from_str::<UsageSnapshot>(json).is_err());
}

#[test]
fn test_every_quota_in_range() {
    let quotas = [0.0, 12.5, 50.0, 100.0]
        .into_iter()
        .map(|pct| UsageQuota::new(ProviderKind::Claude, QuotaType::Session, pct).unwrap())
        .collect();
    let snapshot = UsageSnapshot::new(ProviderKind::Claude, quotas).unwrap();

    assert!(snapshot
        .quotas()
        .iter()
        .all(|q| (0.0..=100.0).contains(&q.percent_remaining())));
    assert_eq!(snapshot.status(), QuotaStatus::Depleted);
}
