use chrono::{Duration, Utc};
use onecode_license::{ActivationCache, CachedActivation, DEFAULT_OFFLINE_GRACE_DAYS};
use onecode_types::{LicenseCode, MachineId};

fn entry(machine: &str, verified_days_ago: i64) -> CachedActivation {
    let now = Utc::now();
    CachedActivation {
        code: LicenseCode::parse("A1B2C3D4E5").unwrap(),
        machine_id: MachineId::parse(machine).unwrap(),
        activated_at: Some(now - Duration::days(30)),
        verified_at: now - Duration::days(verified_days_ago),
    }
}

fn grace() -> Duration {
    Duration::days(DEFAULT_OFFLINE_GRACE_DAYS)
}

#[test]
fn missing_file_loads_as_none() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ActivationCache::at(dir.path().join("activation.json"));
    assert!(cache.load().unwrap().is_none());
    cache.clear().unwrap();
}

#[test]
fn save_load_and_clear() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ActivationCache::at(dir.path().join("deep").join("activation.json"));
    let saved = entry("HW-1", 0);
    cache.save(&saved).unwrap();
    assert_eq!(cache.load().unwrap(), Some(saved));

    cache.clear().unwrap();
    assert!(cache.load().unwrap().is_none());
}

#[test]
fn offline_validation_requires_matching_machine() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ActivationCache::at(dir.path().join("activation.json"));
    cache.save(&entry("HW-1", 1)).unwrap();

    let mine = MachineId::parse("HW-1").unwrap();
    let other = MachineId::parse("HW-2").unwrap();
    assert!(cache.validate_offline(&mine, grace(), Utc::now()).unwrap().is_some());
    assert!(cache.validate_offline(&other, grace(), Utc::now()).unwrap().is_none());
}

#[test]
fn offline_validation_expires_after_grace() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ActivationCache::at(dir.path().join("activation.json"));
    cache.save(&entry("HW-1", DEFAULT_OFFLINE_GRACE_DAYS + 1)).unwrap();

    let mine = MachineId::parse("HW-1").unwrap();
    assert!(cache.validate_offline(&mine, grace(), Utc::now()).unwrap().is_none());
}

#[test]
fn corrupt_cache_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("activation.json");
    std::fs::write(&path, b"{not json").unwrap();
    assert!(ActivationCache::at(path).load().is_err());
}
