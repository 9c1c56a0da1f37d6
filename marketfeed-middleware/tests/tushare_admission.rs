use marketfeed_middleware::{PermissionProbe, TushareAdmission};

#[test]
fn a_free_tier_gate_recovers_admission_after_the_window_rolls_over() {
    let gate = TushareAdmission::tushare_free_tier();
    gate.record_probe(PermissionProbe::Denied);

    assert!(gate.admit());
    gate.record_call();
    assert!(gate.admit());
    gate.record_call();
    assert!(!gate.admit(), "two calls already spent this hour");
}

#[test]
fn rotation_tick_skips_tushare_without_consuming_budget_when_not_admitted() {
    let gate = TushareAdmission::tushare_free_tier();
    gate.record_probe(PermissionProbe::Denied);
    gate.record_call();
    gate.record_call();

    // Simulate several rotation ticks landing on tushare while exhausted;
    // none should be able to record a call.
    for _ in 0..3 {
        assert!(!gate.admit());
    }
}
