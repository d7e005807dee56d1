//! E2E Test: Basic Network Bring-up
//!
//! Verifies the base setup phases:
//! - Network creation and naming
//! - Chain initialization through the init container
//! - Validator start honouring the auto-start annotation (N−K live handles)
//! - Host ports published only on the first validator, shifted per chain
//! - An IBC-only run opens the channel and issues no traffic
//! - Health polling, including transient status failures
//! - Configuration errors raised before any runtime call

use {
    assert_matches::assert_matches,
    ledger_e2e_orchestrator::{
        config::{CHAIN_A_ID, CHAIN_B_ID},
        error::E2eError,
        validator::start_validator,
    },
    ledger_e2e_tests::helpers::*,
};

// ─────────────────────────────────────────────────────────────────────────────
// Test: single chain, one validator deferred
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_single_chain_registry_holds_auto_started_validators() {
    init_logging();
    println!("\n========================================");
    println!("  BASIC NETWORK: 1 chain, 4 validators");
    println!("========================================\n");

    let env = TestEnv::with_switches(true, true);
    let mut suite = env.suite();
    suite.setup().await.unwrap();

    // Step 1: network and init container.
    let calls = env.runtime.calls();
    assert_eq!(
        calls[0],
        RuntimeCall::CreateNetwork("ledger-test-a-testnet".to_string())
    );
    assert!(calls.contains(&RuntimeCall::Purge(CHAIN_A_ID.to_string())));
    assert_eq!(suite.context().one_shot_count(), 0);
    println!("✓ Network created and init container purged after metadata was read");

    // Step 2: N−K live handles, index aligned.
    let registry = suite.context().registry();
    assert_eq!(registry.slot_count(CHAIN_A_ID).unwrap(), 4);
    assert_eq!(registry.live_count(CHAIN_A_ID).unwrap(), 3);
    for index in 0..3 {
        assert_eq!(
            registry.get(CHAIN_A_ID, index).unwrap().name,
            validator_name(CHAIN_A_ID, index)
        );
    }
    assert_matches!(
        registry.get(CHAIN_A_ID, 3),
        Err(E2eError::MissingContainer { index: 3, .. })
    );
    assert!(env.runtime.spec_of(&validator_name(CHAIN_A_ID, 3)).is_none());
    println!("✓ 3 of 4 validators running, deferred validator untouched");

    // Step 3: only validator 0 is reachable from the host.
    let val0 = env.runtime.spec_of(&validator_name(CHAIN_A_ID, 0)).unwrap();
    assert_eq!(val0.port_bindings.len(), 10);
    assert_eq!(val0.port_bindings.get(&26657), Some(&26657));
    assert_eq!(val0.cmd, vec!["start".to_string()]);
    for index in 1..3 {
        let spec = env
            .runtime
            .spec_of(&validator_name(CHAIN_A_ID, index))
            .unwrap();
        assert!(spec.port_bindings.is_empty());
    }
    println!("✓ Host ports published on validator 0 only");

    // Step 4: every started validator was polled for health.
    for index in 0..3 {
        assert!(env.client.status_calls(&validator_name(CHAIN_A_ID, index)) >= 1);
    }
    println!("✓ Every started validator health-checked");

    // Step 5: the deferred validator can be started on demand.
    start_validator(suite.context_mut(), CHAIN_A_ID, 3)
        .await
        .unwrap();
    assert_eq!(
        suite.context().registry().live_count(CHAIN_A_ID).unwrap(),
        4
    );
    println!("✓ Deferred validator started on demand");

    let report = suite.teardown().await;
    assert!(report.is_clean(), "{:?}", report.failures);
    assert!(env.runtime.running().is_empty());
    assert_eq!(env.runtime.network_count(), 0);
    println!("✓ Teardown released every container and the network");
}

// ─────────────────────────────────────────────────────────────────────────────
// Test: two chains without upgrade
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_two_chains_without_upgrade_issue_no_traffic() {
    init_logging();
    println!("\n========================================");
    println!("  BASIC NETWORK: 2 chains + relayer");
    println!("========================================\n");

    let env = TestEnv::with_switches(true, false);
    let mut suite = env.suite();
    suite.setup().await.unwrap();

    assert_eq!(
        env.runtime.calls()[0],
        RuntimeCall::CreateNetwork("ledger-test-a-ledger-test-b-testnet".to_string())
    );

    let registry = suite.context().registry();
    assert_eq!(registry.live_count(CHAIN_A_ID).unwrap(), 3);
    assert_eq!(registry.live_count(CHAIN_B_ID).unwrap(), 3);
    println!("✓ Chain A runs 3/4 validators, chain B runs 3/3");

    let b0 = env.runtime.spec_of(&validator_name(CHAIN_B_ID, 0)).unwrap();
    assert_eq!(b0.port_bindings.get(&26657), Some(&26667));
    assert_eq!(b0.port_bindings.get(&9090), Some(&9100));
    println!("✓ Chain B host ports shifted by 10");

    let calls = env.client.calls();
    assert!(calls
        .iter()
        .any(|call| matches!(call, ClientCall::CreateChannel { .. })));
    assert!(!calls.iter().any(|call| matches!(
        call,
        ClientCall::Transfer { .. } | ClientCall::CreatePool { .. } | ClientCall::SubmitProposal { .. }
    )));
    println!("✓ Channel opened; no transfers, pools or proposals without the upgrade");

    suite.teardown().await;
}

// ─────────────────────────────────────────────────────────────────────────────
// Test: health polling
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_transient_status_failures_are_retried() {
    init_logging();
    let env = TestEnv::with_switches(true, true);
    env.client.fail_status(&validator_name(CHAIN_A_ID, 1), 3);
    env.client
        .script_heights(&validator_name(CHAIN_A_ID, 2), &[1, 2, 3]);

    let mut suite = env.suite();
    suite.setup().await.unwrap();

    assert_eq!(env.client.status_calls(&validator_name(CHAIN_A_ID, 1)), 4);
    assert_eq!(env.client.status_calls(&validator_name(CHAIN_A_ID, 2)), 3);
    println!("✓ Failed and too-young status reads retried until healthy");
    suite.teardown().await;
}

#[tokio::test(start_paused = true)]
async fn test_validator_stuck_catching_up_times_out() {
    init_logging();
    let env = TestEnv::with_switches(true, true);
    env.client
        .set_catching_up(&validator_name(CHAIN_A_ID, 1), true);

    let mut suite = env.suite();
    let result = suite.run().await;
    assert_matches!(result, Err(E2eError::Timeout { .. }));
    assert!(env.runtime.running().is_empty());
    assert_eq!(env.runtime.network_count(), 0);
    println!("✓ Health timeout is fatal and teardown still ran");
}

// ─────────────────────────────────────────────────────────────────────────────
// Test: configuration errors
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_skip_ibc_without_skip_upgrade_makes_no_runtime_calls() {
    init_logging();
    let env = TestEnv::with_switches(false, true);
    let mut suite = env.suite();

    let result = suite.run().await;
    assert_matches!(result, Err(E2eError::Configuration(_)));
    assert!(env.runtime.calls().is_empty());
    assert!(env.client.calls().is_empty());
    println!("✓ Invalid switches rejected before any resource was created");
}
