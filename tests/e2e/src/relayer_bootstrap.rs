//! E2E Test: Relayer Bootstrap
//!
//! Verifies relayer bring-up between two chains:
//! - Container wiring (name, env, scratch mount, REST port)
//! - Readiness polling of the `/state` document
//! - Channel creation only after the relayer has loaded both chains
//! - A missing bootstrap script fails before any resource is created

use {
    assert_matches::assert_matches,
    ledger_e2e_orchestrator::{
        config::{CHAIN_A_ID, CHAIN_B_ID},
        error::E2eError,
        relayer::relayer_name,
    },
    ledger_e2e_tests::helpers::*,
    std::{fs, path::PathBuf, time::Duration},
    tokio::time::Instant,
};

fn relayer() -> String {
    relayer_name(CHAIN_A_ID, CHAIN_B_ID)
}

// ─────────────────────────────────────────────────────────────────────────────
// Test: readiness gate
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_channel_created_after_relayer_loads_both_chains() {
    init_logging();
    println!("\n========================================");
    println!("  RELAYER: ready on third /state read");
    println!("========================================\n");

    let env = TestEnv::with_switches(true, false);
    env.client.script_relayer_states(vec![
        relayer_state_one_chain(),
        relayer_state_one_chain(),
        relayer_state_ready(),
    ]);
    let mut suite = env.suite();
    suite.setup().await.unwrap();

    let calls = env.client.calls();
    let queries: Vec<usize> = calls
        .iter()
        .enumerate()
        .filter(|(_, call)| matches!(call, ClientCall::QueryJson(_)))
        .map(|(position, _)| position)
        .collect();
    assert_eq!(queries.len(), 3);
    assert_eq!(
        calls[queries[0]],
        ClientCall::QueryJson("http://localhost:3031/state".to_string())
    );
    println!("✓ /state polled until both chains were listed");

    let channel = calls
        .iter()
        .position(|call| matches!(call, ClientCall::CreateChannel { .. }))
        .unwrap();
    assert!(channel > queries[2]);
    assert_eq!(
        calls[channel],
        ClientCall::CreateChannel {
            relayer: relayer(),
            chain_a: CHAIN_A_ID.to_string(),
            chain_b: CHAIN_B_ID.to_string(),
        }
    );
    println!("✓ Channel created after readiness, between chain A and chain B");

    suite.teardown().await;
}

#[tokio::test(start_paused = true)]
async fn test_relayer_settles_before_channel_creation() {
    init_logging();
    let mut env = TestEnv::with_switches(true, false);
    env.config.relayer_settle = Duration::from_secs(30);
    let mut suite = env.suite();

    let start = Instant::now();
    suite.setup().await.unwrap();
    assert!(start.elapsed() >= Duration::from_secs(30));
    assert_eq!(suite.context().relayers().len(), 1);
    println!("✓ Settle delay of 30s observed before the channel was opened");

    suite.teardown().await;
}

// ─────────────────────────────────────────────────────────────────────────────
// Test: container wiring
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_relayer_container_wiring() {
    init_logging();
    let env = TestEnv::with_switches(true, false);
    let mut suite = env.suite();
    suite.setup().await.unwrap();

    let spec = env.runtime.spec_of(&relayer()).unwrap();
    assert_eq!(spec.image.reference(), "informalsystems/hermes:1.10.0");
    assert_eq!(spec.user.as_deref(), Some("root:root"));
    assert_eq!(spec.port_bindings.get(&3031), Some(&3031));
    for expected in [
        "CHAIN_A_E2E_CHAIN_ID=ledger-test-a".to_string(),
        "CHAIN_B_E2E_CHAIN_ID=ledger-test-b".to_string(),
        "CHAIN_A_E2E_VAL_MNEMONIC=ledger-test-a mnemonic 0".to_string(),
        "CHAIN_B_E2E_VAL_MNEMONIC=ledger-test-b mnemonic 0".to_string(),
        format!("CHAIN_A_E2E_VAL_HOST={}", validator_name(CHAIN_A_ID, 0)),
        format!("CHAIN_B_E2E_VAL_HOST={}", validator_name(CHAIN_B_ID, 0)),
    ] {
        assert!(spec.env.contains(&expected), "missing {expected}");
    }
    println!("✓ Relayer env carries both chain ids, mnemonics and hosts");

    assert_eq!(spec.mounts.len(), 1);
    let (host, container) = spec.mounts[0].split_once(':').unwrap();
    assert_eq!(container, "/root/hermes");
    let host = PathBuf::from(host.trim_end_matches('/'));
    assert!(host.ends_with("hermes"));
    assert_eq!(
        fs::read_to_string(host.join("hermes_bootstrap.sh")).unwrap(),
        "#!/bin/sh\nexec hermes start\n"
    );
    let entrypoint = spec.entrypoint.clone().unwrap();
    assert_eq!(entrypoint[..2], ["sh".to_string(), "-c".to_string()]);
    assert!(entrypoint[2].contains("/root/hermes/hermes_bootstrap.sh"));
    println!("✓ Bootstrap script copied into the mounted scratch directory");

    let report = suite.teardown().await;
    assert!(report.is_clean(), "{:?}", report.failures);
    assert!(report.purged.contains(&relayer()));
    assert!(!host.exists());
    println!("✓ Relayer container and scratch directory released");
}

// ─────────────────────────────────────────────────────────────────────────────
// Test: failures
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_missing_bootstrap_script_is_a_configuration_error() {
    init_logging();
    let env = TestEnv::with_switches(true, false);
    fs::remove_file(env.scripts_dir().join("hermes_bootstrap.sh")).unwrap();
    let mut suite = env.suite();

    let result = suite.run().await;
    assert_matches!(result, Err(E2eError::Configuration(msg)) if msg.contains("hermes_bootstrap.sh"));
    assert!(env.runtime.calls().is_empty());
    assert!(env.client.calls().is_empty());
    println!("✓ Missing bootstrap script rejected before any resource was created");
}

#[tokio::test(start_paused = true)]
async fn test_relayer_never_ready_times_out() {
    init_logging();
    let env = TestEnv::with_switches(true, false);
    env.client
        .script_relayer_states(vec![relayer_state_one_chain()]);
    let mut suite = env.suite();

    let result = suite.run().await;
    assert_matches!(result, Err(E2eError::Timeout { .. }));
    assert!(!env
        .client
        .calls()
        .iter()
        .any(|call| matches!(call, ClientCall::CreateChannel { .. })));
    assert_eq!(env.runtime.purge_count(&relayer()), 1);
    assert!(env.runtime.running().is_empty());
    println!("✓ Relayer timeout is fatal and the relayer is still purged");
}
