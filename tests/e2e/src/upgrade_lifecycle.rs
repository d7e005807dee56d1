//! E2E Test: Upgrade Lifecycle
//!
//! Runs the full suite over two chains and verifies the upgrade protocol:
//! - Upgrade height scheduled from the current height and voting period
//! - Proposal submitted and funded by the first validator, voted by all
//! - Every validator of every chain halted before any container is swapped
//! - Relaunched validators run the upgraded image as root
//! - Chains resume and carry post-upgrade traffic
//! - A chain that runs past the halt height aborts the run

use {
    assert_matches::assert_matches,
    ledger_e2e_orchestrator::{
        config::{CHAIN_A_ID, CHAIN_B_ID},
        error::E2eError,
    },
    ledger_e2e_tests::helpers::*,
};

/// Health read, then current height for the proposal, then three reads at
/// the halt height, then one past it after the swap.
fn script_upgrade(env: &TestEnv, chain_id: &str, target: u64) {
    let resumed = target.saturating_add(1);
    env.client.script_heights(
        &validator_name(chain_id, 0),
        &[10, 100, target, target, target, resumed],
    );
    for index in 1..3 {
        env.client.script_heights(
            &validator_name(chain_id, index),
            &[10, target, target, target, resumed],
        );
    }
}

fn position(calls: &[RuntimeCall], wanted: &RuntimeCall) -> usize {
    calls
        .iter()
        .position(|call| call == wanted)
        .unwrap_or_else(|| panic!("{wanted:?} never happened"))
}

// ─────────────────────────────────────────────────────────────────────────────
// Test: full run
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_full_upgrade_across_two_chains() {
    init_logging();
    println!("\n========================================");
    println!("  UPGRADE LIFECYCLE: 2 chains, v2");
    println!("========================================\n");

    let env = TestEnv::new();
    script_upgrade(&env, CHAIN_A_ID, 134);
    script_upgrade(&env, CHAIN_B_ID, 133);
    let mut suite = env.suite();
    suite.setup().await.unwrap();

    // Step 1: heights scheduled from current height 100.
    let ctx = suite.context();
    assert_eq!(ctx.chain(CHAIN_A_ID).unwrap().proposal_height(), Some(134));
    assert_eq!(ctx.chain(CHAIN_B_ID).unwrap().proposal_height(), Some(133));
    println!("✓ Upgrade heights: chain A 134 (voting 19), chain B 133 (voting 18)");

    // Step 2: governance commands.
    let calls = env.client.calls();
    let proposals: Vec<_> = calls
        .iter()
        .filter_map(|call| match call {
            ClientCall::SubmitProposal {
                chain_id,
                node,
                height,
                name,
            } => Some((chain_id.as_str(), node.clone(), *height, name.as_str())),
            _ => None,
        })
        .collect();
    assert_eq!(
        proposals,
        vec![
            (CHAIN_A_ID, validator_name(CHAIN_A_ID, 0), 134, "v2"),
            (CHAIN_B_ID, validator_name(CHAIN_B_ID, 0), 133, "v2"),
        ]
    );
    for chain_id in [CHAIN_A_ID, CHAIN_B_ID] {
        assert!(calls.contains(&ClientCall::Deposit {
            chain_id: chain_id.to_string(),
            node: validator_name(chain_id, 0),
            deposit: "10000000uledger".to_string(),
        }));
        let voters: Vec<_> = calls
            .iter()
            .filter_map(|call| match call {
                ClientCall::Vote { chain_id: id, node } if id == chain_id => Some(node.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(
            voters,
            (0..3)
                .map(|index| validator_name(chain_id, index))
                .collect::<Vec<_>>()
        );
    }
    println!("✓ Proposal submitted and funded by validator 0, voted by all 3 live validators");

    // Step 3: every validator removed before any relaunch.
    let runtime_calls = env.runtime.calls();
    let last_remove = [CHAIN_A_ID, CHAIN_B_ID]
        .iter()
        .flat_map(|chain_id| (0..3).map(move |index| validator_name(chain_id, index)))
        .map(|name| position(&runtime_calls, &RuntimeCall::Remove { name, force: true }))
        .max()
        .unwrap();
    let relaunches: Vec<usize> = runtime_calls
        .iter()
        .enumerate()
        .filter(|(_, call)| matches!(call, RuntimeCall::Run(name) if name.contains("-val-")))
        .map(|(index, _)| index)
        .skip(6)
        .collect();
    assert_eq!(relaunches.len(), 6);
    assert!(relaunches.iter().all(|index| *index > last_remove));
    assert!(!runtime_calls.contains(&RuntimeCall::Run(validator_name(CHAIN_A_ID, 3))));
    println!("✓ All 6 validators force-removed before the first relaunch");

    // Step 4: relaunched validators on the upgraded image.
    for chain_id in [CHAIN_A_ID, CHAIN_B_ID] {
        for index in 0..3 {
            let spec = env.runtime.spec_of(&validator_name(chain_id, index)).unwrap();
            assert_eq!(spec.image.reference(), "ledger-e2e:debug");
            assert_eq!(spec.user.as_deref(), Some("root:root"));
            assert_eq!(spec.port_bindings.is_empty(), index != 0);
        }
    }
    assert_eq!(
        suite.context().registry().live_count(CHAIN_A_ID).unwrap(),
        3
    );
    println!("✓ Relaunched validators run ledger-e2e:debug as root with the same ports");

    // Step 5: post-upgrade traffic.
    let pools: Vec<_> = calls
        .iter()
        .filter_map(|call| match call {
            ClientCall::CreatePool { pool_file, .. } => Some(pool_file.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(
        pools,
        vec!["pool1A.json", "pool1B.json", "pool2A.json", "pool2B.json"]
    );
    let transfers = calls
        .iter()
        .filter(|call| matches!(call, ClientCall::Transfer { .. }))
        .count();
    assert_eq!(transfers, 8);
    println!("✓ Transfers and pools repeated after the upgrade");

    let report = suite.teardown().await;
    assert!(report.is_clean(), "{:?}", report.failures);
    assert!(env.runtime.running().is_empty());
    assert_eq!(env.runtime.network_count(), 0);
    println!("✓ Teardown clean");
}

#[tokio::test(start_paused = true)]
async fn test_previous_release_images_before_upgrade() {
    init_logging();
    let env = TestEnv::new();
    script_upgrade(&env, CHAIN_A_ID, 134);
    script_upgrade(&env, CHAIN_B_ID, 133);
    let mut suite = env.suite();
    suite.setup().await.unwrap();

    let first_launches: Vec<_> = env
        .runtime
        .specs()
        .into_iter()
        .filter(|spec| spec.name.contains("-val-"))
        .take(6)
        .collect();
    assert_eq!(first_launches.len(), 6);
    for spec in &first_launches {
        assert_eq!(spec.image.reference(), "ledgerlabs/ledger-dev:v1.0.0-debug");
        assert_eq!(spec.user, None);
    }
    let init = env.runtime.spec_of(CHAIN_A_ID).unwrap();
    assert_eq!(
        init.image.reference(),
        "ledgerlabs/ledger-e2e-init-chain:v1.0.0"
    );
    println!("✓ Chains start from the previous release");

    suite.teardown().await;
}

// ─────────────────────────────────────────────────────────────────────────────
// Test: overshoot
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_validator_past_halt_height_aborts_run() {
    init_logging();
    let env = TestEnv::new();
    script_upgrade(&env, CHAIN_A_ID, 134);
    script_upgrade(&env, CHAIN_B_ID, 133);
    env.client
        .script_heights(&validator_name(CHAIN_A_ID, 0), &[10, 100, 134, 135]);
    let mut suite = env.suite();

    let result = suite.run().await;
    assert_matches!(
        result,
        Err(E2eError::HaltOvershoot { observed: 135, expected: 134, ref container, .. })
            if *container == validator_name(CHAIN_A_ID, 0)
    );
    assert!(!env
        .runtime
        .calls()
        .iter()
        .any(|call| matches!(call, RuntimeCall::Remove { .. })));
    assert!(env.runtime.running().is_empty());
    assert_eq!(env.runtime.network_count(), 0);
    println!("✓ Overshoot aborts before any container swap; teardown still ran");
}

#[tokio::test(start_paused = true)]
async fn test_height_dip_resets_halt_confirmations() {
    init_logging();
    let env = TestEnv::new();
    script_upgrade(&env, CHAIN_A_ID, 134);
    script_upgrade(&env, CHAIN_B_ID, 133);
    env.client.script_heights(
        &validator_name(CHAIN_A_ID, 1),
        &[10, 134, 134, 133, 134, 134, 134, 135],
    );
    let mut suite = env.suite();
    suite.setup().await.unwrap();

    // Health read, six halt reads, one resume read.
    assert_eq!(env.client.status_calls(&validator_name(CHAIN_A_ID, 1)), 8);
    println!("✓ A lower reading restarted the confirmation count");

    suite.teardown().await;
}
