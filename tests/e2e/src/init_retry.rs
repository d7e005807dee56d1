//! E2E Test: Chain Initialization Retries
//!
//! Verifies the metadata poll of the init container:
//! - A file that appears late is picked up on the next attempt
//! - A file that never appears exhausts the attempt budget
//! - A timed-out init container is still released by teardown

use {
    assert_matches::assert_matches,
    ledger_e2e_orchestrator::{
        chain::default_chain_a_validators,
        config::{CHAIN_A_ID, INIT_METADATA_ATTEMPTS},
        error::E2eError,
        initializer::configure_chain,
    },
    ledger_e2e_tests::helpers::*,
    std::time::Duration,
    tokio::time::Instant,
};

#[tokio::test(start_paused = true)]
async fn test_metadata_found_on_fifth_attempt() {
    init_logging();
    println!("\n========================================");
    println!("  INIT RETRY: metadata written after 3.5s");
    println!("========================================\n");

    let env = TestEnv::with_switches(true, true);
    env.runtime
        .set_init_behavior(InitBehavior::WriteAfter(Duration::from_millis(3_500)));
    let mut suite = env.suite();
    let ctx = suite.context_mut();
    ctx.create_network("init-retry-testnet").await.unwrap();

    let start = Instant::now();
    configure_chain(ctx, CHAIN_A_ID, &default_chain_a_validators())
        .await
        .unwrap();

    // Misses at 0s, 1s, 2s and 3s; the file lands at 3.5s; hit at 4s.
    assert_eq!(start.elapsed(), Duration::from_secs(4));
    println!("✓ Metadata read on attempt 5 after {:?}", start.elapsed());

    let chain = ctx.chain(CHAIN_A_ID).unwrap();
    assert_eq!(chain.validators().len(), 4);
    assert_eq!(chain.voting_period().blocks(), 19);
    assert_eq!(chain.validator(0).unwrap().name, validator_name(CHAIN_A_ID, 0));
    assert_eq!(ctx.one_shot_count(), 0);
    assert_eq!(env.runtime.purge_count(CHAIN_A_ID), 1);
    println!("✓ Chain spec merged and init container purged");

    let init = env.runtime.spec_of(CHAIN_A_ID).unwrap();
    assert_eq!(init.user.as_deref(), Some("root:root"));
    assert!(init
        .cmd
        .iter()
        .any(|arg| arg == "--voting-period=19s"));
    let data_dir = chain.data_dir().display().to_string();
    assert_eq!(init.mounts, vec![format!("{data_dir}:{data_dir}")]);
    assert!(chain
        .data_dir()
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("ledger-e2e-testnet-"));
    println!("✓ Init container ran as root with the data dir mounted in place");

    suite.teardown().await;
}

#[tokio::test(start_paused = true)]
async fn test_metadata_never_written_times_out() {
    init_logging();
    let env = TestEnv::with_switches(true, true);
    env.runtime.set_init_behavior(InitBehavior::Never);
    let mut suite = env.suite();

    let start = Instant::now();
    let result = suite.setup().await;
    assert_matches!(
        result,
        Err(E2eError::Timeout { attempts, .. }) if attempts == INIT_METADATA_ATTEMPTS
    );
    assert_eq!(start.elapsed(), Duration::from_secs(59));
    assert_eq!(suite.context().one_shot_count(), 1);
    println!("✓ 60 attempts exhausted, init container still tracked");

    let report = suite.teardown().await;
    assert!(report.is_clean());
    assert_eq!(env.runtime.purge_count(CHAIN_A_ID), 1);
    assert!(env.runtime.running().is_empty());
    assert!(env
        .runtime
        .calls()
        .iter()
        .all(|call| !matches!(call, RuntimeCall::Run(name) if name.contains("-val-"))));
    println!("✓ Teardown released the init container; no validator was started");
}
