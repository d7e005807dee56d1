//! Ledger End-to-End Test Suite
//!
//! Drives the orchestrator through complete suite runs (network, chain
//! initialization, validators, relayer, upgrade, teardown) against an
//! in-memory container runtime and chain client, with tokio's clock paused
//! so every poll is deterministic.
//!
//! Each test file can be run independently:
//!
//! ```bash
//! cargo test -p ledger-e2e-tests --test basic_network -- --nocapture
//! cargo test -p ledger-e2e-tests --test init_retry -- --nocapture
//! cargo test -p ledger-e2e-tests --test relayer_bootstrap -- --nocapture
//! cargo test -p ledger-e2e-tests --test upgrade_lifecycle -- --nocapture
//! cargo test -p ledger-e2e-tests --test teardown -- --nocapture
//! ```
