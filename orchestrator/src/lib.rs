//! Ledger end-to-end orchestrator
//!
//! Brings up containerized test chains, wires them together through a
//! relayer, pushes them through a governance-driven binary upgrade and
//! checks that they keep producing blocks and relaying afterwards.
//!
//! - **Chain setup**: an init container writes genesis and node configs for
//!   every validator; validators are then started from those configs on one
//!   shared network and polled until healthy.
//! - **IBC**: one relayer per chain pair, polled until it has loaded both
//!   chains, then a `transfer` channel between them.
//! - **Upgrade**: a software-upgrade proposal is passed on every chain, each
//!   validator is watched until it halts at the scheduled height, its
//!   container is swapped for the upgraded image, and the chain must resume.
//! - **Teardown**: everything the run created is purged on every exit path,
//!   unless cleanup is skipped.
//!
//! ## Architecture
//!
//! ```text
//!  Suite ── SetupPlan (phases from SuiteConfig)
//!    │
//!    ▼
//!  SuiteContext ── network, ClusterRegistry, relayers, scratch dirs
//!    │
//!    ├── initializer ─┐
//!    ├── validator    │
//!    ├── relayer      ├── poll_until (bounded waits)
//!    ├── upgrade      │
//!    └── driver ──────┘
//!    │
//!    ▼
//!  ContainerRuntime (Docker)     ChainClient (exec + HTTP)
//! ```
//!
//! ## Crate modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`]      | `SuiteConfig`, environment switches, images, constants |
//! | [`chain`]       | Validator configs, chain metadata, voting period math |
//! | [`runtime`]     | `ContainerRuntime` trait and the Docker implementation |
//! | [`client`]      | `ChainClient` trait and the exec-based implementation |
//! | [`registry`]    | Index-aligned validator container slots per chain |
//! | [`context`]     | Suite-owned state and teardown |
//! | [`poll`]        | Bounded polling primitive |
//! | [`initializer`] | One-shot init container and metadata parsing |
//! | [`validator`]   | Validator start, relaunch and health polling |
//! | [`relayer`]     | Relayer bootstrap and channel creation |
//! | [`upgrade`]     | Upgrade proposal, halt detection, container swap |
//! | [`driver`]      | Cross-chain transfers and pool creation |
//! | [`suite`]       | Phase composition and the top-level run |
//! | [`error`]       | Crate-wide error enum |

pub mod chain;
pub mod client;
pub mod config;
pub mod context;
pub mod driver;
pub mod error;
pub mod initializer;
pub mod poll;
pub mod registry;
pub mod relayer;
pub mod runtime;
pub mod suite;
pub mod upgrade;
pub mod validator;

pub use {
    config::SuiteConfig,
    error::{E2eError, Result},
    suite::Suite,
};
