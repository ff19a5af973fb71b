//! Compatibility resolution and caching engine
//!
//! This module answers, for a chosen target platform: is this package (or
//! API) compatible, incompatible, deprecated, or unknown — and which
//! versions would resolve an incompatibility.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │   Checkers   │────▶│   Resolver   │────▶│   Decision   │
//! │  (sources)   │     │   (dedup)    │     │  (verdicts)  │
//! └──────────────┘     └──────────────┘     └──────────────┘
//!                             │                     │
//!                             ▼                     ▼
//!                      ┌──────────────┐     ┌──────────────┐
//!                      │ Orchestrator │◀───▶│    Cache     │
//!                      │   (batches)  │     │ (write-once) │
//!                      └──────────────┘     └──────────────┘
//! ```
//!
//! # Modules
//!
//! - [`cache`]: Write-once result cache with flat-file snapshots
//! - [`checker`]: Source checker trait for resolving identities against one data source
//! - [`checkers`]: Concrete checkers (SDK enumeration, registry store, fallback catalogue)
//! - [`decision`]: Verdict computation and upgrade selection
//! - [`error`]: Error types for fetching, resolution, and caching
//! - [`fetch`]: Shared HTTP client and gzip JSON decoding
//! - [`orchestrator`]: Batch-level state machine tying everything together
//! - [`recommendation`]: Namespace-keyed replacement guidance lookup
//! - [`resolver`]: Deduplicating resolver over the ranked checker chain
//! - [`retry`]: Bounded exponential backoff with jitter
//! - [`semver`]: Version algebra over raw version strings
//! - [`types`]: Common types like `PackageIdentity` and `Verdict`

pub mod cache;
pub mod checker;
pub mod checkers;
pub mod decision;
pub mod error;
pub mod fetch;
pub mod orchestrator;
pub mod recommendation;
pub mod resolver;
pub mod retry;
pub mod semver;
pub mod types;
