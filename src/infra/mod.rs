// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns shared by the stager and trainers:
//
//   checkpoint.rs      — everything written to the model
//                        directory: CNN weights (Burn
//                        NamedMpkFileRecorder), the tree
//                        ensemble JSON, train_config.json.
//                        Atomic writes, stale-artifact
//                        cleanup, checkpoint policy.
//
//   artifact_format.rs — adapters that derive extra artifact
//                        forms (gzip) from the canonical JSON
//
//   metrics.rs         — the single validation-accuracy line
//                        for the orchestrator, plus the
//                        per-epoch metrics CSV
//
//   object_store.rs    — filesystem-backed ObjectStore the
//                        stager publishes arrays to
//
// Reference: Rust Book §7 (Modules)
//            Burn Book §5 (Checkpointing)

/// Model artifact saving and loading
pub mod checkpoint;

/// Canonical-to-adapter artifact conversions
pub mod artifact_format;

/// Metric line and training history CSV
pub mod metrics;

/// Local filesystem object store
pub mod object_store;
