// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types and traits that describe the training job
// contract independently of any ML framework or storage.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O or network calls
//   - Only plain Rust structs, enums, traits and error types
//
//   split.rs       — a named dataset partition (features + labels)
//   hyperparams.rs — hyperparameter values, declared ranges and
//                    the layered resolution used by both trainers
//   error.rs       — typed errors (configuration, data, artifact)
//   traits.rs      — seams implemented by the outer layers
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// Named train/validation partitions and their invariants
pub mod split;

// Hyperparameter sets, search ranges and hard domains
pub mod hyperparams;

// Error taxonomy shared by every layer
pub mod error;

// Core abstractions (traits) that other layers implement
pub mod traits;
