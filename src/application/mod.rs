// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Each use case coordinates the other layers for one command:
//
//   stage_use_case      — fetch a dataset, write .npy arrays,
//                         publish them to the object store
//   train_cnn_use_case  — one CNN training job
//   train_tree_use_case — one boosted-tree training job
//   inspect_use_case    — load an artifact and describe it
//
// Rules for this layer:
//   - No ML math or model code here
//   - No argument parsing (that's Layer 1)
//   - The only stdout output is what the orchestrator reads:
//     round lines and the metric line
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// Paths and hyperparameter resolution shared by both trainers
pub mod job;

pub mod stage_use_case;

pub mod train_cnn_use_case;

pub mod train_tree_use_case;

pub mod inspect_use_case;
