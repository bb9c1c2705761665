// ============================================================
// Layer 5 — Gradient-Boosted Trees
// ============================================================
// A small histogram-based boosting engine for the tree variant
// of the trainer:
//
//   binning.rs — per-feature quantile cut points, values → u8 bins
//   tree.rs    — regression tree, depth-wise histogram grower
//   booster.rs — softmax objective over 10 classes, the boosting
//                loop with per-round evaluation, the serialisable
//                ensemble (the tree artifact)
//
// Reference: Chen & Guestrin (2016) XGBoost: A Scalable Tree
//            Boosting System, §2 and §3.3

pub mod binning;
pub mod tree;
pub mod booster;

pub use booster::{train, Booster, BoosterParams, RoundEval};
