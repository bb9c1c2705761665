// ============================================================
// Layer 4 — Stratified Train/Validation Split
// ============================================================
// Sources without a predefined split (the synthetic generator)
// carve out their validation partition here.
//
// The split is stratified: every class contributes
// round(count × train_fraction) samples to the train side, so
// both sides keep the class balance of the input. Each side is
// shuffled afterwards so classes are interleaved.
//
// The RNG is passed in; a fixed seed gives the same split.

use std::collections::BTreeMap;

use rand::{seq::SliceRandom, Rng};

/// Split `samples` into (train, validation), class by class.
///
/// `label_of` names the class of a sample.
pub fn stratified_split<T, K, F, R>(
    samples:        Vec<T>,
    label_of:       F,
    train_fraction: f64,
    rng:            &mut R,
) -> (Vec<T>, Vec<T>)
where
    K: Ord,
    F: Fn(&T) -> K,
    R: Rng + ?Sized,
{
    let mut by_class: BTreeMap<K, Vec<T>> = BTreeMap::new();
    for sample in samples {
        by_class.entry(label_of(&sample)).or_default().push(sample);
    }

    let mut train = Vec::new();
    let mut val   = Vec::new();
    for (_, mut members) in by_class {
        members.shuffle(rng);
        let keep = ((members.len() as f64) * train_fraction).round() as usize;
        let rest = members.split_off(keep.min(members.len()));
        train.extend(members);
        val.extend(rest);
    }
    train.shuffle(rng);
    val.shuffle(rng);

    tracing::debug!("Stratified split: {} train / {} validation", train.len(), val.len());
    (train, val)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn labelled(n: usize) -> Vec<(usize, u8)> {
        (0..n).map(|i| (i, (i % 10) as u8)).collect()
    }

    #[test]
    fn test_every_class_split_in_proportion() {
        let (train, val) = stratified_split(labelled(100), |s| s.1, 0.8, &mut StdRng::seed_from_u64(1));
        assert_eq!((train.len(), val.len()), (80, 20));
        for class in 0..10u8 {
            assert_eq!(val.iter().filter(|s| s.1 == class).count(), 2);
        }
    }

    #[test]
    fn test_nothing_lost_or_duplicated() {
        let (train, val) = stratified_split(labelled(57), |s| s.1, 0.7, &mut StdRng::seed_from_u64(2));
        let mut ids: Vec<usize> = train.into_iter().chain(val).map(|s| s.0).collect();
        ids.sort_unstable();
        assert_eq!(ids, (0..57).collect::<Vec<_>>());
    }

    #[test]
    fn test_seed_determines_split() {
        let a = stratified_split(labelled(30), |s| s.1, 0.5, &mut StdRng::seed_from_u64(9));
        let b = stratified_split(labelled(30), |s| s.1, 0.5, &mut StdRng::seed_from_u64(9));
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_input() {
        let (train, val) = stratified_split(Vec::<(usize, u8)>::new(), |s| s.1, 0.8, &mut StdRng::seed_from_u64(0));
        assert!(train.is_empty() && val.is_empty());
    }
}
