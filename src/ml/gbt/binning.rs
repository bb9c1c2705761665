// ============================================================
// Histogram binning
// ============================================================
// Each feature gets a sorted list of cut points c_0 < c_1 < ...
// A value's bin is the number of cut points <= value, so
//
//   x < c_j   ⇔   bin(x) <= j
//
// and "split at cut j" sends bins 0..=j left. Features with at
// most `max_bin` distinct values get one cut per distinct value
// (above the minimum); wider features get quantile cuts.

/// Upper bound on bins per feature (bin indices fit in a u8).
pub const MAX_BINS: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub struct BinCuts {
    cuts:    Vec<Vec<f32>>,
    offsets: Vec<usize>,
}

impl BinCuts {
    /// Compute cut points for a row-major `[n_rows, n_features]` matrix.
    pub fn build(features: &[f32], n_features: usize, max_bin: usize) -> Self {
        let max_bin = max_bin.clamp(2, MAX_BINS);
        let n_rows  = if n_features == 0 { 0 } else { features.len() / n_features };

        let cuts: Vec<Vec<f32>> = (0..n_features)
            .map(|f| {
                let mut column: Vec<f32> = (0..n_rows)
                    .map(|r| features[r * n_features + f])
                    .filter(|v| v.is_finite())
                    .collect();
                column.sort_by(f32::total_cmp);
                feature_cuts(&column, max_bin)
            })
            .collect();

        let mut offsets = Vec::with_capacity(n_features + 1);
        let mut total   = 0;
        for c in &cuts {
            offsets.push(total);
            total += c.len() + 1;
        }
        offsets.push(total);

        Self { cuts, offsets }
    }

    pub fn n_features(&self) -> usize { self.cuts.len() }

    pub fn n_bins(&self, feature: usize) -> usize { self.cuts[feature].len() + 1 }

    /// Start of `feature`'s bins in a flat histogram.
    pub fn offset(&self, feature: usize) -> usize { self.offsets[feature] }

    /// Total bins over all features.
    pub fn total_bins(&self) -> usize { self.offsets[self.cuts.len()] }

    /// Threshold separating bins 0..=bin from the rest.
    pub fn threshold(&self, feature: usize, bin: usize) -> f32 { self.cuts[feature][bin] }

    pub fn bin_of(&self, feature: usize, value: f32) -> u8 {
        self.cuts[feature].partition_point(|&c| c <= value) as u8
    }

    /// Bin every value of a row-major matrix.
    pub fn bin_matrix(&self, features: &[f32]) -> Vec<u8> {
        let nf = self.n_features();
        features
            .iter()
            .enumerate()
            .map(|(i, &v)| self.bin_of(i % nf, v))
            .collect()
    }
}

fn feature_cuts(sorted: &[f32], max_bin: usize) -> Vec<f32> {
    let Some(&min) = sorted.first() else {
        return Vec::new();
    };

    let mut distinct = sorted.to_vec();
    distinct.dedup();

    let mut cuts: Vec<f32> = if distinct.len() <= max_bin {
        distinct
    } else {
        (1..max_bin)
            .map(|k| sorted[k * sorted.len() / max_bin])
            .collect()
    };
    cuts.dedup();
    cuts.retain(|&c| c > min);
    cuts
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_cuts_for_few_distinct_values() {
        // one feature, values 0, 0, 1, 2
        let cuts = BinCuts::build(&[0.0, 0.0, 1.0, 2.0], 1, 256);
        assert_eq!(cuts.n_bins(0), 3);
        assert_eq!(cuts.bin_of(0, 0.0), 0);
        assert_eq!(cuts.bin_of(0, 1.0), 1);
        assert_eq!(cuts.bin_of(0, 1.5), 1);
        assert_eq!(cuts.bin_of(0, 2.0), 2);
        // splitting at bin 0 means x < 1.0
        assert_eq!(cuts.threshold(0, 0), 1.0);
    }

    #[test]
    fn test_constant_feature_has_one_bin() {
        let cuts = BinCuts::build(&[3.0, 1.0, 3.0, 2.0], 2, 256);
        assert_eq!(cuts.n_bins(0), 1);
        assert_eq!(cuts.n_bins(1), 2);
        assert_eq!(cuts.offset(1), 1);
        assert_eq!(cuts.total_bins(), 3);
    }

    #[test]
    fn test_quantile_cuts_respect_bin_limit() {
        let values: Vec<f32> = (0..1000).map(|i| i as f32).collect();
        let cuts = BinCuts::build(&values, 1, 16);
        assert!(cuts.n_bins(0) <= 16);
        assert!(cuts.n_bins(0) > 8);
    }
}
