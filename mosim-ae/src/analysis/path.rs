//! Warping path types for DTW alignment.

use serde::{Deserialize, Serialize};

/// One aligned pair: live frame `live` matched to reference frame `reference`.
///
/// Serialised as a two-element array `[live, reference]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(usize, usize)", into = "(usize, usize)")]
pub struct WarpingStep {
    pub live: usize,
    pub reference: usize,
}

impl From<(usize, usize)> for WarpingStep {
    fn from((live, reference): (usize, usize)) -> Self {
        Self { live, reference }
    }
}

impl From<WarpingStep> for (usize, usize) {
    fn from(step: WarpingStep) -> Self {
        (step.live, step.reference)
    }
}

/// Ordered steps from `(0, 0)` to `(n-1, m-1)`, non-decreasing in both indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WarpingPath(Vec<WarpingStep>);

impl WarpingPath {
    pub(crate) fn new(steps: Vec<WarpingStep>) -> Self {
        Self(steps)
    }

    #[must_use]
    pub fn steps(&self) -> &[WarpingStep] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Steps as `(live, reference)` tuples.
    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.0.iter().map(|s| (s.live, s.reference))
    }

    /// For each live index, the last reference index it aligns to.
    ///
    /// Every live index appears on a complete path, so the map has one entry
    /// per live frame.
    #[must_use]
    pub fn alignment_map(&self) -> Vec<usize> {
        let live_len = self.0.last().map(|s| s.live + 1).unwrap_or(0);
        let mut map = vec![0; live_len];
        for step in &self.0 {
            map[step.live] = step.reference;
        }
        map
    }
}

impl<'a> IntoIterator for &'a WarpingPath {
    type Item = &'a WarpingStep;
    type IntoIter = std::slice::Iter<'a, WarpingStep>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment_map_keeps_last_reference() {
        let path = WarpingPath::new(
            [(0, 0), (0, 1), (1, 2), (2, 2), (3, 3)]
                .into_iter()
                .map(WarpingStep::from)
                .collect(),
        );
        assert_eq!(path.alignment_map(), vec![1, 2, 2, 3]);
    }

    #[test]
    fn serialises_as_index_pairs() {
        let path = WarpingPath::new(vec![(0, 0).into(), (1, 0).into()]);
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, "[[0,0],[1,0]]");
        let back: WarpingPath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, path);
    }
}
