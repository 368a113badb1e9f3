use crate::detected_points::{DescriptorMatrix, DistanceMetric, Match};
use crate::error::{Error, Result};

/// Nearest neighbour index over descriptor blocks added in order.
///
/// Train rows are numbered globally across all added blocks, matching the
/// keypoint cloud's global indices.
pub trait DescriptorMatcher {
    fn add(&mut self, descriptors: &DescriptorMatrix) -> Result<()>;

    fn clear(&mut self);

    /// Best train row for every query row.
    fn match_descriptors(&self, query: &DescriptorMatrix) -> Result<Vec<Match>>;
}

/// Exhaustive search, ties resolved towards the lowest train index.
#[derive(Debug, Clone)]
pub struct BruteForceMatcher {
    metric: DistanceMetric,
    train: DescriptorMatrix,
}

impl BruteForceMatcher {
    pub fn new(metric: DistanceMetric) -> BruteForceMatcher {
        BruteForceMatcher {
            metric,
            train: DescriptorMatrix::default(),
        }
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    pub fn train_descriptors(&self) -> &DescriptorMatrix {
        &self.train
    }
}

impl DescriptorMatcher for BruteForceMatcher {
    fn add(&mut self, descriptors: &DescriptorMatrix) -> Result<()> {
        self.train.append(descriptors)
    }

    fn clear(&mut self) {
        self.train = DescriptorMatrix::default();
    }

    fn match_descriptors(&self, query: &DescriptorMatrix) -> Result<Vec<Match>> {
        if query.is_empty() || self.train.is_empty() {
            return Ok(Vec::new());
        }
        if query.cols() != self.train.cols() {
            return Err(Error::DimensionMismatch {
                context: "query descriptor width vs train",
                expected: self.train.cols(),
                actual: query.cols(),
            });
        }
        let matches = query
            .iter_rows()
            .enumerate()
            .map(|(query_idx, q)| {
                let mut best = Match {
                    query_idx,
                    cloud_idx: 0,
                    distance: f32::INFINITY,
                };
                for (cloud_idx, t) in self.train.iter_rows().enumerate() {
                    let distance = self.metric.distance(q, t);
                    if distance < best.distance {
                        best.cloud_idx = cloud_idx;
                        best.distance = distance;
                    }
                }
                best
            })
            .collect();
        Ok(matches)
    }
}
