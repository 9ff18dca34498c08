use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2, ArrayView1};
use num_traits::Float;

use crate::partition::{partition, Interval};
use crate::pmf::CanonicalPmf;
use crate::{Error, Result};

/// The opaque trained function block behind an estimation function.
///
/// A backbone maps a canonical calibrated PMF batch to one activation row
/// per item, `(batch, out_features)`. The internal architecture is not this
/// crate's concern; vision backbones of any depth slot in behind this
/// contract.
pub trait Backbone<E>: Send + Sync {
    /// # Errors
    /// Returns an error if the input does not match the feature count the
    /// backbone was trained for.
    fn forward(&self, calibrated_pmf: &CanonicalPmf<E>) -> Result<Array2<E>>;
}

/// An affine readout over the flattened distribution.
///
/// The reference backbone: `activations = weights · flatten(pmf) + bias` per
/// item. Enough to exercise every contract of the estimation layer.
pub struct LinearReadout<E> {
    weights: Array2<E>,
    bias: Array1<E>,
}

impl<E: Float> LinearReadout<E> {
    /// # Errors
    /// Returns an error if the weight matrix and bias disagree on the number
    /// of output features.
    pub fn new(weights: Array2<E>, bias: Array1<E>) -> Result<Self> {
        if weights.nrows() != bias.len() {
            return Err(Error::ShapeMismatch {
                expected: weights.nrows(),
                got: bias.len(),
            });
        }
        Ok(Self { weights, bias })
    }

    pub const fn weights(&self) -> &Array2<E> {
        &self.weights
    }

    pub const fn bias(&self) -> &Array1<E> {
        &self.bias
    }
}

impl<E: Float + Send + Sync + 'static> Backbone<E> for LinearReadout<E> {
    fn forward(&self, calibrated_pmf: &CanonicalPmf<E>) -> Result<Array2<E>> {
        if calibrated_pmf.item_len() != self.weights.ncols() {
            return Err(Error::ShapeMismatch {
                expected: self.weights.ncols(),
                got: calibrated_pmf.item_len(),
            });
        }

        let batch_len = calibrated_pmf.batch_len();
        let mut activations = Array2::zeros((batch_len, self.bias.len()));
        for index in 0..batch_len {
            let features: Array1<E> = match calibrated_pmf {
                CanonicalPmf::Vector(pmf) => pmf.row(index).to_owned(),
                CanonicalPmf::Planar(pmf) => {
                    pmf.index_axis(ndarray::Axis(0), index).iter().copied().collect()
                }
            };
            for (feature, weights) in self.weights.outer_iter().enumerate() {
                activations[[index, feature]] = weights.dot(&features) + self.bias[feature];
            }
        }
        Ok(activations)
    }
}

/// Metadata every trained network carries.
#[derive(Clone, Copy, Debug)]
pub struct NetworkMeta<E> {
    created: DateTime<Utc>,
    expected_range: (E, E),
}

impl<E: Copy> NetworkMeta<E> {
    pub fn new(expected_range: (E, E)) -> Self {
        Self {
            created: Utc::now(),
            expected_range,
        }
    }

    pub(crate) const fn from_parts(created: DateTime<Utc>, expected_range: (E, E)) -> Self {
        Self {
            created,
            expected_range,
        }
    }

    pub const fn created(&self) -> DateTime<Utc> {
        self.created
    }

    pub const fn expected_range(&self) -> (E, E) {
        self.expected_range
    }
}

/// A network predicting a continuous analyte value.
///
/// The backbone emits `(value, auxiliary)` per item; prediction keeps the
/// value channel and discards the auxiliary one.
pub struct ContinuousNetwork<E> {
    meta: NetworkMeta<E>,
    backbone: Box<dyn Backbone<E>>,
}

impl<E: Float> ContinuousNetwork<E> {
    pub fn new(expected_range: (E, E), backbone: Box<dyn Backbone<E>>) -> Self {
        Self {
            meta: NetworkMeta::new(expected_range),
            backbone,
        }
    }

    pub(crate) fn from_parts(meta: NetworkMeta<E>, backbone: Box<dyn Backbone<E>>) -> Self {
        Self { meta, backbone }
    }

    pub const fn meta(&self) -> &NetworkMeta<E> {
        &self.meta
    }

    pub(crate) fn values(&self, calibrated_pmf: &CanonicalPmf<E>) -> Result<Array1<E>> {
        let activations = self.backbone.forward(calibrated_pmf)?;
        if activations.ncols() != 2 {
            return Err(Error::ShapeMismatch {
                expected: 2,
                got: activations.ncols(),
            });
        }
        Ok(activations.column(0).to_owned())
    }
}

/// A network predicting a discretised interval.
///
/// The backbone emits one logit per interval; prediction selects, per item,
/// the interval at the lowest index among the maximal logits. The interval
/// table is built once at construction and never mutated.
pub struct IntervalNetwork<E> {
    meta: NetworkMeta<E>,
    num_divisions: u32,
    intervals: Vec<Interval<E>>,
    backbone: Box<dyn Backbone<E>>,
}

impl<E: Float> IntervalNetwork<E> {
    /// # Errors
    /// Returns an error if the partition of the expected range degenerates.
    pub fn new(
        expected_range: (E, E),
        num_divisions: u32,
        backbone: Box<dyn Backbone<E>>,
    ) -> Result<Self> {
        Self::from_parts(NetworkMeta::new(expected_range), num_divisions, backbone)
    }

    pub(crate) fn from_parts(
        meta: NetworkMeta<E>,
        num_divisions: u32,
        backbone: Box<dyn Backbone<E>>,
    ) -> Result<Self> {
        let intervals = partition(meta.expected_range(), num_divisions)?;
        Ok(Self {
            meta,
            num_divisions,
            intervals,
            backbone,
        })
    }

    pub const fn meta(&self) -> &NetworkMeta<E> {
        &self.meta
    }

    pub const fn num_divisions(&self) -> u32 {
        self.num_divisions
    }

    pub fn intervals(&self) -> &[Interval<E>] {
        &self.intervals
    }

    pub(crate) fn select(&self, calibrated_pmf: &CanonicalPmf<E>) -> Result<Vec<Interval<E>>> {
        let logits = self.backbone.forward(calibrated_pmf)?;
        if logits.ncols() != self.intervals.len() {
            return Err(Error::ShapeMismatch {
                expected: self.intervals.len(),
                got: logits.ncols(),
            });
        }
        Ok(logits
            .outer_iter()
            .map(|item| self.intervals[argmax(item)])
            .collect())
    }
}

/// The closed taxonomy of trained networks.
///
/// There is no registration mechanism; a checkpoint naming any other kind is
/// rejected at the loading boundary.
pub enum Network<E> {
    Continuous(ContinuousNetwork<E>),
    Interval(IntervalNetwork<E>),
}

impl<E: Float> Network<E> {
    pub const fn meta(&self) -> &NetworkMeta<E> {
        match self {
            Self::Continuous(net) => net.meta(),
            Self::Interval(net) => net.meta(),
        }
    }

    /// Kind and creation timestamp, `Kind-YYYY.MM.DD-HH:MM:SS`.
    pub fn version(&self) -> String {
        let kind = match self {
            Self::Continuous(_) => "ContinuousNetwork",
            Self::Interval(_) => "IntervalNetwork",
        };
        format!("{kind}-{}", self.meta().created().format("%Y.%m.%d-%H:%M:%S"))
    }
}

/// Index of the first maximal entry.
fn argmax<E: Float>(logits: ArrayView1<E>) -> usize {
    let mut best = 0;
    let mut best_logit = logits[0];
    for (index, &logit) in logits.iter().enumerate().skip(1) {
        if logit > best_logit {
            best = index;
            best_logit = logit;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use ndarray::{arr1, arr2, Array1, Array2};
    use ndarray_rand::rand::{Rng, SeedableRng};
    use ndarray_rand::rand_distr::Uniform;
    use ndarray_rand::RandomExt;
    use rand_isaac::Isaac64Rng;

    use super::{argmax, Backbone, ContinuousNetwork, IntervalNetwork, LinearReadout};
    use crate::pmf::CanonicalPmf;
    use crate::Error;

    #[test]
    fn readout_computes_the_affine_map_per_item() {
        let readout = LinearReadout::new(
            arr2(&[[1.0, 0.0, 0.0], [1.0, 1.0, 1.0]]),
            arr1(&[0.0, 10.0]),
        )
        .unwrap();

        let batch = CanonicalPmf::Vector(arr2(&[[0.25, 0.5, 0.25], [1.0, 2.0, 3.0]]));
        let activations = readout.forward(&batch).unwrap();

        approx::assert_relative_eq!(activations[[0, 0]], 0.25);
        approx::assert_relative_eq!(activations[[0, 1]], 11.0);
        approx::assert_relative_eq!(activations[[1, 0]], 1.0);
        approx::assert_relative_eq!(activations[[1, 1]], 16.0);
    }

    #[test]
    fn readout_rejects_distributions_of_the_wrong_width() {
        let readout =
            LinearReadout::new(Array2::from_elem((2, 3), 1.0), Array1::zeros(2)).unwrap();
        let batch = CanonicalPmf::Vector(Array2::from_elem((1, 4), 0.25));
        assert!(matches!(
            readout.forward(&batch),
            Err(Error::ShapeMismatch {
                expected: 3,
                got: 4
            })
        ));
    }

    #[test]
    fn mismatched_weight_and_bias_shapes_are_rejected_at_construction() {
        assert!(matches!(
            LinearReadout::new(Array2::<f64>::zeros((3, 4)), Array1::zeros(2)),
            Err(Error::ShapeMismatch {
                expected: 3,
                got: 2
            })
        ));
    }

    #[test]
    fn continuous_prediction_keeps_the_value_channel_only() {
        let seed = 40;
        let mut rng = Isaac64Rng::seed_from_u64(seed);
        let value: f64 = rng.gen();
        let auxiliary: f64 = rng.gen();

        let backbone =
            LinearReadout::new(Array2::zeros((2, 3)), arr1(&[value, auxiliary])).unwrap();
        let net = ContinuousNetwork::new((0.0, 1.0), Box::new(backbone));

        let values = net
            .values(&CanonicalPmf::Vector(Array2::from_elem((1, 3), 0.2)))
            .unwrap();
        assert_eq!(values, arr1(&[value]));
    }

    #[test]
    fn interval_prediction_selects_the_interval_with_the_maximal_logit() {
        // constant logits through a zero weight matrix, peak at index 2
        let backbone = LinearReadout::new(
            Array2::zeros((3, 4)),
            arr1(&[0.0, 1.0, 2.0]),
        )
        .unwrap();
        let net = IntervalNetwork::new((10.0, 100.0), 0, Box::new(backbone)).unwrap();

        let selected = net
            .select(&CanonicalPmf::Vector(Array2::from_elem((2, 4), 0.25)))
            .unwrap();
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0], net.intervals()[2]);
        assert_eq!(selected[1], net.intervals()[2]);
    }

    #[test]
    fn tied_logits_select_the_lowest_index() {
        let logits = arr1(&[1.0, 3.0, 3.0, 2.0]);
        assert_eq!(argmax(logits.view()), 1);

        let all_equal = Array1::from_elem(5, 0.5);
        assert_eq!(argmax(all_equal.view()), 0);
    }

    #[test]
    fn a_degenerate_expected_range_fails_at_network_construction() {
        let backbone = LinearReadout::new(Array2::<f64>::zeros((3, 4)), Array1::zeros(3)).unwrap();
        assert!(matches!(
            IntervalNetwork::new((10.0, 10.0), 0, Box::new(backbone)),
            Err(Error::DegenerateRange { .. })
        ));
    }

    #[test]
    fn logits_must_cover_every_interval() {
        let seed = 40;
        let mut rng = Isaac64Rng::seed_from_u64(seed);
        // two logits for a three-interval table
        let backbone = LinearReadout::new(
            Array2::random_using((2, 4), Uniform::new(0.0, 1.0), &mut rng),
            Array1::zeros(2),
        )
        .unwrap();
        let net = IntervalNetwork::new((10.0, 100.0), 0, Box::new(backbone)).unwrap();

        assert!(matches!(
            net.select(&CanonicalPmf::Vector(Array2::from_elem((1, 4), 0.25))),
            Err(Error::ShapeMismatch {
                expected: 3,
                got: 2
            })
        ));
    }
}
