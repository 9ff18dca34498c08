use ndarray::{s, Array, Array1, Array2, Array3, ArrayView1, ArrayView2, Axis, Dimension};
use num_traits::Float;
use tracing::debug;

use crate::pmf::CanonicalPmf;
use crate::{Error, Result};

/// The distribution of `sample − blank`, produced by [`calibrate`].
///
/// Never mutated after creation; the network contract layer consumes it once
/// per estimation call.
#[derive(Clone, Debug, PartialEq)]
pub struct CalibratedPmf<E>(CanonicalPmf<E>);

impl<E> CalibratedPmf<E> {
    pub const fn as_canonical(&self) -> &CanonicalPmf<E> {
        &self.0
    }

    pub fn into_canonical(self) -> CanonicalPmf<E> {
        self.0
    }
}

/// Combine a sample and a blank distribution into the distribution of their
/// difference.
///
/// For independent discretised random variables $A$ (sample) and $B$ (blank)
/// the difference $C = A - B$ has mass
///
/// $$
///     P(C = c) = \sum_i P(A = i) \, P(B = i - c),
/// $$
///
/// which is the cross-correlation of the sample distribution with the blank
/// distribution, i.e. a convolution of the sample against the reflected
/// blank. The convolution runs with padding of `blank_len − 1` in each
/// dimension, derived from the blank alone; this asymmetric padding controls
/// how much of the tail of the difference distribution survives. Negative
/// entries produced by numerical noise are clamped to zero on the full
/// support, and the result is then truncated back to the sample's own
/// support.
///
/// # Errors
///
/// Returns an error if the ranks of sample and blank differ, if the blank
/// batch neither matches the sample batch nor holds a single reusable item,
/// or if either input has a zero-length feature axis.
pub fn calibrate<E: Float>(
    sample_pmf: &CanonicalPmf<E>,
    blank_pmf: &CanonicalPmf<E>,
) -> Result<CalibratedPmf<E>> {
    debug!(
        batch = sample_pmf.batch_len(),
        rank = sample_pmf.rank(),
        "calibrating sample distributions against blank"
    );
    match (sample_pmf, blank_pmf) {
        (CanonicalPmf::Vector(sample), CanonicalPmf::Vector(blank)) => {
            Ok(CalibratedPmf(CanonicalPmf::Vector(calibrate_vectors(
                sample, blank,
            )?)))
        }
        (CanonicalPmf::Planar(sample), CanonicalPmf::Planar(blank)) => {
            Ok(CalibratedPmf(CanonicalPmf::Planar(calibrate_planes(
                sample, blank,
            )?)))
        }
        (sample, blank) => Err(Error::RankMismatch {
            sample: sample.rank(),
            blank: blank.rank(),
        }),
    }
}

/// Clamp negative entries to zero.
///
/// Convolution by FFT-like backends can leave small negative artifacts in
/// what is mathematically a non-negative mass function. Applying this twice
/// yields the same result as applying it once.
pub fn rectify<E: Float, D: Dimension>(mut pmf: Array<E, D>) -> Array<E, D> {
    pmf.mapv_inplace(|weight| {
        if weight < E::zero() {
            E::zero()
        } else {
            weight
        }
    });
    pmf
}

fn calibrate_vectors<E: Float>(sample: &Array2<E>, blank: &Array2<E>) -> Result<Array2<E>> {
    check_batches(sample.nrows(), blank.nrows())?;
    let len = sample.ncols();
    if len == 0 || blank.ncols() == 0 {
        return Err(Error::EmptyDistribution);
    }

    let mut calibrated = Array2::zeros((sample.nrows(), len));
    for (index, item) in sample.outer_iter().enumerate() {
        let blank_item = blank.row(if blank.nrows() == 1 { 0 } else { index });
        let full = rectify(cross_correlate_vector(item, blank_item));
        calibrated.row_mut(index).assign(&full.slice(s![..len]));
    }
    Ok(calibrated)
}

fn calibrate_planes<E: Float>(sample: &Array3<E>, blank: &Array3<E>) -> Result<Array3<E>> {
    check_batches(sample.len_of(Axis(0)), blank.len_of(Axis(0)))?;
    let (rows, cols) = (sample.len_of(Axis(1)), sample.len_of(Axis(2)));
    if rows == 0 || cols == 0 || blank.len_of(Axis(1)) == 0 || blank.len_of(Axis(2)) == 0 {
        return Err(Error::EmptyDistribution);
    }

    let mut calibrated = Array3::zeros((sample.len_of(Axis(0)), rows, cols));
    for (index, item) in sample.outer_iter().enumerate() {
        let blank_item =
            blank.index_axis(Axis(0), if blank.len_of(Axis(0)) == 1 { 0 } else { index });
        let full = rectify(cross_correlate_plane(item, blank_item));
        calibrated
            .index_axis_mut(Axis(0), index)
            .assign(&full.slice(s![..rows, ..cols]));
    }
    Ok(calibrated)
}

fn check_batches(sample: usize, blank: usize) -> Result<()> {
    if blank == sample || blank == 1 {
        Ok(())
    } else {
        Err(Error::BatchMismatch { sample, blank })
    }
}

/// Full cross-correlation of two 1-D distributions.
///
/// Output index `t` holds the mass of the difference `t − (blank_len − 1)`,
/// so the support runs over `sample_len + blank_len − 1` entries.
fn cross_correlate_vector<E: Float>(sample: ArrayView1<E>, blank: ArrayView1<E>) -> Array1<E> {
    let sample_len = sample.len();
    let blank_len = blank.len();

    let mut full = Array1::zeros(sample_len + blank_len - 1);
    for (t, entry) in full.iter_mut().enumerate() {
        let mut mass = E::zero();
        for (j, &weight) in blank.iter().enumerate() {
            // the sample entry at offset t − (blank_len − 1) + j
            let shifted = t + j + 1;
            if shifted >= blank_len && shifted - blank_len < sample_len {
                mass = mass + sample[shifted - blank_len] * weight;
            }
        }
        *entry = mass;
    }
    full
}

/// Full cross-correlation of two 2-D distributions, applied independently
/// along the row and column axes.
fn cross_correlate_plane<E: Float>(sample: ArrayView2<E>, blank: ArrayView2<E>) -> Array2<E> {
    let (sample_rows, sample_cols) = sample.dim();
    let (blank_rows, blank_cols) = blank.dim();

    let mut full = Array2::zeros((sample_rows + blank_rows - 1, sample_cols + blank_cols - 1));
    for ((t, u), entry) in full.indexed_iter_mut() {
        let mut mass = E::zero();
        for ((j, k), &weight) in blank.indexed_iter() {
            let shifted_row = t + j + 1;
            let shifted_col = u + k + 1;
            if shifted_row >= blank_rows
                && shifted_row - blank_rows < sample_rows
                && shifted_col >= blank_cols
                && shifted_col - blank_cols < sample_cols
            {
                mass = mass
                    + sample[[shifted_row - blank_rows, shifted_col - blank_cols]] * weight;
            }
        }
        *entry = mass;
    }
    full
}
