use ndarray::{Array2, Array3, ArrayD, Axis, Ix1, Ix2, Ix3};
use num_traits::Float;

use crate::{Error, Result};

/// A batch of probability mass functions in the canonical layout the
/// calibration engine expects.
///
/// Distributions are discretised over one or two feature axes. The batch axis
/// always leads; a lone distribution is a batch of one.
#[derive(Clone, Debug, PartialEq)]
pub enum CanonicalPmf<E> {
    /// One-dimensional distributions, `(batch, len)`.
    Vector(Array2<E>),
    /// Two-dimensional distributions, `(batch, rows, cols)`.
    Planar(Array3<E>),
}

impl<E> CanonicalPmf<E> {
    pub fn batch_len(&self) -> usize {
        match self {
            Self::Vector(pmf) => pmf.nrows(),
            Self::Planar(pmf) => pmf.len_of(Axis(0)),
        }
    }

    /// Rank of each distribution in the batch (the batch axis does not count).
    pub const fn rank(&self) -> usize {
        match self {
            Self::Vector(_) => 1,
            Self::Planar(_) => 2,
        }
    }

    /// Number of mass entries in a single distribution of the batch.
    pub fn item_len(&self) -> usize {
        match self {
            Self::Vector(pmf) => pmf.ncols(),
            Self::Planar(pmf) => pmf.len_of(Axis(1)) * pmf.len_of(Axis(2)),
        }
    }
}

/// Canonicalisation capability of a concrete estimation function.
///
/// The two backbone families disagree on where the batch axis sits in raw
/// input, so each supplies its own reshaping. The calibration engine and the
/// orchestrator depend only on this trait and on the canonical layout it
/// returns.
pub trait PmfLayout<E> {
    /// Validate a raw (sample, blank) pair and return it in canonical layout
    /// with every distribution normalised to unit mass.
    fn reshape_pmf_pair(
        &self,
        sample_pmf: &ArrayD<E>,
        blank_pmf: &ArrayD<E>,
    ) -> Result<(CanonicalPmf<E>, CanonicalPmf<E>)>;

    /// Validate an already-calibrated distribution and return it in canonical
    /// layout. The calibration engine owns the mass of its output, so no
    /// renormalisation happens here.
    fn reshape_calibrated_pmf(&self, calibrated_pmf: &ArrayD<E>) -> Result<CanonicalPmf<E>>;
}

/// Layout of the 1-D backbone family.
///
/// Rank-1 input is a single distribution; rank-2 input is a batch of
/// distributions, one per row.
#[derive(Clone, Copy, Debug, Default)]
pub struct VectorLayout;

/// Layout of the 2-D backbone family.
///
/// Rank-2 input is a single distribution; rank-3 input is a batch. Rank 3 is
/// a batch encoding only, never a distribution rank.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlanarLayout;

impl<E: Float> PmfLayout<E> for VectorLayout {
    fn reshape_pmf_pair(
        &self,
        sample_pmf: &ArrayD<E>,
        blank_pmf: &ArrayD<E>,
    ) -> Result<(CanonicalPmf<E>, CanonicalPmf<E>)> {
        let sample = normalise_rows(into_vector_batch(sample_pmf)?)?;
        let blank = normalise_rows(into_vector_batch(blank_pmf)?)?;
        Ok((CanonicalPmf::Vector(sample), CanonicalPmf::Vector(blank)))
    }

    fn reshape_calibrated_pmf(&self, calibrated_pmf: &ArrayD<E>) -> Result<CanonicalPmf<E>> {
        Ok(CanonicalPmf::Vector(into_vector_batch(calibrated_pmf)?))
    }
}

impl<E: Float> PmfLayout<E> for PlanarLayout {
    fn reshape_pmf_pair(
        &self,
        sample_pmf: &ArrayD<E>,
        blank_pmf: &ArrayD<E>,
    ) -> Result<(CanonicalPmf<E>, CanonicalPmf<E>)> {
        let sample = normalise_planes(into_planar_batch(sample_pmf)?)?;
        let blank = normalise_planes(into_planar_batch(blank_pmf)?)?;
        Ok((CanonicalPmf::Planar(sample), CanonicalPmf::Planar(blank)))
    }

    fn reshape_calibrated_pmf(&self, calibrated_pmf: &ArrayD<E>) -> Result<CanonicalPmf<E>> {
        Ok(CanonicalPmf::Planar(into_planar_batch(calibrated_pmf)?))
    }
}

fn into_vector_batch<E: Clone>(raw: &ArrayD<E>) -> Result<Array2<E>> {
    match raw.ndim() {
        1 => Ok(raw
            .to_owned()
            .into_dimensionality::<Ix1>()
            .expect("rank checked above")
            .insert_axis(Axis(0))),
        2 => Ok(raw
            .to_owned()
            .into_dimensionality::<Ix2>()
            .expect("rank checked above")),
        rank => Err(Error::UnsupportedRank { rank }),
    }
}

fn into_planar_batch<E: Clone>(raw: &ArrayD<E>) -> Result<Array3<E>> {
    match raw.ndim() {
        2 => Ok(raw
            .to_owned()
            .into_dimensionality::<Ix2>()
            .expect("rank checked above")
            .insert_axis(Axis(0))),
        3 => Ok(raw
            .to_owned()
            .into_dimensionality::<Ix3>()
            .expect("rank checked above")),
        rank => Err(Error::UnsupportedRank { rank }),
    }
}

fn normalise_rows<E: Float>(mut batch: Array2<E>) -> Result<Array2<E>> {
    for mut row in batch.rows_mut() {
        let mass = row.sum();
        if mass <= E::zero() {
            return Err(Error::EmptyDistribution);
        }
        row.mapv_inplace(|weight| weight / mass);
    }
    Ok(batch)
}

fn normalise_planes<E: Float>(mut batch: Array3<E>) -> Result<Array3<E>> {
    for mut plane in batch.outer_iter_mut() {
        let mass = plane.sum();
        if mass <= E::zero() {
            return Err(Error::EmptyDistribution);
        }
        plane.mapv_inplace(|weight| weight / mass);
    }
    Ok(batch)
}
