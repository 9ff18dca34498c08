use std::path::PathBuf;

use ndarray::{Array1, ArrayD};
use num_traits::Float;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::calibrate::calibrate;
use crate::checkpoint::Checkpoint;
use crate::network::Network;
use crate::partition::Interval;
use crate::pmf::PmfLayout;
use crate::{Error, Result};

/// The outcome of an estimation call.
#[derive(Clone, Debug, PartialEq)]
pub enum Estimate<E> {
    /// A lone continuous prediction, squeezed out of a batch of one.
    Value(E),
    /// Continuous predictions, one per batch item.
    Values(Array1<E>),
    /// Interval predictions, one per batch item.
    Intervals(Vec<Interval<E>>),
}

/// Input of an estimation call.
///
/// Exactly one input mode must be supplied: either the raw
/// (`sample_pmf`, `blank_pmf`) pair, which is calibrated internally, or an
/// already-calibrated `calibrated_pmf`, which skips the calibration engine.
#[derive(Clone, Debug, Default)]
pub struct Request<E> {
    pub sample_pmf: Option<ArrayD<E>>,
    pub blank_pmf: Option<ArrayD<E>>,
    pub calibrated_pmf: Option<ArrayD<E>>,
}

impl<E> Request<E> {
    pub fn from_pair(sample_pmf: ArrayD<E>, blank_pmf: ArrayD<E>) -> Self {
        Self {
            sample_pmf: Some(sample_pmf),
            blank_pmf: Some(blank_pmf),
            calibrated_pmf: None,
        }
    }

    pub fn from_calibrated(calibrated_pmf: ArrayD<E>) -> Self {
        Self {
            sample_pmf: None,
            blank_pmf: None,
            calibrated_pmf: Some(calibrated_pmf),
        }
    }
}

fn check_mutually_exclusive(
    first: (&'static str, bool),
    second: (&'static str, bool),
) -> Result<()> {
    if first.1 == second.1 {
        return Err(Error::ExclusiveOptions {
            first: first.0,
            second: second.0,
        });
    }
    Ok(())
}

/// An estimation function: one trained network behind one input layout.
///
/// Immutable after construction. Shared references may serve arbitrarily many
/// concurrent callers; every call is an independent, stateless computation
/// over the trained parameters.
pub struct Estimator<E, L> {
    net: Network<E>,
    layout: L,
}

impl<E, L> Estimator<E, L> {
    pub const fn network(&self) -> &Network<E> {
        &self.net
    }
}

impl<E: Float + 'static, L: PmfLayout<E>> Estimator<E, L> {
    /// Estimate an analyte concentration.
    ///
    /// The raw-pair path reshapes, calibrates and predicts. The
    /// pre-calibrated path reshapes and predicts. On the raw-pair path a
    /// continuous prediction for a batch of one squeezes to a lone
    /// [`Estimate::Value`]; the pre-calibrated path always keeps the batch
    /// axis, as its callers batch explicitly.
    ///
    /// # Errors
    ///
    /// Fails before any tensor work unless exactly one input mode is
    /// supplied, and propagates any reshaping, calibration or prediction
    /// failure.
    pub fn estimate(&self, request: &Request<E>) -> Result<Estimate<E>> {
        check_mutually_exclusive(
            ("blank_pmf", request.blank_pmf.is_some()),
            ("calibrated_pmf", request.calibrated_pmf.is_some()),
        )?;
        check_mutually_exclusive(
            ("sample_pmf", request.sample_pmf.is_some()),
            ("calibrated_pmf", request.calibrated_pmf.is_some()),
        )?;

        if let (Some(sample_pmf), Some(blank_pmf)) = (&request.sample_pmf, &request.blank_pmf) {
            debug!("estimating from a raw (sample, blank) pair");
            let (sample_pmf, blank_pmf) = self.layout.reshape_pmf_pair(sample_pmf, blank_pmf)?;
            let calibrated_pmf = calibrate(&sample_pmf, &blank_pmf)?;
            match &self.net {
                Network::Continuous(net) => {
                    let values = net.values(calibrated_pmf.as_canonical())?;
                    if values.len() == 1 {
                        Ok(Estimate::Value(values[0]))
                    } else {
                        Ok(Estimate::Values(values))
                    }
                }
                Network::Interval(net) => {
                    Ok(Estimate::Intervals(net.select(calibrated_pmf.as_canonical())?))
                }
            }
        } else if let Some(calibrated_pmf) = &request.calibrated_pmf {
            debug!("estimating from a pre-calibrated distribution");
            let calibrated_pmf = self.layout.reshape_calibrated_pmf(calibrated_pmf)?;
            match &self.net {
                Network::Continuous(net) => Ok(Estimate::Values(net.values(&calibrated_pmf)?)),
                Network::Interval(net) => Ok(Estimate::Intervals(net.select(&calibrated_pmf)?)),
            }
        } else {
            // a half-supplied pair passes neither input mode
            Err(Error::ExclusiveOptions {
                first: "sample_pmf",
                second: "calibrated_pmf",
            })
        }
    }
}

/// Builder for [`Estimator`].
///
/// Exactly one network source must be supplied: a checkpoint path to load
/// from, or an existing [`Network`] instance.
pub struct EstimatorBuilder<E, L> {
    layout: L,
    checkpoint: Option<PathBuf>,
    net: Option<Network<E>>,
}

impl<E, L> EstimatorBuilder<E, L> {
    pub const fn new(layout: L) -> Self {
        Self {
            layout,
            checkpoint: None,
            net: None,
        }
    }

    pub fn with_checkpoint(mut self, path: impl Into<PathBuf>) -> Self {
        self.checkpoint = Some(path.into());
        self
    }

    pub fn with_network(mut self, net: Network<E>) -> Self {
        self.net = Some(net);
        self
    }
}

impl<E: Float + DeserializeOwned + Send + Sync + 'static, L: PmfLayout<E>> EstimatorBuilder<E, L> {
    /// # Errors
    ///
    /// Fails unless exactly one network source was supplied, and propagates
    /// checkpoint loading failures.
    pub fn build(self) -> Result<Estimator<E, L>> {
        let net = match (self.checkpoint, self.net) {
            (Some(path), None) => Checkpoint::load(&path)?.into_network()?,
            (None, Some(net)) => net,
            _ => {
                return Err(Error::ExclusiveOptions {
                    first: "checkpoint",
                    second: "net",
                })
            }
        };
        Ok(Estimator {
            net,
            layout: self.layout,
        })
    }
}
