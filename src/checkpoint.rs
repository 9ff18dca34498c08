use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2};
use num_traits::Float;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::network::{ContinuousNetwork, IntervalNetwork, LinearReadout, Network, NetworkMeta};
use crate::{Error, Result};

pub const CONTINUOUS_KIND: &str = "continuous";
pub const INTERVAL_KIND: &str = "interval";

/// On-disk form of a trained network.
///
/// Only the logical fields the estimation core requires: the kind tag, the
/// creation timestamp, the expected output range, the division count for
/// interval networks, and the trained readout parameters. The interval table
/// itself is never persisted; it is rebuilt deterministically from
/// `num_divisions` and `expected_range` on load.
#[derive(Debug, Deserialize, Serialize)]
pub struct Checkpoint<E> {
    pub kind: String,
    pub created: DateTime<Utc>,
    pub expected_range: (E, E),
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_divisions: Option<u32>,
    pub weights: Vec<Vec<E>>,
    pub bias: Vec<E>,
}

impl<E: Float + DeserializeOwned + Send + Sync + 'static> Checkpoint<E> {
    /// Read a checkpoint document from disk.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or does not parse.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&raw)?)
    }

    /// Rebuild the trained network this checkpoint describes.
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedNetworkKind`] for a kind tag outside the
    /// closed taxonomy, [`Error::MissingField`] if an interval checkpoint
    /// omits its division count, and propagates parameter shape failures.
    pub fn into_network(self) -> Result<Network<E>> {
        let backbone = Box::new(self.readout()?);
        let meta = NetworkMeta::from_parts(self.created, self.expected_range);
        match self.kind.as_str() {
            CONTINUOUS_KIND => Ok(Network::Continuous(ContinuousNetwork::from_parts(
                meta, backbone,
            ))),
            INTERVAL_KIND => {
                let num_divisions = self.num_divisions.ok_or(Error::MissingField {
                    field: "num_divisions",
                })?;
                Ok(Network::Interval(IntervalNetwork::from_parts(
                    meta,
                    num_divisions,
                    backbone,
                )?))
            }
            _ => Err(Error::UnsupportedNetworkKind { kind: self.kind }),
        }
    }

    fn readout(&self) -> Result<LinearReadout<E>> {
        let rows = self.weights.len();
        let cols = self.weights.first().map_or(0, Vec::len);
        let mut weights = Array2::zeros((rows, cols));
        for (row_index, row) in self.weights.iter().enumerate() {
            if row.len() != cols {
                return Err(Error::ShapeMismatch {
                    expected: cols,
                    got: row.len(),
                });
            }
            for (col_index, &weight) in row.iter().enumerate() {
                weights[[row_index, col_index]] = weight;
            }
        }
        LinearReadout::new(weights, Array1::from_vec(self.bias.clone()))
    }
}

impl<E: Serialize> Checkpoint<E> {
    /// Write the checkpoint document to disk.
    ///
    /// # Errors
    /// Returns an error if encoding or writing fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        let raw = toml::to_string(self)?;
        fs::write(path, raw).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
