use std::fs;
use std::path::Path;

use ndarray::Array1;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::estimator::Request;
use crate::{Error, Result};

#[derive(Deserialize)]
struct Row<E>(E, E, E);

/// A recorded (sample, blank) distribution pair over a shared bin axis.
pub struct RecordedPair<E> {
    pub bins: Array1<E>,
    pub sample_pmf: Array1<E>,
    pub blank_pmf: Array1<E>,
}

impl<E: DeserializeOwned> RecordedPair<E> {
    /// Create a `RecordedPair` from an on-disk representation.
    ///
    /// Rows are `(bin, sample mass, blank mass)` with a header line.
    ///
    /// # Errors
    /// Returns an error if the file is missing, unreadable or has malformed
    /// rows.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::MissingFile {
                path: path.to_path_buf(),
            });
        }

        let file = fs::read(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(&file[..]);

        let mut bins = vec![];
        let mut sample_pmf = vec![];
        let mut blank_pmf = vec![];

        for result in rdr.deserialize() {
            let record: Row<E> = result?;
            bins.push(record.0);
            sample_pmf.push(record.1);
            blank_pmf.push(record.2);
        }

        Ok(Self {
            bins: Array1::from_vec(bins),
            sample_pmf: Array1::from_vec(sample_pmf),
            blank_pmf: Array1::from_vec(blank_pmf),
        })
    }

    /// Turn the pair into a raw-pair estimation request.
    pub fn into_request(self) -> Request<E> {
        Request::from_pair(self.sample_pmf.into_dyn(), self.blank_pmf.into_dyn())
    }
}
