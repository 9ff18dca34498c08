use ndarray::Array;
use num_traits::{Float, ToPrimitive};

use crate::{Error, Result};

/// A half-open prediction interval `[begin, end)`.
///
/// The first interval of a partition is unbounded below and the last is
/// unbounded above, so a full partition covers the whole real line.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Interval<E> {
    pub begin: E,
    pub end: E,
}

impl<E: Float> Interval<E> {
    pub fn contains(&self, value: E) -> bool {
        self.begin <= value && value < self.end
    }
}

/// Number of intervals produced by [`partition`] for `num_divisions`.
pub const fn num_intervals(num_divisions: u32) -> usize {
    (1_usize << num_divisions) + 2
}

/// Build the ordered interval table for an expected output range.
///
/// The table holds `2^num_divisions + 2` gap-free, non-overlapping intervals:
///
/// 1. `(−∞, expected_begin)` for out-of-range low predictions,
/// 2. `2^num_divisions` intervals from the linear split of
///    `[0, expected_end]` into `2^num_divisions + 1` boundary points; the
///    split runs from zero rather than from `expected_begin`,
/// 3. `(last boundary, +∞)` for out-of-range high predictions.
///
/// # Errors
///
/// Returns [`Error::DegenerateRange`] unless the second boundary point lies
/// strictly above the first, which guards against ranges the split cannot
/// resolve.
pub fn partition<E: Float>(
    expected_range: (E, E),
    num_divisions: u32,
) -> Result<Vec<Interval<E>>> {
    let (expected_begin, expected_end) = expected_range;
    let segments = 1_usize << num_divisions;
    let split = Array::linspace(E::zero(), expected_end, segments + 1);

    let mut begins = Vec::with_capacity(num_intervals(num_divisions));
    begins.push(E::neg_infinity());
    begins.push(expected_begin);
    begins.extend(split.iter().skip(1).copied());

    if !(begins[1] < begins[2]) {
        return Err(Error::DegenerateRange {
            lower: begins[1].to_f64().unwrap_or(f64::NAN),
            upper: begins[2].to_f64().unwrap_or(f64::NAN),
        });
    }

    let intervals = begins
        .iter()
        .copied()
        .zip(
            begins
                .iter()
                .copied()
                .skip(1)
                .chain(std::iter::once(E::infinity())),
        )
        .map(|(begin, end)| Interval { begin, end })
        .collect();
    Ok(intervals)
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;
    use proptest::prelude::*;

    use super::{num_intervals, partition, Interval};
    use crate::Error;

    #[test]
    fn undivided_range_partitions_into_three_intervals() {
        let intervals = partition((10.0, 100.0), 0).unwrap();
        assert_eq!(
            intervals,
            vec![
                Interval {
                    begin: f64::NEG_INFINITY,
                    end: 10.0
                },
                Interval {
                    begin: 10.0,
                    end: 100.0
                },
                Interval {
                    begin: 100.0,
                    end: f64::INFINITY
                },
            ]
        );
    }

    #[test]
    fn inner_split_runs_from_zero_not_from_the_expected_begin() {
        let intervals = partition((10.0, 100.0), 1).unwrap();
        // boundary points of the inner split are 0, 50, 100; only 50 and 100
        // survive, after the (−inf, 10) and (10, 50) lead-in
        assert_eq!(intervals[1], Interval { begin: 10.0, end: 50.0 });
        assert_eq!(intervals[2], Interval { begin: 50.0, end: 100.0 });
    }

    #[test]
    fn a_range_the_split_cannot_resolve_is_degenerate() {
        // with one division the first inner boundary is 50, below the
        // expected begin of 60
        assert!(matches!(
            partition((60.0, 100.0), 1),
            Err(Error::DegenerateRange { .. })
        ));
        assert!(matches!(
            partition((10.0, 10.0), 0),
            Err(Error::DegenerateRange { .. })
        ));
    }

    proptest! {
        #[test]
        fn partitions_cover_the_real_line_without_gaps_or_overlaps(
            expected_end in 1.0..1e6f64,
            num_divisions in 0u32..10,
        ) {
            let intervals = partition((0.0, expected_end), num_divisions).unwrap();

            prop_assert_eq!(intervals.len(), num_intervals(num_divisions));
            prop_assert_eq!(intervals[0].begin, f64::NEG_INFINITY);
            prop_assert_eq!(intervals[intervals.len() - 1].end, f64::INFINITY);
            for (left, right) in intervals.iter().tuple_windows() {
                prop_assert_eq!(left.end, right.begin);
                prop_assert!(left.begin < left.end);
            }
        }

        #[test]
        fn every_finite_value_falls_in_exactly_one_interval(
            value in -1e6..1e6f64,
            expected_end in 1.0..1e4f64,
            num_divisions in 0u32..8,
        ) {
            let intervals = partition((0.0, expected_end), num_divisions).unwrap();
            let hits = intervals.iter().filter(|interval| interval.contains(value)).count();
            prop_assert_eq!(hits, 1);
        }
    }
}
