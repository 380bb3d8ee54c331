//! Similarity engine and window properties.

use proptest::prelude::*;
use tickpoint::prelude::*;

fn instrument(symbol: &str, change_percent: &[f64]) -> InstrumentSeries {
    InstrumentSeries {
        change_percent: change_percent.to_vec(),
        ..InstrumentSeries::new(symbol)
    }
}

fn values() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-1000.0f64..1000.0, 2..64)
}

proptest! {
    #[test]
    fn pearson_is_symmetric(a in values(), b in values()) {
        let ab = pearson_correlation(&a, &b);
        let ba = pearson_correlation(&b, &a);
        prop_assert!((ab - ba).abs() < 1e-12);
        prop_assert!((-1.0..=1.0).contains(&ab));
    }

    #[test]
    fn pearson_self_correlation_is_one(a in values()) {
        let spread = a.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
            - a.iter().cloned().fold(f64::INFINITY, f64::min);
        prop_assume!(spread > 1e-3);
        prop_assert!((pearson_correlation(&a, &a) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn pearson_constant_side_is_zero(c in -1000.0f64..1000.0, b in values()) {
        let a = vec![c; b.len()];
        prop_assert_eq!(pearson_correlation(&a, &b), 0.0);
    }

    #[test]
    fn label_is_monotonic_in_magnitude(x in -1.0f64..=1.0, y in -1.0f64..=1.0) {
        let (lo, hi) = if x.abs() <= y.abs() { (x, y) } else { (y, x) };
        let (a, b) = (correlation_label(lo), correlation_label(hi));
        prop_assert!(a.strength <= b.strength);
        prop_assert!(a.similarity <= b.similarity);
        prop_assert!(b.similarity <= 100);
    }

    #[test]
    fn bucket_volume_never_exceeds_series(
        volumes in prop::collection::vec(0.0f64..10_000.0, 0..120),
        size in 1usize..12,
    ) {
        let obs: Vec<TickObservation> = volumes
            .iter()
            .enumerate()
            .map(|(i, &v)| TickObservation::new(SessionTime::new_const(9, 30 + i as u16), 10.0, v, 10.0 * v))
            .collect();
        let series = TickSeries::new(obs).unwrap();
        let buckets = WindowAggregator::new(Period::new(size).unwrap()).buckets(&series);

        prop_assert_eq!(buckets.len(), volumes.len() / size);
        let bucketed: f64 = buckets.iter().map(|b| b.volume_sum).sum();
        prop_assert!(bucketed <= series.total_volume() + 1e-6);
        for b in &buckets {
            prop_assert_eq!(b.end_index - b.start_index + 1, size);
            prop_assert!(b.average_trade_size >= 0.0);
        }
    }
}

#[test]
fn test_matrix_shape_and_diagonal() {
    let instruments = [
        instrument("A", &[1.0, 2.0, 3.0, 4.0]),
        instrument("B", &[2.0, 4.0, 6.0, 8.0]),
        instrument("C", &[4.0, 3.0, 2.0, 1.0]),
    ];
    let matrix = similarity_matrix(&instruments, &SimilarityOptions::default());

    assert_eq!(matrix.len(), 3);
    assert!(matrix.iter().all(|row| row.len() == 3));
    for (i, row) in matrix.iter().enumerate() {
        assert_eq!(row[i].similarity(), 100);
    }
    assert_eq!(matrix[0][1].similarity(), 100);
    assert_eq!(matrix[0][2].label.direction, CorrelationDirection::Negative);
    assert_eq!(matrix[1][0].symbol_a, "B");
}

#[test]
fn test_matrix_needs_two_instruments() {
    let one = [instrument("A", &[1.0, 2.0])];
    assert!(similarity_matrix(&one, &SimilarityOptions::default()).is_empty());
    assert!(most_similar(&one, &SimilarityOptions::default(), 0, None).is_empty());
}

#[test]
fn test_most_similar_ordering() {
    let instruments = [
        instrument("A", &[1.0, 2.0, 3.0, 4.0, 5.0]),
        instrument("B", &[1.0, 2.0, 3.0, 5.0, 4.0]),
        instrument("C", &[5.0, 4.0, 3.0, 2.0, 1.0]),
        instrument("D", &[1.0, 3.0, 1.0, 3.0, 1.0]),
    ];
    let options = SimilarityOptions::default();

    let all = most_similar(&instruments, &options, 60, None);
    let sims: Vec<u32> = all.iter().map(|p| p.report.similarity()).collect();
    assert!(sims.windows(2).all(|w| w[0] >= w[1]));
    assert!(sims.iter().all(|&s| s >= 60));
    assert!(all.iter().all(|p| p.pair.0 < p.pair.1));
    // A-C is a perfect inverse
    assert_eq!(all[0].pair, (0, 2));

    let top = most_similar(&instruments, &options, 60, Some(1));
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].pair, all[0].pair);
}

#[test]
fn test_normalization_changes_scale_not_shape() {
    let a = InstrumentSeries {
        limit_move_percent: 20.0,
        ..instrument("A", &[1.0, 4.0, 2.0, 8.0])
    };
    let b = instrument("B", &[0.5, 2.0, 1.0, 4.0]);

    let report = similarity(&a, &b, &SimilarityOptions::default());
    assert_eq!(report.similarity(), 100);
    assert_eq!(report.valid_points, 4);
    assert!(report.previous.is_none());
}
