use super::*;

fn matrix(dim: usize, rows: &[&[f32]]) -> Matrix {
    let mut m = Matrix::empty(dim);
    for row in rows {
        let mut row = row.to_vec();
        l2_normalize(&mut row);
        m.push_row(&row).unwrap();
    }
    m
}

fn pseudo_random_matrix(rows: usize, dim: usize, seed: u64) -> Matrix {
    let mut state = seed;
    let mut data = Vec::with_capacity(rows * dim);
    for _ in 0..rows * dim {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        data.push(((state >> 33) % 2000) as f32 / 1000.0 - 1.0);
    }
    let mut m = Matrix::new(dim, data).unwrap();
    m.normalize_rows();
    m
}

#[test]
fn test_dot_matches_naive_sum() {
    let a: Vec<f32> = (0..19).map(|i| i as f32 * 0.5).collect();
    let b: Vec<f32> = (0..19).map(|i| 1.0 - i as f32 * 0.1).collect();
    let naive: f32 = a.iter().zip(&b).map(|(x, y)| x * y).sum();
    assert!((dot(&a, &b) - naive).abs() < 1e-3);
}

#[test]
fn test_normalize_unit_length() {
    let mut v = vec![3.0, 4.0];
    l2_normalize(&mut v);
    assert!((v[0] - 0.6).abs() < 1e-6);
    assert!((v[1] - 0.8).abs() < 1e-6);
}

#[test]
fn test_normalize_zero_vector_is_noop() {
    let mut v = vec![0.0f32; 4];
    l2_normalize(&mut v);
    assert_eq!(v, vec![0.0; 4]);
}

#[test]
fn test_clipped_cosine_bounds() {
    let a = normalized(&[1.0, 1.0, 1.0]);
    let opposite: Vec<f32> = a.iter().map(|x| -x).collect();
    assert!(clipped_cosine(&a, &a) <= 1.0);
    assert!(clipped_cosine(&a, &opposite) >= -1.0);
    assert!((clipped_cosine(&a, &opposite) + 1.0).abs() < 1e-6);
}

#[test]
fn test_clipped_cosine_clamps_overshoot() {
    assert_eq!(clipped_cosine(&[2.0], &[2.0]), 1.0);
    assert_eq!(clipped_cosine(&[2.0], &[-2.0]), -1.0);
}

#[test]
fn test_matrix_rejects_ragged_data() {
    assert_eq!(
        Matrix::new(3, vec![1.0; 4]),
        Err(MatrixShapeError { dim: 3, len: 4 })
    );
    assert!(Matrix::new(0, vec![]).is_err());
}

#[test]
fn test_matrix_rows_and_mean() {
    let m = Matrix::new(2, vec![1.0, 0.0, 0.0, 1.0]).unwrap();
    assert_eq!(m.rows(), 2);
    assert_eq!(m.row(1), Some(&[0.0, 1.0][..]));
    assert_eq!(m.row(2), None);
    assert_eq!(m.mean_row(), Some(vec![0.5, 0.5]));
    assert_eq!(Matrix::empty(2).mean_row(), None);
}

#[test]
fn test_push_row_width_checked() {
    let mut m = Matrix::empty(3);
    assert!(m.push_row(&[1.0, 2.0]).is_err());
    assert!(m.is_empty());
}

#[test]
fn test_brute_force_orders_by_score() {
    let m = matrix(2, &[&[0.0, 1.0], &[1.0, 0.0], &[1.0, 1.0]]);
    let q = normalized(&[1.0, 0.0]);
    let hits = BruteForce.top_n(&m, &q, 3);
    let order: Vec<usize> = hits.iter().map(|h| h.index).collect();
    assert_eq!(order, vec![1, 2, 0]);
}

#[test]
fn test_ties_keep_row_order() {
    let m = matrix(2, &[&[0.0, 1.0], &[1.0, 0.0], &[0.0, 1.0], &[1.0, 0.0]]);
    let q = normalized(&[1.0, 0.0]);
    for search in [search_for(false), search_for(true)] {
        let order: Vec<usize> = search.top_n(&m, &q, 4).iter().map(|h| h.index).collect();
        assert_eq!(order, vec![1, 3, 0, 2], "{}", search.name());
    }
}

#[test]
fn test_top_n_truncates() {
    let m = pseudo_random_matrix(20, 8, 7);
    let q = normalized(&[1.0; 8]);
    assert_eq!(BruteForce.top_n(&m, &q, 5).len(), 5);
    assert_eq!(IndexAccelerated.top_n(&m, &q, 5).len(), 5);
    assert!(IndexAccelerated.top_n(&m, &q, 0).is_empty());
    assert_eq!(IndexAccelerated.top_n(&m, &q, 50).len(), 20);
}

#[test]
fn test_accelerated_matches_brute_force_exactly() {
    for seed in 1..20u64 {
        let m = pseudo_random_matrix(64, 24, seed);
        let q = pseudo_random_matrix(1, 24, seed + 1000);
        let q = q.row(0).unwrap();
        for n in [1, 5, 12, 64] {
            assert_eq!(
                BruteForce.top_n(&m, q, n),
                IndexAccelerated.top_n(&m, q, n),
                "seed {} n {}",
                seed,
                n
            );
        }
        assert_eq!(
            BruteForce.best_score(&m, q),
            IndexAccelerated.best_score(&m, q)
        );
    }
}

#[test]
fn test_scores_within_unit_interval() {
    let m = pseudo_random_matrix(50, 16, 3);
    let q = pseudo_random_matrix(1, 16, 4);
    for hit in BruteForce.top_n(&m, q.row(0).unwrap(), 50) {
        assert!((-1.0..=1.0).contains(&hit.score));
    }
}

#[test]
fn test_best_score_empty_matrix() {
    let m = Matrix::empty(4);
    assert_eq!(BruteForce.best_score(&m, &[1.0, 0.0, 0.0, 0.0]), None);
    assert_eq!(IndexAccelerated.best_score(&m, &[1.0, 0.0, 0.0, 0.0]), None);
}
