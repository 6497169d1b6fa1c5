extern crate nalgebra as na;

mod common;

use std::collections::BTreeSet;
use na::{DMatrix,DVector,Matrix3xX,Matrix4x3};
use rand::{Rng, SeedableRng, rngs::SmallRng};
use vision_ekf::Float;
use vision_ekf::slam::kalman::{kalman_gain, observation_noise_block};
use vision_ekf::slam::landmark_map::{LandmarkMap, get_patch_idx};
use vision_ekf::slam::runtime_parameters::CovarianceUpdate;

const NOISE: Float = 0.01;

fn random_block<R: Rng>(rng: &mut R) -> Matrix4x3<Float> {
    Matrix4x3::<Float>::from_fn(|_,_| rng.gen_range(-50.0..50.0))
}

#[test]
fn new_map() {
    let map = LandmarkMap::new(4, NOISE);
    assert_eq!(map.n_landmarks(), 4);
    assert_eq!(map.landmarks().ncols(), 4);
    assert_eq!(map.covariance().shape(), (12,12));
    assert_eq!(*map.covariance(), DMatrix::<Float>::identity(12,12)*NOISE);
    assert!((0..4).all(|i| !map.is_initialized(i) && !map.has_been_seen(i)));
}

#[test]
fn patch_indices() {
    assert_eq!(get_patch_idx(&[2,0]), vec![6,7,8,0,1,2]);
    assert!(get_patch_idx(&[]).is_empty());
}

#[test]
fn every_landmark_is_new_exactly_once() {
    let mut rng = SmallRng::seed_from_u64(41);
    let n = 20;
    let mut map = LandmarkMap::new(n, NOISE);
    let mut new_counts = vec![0usize; n];
    let mut seen = BTreeSet::<usize>::new();

    for _ in 0..50 {
        let visible = (0..n).filter(|_| rng.gen_bool(0.3)).collect::<Vec<usize>>();
        let (seen_before, newly_seen) = map.classify_visible(&visible);

        assert!(seen_before.windows(2).all(|w| w[0] < w[1]));
        assert!(newly_seen.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(seen_before.len() + newly_seen.len(), visible.len());
        assert!(seen_before.iter().all(|idx| seen.contains(idx)));
        assert!(newly_seen.iter().all(|idx| !seen.contains(idx)));

        for &idx in newly_seen.iter() {
            new_counts[idx] += 1;
        }
        seen.extend(visible.iter().copied());
        assert!(seen.iter().all(|&idx| map.has_been_seen(idx)));
    }
    assert!(new_counts.iter().all(|&c| c <= 1));
    assert_eq!(new_counts.iter().filter(|&&c| c == 1).count(), seen.len());
}

#[test]
fn initialize_and_overwrite() {
    let mut map = LandmarkMap::new(3, NOISE);
    let first = Matrix3xX::<Float>::from_column_slice(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    map.initialize(&[2,0], &first).expect("valid initialization");
    assert!(map.is_initialized(0) && map.is_initialized(2) && !map.is_initialized(1));
    assert_eq!(map.landmarks().column(2).into_owned(), first.column(0).into_owned());
    assert_eq!(map.landmarks().column(0).into_owned(), first.column(1).into_owned());

    let second = Matrix3xX::<Float>::from_column_slice(&[-1.0, -2.0, -3.0]);
    map.initialize(&[2], &second).expect("re-initialization overwrites");
    assert_eq!(map.landmarks().column(2).into_owned(), second.column(0).into_owned());
    assert_eq!(map.get_landmarks(&[0]).expect("in range").column(0).into_owned(), first.column(1).into_owned());
}

#[test]
fn rejects_bad_indices() {
    let mut map = LandmarkMap::new(3, NOISE);
    let point = Matrix3xX::<Float>::from_column_slice(&[1.0, 2.0, 3.0]);
    assert!(map.initialize(&[3], &point).is_err());
    assert!(map.initialize(&[0,1], &point).is_err());
    assert!(map.initialize(&[0], &Matrix3xX::<Float>::from_column_slice(&[Float::NAN, 0.0, 1.0])).is_err());
    assert!(!map.is_initialized(0));
    assert!(map.get_landmarks(&[5]).is_err());
    assert!(map.extract_patch(&[1,3]).is_err());
    assert!(map.extract_patch(&[1,1]).is_err());
}

#[test]
fn patch_extraction_follows_index_order() {
    let mut map = LandmarkMap::new(4, NOISE);
    let points = Matrix3xX::<Float>::from_column_slice(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    map.initialize(&[1,3], &points).expect("valid initialization");
    let patch = map.extract_patch(&[3,1]).expect("valid patch");
    assert_eq!(patch.len(), 2);
    assert_eq!(patch.landmark(0), points.column(1).into_owned());
    assert_eq!(patch.landmark(1), points.column(0).into_owned());
    assert_eq!(patch.covariance_indices, vec![9,10,11,3,4,5]);
    assert_eq!(patch.covariance, DMatrix::<Float>::identity(6,6)*NOISE);
}

#[test]
fn correction_touches_only_patch_blocks() {
    let mut rng = SmallRng::seed_from_u64(43);
    let mut map = LandmarkMap::new(5, NOISE);
    let points = Matrix3xX::<Float>::from_fn(5, |_,_| rng.gen_range(-10.0..10.0));
    map.initialize(&[0,1,2,3,4], &points).expect("valid initialization");
    let noise = na::Matrix4::<Float>::identity()*4.0;

    // First correction couples landmarks 0 and 1
    for (indices, form) in [(vec![0usize,1], CovarianceUpdate::Standard), (vec![1usize,3], CovarianceUpdate::Joseph)] {
        let before_mean = map.landmarks().clone();
        let before_cov = map.covariance().clone();
        let patch = map.extract_patch(&indices).expect("valid patch");
        let jacobian = LandmarkMap::assemble_jacobian(&indices.iter().map(|_| random_block(&mut rng)).collect::<Vec<_>>());
        let observation_noise = observation_noise_block(&noise, indices.len());
        let gain = kalman_gain(&patch.covariance, &jacobian, &observation_noise).expect("well conditioned");
        let innovation = DVector::<Float>::from_fn(4*indices.len(), |_,_| rng.gen_range(-1.0..1.0));

        let mean_updated = &patch.mean + &gain*&innovation;
        map.apply_correction(&patch, &mean_updated).expect("finite correction");
        map.apply_covariance_correction(&patch, &gain, &jacobian, &observation_noise, form, 1e-6).expect("valid covariance");

        for col in 0..5 {
            if !indices.contains(&col) {
                assert_eq!(map.landmarks().column(col), before_mean.column(col));
            }
        }

        let touched = patch.covariance_indices.iter().copied().collect::<BTreeSet<usize>>();
        let after_cov = map.covariance();
        for r in 0..15 {
            for c in 0..15 {
                if !(touched.contains(&r) && touched.contains(&c)) {
                    assert_eq!(after_cov[(r,c)], before_cov[(r,c)], "entry ({},{}) changed", r, c);
                }
            }
        }
        common::assert_symmetric(after_cov, 0.0);
        for &idx in touched.iter() {
            assert!(after_cov[(idx,idx)] < before_cov[(idx,idx)]);
        }
    }

    assert!(map.covariance()[(0,3)] != 0.0);
}

#[test]
fn patch_covariance_write_back() {
    let mut map = LandmarkMap::new(3, NOISE);
    let patch = map.extract_patch(&[2,0]).expect("valid patch");
    let corrected = DMatrix::<Float>::from_fn(6, 6, |r,c| match r == c {
        true => 1e-3*((r+1) as Float),
        false => 1e-5
    });
    map.write_patch_covariance(&patch, &corrected).expect("matching shape");

    let covariance = map.covariance();
    assert_eq!(covariance[(6,6)], corrected[(0,0)]);
    assert_eq!(covariance[(0,0)], corrected[(3,3)]);
    assert_eq!(covariance[(6,0)], corrected[(0,3)]);
    assert_eq!(covariance.view((3,3),(3,3)), DMatrix::<Float>::identity(3,3)*NOISE);
    assert_eq!(covariance[(3,0)], 0.0);

    assert!(map.write_patch_covariance(&patch, &DMatrix::<Float>::identity(3,3)).is_err());
    let mut not_finite = corrected.clone();
    not_finite[(1,1)] = Float::NAN;
    assert!(map.write_patch_covariance(&patch, &not_finite).is_err());
}

#[test]
fn block_diagonal_jacobian() {
    let mut rng = SmallRng::seed_from_u64(47);
    let blocks = vec![random_block(&mut rng), random_block(&mut rng)];
    let jacobian = LandmarkMap::assemble_jacobian(&blocks);
    assert_eq!(jacobian.shape(), (8,6));
    assert_eq!(jacobian.view((0,0),(4,3)), blocks[0]);
    assert_eq!(jacobian.view((4,3),(4,3)), blocks[1]);
    assert_eq!(jacobian.view((0,3),(4,3)).abs().max(), 0.0);
    assert_eq!(jacobian.view((4,0),(4,3)).abs().max(), 0.0);
}
