extern crate nalgebra as na;

use std::collections::BTreeSet;
use color_eyre::eyre::{ensure, Result};
use na::{DMatrix,DVector,Vector3,Matrix3xX,Matrix4x3};
use tracing::debug;
use crate::Float;
use crate::slam::{kalman::corrected_covariance, runtime_parameters::CovarianceUpdate};

/**
 * The landmarks of the current frame's correction together with their slice of the joint covariance.
 */
#[derive(Debug,Clone)]
pub struct LandmarkPatch {
    pub indices: Vec<usize>,
    pub mean: DVector<Float>,
    pub covariance: DMatrix<Float>,
    pub covariance_indices: Vec<usize>
}

impl LandmarkPatch {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /**
     * Landmark i of the patch as a world point
     */
    pub fn landmark(&self, i: usize) -> Vector3<Float> {
        self.mean.fixed_rows::<3>(3*i).into_owned()
    }
}

/**
 * 3xk -> 3k rows for a patch with blocks of 3 per landmark
 */
pub fn get_patch_idx(landmark_indices: &[usize]) -> Vec<usize> {
    landmark_indices.iter().flat_map(|&i| 3*i..3*i+3).collect()
}

pub struct LandmarkMap {
    landmarks: Matrix3xX<Float>,
    covariance: DMatrix<Float>,
    initialized: Vec<bool>,
    landmarks_seen: BTreeSet<usize>
}

impl LandmarkMap {
    pub fn new(n_landmarks: usize, noise: Float) -> LandmarkMap {
        LandmarkMap {
            landmarks: Matrix3xX::<Float>::zeros(n_landmarks),
            covariance: DMatrix::<Float>::identity(3*n_landmarks,3*n_landmarks)*noise,
            initialized: vec![false; n_landmarks],
            landmarks_seen: BTreeSet::new()
        }
    }

    pub fn n_landmarks(&self) -> usize {
        self.landmarks.ncols()
    }

    pub fn landmarks(&self) -> &Matrix3xX<Float> {
        &self.landmarks
    }

    pub fn covariance(&self) -> &DMatrix<Float> {
        &self.covariance
    }

    pub fn is_initialized(&self, idx: usize) -> bool {
        self.initialized.get(idx).copied().unwrap_or(false)
    }

    pub fn has_been_seen(&self, idx: usize) -> bool {
        self.landmarks_seen.contains(&idx)
    }

    fn ensure_indices(&self, indices: &[usize]) -> Result<()> {
        let n = self.n_landmarks();
        for &idx in indices {
            ensure!(idx < n, "landmark index {} out of range for {} landmarks", idx, n);
        }
        Ok(())
    }

    pub fn get_landmarks(&self, indices: &[usize]) -> Result<Matrix3xX<Float>> {
        self.ensure_indices(indices)?;
        Ok(self.landmarks.select_columns(indices.iter()))
    }

    /**
     * Writes world points into the given slots. An already initialized slot is overwritten.
     */
    pub fn initialize(&mut self, indices: &[usize], points_world: &Matrix3xX<Float>) -> Result<()> {
        ensure!(indices.len() == points_world.ncols(), "{} landmark indices for {} points", indices.len(), points_world.ncols());
        ensure!(points_world.iter().all(|v| v.is_finite()), "non finite landmark initialization");
        self.ensure_indices(indices)?;
        for (col, &idx) in indices.iter().enumerate() {
            if self.initialized[idx] {
                debug!("landmark {} re-initialized, overwriting {:?}", idx, self.landmarks.column(idx).iter().collect::<Vec<_>>());
            }
            self.landmarks.set_column(idx, &points_world.column(col));
            self.initialized[idx] = true;
        }
        Ok(())
    }

    /**
     * Splits the visible set into (seen before, new) and adds it to the seen set. Both lists are sorted.
     */
    pub fn classify_visible(&mut self, visible: &[usize]) -> (Vec<usize>, Vec<usize>) {
        let current = visible.iter().copied().collect::<BTreeSet<usize>>();
        let seen_before = current.intersection(&self.landmarks_seen).copied().collect::<Vec<usize>>();
        let newly_seen = current.difference(&self.landmarks_seen).copied().collect::<Vec<usize>>();
        self.landmarks_seen.extend(current);
        (seen_before, newly_seen)
    }

    pub fn extract_patch(&self, indices: &[usize]) -> Result<LandmarkPatch> {
        self.ensure_indices(indices)?;
        let unique = indices.iter().collect::<BTreeSet<_>>();
        ensure!(unique.len() == indices.len(), "landmark patch contains duplicate indices: {:?}", indices);
        let covariance_indices = get_patch_idx(indices);
        let covariance = self.covariance.select_rows(covariance_indices.iter()).select_columns(covariance_indices.iter());
        let mean = DVector::<Float>::from_column_slice(self.landmarks.select_columns(indices.iter()).as_slice());
        Ok(LandmarkPatch { indices: indices.to_vec(), mean, covariance, covariance_indices })
    }

    pub fn apply_correction(&mut self, patch: &LandmarkPatch, mean_updated: &DVector<Float>) -> Result<()> {
        ensure!(mean_updated.len() == 3*patch.len(), "corrected mean has {} entries for {} landmarks", mean_updated.len(), patch.len());
        ensure!(mean_updated.iter().all(|v| v.is_finite()), "non finite landmark correction");
        for (i, &idx) in patch.indices.iter().enumerate() {
            self.landmarks.set_column(idx, &mean_updated.fixed_rows::<3>(3*i));
        }
        Ok(())
    }

    /**
     * Scatters the corrected patch covariance back into the joint covariance. Entries outside the
     * patch rows/columns are left as they are.
     */
    pub fn apply_covariance_correction(&mut self, patch: &LandmarkPatch, gain: &DMatrix<Float>, jacobian: &DMatrix<Float>,
        observation_noise: &DMatrix<Float>, form: CovarianceUpdate, tol: Float) -> Result<()> {
        let corrected = corrected_covariance(&patch.covariance, gain, jacobian, observation_noise, form, tol, "landmark")?;
        self.write_patch_covariance(patch, &corrected)
    }

    /**
     * Writes a 3k x 3k posterior into the rows/columns of the patch.
     */
    pub fn write_patch_covariance(&mut self, patch: &LandmarkPatch, corrected: &DMatrix<Float>) -> Result<()> {
        let n = patch.covariance_indices.len();
        ensure!(corrected.shape() == (n,n), "patch covariance is {}x{} for {} landmarks", corrected.nrows(), corrected.ncols(), patch.len());
        ensure!(corrected.iter().all(|v| v.is_finite()), "non finite landmark covariance");
        for (a, &row) in patch.covariance_indices.iter().enumerate() {
            for (b, &col) in patch.covariance_indices.iter().enumerate() {
                self.covariance[(row,col)] = corrected[(a,b)];
            }
        }
        Ok(())
    }

    /**
     * Block diagonal 4k x 3k landmark jacobian of a patch, one 4x3 block per landmark.
     */
    pub fn assemble_jacobian(blocks: &[Matrix4x3<Float>]) -> DMatrix<Float> {
        let k = blocks.len();
        let mut jacobian = DMatrix::<Float>::zeros(4*k,3*k);
        for (i, block) in blocks.iter().enumerate() {
            jacobian.fixed_view_mut::<4,3>(4*i,3*i).copy_from(block);
        }
        jacobian
    }
}
