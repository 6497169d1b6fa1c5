extern crate nalgebra as na;

use std::collections::BTreeMap;
use color_eyre::eyre::{eyre, ensure, Result};
use na::{Vector4,Matrix4xX};
use crate::Float;
use crate::numerics::all_finite;

/// Marker used by dense feature arrays for a landmark that is not visible in a frame.
pub const UNOBSERVED: Float = -1.0;

/**
 * Per timestep stereo observations keyed by landmark index.
 */
#[derive(Debug,Clone)]
pub struct StereoFeatures {
    frames: Vec<BTreeMap<usize,Vector4<Float>>>
}

impl StereoFeatures {
    pub fn new(frames: Vec<BTreeMap<usize,Vector4<Float>>>) -> StereoFeatures {
        StereoFeatures { frames }
    }

    /**
     * One 4xN matrix per timestep, columns filled with UNOBSERVED are skipped.
     */
    pub fn from_dense(dense_frames: &[Matrix4xX<Float>]) -> StereoFeatures {
        let frames = dense_frames.iter().map(|frame| {
            frame.column_iter().enumerate()
                .filter(|(_,col)| !col.iter().all(|&v| v == UNOBSERVED))
                .map(|(idx,col)| (idx, col.into_owned()))
                .collect::<BTreeMap<_,_>>()
        }).collect::<Vec<_>>();
        StereoFeatures { frames }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frame(&self, t: usize) -> Result<&BTreeMap<usize,Vector4<Float>>> {
        self.frames.get(t).ok_or_else(|| eyre!("no stereo features for timestep {}, stream has {} frames", t, self.frames.len()))
    }

    pub fn visible(&self, t: usize) -> Result<Vec<usize>> {
        Ok(self.frame(t)?.keys().copied().collect())
    }

    /**
     * Pixels for the given landmarks as a 4xk matrix in the order given.
     */
    pub fn observations(&self, t: usize, indices: &[usize]) -> Result<Matrix4xX<Float>> {
        let frame = self.frame(t)?;
        let mut observations = Matrix4xX::<Float>::zeros(indices.len());
        for (col, idx) in indices.iter().enumerate() {
            let pixel = frame.get(idx).ok_or_else(|| eyre!("landmark {} is not observed at timestep {}", idx, t))?;
            observations.set_column(col, pixel);
        }
        Ok(observations)
    }

    pub fn validate_frame(&self, t: usize, n_landmarks: usize) -> Result<()> {
        for (idx, pixel) in self.frame(t)?.iter() {
            ensure!(*idx < n_landmarks, "timestep {}: landmark index {} out of range for {} landmarks", t, idx, n_landmarks);
            ensure!(all_finite(pixel), "timestep {}: non finite pixel for landmark {}: {:?}", t, idx, pixel.as_slice());
        }
        Ok(())
    }
}
