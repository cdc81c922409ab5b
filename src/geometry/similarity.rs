use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::{AlignError, Result};

/// Uniform scale, rotation and translation in (row, column) space.
///
/// A point `p` maps to `scale * R(rotation) * p + offset`, with `R` the
/// counter-clockwise rotation `[[cos, -sin], [sin, cos]]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityTransform {
    pub scale: f64,
    /// Radians.
    pub rotation: f64,
    pub offset: (f64, f64),
}

impl SimilarityTransform {
    pub fn new(scale: f64, rotation: f64, offset: (f64, f64)) -> Self {
        Self {
            scale,
            rotation,
            offset,
        }
    }

    pub fn from_degrees(scale: f64, rotation_degrees: f64, offset: (f64, f64)) -> Self {
        Self::new(scale, rotation_degrees.to_radians(), offset)
    }

    pub fn rotation_degrees(&self) -> f64 {
        self.rotation.to_degrees()
    }

    pub fn apply(&self, point: (f64, f64)) -> (f64, f64) {
        let (sin, cos) = self.rotation.sin_cos();
        let (r, c) = point;
        (
            self.scale * (cos * r - sin * c) + self.offset.0,
            self.scale * (sin * r + cos * c) + self.offset.1,
        )
    }

    pub fn apply_all(&self, points: &[(f64, f64)]) -> Vec<(f64, f64)> {
        points.iter().map(|&p| self.apply(p)).collect()
    }

    /// Ordinary least squares fit mapping `source[i]` onto `target[i]`.
    ///
    /// Solves the stacked system
    ///
    /// ```text
    /// [ r_i  -c_i  1  0 ]   [ alpha ]   [ R_i ]
    /// [ c_i   r_i  0  1 ] · [ beta  ] = [ C_i ]
    ///                       [ t_r   ]
    ///                       [ t_c   ]
    /// ```
    ///
    /// where `alpha = scale * cos(theta)` and `beta = scale * sin(theta)`.
    pub fn fit(source: &[(f64, f64)], target: &[(f64, f64)]) -> Result<Self> {
        if source.len() != target.len() || source.len() < 2 {
            return Err(AlignError::SingularSystem);
        }

        let n = source.len();
        let mut a = DMatrix::<f64>::zeros(2 * n, 4);
        let mut b = DVector::<f64>::zeros(2 * n);
        for (i, (&(r, c), &(tr, tc))) in source.iter().zip(target).enumerate() {
            a[(2 * i, 0)] = r;
            a[(2 * i, 1)] = -c;
            a[(2 * i, 2)] = 1.0;
            a[(2 * i + 1, 0)] = c;
            a[(2 * i + 1, 1)] = r;
            a[(2 * i + 1, 3)] = 1.0;
            b[2 * i] = tr;
            b[2 * i + 1] = tc;
        }

        let svd = a.svd(true, true);
        let eps = f64::EPSILON * (2 * n) as f64 * svd.singular_values.max();
        if svd.rank(eps) < 4 {
            return Err(AlignError::SingularSystem);
        }
        let x = svd.solve(&b, eps).map_err(|_| AlignError::SingularSystem)?;

        let (alpha, beta) = (x[0], x[1]);
        let theta = beta.atan2(alpha);
        let scale = alpha / theta.cos();
        Ok(Self::new(scale, theta, (x[2], x[3])))
    }

    /// Root-mean-square distance between transformed sources and targets.
    pub fn rms_residual(&self, source: &[(f64, f64)], target: &[(f64, f64)]) -> f64 {
        if source.is_empty() {
            return 0.0;
        }
        let sum: f64 = source
            .iter()
            .zip(target)
            .map(|(&s, &t)| {
                let p = self.apply(s);
                (p.0 - t.0).powi(2) + (p.1 - t.1).powi(2)
            })
            .sum();
        (sum / source.len() as f64).sqrt()
    }
}
