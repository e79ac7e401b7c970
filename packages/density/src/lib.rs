#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Kernel density estimation on a fixed planar grid.
//!
//! Points are Web Mercator meters. The kernel is a bivariate Gaussian whose
//! covariance is the sample covariance of the points scaled by Scott's
//! factor `n^(-1/6)`. Values are densities of the unclipped estimate, so they
//! need not integrate to one over the grid.

use std::collections::HashSet;
use std::f64::consts::PI;

use collision_map_spatial::BoundingBox;
use geo::Point;
use rayon::prelude::*;
use serde::Serialize;

/// Default number of samples along each grid axis.
pub const DEFAULT_GRID_SIZE: usize = 300;

/// Squared correlation above which the covariance is treated as singular.
const SINGULAR_CORRELATION: f64 = 1.0 - 1e-12;

/// Why a density surface could not be estimated.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DensityError {
    /// The point set cannot define a two-dimensional kernel.
    #[error("Degenerate input for density estimation: {reason}")]
    DegenerateInput {
        /// What made the point set unusable.
        reason: String,
    },
    /// The grid has no samples or the bounding box no area.
    #[error("Invalid density grid: {reason}")]
    InvalidGrid {
        /// Which dimension is empty.
        reason: String,
    },
}

/// Sampling grid of a density surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grid {
    /// Extent in Web Mercator meters; the edge samples lie on it.
    pub bounding_box: BoundingBox,
    /// Samples along x.
    pub width: usize,
    /// Samples along y.
    pub height: usize,
}

impl Grid {
    /// A square grid of `size` x `size` samples.
    #[must_use]
    pub const fn square(bounding_box: BoundingBox, size: usize) -> Self {
        Self {
            bounding_box,
            width: size,
            height: size,
        }
    }

    fn validate(&self) -> Result<(), DensityError> {
        if self.width == 0 || self.height == 0 {
            return Err(DensityError::InvalidGrid {
                reason: format!("{}x{} samples", self.width, self.height),
            });
        }
        if !self.bounding_box.is_valid() {
            return Err(DensityError::InvalidGrid {
                reason: format!("empty bounding box {:?}", self.bounding_box),
            });
        }
        Ok(())
    }
}

impl Default for Grid {
    fn default() -> Self {
        Self::square(BoundingBox::SAN_FRANCISCO, DEFAULT_GRID_SIZE)
    }
}

/// A density surface sampled on a [`Grid`].
///
/// `values[j][i]` is the density at `(xs[i], ys[j])`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DensitySurface {
    /// Sample x coordinates, west to east.
    pub xs: Vec<f64>,
    /// Sample y coordinates, south to north.
    pub ys: Vec<f64>,
    /// One row per `ys` entry.
    pub values: Vec<Vec<f64>>,
}

impl DensitySurface {
    /// The sample with the highest density as `(x, y, value)`.
    #[must_use]
    pub fn peak(&self) -> Option<(f64, f64, f64)> {
        self.values
            .iter()
            .enumerate()
            .flat_map(|(j, row)| row.iter().enumerate().map(move |(i, v)| (i, j, *v)))
            .fold(None, |best: Option<(usize, usize, f64)>, cell| match best {
                Some(b) if b.2 >= cell.2 => Some(b),
                _ => Some(cell),
            })
            .map(|(i, j, v)| (self.xs[i], self.ys[j], v))
    }
}

/// A fitted bivariate Gaussian KDE.
#[derive(Debug, Clone)]
pub struct GaussianKde {
    points: Vec<(f64, f64)>,
    /// Inverse kernel covariance `[[a, b], [b, c]]`.
    inverse: (f64, f64, f64),
    norm: f64,
}

impl GaussianKde {
    /// Fits the estimator. Points with a non-finite coordinate are ignored.
    ///
    /// # Errors
    ///
    /// * [`DensityError::DegenerateInput`] - fewer than two distinct points,
    ///   or the points are collinear
    pub fn fit(points: &[Point<f64>]) -> Result<Self, DensityError> {
        let points: Vec<(f64, f64)> = points
            .iter()
            .filter(|p| p.x().is_finite() && p.y().is_finite())
            .map(|p| (p.x(), p.y()))
            .collect();

        let distinct: HashSet<(u64, u64)> = points
            .iter()
            .map(|(x, y)| (x.to_bits(), y.to_bits()))
            .collect();
        if distinct.len() < 2 {
            return Err(DensityError::DegenerateInput {
                reason: format!("{} distinct points, need at least 2", distinct.len()),
            });
        }

        #[allow(clippy::cast_precision_loss)]
        let n = points.len() as f64;
        let mean_x = points.iter().map(|p| p.0).sum::<f64>() / n;
        let mean_y = points.iter().map(|p| p.1).sum::<f64>() / n;

        let (mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0);
        for (x, y) in &points {
            let (dx, dy) = (x - mean_x, y - mean_y);
            sxx += dx * dx;
            sxy += dx * dy;
            syy += dy * dy;
        }
        let (sxx, sxy, syy) = (sxx / (n - 1.0), sxy / (n - 1.0), syy / (n - 1.0));

        if sxx <= 0.0 || syy <= 0.0 || sxy * sxy >= SINGULAR_CORRELATION * sxx * syy {
            return Err(DensityError::DegenerateInput {
                reason: "points are collinear, covariance is singular".to_string(),
            });
        }

        let factor_sq = n.powf(-1.0 / 3.0);
        let (a, b, c) = (sxx * factor_sq, sxy * factor_sq, syy * factor_sq);
        let det = a.mul_add(c, -(b * b));

        log::debug!(
            "Fitted KDE on {} points, Scott factor {:.4}",
            points.len(),
            factor_sq.sqrt()
        );

        Ok(Self {
            inverse: (c / det, -b / det, a / det),
            norm: 1.0 / (2.0 * PI * det.sqrt() * n),
            points,
        })
    }

    /// Density at `(x, y)`.
    #[must_use]
    pub fn evaluate(&self, x: f64, y: f64) -> f64 {
        let (a, b, c) = self.inverse;
        let sum: f64 = self
            .points
            .iter()
            .map(|(px, py)| {
                let (dx, dy) = (x - px, y - py);
                let q = (a * dx).mul_add(dx, (2.0 * b * dx).mul_add(dy, c * dy * dy));
                (-0.5 * q).exp()
            })
            .sum();
        sum * self.norm
    }

    /// Samples the density on every grid point, rows in parallel.
    ///
    /// # Errors
    ///
    /// * [`DensityError::InvalidGrid`] - zero samples or an empty bounding box
    pub fn surface(&self, grid: &Grid) -> Result<DensitySurface, DensityError> {
        grid.validate()?;
        let b = grid.bounding_box;
        let xs = linspace(b.min_x, b.max_x, grid.width);
        let ys = linspace(b.min_y, b.max_y, grid.height);

        let values = ys
            .par_iter()
            .map(|y| xs.iter().map(|x| self.evaluate(*x, *y)).collect())
            .collect();

        Ok(DensitySurface { xs, ys, values })
    }
}

/// Fits a KDE to `points` and samples it on `grid`.
///
/// # Errors
///
/// Returns [`DensityError::InvalidGrid`] for an unusable grid and
/// [`DensityError::DegenerateInput`] for a point set without spread.
pub fn estimate(points: &[Point<f64>], grid: &Grid) -> Result<DensitySurface, DensityError> {
    grid.validate()?;
    let surface = GaussianKde::fit(points)?.surface(grid)?;
    log::info!(
        "Density surface: {} points on a {}x{} grid",
        points.len(),
        grid.width,
        grid.height
    );
    Ok(surface)
}

/// `count` evenly spaced values from `start` to `end` inclusive.
fn linspace(start: f64, end: f64, count: usize) -> Vec<f64> {
    if count == 1 {
        return vec![start];
    }
    #[allow(clippy::cast_precision_loss)]
    let step = (end - start) / (count - 1) as f64;
    (0..count)
        .map(|i| {
            if i == count - 1 {
                end
            } else {
                #[allow(clippy::cast_precision_loss)]
                let offset = i as f64 * step;
                start + offset
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> Vec<Point<f64>> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(0.0, 1.0),
            Point::new(1.0, 0.0),
        ]
    }

    fn small_grid(size: usize) -> Grid {
        Grid::square(
            BoundingBox {
                min_x: -1.0,
                min_y: -1.0,
                max_x: 2.0,
                max_y: 2.0,
            },
            size,
        )
    }

    #[test]
    fn linspace_includes_both_ends() {
        assert_eq!(linspace(0.0, 1.0, 5), vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(linspace(3.0, 9.0, 1), vec![3.0]);
    }

    #[test]
    fn matches_scott_bandwidth_gaussian() {
        let kde = GaussianKde::fit(&unit_square()).unwrap();

        // Sample variance 1/3 on both axes, no covariance, n = 4.
        let var = (1.0 / 3.0) * 4f64.powf(-1.0 / 3.0);
        let expected: f64 = unit_square()
            .iter()
            .map(|p| {
                let d2 = (0.5 - p.x()).powi(2) + (0.25 - p.y()).powi(2);
                (-0.5 * d2 / var).exp()
            })
            .sum::<f64>()
            / (2.0 * PI * var * 4.0);

        assert!((kde.evaluate(0.5, 0.25) - expected).abs() < 1e-12);
    }

    #[test]
    fn surface_shape_and_symmetry() {
        let surface = estimate(&unit_square(), &small_grid(31)).unwrap();
        assert_eq!(surface.xs.len(), 31);
        assert_eq!(surface.ys.len(), 31);
        assert_eq!(surface.values.len(), 31);
        assert!(surface.values.iter().all(|row| row.len() == 31));
        assert!((surface.xs[30] - 2.0).abs() < f64::EPSILON);

        // Symmetric about the square's center (index 15 is 0.5).
        let v = &surface.values;
        assert!((v[3][7] - v[7][3]).abs() < 1e-12);
        assert!((v[3][7] - v[27][23]).abs() < 1e-12);

        let (x, y, peak) = surface.peak().unwrap();
        assert!(peak > 0.0);
        assert!((-0.1..=1.1).contains(&x) && (-0.1..=1.1).contains(&y));
    }

    #[test]
    fn default_grid_covers_san_francisco() {
        let grid = Grid::default();
        assert_eq!(grid.width, 300);
        assert_eq!(grid.height, 300);
        assert!((grid.bounding_box.min_x - -13_639_000.0).abs() < f64::EPSILON);
        assert!((grid.bounding_box.max_y - 4_555_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn single_point_is_degenerate() {
        let err = GaussianKde::fit(&[Point::new(1.0, 1.0)]).unwrap_err();
        assert!(matches!(err, DensityError::DegenerateInput { .. }));
    }

    #[test]
    fn coincident_points_are_degenerate() {
        let points = vec![Point::new(5.0, 5.0); 10];
        assert!(matches!(
            estimate(&points, &small_grid(4)),
            Err(DensityError::DegenerateInput { .. })
        ));
    }

    #[test]
    fn collinear_points_are_degenerate() {
        let points: Vec<Point<f64>> = (0..10)
            .map(|i| Point::new(f64::from(i), 2.0 * f64::from(i)))
            .collect();
        assert!(matches!(
            GaussianKde::fit(&points),
            Err(DensityError::DegenerateInput { .. })
        ));
    }

    #[test]
    fn empty_grid_is_rejected() {
        assert!(matches!(
            estimate(&unit_square(), &small_grid(0)),
            Err(DensityError::InvalidGrid { .. })
        ));
        let flat = Grid::square(
            BoundingBox {
                min_x: 0.0,
                min_y: 0.0,
                max_x: 0.0,
                max_y: 1.0,
            },
            10,
        );
        assert!(matches!(
            estimate(&unit_square(), &flat),
            Err(DensityError::InvalidGrid { .. })
        ));
    }
}
