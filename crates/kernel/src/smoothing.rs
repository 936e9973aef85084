//! Smoothing kernels for Position-Based Fluids.
//!
//! Density is estimated with the Poly6 kernel and constraint gradients with
//! the Spiky kernel gradient (Müller et al. 2003). Both have compact support
//! of radius `H`: every evaluation at `r >= H` is exactly zero.

use std::f32::consts::PI;

use glam::Vec3;

use crate::error::KernelError;

/// Distances below this are treated as coincident particles (zero gradient).
const MIN_GRADIENT_DISTANCE: f32 = 1.0e-6;

/// Poly6 / Spiky / viscosity kernel coefficients for one support radius.
///
/// Built once per solver and shared read-only by every parallel stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothingKernel {
    h: f32,
    h2: f32,
    inv_h: f32,
    poly6: f32,
    spiky_grad: f32,
    visc_laplacian: f32,
}

impl SmoothingKernel {
    /// Build the kernel for support radius `radius`.
    ///
    /// ```text
    /// poly6          =  315 / (64 pi H^9)
    /// spiky_grad     =  -45 / (pi H^6)
    /// visc_laplacian =   45 / (pi H^6)
    /// ```
    ///
    /// # Errors
    /// [`KernelError::InvalidRadius`] if `radius` is not finite and positive.
    pub fn new(radius: f32) -> Result<Self, KernelError> {
        if !radius.is_finite() || radius <= 0.0 {
            return Err(KernelError::InvalidRadius(radius));
        }
        let h = radius;
        let h3 = h * h * h;
        let h6 = h3 * h3;
        let h9 = h6 * h3;
        Ok(Self {
            h,
            h2: h * h,
            inv_h: 1.0 / h,
            poly6: 315.0 / (64.0 * PI * h9),
            spiky_grad: -45.0 / (PI * h6),
            visc_laplacian: 45.0 / (PI * h6),
        })
    }

    /// Support radius `H`.
    #[inline]
    pub fn radius(&self) -> f32 {
        self.h
    }

    /// `H^2`, the squared support radius used for neighbor filtering.
    #[inline]
    pub fn radius_sq(&self) -> f32 {
        self.h2
    }

    /// `1 / H`.
    #[inline]
    pub fn inv_radius(&self) -> f32 {
        self.inv_h
    }

    /// Poly6 normalization coefficient.
    #[inline]
    pub fn poly6_coeff(&self) -> f32 {
        self.poly6
    }

    /// Spiky gradient coefficient (negative).
    #[inline]
    pub fn spiky_grad_coeff(&self) -> f32 {
        self.spiky_grad
    }

    /// Viscosity Laplacian coefficient.
    #[inline]
    pub fn visc_laplacian_coeff(&self) -> f32 {
        self.visc_laplacian
    }

    /// Poly6 density weight for a squared distance `r2`.
    ///
    /// ```text
    /// W(r) = poly6 * (H^2 - r^2)^3   for r < H
    /// W(r) = 0                       for r >= H
    /// ```
    ///
    /// Never negative; the maximum is `poly6 * H^6` at `r2 = 0`.
    #[inline]
    pub fn density_weight(&self, r2: f32) -> f32 {
        let d = (self.h2 - r2).max(0.0);
        (self.poly6 * d * d * d).max(0.0)
    }

    /// `W(0)`, the contribution of a particle to its own density.
    #[inline]
    pub fn self_density(&self) -> f32 {
        self.density_weight(0.0)
    }

    /// Spiky kernel gradient for the displacement `offset = p_i - p_j`.
    ///
    /// ```text
    /// grad W = spiky_grad * (H - r)^2 * offset / r   for 0 < r < H
    /// ```
    ///
    /// Zero outside the support and for (near) coincident particles, where
    /// the direction is undefined.
    #[inline]
    pub fn spiky_gradient(&self, offset: Vec3) -> Vec3 {
        let r = offset.length();
        if r < MIN_GRADIENT_DISTANCE || r >= self.h {
            return Vec3::ZERO;
        }
        let d = self.h - r;
        offset * (self.spiky_grad * d * d / r)
    }

    /// Viscosity kernel Laplacian at distance `r`; zero outside the support.
    #[inline]
    pub fn viscosity_laplacian(&self, r: f32) -> f32 {
        (self.visc_laplacian * (self.h - r)).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_radius() {
        assert_eq!(SmoothingKernel::new(0.0), Err(KernelError::InvalidRadius(0.0)));
        assert_eq!(SmoothingKernel::new(-1.0), Err(KernelError::InvalidRadius(-1.0)));
        assert!(SmoothingKernel::new(f32::NAN).is_err());
        assert!(SmoothingKernel::new(f32::INFINITY).is_err());
    }

    #[test]
    fn coefficients_match_closed_form() {
        let k = SmoothingKernel::new(0.32).unwrap();
        let h = 0.32_f32;
        assert!((k.poly6_coeff() - 315.0 / (64.0 * PI * h.powi(9))).abs() / k.poly6_coeff() < 1.0e-5);
        assert!((k.spiky_grad_coeff() + 45.0 / (PI * h.powi(6))).abs() / k.visc_laplacian_coeff() < 1.0e-5);
        assert_eq!(k.spiky_grad_coeff(), -k.visc_laplacian_coeff());
        assert!((k.inv_radius() - 1.0 / h).abs() < 1.0e-6);
    }

    #[test]
    fn density_weight_at_zero_is_maximum() {
        let k = SmoothingKernel::new(0.32).unwrap();
        let expected = k.poly6_coeff() * k.radius_sq().powi(3);
        assert!((k.self_density() - expected).abs() / expected < 1.0e-6);
        for i in 1..32 {
            let r = i as f32 * 0.01;
            assert!(k.density_weight(r * r) <= k.self_density());
        }
    }

    #[test]
    fn density_weight_vanishes_at_and_beyond_support() {
        let k = SmoothingKernel::new(0.1).unwrap();
        assert_eq!(k.density_weight(k.radius_sq()), 0.0);
        assert_eq!(k.density_weight(0.25), 0.0);
        // Continuity: just inside the support the weight is tiny.
        let r = 0.1 - 1.0e-4;
        assert!(k.density_weight(r * r) < 1.0e-6 * k.self_density());
    }

    #[test]
    fn density_weight_non_negative_and_monotone() {
        let k = SmoothingKernel::new(0.2).unwrap();
        let mut prev = f32::INFINITY;
        for i in 0..=40 {
            let r = i as f32 * 0.0075;
            let w = k.density_weight(r * r);
            assert!(w >= 0.0);
            assert!(w <= prev, "poly6 must not increase with distance (r={r})");
            prev = w;
        }
    }

    #[test]
    fn gradient_zero_at_origin_and_outside() {
        let k = SmoothingKernel::new(0.1).unwrap();
        assert_eq!(k.spiky_gradient(Vec3::ZERO), Vec3::ZERO);
        assert_eq!(k.spiky_gradient(Vec3::new(0.1001, 0.0, 0.0)), Vec3::ZERO);
        assert_eq!(k.spiky_gradient(Vec3::new(0.5, 0.0, 0.0)), Vec3::ZERO);
    }

    #[test]
    fn gradient_points_toward_neighbor() {
        // offset = p_i - p_j along +x: the kernel decreases with distance, so
        // the gradient with respect to p_i points along -x.
        let k = SmoothingKernel::new(0.1).unwrap();
        let g = k.spiky_gradient(Vec3::new(0.05, 0.0, 0.0));
        assert!(g.x < 0.0, "gradient x should be negative, got {}", g.x);
        assert!(g.y.abs() < 1.0e-10);
        assert!(g.z.abs() < 1.0e-10);
        // Antisymmetric in the offset.
        assert_eq!(k.spiky_gradient(Vec3::new(-0.05, 0.0, 0.0)), -g);
    }

    #[test]
    fn viscosity_laplacian_support() {
        let k = SmoothingKernel::new(0.1).unwrap();
        assert_eq!(k.viscosity_laplacian(0.1), 0.0);
        assert_eq!(k.viscosity_laplacian(0.3), 0.0);
        assert!((k.viscosity_laplacian(0.0) - k.visc_laplacian_coeff() * 0.1).abs() < 1.0e-3);
    }

    #[test]
    fn poly6_normalization_numerical() {
        // Riemann sum over the cube enclosing the support sphere.
        let k = SmoothingKernel::new(0.1).unwrap();
        let n = 80;
        let half = k.radius();
        let cell = 2.0 * half / n as f32;
        let dv = (cell * cell * cell) as f64;
        let mut integral = 0.0_f64;
        for ix in 0..n {
            let x = -half + (ix as f32 + 0.5) * cell;
            for iy in 0..n {
                let y = -half + (iy as f32 + 0.5) * cell;
                for iz in 0..n {
                    let z = -half + (iz as f32 + 0.5) * cell;
                    integral += k.density_weight(x * x + y * y + z * z) as f64 * dv;
                }
            }
        }
        assert!((integral - 1.0).abs() < 0.02, "poly6 integral = {integral}, expected ~1.0");
    }
}
