//! Axis-aligned bounding boxes for domains, fill volumes and containers.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::KernelError;

/// Axis-aligned box given by its two corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    /// Minimum corner.
    pub min: Vec3,
    /// Maximum corner.
    pub max: Vec3,
}

impl Aabb {
    /// Box spanning `min..max`. No validation; see [`Aabb::validate`].
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Check that both corners are finite and `min <= max` on every axis.
    pub fn validate(&self) -> Result<(), KernelError> {
        if !self.min.is_finite() || !self.max.is_finite() || self.min.cmpgt(self.max).any() {
            return Err(KernelError::InvalidBounds {
                min: self.min.to_array(),
                max: self.max.to_array(),
            });
        }
        Ok(())
    }

    /// Edge lengths.
    #[inline]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Inclusive containment test.
    #[inline]
    pub fn contains(&self, p: Vec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    /// Grow the box by `margin` on every side.
    pub fn expanded(&self, margin: f32) -> Self {
        Self::new(self.min - Vec3::splat(margin), self.max + Vec3::splat(margin))
    }

    /// Project `p` onto the box.
    #[inline]
    pub fn clamp(&self, p: Vec3) -> Vec3 {
        p.clamp(self.min, self.max)
    }

    /// Smallest box containing every point, or `None` for an empty slice.
    pub fn enclosing(points: &[Vec3]) -> Option<Self> {
        let first = *points.first()?;
        let (min, max) = points
            .iter()
            .fold((first, first), |(lo, hi), &p| (lo.min(p), hi.max(p)));
        Some(Self::new(min, max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_is_inclusive() {
        let b = Aabb::new(Vec3::ZERO, Vec3::ONE);
        assert!(b.contains(Vec3::ZERO));
        assert!(b.contains(Vec3::ONE));
        assert!(b.contains(Vec3::splat(0.5)));
        assert!(!b.contains(Vec3::new(1.0001, 0.5, 0.5)));
    }

    #[test]
    fn expanded_grows_every_side() {
        let b = Aabb::new(Vec3::ZERO, Vec3::ONE).expanded(0.25);
        assert_eq!(b.min, Vec3::splat(-0.25));
        assert_eq!(b.max, Vec3::splat(1.25));
        assert_eq!(b.size(), Vec3::splat(1.5));
    }

    #[test]
    fn inverted_box_is_rejected() {
        let b = Aabb::new(Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 1.0));
        assert!(matches!(b.validate(), Err(KernelError::InvalidBounds { .. })));
        assert!(Aabb::new(Vec3::ZERO, Vec3::ONE).validate().is_ok());
    }

    #[test]
    fn enclosing_points() {
        assert!(Aabb::enclosing(&[]).is_none());
        let b = Aabb::enclosing(&[Vec3::new(1.0, -2.0, 0.0), Vec3::new(-1.0, 3.0, 0.5)]).unwrap();
        assert_eq!(b.min, Vec3::new(-1.0, -2.0, 0.0));
        assert_eq!(b.max, Vec3::new(1.0, 3.0, 0.5));
    }
}
