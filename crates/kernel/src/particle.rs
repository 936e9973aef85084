//! Fluid particle storage.
//!
//! Fields that a stage both reads and rewrites (predicted positions and
//! velocities) are double-buffered: a stage reads the front buffer, writes
//! its own slot of the back buffer, and the solver swaps them once every
//! worker has finished.

use glam::Vec3;

/// Front/back pair of equally sized buffers.
#[derive(Debug, Clone)]
pub struct DoubleBuffer<T> {
    front: Vec<T>,
    back: Vec<T>,
}

impl<T: Clone> DoubleBuffer<T> {
    /// Both buffers initialized to `data`.
    pub fn new(data: Vec<T>) -> Self {
        Self {
            back: data.clone(),
            front: data,
        }
    }
}

impl<T> DoubleBuffer<T> {
    /// Current contents.
    #[inline]
    pub fn read(&self) -> &[T] {
        &self.front
    }

    /// Buffer the next stage writes into.
    #[inline]
    pub fn write(&mut self) -> &mut [T] {
        &mut self.back
    }

    /// Borrow the read side immutably and the write side mutably at once.
    #[inline]
    pub fn split(&mut self) -> (&[T], &mut [T]) {
        (&self.front, &mut self.back)
    }

    /// Publish the write side: it becomes the new read side.
    #[inline]
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.front, &mut self.back);
    }

    /// Number of elements in each buffer.
    #[inline]
    pub fn len(&self) -> usize {
        self.front.len()
    }

    /// `true` when the buffers hold no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.front.is_empty()
    }
}

/// State of every fluid particle, indexed by a stable particle id.
///
/// All buffers have the same length, fixed at construction.
#[derive(Debug, Clone)]
pub struct FluidBody {
    /// Committed positions at the start of the sub-step (meters).
    pub positions: Vec<Vec3>,
    /// Predicted positions, refined by the constraint iterations.
    pub predicted: DoubleBuffer<Vec3>,
    /// Velocities (m/s).
    pub velocities: DoubleBuffer<Vec3>,
    /// Density estimate of the last constraint iteration (kg/m^3).
    pub densities: Vec<f32>,
    /// Lagrange multiplier of the last constraint iteration.
    pub lambdas: Vec<f32>,
    /// Vorticity of the last sub-step.
    pub vorticities: Vec<Vec3>,
}

impl FluidBody {
    /// Particles at `positions`, all moving with `initial_velocity`.
    pub fn new(positions: Vec<Vec3>, initial_velocity: Vec3) -> Self {
        let n = positions.len();
        Self {
            predicted: DoubleBuffer::new(positions.clone()),
            velocities: DoubleBuffer::new(vec![initial_velocity; n]),
            densities: vec![0.0; n],
            lambdas: vec![0.0; n],
            vorticities: vec![Vec3::ZERO; n],
            positions,
        }
    }

    /// Number of particles.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// `true` if the body holds no particles.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Sum of `v` over all particles (momentum per unit mass).
    pub fn velocity_sum(&self) -> Vec3 {
        self.velocities.read().iter().copied().sum()
    }

    /// Mean position of all particles, or zero for an empty body.
    pub fn centroid(&self) -> Vec3 {
        if self.is_empty() {
            return Vec3::ZERO;
        }
        self.positions.iter().copied().sum::<Vec3>() / self.len() as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body() {
        let body = FluidBody::new(Vec::new(), Vec3::ZERO);
        assert_eq!(body.len(), 0);
        assert!(body.is_empty());
        assert_eq!(body.centroid(), Vec3::ZERO);
    }

    #[test]
    fn new_body_initial_state() {
        let body = FluidBody::new(vec![Vec3::X, Vec3::Y], Vec3::new(0.0, -1.0, 0.0));
        assert_eq!(body.len(), 2);
        assert_eq!(body.predicted.read(), &[Vec3::X, Vec3::Y]);
        assert_eq!(body.velocities.read()[1], Vec3::new(0.0, -1.0, 0.0));
        assert_eq!(body.velocity_sum(), Vec3::new(0.0, -2.0, 0.0));
        assert_eq!(body.densities, vec![0.0; 2]);
        assert_eq!(body.centroid(), Vec3::new(0.5, 0.5, 0.0));
    }

    #[test]
    fn swap_publishes_write_side() {
        let mut buf = DoubleBuffer::new(vec![1, 2, 3]);
        {
            let (read, write) = buf.split();
            for (w, r) in write.iter_mut().zip(read) {
                *w = r * 10;
            }
        }
        assert_eq!(buf.read(), &[1, 2, 3]);
        buf.swap();
        assert_eq!(buf.read(), &[10, 20, 30]);
        assert_eq!(buf.len(), 3);
    }
}
