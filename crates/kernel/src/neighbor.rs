//! Counting-sort spatial hash for neighbor search.
//!
//! Uses cell-count + scanned-offset + sorted-index arrays rather than a
//! `HashMap`, so a rebuild is four flat data-parallel passes:
//!
//! 1. reset the per-cell atomic counters,
//! 2. count particles per cell (`fetch_add`),
//! 3. inclusive-scan the counts into cell offsets,
//! 4. scatter particle indices into their cell's slot range (`fetch_sub`).
//!
//! Fluid and boundary particles share one combined index space: fluid
//! particles occupy `[0, fluid_count)` and boundary particles follow.

use std::ops::Range;
use std::sync::atomic::{AtomicU32, Ordering};

use glam::{IVec3, UVec3, Vec3};
use rayon::prelude::*;

use crate::bounds::Aabb;
use crate::error::KernelError;
use crate::scan::PrefixScan;

/// Identity of a neighbor candidate within its own particle set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParticleRef {
    /// Index into the fluid particle set.
    Fluid(usize),
    /// Index into the boundary particle set.
    Boundary(usize),
}

/// A neighbor yielded by [`SpatialHash::for_each_neighbor`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Which particle this is.
    pub particle: ParticleRef,
    /// `p_query - p_neighbor`.
    pub offset: Vec3,
    /// `|offset|^2`.
    pub dist_sq: f32,
}

/// Position-to-cell mapping, split out so parallel passes can copy it while
/// the hash buffers are mutably borrowed.
#[derive(Debug, Clone, Copy)]
struct CellGeometry {
    origin: Vec3,
    inv_cell_size: f32,
    dims: UVec3,
}

impl CellGeometry {
    #[inline]
    fn coord(&self, p: Vec3) -> UVec3 {
        let max = (self.dims - UVec3::ONE).as_vec3();
        // NaN coordinates land in cell 0 rather than poisoning the index.
        let c = ((p - self.origin) * self.inv_cell_size).floor().clamp(Vec3::ZERO, max);
        c.as_uvec3()
    }

    #[inline]
    fn id(&self, c: UVec3) -> u32 {
        c.x + c.y * self.dims.x + c.z * self.dims.x * self.dims.y
    }
}

/// Uniform-grid spatial hash rebuilt from scratch every sub-step.
///
/// Positions outside the bounds are clamped into the border cells, so the
/// hash never rejects a particle. Cell size must be at least the kernel
/// support radius for the 27-cell query to be complete.
#[derive(Debug)]
pub struct SpatialHash {
    bounds: Aabb,
    cell_size: f32,
    geometry: CellGeometry,
    bin_count: usize,
    fluid_count: usize,
    total_count: usize,
    deterministic: bool,
    /// Per-cell atomic counters; write cursors during the scatter pass.
    counters: Vec<AtomicU32>,
    /// Snapshot of the per-cell counts of the last rebuild.
    bin_counts: Vec<u32>,
    /// `bin_count + 1` entries, `cell_offsets[0] == 0`.
    cell_offsets: Vec<u32>,
    /// Cell of each particle (combined index space).
    cell_ids: Vec<u32>,
    /// Scatter targets.
    slots: Vec<AtomicU32>,
    /// Combined particle indices sorted by cell.
    sorted_indices: Vec<u32>,
    scan: PrefixScan,
}

impl SpatialHash {
    /// Create a hash covering `bounds` sized for `total_count` particles, of
    /// which the first `fluid_count` are fluid.
    ///
    /// Grid dimension per axis is `ceil(extent / cell_size)` (at least 1).
    ///
    /// # Errors
    /// [`KernelError::InvalidCellSize`] or [`KernelError::InvalidBounds`].
    pub fn new(
        bounds: Aabb,
        total_count: usize,
        fluid_count: usize,
        cell_size: f32,
    ) -> Result<Self, KernelError> {
        if !cell_size.is_finite() || cell_size <= 0.0 {
            return Err(KernelError::InvalidCellSize(cell_size));
        }
        bounds.validate()?;

        let dims = (bounds.size() / cell_size).ceil().max(Vec3::ONE).as_uvec3();
        let bin_count = dims.x as usize * dims.y as usize * dims.z as usize;
        let total_count = total_count.max(fluid_count);

        let mut hash = Self {
            bounds,
            cell_size,
            geometry: CellGeometry {
                origin: bounds.min,
                inv_cell_size: 1.0 / cell_size,
                dims,
            },
            bin_count,
            fluid_count,
            total_count: 0,
            deterministic: true,
            counters: (0..bin_count).map(|_| AtomicU32::new(0)).collect(),
            bin_counts: vec![0; bin_count],
            cell_offsets: vec![0; bin_count + 1],
            cell_ids: Vec::new(),
            slots: Vec::new(),
            sorted_indices: Vec::new(),
            scan: PrefixScan::with_capacity(bin_count),
        };
        hash.resize(total_count, fluid_count);
        Ok(hash)
    }

    /// Enable or disable the per-cell ascending sort after each rebuild.
    ///
    /// With it off, intra-cell order depends on thread scheduling; the set
    /// of particles per cell is the same either way.
    pub fn set_deterministic(&mut self, deterministic: bool) {
        self.deterministic = deterministic;
    }

    fn resize(&mut self, total_count: usize, fluid_count: usize) {
        self.cell_ids.resize(total_count, 0);
        self.slots.resize_with(total_count, || AtomicU32::new(0));
        self.sorted_indices.resize(total_count, 0);
        self.total_count = total_count;
        self.fluid_count = fluid_count;
    }

    /// Rebuild from the current fluid and boundary positions.
    ///
    /// If the slice lengths differ from the counts the hash was sized for,
    /// the per-particle buffers are resized first.
    pub fn rebuild(&mut self, fluid: &[Vec3], boundary: &[Vec3]) {
        let total = fluid.len() + boundary.len();
        if fluid.len() != self.fluid_count || total != self.total_count {
            tracing::debug!(
                expected_fluid = self.fluid_count,
                expected_total = self.total_count,
                fluid = fluid.len(),
                total,
                "spatial hash resized to match particle counts"
            );
            self.resize(total, fluid.len());
        }

        let geometry = self.geometry;
        let nf = self.fluid_count;
        let deterministic = self.deterministic;
        let Self {
            counters,
            bin_counts,
            cell_offsets,
            cell_ids,
            slots,
            sorted_indices,
            scan,
            ..
        } = self;

        // --- 1. Reset ---
        counters.par_iter().for_each(|c| c.store(0, Ordering::Relaxed));

        // --- 2. Count ---
        cell_ids.par_iter_mut().enumerate().for_each(|(i, id)| {
            let p = if i < nf { fluid[i] } else { boundary[i - nf] };
            let cell = geometry.id(geometry.coord(p));
            *id = cell;
            counters[cell as usize].fetch_add(1, Ordering::Relaxed);
        });

        // --- 3. Scan counts into offsets ---
        bin_counts
            .par_iter_mut()
            .zip(counters.par_iter())
            .for_each(|(b, c)| *b = c.load(Ordering::Relaxed));
        cell_offsets[0] = 0;
        scan.inclusive_scan(bin_counts, &mut cell_offsets[1..]);

        // --- 4. Scatter ---
        // Cursors start at each cell's end offset and count down.
        counters
            .par_iter()
            .zip(cell_offsets[1..].par_iter())
            .for_each(|(c, &end)| c.store(end, Ordering::Relaxed));
        cell_ids.par_iter().enumerate().for_each(|(i, &cell)| {
            let slot = counters[cell as usize].fetch_sub(1, Ordering::Relaxed) - 1;
            slots[slot as usize].store(i as u32, Ordering::Relaxed);
        });
        sorted_indices
            .par_iter_mut()
            .zip(slots.par_iter_mut())
            .for_each(|(dst, src)| *dst = *src.get_mut());

        if deterministic {
            let cell_ids = &*cell_ids;
            sorted_indices
                .par_chunk_by_mut(|&a, &b| cell_ids[a as usize] == cell_ids[b as usize])
                .for_each(|cell| cell.sort_unstable());
        }
    }

    // --- Queries ---

    /// Domain covered by the grid.
    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    /// Edge length of one cell.
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Number of cells per axis.
    pub fn dimension(&self) -> UVec3 {
        self.geometry.dims
    }

    /// Total number of cells.
    pub fn bin_count(&self) -> usize {
        self.bin_count
    }

    /// Fluid particles in the combined index space.
    pub fn fluid_count(&self) -> usize {
        self.fluid_count
    }

    /// Fluid plus boundary particles.
    pub fn total_count(&self) -> usize {
        self.total_count
    }

    /// Cell coordinate of `p`, clamped to the grid.
    #[inline]
    pub fn cell_coord(&self, p: Vec3) -> UVec3 {
        self.geometry.coord(p)
    }

    /// Flat cell id of a cell coordinate.
    #[inline]
    pub fn cell_id(&self, coord: UVec3) -> u32 {
        self.geometry.id(coord)
    }

    /// Slot range of `cell` within [`SpatialHash::sorted_indices`].
    #[inline]
    pub fn cell_range(&self, cell: usize) -> Range<usize> {
        self.cell_offsets[cell] as usize..self.cell_offsets[cell + 1] as usize
    }

    /// Per-cell particle counts of the last rebuild.
    pub fn bin_counts(&self) -> &[u32] {
        &self.bin_counts
    }

    /// Scanned cell offsets (`bin_count + 1` entries, leading zero).
    pub fn cell_offsets(&self) -> &[u32] {
        &self.cell_offsets
    }

    /// Combined particle indices grouped by cell.
    pub fn sorted_indices(&self) -> &[u32] {
        &self.sorted_indices
    }

    /// Cell of each particle at the last rebuild (combined index space).
    pub fn cell_ids(&self) -> &[u32] {
        &self.cell_ids
    }

    /// Map a combined index back to its particle set.
    #[inline]
    pub fn particle_ref(&self, combined: usize) -> ParticleRef {
        if combined < self.fluid_count {
            ParticleRef::Fluid(combined)
        } else {
            ParticleRef::Boundary(combined - self.fluid_count)
        }
    }

    /// Visit every particle within `radius` of `p`.
    ///
    /// Scans the 3x3x3 block of cells around `p`. `fluid` and `boundary`
    /// supply current positions (they may have moved since the rebuild).
    /// A particle located exactly at `p`, including the querying particle
    /// itself, is reported with a zero offset.
    ///
    /// `radius` must not exceed [`SpatialHash::cell_size`]; beyond that the
    /// 3x3x3 block no longer covers the query sphere.
    pub fn for_each_neighbor<F>(
        &self,
        p: Vec3,
        fluid: &[Vec3],
        boundary: &[Vec3],
        radius: f32,
        mut f: F,
    ) where
        F: FnMut(Neighbor),
    {
        debug_assert!(
            radius <= self.cell_size,
            "query radius {radius} exceeds cell size {}",
            self.cell_size
        );
        let center = self.geometry.coord(p).as_ivec3();
        let dims = self.geometry.dims.as_ivec3();
        let radius_sq = radius * radius;
        let nf = self.fluid_count;

        for dz in -1..=1 {
            for dy in -1..=1 {
                for dx in -1..=1 {
                    let c = center + IVec3::new(dx, dy, dz);
                    if c.cmplt(IVec3::ZERO).any() || c.cmpge(dims).any() {
                        continue;
                    }
                    let cell = self.geometry.id(c.as_uvec3()) as usize;
                    for &j in &self.sorted_indices[self.cell_range(cell)] {
                        let j = j as usize;
                        let (particle, q) = if j < nf {
                            (ParticleRef::Fluid(j), fluid[j])
                        } else {
                            (ParticleRef::Boundary(j - nf), boundary[j - nf])
                        };
                        let offset = p - q;
                        let dist_sq = offset.length_squared();
                        if dist_sq < radius_sq {
                            f(Neighbor {
                                particle,
                                offset,
                                dist_sq,
                            });
                        }
                    }
                }
            }
        }
    }
}
