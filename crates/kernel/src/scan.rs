//! Multi-level parallel inclusive prefix sum.
//!
//! The input is split into groups of [`GROUP_WIDTH`] elements. Each group is
//! scanned locally in parallel, the group totals are gathered into the next
//! level of a pyramid and scanned recursively with the same routine, and the
//! scanned totals are then added back onto every group but the first.
//! Recursion stops once a level fits in a single group, so the depth is
//! `O(log_W N)`.
//!
//! The pyramid buffers are owned by [`PrefixScan`] and reused between calls;
//! they only ever grow.

use rayon::prelude::*;

/// Number of elements scanned by one worker at the lowest level.
pub const GROUP_WIDTH: usize = 512;

/// Headroom applied when the pyramid has to grow.
const GROWTH_FACTOR: f32 = 1.5;

/// Reusable state for repeated inclusive scans.
///
/// Values are expected to be non-negative counts whose total fits in a `u32`;
/// overflow wraps and is not reported.
#[derive(Debug, Default)]
pub struct PrefixScan {
    /// `levels[k]` holds the group totals of level `k` (level 0 is the input).
    levels: Vec<Vec<u32>>,
    /// Largest input length the pyramid can serve without reallocating.
    capacity: usize,
}

impl PrefixScan {
    /// Empty scan state; buffers are allocated on first use.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan state pre-sized for inputs up to `capacity` elements.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut scan = Self::new();
        scan.reserve(capacity);
        scan
    }

    /// Largest input length served without growing the pyramid.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of pyramid levels currently allocated.
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Grow the pyramid so inputs of `len` elements need no allocation.
    ///
    /// Growth reserves `1.5 * len` to amortize slowly increasing inputs.
    /// Never shrinks.
    pub fn reserve(&mut self, len: usize) {
        if len <= self.capacity {
            return;
        }
        let target = ((len as f32) * GROWTH_FACTOR).ceil() as usize;
        let mut levels = Vec::new();
        let mut n = target;
        while n > GROUP_WIDTH {
            n = n.div_ceil(GROUP_WIDTH);
            levels.push(vec![0u32; n]);
        }
        tracing::debug!(capacity = target, depth = levels.len(), "prefix scan pyramid grown");
        self.levels = levels;
        self.capacity = target;
    }

    /// Inclusive prefix sum: `output[i] = input[0] + ... + input[i]`.
    ///
    /// `output` must be at least as long as `input`; extra elements are left
    /// untouched. Empty input is a no-op.
    ///
    /// # Panics
    /// If `output` is shorter than `input`.
    pub fn inclusive_scan(&mut self, input: &[u32], output: &mut [u32]) {
        assert!(
            output.len() >= input.len(),
            "scan output ({}) shorter than input ({})",
            output.len(),
            input.len()
        );
        let out = &mut output[..input.len()];
        out.copy_from_slice(input);
        self.inclusive_scan_in_place(out);
    }

    /// In-place variant of [`PrefixScan::inclusive_scan`].
    pub fn inclusive_scan_in_place(&mut self, values: &mut [u32]) {
        if values.is_empty() {
            return;
        }
        self.reserve(values.len());
        scan_level(values, &mut self.levels);
    }
}

/// Scan `values` in place using `pyramid` for the group totals.
fn scan_level(values: &mut [u32], pyramid: &mut [Vec<u32>]) {
    if values.len() <= GROUP_WIDTH {
        scan_group(values);
        return;
    }

    let Some((sums, rest)) = pyramid.split_first_mut() else {
        // Pyramid shallower than the input requires; only reachable if the
        // capacity bookkeeping is wrong. Fall back to a sequential scan.
        scan_group(values);
        return;
    };

    let groups = values.len().div_ceil(GROUP_WIDTH);
    let sums = &mut sums[..groups];

    // 1. Local scans, one group per task.
    values.par_chunks_mut(GROUP_WIDTH).for_each(scan_group);

    // 2. Gather each group's total (its last element after the local scan).
    sums.par_iter_mut()
        .zip(values.par_chunks(GROUP_WIDTH))
        .for_each(|(sum, chunk)| *sum = chunk[chunk.len() - 1]);

    // 3. Scan the totals with the next pyramid level.
    scan_level(sums, rest);

    // 4. Add the running total of all preceding groups.
    let sums = &*sums;
    values
        .par_chunks_mut(GROUP_WIDTH)
        .enumerate()
        .skip(1)
        .for_each(|(g, chunk)| {
            let offset = sums[g - 1];
            for v in chunk {
                *v = v.wrapping_add(offset);
            }
        });
}

/// Sequential inclusive scan of one group.
fn scan_group(values: &mut [u32]) {
    let mut running = 0u32;
    for v in values {
        running = running.wrapping_add(*v);
        *v = running;
    }
}
