/// Number of boxes per grid axis. Must be a power of two so grid coordinates
/// can be folded with a mask.
pub const BOX_COUNT: usize = 512;

const BOX_MASK: usize = BOX_COUNT - 1;

/// Radius-based neighbor lookup over a delay-embedded scalar series.
///
/// The estimator treats the index as an opaque collaborator: it is rebuilt
/// at every radius-growth retry and queried once per trial radius. `rebuild`
/// receives the valid index range `[start, end)`; `start` equals
/// `(m − 1)·τ`, the earliest index with a complete delay vector.
pub trait NeighborIndex {
    /// Reindexes the series at the given radius.
    fn rebuild(&mut self, series: &[f64], radius: f64, start: usize, end: usize);

    /// Collects into `out` the indices of all points in the valid range
    /// whose max-norm embedding distance to `query` is at most `radius`,
    /// the query point included. Returns the candidate count.
    fn find_neighbors(
        &self,
        series: &[f64],
        dim: usize,
        delay: usize,
        radius: f64,
        query: usize,
        out: &mut Vec<usize>,
    ) -> usize;
}

/// Box-assisted neighbor index: points are binned into a wrap-around
/// `BOX_COUNT`×`BOX_COUNT` grid keyed on the first and last embedding
/// coordinates, with per-box chained lists. A query scans the 3×3 block of
/// boxes around its own cell and applies the exact max-norm filter.
#[derive(Debug)]
pub struct BoxAssistedIndex {
    heads: Vec<i64>,
    next: Vec<i64>,
    span_offset: usize,
}

impl BoxAssistedIndex {
    pub fn new(capacity: usize) -> Self {
        Self {
            heads: vec![-1; BOX_COUNT * BOX_COUNT],
            next: vec![-1; capacity],
            span_offset: 0,
        }
    }
}

impl NeighborIndex for BoxAssistedIndex {
    fn rebuild(&mut self, series: &[f64], radius: f64, start: usize, end: usize) {
        if self.next.len() < series.len() {
            self.next.resize(series.len(), -1);
        }
        self.heads.fill(-1);
        self.span_offset = start;
        for n in start..end {
            let i = ((series[n] / radius) as usize) & BOX_MASK;
            let j = ((series[n - start] / radius) as usize) & BOX_MASK;
            let cell = i * BOX_COUNT + j;
            self.next[n] = self.heads[cell];
            self.heads[cell] = n as i64;
        }
    }

    fn find_neighbors(
        &self,
        series: &[f64],
        dim: usize,
        delay: usize,
        radius: f64,
        query: usize,
        out: &mut Vec<usize>,
    ) -> usize {
        out.clear();
        let qi = (series[query] / radius) as usize;
        let qj = (series[query - self.span_offset] / radius) as usize;
        for di in 0..3 {
            let row = (qi.wrapping_add(BOX_COUNT + di - 1)) & BOX_MASK;
            for dj in 0..3 {
                let col = (qj.wrapping_add(BOX_COUNT + dj - 1)) & BOX_MASK;
                let mut element = self.heads[row * BOX_COUNT + col];
                while element >= 0 {
                    let candidate = element as usize;
                    element = self.next[candidate];
                    let mut inside = true;
                    for k in 0..dim {
                        let off = k * delay;
                        if (series[query - off] - series[candidate - off]).abs() > radius {
                            inside = false;
                            break;
                        }
                    }
                    if inside {
                        out.push(candidate);
                    }
                }
            }
        }
        out.len()
    }
}
