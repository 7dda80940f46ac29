use std::fmt::{self, Write as _};
use std::time::{Duration, Instant};

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::{
    boxes::{BoxAssistedIndex, NeighborIndex},
    error::SpectrumError,
    series::{embedding_offsets, rescale, standard_deviation},
    solver::invert_matrix,
    tangent::{gram_schmidt, propagate},
};

/// Embedding delay between consecutive delay-vector coordinates, in samples.
pub const DELAY: usize = 1;

/// Hard cap on the neighborhood search radius, in rescaled units. The whole
/// series fits inside this radius after rescaling.
pub const EPS_MAX: f64 = 1.0;

/// Seed of the tangent-basis generator. Fixed so runs are reproducible.
pub const TANGENT_SEED: u64 = 2_147_483_647;

/// Draws discarded before the tangent basis is sampled, escaping generator
/// warm-up artifacts.
pub const SEED_WARMUP_DRAWS: usize = 10_000;

/// Minimum wall-clock time between progress snapshots.
pub const REPORT_INTERVAL: Duration = Duration::from_secs(10);

/// Neighborhood floor used when no fixed minimum radius is given, in
/// rescaled units. Replaced online by the running mean accepted radius.
const EPS_MIN_ADAPTIVE: f64 = 1.0e-3;

/// Configuration of the local-linear spectrum estimator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SpectrumSettings {
    /// Embedding dimension m; one exponent is estimated per dimension.
    pub embedding_dim: usize,
    /// Main-loop step budget, clamped to the available series length.
    pub iterations: usize,
    /// Minimum neighborhood radius in the units of the input series;
    /// 0.0 selects the adaptive floor.
    pub eps_min: f64,
    /// Multiplicative radius growth factor applied on each search retry.
    pub eps_step: f64,
    /// Number of neighbors every local regression needs.
    pub min_neighbors: usize,
    /// Reverse the series before estimating.
    pub invert: bool,
}

impl Default for SpectrumSettings {
    fn default() -> Self {
        Self {
            embedding_dim: 2,
            iterations: 1000,
            eps_min: 0.0,
            eps_step: 1.2,
            min_neighbors: 30,
            invert: false,
        }
    }
}

impl fmt::Display for SpectrumSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "m = {}", self.embedding_dim)?;
        writeln!(f, "tau = {DELAY}")?;
        writeln!(f, "iterations = {}", self.iterations)?;
        writeln!(f, "min eps = {}", self.eps_min)?;
        writeln!(f, "neighborhood growth factor = {}", self.eps_step)?;
        writeln!(f, "neighbors count = {}", self.min_neighbors)?;
        write!(f, "invert time series = {}", self.invert)
    }
}

/// Diagnostic averages accumulated alongside the spectrum. Observational
/// only; none of these feed back into the exponents.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SpectrumDiagnostics {
    /// RMS one-step forecast error over the spread of the series.
    pub relative_forecast_error: f64,
    /// RMS one-step forecast error in the units of the input series.
    pub absolute_forecast_error: f64,
    /// Mean accepted neighborhood radius, in the units of the input series.
    pub avg_neighborhood_size: f64,
    /// Mean accepted neighbor count per regression.
    pub avg_neighbor_count: f64,
}

/// Finalized output of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpectrumResult {
    /// Estimated Lyapunov exponents, one per embedding dimension, ordered
    /// from the fastest-growing direction down.
    pub exponents: Vec<f64>,
    /// Number of main-loop steps actually taken.
    pub iterations: u64,
    pub diagnostics: SpectrumDiagnostics,
}

/// Outcome of neighbor selection at one trial radius.
enum Selection {
    /// Enough neighbors cleared the acceptance test; `radius` is the
    /// threshold distance actually used.
    Accepted { count: usize, radius: f64 },
    /// Candidates ran out before the floor was cleared; the caller retries
    /// at a larger radius with the largest available set on record.
    Exhausted { count: usize, radius: f64 },
}

/// Local-linear ("Jacobian") Lyapunov spectrum estimator.
///
/// At every time step the estimator gathers neighbors of the current
/// reconstructed state at an adaptively grown radius, fits a local affine
/// map over them, propagates an m×m tangent basis by the fitted Jacobian
/// row, re-orthonormalizes it, and accumulates the logarithmic stretch
/// factors into the running exponent averages.
///
/// All scratch state is owned by the instance; independent estimators can
/// run concurrently without sharing anything.
#[derive(Debug)]
pub struct JacobianMethod<N: NeighborIndex = BoxAssistedIndex> {
    series: Vec<f64>,
    settings: SpectrumSettings,
    offsets: Vec<usize>,
    /// Span (max − min) of the raw input, used to undo the unit rescale in
    /// diagnostics.
    span: f64,
    spread: f64,
    eps_min: f64,
    eps_fixed: bool,
    index: N,
    found: Vec<usize>,
    distances: Vec<f64>,
    basis: Vec<f64>,
    stretch: Vec<f64>,
    dynamics: Vec<f64>,
    moments: Vec<f64>,
    targets: Vec<f64>,
    exponent_sums: Vec<f64>,
    spectrum: Vec<f64>,
    steps: u64,
    forecast_error_sq: f64,
    radius_sum: f64,
    neighbor_sum: f64,
    log: String,
}

impl JacobianMethod<BoxAssistedIndex> {
    /// Builds an estimator backed by the default box-assisted index.
    ///
    /// See [`JacobianMethod::with_index`] for the validation performed here.
    pub fn new(series: Vec<f64>, settings: SpectrumSettings) -> Result<Self, SpectrumError> {
        let capacity = series.len();
        Self::with_index(series, settings, BoxAssistedIndex::new(capacity))
    }
}

impl<N: NeighborIndex> JacobianMethod<N> {
    /// Builds an estimator over a caller-supplied neighbor index.
    ///
    /// Rescales the series to `[0, 1]`, checks its variance, optionally
    /// reverses it, resolves the minimum radius, and seeds the tangent
    /// basis from the fixed-seed generator (first [`SEED_WARMUP_DRAWS`]
    /// draws discarded) followed by one orthonormalization pass.
    ///
    /// # Errors
    ///
    /// [`SpectrumError::Infeasible`] if the series cannot supply
    /// `min_neighbors` embedded points; [`SpectrumError::DegenerateInput`]
    /// if the series is constant.
    ///
    /// # Panics
    ///
    /// If `embedding_dim` or `min_neighbors` is zero, or `eps_step` is not
    /// greater than one.
    pub fn with_index(
        mut series: Vec<f64>,
        settings: SpectrumSettings,
        index: N,
    ) -> Result<Self, SpectrumError> {
        assert!(settings.embedding_dim >= 1, "embedding_dim must be at least 1");
        assert!(settings.min_neighbors >= 1, "min_neighbors must be at least 1");
        assert!(settings.eps_step > 1.0, "eps_step must exceed 1");

        let m = settings.embedding_dim;
        let available = series.len().saturating_sub(DELAY * (m - 1) + 1);
        if settings.min_neighbors > available {
            return Err(SpectrumError::Infeasible {
                min_neighbors: settings.min_neighbors,
                available,
            });
        }

        let span = rescale(&mut series)?;
        let spread = standard_deviation(&series)?;
        if settings.invert {
            series.reverse();
        }

        let eps_fixed = settings.eps_min != 0.0;
        let eps_min = if eps_fixed {
            settings.eps_min / span
        } else {
            EPS_MIN_ADAPTIVE
        };

        let mut rng = StdRng::seed_from_u64(TANGENT_SEED);
        for _ in 0..SEED_WARMUP_DRAWS {
            rng.gen::<f64>();
        }
        let mut basis = vec![0.0; m * m];
        for value in basis.iter_mut() {
            *value = rng.gen::<f64>();
        }
        let mut stretch = vec![0.0; m];
        gram_schmidt(&mut basis, m, &mut stretch);

        let len = series.len();
        Ok(Self {
            series,
            settings,
            offsets: embedding_offsets(m, DELAY),
            span,
            spread,
            eps_min,
            eps_fixed,
            index,
            found: Vec::with_capacity(len),
            distances: vec![0.0; len],
            basis,
            stretch,
            dynamics: vec![0.0; m],
            moments: vec![0.0; (m + 1) * (m + 1)],
            targets: vec![0.0; m + 1],
            exponent_sums: vec![0.0; m],
            spectrum: vec![0.0; m],
            steps: 0,
            forecast_error_sq: 0.0,
            radius_sum: 0.0,
            neighbor_sum: 0.0,
            log: String::new(),
        })
    }

    /// Runs the estimator over the configured iteration budget and returns
    /// the finalized spectrum. The run either completes in full or fails
    /// outright; no partial spectrum is produced on error.
    pub fn run(&mut self) -> Result<SpectrumResult, SpectrumError> {
        let m = self.settings.embedding_dim;
        let end = self.settings.iterations.min(self.series.len() - DELAY);
        let mut last_report = Instant::now();

        for act in (m - 1) * DELAY..end {
            self.steps += 1;
            self.local_dynamics(act)?;
            propagate(&mut self.basis, &self.dynamics, m);
            gram_schmidt(&mut self.basis, m, &mut self.stretch);
            for j in 0..m {
                self.exponent_sums[j] += self.stretch[j].ln() / DELAY as f64;
            }

            if last_report.elapsed() >= REPORT_INTERVAL || act + 1 == end {
                last_report = Instant::now();
                self.report();
            }
        }

        Ok(SpectrumResult {
            exponents: self.spectrum.clone(),
            iterations: self.steps,
            diagnostics: self.diagnostics(),
        })
    }

    /// Running-average exponent estimates as of the last report. Finalized
    /// once [`run`](Self::run) returns successfully.
    pub fn spectrum(&self) -> &[f64] {
        &self.spectrum
    }

    /// Append-only text sink of periodic progress snapshots: step count
    /// followed by the current per-dimension estimates.
    pub fn log(&self) -> &str {
        &self.log
    }

    pub fn settings(&self) -> &SpectrumSettings {
        &self.settings
    }

    /// Diagnostic averages over the steps taken so far. All values are NaN
    /// before the first step.
    pub fn diagnostics(&self) -> SpectrumDiagnostics {
        if self.steps == 0 {
            return SpectrumDiagnostics {
                relative_forecast_error: f64::NAN,
                absolute_forecast_error: f64::NAN,
                avg_neighborhood_size: f64::NAN,
                avg_neighbor_count: f64::NAN,
            };
        }
        let steps = self.steps as f64;
        let rms = (self.forecast_error_sq / steps).sqrt();
        SpectrumDiagnostics {
            relative_forecast_error: rms / self.spread,
            absolute_forecast_error: rms * self.span,
            avg_neighborhood_size: self.radius_sum * self.span / steps,
            avg_neighbor_count: self.neighbor_sum / steps,
        }
    }

    fn report(&mut self) {
        let steps = self.steps as f64;
        let _ = write!(self.log, "{}", self.steps);
        for j in 0..self.spectrum.len() {
            self.spectrum[j] = self.exponent_sums[j] / steps;
            let _ = write!(self.log, " {:.6}", self.spectrum[j]);
        }
        let _ = writeln!(self.log);
    }

    /// Fits the local affine map around `act` and leaves its Jacobian row
    /// in `self.dynamics`.
    fn local_dynamics(&mut self, act: usize) -> Result<(), SpectrumError> {
        let m = self.settings.embedding_dim;
        let (count, radius) = self.search_neighborhood(act)?;

        self.neighbor_sum += count as f64;
        self.radius_sum += radius;
        if !self.eps_fixed {
            self.eps_min = self.radius_sum / self.steps as f64;
        }

        // Normal equations over the accepted neighbors; row/column 0 is the
        // constant term.
        let size = m + 1;
        self.moments.fill(0.0);
        self.targets.fill(0.0);
        for &n in &self.found[..count] {
            self.moments[0] += 1.0;
            for j in 0..m {
                self.moments[j + 1] += self.series[n - self.offsets[j]];
            }
            for j in 0..m {
                let coord = self.series[n - self.offsets[j]];
                for k in j..m {
                    self.moments[(j + 1) * size + (k + 1)] +=
                        self.series[n - self.offsets[k]] * coord;
                }
            }
        }
        let inv_count = 1.0 / count as f64;
        for i in 0..size {
            for j in i..size {
                self.moments[i * size + j] *= inv_count;
                self.moments[j * size + i] = self.moments[i * size + j];
            }
        }
        let inverse = invert_matrix(&self.moments, size)?;

        for &n in &self.found[..count] {
            let target = self.series[n + DELAY];
            self.targets[0] += target;
            for j in 0..m {
                self.targets[j + 1] += target * self.series[n - self.offsets[j]];
            }
        }
        for value in self.targets.iter_mut() {
            *value *= inv_count;
        }

        let mut forecast = 0.0;
        for j in 0..size {
            forecast += inverse[j] * self.targets[j];
        }
        for i in 0..m {
            let mut coefficient = 0.0;
            for j in 0..size {
                coefficient += inverse[(i + 1) * size + j] * self.targets[j];
            }
            self.dynamics[i] = coefficient;
        }
        for i in 0..m {
            forecast += self.dynamics[i] * self.series[act - self.offsets[i]];
        }
        let actual = self.series[act + DELAY];
        self.forecast_error_sq += (forecast - actual) * (forecast - actual);
        Ok(())
    }

    /// Grows the trial radius from `eps_min / eps_step` by `eps_step` per
    /// retry, rebuilding the index each time, until selection accepts a
    /// neighborhood or the radius cap is reached.
    fn search_neighborhood(&mut self, act: usize) -> Result<(usize, f64), SpectrumError> {
        let m = self.settings.embedding_dim;
        let start = (m - 1) * DELAY;
        let end = self.series.len() - DELAY;
        let mut epsilon = self.eps_min / self.settings.eps_step;

        loop {
            epsilon = (epsilon * self.settings.eps_step).min(EPS_MAX);
            self.index.rebuild(&self.series, epsilon, start, end);
            let found =
                self.index
                    .find_neighbors(&self.series, m, DELAY, epsilon, act, &mut self.found);
            if found > self.settings.min_neighbors {
                match self.select_neighbors(act, found) {
                    Selection::Accepted { count, radius } => return Ok((count, radius)),
                    // At the radius cap nothing larger can be tried; fall
                    // back to the largest available set if it suffices.
                    Selection::Exhausted { count, radius }
                        if epsilon >= EPS_MAX && count >= self.settings.min_neighbors =>
                    {
                        return Ok((count, radius))
                    }
                    Selection::Exhausted { .. } => {}
                }
            }
            if epsilon >= EPS_MAX {
                return Err(SpectrumError::InsufficientNeighbors { index: act });
            }
        }
    }

    /// Orders the closest candidates by max-norm distance and applies the
    /// acceptance test against the neighborhood floor. Only the needed
    /// prefix of the candidate buffer is sorted; accepted indices end up in
    /// `self.found[..count]`.
    fn select_neighbors(&mut self, act: usize, found: usize) -> Selection {
        let m = self.settings.embedding_dim;
        let min_neighbors = self.settings.min_neighbors;
        if self.distances.len() < found {
            self.distances.resize(found, 0.0);
        }

        let mut valid = found;
        let mut query_slot = None;
        for i in 0..found {
            let candidate = self.found[i];
            if candidate == act {
                query_slot = Some(i);
                continue;
            }
            let mut dist = (self.series[act] - self.series[candidate]).abs();
            for j in 1..m {
                let off = self.offsets[j];
                let dx = (self.series[act - off] - self.series[candidate - off]).abs();
                if dx > dist {
                    dist = dx;
                }
            }
            self.distances[i] = dist;
        }
        if let Some(slot) = query_slot {
            valid -= 1;
            self.found[slot] = self.found[valid];
            self.distances[slot] = self.distances[valid];
        }

        for i in 0..min_neighbors {
            self.select_min(i, valid);
        }

        if !self.eps_fixed || self.distances[min_neighbors - 1] >= self.eps_min {
            return Selection::Accepted {
                count: min_neighbors,
                radius: self.distances[min_neighbors - 1],
            };
        }

        // The floor is undershot; extend the sorted prefix until a distance
        // clears it or the candidates run out.
        for i in min_neighbors..valid {
            self.select_min(i, valid);
            if self.distances[i] > self.eps_min {
                return Selection::Accepted {
                    count: i + 1,
                    radius: self.distances[i],
                };
            }
        }

        Selection::Exhausted {
            count: valid,
            radius: self.distances[valid - 1],
        }
    }

    /// One step of the partial selection sort: the smallest distance in
    /// `[slot, valid)` is swapped into `slot` together with its index.
    fn select_min(&mut self, slot: usize, valid: usize) {
        let mut best = slot;
        for j in slot + 1..valid {
            if self.distances[j] < self.distances[best] {
                best = j;
            }
        }
        if best != slot {
            self.distances.swap(slot, best);
            self.found.swap(slot, best);
        }
    }
}
