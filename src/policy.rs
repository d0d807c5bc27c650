//! Thread count and size thresholds that decide when fanning out pays off.
//!
//! A [`ParallelismPolicy`] is shared behind an `Arc` by everything that
//! needs to decide whether to split work. Every field is an independent
//! atomic, so concurrent setters race with last-writer-wins semantics and
//! readers never observe a torn value.

use crate::config::Config;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Upper bound applied to every thread count.
pub const MAX_THREADS: usize = 1024;

pub const DEFAULT_THRESHOLD_1D: usize = 32_768;
pub const DEFAULT_THRESHOLD_2D: usize = 65_536;
pub const DEFAULT_THRESHOLD_3D: usize = 65_536;
pub const DEFAULT_THRESHOLD_1D_FFT_2: usize = 8_192;
pub const DEFAULT_THRESHOLD_1D_FFT_4: usize = 65_536;

/// Selects which threshold applies to an array shape or operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DimensionKind {
    OneD,
    TwoD,
    ThreeD,
    /// 1D transform split across two threads.
    OneDFft2,
    /// 1D transform split across four threads.
    OneDFft4,
}

impl DimensionKind {
    pub const ALL: [DimensionKind; 5] = [
        DimensionKind::OneD,
        DimensionKind::TwoD,
        DimensionKind::ThreeD,
        DimensionKind::OneDFft2,
        DimensionKind::OneDFft4,
    ];

    fn slot(self) -> usize {
        match self {
            DimensionKind::OneD => 0,
            DimensionKind::TwoD => 1,
            DimensionKind::ThreeD => 2,
            DimensionKind::OneDFft2 => 3,
            DimensionKind::OneDFft4 => 4,
        }
    }
}

/// Minimum problem sizes to parallelize, one per [`DimensionKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub one_d: usize,
    pub two_d: usize,
    pub three_d: usize,
    pub one_d_fft_2: usize,
    pub one_d_fft_4: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            one_d: DEFAULT_THRESHOLD_1D,
            two_d: DEFAULT_THRESHOLD_2D,
            three_d: DEFAULT_THRESHOLD_3D,
            one_d_fft_2: DEFAULT_THRESHOLD_1D_FFT_2,
            one_d_fft_4: DEFAULT_THRESHOLD_1D_FFT_4,
        }
    }
}

impl Thresholds {
    pub fn get(&self, kind: DimensionKind) -> usize {
        match kind {
            DimensionKind::OneD => self.one_d,
            DimensionKind::TwoD => self.two_d,
            DimensionKind::ThreeD => self.three_d,
            DimensionKind::OneDFft2 => self.one_d_fft_2,
            DimensionKind::OneDFft4 => self.one_d_fft_4,
        }
    }

    pub fn set(&mut self, kind: DimensionKind, value: usize) {
        match kind {
            DimensionKind::OneD => self.one_d = value,
            DimensionKind::TwoD => self.two_d = value,
            DimensionKind::ThreeD => self.three_d = value,
            DimensionKind::OneDFft2 => self.one_d_fft_2 = value,
            DimensionKind::OneDFft4 => self.one_d_fft_4 = value,
        }
    }
}

/// Number of logical CPUs, never less than 1.
pub fn hardware_threads() -> usize {
    num_cpus::get().max(1)
}

/// Clamps a requested thread count into `1..=MAX_THREADS`.
pub fn clamp_threads(requested: usize) -> usize {
    let clamped = requested.clamp(1, MAX_THREADS);
    if clamped != requested {
        tracing::warn!(requested, clamped, "thread count out of range, clamping");
    }
    clamped
}

#[derive(Debug)]
pub struct ParallelismPolicy {
    num_threads: AtomicUsize,
    thresholds: [AtomicUsize; 5],
}

impl ParallelismPolicy {
    /// Hardware thread count and compiled-in thresholds.
    pub fn new() -> Self {
        Self::with_settings(hardware_threads(), Thresholds::default())
    }

    pub fn with_settings(num_threads: usize, thresholds: Thresholds) -> Self {
        let policy = Self {
            num_threads: AtomicUsize::new(clamp_threads(num_threads)),
            thresholds: Default::default(),
        };
        policy.store_thresholds(&thresholds, &DimensionKind::ALL);
        policy
    }

    pub fn from_config(config: &Config) -> Self {
        Self::with_settings(config.worker_threads(), config.thresholds)
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads.load(Ordering::Relaxed)
    }

    /// Sets the worker count. Values outside `1..=MAX_THREADS` are clamped.
    pub fn set_num_threads(&self, n: usize) {
        self.num_threads.store(clamp_threads(n), Ordering::Relaxed);
    }

    pub fn threshold(&self, kind: DimensionKind) -> usize {
        self.thresholds[kind.slot()].load(Ordering::Relaxed)
    }

    /// A threshold of 0 parallelizes every size of that kind.
    pub fn set_threshold(&self, kind: DimensionKind, n: usize) {
        self.thresholds[kind.slot()].store(n, Ordering::Relaxed);
    }

    pub fn reset_fft_thresholds(&self) {
        self.store_thresholds(
            &Thresholds::default(),
            &[DimensionKind::OneDFft2, DimensionKind::OneDFft4],
        );
    }

    /// Restores the 1D, 2D and 3D thresholds.
    pub fn reset_thresholds(&self) {
        self.store_thresholds(
            &Thresholds::default(),
            &[DimensionKind::OneD, DimensionKind::TwoD, DimensionKind::ThreeD],
        );
    }

    /// Hardware thread count and every threshold back to defaults.
    pub fn reset(&self) {
        self.set_num_threads(hardware_threads());
        self.store_thresholds(&Thresholds::default(), &DimensionKind::ALL);
    }

    pub fn snapshot(&self) -> Thresholds {
        let mut thresholds = Thresholds::default();
        for kind in DimensionKind::ALL {
            thresholds.set(kind, self.threshold(kind));
        }
        thresholds
    }

    pub fn should_parallelize(&self, kind: DimensionKind, problem_size: usize) -> bool {
        problem_size >= self.threshold(kind) && self.num_threads() > 1
    }

    /// How many ways a 1D transform of `size` elements should be split: 1, 2 or 4.
    pub fn fft_split(&self, size: usize) -> usize {
        let threads = self.num_threads();
        if threads >= 4 && size >= self.threshold(DimensionKind::OneDFft4) {
            4
        } else if threads >= 2 && size >= self.threshold(DimensionKind::OneDFft2) {
            2
        } else {
            1
        }
    }

    fn store_thresholds(&self, source: &Thresholds, kinds: &[DimensionKind]) {
        for &kind in kinds {
            self.set_threshold(kind, source.get(kind));
        }
    }
}

impl Default for ParallelismPolicy {
    fn default() -> Self {
        Self::new()
    }
}
