//! Progress reporting for long-running passes.
//!
//! Passes call [`Progress::tick`] once per unit of work; the reporter forwards
//! every `interval`-th step and the final one to the caller's callback, so a
//! pass over millions of vertices does not flood a terminal.
//!
//! # Example
//!
//! ```
//! use meshprep::algo::Progress;
//!
//! let progress = Progress::new(|current, total, message| {
//!     eprintln!("[{}/{}] {}", current, total, message);
//! })
//! .with_interval(4096);
//!
//! for i in 0..10 {
//!     progress.tick(i, 10, "Smoothing normals");
//! }
//! ```

/// A progress callback that receives updates during a pass.
///
/// The callback receives:
/// - `current`: steps completed so far
/// - `total`: total number of steps
/// - `message`: description of the pass
pub struct Progress {
    callback: Box<dyn Fn(usize, usize, &str) + Send + Sync>,
    interval: usize,
}

impl Progress {
    /// Create a new progress reporter with the given callback.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(usize, usize, &str) + Send + Sync + 'static,
    {
        Self {
            callback: Box::new(callback),
            interval: 1,
        }
    }

    /// Only forward every `interval`-th tick. Zero is treated as one.
    pub fn with_interval(mut self, interval: usize) -> Self {
        self.interval = interval.max(1);
        self
    }

    /// Report progress unconditionally.
    #[inline]
    pub fn report(&self, current: usize, total: usize, message: &str) {
        (self.callback)(current, total, message);
    }

    /// Report that step `index` (0-based) of `total` is done, honoring the
    /// interval. The last step is always reported.
    #[inline]
    pub fn tick(&self, index: usize, total: usize, message: &str) {
        let done = index + 1;
        if done == total || done % self.interval == 0 {
            self.report(done, total, message);
        }
    }

    /// Create a no-op progress reporter that discards all updates.
    pub fn none() -> Self {
        Self::new(|_, _, _| {})
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::none()
    }
}

impl std::fmt::Debug for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Progress")
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}
