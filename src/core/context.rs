//! Processing context and progress tracking.
//!
//! A `ProcessContext` carries everything an operation needs for one region
//! request: its input buffers, the slot for its output, the compute
//! configuration and the distributor built from it, and a progress tracker
//! that other threads can poll while the call runs.

use crate::core::buffer::SharedBuffer;
use crate::core::config::ComputeConfig;
use crate::core::error::{OperationError, OperationResult};
use crate::core::operation::Operation;
use crate::core::parallel::Distributor;
use crate::core::rect::Rectangle;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Conventional name of the main input port.
pub const INPUT_PORT: &str = "input";

/// Conventional name of the main output port.
pub const OUTPUT_PORT: &str = "output";

/// A progress update event.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressUpdate {
    /// An operation started processing a region.
    Started { operation: String },
    /// Fraction of the current call that is done.
    Progress { operation: String, fraction: f32 },
    /// The current call finished.
    Completed { operation: String, duration_ms: u64 },
}

/// Callback type for progress updates.
pub type ProgressCallback = Box<dyn Fn(ProgressUpdate) + Send + Sync>;

/// Coarse progress counter for processing calls.
///
/// Progress can be polled from any thread; there is no cancellation, a call
/// always runs to completion.
pub struct ProgressTracker {
    /// Bits of the current fraction (f32).
    fraction: AtomicU32,
    /// Number of calls finished so far.
    completed: AtomicU64,
    /// Operation currently running and its start time.
    current: parking_lot::Mutex<Option<(String, Instant)>>,
    /// Progress callback.
    callback: Option<ProgressCallback>,
}

impl ProgressTracker {
    /// Create a new progress tracker.
    pub fn new() -> Self {
        Self {
            fraction: AtomicU32::new(0f32.to_bits()),
            completed: AtomicU64::new(0),
            current: parking_lot::Mutex::new(None),
            callback: None,
        }
    }

    /// Create a progress tracker wrapped in Arc for sharing.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Set a callback for progress updates.
    pub fn with_callback(mut self, callback: ProgressCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Report that `operation` started a call.
    pub fn begin(&self, operation: &str) {
        self.fraction.store(0f32.to_bits(), Ordering::Relaxed);
        *self.current.lock() = Some((operation.to_string(), Instant::now()));
        self.send_update(ProgressUpdate::Started {
            operation: operation.to_string(),
        });
    }

    /// Report the fraction of the current call that is done (clamped to 0..1).
    pub fn report(&self, fraction: f32) {
        let fraction = fraction.clamp(0.0, 1.0);
        self.fraction.store(fraction.to_bits(), Ordering::Relaxed);
        if self.callback.is_some() {
            let operation = self.current_operation().unwrap_or_default();
            self.send_update(ProgressUpdate::Progress {
                operation,
                fraction,
            });
        }
    }

    /// Report that the current call finished.
    pub fn finish(&self) {
        self.fraction.store(1f32.to_bits(), Ordering::Relaxed);
        self.completed.fetch_add(1, Ordering::Relaxed);
        if let Some((operation, started)) = self.current.lock().take() {
            self.send_update(ProgressUpdate::Completed {
                operation,
                duration_ms: started.elapsed().as_millis() as u64,
            });
        }
    }

    /// Fraction of the current call that is done.
    pub fn fraction(&self) -> f32 {
        f32::from_bits(self.fraction.load(Ordering::Relaxed))
    }

    /// Number of calls finished so far.
    pub fn completed_calls(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Operation currently running, if any.
    pub fn current_operation(&self) -> Option<String> {
        self.current.lock().as_ref().map(|(name, _)| name.clone())
    }

    fn send_update(&self, update: ProgressUpdate) {
        if let Some(ref callback) = self.callback {
            callback(update);
        }
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("fraction", &self.fraction())
            .field("completed", &self.completed_calls())
            .finish()
    }
}

/// Context provided to `Operation::process`.
#[derive(Debug)]
pub struct ProcessContext {
    /// Input buffers by port name.
    inputs: HashMap<String, SharedBuffer>,
    /// Output buffers set by the operation.
    outputs: HashMap<String, SharedBuffer>,
    /// Compute configuration.
    config: ComputeConfig,
    /// Work distributor derived from the configuration.
    distributor: Distributor,
    /// Progress counter.
    progress: Arc<ProgressTracker>,
}

impl ProcessContext {
    /// Create a new context.
    pub fn new(config: ComputeConfig) -> Self {
        Self {
            inputs: HashMap::new(),
            outputs: HashMap::new(),
            distributor: Distributor::from_config(&config),
            config,
            progress: ProgressTracker::new_shared(),
        }
    }

    /// Share an existing progress tracker.
    pub fn with_progress(mut self, progress: Arc<ProgressTracker>) -> Self {
        self.progress = progress;
        self
    }

    /// Attach a buffer to an input port.
    pub fn with_input(mut self, port: impl Into<String>, buffer: SharedBuffer) -> Self {
        self.set_input(port, buffer);
        self
    }

    /// Attach a buffer to an input port, replacing any previous one.
    pub fn set_input(&mut self, port: impl Into<String>, buffer: SharedBuffer) {
        self.inputs.insert(port.into(), buffer);
    }

    /// Get an input buffer by port name.
    pub fn get_input(&self, port: &str) -> OperationResult<&SharedBuffer> {
        self.inputs
            .get(port)
            .ok_or_else(|| OperationError::MissingInput {
                port: port.to_string(),
            })
    }

    /// Check if an input exists.
    pub fn has_input(&self, port: &str) -> bool {
        self.inputs.contains_key(port)
    }

    /// Set an output buffer.
    pub fn set_output(&mut self, port: impl Into<String>, buffer: SharedBuffer) {
        self.outputs.insert(port.into(), buffer);
    }

    /// Get an output buffer by port name.
    pub fn get_output(&self, port: &str) -> Option<&SharedBuffer> {
        self.outputs.get(port)
    }

    /// Remove and return an output buffer.
    pub fn take_output(&mut self, port: &str) -> Option<SharedBuffer> {
        self.outputs.remove(port)
    }

    /// Compute configuration for this call.
    pub fn config(&self) -> &ComputeConfig {
        &self.config
    }

    /// Work distributor for this call.
    pub fn distributor(&self) -> &Distributor {
        &self.distributor
    }

    /// Progress tracker for this call.
    pub fn progress(&self) -> &Arc<ProgressTracker> {
        &self.progress
    }

    /// Set progress (0.0 to 1.0) of the current call.
    pub fn set_progress(&self, fraction: f32) {
        self.progress.report(fraction);
    }

    /// Run `operation` on `roi`, reporting progress and logging the outcome.
    pub fn run(&mut self, operation: &mut dyn Operation, roi: &Rectangle) -> OperationResult<()> {
        let id = operation.metadata().id;
        self.progress.begin(&id);
        log::debug!("Processing '{}' over {}", id, roi);

        let result = operation.process(self, roi);
        self.progress.finish();

        if let Err(ref error) = result {
            log::warn!("Operation '{}' failed on {}: {}", id, roi, error);
        }
        result
    }
}

impl Default for ProcessContext {
    fn default() -> Self {
        Self::new(ComputeConfig::default())
    }
}
