//! Deterministic collaborators (testing only)
//!
//! Provides `ScriptedToolchain` and `RecordingExporter` with fixed
//! per-target behavior so runs are reproducible without a real toolchain.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::executor::{Artifact, ArtifactExporter, ToolchainInvoker};
use crate::matrix::{CompilerTriple, ExportName};

// ---------------------------------------------------------------------------
// ScriptedToolchain
// ---------------------------------------------------------------------------

/// Toolchain that succeeds unless a triple is scripted to fail.
///
/// Scripted delays are served with `tokio::time::sleep`, so paused-clock tests
/// stay instant.
#[derive(Debug, Default)]
pub struct ScriptedToolchain {
    failures: HashMap<String, String>,
    delays: HashMap<String, Duration>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl ScriptedToolchain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail compilation of `triple` with `diagnostic`.
    pub fn fail(mut self, triple: &str, diagnostic: &str) -> Self {
        self.failures
            .insert(triple.to_string(), diagnostic.to_string());
        self
    }

    /// Make compilation of `triple` take `delay`.
    pub fn delay(mut self, triple: &str, delay: Duration) -> Self {
        self.delays.insert(triple.to_string(), delay);
        self
    }

    /// Triples compiled so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Highest number of overlapping `compile` calls observed.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolchainInvoker for ScriptedToolchain {
    async fn compile(&self, triple: &CompilerTriple) -> Result<Artifact, String> {
        self.calls.lock().unwrap().push(triple.to_string());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let _in_flight = InFlight(&self.in_flight);

        if let Some(delay) = self.delays.get(triple.as_str()) {
            tokio::time::sleep(*delay).await;
        }

        match self.failures.get(triple.as_str()) {
            Some(diagnostic) => Err(diagnostic.clone()),
            None => Ok(Artifact::new(triple.clone(), Vec::new())),
        }
    }
}

/// Decrements the in-flight counter even when the compile future is dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// RecordingExporter
// ---------------------------------------------------------------------------

/// Exporter that records every successful export name.
#[derive(Debug, Default)]
pub struct RecordingExporter {
    failures: HashMap<String, String>,
    exports: Mutex<Vec<String>>,
}

impl RecordingExporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail exporting `export_name` with `diagnostic`.
    pub fn fail(mut self, export_name: &str, diagnostic: &str) -> Self {
        self.failures
            .insert(export_name.to_string(), diagnostic.to_string());
        self
    }

    /// Export names published so far, in call order.
    pub fn exports(&self) -> Vec<String> {
        self.exports.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArtifactExporter for RecordingExporter {
    async fn export(&self, name: &ExportName, _artifact: &Artifact) -> Result<(), String> {
        if let Some(diagnostic) = self.failures.get(name.as_str()) {
            return Err(diagnostic.clone());
        }
        self.exports.lock().unwrap().push(name.to_string());
        Ok(())
    }
}
