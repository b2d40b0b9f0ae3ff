//! Deterministic engine used by the unit tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use super::{EngineAdapter, EngineError, ModelHandle, SamplingParams, TokenGenerator};

/// Counters shared between a [`ScriptedEngine`] and the test that owns it
#[derive(Debug, Default)]
pub(crate) struct EngineProbe {
    pub loads: AtomicUsize,
    pub open_handles: AtomicUsize,
    pub closed_handles: AtomicUsize,
    pub open_generators: AtomicUsize,
    pub steps: AtomicUsize,
    pub loaded_paths: Mutex<Vec<PathBuf>>,
    pub params_seen: Mutex<Vec<SamplingParams>>,
}

impl EngineProbe {
    pub fn open_handles(&self) -> usize {
        self.open_handles.load(Ordering::SeqCst)
    }

    pub fn open_generators(&self) -> usize {
        self.open_generators.load(Ordering::SeqCst)
    }

    pub fn steps(&self) -> usize {
        self.steps.load(Ordering::SeqCst)
    }
}

/// Lets a test hold the decoder before each step.
///
/// Every `release` lets exactly one step through; dropping the gate opens it
/// for good.
pub(crate) struct Gate(Sender<()>);

impl Gate {
    pub fn release(&self, steps: usize) {
        for _ in 0..steps {
            let _ = self.0.send(());
        }
    }
}

/// Engine that replays a fixed word list for every prompt
#[derive(Clone)]
pub(crate) struct ScriptedEngine {
    words: Arc<Vec<String>>,
    step_delay: Duration,
    // Zero-based load index from which loads fail, and the error message
    fail_load: Option<(usize, String)>,
    panic_on_load: bool,
    panic_on_close: bool,
    fail_at_step: Option<usize>,
    panic_at_step: Option<usize>,
    gate: Option<Receiver<()>>,
    probe: Arc<EngineProbe>,
}

impl ScriptedEngine {
    pub fn new(words: &[&str]) -> Self {
        Self {
            words: Arc::new(words.iter().map(|w| w.to_string()).collect()),
            step_delay: Duration::ZERO,
            fail_load: None,
            panic_on_load: false,
            panic_on_close: false,
            fail_at_step: None,
            panic_at_step: None,
            gate: None,
            probe: Arc::new(EngineProbe::default()),
        }
    }

    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    pub fn failing_load(self, message: &str) -> Self {
        self.failing_load_from(0, message)
    }

    /// Let the first `loads` loads succeed and fail every later one
    pub fn failing_load_from(mut self, loads: usize, message: &str) -> Self {
        self.fail_load = Some((loads, message.to_string()));
        self
    }

    pub fn panicking_load(mut self) -> Self {
        self.panic_on_load = true;
        self
    }

    /// Fail the step with the given zero-based index
    pub fn failing_at_step(mut self, step: usize) -> Self {
        self.fail_at_step = Some(step);
        self
    }

    pub fn panicking_close(mut self) -> Self {
        self.panic_on_close = true;
        self
    }

    /// Panic inside the step with the given zero-based index
    pub fn panicking_at_step(mut self, step: usize) -> Self {
        self.panic_at_step = Some(step);
        self
    }

    pub fn gated(mut self) -> (Self, Gate) {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.gate = Some(rx);
        (self, Gate(tx))
    }

    pub fn probe(&self) -> Arc<EngineProbe> {
        self.probe.clone()
    }
}

impl EngineAdapter for ScriptedEngine {
    fn load(&mut self, dir: &Path) -> Result<Box<dyn ModelHandle>, EngineError> {
        let index = self.probe.loads.fetch_add(1, Ordering::SeqCst);
        if self.panic_on_load {
            panic!("native runtime aborted while loading {}", dir.display());
        }
        if let Some((from, message)) = &self.fail_load {
            if index >= *from {
                return Err(EngineError::Load(message.clone()));
            }
        }
        self.probe.loaded_paths.lock().push(dir.to_path_buf());
        self.probe.open_handles.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedModel {
            engine: self.clone(),
            closed: false,
        }))
    }
}

struct ScriptedModel {
    engine: ScriptedEngine,
    closed: bool,
}

impl ModelHandle for ScriptedModel {
    fn encode(&self, prompt: &str) -> Result<Vec<u32>, EngineError> {
        Ok(prompt.bytes().map(u32::from).collect())
    }

    fn generator<'a>(
        &'a self,
        _prompt_tokens: &[u32],
        params: &SamplingParams,
    ) -> Result<Box<dyn TokenGenerator + 'a>, EngineError> {
        self.engine.probe.params_seen.lock().push(*params);
        self.engine.probe.open_generators.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedGenerator {
            engine: &self.engine,
            position: 0,
        }))
    }

    fn close(&mut self) -> Result<(), EngineError> {
        if !self.closed {
            self.closed = true;
            self.engine.probe.open_handles.fetch_sub(1, Ordering::SeqCst);
            self.engine.probe.closed_handles.fetch_add(1, Ordering::SeqCst);
            // Marked closed first so the drop that follows the unwind does not panic again.
            if self.engine.panic_on_close {
                panic!("native handle released twice");
            }
        }
        Ok(())
    }
}

impl Drop for ScriptedModel {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

struct ScriptedGenerator<'a> {
    engine: &'a ScriptedEngine,
    position: usize,
}

impl TokenGenerator for ScriptedGenerator<'_> {
    fn is_done(&self) -> bool {
        self.position >= self.engine.words.len()
    }

    fn step(&mut self) -> Result<u32, EngineError> {
        if let Some(gate) = &self.engine.gate {
            let _ = gate.recv();
        }
        if !self.engine.step_delay.is_zero() {
            std::thread::sleep(self.engine.step_delay);
        }
        self.engine.probe.steps.fetch_add(1, Ordering::SeqCst);
        if self.engine.panic_at_step == Some(self.position) {
            panic!("native decoder crashed at step {}", self.position);
        }
        if self.engine.fail_at_step == Some(self.position) {
            return Err(EngineError::Generate(format!(
                "decoder fault at step {}",
                self.position
            )));
        }
        let token = self.position as u32;
        self.position += 1;
        Ok(token)
    }

    fn decode(&mut self, token: u32) -> Result<String, EngineError> {
        self.engine
            .words
            .get(token as usize)
            .cloned()
            .ok_or_else(|| EngineError::Decode(format!("unknown token {}", token)))
    }
}

impl Drop for ScriptedGenerator<'_> {
    fn drop(&mut self) {
        self.engine.probe.open_generators.fetch_sub(1, Ordering::SeqCst);
    }
}
