//! Hierarchical frame timing.
//!
//! Renderers open a named child of the context they are given and measure
//! the time they spend inside it. Children are created on first use and
//! kept across frames, so the tree settles once the set of renderers stops
//! changing.

use std::time::{Duration, Instant};

/// A named node in the profiling tree.
#[derive(Debug, Clone)]
pub struct ProfilingContext {
    name: String,
    enabled: bool,
    started: Option<Instant>,
    elapsed: Option<Duration>,
    children: Vec<ProfilingContext>,
}

impl ProfilingContext {
    /// Creates a root context. Measurements are only taken when `enabled`.
    #[must_use]
    pub fn new_root(name: impl Into<String>, enabled: bool) -> Self {
        Self {
            name: name.into(),
            enabled,
            started: None,
            elapsed: None,
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enables or disables measurement for this context and its children.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        for child in &mut self.children {
            child.set_enabled(enabled);
        }
    }

    /// Returns the child named `name`, creating it if necessary.
    pub fn child(&mut self, name: &str) -> &mut ProfilingContext {
        let index = match self.children.iter().position(|c| c.name == name) {
            Some(index) => index,
            None => {
                self.children.push(Self::new_root(name, self.enabled));
                self.children.len() - 1
            }
        };
        &mut self.children[index]
    }

    pub fn start_measuring_if_enabled(&mut self) {
        if self.enabled {
            self.started = Some(Instant::now());
        }
    }

    /// Stops a measurement started by
    /// [`ProfilingContext::start_measuring_if_enabled`]. Does nothing if no
    /// measurement is running.
    pub fn stop_measuring(&mut self) {
        if let Some(started) = self.started.take() {
            self.elapsed = Some(started.elapsed());
        }
    }

    /// Time recorded by the most recent measurement.
    #[must_use]
    pub fn elapsed(&self) -> Option<Duration> {
        self.elapsed
    }

    /// This context's time plus the time of every descendant.
    #[must_use]
    pub fn elapsed_total(&self) -> Duration {
        self.children
            .iter()
            .map(ProfilingContext::elapsed_total)
            .fold(self.elapsed.unwrap_or_default(), |a, b| a + b)
    }

    #[must_use]
    pub fn children(&self) -> &[ProfilingContext] {
        &self.children
    }

    /// Visits the tree depth first, passing each context with its depth.
    pub fn visit(&self, visitor: &mut dyn FnMut(usize, &ProfilingContext)) {
        self.visit_at(0, visitor);
    }

    fn visit_at(&self, depth: usize, visitor: &mut dyn FnMut(usize, &ProfilingContext)) {
        visitor(depth, self);
        for child in &self.children {
            child.visit_at(depth + 1, visitor);
        }
    }

    /// Drops every child context.
    pub fn trim(&mut self) {
        self.children.clear();
    }
}
