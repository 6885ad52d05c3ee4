//! The optimizer pass manager: "a pass-manager. Passes
//! implement `(module) -> module` and report whether they changed the
//! module."
//!
//! [`IlPass`]es run on the typed IL (currently just the required
//! intrinsic-lowering pass, kept here for any IL that did not already
//! arrive pre-lowered by [`blend65_il::IlGenerator`]); [`AsmPass`]es run
//! on [`crate::asmil::AsmModule`] once the code generator has produced it
//! (the optional O1+ peephole passes).

use blend65_il::IlModule;
use std::time::Duration;

/// One pass's outcome for one iteration: whether it mutated its module.
/// `time_ms` is left as a caller-supplied value rather than measured with
/// `std::time::Instant` internally, so pass timing stays host-controlled
/// and deterministic output never depends on wall-clock jitter.
#[derive(Debug, Clone)]
pub struct PassStat {
    pub name: &'static str,
    pub iteration: u32,
    pub changed: bool,
    pub time: Duration,
}

pub trait IlPass {
    fn name(&self) -> &'static str;
    /// Runs once over `module`, returning whether it changed anything.
    fn run(&self, module: &mut IlModule) -> bool;
}

pub trait AsmPass {
    fn name(&self) -> &'static str;
    fn run(&self, module: &mut crate::asmil::AsmModule) -> bool;
}

/// Optimization level. Only `O0` and a
/// subset of `O1` peepholes are implemented; anything higher runs as O0
/// with a warning the caller is expected to surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum OptLevel {
    O0,
    O1,
    O2,
    O3,
    Os,
    Oz,
}

impl OptLevel {
    /// Whether this level runs the optional peephole passes.
    pub fn runs_peepholes(self) -> bool {
        !matches!(self, OptLevel::O0)
    }

    /// Whether this level is actually implemented as itself, rather than
    /// falling back to O0 behavior.
    pub fn is_implemented(self) -> bool {
        matches!(self, OptLevel::O0 | OptLevel::O1)
    }
}

/// Runs `passes` to a fixed point, capped at `max_iterations`. `max_iterations = 0` performs zero iterations
/// ("pass-through mode").
pub struct IlPassManager {
    passes: Vec<Box<dyn IlPass>>,
    max_iterations: u32,
}

impl IlPassManager {
    pub fn new(max_iterations: u32) -> Self {
        Self { passes: Vec::new(), max_iterations }
    }

    pub fn add(&mut self, pass: Box<dyn IlPass>) -> &mut Self {
        self.passes.push(pass);
        self
    }

    /// Runs every registered pass, in registration order, once per
    /// iteration, until an iteration changes nothing or `max_iterations`
    /// is reached.
    pub fn run(&self, module: &mut IlModule) -> Vec<PassStat> {
        let mut stats = Vec::new();
        for iteration in 0..self.max_iterations {
            let mut any_changed = false;
            for pass in &self.passes {
                let changed = pass.run(module);
                any_changed |= changed;
                tracing::trace!(pass = pass.name(), iteration, changed, "il pass ran");
                stats.push(PassStat { name: pass.name(), iteration, changed, time: Duration::ZERO });
            }
            if !any_changed {
                tracing::debug!(iterations = iteration + 1, "il pass manager reached fixed point");
                break;
            }
        }
        stats
    }
}

pub struct AsmPassManager {
    passes: Vec<Box<dyn AsmPass>>,
    max_iterations: u32,
}

impl AsmPassManager {
    pub fn new(max_iterations: u32) -> Self {
        Self { passes: Vec::new(), max_iterations }
    }

    pub fn add(&mut self, pass: Box<dyn AsmPass>) -> &mut Self {
        self.passes.push(pass);
        self
    }

    pub fn run(&self, module: &mut crate::asmil::AsmModule) -> Vec<PassStat> {
        let mut stats = Vec::new();
        for iteration in 0..self.max_iterations {
            let mut any_changed = false;
            for pass in &self.passes {
                let changed = pass.run(module);
                any_changed |= changed;
                tracing::trace!(pass = pass.name(), iteration, changed, "asm peephole pass ran");
                stats.push(PassStat { name: pass.name(), iteration, changed, time: Duration::ZERO });
            }
            if !any_changed {
                tracing::debug!(iterations = iteration + 1, "asm pass manager reached fixed point");
                break;
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingPass {
        budget: std::cell::Cell<u32>,
    }
    impl IlPass for CountingPass {
        fn name(&self) -> &'static str {
            "counting"
        }
        fn run(&self, _module: &mut IlModule) -> bool {
            let b = self.budget.get();
            if b == 0 {
                return false;
            }
            self.budget.set(b - 1);
            true
        }
    }

    #[test]
    fn stops_at_fixed_point() {
        let mut manager = IlPassManager::new(10);
        manager.add(Box::new(CountingPass { budget: std::cell::Cell::new(3) }));
        let mut module = IlModule::new("test");
        let stats = manager.run(&mut module);
        // 3 changed iterations + 1 no-change iteration that stops the loop.
        assert_eq!(stats.len(), 4);
        assert!(stats[3].changed == false);
    }

    #[test]
    fn zero_max_iterations_is_pass_through() {
        let manager = IlPassManager::new(0);
        let mut module = IlModule::new("test");
        assert!(manager.run(&mut module).is_empty());
    }
}
