//! Independent-replications run strategy
//!
//! Runs the experiment loop several times over, resetting core state
//! between replications while statistics keep accumulating across them.
//! Each replication re-invokes the per-experiment initialization hook of
//! every registered statistic and re-fires SYSTEM-INITIALIZATION so the
//! model re-seeds its events; BEGIN/END-OF-SIMULATION bracket the whole
//! simulation, not each replication.

use crate::engine::core::Engine;
use crate::strategy::RunStrategy;

/// Fixed-count independent replications.
///
/// The default count is unbounded; the loop then relies on every enabled
/// statistic reaching its target precision to stop, checked at each
/// replication boundary.
pub struct IndependentReplications {
    num_replications: usize,
}

impl IndependentReplications {
    /// Sentinel for "replicate until precision is reached".
    pub const UNBOUNDED: usize = usize::MAX;

    pub fn new(num_replications: usize) -> Self {
        Self { num_replications }
    }

    pub fn num_replications(&self) -> usize {
        self.num_replications
    }
}

impl Default for IndependentReplications {
    fn default() -> Self {
        Self::new(Self::UNBOUNDED)
    }
}

impl RunStrategy for IndependentReplications {
    fn execute(&mut self, engine: &mut Engine) {
        engine.prepare_simulation();

        for replication in 0..self.num_replications {
            if replication > 0 {
                engine.reset_run_state();
                engine.initialize_statistics_for_experiment();
            }

            engine.initialize_simulated_system();
            while !engine.end_of_simulation() && engine.has_pending_events() {
                engine.advance();
            }
            engine.finalize_simulated_system();

            if engine.statistics_precision_reached() {
                break;
            }
        }

        engine.finalize_simulation();
    }
}
