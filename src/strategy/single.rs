//! Single-replication run strategy

use crate::engine::core::Engine;
use crate::strategy::RunStrategy;

/// The default strategy: one experiment, run to completion.
///
/// Prepares the engine, initializes the simulated system, advances until
/// the simulation ends (END-OF-SIMULATION, precision reached, or exhausted
/// future-event list), then finalizes system and simulation.
pub struct SingleRun;

impl RunStrategy for SingleRun {
    fn execute(&mut self, engine: &mut Engine) {
        engine.prepare_simulation();
        engine.initialize_simulated_system();

        while !engine.end_of_simulation() && engine.has_pending_events() {
            engine.advance();
        }

        engine.finalize_simulated_system();
        engine.finalize_simulation();
    }
}
