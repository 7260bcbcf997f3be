//! Run strategies
//!
//! `Engine::run` delegates its body to a [`RunStrategy`], the extension
//! point that decides how many experiments to execute and how state is
//! reset between them. The engine's lifecycle operations
//! (`prepare_simulation`, `initialize_simulated_system`, `advance`, …) are
//! public precisely so strategies can compose them.
//!
//! A second, independent capability, [`StatisticWrapper`], decides how a
//! raw estimator is wrapped into the analyzable envelope a given analysis
//! method needs. The two are separate because statistics may be wrapped
//! while a run is in progress.

use std::cell::RefCell;
use std::rc::Rc;

use crate::engine::core::Engine;
use crate::stats::{PassthroughStatistic, SharedStatistic, Statistic};

mod replications;
mod single;

pub use replications::IndependentReplications;
pub use single::SingleRun;

/// The run-loop policy invoked by [`Engine::run`].
///
/// The strategy is taken out of the engine for the duration of the run and
/// restored afterwards, so it receives the engine by mutable reference
/// without aliasing.
pub trait RunStrategy {
    fn execute(&mut self, engine: &mut Engine);
}

/// Policy for wrapping a raw estimator into an analyzable envelope.
pub trait StatisticWrapper {
    fn wrap(&self, raw: Box<dyn Statistic>) -> SharedStatistic;
}

/// Default wrapper: the [`PassthroughStatistic`] envelope, which never
/// requests precision-driven termination.
pub struct PassthroughWrapper;

impl StatisticWrapper for PassthroughWrapper {
    fn wrap(&self, raw: Box<dyn Statistic>) -> SharedStatistic {
        Rc::new(RefCell::new(PassthroughStatistic::new(raw)))
    }
}
