//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs immediately on
//! creation and again whenever one of the sources it read changes.
//!
//! There is no disposal handle. An effect stays alive as long as some source
//! holds it as a subscriber; an effect created while another computation is
//! running is disposed when that owner runs again, so nested effects built
//! by a conditional or list branch go away with the branch.

use std::rc::Rc;

use super::computation::{adopt, Computation, ComputationKind};

/// Create an effect and run it once to establish its dependencies.
pub fn create_effect<F>(f: F)
where
    F: Fn() + 'static,
{
    let computation = Computation::new(ComputationKind::Effect, Rc::new(f));
    adopt(&computation);
    computation.execute();
}
