//! Scoped solver sessions.

use std::sync::atomic::{AtomicU64, Ordering};

use tourforge_core::{
    GatewayError, Result, SolveLimits, SolveStatus, SolverGateway, TourForgeError, VariableHandle,
};
use tracing::debug;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Exclusive owner of one solver gateway for one build/solve sequence.
///
/// Every operation takes `&mut self` or `&self` on the session, so a gateway
/// can never be shared by two solves at once. The gateway is released
/// exactly once: by [`release`](Self::release), or on drop for early returns
/// and panics.
///
/// # Example
///
/// ```
/// use tourforge_solver::{MicroLpGateway, SolverSession};
///
/// let mut session = SolverSession::open(MicroLpGateway::new());
/// assert!(!session.is_released());
/// session.release();
/// assert!(session.is_released());
/// ```
pub struct SolverSession<G: SolverGateway> {
    id: u64,
    gateway: G,
    released: bool,
}

impl<G: SolverGateway> std::fmt::Debug for SolverSession<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolverSession")
            .field("id", &self.id)
            .field("backend", &self.gateway.name())
            .field("released", &self.released)
            .finish()
    }
}

impl<G: SolverGateway> SolverSession<G> {
    /// Takes ownership of a gateway.
    pub fn open(gateway: G) -> Self {
        let id = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);
        debug!(session = id, backend = gateway.name(), "Session opened");
        Self {
            id,
            gateway,
            released: false,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Backend name of the owned gateway.
    pub fn backend(&self) -> &str {
        self.gateway.name()
    }

    pub fn gateway(&self) -> Result<&G> {
        if self.released {
            return Err(TourForgeError::SessionReleased(self.id));
        }
        Ok(&self.gateway)
    }

    pub fn gateway_mut(&mut self) -> Result<&mut G> {
        if self.released {
            return Err(TourForgeError::SessionReleased(self.id));
        }
        Ok(&mut self.gateway)
    }

    /// Runs the solve. Gateway failures surface as `SolveError`.
    pub fn solve(&mut self, limits: &SolveLimits) -> Result<SolveStatus> {
        let id = self.id;
        let status = self.gateway_mut()?.solve(limits).map_err(solve_error)?;
        debug!(session = id, %status, "Solve returned");
        Ok(status)
    }

    pub fn has_incumbent(&self) -> bool {
        !self.released && self.gateway.has_incumbent()
    }

    pub fn value(&self, var: VariableHandle) -> Result<f64> {
        self.gateway()?.value(var).map_err(solve_error)
    }

    pub fn objective_value(&self) -> Result<f64> {
        self.gateway()?.objective_value().map_err(solve_error)
    }

    /// Frees every gateway resource. Later calls are no-ops.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.gateway.release();
        self.released = true;
        debug!(session = self.id, "Session released");
    }
}

impl<G: SolverGateway> Drop for SolverSession<G> {
    fn drop(&mut self) {
        if !self.released {
            debug!(session = self.id, "Releasing session on drop");
            self.release();
        }
    }
}

fn solve_error(err: GatewayError) -> TourForgeError {
    TourForgeError::SolveError(err.to_string())
}
