//
// state.rs
//
// Server-wide state: open documents, lifecycle phase and configuration
//

use crate::config::ServerConfig;
use crate::document_store::DocumentStore;

/// Lifecycle of the server. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ServerPhase {
    /// Waiting for `initialize`
    Initializing,
    /// `initialize` answered; serving requests
    Ready,
    /// `shutdown` or `exit` received; the serve loop stops after this message
    ShuttingDown,
    /// The serve loop has exited
    Terminated,
}

/// State owned by the server and handed to every handler
#[derive(Debug)]
pub struct WorldState {
    pub documents: DocumentStore,
    pub config: ServerConfig,
    phase: ServerPhase,
}

impl Default for WorldState {
    fn default() -> Self {
        Self::new(ServerConfig::default())
    }
}

impl WorldState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            documents: DocumentStore::new(),
            config,
            phase: ServerPhase::Initializing,
        }
    }

    pub fn phase(&self) -> ServerPhase {
        self.phase
    }

    /// Move to `next` if it is later than the current phase. Earlier or equal
    /// phases are ignored, so the phase never goes backwards.
    pub fn advance(&mut self, next: ServerPhase) -> bool {
        if next <= self.phase {
            return false;
        }
        log::info!("Server phase {:?} -> {:?}", self.phase, next);
        self.phase = next;
        true
    }

    pub fn is_shutting_down(&self) -> bool {
        self.phase >= ServerPhase::ShuttingDown
    }
}
