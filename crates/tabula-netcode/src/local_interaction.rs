//! Client-only multi-step interactions
//!
//! Some choices take several clicks (pick a card, then a target, then
//! confirm). The steps are folded locally through a registered
//! [`LocalReducer`] and only the commit produces a network command.

use crate::error::{Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tabula_core::Value;
use tracing::{debug, warn};

/// One local click or selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalStep {
    pub step_type: String,
    #[serde(default)]
    pub payload: Value,
}

impl LocalStep {
    pub fn new(step_type: impl Into<String>, payload: Value) -> Self {
        Self {
            step_type: step_type.into(),
            payload,
        }
    }
}

/// Folds local steps for one interaction id
pub trait LocalReducer<S>: Send + Sync {
    /// Apply a step, or refuse it with a message
    fn reduce(&self, state: &S, step: &LocalStep) -> std::result::Result<S, String>;

    /// Command type sent on commit; defaults to the interaction id
    fn command_type(&self) -> Option<&str> {
        None
    }
}

impl<S, F> LocalReducer<S> for F
where
    F: Fn(&S, &LocalStep) -> std::result::Result<S, String> + Send + Sync,
{
    fn reduce(&self, state: &S, step: &LocalStep) -> std::result::Result<S, String> {
        self(state, step)
    }
}

/// The interaction in progress
#[derive(Debug, Clone, PartialEq)]
pub struct LocalInteraction<S> {
    pub id: String,
    pub initial: S,
    pub state: S,
    pub steps: Vec<LocalStep>,
}

/// What a commit hands to the caller for sending
#[derive(Debug, Clone, PartialEq)]
pub struct LocalCommit<S> {
    pub command_type: String,
    pub steps: Vec<LocalStep>,
    pub state: S,
}

/// Holds at most one local interaction at a time
pub struct LocalInteractionManager<S> {
    reducers: IndexMap<String, Box<dyn LocalReducer<S>>>,
    current: Option<LocalInteraction<S>>,
}

impl<S> Default for LocalInteractionManager<S> {
    fn default() -> Self {
        Self {
            reducers: IndexMap::new(),
            current: None,
        }
    }
}

impl<S: Clone> LocalInteractionManager<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: impl Into<String>, reducer: impl LocalReducer<S> + 'static) {
        self.reducers.insert(id.into(), Box::new(reducer));
    }

    /// Start `id`, replacing whatever was in progress
    pub fn begin(&mut self, id: &str, initial: S) -> Result<()> {
        if !self.reducers.contains_key(id) {
            return Err(Error::UnknownLocalInteraction(id.to_string()));
        }
        if let Some(previous) = &self.current {
            debug!(previous = %previous.id, next = %id, "replacing local interaction");
        }
        self.current = Some(LocalInteraction {
            id: id.to_string(),
            state: initial.clone(),
            initial,
            steps: Vec::new(),
        });
        Ok(())
    }

    /// Fold one step; a refused step cancels the interaction
    pub fn update(&mut self, step: LocalStep) -> Result<&S> {
        let current = self.current.as_mut().ok_or(Error::NoLocalInteraction)?;
        let reducer = self
            .reducers
            .get(&current.id)
            .ok_or_else(|| Error::UnknownLocalInteraction(current.id.clone()))?;

        match reducer.reduce(&current.state, &step) {
            Ok(next) => {
                current.state = next;
                current.steps.push(step);
            }
            Err(message) => {
                warn!(interaction = %current.id, step = %step.step_type, %message, "local step refused");
                self.current = None;
                return Err(Error::LocalStepFailed {
                    step: step.step_type,
                    message,
                });
            }
        }
        self.state().ok_or(Error::NoLocalInteraction)
    }

    /// Finish and return the command to send
    pub fn commit(&mut self) -> Result<LocalCommit<S>> {
        let current = self.current.take().ok_or(Error::NoLocalInteraction)?;
        let command_type = self
            .reducers
            .get(&current.id)
            .and_then(|r| r.command_type())
            .map_or_else(|| current.id.clone(), str::to_string);
        Ok(LocalCommit {
            command_type,
            steps: current.steps,
            state: current.state,
        })
    }

    /// Abandon the interaction, returning its initial snapshot
    pub fn cancel(&mut self) -> Option<S> {
        self.current.take().map(|c| c.initial)
    }

    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }

    pub fn current(&self) -> Option<&LocalInteraction<S>> {
        self.current.as_ref()
    }

    pub fn state(&self) -> Option<&S> {
        self.current.as_ref().map(|c| &c.state)
    }
}
