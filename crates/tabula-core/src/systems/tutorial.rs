//! Tutorial: a scripted step machine over an immutable manifest library
//!
//! Steps may restrict commands, inject scripted actions for the non-human
//! seat, and advance automatically when a matching event is folded. The
//! engine running the scripted actions (`TUTORIAL_AI_PLAYED`) is separate
//! from the client having shown them (`TUTORIAL_AI_CONSUMED`).

use super::{Gate, Scheduled, System, SystemContext};
use crate::command::{Command, CommandBody, SysCommand};
use crate::domain::{codes, CommandOf, EventOf, Game, Rejection};
use crate::error::Result;
use crate::event::{Event, EventBody, EventKind, SysEvent};
use crate::identity::PlayerId;
use crate::rng::RandomSource;
use crate::state::{MatchState, SystemState};
use crate::value::{Value, ValueMap};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Matches an event by type and a partial payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMatcher {
    pub event_type: String,
    #[serde(default)]
    pub payload: ValueMap,
}

impl EventMatcher {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            payload: ValueMap::new(),
        }
    }

    /// Require a payload field
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    pub fn matches<E: EventKind>(&self, event: &Event<E>) -> bool {
        event.event_type() == self.event_type && event.payload().matches_partial(&self.payload)
    }
}

/// A command the tutorial plays on behalf of a seat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptedAction<C> {
    pub player_id: PlayerId,
    pub command: CommandBody<C>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TutorialStep<C> {
    pub id: String,
    /// `None` leaves every command legal
    #[serde(default)]
    pub allowed_commands: Option<Vec<String>>,
    #[serde(default = "Vec::new")]
    pub ai_actions: Vec<ScriptedAction<C>>,
    #[serde(default)]
    pub advance_on_events: Vec<EventMatcher>,
}

impl<C> TutorialStep<C> {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            allowed_commands: None,
            ai_actions: Vec::new(),
            advance_on_events: Vec::new(),
        }
    }

    pub fn allow(mut self, command_types: &[&str]) -> Self {
        self.allowed_commands = Some(command_types.iter().map(|t| t.to_string()).collect());
        self
    }

    pub fn ai(mut self, player_id: impl Into<PlayerId>, command: C) -> Self {
        self.ai_actions.push(ScriptedAction {
            player_id: player_id.into(),
            command: CommandBody::Domain(command),
        });
        self
    }

    pub fn advance_on(mut self, matcher: EventMatcher) -> Self {
        self.advance_on_events.push(matcher);
        self
    }

    fn permits(&self, command_type: &str) -> bool {
        self.allowed_commands
            .as_ref()
            .map_or(true, |allowed| allowed.iter().any(|t| t == command_type))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TutorialManifest<C> {
    pub id: String,
    pub steps: Vec<TutorialStep<C>>,
}

/// Manifests by id, built once at start-up
pub type TutorialLibrary<C> = IndexMap<String, TutorialManifest<C>>;

/// Progress of the current step's scripted actions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AiStatus {
    /// Step has no scripted actions
    #[default]
    None,
    /// Waiting for the pipeline to run them
    Pending,
    /// Run by the engine, not yet shown by the client
    Played,
    Consumed,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TutorialState {
    pub active: bool,
    pub manifest_id: Option<String>,
    pub step_index: usize,
    pub step_id: Option<String>,
    pub ai: AiStatus,
}

/// Owns `sys.tutorial`
pub struct TutorialSystem<C> {
    manifests: Arc<TutorialLibrary<C>>,
}

impl<C> TutorialSystem<C> {
    pub fn new(manifests: Arc<TutorialLibrary<C>>) -> Self {
        Self { manifests }
    }

    fn manifest(&self, state: &TutorialState) -> Option<&TutorialManifest<C>> {
        state
            .manifest_id
            .as_deref()
            .and_then(|id| self.manifests.get(id))
    }

    fn current_step(&self, state: &TutorialState) -> Option<&TutorialStep<C>> {
        if !state.active {
            return None;
        }
        self.manifest(state)
            .and_then(|m| m.steps.get(state.step_index))
    }

    fn enter_step(&self, state: &mut TutorialState, index: usize, step_id: &str) {
        state.step_index = index;
        state.step_id = Some(step_id.to_string());
        let has_ai = self
            .manifest(state)
            .and_then(|m| m.steps.get(index))
            .is_some_and(|s| !s.ai_actions.is_empty());
        state.ai = if has_ai { AiStatus::Pending } else { AiStatus::None };
    }
}

fn reject<G: Game>(code: &str, message: impl Into<String>) -> Result<Gate<G>> {
    Ok(Gate::Reject(Rejection::new(code, message)))
}

impl<G: Game> System<G> for TutorialSystem<G::Command> {
    fn name(&self) -> &'static str {
        "tutorial"
    }

    fn before_command(
        &self,
        ctx: &SystemContext<'_, G>,
        state: &MatchState<G>,
        command: &CommandOf<G>,
        _random: &mut dyn RandomSource,
    ) -> Result<Gate<G>> {
        let tutorial = &state.sys.tutorial;
        match command.as_system() {
            Some(SysCommand::TutorialStart { manifest_id }) => {
                let Some(manifest) = self.manifests.get(manifest_id) else {
                    return reject(
                        codes::TUTORIAL_UNKNOWN_MANIFEST,
                        format!("no tutorial named {manifest_id}"),
                    );
                };
                let Some(first) = manifest.steps.first() else {
                    return reject(
                        codes::TUTORIAL_EMPTY_MANIFEST,
                        format!("tutorial {manifest_id} has no steps"),
                    );
                };
                Ok(Gate::Handled(vec![EventBody::System(
                    SysEvent::TutorialStarted {
                        manifest_id: manifest_id.clone(),
                        step_id: first.id.clone(),
                    },
                )]))
            }
            Some(SysCommand::TutorialAiConsumed { step_id }) => {
                let Some(current) = tutorial.step_id.as_ref().filter(|_| tutorial.active) else {
                    return reject(codes::TUTORIAL_NOT_ACTIVE, "no tutorial is running");
                };
                if tutorial.ai != AiStatus::Played {
                    return reject(
                        codes::TUTORIAL_AI_NOT_PLAYED,
                        format!("step {current} has no unconsumed scripted actions"),
                    );
                }
                if step_id.as_ref().is_some_and(|s| s != current) {
                    return reject(
                        codes::TUTORIAL_STEP_MISMATCH,
                        format!("current step is {current}"),
                    );
                }
                Ok(Gate::Handled(vec![EventBody::System(
                    SysEvent::TutorialAiConsumed {
                        step_id: current.clone(),
                    },
                )]))
            }
            Some(_) => Ok(Gate::Continue),
            None => {
                if ctx.scripted {
                    return Ok(Gate::Continue);
                }
                let Some(step) = self.current_step(tutorial) else {
                    return Ok(Gate::Continue);
                };
                if tutorial.ai == AiStatus::Played {
                    return reject(
                        codes::TUTORIAL_AWAITING_AI,
                        format!("scripted actions of step {} are still playing", step.id),
                    );
                }
                if !step.permits(command.command_type()) {
                    return reject(
                        codes::TUTORIAL_COMMAND_BLOCKED,
                        format!("{} is not allowed in step {}", command.command_type(), step.id),
                    );
                }
                Ok(Gate::Continue)
            }
        }
    }

    fn reduce(
        &self,
        _ctx: &SystemContext<'_, G>,
        _core: &G::Core,
        sys: &mut SystemState<G>,
        event: &EventOf<G>,
    ) {
        let tutorial = &mut sys.tutorial;
        match event.as_system() {
            Some(SysEvent::TutorialStarted {
                manifest_id,
                step_id,
            }) => {
                tutorial.active = true;
                tutorial.manifest_id = Some(manifest_id.clone());
                self.enter_step(tutorial, 0, step_id);
            }
            Some(SysEvent::TutorialStepAdvanced {
                to_index, step_id, ..
            }) => self.enter_step(tutorial, *to_index, step_id),
            Some(SysEvent::TutorialAiPlayed { .. }) => tutorial.ai = AiStatus::Played,
            Some(SysEvent::TutorialAiConsumed { .. }) => tutorial.ai = AiStatus::Consumed,
            Some(SysEvent::TutorialCompleted { .. }) => {
                tutorial.active = false;
                tutorial.step_id = None;
                tutorial.ai = AiStatus::None;
            }
            _ => {}
        }
    }

    fn after_event(
        &self,
        _ctx: &SystemContext<'_, G>,
        state: &MatchState<G>,
        event: &EventOf<G>,
    ) -> Vec<SysEvent> {
        let tutorial = &state.sys.tutorial;
        let (Some(manifest), Some(step)) = (self.manifest(tutorial), self.current_step(tutorial))
        else {
            return Vec::new();
        };
        if !step.advance_on_events.iter().any(|m| m.matches(event)) {
            return Vec::new();
        }

        let from_index = tutorial.step_index;
        let to_index = from_index + 1;
        match manifest.steps.get(to_index) {
            Some(next) => {
                info!(tutorial = %manifest.id, from = %step.id, to = %next.id, "tutorial step advanced");
                vec![SysEvent::TutorialStepAdvanced {
                    from_index,
                    to_index,
                    step_id: next.id.clone(),
                }]
            }
            None => {
                info!(tutorial = %manifest.id, "tutorial completed");
                vec![SysEvent::TutorialCompleted {
                    manifest_id: manifest.id.clone(),
                }]
            }
        }
    }

    fn take_scheduled(
        &self,
        ctx: &SystemContext<'_, G>,
        state: &MatchState<G>,
    ) -> Option<Scheduled<G>> {
        let tutorial = &state.sys.tutorial;
        if tutorial.ai != AiStatus::Pending {
            return None;
        }
        let step = self.current_step(tutorial)?;
        let commands = step
            .ai_actions
            .iter()
            .map(|action| Command {
                body: action.command.clone(),
                player_id: action.player_id.clone(),
                timestamp: ctx.timestamp,
            })
            .collect();
        Some(Scheduled {
            marker: vec![SysEvent::TutorialAiPlayed {
                step_id: step.id.clone(),
            }],
            commands,
        })
    }
}
