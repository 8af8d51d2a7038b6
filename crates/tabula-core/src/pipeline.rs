//! The command pipeline
//!
//! One synchronous call per command: systems gate it, the domain validates
//! and executes it, and every resulting event is folded through the domain
//! reducer and then through each system's reducer in registration order.
//! Follow-up events from systems are folded depth-first right after the
//! event that caused them. Only the outermost call appends to the event
//! stream, so a command and everything it triggered land contiguously.

use crate::category::CategoryTable;
use crate::command::CommandBody;
use crate::config::EngineConfig;
use crate::domain::{codes, CommandOf, DomainCore, EntryOf, EventOf, Game, Rejection};
use crate::error::{Error, Result};
use crate::event::EventBody;
use crate::identity::PlayerId;
use crate::rng::RandomSource;
use crate::state::MatchState;
use crate::systems::tutorial::TutorialLibrary;
use crate::systems::{
    Gate, InteractionSystem, ResponseWindowSystem, System, SystemContext, TutorialSystem,
    UndoSystem,
};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, warn};

/// Everything needed to run commands for one rule set.
///
/// Built once and shared (typically behind an `Arc`) by every match using
/// the same rules.
pub struct PipelineConfig<G: Game> {
    pub domain: Box<dyn DomainCore<G>>,
    pub systems: Vec<Box<dyn System<G>>>,
    pub categories: CategoryTable,
    pub config: EngineConfig,
}

impl<G: Game> PipelineConfig<G> {
    /// A pipeline with no systems
    pub fn new(domain: impl DomainCore<G> + 'static) -> Self {
        Self {
            domain: Box::new(domain),
            systems: Vec::new(),
            categories: CategoryTable::default(),
            config: EngineConfig::default(),
        }
    }

    /// Register the standard systems: undo, tutorial, interaction, response window
    pub fn with_default_systems(self, tutorials: Arc<TutorialLibrary<G::Command>>) -> Self {
        self.with_system(UndoSystem::new())
            .with_system(TutorialSystem::new(tutorials))
            .with_system(InteractionSystem::new())
            .with_system(ResponseWindowSystem::new())
    }

    pub fn with_system(mut self, system: impl System<G> + 'static) -> Self {
        self.systems.push(Box::new(system));
        self
    }

    pub fn with_categories(mut self, categories: CategoryTable) -> Self {
        self.categories = categories;
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Names of the registered systems, in order
    pub fn system_names(&self) -> Vec<&'static str> {
        self.systems.iter().map(|s| s.name()).collect()
    }
}

/// Result of running one command
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome<G: Game> {
    /// The command was applied. `events` are the entries appended to the
    /// stream (empty for an undo, which rewinds instead).
    Applied {
        state: MatchState<G>,
        events: Vec<EntryOf<G>>,
    },
    /// The command was refused; the caller keeps its state
    Rejected { rejection: Rejection },
}

impl<G: Game> PipelineOutcome<G> {
    pub fn is_applied(&self) -> bool {
        matches!(self, PipelineOutcome::Applied { .. })
    }

    pub fn state(&self) -> Option<&MatchState<G>> {
        match self {
            PipelineOutcome::Applied { state, .. } => Some(state),
            PipelineOutcome::Rejected { .. } => None,
        }
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            PipelineOutcome::Rejected { rejection } => Some(rejection),
            PipelineOutcome::Applied { .. } => None,
        }
    }

    /// Consume into the new state, or the rejection
    pub fn into_result(self) -> std::result::Result<MatchState<G>, Rejection> {
        match self {
            PipelineOutcome::Applied { state, .. } => Ok(state),
            PipelineOutcome::Rejected { rejection } => Err(rejection),
        }
    }
}

/// Create a fresh match
pub fn new_match<G: Game>(
    config: &PipelineConfig<G>,
    player_ids: &[PlayerId],
    random: &mut dyn RandomSource,
) -> MatchState<G> {
    MatchState::new(config.domain.setup(player_ids, random))
}

/// Run one command against `state`.
///
/// Rejections come back as [`PipelineOutcome::Rejected`]; an `Err` means a
/// domain fault or a runaway follow-up loop, and the caller should treat the
/// match as corrupted.
pub fn execute_pipeline<G: Game>(
    config: &PipelineConfig<G>,
    state: &MatchState<G>,
    command: &CommandOf<G>,
    random: &mut dyn RandomSource,
    player_ids: &[PlayerId],
) -> Result<PipelineOutcome<G>> {
    let mut budget = config.config.pipeline.max_follow_up_events;
    let frame = Frame {
        depth: 0,
        scripted: false,
    };

    match apply(config, state, command, random, player_ids, frame, &mut budget)? {
        Step::Rejected(rejection) => {
            debug!(
                command = command.command_type(),
                player = %command.player_id,
                code = %rejection.code,
                "command rejected"
            );
            Ok(PipelineOutcome::Rejected { rejection })
        }
        Step::Restored(restored) => Ok(PipelineOutcome::Applied {
            state: restored,
            events: Vec::new(),
        }),
        Step::Applied {
            state: mut next,
            events,
        } => {
            let ctx = context(config, player_ids, command.timestamp, frame);
            for system in &config.systems {
                system.after_command(&ctx, state, &mut next, command, &events);
            }
            let count = events.len();
            let entries = next
                .sys
                .event_stream
                .append(events, config.config.event_stream.max_entries);
            debug!(
                command = command.command_type(),
                player = %command.player_id,
                events = count,
                next_event_id = next.sys.event_stream.next_id(),
                "command applied"
            );
            Ok(PipelineOutcome::Applied {
                state: next,
                events: entries,
            })
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    depth: usize,
    scripted: bool,
}

enum Step<G: Game> {
    Applied {
        state: MatchState<G>,
        events: Vec<EventOf<G>>,
    },
    Restored(MatchState<G>),
    Rejected(Rejection),
}

fn context<'a, G: Game>(
    config: &'a PipelineConfig<G>,
    player_ids: &'a [PlayerId],
    timestamp: u64,
    frame: Frame,
) -> SystemContext<'a, G> {
    SystemContext {
        domain: config.domain.as_ref(),
        categories: &config.categories,
        config: &config.config,
        player_ids,
        scripted: frame.scripted,
        depth: frame.depth,
        timestamp,
    }
}

fn apply<G: Game>(
    config: &PipelineConfig<G>,
    state: &MatchState<G>,
    command: &CommandOf<G>,
    random: &mut dyn RandomSource,
    player_ids: &[PlayerId],
    frame: Frame,
    budget: &mut usize,
) -> Result<Step<G>> {
    let ctx = context(config, player_ids, command.timestamp, frame);
    let command_type = command.command_type();

    let mut handled = None;
    for system in &config.systems {
        match system.before_command(&ctx, state, command, random)? {
            Gate::Continue => {}
            Gate::Reject(rejection) => return Ok(Step::Rejected(rejection)),
            Gate::Restore(restored) => return Ok(Step::Restored(*restored)),
            Gate::Handled(bodies) => {
                handled = Some(bodies);
                break;
            }
        }
    }

    let bodies = match (handled, &command.body) {
        (Some(bodies), _) => bodies,
        (None, CommandBody::System(_)) => {
            return Ok(Step::Rejected(Rejection::new(
                codes::UNHANDLED_SYSTEM_COMMAND,
                format!("no system handles {command_type}"),
            )))
        }
        (None, CommandBody::Domain(domain_command)) => {
            if let Err(rejection) =
                config
                    .domain
                    .validate(state, &command.player_id, domain_command)
            {
                return Ok(Step::Rejected(rejection));
            }
            config
                .domain
                .execute(state, &command.player_id, domain_command, random)
                .map_err(|fault| Error::domain(command_type, fault))?
        }
    };

    let mut next = state.clone();
    let mut folded = Vec::with_capacity(bodies.len());
    let events = bodies.into_iter().map(|body| command.stamp(body)).collect();
    fold(config, &ctx, &mut next, events, &mut folded, budget, command_type)?;

    // Scripted commands (tutorial AI) run through this same function so they
    // are gated, validated and folded exactly like player commands.
    loop {
        let scheduled = config
            .systems
            .iter()
            .find_map(|system| system.take_scheduled(&ctx, &next));
        let Some(scheduled) = scheduled else {
            break;
        };
        if scheduled.marker.is_empty() {
            return Err(Error::InvalidState(
                "scheduled commands require a marker event".to_string(),
            ));
        }
        let depth = frame.depth + 1;
        if depth > config.config.pipeline.max_scripted_depth {
            return Err(Error::ScriptedDepth { depth });
        }
        consume_budget(budget, scheduled.marker.len(), config, command_type)?;
        let markers = scheduled
            .marker
            .into_iter()
            .map(|event| command.stamp(EventBody::System(event)))
            .collect();
        fold(config, &ctx, &mut next, markers, &mut folded, budget, command_type)?;

        let nested = Frame {
            depth,
            scripted: true,
        };
        for scripted in &scheduled.commands {
            match apply(config, &next, scripted, random, player_ids, nested, budget)? {
                Step::Applied { state, events } => {
                    next = state;
                    folded.extend(events);
                }
                Step::Rejected(rejection) => warn!(
                    command = scripted.command_type(),
                    player = %scripted.player_id,
                    code = %rejection.code,
                    "scripted command rejected"
                ),
                Step::Restored(_) => warn!(
                    command = scripted.command_type(),
                    "scripted command tried to restore state; ignored"
                ),
            }
        }
    }

    Ok(Step::Applied {
        state: next,
        events: folded,
    })
}

fn fold<G: Game>(
    config: &PipelineConfig<G>,
    ctx: &SystemContext<'_, G>,
    state: &mut MatchState<G>,
    events: Vec<EventOf<G>>,
    folded: &mut Vec<EventOf<G>>,
    budget: &mut usize,
    command_type: &str,
) -> Result<()> {
    let mut queue: VecDeque<EventOf<G>> = events.into();
    while let Some(event) = queue.pop_front() {
        state.core = config
            .domain
            .reduce(&state.core, &event)
            .map_err(|fault| Error::domain(command_type, fault))?;
        for system in &config.systems {
            system.reduce(ctx, &state.core, &mut state.sys, &event);
        }

        let follow_ups: Vec<_> = config
            .systems
            .iter()
            .flat_map(|system| system.after_event(ctx, state, &event))
            .collect();
        consume_budget(budget, follow_ups.len(), config, command_type)?;
        for follow_up in follow_ups.into_iter().rev() {
            queue.push_front(event.follow_up(follow_up));
        }
        folded.push(event);
    }
    Ok(())
}

fn consume_budget<G: Game>(
    budget: &mut usize,
    count: usize,
    config: &PipelineConfig<G>,
    command_type: &str,
) -> Result<()> {
    *budget = budget.checked_sub(count).ok_or_else(|| Error::FollowUpLimit {
        command_type: command_type.to_string(),
        limit: config.config.pipeline.max_follow_up_events,
    })?;
    Ok(())
}
