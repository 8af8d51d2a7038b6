//! Interaction queue: multi-step player choices
//!
//! One interaction is `current` (shown to its owner); the rest wait in a
//! FIFO queue. Options may reference live game entities through well-known
//! value keys (`cardUid`, `minionUid`, `baseIndex`); those are re-checked
//! against the core whenever a queued prompt is promoted, since the entity
//! may have gone away while the prompt waited.

use super::{Gate, System, SystemContext};
use crate::command::SysCommand;
use crate::domain::{codes, CommandOf, DomainCore, EventOf, Game, Rejection};
use crate::error::{Error, Result};
use crate::event::{EventBody, SysEvent};
use crate::identity::{DefId, PlayerId};
use crate::rng::RandomSource;
use crate::state::{MatchState, SystemState};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::warn;

/// Value keys that mark an option as referring to a game entity
pub const CARD_UID_KEY: &str = "cardUid";
pub const MINION_UID_KEY: &str = "minionUid";
pub const BASE_INDEX_KEY: &str = "baseIndex";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InteractionKind {
    SimpleChoice,
    MultistepChoice,
    Custom(String),
}

impl InteractionKind {
    pub fn as_str(&self) -> &str {
        match self {
            InteractionKind::SimpleChoice => "simple-choice",
            InteractionKind::MultistepChoice => "multistep-choice",
            InteractionKind::Custom(kind) => kind,
        }
    }
}

/// A reference from an option to a mutable game entity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityRef {
    Card(String),
    Minion(String),
    Base(usize),
}

impl EntityRef {
    /// Detect an entity reference in an option value
    pub fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_map()?;
        if let Some(uid) = map.get(MINION_UID_KEY).and_then(uid_string) {
            return Some(EntityRef::Minion(uid));
        }
        if let Some(uid) = map.get(CARD_UID_KEY).and_then(uid_string) {
            return Some(EntityRef::Card(uid));
        }
        map.get(BASE_INDEX_KEY)
            .and_then(Value::as_int)
            .filter(|i| *i >= 0)
            .map(|i| EntityRef::Base(i as usize))
    }
}

fn uid_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Int(i) => Some(i.to_string()),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionOption {
    pub id: String,
    pub label: String,
    pub value: Value,
}

impl InteractionOption {
    pub fn new(id: impl Into<String>, label: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            value: value.into(),
        }
    }

    pub fn entity_ref(&self) -> Option<EntityRef> {
        EntityRef::from_value(&self.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiSelect {
    pub min: usize,
    pub max: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionData {
    pub prompt: String,
    pub options: Vec<InteractionOption>,
    pub multi: Option<MultiSelect>,
    /// Id of a domain generator that re-derives options on refresh
    pub options_generator: Option<DefId>,
    pub cancellable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub id: String,
    pub kind: InteractionKind,
    pub player_id: PlayerId,
    pub data: InteractionData,
    /// Card or ability that opened the prompt
    pub source_id: Option<String>,
}

impl Interaction {
    /// Fewest options a valid answer selects
    pub fn min_selection(&self) -> usize {
        self.data.multi.map_or(1, |m| m.min)
    }

    /// Most options a valid answer selects
    pub fn max_selection(&self) -> usize {
        self.data.multi.map_or(1, |m| m.max)
    }

    pub fn option(&self, id: &str) -> Option<&InteractionOption> {
        self.data.options.iter().find(|o| o.id == id)
    }

    pub fn with_source(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    pub fn with_generator(mut self, generator: impl Into<DefId>) -> Self {
        self.data.options_generator = Some(generator.into());
        self
    }

    pub fn cancellable(mut self) -> Self {
        self.data.cancellable = true;
        self
    }

    /// Event that queues this interaction
    pub fn request(self) -> SysEvent {
        SysEvent::InteractionRequested { interaction: self }
    }
}

/// Single-answer prompt
pub fn create_simple_choice(
    id: impl Into<String>,
    player_id: impl Into<PlayerId>,
    prompt: impl Into<String>,
    options: Vec<InteractionOption>,
) -> Interaction {
    Interaction {
        id: id.into(),
        kind: InteractionKind::SimpleChoice,
        player_id: player_id.into(),
        data: InteractionData {
            prompt: prompt.into(),
            options,
            multi: None,
            options_generator: None,
            cancellable: false,
        },
        source_id: None,
    }
}

/// Prompt accepting between `min` and `max` answers
pub fn create_multi_choice(
    id: impl Into<String>,
    player_id: impl Into<PlayerId>,
    prompt: impl Into<String>,
    options: Vec<InteractionOption>,
    min: usize,
    max: usize,
) -> Interaction {
    let mut interaction = create_simple_choice(id, player_id, prompt, options);
    interaction.kind = InteractionKind::MultistepChoice;
    interaction.data.multi = Some(MultiSelect { min, max });
    interaction
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InteractionState {
    pub current: Option<Interaction>,
    pub queue: VecDeque<Interaction>,
    /// Ids of completed interactions, oldest first
    pub history: Vec<String>,
}

impl InteractionState {
    pub fn is_blocked(&self) -> bool {
        self.current.is_some()
    }
}

/// Make `interaction` current, or queue it behind the current one
pub fn queue_interaction(state: &mut InteractionState, interaction: Interaction) {
    if state.current.is_none() {
        state.current = Some(interaction);
    } else {
        state.queue.push_back(interaction);
    }
}

/// Retire the current interaction and promote the queue head, refreshing
/// its options against `core`
pub fn resolve_interaction<G: Game>(
    domain: &dyn DomainCore<G>,
    core: &G::Core,
    state: &mut InteractionState,
) {
    if let Some(done) = state.current.take() {
        state.history.push(done.id);
    }
    state.current = state
        .queue
        .pop_front()
        .map(|next| refresh_options(domain, core, next));
}

/// Refresh the current interaction's options against `core`
pub fn refresh_interaction_options<G: Game>(
    domain: &dyn DomainCore<G>,
    core: &G::Core,
    state: &mut InteractionState,
) {
    if let Some(current) = state.current.take() {
        state.current = Some(refresh_options(domain, core, current));
    }
}

fn refresh_options<G: Game>(
    domain: &dyn DomainCore<G>,
    core: &G::Core,
    mut interaction: Interaction,
) -> Interaction {
    let refreshed = match &interaction.data.options_generator {
        Some(generator) => domain
            .generate_options(core, generator, &interaction)
            .unwrap_or_else(|| filter_live(domain, core, &interaction.data.options)),
        None => filter_live(domain, core, &interaction.data.options),
    };

    if refreshed == interaction.data.options {
        return interaction;
    }

    // Fail open: never show a prompt that cannot be answered legally.
    let required = interaction.min_selection().max(1);
    if refreshed.len() < required {
        warn!(
            interaction = %interaction.id,
            remaining = refreshed.len(),
            required,
            "option refresh would leave prompt unsatisfiable; keeping original options"
        );
        return interaction;
    }

    interaction.data.options = refreshed;
    interaction
}

fn filter_live<G: Game>(
    domain: &dyn DomainCore<G>,
    core: &G::Core,
    options: &[InteractionOption],
) -> Vec<InteractionOption> {
    options
        .iter()
        .filter(|opt| match opt.entity_ref() {
            Some(entity) => domain.entity_is_live(core, &entity),
            None => true,
        })
        .cloned()
        .collect()
}

/// Owns `sys.interaction`
#[derive(Debug, Clone, Default)]
pub struct InteractionSystem;

impl InteractionSystem {
    pub fn new() -> Self {
        Self
    }

    fn respond<G: Game>(
        &self,
        ctx: &SystemContext<'_, G>,
        state: &MatchState<G>,
        command: &CommandOf<G>,
        current: &Interaction,
        option_ids: &[String],
        random: &mut dyn RandomSource,
    ) -> Result<Gate<G>> {
        let mut chosen = Vec::with_capacity(option_ids.len());
        for (i, id) in option_ids.iter().enumerate() {
            if option_ids[..i].contains(id) {
                return Ok(Gate::Reject(Rejection::new(
                    codes::INTERACTION_DUPLICATE_OPTION,
                    format!("option {id} selected twice"),
                )));
            }
            match current.option(id) {
                Some(option) => chosen.push(option.clone()),
                None => {
                    return Ok(Gate::Reject(Rejection::new(
                        codes::INTERACTION_UNKNOWN_OPTION,
                        format!("option {id} is not offered by {}", current.id),
                    )))
                }
            }
        }

        let (min, max) = (current.min_selection(), current.max_selection());
        if chosen.len() < min || chosen.len() > max {
            return Ok(Gate::Reject(Rejection::new(
                codes::INTERACTION_SELECTION_COUNT,
                format!("expected {min}..={max} options, got {}", chosen.len()),
            )));
        }

        let resolved = ctx
            .domain
            .resolve_interaction(state, &command.player_id, current, &chosen, random)
            .map_err(|fault| Error::domain(command.command_type(), fault))?;

        let mut events = Vec::with_capacity(resolved.len() + 2);
        events.push(EventBody::System(SysEvent::InteractionResponded {
            interaction_id: current.id.clone(),
            player_id: command.player_id.clone(),
            option_ids: option_ids.to_vec(),
        }));
        events.extend(resolved);
        events.push(EventBody::System(SysEvent::InteractionCompleted {
            interaction_id: current.id.clone(),
        }));
        Ok(Gate::Handled(events))
    }
}

impl<G: Game> System<G> for InteractionSystem {
    fn name(&self) -> &'static str {
        "interaction"
    }

    fn before_command(
        &self,
        ctx: &SystemContext<'_, G>,
        state: &MatchState<G>,
        command: &CommandOf<G>,
        random: &mut dyn RandomSource,
    ) -> Result<Gate<G>> {
        let current = state.sys.interaction.current.as_ref();
        let (interaction_id, respond_with) = match command.as_system() {
            Some(SysCommand::InteractionRespond {
                interaction_id,
                option_ids,
            }) => (interaction_id, Some(option_ids)),
            Some(SysCommand::InteractionCancel { interaction_id }) => (interaction_id, None),
            Some(SysCommand::Undo) => return Ok(Gate::Continue),
            _ => {
                return Ok(match current {
                    // Scripted tutorial actions run on behalf of the other seat.
                    Some(pending) if !ctx.scripted => Gate::Reject(Rejection::new(
                        codes::INTERACTION_PENDING,
                        format!("waiting for {} to answer {}", pending.player_id, pending.id),
                    )),
                    _ => Gate::Continue,
                });
            }
        };

        let Some(current) = current else {
            return Ok(Gate::Reject(Rejection::new(
                codes::INTERACTION_NONE,
                "no interaction is pending",
            )));
        };
        if current.player_id != command.player_id {
            return Ok(Gate::Reject(Rejection::new(
                codes::INTERACTION_NOT_OWNER,
                format!("{} belongs to {}", current.id, current.player_id),
            )));
        }
        if &current.id != interaction_id {
            return Ok(Gate::Reject(Rejection::new(
                codes::INTERACTION_STALE,
                format!("{interaction_id} is not the current interaction"),
            )));
        }

        match respond_with {
            Some(option_ids) => self.respond(ctx, state, command, current, option_ids, random),
            None if !current.data.cancellable => Ok(Gate::Reject(Rejection::new(
                codes::INTERACTION_NOT_CANCELLABLE,
                format!("{} cannot be cancelled", current.id),
            ))),
            None => Ok(Gate::Handled(vec![
                EventBody::System(SysEvent::InteractionCancelled {
                    interaction_id: current.id.clone(),
                    player_id: command.player_id.clone(),
                }),
                EventBody::System(SysEvent::InteractionCompleted {
                    interaction_id: current.id.clone(),
                }),
            ])),
        }
    }

    fn reduce(
        &self,
        ctx: &SystemContext<'_, G>,
        core: &G::Core,
        sys: &mut SystemState<G>,
        event: &EventOf<G>,
    ) {
        match event.as_system() {
            Some(SysEvent::InteractionRequested { interaction }) => {
                queue_interaction(&mut sys.interaction, interaction.clone());
            }
            Some(SysEvent::InteractionCompleted { interaction_id }) => {
                let is_current = sys
                    .interaction
                    .current
                    .as_ref()
                    .is_some_and(|c| &c.id == interaction_id);
                if is_current {
                    resolve_interaction(ctx.domain, core, &mut sys.interaction);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_game::{
        hand_option, pipeline, Harness, TestCommand, TestCore, TestDomain, TestGame,
    };
    use crate::PipelineOutcome;

    fn core_with_hand(hand: &[&str]) -> TestCore {
        TestCore {
            hand: hand.iter().map(|s| s.to_string()).collect(),
            ..TestCore::default()
        }
    }

    #[test]
    fn test_queue_is_fifo() {
        let mut state = InteractionState::default();
        queue_interaction(&mut state, create_simple_choice("a", "0", "a", vec![]));
        queue_interaction(&mut state, create_simple_choice("b", "0", "b", vec![]));
        queue_interaction(&mut state, create_simple_choice("c", "0", "c", vec![]));
        assert_eq!(state.current.as_ref().map(|i| i.id.as_str()), Some("a"));
        assert_eq!(state.queue.len(), 2);

        let core = TestCore::default();
        resolve_interaction::<TestGame>(&TestDomain, &core, &mut state);
        assert_eq!(state.current.as_ref().map(|i| i.id.as_str()), Some("b"));
        assert_eq!(state.history, vec!["a".to_string()]);
    }

    #[test]
    fn test_refresh_drops_removed_cards_in_order() {
        let mut state = InteractionState::default();
        queue_interaction(
            &mut state,
            create_simple_choice(
                "pick",
                "0",
                "pick a card",
                vec![hand_option("A"), hand_option("B"), hand_option("C")],
            ),
        );

        let core = core_with_hand(&["B", "C"]);
        refresh_interaction_options::<TestGame>(&TestDomain, &core, &mut state);

        let ids: Vec<_> = state
            .current
            .unwrap()
            .data
            .options
            .into_iter()
            .map(|o| o.id)
            .collect();
        assert_eq!(ids, vec!["opt-B", "opt-C"]);
    }

    #[test]
    fn test_refresh_keeps_non_referential_options() {
        let mut state = InteractionState::default();
        queue_interaction(&mut state, create_simple_choice("first", "0", "x", vec![]));
        let skip: Value = [("skip", Value::Bool(true))].into_iter().collect();
        queue_interaction(
            &mut state,
            create_simple_choice(
                "second",
                "0",
                "pick or skip",
                vec![
                    hand_option("A"),
                    hand_option("B"),
                    InteractionOption::new("skip", "Skip", skip),
                ],
            ),
        );

        let core = core_with_hand(&["B"]);
        resolve_interaction::<TestGame>(&TestDomain, &core, &mut state);
        let ids: Vec<_> = state
            .current
            .unwrap()
            .data
            .options
            .into_iter()
            .map(|o| o.id)
            .collect();
        assert_eq!(ids, vec!["opt-B", "skip"]);
    }

    #[test]
    fn test_refresh_fails_open_when_min_unsatisfiable() {
        let mut state = InteractionState::default();
        queue_interaction(
            &mut state,
            create_multi_choice(
                "two",
                "0",
                "pick two",
                vec![hand_option("A"), hand_option("B"), hand_option("C")],
                2,
                2,
            ),
        );

        let core = core_with_hand(&["A"]);
        refresh_interaction_options::<TestGame>(&TestDomain, &core, &mut state);
        assert_eq!(state.current.unwrap().data.options.len(), 3);
    }

    #[test]
    fn test_generator_takes_precedence() {
        let mut state = InteractionState::default();
        queue_interaction(
            &mut state,
            create_simple_choice("gen", "0", "generated", vec![hand_option("A")])
                .with_generator("whole_hand"),
        );

        let core = core_with_hand(&["X", "Y"]);
        refresh_interaction_options::<TestGame>(&TestDomain, &core, &mut state);
        let ids: Vec<_> = state
            .current
            .unwrap()
            .data
            .options
            .into_iter()
            .map(|o| o.id)
            .collect();
        assert_eq!(ids, vec!["opt-X", "opt-Y"]);
    }

    #[test]
    fn test_entity_ref_detection() {
        let card: Value = [("cardUid", Value::from("c1"))].into_iter().collect();
        let minion: Value = [("minionUid", Value::from(7))].into_iter().collect();
        let base: Value = [("baseIndex", Value::from(2))].into_iter().collect();
        assert_eq!(EntityRef::from_value(&card), Some(EntityRef::Card("c1".into())));
        assert_eq!(EntityRef::from_value(&minion), Some(EntityRef::Minion("7".into())));
        assert_eq!(EntityRef::from_value(&base), Some(EntityRef::Base(2)));
        assert_eq!(EntityRef::from_value(&Value::Bool(true)), None);
    }

    fn respond(
        h: &mut Harness,
        player: &str,
        id: &str,
        options: &[&str],
    ) -> PipelineOutcome<TestGame> {
        h.sys(
            player,
            SysCommand::InteractionRespond {
                interaction_id: id.to_string(),
                option_ids: options.iter().map(|o| o.to_string()).collect(),
            },
        )
    }

    #[test]
    fn test_respond_flow() {
        let mut h = Harness::new(pipeline());
        let outcome = h.domain("0", TestCommand::AskDiscard);
        assert_eq!(Harness::types(&outcome), vec!["INTERACTION_REQUESTED"]);
        let id = h.state.current_interaction().unwrap().id.clone();
        assert_eq!(id, "discard-0");

        let outcome = h.domain("0", TestCommand::Add(1));
        assert_eq!(Harness::code(&outcome), Some(codes::INTERACTION_PENDING));
        let outcome = respond(&mut h, "1", &id, &["opt-A"]);
        assert_eq!(Harness::code(&outcome), Some(codes::INTERACTION_NOT_OWNER));
        let outcome = respond(&mut h, "0", "discard-99", &["opt-A"]);
        assert_eq!(Harness::code(&outcome), Some(codes::INTERACTION_STALE));
        let outcome = respond(&mut h, "0", &id, &[]);
        assert_eq!(Harness::code(&outcome), Some(codes::INTERACTION_SELECTION_COUNT));
        let outcome = respond(&mut h, "0", &id, &["opt-A", "opt-A"]);
        assert_eq!(Harness::code(&outcome), Some(codes::INTERACTION_DUPLICATE_OPTION));
        let outcome = respond(&mut h, "0", &id, &["opt-Z"]);
        assert_eq!(Harness::code(&outcome), Some(codes::INTERACTION_UNKNOWN_OPTION));

        let outcome = respond(&mut h, "0", &id, &["opt-B"]);
        assert_eq!(
            Harness::types(&outcome),
            vec!["INTERACTION_RESPONDED", "DISCARDED", "INTERACTION_COMPLETED"]
        );
        assert_eq!(h.state.core.hand, vec!["A".to_string(), "C".to_string()]);
        assert!(h.state.current_interaction().is_none());
        assert_eq!(h.state.sys.interaction.history, vec![id]);
    }

    #[test]
    fn test_cancel_flow() {
        let mut h = Harness::new(pipeline());
        h.domain("0", TestCommand::AskDiscard);
        let id = h.state.current_interaction().unwrap().id.clone();
        let outcome = h.sys("0", SysCommand::InteractionCancel { interaction_id: id });
        assert_eq!(
            Harness::types(&outcome),
            vec!["INTERACTION_CANCELLED", "INTERACTION_COMPLETED"]
        );
        assert_eq!(h.state.core.hand.len(), 3);
        assert!(h.domain("0", TestCommand::Add(1)).is_applied());
    }

    #[test]
    fn test_respond_without_interaction() {
        let mut h = Harness::new(pipeline());
        let outcome = respond(&mut h, "0", "discard-0", &["opt-A"]);
        assert_eq!(Harness::code(&outcome), Some(codes::INTERACTION_NONE));
    }

    #[test]
    fn test_undo_passes_while_pending() {
        let mut h = Harness::new(pipeline());
        h.domain("0", TestCommand::AskDiscard);
        assert!(h.sys("0", SysCommand::Undo).is_applied());
        assert!(h.state.current_interaction().is_none());
    }
}
