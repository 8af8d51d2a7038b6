//! A tiny domain used by this crate's unit tests

use crate::{
    execute_pipeline, new_match, CategoryTable, Command, CommandCategory, CommandKind, CommandOf,
    DefId, DomainCore, DomainFault, EventBody, EventBodyOf, EventKind, EventOf, Game, GameRng,
    MatchState, PipelineConfig, PipelineOutcome, PlayerId, RandomSource, Rejection, SysCommand,
    SysEvent, Value,
};
use crate::primitives::ShieldPool;
use crate::systems::interaction::{create_simple_choice, EntityRef, Interaction, InteractionOption};
use crate::systems::response::PendingDamage;
use crate::systems::tutorial::TutorialLibrary;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct TestGame;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestCore {
    pub hand: Vec<String>,
    pub hp: i64,
    pub shields: ShieldPool,
    pub counter: i64,
    pub rolls: Vec<u32>,
    pub tokens_spent: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TestCommand {
    Add(i64),
    Discard(String),
    Roll,
    AskDiscard,
    Strike(u32),
    UseToken { modifier: i32, evade: bool },
    Shield(u32),
    EndTurn,
    Boom,
}

impl CommandKind for TestCommand {
    fn command_type(&self) -> &str {
        match self {
            TestCommand::Add(_) => "ADD",
            TestCommand::Discard(_) => "DISCARD",
            TestCommand::Roll => "ROLL",
            TestCommand::AskDiscard => "ASK_DISCARD",
            TestCommand::Strike(_) => "STRIKE",
            TestCommand::UseToken { .. } => "USE_TOKEN",
            TestCommand::Shield(_) => "SHIELD",
            TestCommand::EndTurn => "END_TURN",
            TestCommand::Boom => "BOOM",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TestEvent {
    Added(i64),
    Discarded(String),
    Rolled(u32),
    Shielded(u32),
    TurnEnded,
}

impl EventKind for TestEvent {
    fn event_type(&self) -> &str {
        match self {
            TestEvent::Added(_) => "ADDED",
            TestEvent::Discarded(_) => "DISCARDED",
            TestEvent::Rolled(_) => "ROLLED",
            TestEvent::Shielded(_) => "SHIELDED",
            TestEvent::TurnEnded => "TURN_ENDED",
        }
    }

    fn payload(&self) -> Value {
        match self {
            TestEvent::Added(n) => [("amount", Value::from(*n))].into_iter().collect(),
            TestEvent::Discarded(uid) => [("cardUid", Value::from(uid.as_str()))].into_iter().collect(),
            _ => Value::Null,
        }
    }
}

impl Game for TestGame {
    type Core = TestCore;
    type Command = TestCommand;
    type Event = TestEvent;
}

pub struct TestDomain;

pub fn hand_option(uid: &str) -> InteractionOption {
    let value: Value = [(crate::systems::interaction::CARD_UID_KEY, Value::from(uid))]
        .into_iter()
        .collect();
    InteractionOption::new(format!("opt-{uid}"), uid, value)
}

impl DomainCore<TestGame> for TestDomain {
    fn setup(&self, _player_ids: &[PlayerId], _random: &mut dyn RandomSource) -> TestCore {
        TestCore {
            hand: ["A", "B", "C"].iter().map(|s| s.to_string()).collect(),
            hp: 12,
            ..TestCore::default()
        }
    }

    fn validate(
        &self,
        state: &MatchState<TestGame>,
        _player_id: &PlayerId,
        command: &TestCommand,
    ) -> Result<(), Rejection> {
        match command {
            TestCommand::Discard(uid) if !state.core.hand.contains(uid) => Err(Rejection::new(
                "card.not_in_hand",
                format!("{uid} is not in hand"),
            )),
            TestCommand::Add(0) => Err(Rejection::new("add.zero", "nothing to add")),
            _ => Ok(()),
        }
    }

    fn execute(
        &self,
        state: &MatchState<TestGame>,
        player_id: &PlayerId,
        command: &TestCommand,
        random: &mut dyn RandomSource,
    ) -> Result<Vec<EventBodyOf<TestGame>>, DomainFault> {
        Ok(match command {
            TestCommand::Add(n) => vec![EventBody::Domain(TestEvent::Added(*n))],
            TestCommand::Discard(uid) => vec![EventBody::Domain(TestEvent::Discarded(uid.clone()))],
            TestCommand::Roll => vec![EventBody::Domain(TestEvent::Rolled(random.d(6)))],
            TestCommand::AskDiscard => {
                let options = state.core.hand.iter().map(|uid| hand_option(uid)).collect();
                let interaction = create_simple_choice(
                    format!("discard-{}", state.sys.event_stream.next_id()),
                    player_id.clone(),
                    "Discard a card",
                    options,
                )
                .cancellable();
                vec![EventBody::System(interaction.request())]
            }
            TestCommand::Strike(amount) => {
                let pending = PendingDamage::new(
                    format!("dmg-{}", state.sys.event_stream.next_id()),
                    Some(player_id.clone()),
                    "1",
                    *amount,
                    "beforeDamageReceived",
                );
                vec![EventBody::System(pending.request(
                    vec!["END_TURN".to_string()],
                    vec!["TURN_ENDED".to_string()],
                ))]
            }
            TestCommand::UseToken { modifier, evade } => vec![EventBody::System(SysEvent::TokenUsed {
                player_id: player_id.clone(),
                token_id: "guard".into(),
                amount: 1,
                damage_modifier: *modifier,
                evade: *evade,
            })],
            TestCommand::Shield(value) => vec![EventBody::Domain(TestEvent::Shielded(*value))],
            TestCommand::EndTurn => vec![EventBody::Domain(TestEvent::TurnEnded)],
            TestCommand::Boom => return Err(DomainFault::new("boom")),
        })
    }

    fn reduce(&self, core: &TestCore, event: &EventOf<TestGame>) -> Result<TestCore, DomainFault> {
        let mut core = core.clone();
        match &event.body {
            EventBody::Domain(TestEvent::Added(n)) => core.counter += n,
            EventBody::Domain(TestEvent::Discarded(uid)) => core.hand.retain(|c| c != uid),
            EventBody::Domain(TestEvent::Rolled(face)) => core.rolls.push(*face),
            EventBody::Domain(TestEvent::Shielded(value)) => core.shields.add(*value, None),
            EventBody::Domain(TestEvent::TurnEnded) => {}
            EventBody::System(SysEvent::TokenUsed { amount, .. }) => core.tokens_spent += amount,
            EventBody::System(SysEvent::DamageDealt { amount, .. }) => {
                let through = core.shields.absorb(*amount);
                core.hp -= through as i64;
            }
            EventBody::System(_) => {}
        }
        Ok(core)
    }

    fn entity_is_live(&self, core: &TestCore, entity: &EntityRef) -> bool {
        match entity {
            EntityRef::Card(uid) => core.hand.contains(uid),
            _ => true,
        }
    }

    fn generate_options(
        &self,
        core: &TestCore,
        generator: &DefId,
        _interaction: &Interaction,
    ) -> Option<Vec<InteractionOption>> {
        (generator.as_str() == "whole_hand")
            .then(|| core.hand.iter().map(|uid| hand_option(uid)).collect())
    }

    fn resolve_interaction(
        &self,
        _state: &MatchState<TestGame>,
        _player_id: &PlayerId,
        _interaction: &Interaction,
        chosen: &[InteractionOption],
        _random: &mut dyn RandomSource,
    ) -> Result<Vec<EventBodyOf<TestGame>>, DomainFault> {
        Ok(chosen
            .iter()
            .filter_map(|option| match option.entity_ref() {
                Some(EntityRef::Card(uid)) => Some(EventBody::Domain(TestEvent::Discarded(uid))),
                _ => None,
            })
            .collect())
    }
}

pub fn categories() -> CategoryTable {
    CategoryTable::new()
        .with("ADD", CommandCategory::Strategic)
        .with("DISCARD", CommandCategory::Strategic)
        .with("ROLL", CommandCategory::Strategic)
        .with("ASK_DISCARD", CommandCategory::Strategic)
        .with("STRIKE", CommandCategory::Strategic)
        .with("SHIELD", CommandCategory::StateManagement)
        .with("USE_TOKEN", CommandCategory::Tactical)
        .with("END_TURN", CommandCategory::PhaseControl)
}

pub fn pipeline_with(tutorials: TutorialLibrary<TestCommand>) -> PipelineConfig<TestGame> {
    PipelineConfig::new(TestDomain)
        .with_default_systems(Arc::new(tutorials))
        .with_categories(categories())
}

pub fn pipeline() -> PipelineConfig<TestGame> {
    pipeline_with(TutorialLibrary::new())
}

pub fn players() -> Vec<PlayerId> {
    vec![PlayerId::from("0"), PlayerId::from("1")]
}

/// Test harness: runs commands and unwraps applied states
pub struct Harness {
    pub config: PipelineConfig<TestGame>,
    pub state: MatchState<TestGame>,
    pub rng: GameRng,
    pub players: Vec<PlayerId>,
}

impl Harness {
    pub fn new(config: PipelineConfig<TestGame>) -> Self {
        let mut rng = GameRng::new(7);
        let players = players();
        let state = new_match(&config, &players, &mut rng);
        Self {
            config,
            state,
            rng,
            players,
        }
    }

    pub fn run(&mut self, command: CommandOf<TestGame>) -> PipelineOutcome<TestGame> {
        let outcome = execute_pipeline(
            &self.config,
            &self.state,
            &command,
            &mut self.rng,
            &self.players,
        )
        .expect("pipeline fault");
        if let PipelineOutcome::Applied { state, .. } = &outcome {
            self.state = state.clone();
        }
        outcome
    }

    pub fn domain(&mut self, player: &str, command: TestCommand) -> PipelineOutcome<TestGame> {
        self.run(Command::domain(player, command))
    }

    pub fn sys(&mut self, player: &str, command: SysCommand) -> PipelineOutcome<TestGame> {
        self.run(Command::system(player, command))
    }

    /// Event types of the entries appended by an outcome
    pub fn types(outcome: &PipelineOutcome<TestGame>) -> Vec<String> {
        match outcome {
            PipelineOutcome::Applied { events, .. } => events
                .iter()
                .map(|e| e.event.event_type().to_string())
                .collect(),
            PipelineOutcome::Rejected { .. } => Vec::new(),
        }
    }

    pub fn code(outcome: &PipelineOutcome<TestGame>) -> Option<&str> {
        outcome.rejection().map(|r| r.code.as_str())
    }
}
