//! Tally domain for the journal tests

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tabula_core::{
    CommandKind, DomainCore, DomainFault, EngineConfig, EventBody, EventBodyOf, EventKind,
    EventOf, Game, MatchState, PipelineConfig, PlayerId, RandomSource, Rejection,
    TutorialLibrary,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Tally;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TallyCore {
    pub total: i64,
    pub seats: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TallyCommand {
    Add(i64),
    Roll,
}

impl CommandKind for TallyCommand {
    fn command_type(&self) -> &str {
        match self {
            TallyCommand::Add(_) => "ADD",
            TallyCommand::Roll => "ROLL",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TallyEvent {
    Added(i64),
    Rolled(u32),
}

impl EventKind for TallyEvent {
    fn event_type(&self) -> &str {
        match self {
            TallyEvent::Added(_) => "ADDED",
            TallyEvent::Rolled(_) => "ROLLED",
        }
    }
}

impl Game for Tally {
    type Core = TallyCore;
    type Command = TallyCommand;
    type Event = TallyEvent;
}

pub struct TallyDomain;

impl DomainCore<Tally> for TallyDomain {
    fn setup(&self, player_ids: &[PlayerId], random: &mut dyn RandomSource) -> TallyCore {
        TallyCore {
            total: i64::from(random.d(6)),
            seats: player_ids.len(),
        }
    }

    fn validate(
        &self,
        _state: &MatchState<Tally>,
        _player_id: &PlayerId,
        _command: &TallyCommand,
    ) -> Result<(), Rejection> {
        Ok(())
    }

    fn execute(
        &self,
        _state: &MatchState<Tally>,
        _player_id: &PlayerId,
        command: &TallyCommand,
        random: &mut dyn RandomSource,
    ) -> Result<Vec<EventBodyOf<Tally>>, DomainFault> {
        Ok(vec![EventBody::Domain(match command {
            TallyCommand::Add(n) => TallyEvent::Added(*n),
            TallyCommand::Roll => TallyEvent::Rolled(random.d(6)),
        })])
    }

    fn reduce(&self, core: &TallyCore, event: &EventOf<Tally>) -> Result<TallyCore, DomainFault> {
        let mut core = core.clone();
        match &event.body {
            EventBody::Domain(TallyEvent::Added(n)) => core.total += n,
            EventBody::Domain(TallyEvent::Rolled(face)) => core.total += i64::from(*face),
            EventBody::System(_) => {}
        }
        Ok(core)
    }
}

pub fn pipeline() -> Arc<PipelineConfig<Tally>> {
    pipeline_with(EngineConfig::default())
}

pub fn pipeline_with(config: EngineConfig) -> Arc<PipelineConfig<Tally>> {
    Arc::new(
        PipelineConfig::new(TallyDomain)
            .with_default_systems(Arc::new(TutorialLibrary::new()))
            .with_config(config),
    )
}

pub fn players() -> Vec<PlayerId> {
    vec![PlayerId::from("0"), PlayerId::from("1")]
}
