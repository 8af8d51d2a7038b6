//! Counter domain for the netcode tests

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tabula_core::{
    CommandKind, DomainCore, DomainFault, EventBody, EventBodyOf, EventKind, EventOf, Game,
    MatchState, PipelineConfig, PlayerId, RandomSource, Rejection, TutorialLibrary,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Counter;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CounterCore {
    pub value: i64,
    pub rolls: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CounterCommand {
    Inc(i64),
    Roll,
    /// Only legal while the value is below the bound
    IncBelow { amount: i64, bound: i64 },
}

impl CommandKind for CounterCommand {
    fn command_type(&self) -> &str {
        match self {
            CounterCommand::Inc(_) => "INC",
            CounterCommand::Roll => "ROLL",
            CounterCommand::IncBelow { .. } => "INC_BELOW",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CounterEvent {
    Increased(i64),
    Rolled(u32),
}

impl EventKind for CounterEvent {
    fn event_type(&self) -> &str {
        match self {
            CounterEvent::Increased(_) => "INCREASED",
            CounterEvent::Rolled(_) => "ROLLED",
        }
    }
}

impl Game for Counter {
    type Core = CounterCore;
    type Command = CounterCommand;
    type Event = CounterEvent;
}

pub struct CounterDomain;

impl DomainCore<Counter> for CounterDomain {
    fn setup(&self, _player_ids: &[PlayerId], _random: &mut dyn RandomSource) -> CounterCore {
        CounterCore::default()
    }

    fn validate(
        &self,
        state: &MatchState<Counter>,
        _player_id: &PlayerId,
        command: &CounterCommand,
    ) -> Result<(), Rejection> {
        match command {
            CounterCommand::IncBelow { bound, .. } if state.core.value >= *bound => {
                Err(Rejection::new("counter.bound", "value already at bound"))
            }
            _ => Ok(()),
        }
    }

    fn execute(
        &self,
        _state: &MatchState<Counter>,
        _player_id: &PlayerId,
        command: &CounterCommand,
        random: &mut dyn RandomSource,
    ) -> Result<Vec<EventBodyOf<Counter>>, DomainFault> {
        Ok(vec![EventBody::Domain(match command {
            CounterCommand::Inc(n) | CounterCommand::IncBelow { amount: n, .. } => {
                CounterEvent::Increased(*n)
            }
            CounterCommand::Roll => CounterEvent::Rolled(random.d(6)),
        })])
    }

    fn reduce(
        &self,
        core: &CounterCore,
        event: &EventOf<Counter>,
    ) -> Result<CounterCore, DomainFault> {
        let mut core = core.clone();
        match &event.body {
            EventBody::Domain(CounterEvent::Increased(n)) => core.value += n,
            EventBody::Domain(CounterEvent::Rolled(face)) => core.rolls.push(*face),
            EventBody::System(_) => {}
        }
        Ok(core)
    }
}

pub fn pipeline() -> Arc<PipelineConfig<Counter>> {
    Arc::new(
        PipelineConfig::new(CounterDomain).with_default_systems(Arc::new(TutorialLibrary::new())),
    )
}

pub fn players() -> Vec<PlayerId> {
    vec![PlayerId::from("0"), PlayerId::from("1")]
}
