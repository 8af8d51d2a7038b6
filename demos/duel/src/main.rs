//! Duel Example
//!
//! Runs a short scripted duel between two predicting clients and an
//! in-process host, then checks the recorded match replays to the same
//! state and prints an audit of its event stream.
//!
//! Usage: `duel [rules-dir]` (defaults to the rules shipped with the crate).
//! Set `RUST_LOG=debug` to see every command and event.

use duel::{pipeline_from, rules, rules_from_dir, seats, Duel, DuelCommand, LocalLink, MatchHost};
use std::error::Error;
use tabula_core::{Command, CommandBody, PlayerId, SysCommand};
use tabula_journal::{replay_commands, verify_reduce_purity, Auditor, Exporter};
use tabula_netcode::{
    BatcherConfig, ClientSession, Determinism, EventStreamCursor, OptimisticConfig,
    OptimisticEngine,
};
use tracing::{debug, info};

const SEED: u64 = 1444;
const MAX_TURNS: u32 = 12;

/// One seat's client: its session and the cursor its UI reads through
struct Seat {
    id: PlayerId,
    session: ClientSession<Duel, LocalLink>,
    cursor: EventStreamCursor,
}

impl Seat {
    fn drain(&mut self) {
        let Some(state) = self.session.state() else {
            return;
        };
        let fresh = self.cursor.consume_new(
            state.event_stream(),
            self.session.signal(),
            self.session.reconnect_token(),
        );
        for entry in fresh.entries {
            debug!(seat = %self.id, id = entry.id, event = entry.event.event_type(), "animate");
        }
    }
}

struct Table {
    host: MatchHost,
    seats: Vec<Seat>,
    clock: u64,
}

impl Table {
    /// Send one command from `seat` and let every client catch up
    fn send(&mut self, seat: usize, body: CommandBody<DuelCommand>) -> Result<(), Box<dyn Error>> {
        self.clock += 100;
        let player = &mut self.seats[seat];
        let command = Command {
            body,
            player_id: player.id.clone(),
            timestamp: self.clock,
        };
        player.session.submit(command, self.clock)?;
        for s in &mut self.seats {
            s.session.tick(self.clock + 50)?;
        }
        self.host.pump()?;
        for s in &mut self.seats {
            s.session.receive()?;
            s.drain();
        }
        Ok(())
    }

    fn play(&mut self, seat: usize, command: DuelCommand) -> Result<(), Box<dyn Error>> {
        self.send(seat, CommandBody::Domain(command))
    }

    fn sys(&mut self, seat: usize, command: SysCommand) -> Result<(), Box<dyn Error>> {
        self.send(seat, CommandBody::System(command))
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    println!("=== Tabula Duel Example ===\n");

    let rules = match std::env::args().nth(1) {
        Some(dir) => rules_from_dir(dir)?,
        None => rules()?,
    };
    let pipeline = pipeline_from(rules);
    let player_ids = seats();

    let mut host = MatchHost::new(pipeline.clone(), SEED, player_ids.clone());
    let prediction = OptimisticConfig::default()
        .with_determinism("END_TURN", Determinism::Deterministic)
        .with_determinism("ROLL", Determinism::NonDeterministic);
    let seats = player_ids
        .iter()
        .map(|id| {
            let engine = OptimisticEngine::new(pipeline.clone(), prediction.clone())
                .with_player_ids(player_ids.clone());
            let session = ClientSession::new(engine, BatcherConfig::default(), host.connect());
            let cursor = EventStreamCursor::new(session.signal(), session.reconnect_token());
            Seat {
                id: id.clone(),
                session,
                cursor,
            }
        })
        .collect();
    let mut table = Table {
        host,
        seats,
        clock: 0,
    };
    for seat in &mut table.seats {
        seat.session.receive()?;
        seat.drain();
    }

    for turn in 0..MAX_TURNS {
        let core = table.host.recorder().state().core.clone();
        let attacker = core.active;
        let defender = (attacker + 1) % core.seats.len();
        info!(turn, attacker = %core.seats[attacker], "turn begins");

        table.play(attacker, DuelCommand::Roll)?;

        if turn == 1 {
            table.play(attacker, DuelCommand::AskDiscard)?;
            let prompt = table.host.recorder().state().current_interaction().cloned();
            if let Some(prompt) = prompt {
                let choice = prompt.data.options.first().map(|o| o.id.clone());
                table.sys(
                    defender,
                    SysCommand::InteractionRespond {
                        interaction_id: prompt.id,
                        option_ids: choice.into_iter().collect(),
                    },
                )?;
            }
        }

        table.play(attacker, DuelCommand::Attack)?;

        let state = table.host.recorder().state();
        let fighter = state.core.fighter(&core.seats[defender]);
        let ward = fighter.and_then(|f| f.hand.first()).map(|c| c.uid.clone());
        let has_guard = fighter.is_some_and(|f| f.stacks("guard") > 0);
        if has_guard {
            table.play(
                defender,
                DuelCommand::UseToken {
                    token_id: "guard".to_string(),
                },
            )?;
        } else if let Some(card_uid) = ward {
            table.play(defender, DuelCommand::RaiseWard { card_uid })?;
        }
        if table.host.recorder().state().is_response_window_open() {
            table.sys(defender, SysCommand::ResponsePass)?;
        }

        if let Some(winner) = &table.host.recorder().state().core.winner {
            info!(%winner, turn, "match decided");
            break;
        }
        table.play(attacker, DuelCommand::Draw)?;
        table.play(attacker, DuelCommand::EndTurn)?;
    }

    for seat in &mut table.seats {
        seat.session.close()?;
    }
    let recorder = table.host.into_recorder();
    let state = recorder.state();

    println!("Final standings:");
    for (id, fighter) in &state.core.fighters {
        println!(
            "  {}: {} hp, {} cards, tokens {:?}",
            id.as_str(),
            fighter.hp,
            fighter.hand.len(),
            fighter.tokens
        );
    }
    println!();

    let replayed = replay_commands(&pipeline, recorder.log())?;
    if replayed.core != state.core {
        return Err("replaying the log produced a different match".into());
    }
    verify_reduce_purity(&pipeline, recorder.log(), state)?;
    println!("Replay check: {} commands reproduce the match\n", recorder.log().len());

    println!("{}", Auditor::new(state.event_stream()).generate_report());
    println!("{}", Exporter::new(recorder.log()).with_state(state).to_text());

    Ok(())
}
