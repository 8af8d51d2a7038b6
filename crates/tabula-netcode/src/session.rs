//! Client session glue
//!
//! Owns one [`OptimisticEngine`], a [`CommandBatcher`] and the
//! [`RollbackSignal`] that cursors read, and drives them from an injected
//! [`MatchTransport`].

use crate::batcher::{BatcherConfig, CommandBatcher};
use crate::cursor::RollbackSignal;
use crate::error::{Error, Result};
use crate::optimistic::{filter_played_events, OptimisticEngine, StreamChange};
use crate::transport::{MatchTransport, ServerMessage};
use tabula_core::{CommandOf, Game, MatchState};
use tracing::{debug, info};

/// One client's view of one match
pub struct ClientSession<G: Game, T: MatchTransport<G>> {
    engine: OptimisticEngine<G>,
    batcher: CommandBatcher<G::Command>,
    transport: T,
    signal: RollbackSignal,
    rendered: Option<MatchState<G>>,
    reconnect_token: u64,
}

impl<G: Game, T: MatchTransport<G>> ClientSession<G, T> {
    pub fn new(engine: OptimisticEngine<G>, batcher: BatcherConfig, transport: T) -> Self {
        Self {
            engine,
            batcher: CommandBatcher::new(batcher),
            transport,
            signal: RollbackSignal::new(),
            rendered: None,
            reconnect_token: 0,
        }
    }

    /// What the UI should draw
    pub fn state(&self) -> Option<&MatchState<G>> {
        self.rendered.as_ref()
    }

    pub fn signal(&self) -> &RollbackSignal {
        &self.signal
    }

    pub fn reconnect_token(&self) -> u64 {
        self.reconnect_token
    }

    pub fn engine(&self) -> &OptimisticEngine<G> {
        &self.engine
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Predict locally, then queue for sending
    pub fn submit(&mut self, command: CommandOf<G>, now: u64) -> Result<()> {
        if self.batcher.is_destroyed() {
            debug!(command = command.command_type(), "session closed; command refused");
            return Err(Error::Closed);
        }
        let prediction = self.engine.process_command(command.clone());
        if let Some(state) = prediction.state_to_render {
            self.rendered = Some(state);
        }
        if prediction.should_send {
            let batch = self.batcher.enqueue(command, now);
            self.send(batch)?;
        }
        Ok(())
    }

    /// Flush an expired batch and apply every waiting server message
    pub fn tick(&mut self, now: u64) -> Result<usize> {
        let batch = self.batcher.poll(now);
        self.send(batch)?;
        self.receive()
    }

    /// Apply every waiting server message
    pub fn receive(&mut self) -> Result<usize> {
        let mut handled = 0;
        while let Some(message) = self
            .transport
            .poll()
            .map_err(|e| Error::Transport(e.to_string()))?
        {
            self.handle(message);
            handled += 1;
        }
        Ok(handled)
    }

    /// Apply one authoritative update
    pub fn handle(&mut self, message: ServerMessage<G>) {
        match message {
            ServerMessage::State { state } => {
                let outcome = self.engine.reconcile(state);
                self.rendered = Some(match outcome.stream_change {
                    StreamChange::Forward => outcome.state_to_render,
                    StreamChange::Confirmed => {
                        self.signal.reconciled();
                        outcome.state_to_render
                    }
                    StreamChange::Diverged { first_replaced } => {
                        self.signal.rewind(first_replaced);
                        filter_played_events(&outcome.state_to_render, first_replaced.checked_sub(1))
                    }
                });
            }
            ServerMessage::Sync { state } => {
                info!(pending = self.engine.has_pending(), "state sync; dropping predictions");
                self.engine.reset();
                let outcome = self.engine.reconcile(state);
                self.signal.rollback(None);
                self.rendered = Some(outcome.state_to_render);
            }
        }
    }

    /// The connection was re-established; cursors jump to the tail
    pub fn reconnected(&mut self) {
        self.reconnect_token += 1;
        debug!(token = self.reconnect_token, "session reconnected");
    }

    /// Send whatever is still queued and stop batching
    pub fn close(&mut self) -> Result<()> {
        let batch = self.batcher.flush();
        self.send(batch)?;
        self.batcher.destroy();
        Ok(())
    }

    fn send(&mut self, batch: Vec<CommandOf<G>>) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        self.transport
            .send_commands(batch)
            .map_err(|e| Error::Transport(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::EventStreamCursor;
    use crate::optimistic::{AnimationMode, OptimisticConfig};
    use crate::test_game::{pipeline, players, Counter, CounterCommand, CounterEvent};
    use std::collections::VecDeque;
    use std::convert::Infallible;
    use tabula_core::{execute_pipeline, new_match, Command, EventBody, GameRng};

    /// Plays the server in-process
    #[derive(Default)]
    struct Loopback {
        sent: Vec<Vec<CommandOf<Counter>>>,
        inbox: VecDeque<ServerMessage<Counter>>,
    }

    impl MatchTransport<Counter> for Loopback {
        type Error = Infallible;

        fn send_commands(
            &mut self,
            commands: Vec<CommandOf<Counter>>,
        ) -> std::result::Result<(), Infallible> {
            self.sent.push(commands);
            Ok(())
        }

        fn poll(&mut self) -> std::result::Result<Option<ServerMessage<Counter>>, Infallible> {
            Ok(self.inbox.pop_front())
        }
    }

    fn apply(state: &MatchState<Counter>, command: &CommandOf<Counter>) -> MatchState<Counter> {
        execute_pipeline(&pipeline(), state, command, &mut GameRng::new(3), &players())
            .unwrap()
            .into_result()
            .unwrap()
    }

    fn session(config: OptimisticConfig) -> (ClientSession<Counter, Loopback>, MatchState<Counter>) {
        let pipeline = pipeline();
        let server = new_match(&pipeline, &players(), &mut GameRng::new(1));
        let engine = OptimisticEngine::new(pipeline, config).with_player_ids(players());
        let mut session =
            ClientSession::new(engine, BatcherConfig::default().with_window(0), Loopback::default());
        session.handle(ServerMessage::State {
            state: server.clone(),
        });
        (session, server)
    }

    #[test]
    fn test_predicted_then_confirmed() {
        let (mut session, server) = session(OptimisticConfig::default());
        let inc = Command::domain("0", CounterCommand::Inc(2));
        session.submit(inc.clone(), 0).unwrap();
        assert_eq!(session.state().unwrap().core.value, 2);
        assert_eq!(session.transport().sent.len(), 1);

        let confirmed = apply(&server, &inc);
        session
            .transport_mut()
            .inbox
            .push_back(ServerMessage::State { state: confirmed });
        assert_eq!(session.tick(1).unwrap(), 1);
        assert_eq!(session.state().unwrap().core.value, 2);
        assert!(!session.engine().has_pending());
        assert_eq!(session.signal().seq, 0);
    }

    #[test]
    fn test_rejected_prediction_signals_rollback() {
        let config = OptimisticConfig::default().with_animation("INC_BELOW", AnimationMode::Optimistic);
        let (mut session, server) = session(config);
        let mut cursor = EventStreamCursor::new(session.signal(), 0);
        cursor.consume_new(session.state().unwrap().event_stream(), session.signal(), 0);

        session
            .submit(Command::domain("0", CounterCommand::IncBelow { amount: 1, bound: 1 }), 0)
            .unwrap();
        let predicted = session.state().unwrap().clone();
        let played = cursor.consume_new(predicted.event_stream(), session.signal(), 0);
        assert_eq!(played.entries.len(), 1);

        // someone else got there first; the prediction no longer applies
        let foreign = apply(&server, &Command::domain("1", CounterCommand::Inc(5)));
        session.handle(ServerMessage::State { state: foreign });
        assert_eq!(session.signal().seq, 1);
        assert_eq!(session.signal().watermark, None);
        assert!(session.signal().from_start);
        assert_eq!(session.state().unwrap().core.value, 5);

        // the foreign event took the played id and is delivered in its place
        let result = cursor.consume_new(session.state().unwrap().event_stream(), session.signal(), 0);
        assert!(result.did_optimistic_rollback);
        assert_eq!(result.entries.len(), 1);
        assert_eq!(result.entries[0].event.body, EventBody::Domain(CounterEvent::Increased(5)));
        assert!(cursor
            .consume_new(session.state().unwrap().event_stream(), session.signal(), 0)
            .entries
            .is_empty());
    }

    #[test]
    fn test_optimistic_confirm_realigns_silently() {
        let config = OptimisticConfig::default().with_animation("INC", AnimationMode::Optimistic);
        let (mut session, server) = session(config);
        let mut cursor = EventStreamCursor::new(session.signal(), 0);
        cursor.consume_new(session.state().unwrap().event_stream(), session.signal(), 0);

        let inc = Command::domain("0", CounterCommand::Inc(1));
        session.submit(inc.clone(), 0).unwrap();
        let played = cursor.consume_new(session.state().unwrap().event_stream(), session.signal(), 0);
        assert_eq!(played.entries.len(), 1);

        let confirmed = apply(&server, &inc);
        session.handle(ServerMessage::State {
            state: confirmed.clone(),
        });
        assert_eq!(session.signal().seq, 0);
        assert_eq!(session.signal().reconcile_seq, 1);

        let result = cursor.consume_new(session.state().unwrap().event_stream(), session.signal(), 0);
        assert!(!result.did_optimistic_rollback);
        assert!(!result.did_reset);
        assert!(result.entries.is_empty());
        assert_eq!(cursor.cursor(), Some(0));

        // later server events still flow forward
        let next = apply(&confirmed, &Command::domain("1", CounterCommand::Inc(4)));
        session.handle(ServerMessage::State { state: next });
        let result = cursor.consume_new(session.state().unwrap().event_stream(), session.signal(), 0);
        assert_eq!(result.entries.iter().map(|e| e.id).collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_foreign_command_under_optimistic_prediction_is_delivered_once() {
        let config = OptimisticConfig::default().with_animation("INC", AnimationMode::Optimistic);
        let (mut session, server) = session(config);
        let mut cursor = EventStreamCursor::new(session.signal(), 0);
        cursor.consume_new(session.state().unwrap().event_stream(), session.signal(), 0);
        let mut delivered = Vec::new();

        let own = Command::domain("0", CounterCommand::Inc(1));
        session.submit(own.clone(), 0).unwrap();
        let result = cursor.consume_new(session.state().unwrap().event_stream(), session.signal(), 0);
        delivered.extend(result.entries);

        // the server ran the opponent's command before ours
        let foreign = apply(&server, &Command::domain("1", CounterCommand::Inc(10)));
        session.handle(ServerMessage::State {
            state: foreign.clone(),
        });
        assert!(session.engine().has_pending());
        assert_eq!(session.state().unwrap().core.value, 11);
        let result = cursor.consume_new(session.state().unwrap().event_stream(), session.signal(), 0);
        assert!(result.did_optimistic_rollback);
        assert_eq!(result.entries.iter().map(|e| e.id).collect::<Vec<_>>(), vec![0, 1]);
        delivered.extend(result.entries);

        session.handle(ServerMessage::State {
            state: apply(&foreign, &own),
        });
        assert!(!session.engine().has_pending());
        let result = cursor.consume_new(session.state().unwrap().event_stream(), session.signal(), 0);
        assert!(result.entries.is_empty());

        let foreign_events = delivered
            .iter()
            .filter(|e| e.event.body == EventBody::Domain(CounterEvent::Increased(10)))
            .count();
        assert_eq!(foreign_events, 1);
    }

    #[test]
    fn test_sync_resets_predictions() {
        let (mut session, server) = session(OptimisticConfig::default());
        session.submit(Command::domain("0", CounterCommand::Inc(1)), 0).unwrap();
        assert!(session.engine().has_pending());

        let synced = apply(&server, &Command::domain("1", CounterCommand::Inc(7))).stripped();
        session.handle(ServerMessage::Sync { state: synced });
        assert!(!session.engine().has_pending());
        assert_eq!(session.signal().seq, 1);
        assert_eq!(session.signal().watermark, None);
        assert_eq!(session.state().unwrap().core.value, 7);
    }

    #[test]
    fn test_close_flushes_batch() {
        let pipeline = pipeline();
        let engine = OptimisticEngine::new(pipeline, OptimisticConfig::default());
        let mut session =
            ClientSession::new(engine, BatcherConfig::default().with_window(50), Loopback::default());
        session.submit(Command::domain("0", CounterCommand::Inc(1)), 0).unwrap();
        session.submit(Command::domain("0", CounterCommand::Inc(2)), 10).unwrap();
        assert!(session.transport().sent.is_empty());
        session.close().unwrap();
        assert_eq!(session.transport().sent[0].len(), 2);
        assert_eq!(session.transport().sent.len(), 1);
    }

    #[test]
    fn test_submit_after_close_is_refused() {
        let (mut session, _) = session(OptimisticConfig::default());
        session.close().unwrap();
        let result = session.submit(Command::domain("0", CounterCommand::Inc(3)), 20);
        assert!(matches!(result, Err(Error::Closed)));
        assert!(!session.engine().has_pending());
        assert_eq!(session.state().unwrap().core.value, 0);
        assert!(session.transport().sent.is_empty());
    }
}
