//! In-process authoritative host and the loopback link clients reach it by
//!
//! The host owns the only real match state. Every command it receives is run
//! through the pipeline and recorded, and every client is told the resulting
//! state, whether the command was applied or not, so predictions are always
//! confirmed or dropped.

use crate::game::Duel;
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use tabula_core::{CommandOf, PipelineConfig, PipelineOutcome, PlayerId};
use tabula_journal::MatchRecorder;
use tabula_netcode::{MatchTransport, ServerMessage};
use thiserror::Error;
use tracing::{debug, warn};

/// The other end of a loopback link hung up
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("host is gone")]
    HostGone,
}

/// A client's end of a loopback connection
pub struct LocalLink {
    to_host: Sender<Vec<CommandOf<Duel>>>,
    from_host: Receiver<ServerMessage<Duel>>,
}

impl MatchTransport<Duel> for LocalLink {
    type Error = LinkError;

    fn send_commands(&mut self, commands: Vec<CommandOf<Duel>>) -> Result<(), LinkError> {
        self.to_host.send(commands).map_err(|_| LinkError::HostGone)
    }

    fn poll(&mut self) -> Result<Option<ServerMessage<Duel>>, LinkError> {
        match self.from_host.try_recv() {
            Ok(message) => Ok(Some(message)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(LinkError::HostGone),
        }
    }
}

/// Authoritative host for one match
pub struct MatchHost {
    recorder: MatchRecorder<Duel>,
    inbox: Receiver<Vec<CommandOf<Duel>>>,
    inbox_tx: Sender<Vec<CommandOf<Duel>>>,
    clients: Vec<Sender<ServerMessage<Duel>>>,
}

impl MatchHost {
    pub fn new(pipeline: Arc<PipelineConfig<Duel>>, seed: u64, player_ids: Vec<PlayerId>) -> Self {
        let (inbox_tx, inbox) = channel();
        Self {
            recorder: MatchRecorder::new(pipeline, seed, player_ids),
            inbox,
            inbox_tx,
            clients: Vec::new(),
        }
    }

    /// Open a link; the client first receives a full sync
    pub fn connect(&mut self) -> LocalLink {
        let (tx, from_host) = channel();
        let sync = ServerMessage::Sync {
            state: self.recorder.state().stripped(),
        };
        // The receiver is still in scope, so this cannot fail.
        let _ = tx.send(sync);
        self.clients.push(tx);
        LocalLink {
            to_host: self.inbox_tx.clone(),
            from_host,
        }
    }

    /// Run every command waiting in the inbox; returns how many were applied
    pub fn pump(&mut self) -> tabula_journal::Result<usize> {
        let mut applied = 0;
        while let Ok(batch) = self.inbox.try_recv() {
            for command in batch {
                match self.recorder.submit(command)? {
                    PipelineOutcome::Applied { events, .. } => {
                        applied += 1;
                        debug!(events = events.len(), "host applied command");
                    }
                    PipelineOutcome::Rejected { rejection } => {
                        warn!(code = %rejection.code, message = %rejection.message, "host rejected command");
                    }
                }
                self.broadcast();
            }
        }
        Ok(applied)
    }

    pub fn recorder(&self) -> &MatchRecorder<Duel> {
        &self.recorder
    }

    pub fn into_recorder(self) -> MatchRecorder<Duel> {
        self.recorder
    }

    fn broadcast(&mut self) {
        let state = self.recorder.state().clone();
        self.clients.retain(|client| {
            client
                .send(ServerMessage::State {
                    state: state.clone(),
                })
                .is_ok()
        });
    }
}
