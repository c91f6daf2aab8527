use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use thiserror::Error as ThisError;
use tokio::select;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use crate::commands::executable::Executable;
use crate::commands::{error_reply, Command};
use crate::frame::Frame;
use crate::store::Store;

pub type SessionId = Uuid;

/// Server-side record of one live client connection.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub client_address: SocketAddr,
    connected_at: Instant,
}

impl Session {
    pub fn new(id: SessionId, client_address: SocketAddr) -> Session {
        Session {
            id,
            client_address,
            connected_at: Instant::now(),
        }
    }
}

/// Everything the coordinator reacts to, other than the shutdown signal.
#[derive(Debug)]
pub enum Event {
    Connect(Session),
    Disconnect(SessionId),
    Command {
        session: SessionId,
        command: Command,
        reply: oneshot::Sender<Frame>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Running,
    /// Shutdown was signaled: no new events are accepted, queued ones are still processed.
    Draining,
    Stopped,
}

#[derive(Debug, ThisError, PartialEq)]
pub enum SubmitError {
    #[error("coordinator is not accepting events")]
    Stopped,
    #[error("coordinator dropped the reply")]
    ReplyDropped,
}

/// The single owner of the store and of the session registry.
///
/// Every command from every connection is applied by [`Coordinator::run_until`], one at a
/// time, in the order the events are received. Neither the store nor the registry is ever
/// reachable from another task, so neither needs a lock.
pub struct Coordinator {
    store: Store,
    sessions: HashMap<SessionId, Session>,
    events: mpsc::Receiver<Event>,
    state: State,
}

/// Cloneable entry point used by connection handlers to reach the coordinator.
#[derive(Clone)]
pub struct CoordinatorHandle {
    events: mpsc::Sender<Event>,
}

impl Coordinator {
    pub fn new(store: Store, channel_capacity: usize) -> (Coordinator, CoordinatorHandle) {
        let (tx, rx) = mpsc::channel(channel_capacity);

        let coordinator = Coordinator {
            store,
            sessions: HashMap::new(),
            events: rx,
            state: State::Running,
        };

        (coordinator, CoordinatorHandle { events: tx })
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Processes events until `shutdown` resolves or every handle is dropped, then drains the
    /// events already queued. Returns the stopped coordinator.
    pub async fn run_until<F>(mut self, shutdown: F) -> Self
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!("coordinator running");

        let shutdown_signaled = loop {
            select! {
                biased;
                _ = &mut shutdown => break true,
                event = self.events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break false,
                },
            }
        };

        if shutdown_signaled {
            self.drain().await;
        } else {
            info!("all event senders dropped, coordinator stopped");
            self.state = State::Stopped;
        }

        self
    }

    async fn drain(&mut self) {
        self.state = State::Draining;
        info!(sessions = self.sessions.len(), "coordinator draining");

        // Senders fail from now on; whatever is already buffered is still delivered.
        self.events.close();
        while let Some(event) = self.events.recv().await {
            self.handle_event(event);
        }

        self.state = State::Stopped;
        info!("coordinator stopped");
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Connect(session) => {
                info!(
                    session = %session.id,
                    client_address = %session.client_address,
                    sessions = self.sessions.len() + 1,
                    "session connected"
                );
                self.sessions.insert(session.id, session);
            }
            Event::Disconnect(id) => {
                if let Some(session) = self.sessions.remove(&id) {
                    info!(
                        session = %id,
                        client_address = %session.client_address,
                        duration = ?session.connected_at.elapsed(),
                        sessions = self.sessions.len(),
                        "session disconnected"
                    );
                }
            }
            Event::Command {
                session,
                command,
                reply,
            } => {
                let frame = self.dispatch(session, command);
                if reply.send(frame).is_err() {
                    debug!(%session, "connection went away before its reply was ready");
                }
            }
        }
    }

    fn dispatch(&mut self, session: SessionId, command: Command) -> Frame {
        let name = command.name();
        debug!(%session, command = name, "executing command");

        match command.exec(&mut self.store) {
            Ok(frame) => frame,
            Err(err) => {
                debug!(%session, command = name, error = %err, "command failed");
                error_reply(err)
            }
        }
    }
}

impl CoordinatorHandle {
    pub async fn connect(&self, session: Session) -> Result<(), SubmitError> {
        self.send(Event::Connect(session)).await
    }

    pub async fn disconnect(&self, id: SessionId) -> Result<(), SubmitError> {
        self.send(Event::Disconnect(id)).await
    }

    /// Queues `command` for execution and waits for its reply.
    pub async fn submit(&self, session: SessionId, command: Command) -> Result<Frame, SubmitError> {
        let (reply, rx) = oneshot::channel();

        self.send(Event::Command {
            session,
            command,
            reply,
        })
        .await?;

        rx.await.map_err(|_| SubmitError::ReplyDropped)
    }

    async fn send(&self, event: Event) -> Result<(), SubmitError> {
        self.events
            .send(event)
            .await
            .map_err(|_| SubmitError::Stopped)
    }
}
