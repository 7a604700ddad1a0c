//! Tower surface over a single session.
//!
//! [`TurnService`] turns a user message into a [`TurnResult`]. Clones share
//! the session, and each call holds the session lock for the whole turn, so
//! turns of one conversation run one at a time in the order they were
//! submitted. Separate sessions are separate services and run independently.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::Mutex;
use tower::Service;
use tracing::debug;

use crate::error::{AgentsError, Result};
use crate::runner::{Runner, Session, TurnResult};

#[derive(Clone)]
pub struct TurnService {
    runner: Arc<Runner>,
    session: Arc<Mutex<Session>>,
}

impl TurnService {
    pub fn new(runner: Arc<Runner>, session: Session) -> Self {
        Self {
            runner,
            session: Arc::new(Mutex::new(session)),
        }
    }

    /// A service over a fresh session starting at triage.
    pub fn fresh(runner: Arc<Runner>) -> Self {
        Self::new(runner, Session::new())
    }

    /// Snapshot of the session between turns. Waits for an in-flight turn.
    pub async fn session(&self) -> Session {
        self.session.lock().await.clone()
    }
}

impl Service<String> for TurnService {
    type Response = TurnResult;
    type Error = AgentsError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, input: String) -> Self::Future {
        let runner = self.runner.clone();
        let session = self.session.clone();
        Box::pin(async move {
            let mut guard = session.lock().await;
            debug!(session = %guard.id, "Acquired session for turn");
            runner.run_turn(&mut guard, input).await
        })
    }
}
