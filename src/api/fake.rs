//! Scripted in-memory transport for tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use super::error::{ApiError, Result};
use super::transport::{Args, Transport};

#[derive(Debug, Clone)]
enum Reply {
    Value(Value),
    Fault(String),
}

#[derive(Debug, Default)]
struct State {
    replies: HashMap<&'static str, Reply>,
    calls: Vec<(&'static str, Args)>,
    last_response: Option<String>,
    unreachable: bool,
}

/// A transport answering each procedure with a canned reply and recording
/// every call. Clones share state, so a test can keep one handle while the
/// client owns another.
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeTransport {
    state: Arc<Mutex<State>>,
}

impl FakeTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Answer `procedure` with `value`.
    pub(crate) fn reply(self, procedure: &'static str, value: Value) -> Self {
        self.lock().replies.insert(procedure, Reply::Value(value));
        self
    }

    /// Answer `procedure` with a SOAP fault.
    pub(crate) fn fault(self, procedure: &'static str, message: &str) -> Self {
        self.lock()
            .replies
            .insert(procedure, Reply::Fault(message.to_string()));
        self
    }

    /// Make `validate` fail.
    pub(crate) fn unreachable(self) -> Self {
        self.lock().unreachable = true;
        self
    }

    /// Procedure names in call order.
    pub(crate) fn calls(&self) -> Vec<&'static str> {
        self.lock().calls.iter().map(|(name, _)| *name).collect()
    }

    /// Number of calls made to `procedure`.
    pub(crate) fn call_count(&self, procedure: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|(name, _)| *name == procedure)
            .count()
    }

    /// Arguments of the most recent call to `procedure`.
    pub(crate) fn last_args(&self, procedure: &str) -> Option<Args> {
        self.lock()
            .calls
            .iter()
            .rev()
            .find(|(name, _)| *name == procedure)
            .map(|(_, args)| args.clone())
    }

    /// Value of a named argument of the most recent call to `procedure`.
    pub(crate) fn arg(&self, procedure: &str, name: &str) -> Option<Value> {
        self.last_args(procedure)?
            .into_iter()
            .find(|(arg, _)| *arg == name)
            .map(|(_, value)| value)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn invoke(&self, procedure: &'static str, args: Args) -> Result<Value> {
        let mut state = self.lock();
        state.calls.push((procedure, args));

        match state.replies.get(procedure).cloned() {
            Some(Reply::Value(value)) => {
                state.last_response = Some(value.to_string());
                Ok(value)
            }
            Some(Reply::Fault(message)) => {
                state.last_response = Some(message.clone());
                Err(ApiError::fault("SOAP-ENV:Client", message))
            }
            None => Err(ApiError::fault(
                "SOAP-ENV:Client",
                format!("unscripted procedure {}", procedure),
            )),
        }
    }

    async fn validate(&self) -> Result<()> {
        if self.lock().unreachable {
            return Err(ApiError::Connectivity("fake transport unreachable".to_string()));
        }
        Ok(())
    }

    fn last_request(&self) -> Option<String> {
        self.lock().calls.last().map(|(name, _)| name.to_string())
    }

    fn last_response(&self) -> Option<String> {
        self.lock().last_response.clone()
    }
}
