use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::soap::{Fault, Param, RpcChannel};

/// A channel that replays canned answers in order and records every call.
#[derive(Default)]
pub(crate) struct ScriptedChannel {
    script: Mutex<VecDeque<(String, Result<Value, Fault>)>>,
    calls: Mutex<Vec<(String, Vec<Param>)>>,
}

impl ScriptedChannel {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(self, operation: &str, answer: Result<Value, Fault>) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back((operation.to_string(), answer));
        self
    }

    pub(crate) fn calls(&self) -> Vec<(String, Vec<Param>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RpcChannel for ScriptedChannel {
    async fn call(&self, operation: &str, params: &[Param]) -> Result<Value, Fault> {
        self.calls
            .lock()
            .unwrap()
            .push((operation.to_string(), params.to_vec()));

        let (expected, answer) = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected call to {operation}"));
        assert_eq!(expected, operation, "calls arrived out of order");
        answer
    }
}

/// Captures formatted log output, at every level, for the current thread.
#[derive(Clone, Default)]
pub(crate) struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl LogBuffer {
    pub(crate) fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub(crate) fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}
