//! Scripted event source for connector and service tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream;
use inboxlink_core::{ByteStream, EventSourceClient, UpstreamError};

/// What the next `open` call does.
pub enum Script {
    /// Fail before any body is returned.
    Fail(UpstreamError),
    /// Return these chunks, then end the stream.
    Stream(Vec<&'static str>),
    /// Return these chunks, then stay open forever.
    StreamThenHold(Vec<&'static str>),
    /// Never resolve.
    Pending,
}

/// Replays scripts in order; once exhausted every open never resolves.
#[derive(Default)]
pub struct ScriptedSource {
    scripts: Mutex<VecDeque<Script>>,
    opened: Mutex<Vec<String>>,
}

impl ScriptedSource {
    pub fn new(scripts: impl IntoIterator<Item = Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into_iter().collect()),
            opened: Mutex::new(Vec::new()),
        }
    }

    /// URLs passed to `open`, in call order.
    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

fn chunk_stream(chunks: Vec<&'static str>) -> impl futures_util::Stream<Item = Result<Bytes, UpstreamError>> {
    stream::iter(chunks.into_iter().map(|c| Ok(Bytes::from_static(c.as_bytes()))))
}

#[async_trait]
impl EventSourceClient for ScriptedSource {
    async fn open(&self, url: &str) -> Result<ByteStream, UpstreamError> {
        self.opened.lock().unwrap().push(url.to_string());
        let script = self.scripts.lock().unwrap().pop_front();

        match script {
            Some(Script::Fail(err)) => Err(err),
            Some(Script::Stream(chunks)) => Ok(chunk_stream(chunks).boxed()),
            Some(Script::StreamThenHold(chunks)) => {
                Ok(chunk_stream(chunks).chain(stream::pending()).boxed())
            }
            Some(Script::Pending) | None => std::future::pending().await,
        }
    }
}
