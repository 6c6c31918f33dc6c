//! Test helpers.
use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};

use tokio::sync::oneshot;

use crate::{
    transport::{Request, Target, Transport},
    Error, Result,
};

enum Reply {
    Now(Result<serde_json::Value>),
    Later(oneshot::Receiver<Result<serde_json::Value>>),
}

/// A [`Transport`] that replays scripted replies and records requests.
///
/// Replies are queued per target (a path such as `/offers` or an absolute URL) and consumed in
/// order. Requests without a scripted reply fail with `HTTP 404`.
#[derive(Default)]
pub(crate) struct MockTransport {
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    requests: Mutex<Vec<Request>>,
}

fn key(target: &Target) -> String {
    match target {
        Target::Path(path) => (*path).to_owned(),
        Target::Url(url) => url.to_string(),
    }
}

impl MockTransport {
    pub fn new() -> Arc<MockTransport> {
        Arc::new(MockTransport::default())
    }

    fn push(&self, target: &str, reply: Reply) {
        self.replies
            .lock()
            .unwrap()
            .entry(target.to_owned())
            .or_default()
            .push_back(reply);
    }

    pub fn reply(&self, target: &str, body: serde_json::Value) {
        self.push(target, Reply::Now(Ok(body)));
    }

    pub fn fail(&self, target: &str, error: Error) {
        self.push(target, Reply::Now(Err(error)));
    }

    /// Queue a reply that is held back until the returned sender fires.
    pub fn reply_later(&self, target: &str) -> oneshot::Sender<Result<serde_json::Value>> {
        let (sender, receiver) = oneshot::channel();
        self.push(target, Reply::Later(receiver));
        sender
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, target: &str) -> Vec<Request> {
        self.requests()
            .into_iter()
            .filter(|request| key(&request.target) == target)
            .collect()
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: Request) -> Result<serde_json::Value> {
        let target = key(&request.target);
        self.requests.lock().unwrap().push(request);

        let reply = self
            .replies
            .lock()
            .unwrap()
            .get_mut(&target)
            .and_then(VecDeque::pop_front);

        match reply {
            Some(Reply::Now(result)) => result,
            Some(Reply::Later(receiver)) => receiver.await.unwrap_or(Err(Error::HttpStatus(504))),
            None => Err(Error::HttpStatus(404)),
        }
    }
}

/// Let spawned tasks run until they block.
pub(crate) async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}
