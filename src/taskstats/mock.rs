//! In-memory stand-ins for the netlink socket and the taskstats client.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::Mutex;

use super::{Request, Result, TaskCounters, TaskStatsSource};

/// Replays canned reply frames and records every frame sent.
#[derive(Debug, Default)]
pub struct MockTransport {
    replies: Mutex<VecDeque<io::Result<Vec<u8>>>>,
    sent: Mutex<Vec<Vec<u8>>>,
}

impl MockTransport {
    pub fn with_replies(replies: Vec<io::Result<Vec<u8>>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            sent: Mutex::default(),
        }
    }

    pub fn push_reply(&self, reply: io::Result<Vec<u8>>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }
}

impl super::Transport for MockTransport {
    fn send(&self, frame: &[u8]) -> io::Result<()> {
        self.sent.lock().unwrap().push(frame.to_vec());
        Ok(())
    }

    fn recv(&self) -> io::Result<Vec<u8>> {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(io::Error::from(io::ErrorKind::WouldBlock)))
    }
}

/// Answers task queries from a fixed table; unknown ids behave like exited tasks.
#[derive(Debug, Default)]
pub struct StaticSource {
    tasks: HashMap<u32, TaskCounters>,
    denied: bool,
    queried: Mutex<Vec<u32>>,
}

impl StaticSource {
    pub fn new(tasks: impl IntoIterator<Item = (u32, TaskCounters)>) -> Self {
        Self {
            tasks: tasks.into_iter().collect(),
            ..Default::default()
        }
    }

    /// A source that rejects every query for lack of privileges.
    pub fn denied() -> Self {
        Self {
            denied: true,
            ..Default::default()
        }
    }

    pub fn queried(&self) -> Vec<u32> {
        self.queried.lock().unwrap().clone()
    }
}

impl TaskStatsSource for StaticSource {
    fn build_request(&self, tid: u32) -> Request {
        Request::new(0x1c, tid)
    }

    fn query(&self, request: Request) -> Result<Option<TaskCounters>> {
        self.queried.lock().unwrap().push(request.tid());
        if self.denied {
            return Err(super::Error::NoEnoughPrivilege);
        }
        Ok(self.tasks.get(&request.tid()).cloned())
    }
}
