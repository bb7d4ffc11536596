//! Cancellable data requests with last-issued-wins delivery
//!
//! Each overlay owns one [`FetchSlot`]. Starting a fetch aborts the previous
//! token before the new request goes out, and results are tagged with the
//! token they belong to so a late answer for a superseded token is dropped
//! instead of being applied.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use log::debug;
use url::Url;

use crate::geojson::FeatureCollection;

/// One in-flight request
#[derive(Clone, Debug)]
pub struct FetchToken {
    id: u64,
    aborted: Arc<AtomicBool>,
    #[cfg(target_arch = "wasm32")]
    controller: std::rc::Rc<std::cell::RefCell<Option<web_sys::AbortController>>>,
}

impl FetchToken {
    fn new(id: u64) -> Self {
        Self {
            id,
            aborted: Arc::new(AtomicBool::new(false)),
            #[cfg(target_arch = "wasm32")]
            controller: Default::default(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
        #[cfg(target_arch = "wasm32")]
        if let Some(controller) = self.controller.borrow().as_ref() {
            controller.abort();
        }
    }

    /// Checked by fetchers before and after the network round trip
    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    /// Tie a browser abort controller to this token
    #[cfg(target_arch = "wasm32")]
    pub fn attach_controller(&self, controller: web_sys::AbortController) {
        if self.is_aborted() {
            controller.abort();
        }
        *self.controller.borrow_mut() = Some(controller);
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FetchRequest {
    pub overlay: &'static str,
    pub url: Url,
}

#[derive(Debug)]
pub enum FetchOutcome {
    Loaded(FeatureCollection),
    /// Network, status or decoding failure
    Failed(String),
    /// Cancelled before it completed; never logged above debug
    Aborted,
}

struct FetchResult {
    token_id: u64,
    outcome: FetchOutcome,
}

/// Where a fetcher delivers the outcome for one token
pub struct FetchReply {
    token_id: u64,
    tx: Sender<FetchResult>,
}

impl FetchReply {
    pub fn send(self, outcome: FetchOutcome) {
        // The slot is gone once its overlay is torn down
        let _ = self.tx.send(FetchResult {
            token_id: self.token_id,
            outcome,
        });
    }
}

/// Performs requests on behalf of overlays. Implementations deliver exactly
/// one outcome per request through `reply`, possibly much later.
pub trait Fetcher {
    fn fetch(&self, request: FetchRequest, token: FetchToken, reply: FetchReply);
}

/// Holds the single "current" token for one layer set
pub struct FetchSlot {
    owner: &'static str,
    next_id: u64,
    current: Option<FetchToken>,
    tx: Sender<FetchResult>,
    rx: Receiver<FetchResult>,
}

impl FetchSlot {
    pub fn new(owner: &'static str) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            owner,
            next_id: 0,
            current: None,
            tx,
            rx,
        }
    }

    /// Cancel whatever is outstanding, then hand a fresh token to `issue`
    pub fn start(&mut self, issue: impl FnOnce(FetchToken, FetchReply)) -> u64 {
        self.cancel();

        self.next_id += 1;
        let token = FetchToken::new(self.next_id);
        let reply = FetchReply {
            token_id: token.id,
            tx: self.tx.clone(),
        };
        self.current = Some(token.clone());
        issue(token, reply);
        self.next_id
    }

    pub fn cancel(&mut self) {
        if let Some(token) = self.current.take() {
            token.abort();
            debug!("{}: cancelled fetch {}", self.owner, token.id);
        }
    }

    pub fn is_outstanding(&self) -> bool {
        self.current.is_some()
    }

    /// Outcome of the current token if it has arrived. Results belonging to
    /// superseded or aborted tokens are drained and discarded.
    pub fn poll(&mut self) -> Option<FetchOutcome> {
        loop {
            let result = match self.rx.try_recv() {
                Ok(result) => result,
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return None,
            };

            let is_current = self
                .current
                .as_ref()
                .is_some_and(|token| token.id == result.token_id && !token.is_aborted());

            if is_current {
                self.current = None;
                return Some(result.outcome);
            }
            debug!("{}: discarding response for superseded fetch {}", self.owner, result.token_id);
        }
    }
}
