//! Doubles shared by the unit tests

use std::cell::RefCell;

use crate::geojson::{Feature, FeatureCollection, LngLat};
use crate::layers::{FetchOutcome, FetchReply, FetchRequest, FetchToken, Fetcher};

pub(crate) const AUSTIN: LngLat = LngLat::new(-97.7431, 30.2672);

/// `n` point features east of [`AUSTIN`], the first one exactly on it
pub(crate) fn points(n: usize) -> FeatureCollection {
    FeatureCollection::new(
        (0..n)
            .map(|i| {
                let at = LngLat::new(AUSTIN.lng + i as f64 * 0.002, AUSTIN.lat);
                Feature::point(format!("f{i}"), at)
            })
            .collect(),
    )
}

struct Call {
    request: FetchRequest,
    token: FetchToken,
    reply: Option<FetchReply>,
}

/// Records every request and lets the test resolve them in any order
#[derive(Default)]
pub(crate) struct ScriptedFetcher {
    calls: RefCell<Vec<Call>>,
}

impl ScriptedFetcher {
    pub(crate) fn count(&self) -> usize {
        self.calls.borrow().len()
    }

    pub(crate) fn request(&self, index: usize) -> FetchRequest {
        self.calls.borrow()[index].request.clone()
    }

    pub(crate) fn is_aborted(&self, index: usize) -> bool {
        self.calls.borrow()[index].token.is_aborted()
    }

    pub(crate) fn resolve(&self, index: usize, outcome: FetchOutcome) {
        let reply = self.calls.borrow_mut()[index]
            .reply
            .take()
            .expect("request resolved twice");
        reply.send(outcome);
    }

    pub(crate) fn respond(&self, index: usize, features: usize) {
        self.resolve(index, FetchOutcome::Loaded(points(features)));
    }
}

impl Fetcher for ScriptedFetcher {
    fn fetch(&self, request: FetchRequest, token: FetchToken, reply: FetchReply) {
        self.calls.borrow_mut().push(Call {
            request,
            token,
            reply: Some(reply),
        });
    }
}
