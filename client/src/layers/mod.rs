//! Layer lifecycle utility shared by every overlay
//!
//! Idempotent creation of a source plus its stacked layers, request
//! cancellation, trailing debounce, visibility toggling and pointer handler
//! installation with guaranteed teardown.

pub mod debounce;
pub mod fetch;
pub mod handlers;
pub mod http;
pub mod lifecycle;

pub use debounce::Debouncer;
pub use fetch::{FetchOutcome, FetchReply, FetchRequest, FetchSlot, FetchToken, Fetcher};
pub use handlers::{Binding, CallbackCell, HandlerGuard, HandlerSet, install_handlers};
pub use http::HttpFetcher;
pub use lifecycle::{
    LayerSetSpec, LayerSetStatus, ensure_layer_set, remove_layer_set, set_visibility,
};
