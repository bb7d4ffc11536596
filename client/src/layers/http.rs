//! HTTP fetcher with platform-specific implementations

use log::debug;

use super::fetch::{FetchOutcome, FetchReply, FetchRequest, FetchToken, Fetcher};
use crate::config::MapConfig;
#[cfg(not(target_arch = "wasm32"))]
use crate::geojson::FeatureCollection;
use crate::geojson::parse_payload;

#[cfg(not(target_arch = "wasm32"))]
use std::sync::mpsc::{Receiver, Sender};
#[cfg(not(target_arch = "wasm32"))]
use std::sync::{Arc, Mutex};

#[cfg(not(target_arch = "wasm32"))]
struct Job {
    request: FetchRequest,
    token: FetchToken,
    reply: FetchReply,
}

/// Fetches overlay payloads from the backend.
///
/// Native builds run a small pool of blocking `reqwest` workers fed through a
/// channel; wasm builds use the browser `fetch` with one `AbortController`
/// per token.
pub struct HttpFetcher {
    #[cfg(not(target_arch = "wasm32"))]
    jobs: Sender<Job>,
    #[cfg(not(target_arch = "wasm32"))]
    _workers: Vec<std::thread::JoinHandle<()>>,
}

impl HttpFetcher {
    #[cfg(not(target_arch = "wasm32"))]
    pub fn new(config: &MapConfig) -> anyhow::Result<Self> {
        use anyhow::Context;

        let client = reqwest::blocking::Client::builder()
            .user_agent(&config.user_agent)
            .build()
            .context("building HTTP client")?;

        let (jobs, job_rx) = std::sync::mpsc::channel::<Job>();
        let job_rx = Arc::new(Mutex::new(job_rx));

        let mut workers = Vec::with_capacity(config.fetch_workers);
        for index in 0..config.fetch_workers {
            let client = client.clone();
            let job_rx = Arc::clone(&job_rx);
            let handle = std::thread::Builder::new()
                .name(format!("trapmap-fetch-{index}"))
                .spawn(move || Self::worker_thread(&job_rx, &client))
                .context("spawning fetch worker")?;
            workers.push(handle);
        }

        Ok(Self {
            jobs,
            _workers: workers,
        })
    }

    #[cfg(target_arch = "wasm32")]
    pub fn new(_config: &MapConfig) -> anyhow::Result<Self> {
        Ok(Self {})
    }

    // Native implementation
    #[cfg(not(target_arch = "wasm32"))]
    fn worker_thread(job_rx: &Mutex<Receiver<Job>>, client: &reqwest::blocking::Client) {
        loop {
            let job = {
                let Ok(rx) = job_rx.lock() else {
                    break;
                };
                match rx.recv() {
                    Ok(job) => job,
                    Err(_) => break, // Fetcher dropped, exit thread
                }
            };

            let Job { request, token, reply } = job;
            if token.is_aborted() {
                reply.send(FetchOutcome::Aborted);
                continue;
            }

            let result = Self::fetch_collection(client, &request);
            let outcome = match result {
                _ if token.is_aborted() => FetchOutcome::Aborted,
                Ok(data) => FetchOutcome::Loaded(data),
                Err(e) => FetchOutcome::Failed(format!("{e:#}")),
            };
            reply.send(outcome);
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn fetch_collection(
        client: &reqwest::blocking::Client,
        request: &FetchRequest,
    ) -> anyhow::Result<FeatureCollection> {
        use anyhow::Context;

        let response = client
            .get(request.url.clone())
            .send()
            .with_context(|| format!("GET {}", request.url))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("HTTP {status} from {}", request.url);
        }

        let bytes = response.bytes().context("reading response body")?;
        Ok(parse_payload(&bytes).context("decoding overlay payload")?)
    }

    // WASM implementation using web-sys fetch API
    #[cfg(target_arch = "wasm32")]
    fn spawn_wasm_fetch(&self, request: FetchRequest, token: FetchToken, reply: FetchReply) {
        use wasm_bindgen::JsCast;
        use wasm_bindgen_futures::JsFuture;
        use web_sys::{AbortController, Request, RequestInit, RequestMode, Response};

        let signal = match AbortController::new() {
            Ok(controller) => {
                let signal = controller.signal();
                token.attach_controller(controller);
                Some(signal)
            }
            Err(_) => None,
        };

        wasm_bindgen_futures::spawn_local(async move {
            let result = async {
                let opts = RequestInit::new();
                opts.set_method("GET");
                opts.set_mode(RequestMode::Cors);
                opts.set_signal(signal.as_ref());

                let web_request = Request::new_with_str_and_init(request.url.as_str(), &opts)
                    .map_err(|e| format!("Failed to create request: {:?}", e))?;

                let window = web_sys::window().ok_or("No window object")?;
                let resp_value = JsFuture::from(window.fetch_with_request(&web_request))
                    .await
                    .map_err(|e| format!("Fetch failed: {:?}", e))?;

                let resp: Response = resp_value
                    .dyn_into()
                    .map_err(|_| "Response is not a Response object")?;

                if !resp.ok() {
                    return Err(format!("HTTP {}", resp.status()));
                }

                let array_buffer = JsFuture::from(
                    resp.array_buffer()
                        .map_err(|e| format!("Failed to get array buffer: {:?}", e))?,
                )
                .await
                .map_err(|e| format!("Failed to read array buffer: {:?}", e))?;

                let bytes = js_sys::Uint8Array::new(&array_buffer).to_vec();
                parse_payload(&bytes).map_err(|e| e.to_string())
            }
            .await;

            let outcome = match result {
                _ if token.is_aborted() => FetchOutcome::Aborted,
                Ok(data) => FetchOutcome::Loaded(data),
                Err(err) => FetchOutcome::Failed(err),
            };
            reply.send(outcome);
        });
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, request: FetchRequest, token: FetchToken, reply: FetchReply) {
        debug!("{}: GET {}", request.overlay, request.url);

        #[cfg(not(target_arch = "wasm32"))]
        {
            let job = Job { request, token, reply };
            if let Err(std::sync::mpsc::SendError(job)) = self.jobs.send(job) {
                job.reply.send(FetchOutcome::Failed("fetch workers have stopped".to_string()));
            }
        }

        #[cfg(target_arch = "wasm32")]
        {
            self.spawn_wasm_fetch(request, token, reply);
        }
    }
}
