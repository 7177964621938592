//! Background asset loading.
//!
//! Every request runs on its own worker thread and reports back over a
//! channel. Nothing touches the scene from a worker: the viewer drains
//! finished loads at the start of a tick. Each request kind carries a
//! generation counter, and a finished load is only accepted if no newer
//! request of the same kind was made in the meantime.

use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};
use log::{debug, info, warn};

use crate::error::{Error, Result};
use crate::glb;
use crate::hdr::HdrImage;
use crate::model::Model;

pub trait AssetSource: Send + Sync + 'static {
    fn load_model(&self, path: &Path) -> Result<Model>;
    fn load_environment(&self, path: &Path) -> Result<HdrImage>;
}

/// Reads GLB models and EXR environments from disk.
pub struct FsSource;

impl AssetSource for FsSource {
    fn load_model(&self, path: &Path) -> Result<Model> {
        glb::read_model(path)
    }

    fn load_environment(&self, path: &Path) -> Result<HdrImage> {
        HdrImage::load(path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Model,
    Environment,
}

pub enum Asset {
    Model(Model),
    Environment(HdrImage),
}

/// A finished load that is still the newest of its kind.
pub struct Loaded {
    pub path: PathBuf,
    pub generation: u64,
    pub asset: Asset,
}

struct Completion {
    kind: AssetKind,
    generation: u64,
    path: PathBuf,
    result: Result<Asset>,
}

pub struct AssetLoader {
    source: Arc<dyn AssetSource>,
    sender: Sender<Completion>,
    receiver: Receiver<Completion>,
    model_generation: u64,
    environment_generation: u64,
    in_flight: usize,
}

impl AssetLoader {
    pub fn new(source: Arc<dyn AssetSource>) -> Self {
        let (sender, receiver) = channel::unbounded();
        Self {
            source,
            sender,
            receiver,
            model_generation: 0,
            environment_generation: 0,
            in_flight: 0,
        }
    }

    /// Starts loading `path` and returns the generation of the request.
    /// Any older request of the same kind becomes stale.
    pub fn request(&mut self, kind: AssetKind, path: impl Into<PathBuf>) -> u64 {
        let path = path.into();
        let generation = {
            let counter = self.generation_mut(kind);
            *counter += 1;
            *counter
        };

        let source = Arc::clone(&self.source);
        let sender = self.sender.clone();
        let worker_path = path.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("load-{:?}-{}", kind, generation).to_lowercase())
            .spawn(move || {
                let start = std::time::Instant::now();
                // a panicking source still has to report back, or the load never leaves flight
                let result = panic::catch_unwind(AssertUnwindSafe(|| match kind {
                    AssetKind::Model => source.load_model(&worker_path).map(Asset::Model),
                    AssetKind::Environment => {
                        source.load_environment(&worker_path).map(Asset::Environment)
                    }
                }))
                .unwrap_or_else(|_| Err(Error::LoadPanicked(worker_path.clone())));
                debug!("{} finished in {:?}", worker_path.display(), start.elapsed());
                // the loader may be gone by now
                let _ = sender.send(Completion {
                    kind,
                    generation,
                    path: worker_path,
                    result,
                });
            });

        match spawned {
            Ok(_) => {
                info!("loading {} ({:?} #{})", path.display(), kind, generation);
                self.in_flight += 1;
            }
            Err(e) => warn!("could not start loading {}: {}", path.display(), e),
        }
        generation
    }

    /// Finished loads, without blocking. Stale and failed loads are dropped here.
    pub fn poll(&mut self) -> Vec<Loaded> {
        let completions: Vec<Completion> = self.receiver.try_iter().collect();
        completions
            .into_iter()
            .filter_map(|c| self.accept(c))
            .collect()
    }

    /// Like [`AssetLoader::poll`] but waits up to `timeout` for the first completion.
    pub fn wait(&mut self, timeout: Duration) -> Vec<Loaded> {
        if self.in_flight == 0 {
            return Vec::new();
        }
        let mut completions = Vec::new();
        if let Ok(first) = self.receiver.recv_timeout(timeout) {
            completions.push(first);
            completions.extend(self.receiver.try_iter());
        }
        completions
            .into_iter()
            .filter_map(|c| self.accept(c))
            .collect()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn latest(&self, kind: AssetKind) -> u64 {
        match kind {
            AssetKind::Model => self.model_generation,
            AssetKind::Environment => self.environment_generation,
        }
    }

    fn generation_mut(&mut self, kind: AssetKind) -> &mut u64 {
        match kind {
            AssetKind::Model => &mut self.model_generation,
            AssetKind::Environment => &mut self.environment_generation,
        }
    }

    fn accept(&mut self, completion: Completion) -> Option<Loaded> {
        self.in_flight = self.in_flight.saturating_sub(1);
        let Completion {
            kind,
            generation,
            path,
            result,
        } = completion;

        if generation != self.latest(kind) {
            debug!(
                "discarding stale {:?} load of {} (#{} < #{})",
                kind,
                path.display(),
                generation,
                self.latest(kind)
            );
            return None;
        }
        match result {
            Ok(asset) => Some(Loaded {
                path,
                generation,
                asset,
            }),
            Err(e) => {
                warn!("{}", e);
                None
            }
        }
    }
}
