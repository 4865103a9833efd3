//! The live index and its rebuild protocol.
//!
//! A [`Session`] owns the currently installed [`Index`] behind an
//! `Arc`. Queries take a snapshot with [`Session::current`] and run with
//! no further locking, so any number of them proceed in parallel and none
//! ever sees a half-built index.
//!
//! Rebuilds are serialized by a build gate: at most one build is in
//! flight. The new index is built without touching the installed one and
//! then swapped in with a single pointer store. A failed or cancelled
//! build leaves the previous index installed.

use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::chunk::{chunk_documents, ChunkParams};
use crate::error::{Error, Result};
use crate::index::{build_with_cancel, Index, IndexStrategy};
use crate::models::Document;

/// Proof that the holder is the only build in flight.
pub struct BuildPermit {
    _guard: OwnedMutexGuard<()>,
}

pub struct Session {
    chunk_params: ChunkParams,
    strategy: IndexStrategy,
    index: RwLock<Option<Arc<Index>>>,
    build_gate: Arc<Mutex<()>>,
}

impl Session {
    /// # Errors
    ///
    /// [`Error::Config`] when the chunk geometry is invalid.
    pub fn new(chunk_params: ChunkParams, strategy: IndexStrategy) -> Result<Self> {
        chunk_params.validate()?;
        Ok(Self {
            chunk_params,
            strategy,
            index: RwLock::new(None),
            build_gate: Arc::new(Mutex::new(())),
        })
    }

    pub fn chunk_params(&self) -> &ChunkParams {
        &self.chunk_params
    }

    pub fn strategy(&self) -> &IndexStrategy {
        &self.strategy
    }

    /// Snapshot of the installed index.
    ///
    /// # Errors
    ///
    /// [`Error::NotReady`] until the first build has been installed.
    pub fn current(&self) -> Result<Arc<Index>> {
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(Error::NotReady)
    }

    pub fn is_ready(&self) -> bool {
        self.current().is_ok()
    }

    /// Wait for any running build to finish, then claim the gate.
    pub async fn begin_build(&self) -> BuildPermit {
        BuildPermit {
            _guard: self.build_gate.clone().lock_owned().await,
        }
    }

    /// Claim the gate without waiting.
    ///
    /// # Errors
    ///
    /// [`Error::BuildInProgress`] when another build holds it.
    pub fn try_begin_build(&self) -> Result<BuildPermit> {
        self.build_gate
            .clone()
            .try_lock_owned()
            .map(|guard| BuildPermit { _guard: guard })
            .map_err(|_| Error::BuildInProgress)
    }

    /// Chunk `docs`, build an index and install it.
    ///
    /// The permit is held until the new index is installed (or the build
    /// fails), then released. Nothing is installed once `cancel` has fired,
    /// even if the build itself completed.
    pub async fn build_and_install(
        &self,
        permit: BuildPermit,
        docs: &[Document],
        cancel: &CancellationToken,
    ) -> Result<Arc<Index>> {
        let result = async {
            let chunks = chunk_documents(docs, &self.chunk_params)?;
            info!(
                documents = docs.len(),
                chunks = chunks.len(),
                "documents chunked"
            );
            build_with_cancel(&chunks, &self.strategy, cancel).await
        }
        .await;

        let index = match result {
            Ok(_) if cancel.is_cancelled() => {
                warn!(ready = self.is_ready(), "index build cancelled; keeping previous index");
                return Err(Error::Cancelled);
            }
            Ok(index) => Arc::new(index),
            Err(e) => {
                warn!(error = %e, ready = self.is_ready(), "index build failed; keeping previous index");
                return Err(e);
            }
        };

        self.install(index.clone());
        drop(permit);
        Ok(index)
    }

    /// Build and install, waiting for any running build first.
    pub async fn rebuild(
        &self,
        docs: &[Document],
        cancel: &CancellationToken,
    ) -> Result<Arc<Index>> {
        let permit = self.begin_build().await;
        self.build_and_install(permit, docs, cancel).await
    }

    /// Build and install, or fail with [`Error::BuildInProgress`] at once.
    pub async fn try_rebuild(
        &self,
        docs: &[Document],
        cancel: &CancellationToken,
    ) -> Result<Arc<Index>> {
        let permit = self.try_begin_build()?;
        self.build_and_install(permit, docs, cancel).await
    }

    fn install(&self, index: Arc<Index>) {
        let (mode, rows) = (index.mode(), index.len());
        *self.index.write().unwrap_or_else(PoisonError::into_inner) = Some(index);
        info!(mode = %mode, rows, "index installed");
    }

    /// Uninstall the index. Later queries get [`Error::NotReady`]; snapshots
    /// already handed out stay valid.
    pub fn teardown(&self) {
        self.index
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        info!("index torn down");
    }
}
