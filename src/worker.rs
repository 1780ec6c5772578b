//! Singularity worker pool
//!
//! Frontier expansion for singularity sets runs on a small pool of threads.
//! Requests and responses travel over crossbeam channels; each request is
//! independent, so workers share nothing but the channels, a table of
//! cancellation flags, and counters.

use crate::error::{BilliardError, Result};
use crate::geometry::Segment;
use crate::outer::OuterBilliard;
use crate::settings::{BilliardSettings, Duality, Plane, TableSpec};
use crate::Point;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Points reported per preimage segment.
const SAMPLES_PER_SEGMENT: usize = 8;

fn default_affine_horizon() -> f64 {
    1000.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingularityRequest {
    pub id: u64,
    pub table: TableSpec,
    #[serde(default)]
    pub plane: Plane,
    #[serde(default = "default_affine_horizon")]
    pub affine_horizon: f64,
    /// Segments to pull back; empty means start from the singular rays.
    #[serde(default)]
    pub frontier: Vec<Segment>,
    pub iterations: usize,
}

/// Progress for one request. Every response carries all points found so
/// far; the last one for a request has `still_working` unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingularityResponse {
    pub id: u64,
    pub singularities: Vec<Point>,
    pub still_working: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Counters shared by every worker thread
#[derive(Debug, Default)]
pub struct WorkerStats {
    submitted: AtomicU64,
    completed: AtomicU64,
    cancelled: AtomicU64,
    failed: AtomicU64,
}

impl WorkerStats {
    pub fn snapshot(&self) -> WorkerStatsSnapshot {
        WorkerStatsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorkerStatsSnapshot {
    pub submitted: u64,
    pub completed: u64,
    pub cancelled: u64,
    pub failed: u64,
}

impl WorkerStatsSnapshot {
    pub fn in_flight(&self) -> u64 {
        self.submitted
            .saturating_sub(self.completed + self.cancelled + self.failed)
    }
}

/// Run one request to completion, reporting progress through `emit`.
///
/// `cancel` is checked before every iteration; a cancelled request still
/// gets a final response with whatever was found.
pub fn process_request(
    request: &SingularityRequest,
    cancel: &AtomicBool,
    mut emit: impl FnMut(SingularityResponse),
) -> Result<()> {
    let table = request.table.build()?;
    let billiard = OuterBilliard::new(table, request.plane, request.affine_horizon)?;
    let mut frontier = if request.frontier.is_empty() {
        billiard.singular_rays()?
    } else {
        request.frontier.clone()
    };

    let mut singularities: Vec<Point> = Vec::new();
    for i in 0..request.iterations {
        if cancel.load(Ordering::Relaxed) {
            debug!(id = request.id, completed = i, "singularity request cancelled");
            break;
        }
        frontier = billiard.preimage_step(&frontier);
        singularities.extend(frontier.iter().flat_map(|s| s.sample(SAMPLES_PER_SEGMENT)));
        if i + 1 < request.iterations && !frontier.is_empty() {
            emit(SingularityResponse {
                id: request.id,
                singularities: singularities.clone(),
                still_working: true,
                error: None,
            });
        }
        if frontier.is_empty() {
            break;
        }
    }
    emit(SingularityResponse {
        id: request.id,
        singularities,
        still_working: false,
        error: None,
    });
    Ok(())
}

pub struct SingularityWorker {
    requests: Option<Sender<SingularityRequest>>,
    responses: Receiver<SingularityResponse>,
    flags: Arc<DashMap<u64, Arc<AtomicBool>>>,
    stats: Arc<WorkerStats>,
    handles: Vec<JoinHandle<()>>,
}

impl SingularityWorker {
    /// Start `threads` workers (at least one).
    pub fn spawn(threads: usize) -> Self {
        let (request_tx, request_rx) = channel::unbounded::<SingularityRequest>();
        let (response_tx, response_rx) = channel::unbounded();
        let flags: Arc<DashMap<u64, Arc<AtomicBool>>> = Arc::new(DashMap::new());
        let stats = Arc::new(WorkerStats::default());

        let handles = (0..threads.max(1))
            .map(|worker| {
                let requests = request_rx.clone();
                let responses: Sender<SingularityResponse> = response_tx.clone();
                let flags = flags.clone();
                let stats = stats.clone();
                std::thread::spawn(move || {
                    while let Ok(request) = requests.recv() {
                        let cancel = flags
                            .get(&request.id)
                            .map(|f| f.value().clone())
                            .unwrap_or_else(|| Arc::new(AtomicBool::new(false)));
                        debug!(worker, id = request.id, "singularity request started");
                        // The id is released before its final response goes out.
                        let outcome = process_request(&request, &cancel, |response| {
                            if !response.still_working {
                                flags.remove(&request.id);
                            }
                            let _ = responses.send(response);
                        });
                        match outcome {
                            Ok(()) if cancel.load(Ordering::Relaxed) => {
                                stats.cancelled.fetch_add(1, Ordering::Relaxed);
                            }
                            Ok(()) => {
                                stats.completed.fetch_add(1, Ordering::Relaxed);
                            }
                            Err(e) => {
                                warn!(
                                    worker,
                                    id = request.id,
                                    error = %e,
                                    "singularity request failed"
                                );
                                stats.failed.fetch_add(1, Ordering::Relaxed);
                                flags.remove(&request.id);
                                let _ = responses.send(SingularityResponse {
                                    id: request.id,
                                    singularities: Vec::new(),
                                    still_working: false,
                                    error: Some(e.to_string()),
                                });
                            }
                        }
                    }
                    debug!(worker, "singularity worker exiting");
                })
            })
            .collect();

        info!(threads = threads.max(1), "singularity worker pool started");
        Self {
            requests: Some(request_tx),
            responses: response_rx,
            flags,
            stats,
            handles,
        }
    }

    /// Queue a request. Its id must not belong to a request that has not
    /// yet sent its final response.
    pub fn submit(&self, request: SingularityRequest) -> Result<()> {
        let sender = self.requests.as_ref().ok_or(BilliardError::WorkerClosed)?;
        match self.flags.entry(request.id) {
            Entry::Occupied(_) => return Err(BilliardError::DuplicateRequest(request.id)),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(AtomicBool::new(false)));
            }
        }
        let id = request.id;
        if sender.send(request).is_err() {
            self.flags.remove(&id);
            return Err(BilliardError::WorkerClosed);
        }
        self.stats.submitted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Submit preimage expansion for the outer billiard `settings` describe.
    pub fn submit_for(
        &self,
        id: u64,
        settings: &BilliardSettings,
        iterations: usize,
    ) -> Result<()> {
        settings.validate()?;
        if settings.duality != Duality::Outer {
            return Err(BilliardError::UnsupportedConfiguration(
                "singularities need an outer billiard".into(),
            ));
        }
        self.submit(SingularityRequest {
            id,
            table: settings.table.clone(),
            plane: settings.plane,
            affine_horizon: settings.affine_horizon,
            frontier: Vec::new(),
            iterations,
        })
    }

    /// Ask a request to stop at its next iteration. Returns false when the
    /// request is unknown or already finished.
    pub fn cancel(&self, id: u64) -> bool {
        match self.flags.get(&id) {
            Some(flag) => {
                flag.store(true, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) {
        for entry in self.flags.iter() {
            entry.value().store(true, Ordering::Relaxed);
        }
    }

    pub fn responses(&self) -> &Receiver<SingularityResponse> {
        &self.responses
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<SingularityResponse> {
        match self.responses.recv_timeout(timeout) {
            Ok(response) => Some(response),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn stats(&self) -> WorkerStatsSnapshot {
        self.stats.snapshot()
    }

    /// Stop accepting work, cancel what is running, and join every thread.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.requests.take();
        self.cancel_all();
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                warn!("singularity worker panicked");
            }
        }
        info!("singularity worker pool stopped");
    }
}

impl Drop for SingularityWorker {
    fn drop(&mut self) {
        if !self.handles.is_empty() {
            self.stop();
        }
    }
}
