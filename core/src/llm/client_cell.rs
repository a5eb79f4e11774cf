//! Single-flight lazy client acquisition.
//!
//! A `ClientCell` is either empty, holding an in-flight initialization, or
//! holding a ready client. The first caller to find it empty stores the
//! initialization future itself in the cell; every concurrent caller clones
//! and awaits that same future. A failed initialization empties the cell so
//! a later call can retry. The mutex only guards the slot swap and is never
//! held across an await.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, warn};

use super::error::ProviderError;

type InitFuture<C> = Shared<BoxFuture<'static, Result<Arc<C>, ProviderError>>>;

enum Slot<C> {
    Empty,
    Pending(InitFuture<C>),
    Ready(Arc<C>),
}

pub struct ClientCell<C> {
    slot: Mutex<Slot<C>>,
    init_attempts: AtomicU64,
}

impl<C> Default for ClientCell<C> {
    fn default() -> Self {
        Self {
            slot: Mutex::new(Slot::Empty),
            init_attempts: AtomicU64::new(0),
        }
    }
}

impl<C> ClientCell<C>
where
    C: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the ready client, join the in-flight initialization, or start one
    pub async fn get_or_init<F, Fut>(&self, init: F) -> Result<Arc<C>, ProviderError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<C, ProviderError>> + Send + 'static,
    {
        let pending = {
            let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
            match &*slot {
                Slot::Ready(client) => return Ok(Arc::clone(client)),
                Slot::Pending(fut) => fut.clone(),
                Slot::Empty => {
                    self.init_attempts.fetch_add(1, Ordering::SeqCst);
                    let fut: InitFuture<C> = init().map(|res| res.map(Arc::new)).boxed().shared();
                    *slot = Slot::Pending(fut.clone());
                    fut
                }
            }
        };

        let result = pending.clone().await;

        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        // Only the waiter that still sees its own future settles the slot
        let settles = matches!(&*slot, Slot::Pending(current) if current.ptr_eq(&pending));
        if settles {
            match &result {
                Ok(client) => *slot = Slot::Ready(Arc::clone(client)),
                Err(e) => {
                    warn!(target: "client_cell", error = %e, "Client initialization failed; slot cleared");
                    *slot = Slot::Empty;
                }
            }
        }
        result
    }

    /// Ready client, if initialization already completed
    pub fn get(&self) -> Option<Arc<C>> {
        match &*self.slot.lock().unwrap_or_else(PoisonError::into_inner) {
            Slot::Ready(client) => Some(Arc::clone(client)),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(
            &*self.slot.lock().unwrap_or_else(PoisonError::into_inner),
            Slot::Pending(_)
        )
    }

    /// Drop a ready client so the next call initializes a fresh one
    pub fn reset(&self) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if matches!(&*slot, Slot::Ready(_)) {
            *slot = Slot::Empty;
        }
    }

    /// Number of initializations started so far
    pub fn init_attempts(&self) -> u64 {
        self.init_attempts.load(Ordering::SeqCst)
    }
}

/// One client cell per provider id
pub struct ClientRegistry<C> {
    cells: DashMap<String, Arc<ClientCell<C>>>,
}

impl<C> Default for ClientRegistry<C> {
    fn default() -> Self {
        Self {
            cells: DashMap::new(),
        }
    }
}

impl<C> ClientRegistry<C>
where
    C: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cell(&self, provider: &str) -> Arc<ClientCell<C>> {
        self.cells
            .entry(provider.to_string())
            .or_insert_with(|| Arc::new(ClientCell::new()))
            .clone()
    }

    pub async fn acquire<F, Fut>(&self, provider: &str, init: F) -> Result<Arc<C>, ProviderError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<C, ProviderError>> + Send + 'static,
    {
        let cell = self.cell(provider);
        if cell.get().is_none() {
            debug!(target: "client_cell", provider = %provider, "Acquiring client");
        }
        cell.get_or_init(init).await
    }

    pub fn invalidate(&self, provider: &str) {
        if let Some(cell) = self.cells.get(provider) {
            cell.reset();
        }
    }
}
