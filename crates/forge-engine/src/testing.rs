//! Scripted provisioner for engine tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use forge_graph::ResourceId;

use crate::error::ProvisionError;
use crate::local::LocalProvisioner;
use crate::provisioner::{Attributes, ProvisionFuture, ProvisionRequest, Provisioner};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Event {
    Started(ResourceId),
    Ready(ResourceId),
    Deleted(ResourceId),
    Snapshot(ResourceId),
}

/// Wraps [`LocalProvisioner`], failing or stalling chosen resources and
/// recording every call.
pub(crate) struct ScriptedProvisioner {
    inner: LocalProvisioner,
    fail_create: BTreeSet<ResourceId>,
    fail_delete: BTreeSet<ResourceId>,
    slow_ready: BTreeMap<ResourceId, Duration>,
    delay: Duration,
    events: Mutex<Vec<Event>>,
    inputs: Mutex<BTreeMap<ResourceId, BTreeMap<String, String>>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedProvisioner {
    pub(crate) fn new() -> Self {
        Self {
            inner: LocalProvisioner::new("us-east-1", "123456789012"),
            fail_create: BTreeSet::new(),
            fail_delete: BTreeSet::new(),
            slow_ready: BTreeMap::new(),
            delay: Duration::ZERO,
            events: Mutex::new(Vec::new()),
            inputs: Mutex::new(BTreeMap::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub(crate) fn failing_create(mut self, id: &str) -> Self {
        self.fail_create.insert(ResourceId::parse(id).unwrap());
        self
    }

    pub(crate) fn failing_delete(mut self, id: &str) -> Self {
        self.fail_delete.insert(ResourceId::parse(id).unwrap());
        self
    }

    pub(crate) fn slow_ready(mut self, id: &str, delay: Duration) -> Self {
        self.slow_ready.insert(ResourceId::parse(id).unwrap(), delay);
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub(crate) fn inputs_of(&self, id: &ResourceId) -> Option<BTreeMap<String, String>> {
        self.inputs.lock().unwrap().get(id).cloned()
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }

    async fn provision(
        &self,
        request: &ProvisionRequest,
        current: Option<&Attributes>,
    ) -> Result<Attributes, ProvisionError> {
        self.push(Event::Started(request.id.clone()));
        self.inputs
            .lock()
            .unwrap()
            .insert(request.id.clone(), request.inputs.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let result = if self.fail_create.contains(&request.id) {
            Err(ProvisionError::Failed(format!("injected failure for {}", request.id)))
        } else {
            match current {
                Some(current) => self.inner.update(request, current).await,
                None => self.inner.create(request).await,
            }
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

impl Provisioner for ScriptedProvisioner {
    fn create<'a>(&'a self, request: &'a ProvisionRequest) -> ProvisionFuture<'a, Attributes> {
        Box::pin(self.provision(request, None))
    }

    fn update<'a>(
        &'a self,
        request: &'a ProvisionRequest,
        current: &'a Attributes,
    ) -> ProvisionFuture<'a, Attributes> {
        Box::pin(self.provision(request, Some(current)))
    }

    fn delete<'a>(&'a self, id: &'a ResourceId, _current: &'a Attributes) -> ProvisionFuture<'a, ()> {
        Box::pin(async move {
            if self.fail_delete.contains(id) {
                return Err(ProvisionError::Failed(format!("injected delete failure for {id}")));
            }
            self.push(Event::Deleted(id.clone()));
            Ok(())
        })
    }

    fn wait_ready<'a>(
        &'a self,
        id: &'a ResourceId,
        _attributes: &'a Attributes,
    ) -> ProvisionFuture<'a, ()> {
        Box::pin(async move {
            if let Some(delay) = self.slow_ready.get(id) {
                tokio::time::sleep(*delay).await;
            }
            self.push(Event::Ready(id.clone()));
            Ok(())
        })
    }

    fn snapshot<'a>(&'a self, id: &'a ResourceId, current: &'a Attributes) -> ProvisionFuture<'a, String> {
        Box::pin(async move {
            self.push(Event::Snapshot(id.clone()));
            self.inner.snapshot(id, current).await
        })
    }
}
