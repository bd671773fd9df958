//! Typed client API over the [`Dispatcher`].
//!
//! Every operation comes in three shapes:
//!
//! * blocking: `fetch(criteria)`,
//! * async: `fetch_async(criteria).await`,
//! * callback: `begin_fetch(criteria, on_complete)`, which runs on the rayon
//!   pool and hands the outcome to `on_complete` exactly once.

use std::fmt;
use std::marker::PhantomData;

use super::dispatcher::Dispatcher;
use super::operation::{Criteria, OperationKind};
use crate::error::{PortalError, Result};
use crate::graph::{Mobile, NodeRef};
use crate::visitor::MobileType;

/// Data portal for business type `T`.
pub struct DataPortal<T> {
    dispatcher: Dispatcher,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for DataPortal<T> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: self.dispatcher.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for DataPortal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataPortal")
            .field("type", &std::any::type_name::<T>())
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}

fn into_object<T: MobileType>(result: Option<NodeRef>) -> Result<Mobile<T>> {
    result
        .ok_or_else(|| PortalError::CorruptGraph(format!("no {} was returned", T::key())))?
        .expect_type::<T>("result")
}

impl<T: MobileType> DataPortal<T> {
    /// Creates a portal over `dispatcher`.
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            _marker: PhantomData,
        }
    }

    /// The underlying dispatcher.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    // --- Blocking ---

    /// Builds a new object.
    pub fn create(&self, criteria: Criteria) -> Result<Mobile<T>> {
        self.object_op(OperationKind::Create, Some(criteria), None)
    }

    /// Loads an existing object.
    pub fn fetch(&self, criteria: Criteria) -> Result<Mobile<T>> {
        self.object_op(OperationKind::Fetch, Some(criteria), None)
    }

    /// Persists `object` and returns the saved instance.
    pub fn update(&self, object: &Mobile<T>) -> Result<Mobile<T>> {
        self.object_op(OperationKind::Update, None, Some(object.to_node()))
    }

    /// Removes the object named by `criteria`.
    pub fn delete(&self, criteria: Criteria) -> Result<()> {
        self.dispatcher
            .dispatch(OperationKind::Delete, &T::key(), Some(criteria), None)
            .map(drop)
    }

    /// Runs a command object and returns it after execution.
    pub fn execute(&self, command: &Mobile<T>) -> Result<Mobile<T>> {
        self.object_op(OperationKind::Execute, None, Some(command.to_node()))
    }

    fn object_op(
        &self,
        operation: OperationKind,
        criteria: Option<Criteria>,
        object: Option<NodeRef>,
    ) -> Result<Mobile<T>> {
        self.dispatcher
            .dispatch(operation, &T::key(), criteria, object)
            .and_then(into_object)
    }

    // --- Async ---

    /// Async [`DataPortal::create`].
    pub async fn create_async(&self, criteria: Criteria) -> Result<Mobile<T>> {
        self.object_op_async(OperationKind::Create, Some(criteria), None)
            .await
    }

    /// Async [`DataPortal::fetch`].
    pub async fn fetch_async(&self, criteria: Criteria) -> Result<Mobile<T>> {
        self.object_op_async(OperationKind::Fetch, Some(criteria), None)
            .await
    }

    /// Async [`DataPortal::update`].
    pub async fn update_async(&self, object: &Mobile<T>) -> Result<Mobile<T>> {
        self.object_op_async(OperationKind::Update, None, Some(object.to_node()))
            .await
    }

    /// Async [`DataPortal::delete`].
    pub async fn delete_async(&self, criteria: Criteria) -> Result<()> {
        self.dispatcher
            .dispatch_async(OperationKind::Delete, &T::key(), Some(criteria), None)
            .await
            .map(drop)
    }

    /// Async [`DataPortal::execute`].
    pub async fn execute_async(&self, command: &Mobile<T>) -> Result<Mobile<T>> {
        self.object_op_async(OperationKind::Execute, None, Some(command.to_node()))
            .await
    }

    async fn object_op_async(
        &self,
        operation: OperationKind,
        criteria: Option<Criteria>,
        object: Option<NodeRef>,
    ) -> Result<Mobile<T>> {
        let type_key = T::key();
        self.dispatcher
            .dispatch_async(operation, &type_key, criteria, object)
            .await
            .and_then(into_object)
    }

    // --- Callback ---

    /// Callback [`DataPortal::create`].
    pub fn begin_create<F>(&self, criteria: Criteria, on_complete: F)
    where
        F: FnOnce(Result<Mobile<T>>) + Send + 'static,
    {
        self.spawn(OperationKind::Create, Some(criteria), None, move |r| {
            on_complete(r.and_then(into_object));
        });
    }

    /// Callback [`DataPortal::fetch`].
    pub fn begin_fetch<F>(&self, criteria: Criteria, on_complete: F)
    where
        F: FnOnce(Result<Mobile<T>>) + Send + 'static,
    {
        self.spawn(OperationKind::Fetch, Some(criteria), None, move |r| {
            on_complete(r.and_then(into_object));
        });
    }

    /// Callback [`DataPortal::update`].
    pub fn begin_update<F>(&self, object: &Mobile<T>, on_complete: F)
    where
        F: FnOnce(Result<Mobile<T>>) + Send + 'static,
    {
        self.spawn(OperationKind::Update, None, Some(object.to_node()), move |r| {
            on_complete(r.and_then(into_object));
        });
    }

    /// Callback [`DataPortal::delete`].
    pub fn begin_delete<F>(&self, criteria: Criteria, on_complete: F)
    where
        F: FnOnce(Result<()>) + Send + 'static,
    {
        self.spawn(OperationKind::Delete, Some(criteria), None, move |r| {
            on_complete(r.map(drop));
        });
    }

    /// Callback [`DataPortal::execute`].
    pub fn begin_execute<F>(&self, command: &Mobile<T>, on_complete: F)
    where
        F: FnOnce(Result<Mobile<T>>) + Send + 'static,
    {
        self.spawn(OperationKind::Execute, None, Some(command.to_node()), move |r| {
            on_complete(r.and_then(into_object));
        });
    }

    fn spawn<F>(
        &self,
        operation: OperationKind,
        criteria: Option<Criteria>,
        object: Option<NodeRef>,
        on_complete: F,
    ) where
        F: FnOnce(Result<Option<NodeRef>>) + Send + 'static,
    {
        // The context is captured here, on the caller's thread.
        let context = self.dispatcher.context().snapshot();
        let dispatcher = self.dispatcher.clone();
        rayon::spawn(move || {
            let outcome = dispatcher.dispatch_in(context, operation, &T::key(), criteria, object);
            on_complete(outcome);
        });
    }
}
