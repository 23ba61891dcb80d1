//! Task function trait and closure adapter.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;

use super::{TaskContext, TaskError};

/// Core trait for task functions.
#[async_trait]
pub trait TaskFunction: Send + Sync {
    /// Registered type name, e.g. `shape_search`.
    fn task_type(&self) -> &str;

    /// One-line description for the task catalogue.
    fn description(&self) -> &str {
        ""
    }

    /// Eager parameter pre-check run at submission time.
    ///
    /// Anything this rejects never becomes a job record.
    fn validate(&self, _params: &Value) -> Result<(), TaskError> {
        Ok(())
    }

    /// Run the task.
    async fn run(&self, params: Value, ctx: TaskContext) -> Result<Value, TaskError>;
}

type RunFn =
    dyn Fn(Value, TaskContext) -> BoxFuture<'static, Result<Value, TaskError>> + Send + Sync;
type ValidateFn = dyn Fn(&Value) -> Result<(), TaskError> + Send + Sync;

/// Task function backed by a closure.
pub struct FnTask {
    task_type: String,
    description: String,
    run: Arc<RunFn>,
    validate: Option<Arc<ValidateFn>>,
}

impl FnTask {
    pub fn new<F, Fut>(task_type: impl Into<String>, run: F) -> Self
    where
        F: Fn(Value, TaskContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, TaskError>> + Send + 'static,
    {
        Self {
            task_type: task_type.into(),
            description: String::new(),
            run: Arc::new(move |params, ctx| Box::pin(run(params, ctx))),
            validate: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_validator<V>(mut self, validate: V) -> Self
    where
        V: Fn(&Value) -> Result<(), TaskError> + Send + Sync + 'static,
    {
        self.validate = Some(Arc::new(validate));
        self
    }
}

#[async_trait]
impl TaskFunction for FnTask {
    fn task_type(&self) -> &str {
        &self.task_type
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn validate(&self, params: &Value) -> Result<(), TaskError> {
        match &self.validate {
            Some(validate) => validate(params),
            None => Ok(()),
        }
    }

    async fn run(&self, params: Value, ctx: TaskContext) -> Result<Value, TaskError> {
        (self.run)(params, ctx).await
    }
}
