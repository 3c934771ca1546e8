//! Fixed context provider for testing.

use crate::application::ports::{ContextProvider, RequestContext};
use crate::error::ContextError;

/// Context provider returning preset values, or failing every lookup.
#[derive(Debug, Clone, Default)]
pub struct StaticContext {
    request: Option<RequestContext>,
    user: Option<String>,
    revision: Option<String>,
    fail: bool,
}

impl StaticContext {
    /// A provider whose every lookup returns an error.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn with_request(mut self, request: RequestContext) -> Self {
        self.request = Some(request);
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    fn lookup<T: Clone>(&self, what: &str, value: &Option<T>) -> Result<Option<T>, ContextError> {
        if self.fail {
            return Err(ContextError::new(format!("{} lookup failed", what)));
        }
        Ok(value.clone())
    }
}

impl ContextProvider for StaticContext {
    fn request(&self) -> Result<Option<RequestContext>, ContextError> {
        self.lookup("request", &self.request)
    }

    fn user_identity(&self) -> Result<Option<String>, ContextError> {
        self.lookup("user", &self.user)
    }

    fn vcs_revision(&self) -> Result<Option<String>, ContextError> {
        self.lookup("revision", &self.revision)
    }
}
