use std::fmt;
use std::sync::Arc;
use tracing::debug;

use super::policy::RequestEvaluator;
use super::{AuthDecision, DenyCode};
use crate::request::{HandlerResponse, SecurityRequest};

/// Turns a denial into the response sent to the client.
pub trait FailureHandler: Send + Sync {
    fn on_failure(&self, code: DenyCode, req: &SecurityRequest<'_>) -> HandlerResponse;
}

impl<F> FailureHandler for F
where
    F: Fn(DenyCode, &SecurityRequest<'_>) -> HandlerResponse + Send + Sync,
{
    fn on_failure(&self, code: DenyCode, req: &SecurityRequest<'_>) -> HandlerResponse {
        self(code, req)
    }
}

/// `401 {"error":"Unauthorized"}` or `403 {"error":"Forbidden"}`.
#[must_use]
pub fn default_failure_response(code: DenyCode, _req: &SecurityRequest<'_>) -> HandlerResponse {
    match code {
        DenyCode::Unauthorized => HandlerResponse::error(401, "Unauthorized"),
        DenyCode::Forbidden => HandlerResponse::error(403, "Forbidden"),
    }
}

/// Pre-handler attached to a route: runs the route's evaluator and, on
/// denial, produces the failure response.
#[derive(Clone)]
pub struct SecurityHook {
    evaluator: Arc<RequestEvaluator>,
    failure: Arc<dyn FailureHandler>,
}

impl SecurityHook {
    #[must_use]
    pub fn new(evaluator: Arc<RequestEvaluator>, failure: Arc<dyn FailureHandler>) -> Self {
        Self { evaluator, failure }
    }

    /// `None` to continue to the handler, `Some(response)` to stop here.
    #[must_use]
    pub fn run(&self, req: &SecurityRequest<'_>) -> Option<HandlerResponse> {
        match self.evaluator.evaluate(req) {
            AuthDecision::Allow => {
                debug!("At least one set of security handlers succeeded.");
                None
            }
            AuthDecision::Deny(code) => Some(self.failure.on_failure(code, req)),
        }
    }

    #[must_use]
    pub fn evaluate(&self, req: &SecurityRequest<'_>) -> AuthDecision {
        self.evaluator.evaluate(req)
    }

    #[must_use]
    pub fn evaluator(&self) -> &Arc<RequestEvaluator> {
        &self.evaluator
    }
}

impl fmt::Debug for SecurityHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityHook")
            .field("evaluator", &self.evaluator)
            .finish_non_exhaustive()
    }
}
