//! Planner - request to free-text project plan

use tracing::{debug, info};

use super::{AgentContext, AgentError};
use crate::domain::{ProjectPlan, ProjectRequest};
use crate::prompts::PlanContext;

/// Produces the project plan every later stage reads
pub struct Planner {
    ctx: AgentContext,
}

impl Planner {
    pub fn new(ctx: AgentContext) -> Self {
        Self { ctx }
    }

    /// One completion turning the request into a plan
    pub async fn plan(&self, request: &ProjectRequest) -> Result<ProjectPlan, AgentError> {
        debug!(request_len = request.as_str().len(), "Planner::plan: called");
        let text = self
            .ctx
            .ask("plan", &PlanContext {
                request: request.as_str(),
            })
            .await?;

        info!(plan_len = text.len(), "Project plan generated");
        Ok(ProjectPlan::new(text.trim()))
    }
}
