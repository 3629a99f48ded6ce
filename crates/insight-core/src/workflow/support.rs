//! Customer support workflow
//!
//! Produces a ticket-style response from a free-form message: a naive
//! keyword-based category classification, a guessed urgency and a
//! canned reply. Computes its result without delegating to the
//! orchestrator.

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use super::{Workflow, WorkflowContext, WorkflowResult};
use crate::{Error, Result};

/// Ticket categories with their trigger keywords
const CATEGORIES: &[(&str, &[&str])] = &[
    ("billing", &["invoice", "charge", "refund", "payment", "billing"]),
    ("technical", &["error", "crash", "bug", "broken", "timeout"]),
    ("account", &["login", "password", "account", "access", "locked"]),
];

const URGENT_KEYWORDS: &[&str] = &["urgent", "asap", "immediately", "outage", "down"];

pub struct CustomerSupportWorkflow;

impl CustomerSupportWorkflow {
    pub fn new() -> Self {
        Self
    }

    /// First category whose keyword appears in the message
    fn classify(message: &str) -> &'static str {
        let lower = message.to_lowercase();
        CATEGORIES
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
            .map(|(category, _)| *category)
            .unwrap_or("general")
    }

    fn urgency(message: &str) -> &'static str {
        let lower = message.to_lowercase();
        if URGENT_KEYWORDS.iter().any(|k| lower.contains(k)) {
            "high"
        } else {
            "normal"
        }
    }
}

impl Default for CustomerSupportWorkflow {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Workflow for CustomerSupportWorkflow {
    fn name(&self) -> &str {
        "customer_support"
    }

    fn description(&self) -> &str {
        "Classifies a support message and drafts a ticket response"
    }

    async fn execute(&self, ctx: WorkflowContext) -> Result<WorkflowResult> {
        let message = ctx
            .input
            .get("message")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                Error::Validation("customer_support input requires a 'message' string".to_string())
            })?;

        let category = Self::classify(message);
        let urgency = Self::urgency(message);
        let ticket_id = format!("TICKET-{}", &uuid::Uuid::new_v4().to_string()[..8]);

        debug!(
            "Classified support message from {} as {} ({})",
            ctx.caller, category, urgency
        );

        let output = json!({
            "ticket_id": ticket_id,
            "category": category,
            "urgency": urgency,
            "response": format!(
                "Thanks for reaching out. Your request was filed as a {category} ticket \
                 and our team will follow up shortly."
            ),
        });

        Ok(WorkflowResult::completed(self.name(), output))
    }
}
