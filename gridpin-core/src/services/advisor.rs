//! Advisor service - financial insights from the advice backend
//!
//! Prompts are built from an [`AccountView`], so a duress session only ever
//! sends the decoy balance and an empty statement. Nothing here writes to
//! the ledger.

use std::sync::Arc;

use crate::domain::format_rupees;
use crate::domain::result::{Error, Result};
use crate::ports::AdviceProvider;
use crate::services::logging::{LogEvent, LoggingService};
use crate::services::session::AccountView;

const ADVICE_UNAVAILABLE: &str = "Failed to get financial advice.";

pub struct AdvisorService {
    provider: Arc<dyn AdviceProvider>,
    logger: Option<Arc<LoggingService>>,
}

impl AdvisorService {
    pub fn new(provider: Arc<dyn AdviceProvider>, logger: Option<Arc<LoggingService>>) -> Self {
        Self { provider, logger }
    }

    /// Short spending analysis plus one savings tip
    pub fn analyze_spending(&self, view: &AccountView) -> Result<String> {
        self.ask(&spending_prompt(view))
    }

    /// Three or four steps towards a named goal
    pub fn savings_plan(&self, view: &AccountView, goal_name: &str, goal_amount: i64) -> Result<String> {
        let goal_name = goal_name.trim();
        if goal_name.is_empty() || goal_amount <= 0 {
            return Err(Error::validation("Please enter both a goal name and amount."));
        }
        self.ask(&savings_prompt(view, goal_name, goal_amount))
    }

    fn ask(&self, prompt: &str) -> Result<String> {
        self.provider.generate_text(prompt).map_err(|e| {
            if let Some(logger) = &self.logger {
                let _ = logger.log(
                    LogEvent::new("advice_failed")
                        .with_error(ADVICE_UNAVAILABLE)
                        .with_error_details(format!("{}: {}", self.provider.name(), e)),
                );
            }
            Error::collaborator(ADVICE_UNAVAILABLE)
        })
    }
}

fn spending_prompt(view: &AccountView) -> String {
    let transactions = if view.history.is_empty() {
        "none yet".to_string()
    } else {
        view.history
            .iter()
            .map(|t| format!("{} of {} for {}", t.kind.as_str(), t.amount, t.description))
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!(
        "I am a bank customer in India. My current balance is {}. My recent transactions are: {}. \
         Based on this, provide a brief, friendly analysis of my spending habits in 2-3 sentences \
         and give me one actionable savings tip. Keep the tone encouraging.",
        format_rupees(view.balance),
        transactions
    )
}

fn savings_prompt(view: &AccountView, goal_name: &str, goal_amount: i64) -> String {
    format!(
        "I am a bank customer in India. My current balance is {}. I want to save up {} for a \"{}\". \
         Create a simple, encouraging savings plan with 3-4 actionable steps I can take. \
         Keep the tone positive and motivational.",
        format_rupees(view.balance),
        format_rupees(goal_amount),
        goal_name
    )
}
