//! Synthetic provider
//!
//! Offline canned replies for development and test environments. Picks a
//! reply by keyword so normalized output still exercises suggestions and
//! action hints. No I/O, never fails.

use super::{AdapterRequest, ProviderAdapter};
use crate::error::ProviderError;
use crate::providers::Provider;
use async_trait::async_trait;
use tracing::debug;

const BUDGET_KEYWORDS: &[&str] = &["budget", "spend", "spending", "expense", "expenses"];
const SAVING_KEYWORDS: &[&str] = &["save", "saving", "savings", "goal", "emergency"];
const INVEST_KEYWORDS: &[&str] = &["invest", "investing", "stock", "etf", "fund", "retirement"];
const DEBT_KEYWORDS: &[&str] = &["debt", "loan", "credit", "card", "owe"];

const BUDGET_REPLY: &str = "A simple way to start is the 50/30/20 split: half of your income for needs, \
30% for wants and 20% for savings. I suggest you create a monthly budget with those three buckets. \
You could also track your expenses for two weeks to see where the money actually goes.";

const SAVING_REPLY: &str = "Saving gets easier when it is automatic. Consider moving a fixed amount to a \
separate account on payday. An emergency fund covering three months of expenses is a good first target, \
so set a savings goal and review it every month.";

const INVEST_REPLY: &str = "Before investing, make sure you have an emergency fund and no expensive debt. \
Broad, low-cost index funds spread your risk across many companies. Perhaps start with a small monthly \
amount and learn more about fees before choosing a product.";

const DEBT_REPLY: &str = "List every debt with its interest rate. Paying the most expensive one first \
saves the most money over time. I recommend you keep paying at least the minimum on the others so no \
late fees pile up.";

const GENERAL_REPLY: &str = "Happy to help with your money questions. Tell me a bit about what you want \
to achieve, for example building a budget, saving for a goal or understanding a financial product. \
You might want to start by writing down your monthly income and fixed costs.";

#[derive(Debug, Default, Clone, Copy)]
pub struct SyntheticAdapter;

impl SyntheticAdapter {
    pub fn reply_for(message: &str) -> &'static str {
        let text = message.to_lowercase();
        let has = |keywords: &[&str]| {
            text.split(|c: char| !c.is_alphanumeric())
                .any(|word| keywords.contains(&word))
        };

        if has(BUDGET_KEYWORDS) {
            BUDGET_REPLY
        } else if has(SAVING_KEYWORDS) {
            SAVING_REPLY
        } else if has(INVEST_KEYWORDS) {
            INVEST_REPLY
        } else if has(DEBT_KEYWORDS) {
            DEBT_REPLY
        } else {
            GENERAL_REPLY
        }
    }
}

#[async_trait]
impl ProviderAdapter for SyntheticAdapter {
    async fn complete(&self, provider: &Provider, request: &AdapterRequest) -> Result<String, ProviderError> {
        debug!(provider = %provider.key, "Serving synthetic reply");
        Ok(Self::reply_for(&request.message).to_string())
    }
}
