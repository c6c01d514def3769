//! System prompt assembly
//!
//! Pure and deterministic: persona introduction, domain guardrails, an
//! optional privacy block and a compact rendering of the user's finances.

use crate::models::{ChatContext, Persona};
use std::fmt::Write;

const MAX_EXPENSE_LINES: usize = 3;
const MAX_GOAL_LINES: usize = 2;

const GENERIC_INTRO: &str = r#"You are a friendly personal finance assistant.
You help people understand their money, plan ahead and build healthy financial habits."#;

const GUARDRAILS: &str = r#"Guidelines:
- Use the user's local currency and everyday banking terminology; avoid jargon unless you explain it
- Be aware that financial products are regulated; never promise returns or give individualized legal or tax advice
- Point to official sources or a licensed professional for decisions with legal, tax or large financial impact
- Never ask for passwords, PINs, full card numbers or one-time codes
- Keep answers short and practical, with at most three concrete next steps
- Be encouraging: celebrate progress and never shame the user about spending"#;

const PRIVACY_BLOCK: &str = r#"Privacy:
- The user has NOT consented to data sharing
- Do not repeat or include names, account numbers, addresses or any other personally identifying details in your answer
- Do not retain, reuse or reference this content beyond the current exchange"#;

fn persona_intro(persona: Persona) -> &'static str {
    match persona {
        Persona::Pepper => r#"You are Pepper, a banking specialist.
You explain accounts, cards, transfers, fees and limits in plain language and help users compare banking options."#,
        Persona::Penny => r#"You are Penny, a budget coach.
You help users build realistic budgets, spot overspending and stick to a monthly plan."#,
        Persona::Sprout => r#"You are Sprout, a savings and investing guide.
You help users grow an emergency fund first, then understand long-term investing basics and risk."#,
        Persona::Sage => r#"You are Sage, a financial educator.
You teach money concepts step by step, using simple examples and checking understanding."#,
        Persona::Bitsy => r#"You are Bitsy, a crypto and digital payments assistant.
You explain wallets, instant payments and crypto assets with a strong focus on security and volatility risk."#,
        Persona::Hustle => r#"You are Hustle, an income-growth specialist.
You help users find ways to increase income through skills, side projects and career moves."#,
    }
}

/// Build the system prompt for one exchange.
pub fn build(persona: Option<Persona>, context: Option<&ChatContext>) -> String {
    let mut prompt = String::with_capacity(1024);

    prompt.push_str(persona.map(persona_intro).unwrap_or(GENERIC_INTRO));
    prompt.push_str("\n\n");
    prompt.push_str(GUARDRAILS);

    let Some(context) = context else {
        return prompt;
    };

    if context.data_sharing_consent == Some(false) {
        prompt.push_str("\n\n");
        prompt.push_str(PRIVACY_BLOCK);
    } else if let Some(name) = context.user_name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        let _ = write!(prompt, "\n\nThe user's name is {}.", name);
    }

    if context.has_financial_snapshot() {
        prompt.push_str("\n\n");
        prompt.push_str(&render_snapshot(context));
    }

    prompt
}

fn render_snapshot(context: &ChatContext) -> String {
    let mut out = String::from("User's financial snapshot:");

    if let Some(balance) = context.balance {
        let _ = write!(out, "\n- Balance: {:.2}", balance);
    }

    if !context.recent_expenses.is_empty() {
        out.push_str("\n- Recent expenses:");
        for expense in context.recent_expenses.iter().take(MAX_EXPENSE_LINES) {
            let _ = write!(out, "\n  * {}: {:.2}", expense.description, expense.amount);
            if let Some(category) = &expense.category {
                let _ = write!(out, " ({})", category);
            }
        }
    }

    if !context.goals.is_empty() {
        out.push_str("\n- Goals:");
        for goal in context.goals.iter().take(MAX_GOAL_LINES) {
            let _ = write!(
                out,
                "\n  * {}: {:.0}% ({:.2} of {:.2})",
                goal.name,
                goal.percent(),
                goal.current,
                goal.target
            );
        }
    }

    out
}
