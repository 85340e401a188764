//! Prompt construction.
//!
//! A prompt is the company context, a blank line, the conversation rendered
//! one `Role: text` line per turn, and finally the cue line that hands the
//! turn to the assistant.

use crate::session::ConversationTurn;

/// Built-in company context, used unless `COMPASS_CONTEXT_FILE` overrides it.
pub const COMPANY_CONTEXT: &str = r#"
You are CompassBot, an AI assistant for Compass Logistics International (https://www.compasslog.com/).
You only answer questions related to this company, its services, locations, and operations.

If the user asks anything unrelated (like technology, programming, or people not in the company),
reply with: "I'm sorry, I can only answer questions related to Compass Logistics International."

Company Overview:
- Compass Logistics International (CLI) is a global logistics group headquartered in Dubai, UAE.
- Operates 21 locations in 12 countries: Europe, Middle East, Far East, Africa, and North America.
- Core services include: Air Freight, Sea Freight, Tank & Container Operations, Customs Clearance, Warehousing, and Distribution.
- Values: transparency, trust, commitment, and speed.
- Website: https://www.compasslog.com/
"#;

/// Name the assistant answers as; also the final cue line of every prompt.
pub const BOT_NAME: &str = "CompassBot";

/// Render `history` beneath `context` and cue the assistant's reply.
pub fn build_prompt(context: &str, history: &[ConversationTurn]) -> String {
    let mut prompt = String::with_capacity(
        context.len() + history.iter().map(|t| t.text.len() + 12).sum::<usize>() + 16,
    );
    prompt.push_str(context);
    prompt.push_str("\n\n");
    for turn in history {
        prompt.push_str(turn.role.label());
        prompt.push_str(": ");
        prompt.push_str(&turn.text);
        prompt.push('\n');
    }
    prompt.push_str(BOT_NAME);
    prompt.push(':');
    prompt
}

/// Prompt for a one-off question with no conversation history.
pub fn build_single_turn_prompt(context: &str, message: &str) -> String {
    build_prompt(context, &[ConversationTurn::user(message)])
}

// ── Tests ──────────────────────────────────────────────────────────────────────
