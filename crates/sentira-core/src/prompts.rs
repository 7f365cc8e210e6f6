//! Instruction contracts sent to instruction-following backends.
//!
//! Each contract pins the reply to a small JSON object so the analyzers
//! can parse it without backend-specific logic. Local backends ignore
//! the instruction and answer with a bare score.

/// Baseline sentiment contract.
pub(crate) const BASELINE: &str = "You rate the sentiment of social media text. Reply with only a \
JSON object of the form {\"score\": s} where s is a number from -1 (most negative) to 1 \
(most positive). No prose, no markdown.";

/// Sarcasm-detection contract.
pub(crate) const SARCASM: &str = "You detect sarcasm in social media text. Reply with only a JSON \
object of the form {\"is_sarcastic\": true|false, \"confidence\": c, \"reasoning\": r} where c \
is a number from 0 to 1 and r is one short sentence. No prose, no markdown.";

/// Perceived-IQ contract.
pub(crate) const IQ: &str = "You estimate the perceived intelligence of the author of a social \
media text. Reply with only a JSON object of the form {\"raw_iq\": q, \"confidence\": c, \
\"reasoning\": r} where q is a number from 55 to 145, c is a number from 0 to 1, and r is one \
short sentence. No prose, no markdown.";

/// Bot-likelihood contract.
pub(crate) const BOT: &str = "You estimate how likely a social media text was written by a bot. \
Reply with only a JSON object of the form {\"is_bot\": true|false, \"probability\": p, \
\"reasoning\": r} where p is a number from 0 to 1 and r is one short sentence. No prose, no \
markdown.";
