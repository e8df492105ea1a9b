//! Follow-up query rewriting.
//!
//! Conversational follow-ups ("what is his email?") carry a pronoun instead
//! of the person's name. Before retrieval, the pronoun is resolved against
//! the most recently mentioned person in the conversation history so the
//! vector search sees a usable query.

use crate::types::ConversationTurn;
use regex::Regex;

pub struct QueryRewriter {
    pronoun: Regex,
    possessive: Regex,
    person: Regex,
}

impl Default for QueryRewriter {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryRewriter {
    pub fn new() -> Self {
        Self {
            pronoun: Regex::new(r"(?i)\b(he|she|him|her|they|them)\b").unwrap(),
            possessive: Regex::new(r"(?i)\b(his|hers|her|their|theirs)\b").unwrap(),
            person: Regex::new(
                r"(?:Prof\.?|Professor|Dr\.?|Doctor)\s+[A-Za-z][\w.'-]*(?:\s+[A-Z][\w.'-]*)*",
            )
            .unwrap(),
        }
    }

    /// Substitute pronouns with the last person named in the history.
    /// Returns the query unchanged when there is no pronoun to resolve or no
    /// referent to resolve it to.
    pub fn resolve(&self, query: &str, history: &[ConversationTurn]) -> String {
        let has_possessive = self.possessive.is_match(query);
        if !has_possessive && !self.pronoun.is_match(query) {
            return query.to_string();
        }

        let Some(referent) = self.last_person(history) else {
            return query.to_string();
        };

        // Possessives first so "her" is not consumed as an object pronoun.
        let rewritten = self
            .possessive
            .replace_all(query, format!("{}'s", referent).as_str());
        let rewritten = self.pronoun.replace_all(&rewritten, referent.as_str());

        tracing::debug!(original = %query, rewritten = %rewritten, "resolved follow-up pronouns");
        rewritten.into_owned()
    }

    /// Most recent person mention, scanning newest turns first and the
    /// assistant's answer before the user's question within a turn.
    fn last_person(&self, history: &[ConversationTurn]) -> Option<String> {
        for turn in history.iter().rev() {
            for text in [&turn.assistant, &turn.user] {
                if let Some(m) = self.person.find_iter(text).last() {
                    return Some(m.as_str().trim_end_matches(['.', ',']).to_string());
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(user: &str, assistant: &str) -> ConversationTurn {
        ConversationTurn {
            user: user.to_string(),
            assistant: assistant.to_string(),
        }
    }

    #[test]
    fn possessive_pronoun_resolves_to_last_person() {
        let r = QueryRewriter::new();
        let history = [turn(
            "who is Prof. Aminah Rahman",
            "Prof. Aminah Rahman heads the networking laboratory.",
        )];
        let out = r.resolve("what is her email address", &history);
        assert_eq!(out, "what is Prof. Aminah Rahman's email address");
    }

    #[test]
    fn subject_pronoun_resolves_to_last_person() {
        let r = QueryRewriter::new();
        let history = [turn("tell me about Dr. Chen", "Dr. Chen works on photonics.")];
        let out = r.resolve("where does he teach", &history);
        assert_eq!(out, "where does Dr. Chen teach");
    }

    #[test]
    fn latest_mention_wins() {
        let r = QueryRewriter::new();
        let history = [
            turn("who is Prof. Lim", "Prof. Lim teaches control systems."),
            turn("who is Dr. Wong", "Dr. Wong teaches embedded systems."),
        ];
        let out = r.resolve("what are their publications", &history);
        assert!(out.contains("Dr. Wong's"));
        assert!(!out.contains("Prof. Lim"));
    }

    #[test]
    fn no_pronoun_leaves_query_untouched() {
        let r = QueryRewriter::new();
        let history = [turn("who is Prof. Lim", "Prof. Lim teaches control systems.")];
        assert_eq!(
            r.resolve("list all lecturers", &history),
            "list all lecturers"
        );
    }

    #[test]
    fn pronoun_without_referent_is_untouched() {
        let r = QueryRewriter::new();
        assert_eq!(r.resolve("what is his email", &[]), "what is his email");
    }
}
