//! Syllabus document types.
//!
//! These structs mirror the persisted JSON document one-to-one. Decoding is
//! strict: every field must be present, only `completion_time` may be `null`.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::pricing::{PricingTable, TokenUsage};

/// Root document: one learner, one ordered list of chapters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyllabusDocument {
    pub student_name: String,
    /// Learner preference kept with the document. Chat turns always send the
    /// full running session list.
    pub max_context_size: u32,
    pub chapters: Vec<Chapter>,
}

/// A chapter of the syllabus and its own, isolated tutoring conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub title: String,
    pub sub_lessons: Vec<SubLesson>,
    pub conversation_history: Vec<Turn>,
    pub completed: bool,
    pub completion_time: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubLesson {
    pub title: String,
    pub content: String,
    pub completed: bool,
    pub completion_time: Option<NaiveDateTime>,
}

/// One entry of a chapter's conversation ledger.
///
/// Persisted as an object tagged by `role`: `user`, `assistant` or `info`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Turn {
    User { content: String },
    Assistant { content: String },
    #[serde(rename = "info")]
    UsageInfo(UsageInfo),
}

/// Usage accounting for one exchange, stored after its two messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageInfo {
    /// Provider model identifier the exchange ran against.
    pub model: String,
    pub total_tokens: u32,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl UsageInfo {
    pub fn new(model: impl Into<String>, usage: TokenUsage) -> Self {
        Self {
            model: model.into(),
            total_tokens: usage.total_tokens,
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
        }
    }

    pub fn usage(&self) -> TokenUsage {
        TokenUsage {
            total_tokens: self.total_tokens,
            prompt_tokens: self.prompt_tokens,
            completion_tokens: self.completion_tokens,
        }
    }
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: content.into(),
        }
    }

    /// Message text for `User`/`Assistant` entries, `None` for usage records.
    pub fn content(&self) -> Option<&str> {
        match self {
            Self::User { content } | Self::Assistant { content } => Some(content),
            Self::UsageInfo(_) => None,
        }
    }

    pub fn usage_info(&self) -> Option<&UsageInfo> {
        match self {
            Self::UsageInfo(info) => Some(info),
            _ => None,
        }
    }
}

/// A completed user/assistant exchange, ready to be appended to a ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    pub user: String,
    pub assistant: String,
    pub usage: UsageInfo,
}

impl Exchange {
    /// The three ledger entries of this exchange, in order.
    pub fn into_turns(self) -> [Turn; 3] {
        [
            Turn::User { content: self.user },
            Turn::Assistant {
                content: self.assistant,
            },
            Turn::UsageInfo(self.usage),
        ]
    }
}

/// Aggregate sub-lesson completion across the syllabus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    /// Whole percent, rounded down. `0` for an empty syllabus.
    pub percent: u8,
}

impl SyllabusDocument {
    /// Checks the structural rules the store relies on.
    ///
    /// Returns a description of the first violation found.
    pub fn validate(&self) -> Result<(), String> {
        let mut chapter_titles = HashSet::new();
        for chapter in &self.chapters {
            if !chapter_titles.insert(chapter.title.as_str()) {
                return Err(format!("duplicate chapter title '{}'", chapter.title));
            }
            if chapter.completed != chapter.completion_time.is_some() {
                return Err(format!(
                    "chapter '{}' has completed={} but completion_time is {}",
                    chapter.title,
                    chapter.completed,
                    describe_presence(chapter.completion_time.is_some())
                ));
            }

            let mut lesson_titles = HashSet::new();
            for lesson in &chapter.sub_lessons {
                if !lesson_titles.insert(lesson.title.as_str()) {
                    return Err(format!(
                        "duplicate sub-lesson title '{}' in chapter '{}'",
                        lesson.title, chapter.title
                    ));
                }
                if lesson.completed != lesson.completion_time.is_some() {
                    return Err(format!(
                        "sub-lesson '{}' in chapter '{}' has completed={} but completion_time is {}",
                        lesson.title,
                        chapter.title,
                        lesson.completed,
                        describe_presence(lesson.completion_time.is_some())
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn chapter(&self, title: &str) -> Option<&Chapter> {
        self.chapters.iter().find(|c| c.title == title)
    }

    pub(crate) fn chapter_mut(&mut self, title: &str) -> Option<&mut Chapter> {
        self.chapters.iter_mut().find(|c| c.title == title)
    }

    pub fn progress(&self) -> Progress {
        let total: usize = self.chapters.iter().map(|c| c.sub_lessons.len()).sum();
        let completed: usize = self
            .chapters
            .iter()
            .flat_map(|c| c.sub_lessons.iter())
            .filter(|l| l.completed)
            .count();
        let percent = if total == 0 {
            0
        } else {
            (completed * 100 / total) as u8
        };
        Progress {
            completed,
            total,
            percent,
        }
    }
}

fn describe_presence(present: bool) -> &'static str {
    if present { "set" } else { "absent" }
}

impl Chapter {
    pub fn sub_lesson(&self, title: &str) -> Option<&SubLesson> {
        self.sub_lessons.iter().find(|l| l.title == title)
    }

    /// `true` once every sub-lesson is completed. Empty chapters never complete.
    pub fn all_sub_lessons_completed(&self) -> bool {
        !self.sub_lessons.is_empty() && self.sub_lessons.iter().all(|l| l.completed)
    }

    /// Sum of the recorded cost of every exchange in this chapter.
    pub fn conversation_cost(&self, pricing: &PricingTable) -> f64 {
        self.conversation_history
            .iter()
            .filter_map(Turn::usage_info)
            .map(|info| pricing.cost_of(info))
            .sum()
    }

    /// Number of recorded exchanges (one per usage record).
    pub fn exchange_count(&self) -> usize {
        self.conversation_history
            .iter()
            .filter(|t| t.usage_info().is_some())
            .count()
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use approx::assert_relative_eq;

    const PERSISTED: &str = r#"{
      "student_name": "Grace",
      "max_context_size": 8,
      "chapters": [
        {
          "title": "Functions",
          "sub_lessons": [
            {"title": "def", "content": "Defining functions", "completed": true, "completion_time": "2023-04-02T10:15:30.123456"},
            {"title": "return", "content": "Returning values", "completed": false, "completion_time": null}
          ],
          "conversation_history": [
            {"role": "user", "content": "What is a function?"},
            {"role": "assistant", "content": "A reusable block of code."},
            {"role": "info", "model": "gpt-4", "total_tokens": 30, "prompt_tokens": 20, "completion_tokens": 10}
          ],
          "completed": false,
          "completion_time": null
        }
      ]
    }"#;

    #[test]
    fn test_decodes_persisted_document() {
        let doc: SyllabusDocument = serde_json::from_str(PERSISTED).unwrap();
        assert_eq!(doc.student_name, "Grace");
        assert_eq!(doc.max_context_size, 8);

        let chapter = doc.chapter("Functions").unwrap();
        assert!(chapter.sub_lessons[0].completed);
        assert!(chapter.sub_lessons[0].completion_time.is_some());
        assert_eq!(chapter.conversation_history.len(), 3);
        assert_eq!(
            chapter.conversation_history[0],
            Turn::user("What is a function?")
        );
        let info = chapter.conversation_history[2].usage_info().unwrap();
        assert_eq!(info.model, "gpt-4");
        assert_eq!(info.total_tokens, 30);
        assert!(doc.validate().is_ok());
    }

    #[test]
    fn test_turns_serialize_with_role_tag() {
        let json = serde_json::to_value(Turn::assistant("Hi")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "assistant", "content": "Hi"}));

        let info = Turn::UsageInfo(UsageInfo::new(
            "gpt-3.5-turbo",
            TokenUsage {
                total_tokens: 3,
                prompt_tokens: 2,
                completion_tokens: 1,
            },
        ));
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["role"], "info");
        assert_eq!(json["model"], "gpt-3.5-turbo");
        assert_eq!(json["completion_tokens"], 1);
    }

    #[test]
    fn test_missing_field_is_rejected() {
        let json = r#"{"student_name": "Ada", "chapters": []}"#;
        assert!(serde_json::from_str::<SyllabusDocument>(json).is_err());
    }

    #[test]
    fn test_unknown_turn_role_is_rejected() {
        let json = r#"{"role": "system", "content": "be nice"}"#;
        assert!(serde_json::from_str::<Turn>(json).is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_titles() {
        let mut doc = document();
        doc.chapters.push(chapter("Loops", &["Again"]));
        assert!(doc.validate().unwrap_err().contains("duplicate chapter"));

        let mut doc = document();
        doc.chapters[0].sub_lessons.push(lesson("Types"));
        assert!(doc.validate().unwrap_err().contains("duplicate sub-lesson"));
    }

    #[test]
    fn test_validate_rejects_completion_without_time() {
        let mut doc = document();
        doc.chapters[1].sub_lessons[0].completed = true;
        assert!(doc.validate().unwrap_err().contains("For"));
    }

    #[test]
    fn test_progress_counts_all_sub_lessons() {
        let mut doc = document();
        assert_eq!(doc.progress().percent, 0);

        doc.chapters[0].sub_lessons[0].completed = true;
        doc.chapters[1].sub_lessons[2].completed = true;
        let progress = doc.progress();
        assert_eq!(progress.completed, 2);
        assert_eq!(progress.total, 5);
        assert_eq!(progress.percent, 40);

        let empty = SyllabusDocument {
            student_name: String::new(),
            max_context_size: 0,
            chapters: vec![],
        };
        assert_eq!(empty.progress().percent, 0);
    }

    #[test]
    fn test_exchange_into_turns_order() {
        let exchange = Exchange {
            user: "q".to_string(),
            assistant: "a".to_string(),
            usage: UsageInfo::new("gpt-4", TokenUsage::default()),
        };
        let [first, second, third] = exchange.into_turns();
        assert_eq!(first, Turn::user("q"));
        assert_eq!(second, Turn::assistant("a"));
        assert!(third.usage_info().is_some());
    }

    #[test]
    fn test_conversation_cost_sums_usage_records() {
        let doc: SyllabusDocument = serde_json::from_str(PERSISTED).unwrap();
        let chapter = doc.chapter("Functions").unwrap();
        let pricing = PricingTable::default();
        assert_relative_eq!(
            chapter.conversation_cost(&pricing),
            (20.0 * 0.03 + 10.0 * 0.06) / 1000.0
        );
        assert_eq!(chapter.exchange_count(), 1);
    }
}
