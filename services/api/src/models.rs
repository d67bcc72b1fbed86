//! API Models
//!
//! Request payloads and read-only views returned to the presentation layer.
//! Views are built from the core types and documented with `utoipa`.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tutor_core::{
    PricingTable, TokenUsage, TurnOutcome, TutorSession,
    session::ExchangeRecord,
    syllabus::{Chapter, SubLesson, SyllabusDocument, Turn},
};
use utoipa::ToSchema;

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct ProgressView {
    pub completed: usize,
    pub total: usize,
    #[schema(example = 40)]
    pub percent: u8,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct ChapterSummary {
    #[schema(example = "Loops")]
    pub title: String,
    pub completed: bool,
    pub completion_time: Option<NaiveDateTime>,
    pub sub_lessons_completed: usize,
    pub sub_lessons_total: usize,
    pub exchanges: usize,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct SyllabusView {
    #[schema(example = "Ada")]
    pub student_name: String,
    pub max_context_size: u32,
    pub progress: ProgressView,
    pub chapters: Vec<ChapterSummary>,
}

impl From<&SyllabusDocument> for SyllabusView {
    fn from(doc: &SyllabusDocument) -> Self {
        let progress = doc.progress();
        Self {
            student_name: doc.student_name.clone(),
            max_context_size: doc.max_context_size,
            progress: ProgressView {
                completed: progress.completed,
                total: progress.total,
                percent: progress.percent,
            },
            chapters: doc
                .chapters
                .iter()
                .map(|c| ChapterSummary {
                    title: c.title.clone(),
                    completed: c.completed,
                    completion_time: c.completion_time,
                    sub_lessons_completed: c.sub_lessons.iter().filter(|l| l.completed).count(),
                    sub_lessons_total: c.sub_lessons.len(),
                    exchanges: c.exchange_count(),
                })
                .collect(),
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct SubLessonView {
    pub title: String,
    pub content: String,
    pub completed: bool,
    pub completion_time: Option<NaiveDateTime>,
}

impl From<&SubLesson> for SubLessonView {
    fn from(lesson: &SubLesson) -> Self {
        Self {
            title: lesson.title.clone(),
            content: lesson.content.clone(),
            completed: lesson.completed,
            completion_time: lesson.completion_time,
        }
    }
}

/// A ledger entry as rendered: a chat bubble or a usage line.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TurnView {
    Message {
        #[schema(example = "user")]
        role: String,
        content: String,
    },
    Usage {
        #[schema(example = "gpt-3.5-turbo")]
        model: String,
        total_tokens: u32,
        prompt_tokens: u32,
        completion_tokens: u32,
        cost: f64,
    },
}

impl TurnView {
    fn from_turn(turn: &Turn, pricing: &PricingTable) -> Self {
        match turn {
            Turn::User { content } => Self::Message {
                role: "user".to_string(),
                content: content.clone(),
            },
            Turn::Assistant { content } => Self::Message {
                role: "assistant".to_string(),
                content: content.clone(),
            },
            Turn::UsageInfo(info) => Self::Usage {
                model: info.model.clone(),
                total_tokens: info.total_tokens,
                prompt_tokens: info.prompt_tokens,
                completion_tokens: info.completion_tokens,
                cost: pricing.cost_of(info),
            },
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct ChapterView {
    pub title: String,
    pub completed: bool,
    pub completion_time: Option<NaiveDateTime>,
    pub sub_lessons: Vec<SubLessonView>,
    pub conversation_history: Vec<TurnView>,
    pub conversation_cost: f64,
}

impl ChapterView {
    pub fn new(chapter: &Chapter, pricing: &PricingTable) -> Self {
        Self {
            title: chapter.title.clone(),
            completed: chapter.completed,
            completion_time: chapter.completion_time,
            sub_lessons: chapter.sub_lessons.iter().map(SubLessonView::from).collect(),
            conversation_history: chapter
                .conversation_history
                .iter()
                .map(|t| TurnView::from_turn(t, pricing))
                .collect(),
            conversation_cost: chapter.conversation_cost(pricing),
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, Copy, PartialEq)]
pub struct UsageView {
    pub total_tokens: u32,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl From<TokenUsage> for UsageView {
    fn from(usage: TokenUsage) -> Self {
        Self {
            total_tokens: usage.total_tokens,
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct ExchangeView {
    pub chapter: String,
    #[schema(example = "GPT-3.5")]
    pub model: String,
    pub total_tokens: u32,
    pub cost: f64,
}

impl From<&ExchangeRecord> for ExchangeView {
    fn from(record: &ExchangeRecord) -> Self {
        Self {
            chapter: record.chapter.clone(),
            model: record.model.label().to_string(),
            total_tokens: record.total_tokens,
            cost: record.cost,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct SessionView {
    #[schema(example = "GPT-3.5")]
    pub model: String,
    #[schema(example = "gpt-3.5-turbo")]
    pub provider_model: String,
    pub selected_chapter: Option<String>,
    pub total_cost: f64,
    pub exchanges: Vec<ExchangeView>,
}

impl From<&TutorSession> for SessionView {
    fn from(session: &TutorSession) -> Self {
        Self {
            model: session.model().label().to_string(),
            provider_model: session.model().provider_model().to_string(),
            selected_chapter: session.selected_chapter().map(str::to_string),
            total_cost: session.total_cost(),
            exchanges: session.exchanges().iter().map(ExchangeView::from).collect(),
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct ChatResponse {
    pub chapter: String,
    pub response: String,
    #[schema(example = "GPT-4")]
    pub model: String,
    pub usage: UsageView,
    pub cost: f64,
    pub total_cost: f64,
}

impl ChatResponse {
    pub fn new(chapter: String, model: String, outcome: TurnOutcome) -> Self {
        Self {
            chapter,
            response: outcome.response,
            model,
            usage: outcome.usage.into(),
            cost: outcome.cost,
            total_cost: outcome.total_cost,
        }
    }
}

#[derive(Deserialize, ToSchema, Debug, Default)]
pub struct UpdateProfilePayload {
    #[schema(example = "Ada")]
    pub student_name: Option<String>,
    #[schema(example = 10)]
    pub max_context_size: Option<u32>,
}

#[derive(Deserialize, ToSchema, Debug)]
pub struct UpdateCompletionPayload {
    pub completed: bool,
}

#[derive(Deserialize, ToSchema, Debug)]
pub struct SelectModelPayload {
    /// Label ("GPT-4") or provider identifier ("gpt-4").
    #[schema(example = "GPT-4")]
    pub model: String,
}

#[derive(Deserialize, ToSchema, Debug)]
pub struct SelectChapterPayload {
    #[schema(example = "Loops")]
    pub title: String,
}

#[derive(Deserialize, ToSchema, Debug)]
pub struct ChatPayload {
    #[schema(example = "What does `break` do inside a loop?")]
    pub message: String,
    /// Defaults to the selected chapter, then to the first chapter.
    pub chapter: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct ErrorResponse {
    pub message: String,
}
