//! Syllabus Store
//!
//! The store is the sole owner of the in-memory [`SyllabusDocument`]. Every
//! mutation goes through it and is flushed to storage before the call returns,
//! so the persisted snapshot never lags behind memory by more than one call.
//!
//! Mutations are applied to a working copy first. The copy only replaces the
//! live document once the write succeeded; a failed write leaves both memory
//! and disk at the previous snapshot.

use chrono::Local;
use tracing::{debug, info};

use crate::error::{Result, StorageError, TutorError};
use crate::storage::DocumentStorage;
use crate::syllabus::{Chapter, Exchange, SyllabusDocument, Turn};

pub struct SyllabusStore<S: DocumentStorage> {
    storage: S,
    document: SyllabusDocument,
}

impl<S: DocumentStorage> SyllabusStore<S> {
    /// Reads and validates the document held by `storage`.
    ///
    /// # Errors
    ///
    /// Fails with a [`StorageError`] if the resource is missing, is not a
    /// syllabus document, or breaks a structural rule. Nothing is defaulted.
    pub fn load(storage: S) -> Result<Self> {
        let bytes = storage.read()?;
        let document: SyllabusDocument =
            serde_json::from_slice(&bytes).map_err(|e| StorageError::Malformed {
                location: storage.location(),
                message: e.to_string(),
            })?;
        document
            .validate()
            .map_err(|message| StorageError::Invalid {
                location: storage.location(),
                message,
            })?;

        info!(
            location = %storage.location(),
            chapters = document.chapters.len(),
            "Syllabus loaded"
        );
        Ok(Self { storage, document })
    }

    /// Wraps an in-memory document and writes it out immediately.
    pub fn create(storage: S, document: SyllabusDocument) -> Result<Self> {
        document
            .validate()
            .map_err(|message| StorageError::Invalid {
                location: storage.location(),
                message,
            })?;
        let mut store = Self { storage, document };
        store.save()?;
        Ok(store)
    }

    /// Writes the full in-memory document, replacing the previous snapshot.
    pub fn save(&mut self) -> Result<()> {
        let bytes = encode(&self.document, &self.storage)?;
        self.storage.write(&bytes)?;
        Ok(())
    }

    pub fn document(&self) -> &SyllabusDocument {
        &self.document
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn update_student_name(&mut self, name: &str) -> Result<()> {
        if self.document.student_name == name {
            return Ok(());
        }
        self.commit(|doc| {
            doc.student_name = name.to_string();
            Ok(())
        })?;
        info!(student_name = %name, "Student name updated");
        Ok(())
    }

    pub fn update_max_context_size(&mut self, size: u32) -> Result<()> {
        if self.document.max_context_size == size {
            return Ok(());
        }
        self.commit(|doc| {
            doc.max_context_size = size;
            Ok(())
        })?;
        info!(max_context_size = size, "Max context size updated");
        Ok(())
    }

    /// Clears completion state and conversation history everywhere.
    ///
    /// Titles, content and ordering are kept. Persists once.
    pub fn reset(&mut self) -> Result<()> {
        self.commit(|doc| {
            for chapter in &mut doc.chapters {
                chapter.conversation_history.clear();
                chapter.completed = false;
                chapter.completion_time = None;
                for lesson in &mut chapter.sub_lessons {
                    lesson.completed = false;
                    lesson.completion_time = None;
                }
            }
            Ok(())
        })?;
        info!("Syllabus reset");
        Ok(())
    }

    pub fn get_chapter(&self, title: &str) -> Result<&Chapter> {
        self.document
            .chapter(title)
            .ok_or_else(|| TutorError::chapter_not_found(title))
    }

    /// Marks a sub-lesson completed (stamping the current time) or not
    /// completed (clearing the stamp).
    ///
    /// The chapter's own completion follows its sub-lessons: it is completed
    /// exactly when all of them are.
    pub fn update_sub_lesson_completion(
        &mut self,
        chapter_title: &str,
        sub_lesson_title: &str,
        completed: bool,
    ) -> Result<()> {
        let chapter = self.get_chapter(chapter_title)?;
        let lesson = chapter
            .sub_lesson(sub_lesson_title)
            .ok_or_else(|| TutorError::sub_lesson_not_found(chapter_title, sub_lesson_title))?;
        if lesson.completed == completed {
            return Ok(());
        }

        let now = Local::now().naive_local();
        self.commit(|doc| {
            let chapter = doc
                .chapter_mut(chapter_title)
                .ok_or_else(|| TutorError::chapter_not_found(chapter_title))?;
            let lesson = chapter
                .sub_lessons
                .iter_mut()
                .find(|l| l.title == sub_lesson_title)
                .ok_or_else(|| TutorError::sub_lesson_not_found(chapter_title, sub_lesson_title))?;
            lesson.completed = completed;
            lesson.completion_time = completed.then_some(now);

            let all_done = chapter.all_sub_lessons_completed();
            if all_done != chapter.completed {
                chapter.completed = all_done;
                chapter.completion_time = all_done.then_some(now);
            }
            Ok(())
        })?;

        info!(
            chapter = %chapter_title,
            sub_lesson = %sub_lesson_title,
            completed,
            "Sub-lesson completion updated"
        );
        Ok(())
    }

    /// Appends `turns` to the chapter's conversation history and persists once.
    pub fn extend_conversation_history(
        &mut self,
        chapter_title: &str,
        turns: impl IntoIterator<Item = Turn>,
    ) -> Result<()> {
        self.get_chapter(chapter_title)?;
        let turns: Vec<Turn> = turns.into_iter().collect();
        let appended = turns.len();
        self.commit(|doc| {
            doc.chapter_mut(chapter_title)
                .ok_or_else(|| TutorError::chapter_not_found(chapter_title))?
                .conversation_history
                .extend(turns);
            Ok(())
        })?;
        debug!(chapter = %chapter_title, appended, "Conversation history extended");
        Ok(())
    }

    /// Appends one exchange as its user, assistant and usage entries.
    pub fn record_exchange(&mut self, chapter_title: &str, exchange: Exchange) -> Result<()> {
        self.extend_conversation_history(chapter_title, exchange.into_turns())
    }

    /// Applies `mutate` to a copy of the document, persists the copy and only
    /// then makes it the live document.
    fn commit<F>(&mut self, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut SyllabusDocument) -> Result<()>,
    {
        let mut working = self.document.clone();
        mutate(&mut working)?;
        let bytes = encode(&working, &self.storage)?;
        self.storage.write(&bytes)?;
        self.document = working;
        Ok(())
    }
}

fn encode<S: DocumentStorage>(document: &SyllabusDocument, storage: &S) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(document).map_err(|e| {
        TutorError::Storage(StorageError::Malformed {
            location: storage.location(),
            message: e.to_string(),
        })
    })
}
