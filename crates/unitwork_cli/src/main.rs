//! CLI smoke entry point.
//!
//! # Responsibility
//! - Run one insert/update/delete cycle through the pipeline against SQLite.
//! - Keep output deterministic enough for quick local sanity checks.
//!
//! Usage: `unitwork_cli [DB_PATH]` (in-memory database when omitted).

use serde::{Deserialize, Serialize};
use std::process::ExitCode;
use unitwork_core::{
    rule, Entity, EntityService, Identifiable, Manipulation, Outcome, SqliteSession,
    VALIDATION_ERROR_CODE,
};
use uuid::Uuid;

#[derive(Debug, Clone)]
struct NoteDraft {
    id: Option<Uuid>,
    title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Note {
    id: Uuid,
    title: String,
}

impl Identifiable for Note {
    type Id = Uuid;

    fn id(&self) -> &Uuid {
        &self.id
    }
}

impl Entity for Note {
    const ENTITY_TYPE: &'static str = "note";
}

fn to_note(draft: &NoteDraft) -> Option<Note> {
    Some(Note {
        id: draft.id.unwrap_or_else(Uuid::new_v4),
        title: draft.title.clone(),
    })
}

fn report<T>(step: &str, outcome: &Outcome<T>) -> bool {
    println!("unitwork {step}: {outcome}");
    outcome.succeeded()
}

fn main() -> ExitCode {
    println!("unitwork_core version={}", unitwork_core::core_version());

    let session = match std::env::args().nth(1) {
        Some(path) => SqliteSession::open(path),
        None => SqliteSession::open_in_memory(),
    };
    let mut service = match session {
        Ok(session) => EntityService::new(session),
        Err(err) => {
            eprintln!("unitwork open failed: {err}");
            return ExitCode::FAILURE;
        }
    };

    let inserted = service.execute(
        Manipulation::insert(
            NoteDraft {
                id: None,
                title: "first note".to_string(),
            },
            to_note,
        )
        .validator(rule(VALIDATION_ERROR_CODE, "title is required", |d: &NoteDraft| {
            !d.title.trim().is_empty()
        }))
        .on_committed(|draft, note| draft.id = Some(note.id)),
    );
    if !report("insert", &inserted) {
        return ExitCode::FAILURE;
    }
    let Some(id) = inserted.into_value().and_then(|result| result.model.id) else {
        return ExitCode::FAILURE;
    };

    let updated = service.update(
        NoteDraft {
            id: Some(id),
            title: "first note, revised".to_string(),
        },
        to_note,
    );
    let deleted = service.delete(id, |id: &Uuid| {
        Some(Note {
            id: *id,
            title: String::new(),
        })
    });

    if report("update", &updated) && report("delete", &deleted) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
