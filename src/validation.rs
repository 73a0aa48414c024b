use std::collections::BTreeMap;

use serde::Serialize;
use uuid::Uuid;

use crate::{model::PollRequest, util};

pub const MIN_QUESTION_LEN: usize = 5;
pub const MIN_OPTIONS: usize = 2;

/// Messages keyed by the request field they belong to, so a form can render
/// them inline.
#[derive(Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_owned())
            .or_insert_with(Vec::new)
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[cfg(test)]
    pub fn field(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(|m| m.as_slice())
    }

    fn into_result<T>(self, ok: T) -> Result<T, ValidationErrors> {
        if self.is_empty() {
            Ok(ok)
        } else {
            Err(self)
        }
    }
}

pub fn validate_question(question: &str, errors: &mut ValidationErrors) {
    if question.chars().count() < MIN_QUESTION_LEN {
        errors.add("question", format!("Question must be at least {} characters", MIN_QUESTION_LEN));
    }
}

/// Checks a poll creation or edit payload before anything touches storage.
pub fn validate_poll(request: &PollRequest) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();

    validate_question(&request.question, &mut errors);

    if request.options.len() < MIN_OPTIONS {
        errors.add("options", format!("At least {} options are required", MIN_OPTIONS));
    }
    for (i, option) in request.options.iter().enumerate() {
        if option.is_empty() {
            errors.add(&format!("options.{}", i), "Option must not be empty");
        }
    }
    if let Some(duplicate) = util::first_duplicate(request.options.iter()) {
        errors.add("options", format!("Duplicate option: [{}]", duplicate));
    }

    if let (Some(starts_at), Some(ends_at)) = (request.starts_at, request.ends_at) {
        if ends_at <= starts_at {
            errors.add("ends_at", "End date must be after the start date");
        }
    }

    errors.into_result(())
}

fn parse_id(field: &str, value: &str, errors: &mut ValidationErrors) -> Option<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| errors.add(field, format!("Invalid identifier: [{}]", value)))
        .ok()
}

pub fn validate_vote(poll_id: &str, option_id: &str) -> Result<(Uuid, Uuid), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    let poll_id = parse_id("poll_id", poll_id, &mut errors);
    let option_id = parse_id("option_id", option_id, &mut errors);

    match (poll_id, option_id) {
        (Some(poll_id), Some(option_id)) => Ok((poll_id, option_id)),
        _ => Err(errors),
    }
}

pub fn validate_poll_id(poll_id: &str) -> Result<Uuid, ValidationErrors> {
    let mut errors = ValidationErrors::default();
    parse_id("poll_id", poll_id, &mut errors)
        .ok_or(errors)
}
