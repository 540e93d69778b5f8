// File: src/model/adapter.rs
// Translates between model types and the document store's typed JSON
// values ({"stringValue": ...}, {"timestampValue": ...}, ...).
use crate::model::course::{Course, UserProfile};
use crate::model::item::{Priority, Task, TaskDraft, TaskStatus, TaskUpdate};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde_json::{Map, Value, json};
use std::str::FromStr;

// --- VALUE ENCODING ---

pub fn string_value(s: &str) -> Value {
    json!({ "stringValue": s })
}

pub fn timestamp_value(dt: DateTime<Utc>) -> Value {
    json!({ "timestampValue": dt.to_rfc3339_opts(SecondsFormat::Secs, true) })
}

pub fn null_value() -> Value {
    json!({ "nullValue": null })
}

pub fn string_array_value<'a, I: IntoIterator<Item = &'a str>>(items: I) -> Value {
    let values: Vec<Value> = items.into_iter().map(string_value).collect();
    json!({ "arrayValue": { "values": values } })
}

// --- VALUE DECODING ---

pub fn decode_string(v: &Value) -> Option<String> {
    v.get("stringValue")?.as_str().map(|s| s.to_string())
}

/// Inbound dates arrive either as a wire timestamp value or as a plain
/// string some other client wrote. Both normalize to the canonical
/// instant here; nothing past this point sees a raw representation.
pub fn decode_instant(v: &Value) -> Option<DateTime<Utc>> {
    if let Some(ts) = v.get("timestampValue").and_then(|t| t.as_str()) {
        return parse_instant(ts);
    }
    if let Some(s) = v.get("stringValue").and_then(|t| t.as_str()) {
        return parse_instant(s);
    }
    None
}

fn parse_instant(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }
    None
}

pub fn decode_string_array(v: &Value) -> Vec<String> {
    v.get("arrayValue")
        .and_then(|a| a.get("values"))
        .and_then(|vals| vals.as_array())
        .map(|vals| vals.iter().filter_map(decode_string).collect())
        .unwrap_or_default()
}

// --- DOCUMENT NAMES ---

/// Last path segment of a document name:
/// ".../documents/courses/c1/tasks/t9" -> "t9".
pub fn document_id(name: &str) -> String {
    name.rsplit('/').next().unwrap_or(name).to_string()
}

/// Owning course id for a task document name, i.e. the segment following
/// "courses". Tasks fetched through the cross-course query carry their
/// course only in the name.
pub fn parent_course_id(name: &str) -> Option<String> {
    let mut segments = name.split('/');
    while let Some(seg) = segments.next() {
        if seg == "courses" {
            return segments.next().map(|s| s.to_string());
        }
    }
    None
}

// --- TASKS ---

pub fn task_from_document(name: &str, fields: &Value) -> Option<Task> {
    let course_id = parent_course_id(name)?;
    let title = fields.get("title").and_then(|v| decode_string(v))?;

    let status = fields
        .get("status")
        .and_then(|v| decode_string(v))
        .and_then(|s| TaskStatus::from_str(&s).ok())
        .unwrap_or(TaskStatus::Pending);
    let priority = fields
        .get("priority")
        .and_then(|v| decode_string(v))
        .and_then(|s| Priority::from_str(&s).ok())
        .unwrap_or_default();

    Some(Task {
        id: document_id(name),
        course_id,
        title,
        description: fields
            .get("description")
            .and_then(|v| decode_string(v))
            .unwrap_or_default(),
        status,
        priority,
        due: fields.get("dueDate").and_then(decode_instant),
        assigned_to: fields.get("assignedTo").and_then(|v| decode_string(v)),
        // Rows written without a creation stamp sort with the oldest
        // instead of disappearing.
        created_at: fields
            .get("createdAt")
            .and_then(decode_instant)
            .unwrap_or(DateTime::UNIX_EPOCH),
    })
}

pub fn draft_to_fields(draft: &TaskDraft) -> Value {
    let mut fields = Map::new();
    fields.insert("title".into(), string_value(&draft.title));
    fields.insert("description".into(), string_value(&draft.description));
    fields.insert(
        "status".into(),
        string_value(&draft.status().to_string()),
    );
    fields.insert("priority".into(), string_value(&draft.priority.to_string()));
    fields.insert(
        "dueDate".into(),
        match draft.due {
            Some(due) => timestamp_value(due),
            None => null_value(),
        },
    );
    fields.insert(
        "assignedTo".into(),
        match &draft.assigned_to {
            Some(uid) => string_value(uid),
            None => null_value(),
        },
    );
    fields.insert("createdAt".into(), timestamp_value(draft.created_at));
    json!({ "fields": fields })
}

/// Encodes a partial update plus the field mask naming exactly the
/// fields being written.
pub fn update_to_fields(patch: &TaskUpdate) -> (Value, Vec<&'static str>) {
    let mut fields = Map::new();
    let mut mask = Vec::new();

    if let Some(title) = &patch.title {
        fields.insert("title".into(), string_value(title));
        mask.push("title");
    }
    if let Some(description) = &patch.description {
        fields.insert("description".into(), string_value(description));
        mask.push("description");
    }
    if let Some(due) = &patch.due {
        fields.insert(
            "dueDate".into(),
            match due {
                Some(dt) => timestamp_value(*dt),
                None => null_value(),
            },
        );
        mask.push("dueDate");
    }
    if let Some(priority) = &patch.priority {
        fields.insert("priority".into(), string_value(&priority.to_string()));
        mask.push("priority");
    }
    if let Some(assigned) = &patch.assigned_to {
        fields.insert(
            "assignedTo".into(),
            match assigned {
                Some(uid) => string_value(uid),
                None => null_value(),
            },
        );
        mask.push("assignedTo");
    }
    if let Some(status) = &patch.status {
        fields.insert("status".into(), string_value(&status.to_string()));
        mask.push("status");
    }

    (json!({ "fields": fields }), mask)
}

// --- COURSES ---

pub fn course_from_document(name: &str, fields: &Value) -> Option<Course> {
    Some(Course {
        id: document_id(name),
        title: fields.get("title").and_then(|v| decode_string(v))?,
        members: fields
            .get("members")
            .map(decode_string_array)
            .unwrap_or_default(),
    })
}

// --- USER PROFILES ---

pub fn profile_from_document(name: &str, fields: &Value) -> Option<UserProfile> {
    Some(UserProfile {
        id: document_id(name),
        email: fields
            .get("email")
            .and_then(|v| decode_string(v))
            .unwrap_or_default(),
        display_name: fields
            .get("displayName")
            .and_then(|v| decode_string(v))
            .unwrap_or_default(),
    })
}

pub fn profile_to_fields(email: &str, display_name: &str, created_at: DateTime<Utc>) -> Value {
    json!({
        "fields": {
            "email": string_value(email),
            "displayName": string_value(display_name),
            "createdAt": timestamp_value(created_at),
        }
    })
}
