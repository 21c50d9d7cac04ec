//! Result validation for consolidation responses.
//!
//! The response is untrusted input. It is parsed into either an ordered list
//! of blocks inside the gap or a [`MalformedResult`] rejecting the whole batch.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde_json::{Map, Value};
use timegap_core::consolidation::ConsolidatedBlock;
use timegap_core::error::MalformedResult;
use timegap_core::window::TimeWindow;
use tracing::debug;

const REQUIRED_FIELDS: &[&str] = &[
    "description",
    "start_date",
    "start_time",
    "end_date",
    "end_time",
    "duration",
];

/// Checks one gap's consolidation response.
#[derive(Debug, Clone, Copy)]
pub struct ResultValidator {
    gap: TimeWindow,
    min_duration: Duration,
}

/// A block that passed the schema check, before any clamping.
struct ParsedBlock {
    description: String,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    project: Option<String>,
    task: Option<String>,
}

impl ResultValidator {
    pub fn new(gap: TimeWindow, min_duration: Duration) -> Self {
        Self { gap, min_duration }
    }

    /// Validate a raw response body.
    ///
    /// Order: schema, chronology, containment (clamp), duration floor,
    /// non-overlap. Any failure rejects the whole batch.
    pub fn validate(&self, raw: &str) -> Result<Vec<ConsolidatedBlock>, MalformedResult> {
        let value: Value = serde_json::from_str(strip_fences(raw))
            .map_err(|e| MalformedResult::NotJson(e.to_string()))?;

        let items = match value {
            Value::Array(items) => items,
            Value::Object(mut obj) => match obj.remove("entries") {
                Some(Value::Array(items)) => items,
                Some(_) => {
                    return Err(MalformedResult::UnexpectedShape(
                        "'entries' is not an array".into(),
                    ));
                }
                None => {
                    return Err(MalformedResult::UnexpectedShape(
                        "expected an array or an object with 'entries'".into(),
                    ));
                }
            },
            other => {
                return Err(MalformedResult::UnexpectedShape(format!(
                    "expected an array, got {}",
                    type_name(&other)
                )));
            }
        };

        let parsed = items
            .iter()
            .enumerate()
            .map(|(index, item)| parse_block(index, item))
            .collect::<Result<Vec<_>, _>>()?;

        for (index, block) in parsed.iter().enumerate() {
            if block.end <= block.start {
                return Err(MalformedResult::NonChronological {
                    index,
                    start: block.start.to_rfc3339(),
                    end: block.end.to_rfc3339(),
                });
            }
        }

        let mut blocks: Vec<ConsolidatedBlock> = parsed
            .into_iter()
            .filter_map(|block| {
                let (start, end) = self.gap.clamp(block.start, block.end)?;
                Some(ConsolidatedBlock {
                    description: block.description,
                    start,
                    end,
                    duration: end - start,
                    project: block.project,
                    task: block.task,
                })
            })
            .filter(|block| {
                let keep = block.duration >= self.min_duration;
                if !keep {
                    debug!(description = %block.description, "Dropping block below minimum duration");
                }
                keep
            })
            .collect();

        blocks.sort_by_key(|b| b.start);

        for pair in blocks.windows(2) {
            if pair[1].start < pair[0].end {
                return Err(MalformedResult::Overlap {
                    first: pair[0].description.clone(),
                    second: pair[1].description.clone(),
                });
            }
        }

        Ok(blocks)
    }
}

/// Models like to wrap JSON in markdown code fences.
fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn parse_block(index: usize, item: &Value) -> Result<ParsedBlock, MalformedResult> {
    let obj = item.as_object().ok_or_else(|| {
        MalformedResult::UnexpectedShape(format!("block {index} is {}", type_name(item)))
    })?;

    for field in REQUIRED_FIELDS {
        required_str(index, obj, field)?;
    }

    let description = required_str(index, obj, "description")?.trim().to_string();
    if description.is_empty() {
        return Err(invalid(index, "description", "empty"));
    }

    let start = instant(index, obj, "start_date", "start_time")?;
    let end = instant(index, obj, "end_date", "end_time")?;

    let duration = required_str(index, obj, "duration")?;
    if !is_hms(duration) {
        return Err(invalid(index, "duration", "expected HH:MM:SS"));
    }

    Ok(ParsedBlock {
        description,
        start,
        end,
        project: optional_str(index, obj, "project")?,
        task: optional_str(index, obj, "task")?,
    })
}

fn invalid(index: usize, field: &str, reason: impl Into<String>) -> MalformedResult {
    MalformedResult::InvalidField {
        index,
        field: field.to_string(),
        reason: reason.into(),
    }
}

fn required_str<'a>(
    index: usize,
    obj: &'a Map<String, Value>,
    field: &str,
) -> Result<&'a str, MalformedResult> {
    match obj.get(field) {
        None | Some(Value::Null) => Err(MalformedResult::MissingField {
            index,
            field: field.to_string(),
        }),
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(invalid(
            index,
            field,
            format!("expected a string, got {}", type_name(other)),
        )),
    }
}

fn optional_str(
    index: usize,
    obj: &Map<String, Value>,
    field: &str,
) -> Result<Option<String>, MalformedResult> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
        Some(other) => Err(invalid(
            index,
            field,
            format!("expected a string or null, got {}", type_name(other)),
        )),
    }
}

/// Block dates and times are UTC.
fn instant(
    index: usize,
    obj: &Map<String, Value>,
    date_field: &str,
    time_field: &str,
) -> Result<DateTime<Utc>, MalformedResult> {
    let date = NaiveDate::parse_from_str(required_str(index, obj, date_field)?.trim(), "%Y-%m-%d")
        .map_err(|e| invalid(index, date_field, e.to_string()))?;
    let time = NaiveTime::parse_from_str(required_str(index, obj, time_field)?.trim(), "%H:%M:%S")
        .map_err(|e| invalid(index, time_field, e.to_string()))?;
    Ok(date.and_time(time).and_utc())
}

fn is_hms(s: &str) -> bool {
    let parts: Vec<&str> = s.trim().split(':').collect();
    parts.len() == 3
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
}
