//! Terminal output: the live session view and the summaries around it.
//!
//! The session view is driven entirely by [`SessionEvent`]s from the event
//! bus. The terminal is in raw mode while it runs, so every line ends in
//! `\r\n` and the prompt line is redrawn in place.

use std::io::{self, Write};
use std::sync::Arc;

use chrono::Local;
use crossterm::cursor::MoveToColumn;
use crossterm::queue;
use crossterm::style::Print;
use crossterm::terminal::{self, Clear, ClearType};
use timegap_core::consolidation::format_hms;
use timegap_core::event::{GapState, SessionEvent};
use timegap_core::window::TimeWindow;
use timegap_session::SessionReport;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use crate::pipeline::Timeline;

const HINT: &str =
    "Type context, Enter to submit (empty skips), Ctrl+E commit, Ctrl+Y copy, Esc quit";

/// Render session events until the bus closes.
pub fn spawn(mut events: broadcast::Receiver<Arc<SessionEvent>>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut out = io::stdout();
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Renderer lagged behind the session");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            let _ = draw(&mut out, &event);
        }
        let _ = out.flush();
    })
}

fn draw(out: &mut impl Write, event: &SessionEvent) -> io::Result<()> {
    match event {
        SessionEvent::ContextEdited {
            context,
            tokens,
            cost_usd,
            ..
        } => {
            let width = terminal::size().map(|(w, _)| w as usize).unwrap_or(80);
            queue!(
                out,
                MoveToColumn(0),
                Clear(ClearType::CurrentLine),
                Print(prompt_line(context, *tokens, *cost_usd, width))
            )?;
        }
        other => {
            if let Some(text) = describe(other) {
                queue!(out, Print("\r\n"))?;
                for line in text.lines() {
                    queue!(out, Print(line), Print("\r\n"))?;
                }
            }
        }
    }
    out.flush()
}

/// The editable prompt line: estimate first so the cursor ends on the text.
pub fn prompt_line(context: &str, tokens: usize, cost_usd: Option<f64>, width: usize) -> String {
    let prefix = format!("[~{tokens} tok{}] > ", format_cost(cost_usd));
    let room = width.saturating_sub(prefix.chars().count() + 1);
    format!("{prefix}{}", tail(context, room))
}

fn format_cost(cost_usd: Option<f64>) -> String {
    match cost_usd {
        Some(cost) => format!(" ${cost:.4}"),
        None => String::new(),
    }
}

/// The last `max` characters of `text`, newlines flattened.
fn tail(text: &str, max: usize) -> String {
    let flat: Vec<char> = text.chars().map(|c| if c == '\n' { ' ' } else { c }).collect();
    let skip = flat.len().saturating_sub(max);
    flat[skip..].iter().collect()
}

/// One-off lines for everything except context edits.
pub fn describe(event: &SessionEvent) -> Option<String> {
    let text = match event {
        SessionEvent::GapOpened {
            index,
            total,
            span,
            sample_count,
        } => format!(
            "Gap {}/{total}  {}  ({sample_count} samples)\n{HINT}",
            index + 1,
            span_label(span)
        ),
        SessionEvent::PayloadCopied { backend, chars, .. } if backend == "memory" => {
            format!("Copied {chars} chars (in-session buffer, no system clipboard)")
        }
        SessionEvent::PayloadCopied { backend, chars, .. } => {
            format!("Copied {chars} chars via {backend}")
        }
        SessionEvent::DispatchStarted { model, tokens, .. } => {
            format!("Consolidating with {model} (~{tokens} tokens)...")
        }
        SessionEvent::DispatchIgnored { .. } => "Already consolidating; Esc aborts".to_string(),
        SessionEvent::GapResolved { state, reason, .. } => format!("{state}: {reason}"),
        SessionEvent::ContextEdited { .. } | SessionEvent::StateChanged { .. } => return None,
    };
    Some(text)
}

fn span_label(span: &TimeWindow) -> String {
    format!(
        "{} - {} ({})",
        span.start().with_timezone(&Local).format("%a %H:%M"),
        span.end().with_timezone(&Local).format("%H:%M"),
        format_hms(span.duration())
    )
}

/// What was fetched and which gaps were found.
pub fn timeline_lines(timeline: &Timeline, new_events: Option<usize>) -> Vec<String> {
    let mut lines = vec![format!("Window   {}", span_label(&timeline.window))];

    for source in &timeline.unavailable {
        lines.push(format!("  ! {source}"));
    }

    let mut events = format!("Events   {}", timeline.events.len());
    if let Some(new) = new_events {
        events.push_str(&format!(" ({new} new since last run)"));
    }
    lines.push(events);
    lines.push(format!(
        "Samples  {} ({} dropped as AFK, {} unparseable)",
        timeline.samples.len(),
        timeline.samples.afk_dropped,
        timeline.samples.rejected.len()
    ));
    lines.push(format!("Tracked  {} entries", timeline.entries.len()));
    lines.push(format!("Gaps     {}", timeline.gaps.len()));

    for (i, gap) in timeline.gaps.iter().enumerate() {
        lines.push(format!(
            "  {:>2}. {}  {} samples",
            i + 1,
            span_label(&gap.span),
            gap.samples.len()
        ));
    }
    lines
}

/// Final per-gap states and the validated blocks.
pub fn report_lines(report: &SessionReport) -> Vec<String> {
    let mut lines = Vec::new();
    if report.interrupted {
        lines.push("Session interrupted.".to_string());
    }

    for outcome in &report.outcomes {
        lines.push(format!(
            "  {:>2}. {}  {:<9}  {}",
            outcome.index + 1,
            span_label(&outcome.span),
            outcome.state.label(),
            outcome.reason
        ));
        for block in &outcome.blocks {
            lines.push(format!(
                "        {} - {}  {}  {}",
                block.start.with_timezone(&Local).format("%H:%M:%S"),
                block.end.with_timezone(&Local).format("%H:%M:%S"),
                format_hms(block.duration),
                block.description
            ));
        }
    }

    lines.push(format!(
        "Validated {}, skipped {}, failed {}, aborted {}",
        report.count(GapState::Validated),
        report.count(GapState::Skipped),
        report.count(GapState::Failed),
        report.count(GapState::Aborted)
    ));
    lines
}
