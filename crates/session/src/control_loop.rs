//! The interactive consolidation loop.
//!
//! Gaps are processed strictly one at a time. Each gap runs a small state
//! machine:
//!
//! 1. **Composing**: key signals edit the context and refresh the estimate
//! 2. **Copied**: the payload was exported; composing continues
//! 3. **Dispatching**: one request is in flight on its own task while the
//!    loop keeps listening for an interrupt
//! 4. **Validated / Failed / Skipped / Aborted**: terminal for the gap
//!
//! The current state lives in a [`GapCursor`]; every move goes through
//! [`ControlLoop::transition`] and is published as a `StateChanged` event.
//!
//! Only an interrupt ends the whole run. Every other failure is isolated
//! to its gap.

use std::sync::Arc;
use std::time::Duration;

use timegap_core::consolidation::{ConsolidationRequest, Consolidator, RawConsolidation};
use timegap_core::error::ProviderError;
use timegap_core::event::{EventBus, GapState, SessionEvent};
use timegap_core::window::Gap;
use timegap_reconcile::{PayloadAssembler, PricingTable, PromptTemplate, ResultValidator, TokenEstimate};
use tokio::sync::{mpsc, oneshot};
use tokio::time::error::Elapsed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clipboard::ClipboardAdapter;
use crate::keyboard::Signal;
use crate::state::{GapCursor, GapOutcome, SessionReport};

type DispatchResult = Result<Result<RawConsolidation, ProviderError>, Elapsed>;

/// Drives every gap of a session through composing, dispatch and validation.
pub struct ControlLoop {
    /// The consolidation service
    consolidator: Arc<dyn Consolidator>,

    /// Where copy signals send the payload
    clipboard: Arc<ClipboardAdapter>,

    /// Builds the per-gap request
    assembler: PayloadAssembler,

    /// Renders requests into the exported/measured prompt
    template: PromptTemplate,

    /// For the cost preview
    pricing: PricingTable,

    /// Blocks shorter than this are dropped by validation
    min_duration: chrono::Duration,

    /// Deadline for one dispatch
    dispatch_timeout: Duration,

    /// Session events for the renderer
    event_bus: Arc<EventBus>,
}

/// How a gap's state machine ended.
enum Step {
    Done(GapOutcome),
    Interrupted(GapOutcome),
}

impl ControlLoop {
    pub fn new(
        consolidator: Arc<dyn Consolidator>,
        clipboard: Arc<ClipboardAdapter>,
        assembler: PayloadAssembler,
        min_duration: chrono::Duration,
        dispatch_timeout: Duration,
    ) -> Self {
        Self {
            consolidator,
            clipboard,
            assembler,
            template: PromptTemplate::builtin(),
            pricing: PricingTable::with_defaults(),
            min_duration,
            dispatch_timeout,
            event_bus: Arc::new(EventBus::default()),
        }
    }

    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    pub fn with_pricing(mut self, pricing: PricingTable) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = event_bus;
        self
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        self.event_bus.clone()
    }

    /// Run every gap in order, reading user signals from `signals`.
    pub async fn run(&self, gaps: &[Gap], signals: &mut mpsc::Receiver<Signal>) -> SessionReport {
        let mut report = SessionReport::default();

        for (index, gap) in gaps.iter().enumerate() {
            let mut cursor = GapCursor::open(index);

            if report.interrupted {
                let outcome =
                    GapOutcome::new(index, gap.span, GapState::Aborted, "session interrupted");
                self.resolve(&mut cursor, &outcome);
                report.outcomes.push(outcome);
                continue;
            }

            let outcome = match self.process_gap(&mut cursor, gaps.len(), gap, signals).await {
                Step::Done(outcome) => outcome,
                Step::Interrupted(outcome) => {
                    report.interrupted = true;
                    outcome
                }
            };
            self.resolve(&mut cursor, &outcome);
            report.outcomes.push(outcome);
        }

        info!(
            gaps = gaps.len(),
            validated = report.count(GapState::Validated),
            interrupted = report.interrupted,
            "Session finished"
        );
        report
    }

    /// Move the gap to `next` and announce it. Disallowed moves are logged
    /// and leave the cursor where it was.
    fn transition(&self, cursor: &mut GapCursor, next: GapState) {
        match cursor.move_to(next) {
            Some(from) => {
                debug!(gap = cursor.index, %from, to = %next, "Gap state changed");
                self.event_bus.publish(SessionEvent::StateChanged {
                    index: cursor.index,
                    from,
                    to: next,
                });
            }
            None => warn!(
                gap = cursor.index,
                from = %cursor.state(),
                to = %next,
                "Ignoring disallowed gap transition"
            ),
        }
    }

    /// Context edits after a copy return the gap to Composing.
    fn resume_composing(&self, cursor: &mut GapCursor) {
        if cursor.state() == GapState::Copied {
            self.transition(cursor, GapState::Composing);
        }
    }

    fn resolve(&self, cursor: &mut GapCursor, outcome: &GapOutcome) {
        self.transition(cursor, outcome.state);
        self.event_bus.publish(SessionEvent::GapResolved {
            index: outcome.index,
            state: outcome.state,
            reason: outcome.reason.clone(),
            blocks: outcome.blocks.len(),
        });
    }

    async fn process_gap(
        &self,
        cursor: &mut GapCursor,
        total: usize,
        gap: &Gap,
        signals: &mut mpsc::Receiver<Signal>,
    ) -> Step {
        let index = cursor.index;
        let mut request = self.assembler.assemble(gap, "");

        self.event_bus.publish(SessionEvent::GapOpened {
            index,
            total,
            span: gap.span,
            sample_count: request.samples.len(),
        });

        if request.samples.is_empty() {
            return Step::Done(GapOutcome::new(
                index,
                gap.span,
                GapState::Skipped,
                "no activity captured",
            ));
        }

        let mut context = String::new();
        let mut estimate = TokenEstimate::for_request(&self.template, &request);
        self.publish_estimate(index, &context, &estimate);

        loop {
            let Some(signal) = signals.recv().await else {
                return Step::Interrupted(GapOutcome::new(
                    index,
                    gap.span,
                    GapState::Aborted,
                    "input closed",
                ));
            };

            match signal {
                Signal::Insert(c) => {
                    self.resume_composing(cursor);
                    context.push(c);
                    estimate.push_char(c);
                    self.publish_estimate(index, &context, &estimate);
                }
                Signal::Paste(text) => {
                    self.resume_composing(cursor);
                    context.push_str(&text);
                    estimate.push_str(&text);
                    self.publish_estimate(index, &context, &estimate);
                }
                Signal::Backspace => {
                    self.resume_composing(cursor);
                    if context.pop().is_some() {
                        estimate.pop_char();
                    }
                    self.publish_estimate(index, &context, &estimate);
                }
                Signal::Copy => {
                    request = self.assembler.assemble(gap, &context);
                    let prompt = self.template.render(&request);
                    let clipboard = self.clipboard.clone();
                    // Helpers are external processes; keep them off the runtime thread.
                    let report =
                        match tokio::task::spawn_blocking(move || clipboard.copy(&prompt)).await {
                            Ok(report) => report,
                            Err(e) => {
                                warn!(gap = index, error = %e, "Clipboard copy did not finish");
                                continue;
                            }
                        };
                    debug!(gap = index, backend = %report.backend, "Payload copied");
                    if cursor.state() != GapState::Copied {
                        self.transition(cursor, GapState::Copied);
                    }
                    self.event_bus.publish(SessionEvent::PayloadCopied {
                        index,
                        backend: report.backend,
                        chars: report.chars,
                    });
                }
                Signal::Submit if context.trim().is_empty() => {
                    return Step::Done(GapOutcome::new(
                        index,
                        gap.span,
                        GapState::Skipped,
                        "empty submission",
                    ));
                }
                Signal::Submit | Signal::Commit => {
                    request = self.assembler.assemble(gap, &context);
                    return self
                        .dispatch(cursor, gap, request, estimate.tokens(), signals)
                        .await;
                }
                Signal::Interrupt => {
                    return Step::Interrupted(GapOutcome::new(
                        index,
                        gap.span,
                        GapState::Aborted,
                        "interrupted",
                    ));
                }
            }
        }
    }

    fn publish_estimate(&self, index: usize, context: &str, estimate: &TokenEstimate) {
        self.event_bus.publish(SessionEvent::ContextEdited {
            index,
            context: context.to_string(),
            tokens: estimate.tokens(),
            cost_usd: estimate.cost_usd(&self.pricing, self.consolidator.model()),
        });
    }

    /// Send one request and wait for it, listening only for an interrupt.
    async fn dispatch(
        &self,
        cursor: &mut GapCursor,
        gap: &Gap,
        request: ConsolidationRequest,
        tokens: usize,
        signals: &mut mpsc::Receiver<Signal>,
    ) -> Step {
        let index = cursor.index;
        self.transition(cursor, GapState::Dispatching);
        info!(gap = index, model = %self.consolidator.model(), tokens, "Dispatching consolidation");
        self.event_bus.publish(SessionEvent::DispatchStarted {
            index,
            model: self.consolidator.model().to_string(),
            tokens,
        });

        let cancel = CancellationToken::new();
        let (tx, mut rx) = oneshot::channel::<DispatchResult>();
        let consolidator = self.consolidator.clone();
        let token = cancel.clone();
        let timeout = self.dispatch_timeout;

        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                result = tokio::time::timeout(timeout, consolidator.consolidate(&request)) => {
                    let _ = tx.send(result);
                }
            }
        });

        let mut listening = true;
        let result = loop {
            tokio::select! {
                biased;

                signal = signals.recv(), if listening => match signal {
                    Some(Signal::Interrupt) => {
                        cancel.cancel();
                        handle.abort();
                        warn!(gap = index, "Dispatch cancelled by interrupt");
                        return Step::Interrupted(GapOutcome::new(
                            index,
                            gap.span,
                            GapState::Aborted,
                            "interrupted during dispatch",
                        ));
                    }
                    Some(Signal::Commit) | Some(Signal::Submit) => {
                        self.event_bus.publish(SessionEvent::DispatchIgnored { index });
                    }
                    Some(_) => {}
                    None => listening = false,
                },

                result = &mut rx => break result,
            }
        };

        let outcome = match result {
            Ok(Ok(Ok(raw))) => self.validate(index, gap, &raw),
            Ok(Ok(Err(e))) => {
                warn!(gap = index, error = %e, "Consolidation failed");
                GapOutcome::new(index, gap.span, GapState::Failed, e.to_string())
            }
            Ok(Err(_)) => {
                warn!(gap = index, timeout_secs = timeout.as_secs(), "Consolidation timed out");
                GapOutcome::new(
                    index,
                    gap.span,
                    GapState::Failed,
                    format!("timed out after {}s", timeout.as_secs()),
                )
            }
            Err(_) => GapOutcome::new(
                index,
                gap.span,
                GapState::Failed,
                "dispatch ended without a result",
            ),
        };
        Step::Done(outcome)
    }

    fn validate(&self, index: usize, gap: &Gap, raw: &RawConsolidation) -> GapOutcome {
        match ResultValidator::new(gap.span, self.min_duration).validate(&raw.content) {
            Ok(blocks) => {
                debug!(gap = index, blocks = blocks.len(), model = %raw.model, "Result validated");
                GapOutcome::validated(index, gap.span, blocks)
            }
            Err(e) => {
                warn!(gap = index, reason = %e, "Rejected consolidation batch");
                GapOutcome::new(index, gap.span, GapState::Failed, format!("malformed result: {e}"))
            }
        }
    }
}
