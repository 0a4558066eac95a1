use super::gate::ReviewGate;
use super::types::{PendingRequestData, ReviewOutcome};
use crate::events::Subscription;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Terminal reviewer: shows each queue head on stderr and reads the
/// decision from stdin.
pub struct ConsoleReviewer {
    gate: Arc<ReviewGate>,
}

/// Running console reviewer. Stop it once no more requests can arrive.
pub struct ReviewerTask {
    subscription: Subscription,
    handle: JoinHandle<()>,
}

impl ReviewerTask {
    pub async fn stop(self) {
        self.subscription.unsubscribe();
        self.handle.abort();
        let _ = self.handle.await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Choice {
    Approve,
    Edit,
    Reject,
}

impl ConsoleReviewer {
    pub fn new(gate: Arc<ReviewGate>) -> Self {
        Self { gate }
    }

    pub fn spawn(self) -> ReviewerTask {
        let (tx, mut rx) = mpsc::unbounded_channel::<PendingRequestData>();
        let subscription = self.gate.subscribe_to_pending_requests(move |head| {
            if let Some(request) = head {
                let _ = tx.send(request.clone());
            }
        });

        let gate = self.gate;
        let handle = tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                // A head may have been settled elsewhere while queued here.
                let still_head = gate
                    .current_request()
                    .is_some_and(|head| head.id == request.id);
                if !still_head {
                    continue;
                }

                let decision = ask(request.clone()).await;
                apply_decision(&gate, &request, decision);
            }
        });

        ReviewerTask {
            subscription,
            handle,
        }
    }
}

/// Settles `request` with the reviewer's decision; unreadable input rejects.
/// Returns `false` when the request was settled elsewhere in the meantime.
fn apply_decision(
    gate: &ReviewGate,
    request: &PendingRequestData,
    decision: anyhow::Result<ReviewOutcome>,
) -> bool {
    let outcome = decision.unwrap_or_else(|e| {
        tracing::warn!(id = %request.id, "review input failed, rejecting: {e}");
        ReviewOutcome::Rejected
    });
    let settled = gate.settle(&request.id, outcome);
    if !settled {
        tracing::debug!(
            id = %request.id,
            title = %request.title,
            "request settled elsewhere while waiting for input; decision dropped"
        );
    }
    settled
}

async fn ask(request: PendingRequestData) -> anyhow::Result<ReviewOutcome> {
    // stdin is blocking
    let outcome = tokio::task::spawn_blocking(move || {
        let stdin = io::stdin();
        let mut input = stdin.lock();
        prompt_for_outcome(&mut input, &mut io::stderr(), &request)
    })
    .await??;
    Ok(outcome)
}

fn prompt_for_outcome<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    request: &PendingRequestData,
) -> io::Result<ReviewOutcome> {
    writeln!(output)?;
    writeln!(output, "┌─ Review Required ────────────────────────────────")?;
    writeln!(output, "│ {}", request.title)?;
    writeln!(output, "├──────────────────────────────────────────────────")?;
    for line in request.prompt.lines() {
        writeln!(output, "│ {line}")?;
    }
    writeln!(output, "├──────────────────────────────────────────────────")?;
    writeln!(output, "│ [A]pprove  [E]dit  [R]eject")?;
    writeln!(output, "└──────────────────────────────────────────────────")?;

    loop {
        write!(output, "  > ")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            // Reviewer closed stdin; nothing will approve this.
            return Ok(ReviewOutcome::Rejected);
        }

        match parse_choice(&line) {
            Some(Choice::Approve) => return Ok(ReviewOutcome::Approved(request.prompt.clone())),
            Some(Choice::Reject) => return Ok(ReviewOutcome::Rejected),
            Some(Choice::Edit) => {
                writeln!(output, "  Enter the replacement, then a line with a single '.'")?;
                let edited = read_replacement(input)?;
                return Ok(ReviewOutcome::Approved(
                    edited.unwrap_or_else(|| request.prompt.clone()),
                ));
            }
            None => writeln!(output, "  unrecognized input: '{}'", line.trim())?,
        }
    }
}

fn parse_choice(line: &str) -> Option<Choice> {
    match line.trim().chars().next()?.to_ascii_lowercase() {
        'a' => Some(Choice::Approve),
        'e' => Some(Choice::Edit),
        'r' => Some(Choice::Reject),
        _ => None,
    }
}

/// Reads lines up to a lone `.` or EOF. `None` when nothing was entered.
fn read_replacement<R: BufRead>(input: &mut R) -> io::Result<Option<String>> {
    let mut lines = Vec::new();
    for line in input.lines() {
        let line = line?;
        if line.trim_end() == "." {
            break;
        }
        lines.push(line);
    }
    let text = lines.join("\n");
    Ok((!text.trim().is_empty()).then_some(text))
}
