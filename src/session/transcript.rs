use crate::session::record::Turn;
use std::collections::HashSet;
use tracing::warn;

/// Outcome of a transcript repair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairReport {
    /// Index of the offending turn; everything from here on was dropped.
    pub truncated_at: usize,
    pub dropped: usize,
    /// Whether the latest user turn was re-added after truncation.
    pub user_readded: bool,
}

/// Index of the first turn that breaks tool-call pairing, if any.
///
/// An assistant turn with N tool calls must be followed immediately by N tool
/// turns whose ids equal the call ids as a set. A tool turn outside such a
/// block is also a violation.
pub fn first_violation(turns: &[Turn]) -> Option<usize> {
    let mut i = 0;
    while i < turns.len() {
        match &turns[i] {
            Turn::Assistant { tool_calls, .. } if !tool_calls.is_empty() => {
                let expected: HashSet<&str> = tool_calls.iter().map(|c| c.id.as_str()).collect();
                if expected.len() != tool_calls.len() {
                    return Some(i);
                }
                let n = tool_calls.len();
                let Some(block) = turns.get(i + 1..i + 1 + n) else {
                    return Some(i);
                };
                let mut seen = HashSet::new();
                for turn in block {
                    match turn {
                        Turn::Tool { tool_call_id, .. }
                            if expected.contains(tool_call_id.as_str()) =>
                        {
                            seen.insert(tool_call_id.as_str());
                        }
                        _ => return Some(i),
                    }
                }
                if seen.len() != n {
                    return Some(i);
                }
                i += n + 1;
            }
            Turn::Tool { .. } => return Some(i),
            _ => i += 1,
        }
    }
    None
}

pub fn is_valid(turns: &[Turn]) -> bool {
    first_violation(turns).is_none()
}

/// Truncate the transcript at the first pairing violation. If the dropped
/// suffix contained the newest user turn, it is re-appended so the current
/// input is not lost.
pub fn repair(turns: &mut Vec<Turn>) -> Option<RepairReport> {
    let at = first_violation(turns)?;
    let latest_user = turns[at..].iter().rev().find(|t| t.is_user()).cloned();
    let dropped = turns.len() - at;
    turns.truncate(at);
    let user_readded = if let Some(user) = latest_user {
        turns.push(user);
        true
    } else {
        false
    };
    warn!(
        "transcript repaired: truncated at turn {} ({} turns dropped)",
        at, dropped
    );
    Some(RepairReport {
        truncated_at: at,
        dropped,
        user_readded,
    })
}

/// Keep at most `max_user` user turns and `max_assistant` assistant turns,
/// newest first. The kept tail never starts with orphaned tool results and
/// never ends inside an unanswered tool-call block.
pub fn bound_tail(turns: &mut Vec<Turn>, max_user: usize, max_assistant: usize) {
    let mut users = 0;
    let mut assistants = 0;
    let mut start = 0;
    for (i, turn) in turns.iter().enumerate().rev() {
        match turn {
            Turn::User { .. } => users += 1,
            Turn::Assistant { .. } => assistants += 1,
            _ => {}
        }
        if users > max_user || assistants > max_assistant {
            start = i + 1;
            break;
        }
    }
    while start < turns.len() && turns[start].is_tool() {
        start += 1;
    }
    if start > 0 {
        turns.drain(..start);
    }
    repair(turns);
}
