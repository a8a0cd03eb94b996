//! Interactive decision layer.
//!
//! After a run that produced tool results, the operator chooses whether to
//! commit the turn, run it again, or throw it away. In manual approval
//! mode, each incoming tool call additionally gets an approve/reject/skip
//! prompt before its arguments are acted on.

use std::io::{stdout, BufRead, Write};

/// Decision over a completed run's results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunDecision {
    /// Commit the assistant turn (including tool calls) to history.
    Apply,
    /// Discard and re-issue the same input under a fresh run id.
    Regenerate,
    /// Discard without committing.
    Cancel,
}

/// Decision over one incoming tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolDecision {
    /// Let the call proceed.
    Approve,
    /// Terminate the run locally.
    Reject,
    /// Ignore this call but keep the run going.
    Skip,
}

/// How tool calls are approved during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApprovalMode {
    /// Every call is approved silently.
    #[default]
    Auto,
    /// Every call goes through the prompter.
    Manual,
}

/// Prompt implementations for the decision layer.
pub trait DecisionPrompter: Send + Sync {
    /// Prompt after a run with tool results.
    fn decide_run(&self, tool_call_count: usize) -> RunDecision;

    /// Prompt for one tool call in manual approval mode.
    fn decide_tool(&self, tool_name: &str, tool_call_id: &str) -> ToolDecision;
}

/// Stdin-backed prompter with single-letter answers.
pub struct StdinPrompter;

impl DecisionPrompter for StdinPrompter {
    fn decide_run(&self, tool_call_count: usize) -> RunDecision {
        println!("│");
        println!(
            "│  \x1b[33m{} tool call(s) completed.\x1b[0m  \x1b[2m(a)pply  (r)egenerate  (c)ancel\x1b[0m",
            tool_call_count
        );

        loop {
            print!("│  > ");
            let _ = stdout().flush();

            match read_input().trim().to_lowercase().as_str() {
                "a" | "apply" => return RunDecision::Apply,
                "r" | "regenerate" => return RunDecision::Regenerate,
                "c" | "cancel" => return RunDecision::Cancel,
                "" => continue,
                _ => println!("│  \x1b[31mUse a/r/c\x1b[0m"),
            }
        }
    }

    fn decide_tool(&self, tool_name: &str, _tool_call_id: &str) -> ToolDecision {
        println!("│");
        println!(
            "│  \x1b[33mTool call: {}\x1b[0m  \x1b[2m(y)es  (n)o  (s)kip\x1b[0m",
            tool_name
        );

        loop {
            print!("│  > ");
            let _ = stdout().flush();

            match read_input().trim().to_lowercase().as_str() {
                "y" | "yes" | "approve" => return ToolDecision::Approve,
                "n" | "no" | "reject" => return ToolDecision::Reject,
                "s" | "skip" => return ToolDecision::Skip,
                "" => continue,
                _ => println!("│  \x1b[31mUse y/n/s\x1b[0m"),
            }
        }
    }
}

/// Read a line of input from stdin.
pub fn read_input() -> String {
    let stdin = std::io::stdin();
    let mut line = String::new();
    let _ = stdin.lock().read_line(&mut line);
    line
}

/// Scripted prompter for tests and non-interactive automation.
pub struct ScriptedPrompter {
    run_decisions: std::sync::Mutex<Vec<RunDecision>>,
    tool_decisions: std::sync::Mutex<Vec<ToolDecision>>,
}

impl ScriptedPrompter {
    /// Answers are consumed front to back; when a script runs dry the
    /// prompter falls back to Apply/Approve.
    pub fn new(run_decisions: Vec<RunDecision>, tool_decisions: Vec<ToolDecision>) -> Self {
        Self {
            run_decisions: std::sync::Mutex::new(run_decisions),
            tool_decisions: std::sync::Mutex::new(tool_decisions),
        }
    }
}

impl DecisionPrompter for ScriptedPrompter {
    fn decide_run(&self, _tool_call_count: usize) -> RunDecision {
        let mut script = self.run_decisions.lock().expect("prompter lock poisoned");
        if script.is_empty() {
            RunDecision::Apply
        } else {
            script.remove(0)
        }
    }

    fn decide_tool(&self, _tool_name: &str, _tool_call_id: &str) -> ToolDecision {
        let mut script = self.tool_decisions.lock().expect("prompter lock poisoned");
        if script.is_empty() {
            ToolDecision::Approve
        } else {
            script.remove(0)
        }
    }
}
