//! Command validation.
//!
//! Every shell command passes through here before any process is spawned,
//! including corrective commands synthesized by the self-correction loop.
//! A match yields `BlockedCommand`; blocked commands are never executed and
//! never retried.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ToolError;

struct BlockedPattern {
    regex: Regex,
    reason: &'static str,
}

lazy_static! {
    static ref BUILTIN_PATTERNS: Vec<BlockedPattern> = vec![
        BlockedPattern {
            regex: Regex::new(
                r"\brm\s+(?:-[a-zA-Z]+\s+)*-[a-zA-Z]*r[a-zA-Z]*\s+(?:-[a-zA-Z]+\s+)*(?:/|~)(?:\s|$|\*)"
            )
            .unwrap(),
            reason: "recursive deletion of the filesystem root or home",
        },
        BlockedPattern {
            regex: Regex::new(r"\bmkfs(?:\.\w+)?\b").unwrap(),
            reason: "filesystem formatting",
        },
        BlockedPattern {
            regex: Regex::new(r"(?i)\bformat\s+[a-z]:").unwrap(),
            reason: "disk formatting",
        },
        BlockedPattern {
            regex: Regex::new(r"\bdd\b.*\bof=/dev/").unwrap(),
            reason: "raw write to a block device",
        },
        BlockedPattern {
            regex: Regex::new(r">\s*/dev/(?:sd|hd|nvme|vd)").unwrap(),
            reason: "destructive redirect to a block device",
        },
        BlockedPattern {
            regex: Regex::new(r":\(\)\s*\{\s*:\s*\|\s*:\s*&\s*\}\s*;\s*:").unwrap(),
            reason: "fork bomb",
        },
    ];
}

/// Denylist validator: built-in dangerous patterns plus any extras from
/// configuration.
pub struct CommandValidator {
    extra: Vec<Regex>,
}

impl CommandValidator {
    pub fn new() -> Self {
        Self { extra: Vec::new() }
    }

    /// Add config-supplied patterns on top of the built-in set. Invalid
    /// expressions are rejected rather than silently skipped.
    pub fn with_extra_patterns(patterns: &[String]) -> anyhow::Result<Self> {
        let extra = patterns
            .iter()
            .map(|p| Regex::new(p).map_err(|e| anyhow::anyhow!("invalid blocked pattern '{p}': {e}")))
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self { extra })
    }

    pub fn validate(&self, command: &str) -> Result<(), ToolError> {
        for pattern in BUILTIN_PATTERNS.iter() {
            if pattern.regex.is_match(command) {
                tracing::warn!(command, reason = pattern.reason, "command blocked");
                return Err(ToolError::BlockedCommand {
                    reason: format!("{} ({command})", pattern.reason),
                });
            }
        }
        for regex in &self.extra {
            if regex.is_match(command) {
                tracing::warn!(command, pattern = regex.as_str(), "command blocked");
                return Err(ToolError::BlockedCommand {
                    reason: format!("matched blocked pattern '{}' ({command})", regex),
                });
            }
        }
        Ok(())
    }
}

impl Default for CommandValidator {
    fn default() -> Self {
        Self::new()
    }
}
