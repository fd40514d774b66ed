//! Test matrix resolution.
//!
//! Expands a tool-selection policy over the requested categories into the
//! concrete list of invocations to run against each target. Resolution is
//! deterministic: categories in caller order, tools in catalog order, a
//! forward invocation always before its reverse twin.

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

use crate::catalog::{TestCategory, ToolCatalog};

/// Tool-selection policy applied uniformly across all categories in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ToolMode {
    /// Omit the tool flag entirely and let the scheduler auto-select.
    Auto,
    /// Run every supported tool of each category.
    All,
    /// Run only the tools named on the command line.
    Subset,
}

/// Measurement direction relative to the local host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Forward,
    Reverse,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Reverse => "reverse",
        }
    }

    pub fn is_reverse(&self) -> bool {
        matches!(self, Direction::Reverse)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One planned invocation, not yet bound to a target host. `tool` is None
/// in auto mode, in which case the scheduler performs its own selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationPlan {
    pub category: TestCategory,
    pub tool: Option<String>,
    pub direction: Direction,
}

impl InvocationPlan {
    /// Tag used in output file names when no tool is pinned.
    pub fn tool_tag(&self) -> &str {
        self.tool.as_deref().unwrap_or("auto")
    }
}

/// A category skipped because the requested subset matched none of its
/// supported tools. Reported, never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubsetSkip {
    pub category: TestCategory,
    pub requested: Vec<String>,
}

/// Result of matrix resolution: the invocation plans plus any category
/// skips to surface as warnings.
#[derive(Debug, Default)]
pub struct Matrix {
    pub plans: Vec<InvocationPlan>,
    pub skips: Vec<SubsetSkip>,
}

/// Expand `(categories, mode)` into concrete invocation plans.
///
/// In `auto` mode one plan per category is emitted with no tool pinned.
/// `all` emits one plan per supported tool, preserving catalog order.
/// `subset` intersects the category's tools with `subset_tools` and skips
/// the category (with a recorded warning) when the intersection is empty.
/// When `reverse_requested` is set, every plan in a reverse-supporting
/// category gains a reverse twin directly after its forward plan, except
/// tools marked reverse-incapable.
pub fn resolve_matrix(
    catalog: &ToolCatalog,
    categories: &[TestCategory],
    mode: ToolMode,
    subset_tools: &[String],
    reverse_requested: bool,
) -> Matrix {
    let subset: BTreeSet<&str> = subset_tools.iter().map(String::as_str).collect();
    let mut matrix = Matrix::default();

    for &category in categories {
        let entry = catalog.entry(category);
        let reverse_here = reverse_requested && category.supports_reverse();

        match mode {
            ToolMode::Auto => {
                matrix.plans.push(InvocationPlan {
                    category,
                    tool: None,
                    direction: Direction::Forward,
                });
                if reverse_here {
                    matrix.plans.push(InvocationPlan {
                        category,
                        tool: None,
                        direction: Direction::Reverse,
                    });
                }
            }
            ToolMode::All | ToolMode::Subset => {
                let chosen: Vec<_> = entry
                    .tools
                    .iter()
                    .filter(|t| mode == ToolMode::All || subset.contains(t.name))
                    .collect();

                if mode == ToolMode::Subset && chosen.is_empty() {
                    log::warn!(
                        "No matching tools for category '{}' with subset {:?}; skipping",
                        category,
                        subset_tools
                    );
                    matrix.skips.push(SubsetSkip {
                        category,
                        requested: subset_tools.to_vec(),
                    });
                    continue;
                }

                for tool in chosen {
                    matrix.plans.push(InvocationPlan {
                        category,
                        tool: Some(tool.name.to_string()),
                        direction: Direction::Forward,
                    });
                    if reverse_here && tool.reverse_capable {
                        matrix.plans.push(InvocationPlan {
                            category,
                            tool: Some(tool.name.to_string()),
                            direction: Direction::Reverse,
                        });
                    }
                }
            }
        }
    }

    matrix
}
