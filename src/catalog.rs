//! Test categories and the tool catalog.
//!
//! A category is a logical measurement type grouping one or more
//! interchangeable probe tools. The catalog is an immutable value built
//! once and passed by reference into the matrix resolver and the command
//! synthesizer; nothing mutates it after construction.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical measurement types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TestCategory {
    Latency,
    Rtt,
    Throughput,
    Trace,
    Mtu,
    Clock,
}

impl TestCategory {
    /// All categories in stable declaration order.
    pub const ALL: [TestCategory; 6] = [
        TestCategory::Latency,
        TestCategory::Rtt,
        TestCategory::Throughput,
        TestCategory::Trace,
        TestCategory::Mtu,
        TestCategory::Clock,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TestCategory::Latency => "latency",
            TestCategory::Rtt => "rtt",
            TestCategory::Throughput => "throughput",
            TestCategory::Trace => "trace",
            TestCategory::Mtu => "mtu",
            TestCategory::Clock => "clock",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<TestCategory> {
        match s {
            "latency" => Some(TestCategory::Latency),
            "rtt" => Some(TestCategory::Rtt),
            "throughput" => Some(TestCategory::Throughput),
            "trace" => Some(TestCategory::Trace),
            "mtu" => Some(TestCategory::Mtu),
            "clock" => Some(TestCategory::Clock),
            _ => None,
        }
    }

    /// Archival route for this category. Total over the enum: a new
    /// category does not compile until it gets a route.
    pub fn route(&self) -> &'static str {
        match self {
            TestCategory::Latency => "/api/measurements/latency",
            TestCategory::Rtt => "/api/measurements/rtt",
            TestCategory::Throughput => "/api/measurements/throughput",
            TestCategory::Trace => "/api/measurements/trace",
            TestCategory::Mtu => "/api/measurements/mtu",
            TestCategory::Clock => "/api/measurements/clock",
        }
    }

    /// Whether the category has a meaningful reverse direction. Reverse
    /// requests against other categories are silently ignored.
    pub fn supports_reverse(&self) -> bool {
        matches!(self, TestCategory::Throughput | TestCategory::Latency)
    }
}

impl fmt::Display for TestCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One tool entry in the catalog.
#[derive(Debug, Clone)]
pub struct ToolEntry {
    pub name: &'static str,
    /// Extra arguments appended only when this tool is explicitly selected.
    pub extra_args: &'static [&'static str],
    /// Tools that measure a one-way half trip cannot run in reverse and
    /// must never receive a reverse invocation.
    pub reverse_capable: bool,
}

/// Per-category tool list and invocation extras.
#[derive(Debug, Clone)]
pub struct CategoryEntry {
    pub category: TestCategory,
    pub tools: Vec<ToolEntry>,
    /// Extra arguments appended for every invocation of this category.
    pub extra_args: &'static [&'static str],
}

/// Immutable category → tools / extra-args tables.
#[derive(Debug, Clone)]
pub struct ToolCatalog {
    entries: Vec<CategoryEntry>,
}

impl ToolCatalog {
    /// The builtin catalog. Tool order within a category is significant:
    /// the resolver preserves it when expanding `all` mode.
    pub fn builtin() -> Self {
        fn tool(name: &'static str) -> ToolEntry {
            ToolEntry {
                name,
                extra_args: &[],
                reverse_capable: true,
            }
        }

        let entries = vec![
            CategoryEntry {
                category: TestCategory::Latency,
                tools: vec![
                    tool("owping"),
                    tool("twping"),
                    ToolEntry {
                        name: "halfping",
                        extra_args: &[],
                        reverse_capable: false,
                    },
                ],
                extra_args: &[],
            },
            CategoryEntry {
                category: TestCategory::Rtt,
                tools: vec![tool("ping"), tool("tcpping")],
                extra_args: &[],
            },
            CategoryEntry {
                category: TestCategory::Throughput,
                tools: vec![ToolEntry {
                    name: "iperf3",
                    extra_args: &["-i", "10", "-O", "10"],
                    reverse_capable: true,
                }],
                extra_args: &["-P", "4", "-t", "60"],
            },
            CategoryEntry {
                category: TestCategory::Trace,
                tools: vec![tool("traceroute"), tool("tracepath")],
                extra_args: &[],
            },
            CategoryEntry {
                category: TestCategory::Mtu,
                tools: vec![tool("fwmtu")],
                extra_args: &[],
            },
            CategoryEntry {
                category: TestCategory::Clock,
                tools: vec![tool("psclock")],
                extra_args: &[],
            },
        ];

        Self { entries }
    }

    pub fn entry(&self, category: TestCategory) -> &CategoryEntry {
        // Every category has an entry; builtin() covers the whole enum.
        self.entries
            .iter()
            .find(|e| e.category == category)
            .unwrap_or_else(|| panic!("catalog missing entry for {category}"))
    }

    pub fn entries(&self) -> &[CategoryEntry] {
        &self.entries
    }

    /// Extra args for one tool of a category, empty when the tool has none.
    pub fn tool_extra_args(&self, category: TestCategory, tool: &str) -> &'static [&'static str] {
        self.entry(category)
            .tools
            .iter()
            .find(|t| t.name == tool)
            .map(|t| t.extra_args)
            .unwrap_or(&[])
    }
}
