//! Measurement records shipped to archival endpoints.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::catalog::TestCategory;
use crate::hostspec::NodeRef;
use crate::matrix::Direction;

/// One normalized measurement, ready for delivery. The category selects
/// the archival route and is not part of the serialized body; everything
/// else is. `upsert` is always true so a re-delivered record overwrites
/// the server-side state sharing its logical key instead of duplicating it.
#[derive(Debug, Clone, Serialize)]
pub struct MeasurementRecord {
    #[serde(skip)]
    pub category: TestCategory,
    pub src: NodeRef,
    pub dst: NodeRef,
    pub direction: Direction,
    pub raw: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    pub upsert: bool,
}

impl MeasurementRecord {
    pub fn new(
        category: TestCategory,
        src: NodeRef,
        dst: NodeRef,
        direction: Direction,
        raw: Value,
    ) -> Self {
        Self {
            category,
            src,
            dst,
            direction,
            raw,
            ts: None,
            run_id: None,
            upsert: true,
        }
    }

    pub fn with_ts(mut self, ts: DateTime<Utc>) -> Self {
        self.ts = Some(ts);
        self
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serialized_body_shape() {
        let record = MeasurementRecord::new(
            TestCategory::Rtt,
            NodeRef::new("10.0.0.1", "src-node"),
            NodeRef::new("10.0.0.2", "dst-node"),
            Direction::Reverse,
            json!({"min_rtt": 1.2}),
        )
        .with_run_id("run-20260823-101500Z");

        let body = serde_json::to_value(&record).unwrap();
        assert_eq!(body["src"]["ip"], "10.0.0.1");
        assert_eq!(body["dst"]["name"], "dst-node");
        assert_eq!(body["direction"], "reverse");
        assert_eq!(body["raw"]["min_rtt"], 1.2);
        assert_eq!(body["run_id"], "run-20260823-101500Z");
        assert_eq!(body["upsert"], true);
        // Optional ts is omitted, category never serializes.
        assert!(body.get("ts").is_none());
        assert!(body.get("category").is_none());
    }
}
