use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// A named planning marker on the song timeline. Independent of effects.
#[derive(TS, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "plans.ts")]
pub struct PlanMarker {
    pub id: String,
    pub name: String,
    pub start: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<f32>,
    #[serde(default)]
    pub description: String,
    pub created_at: String,
}
