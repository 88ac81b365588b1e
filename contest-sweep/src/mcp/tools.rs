use serde_json::{Value, json};

pub struct Tool {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

pub fn get_tools() -> Vec<Tool> {
    vec![
        Tool {
            name: "sweep_status".into(),
            description: "Check browser extension connection and page readiness.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        },
        Tool {
            name: "sweep_open_profile".into(),
            description: "Open a Codolio profile and wait until its rating chart is rendered. \
                          With platform, opens that platform's single-chart view."
                .into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "username": { "type": "string", "description": "Profile username" },
                    "platform": { "type": "string", "description": "Platform sub-view, e.g. 'leetcode'" }
                },
                "required": ["username"]
            }),
        },
        Tool {
            name: "sweep_read_panel".into(),
            description: "Read the chart's info panel as it is right now.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        },
        Tool {
            name: "sweep_platform".into(),
            description: "Activate one platform tab and sweep its chart. Returns {key: series}.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "label": { "type": "string", "description": "Tab text, e.g. 'CodeChef'" },
                    "key": { "type": "string", "description": "Output key (default: configured key or label)" }
                },
                "required": ["label"]
            }),
        },
        Tool {
            name: "sweep_profile".into(),
            description: "Sweep every configured platform tab of the open profile.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "platforms": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Only these platforms (labels or keys)"
                    }
                },
                "required": []
            }),
        },
        Tool {
            name: "sweep_current".into(),
            description: "Sweep the chart as displayed, without switching tabs. Returns {contest_history: series}."
                .into(),
            input_schema: json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        },
    ]
}
