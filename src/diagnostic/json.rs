use crate::source::SourceMap;
use super::Diagnostic;

/// One diagnostic as a single-line JSON object.
pub fn render(d: &Diagnostic) -> String {
    let source_map = d.source.as_deref().map(SourceMap::new);

    let labels: Vec<serde_json::Value> = d.labels.iter().map(|l| {
        let mut obj = serde_json::json!({
            "span": l.span,
            "message": l.message,
        });
        if let Some(map) = &source_map {
            let loc = map.locate(l.span);
            obj["line"] = serde_json::Value::from(loc.line);
            obj["col"] = serde_json::Value::from(loc.col);
        }
        obj
    }).collect();

    let mut obj = serde_json::json!({
        "severity": "error",
        "message": d.message,
        "labels": labels,
        "notes": d.notes,
    });

    if let Some(code) = d.code {
        obj["code"] = serde_json::Value::String(code.to_string());
    }

    if let Some(s) = &d.suggestion {
        obj["suggestion"] = serde_json::Value::String(s.clone());
    }

    serde_json::to_string(&obj).unwrap_or_else(|_| {
        r#"{"severity":"error","message":"internal error serializing diagnostic"}"#.to_string()
    })
}
