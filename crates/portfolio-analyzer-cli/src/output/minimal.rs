use serde_json::Value;

/// Print just the key answer value from the output.
///
/// Heuristic: look for well-known result fields in order of priority,
/// then fall back to the first field in the result object.
pub fn print_minimal(value: &Value) {
    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    // Priority list of key output fields, including one level down for
    // `stats`, `fee_analysis` and `with_fees`.
    let priority_keys = [
        "final_portfolio_value",
        "annual_savings",
        "total_return",
        "annualized_return",
        "risk_adjusted_return",
        "max_drawdown",
    ];
    let nested = ["fee_analysis", "stats", "with_fees"];

    if let Value::Object(map) = result_obj {
        let scopes = std::iter::once(map).chain(nested.iter().filter_map(|k| map.get(*k).and_then(Value::as_object)));
        for scope in scopes {
            for key in &priority_keys {
                if let Some(val) = scope.get(*key) {
                    if !val.is_null() {
                        println!("{}", format_minimal(val));
                        return;
                    }
                }
            }
        }

        if let Some((key, val)) = map.iter().next() {
            println!("{}: {}", key, format_minimal(val));
            return;
        }
    }

    println!("{}", format_minimal(result_obj));
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
