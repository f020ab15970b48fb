use colored::Colorize;
use serde_json::Value;
use tabled::{builder::Builder, Table};

/// Format output as tables. Trade lists render as one row per trade;
/// everything else falls back to a field/value table.
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) => {
            if let Some(result) = map.get("result") {
                print_result(result);
            } else {
                print_flat_object(value);
            }
            if let Some(Value::Array(warnings)) = map.get("warnings") {
                for warning in warnings {
                    if let Value::String(w) = warning {
                        eprintln!("{}: {}", "warning".yellow().bold(), w);
                    }
                }
            }
        }
        Value::Array(rows) => print_rows(rows),
        _ => println!("{}", value),
    }
}

fn print_result(result: &Value) {
    match result {
        Value::Object(map) => {
            if let Some(Value::Array(results)) = map.get("strategy_results") {
                for strategy in results {
                    print_strategy(strategy);
                }
                if let Some(Value::Array(netted)) = map.get("netted_trades") {
                    if !netted.is_empty() {
                        println!("{}", "netted trades".bold());
                        print_rows(netted);
                    }
                }
            } else {
                print_flat_object(result);
            }
        }
        Value::Array(rows) => print_rows(rows),
        _ => println!("{}", result),
    }
}

fn print_strategy(strategy: &Value) {
    let id = strategy
        .get("strategy_id")
        .and_then(Value::as_str)
        .unwrap_or("?");
    let status = strategy
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or("?");
    println!("{} [{}]", id.bold(), status);
    if let Some(Value::Array(trades)) = strategy.get("trades") {
        if trades.is_empty() {
            println!("  (no trades)");
        } else {
            print_rows(trades);
        }
    }
}

fn print_rows(rows: &[Value]) {
    if rows.is_empty() {
        return;
    }
    let columns = row_columns(&rows[0]);
    let mut builder = Builder::default();
    builder.push_record(columns.iter().map(String::as_str));
    for row in rows {
        builder.push_record(columns.iter().map(|c| {
            row.get(c)
                .map(format_value)
                .unwrap_or_default()
        }));
    }
    let table = Table::from(builder);
    println!("{}", table);
}

fn row_columns(row: &Value) -> Vec<String> {
    match row {
        Value::Object(map) => map
            .keys()
            .filter(|k| !matches!(row.get(k.as_str()), Some(Value::Object(_))))
            .cloned()
            .collect(),
        _ => vec!["value".to_string()],
    }
}

fn print_flat_object(value: &Value) {
    let Value::Object(map) = value else {
        println!("{}", value);
        return;
    };
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in map {
        builder.push_record([key.as_str(), &format_value(val)]);
    }
    let table = Table::from(builder);
    println!("{}", table);
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
