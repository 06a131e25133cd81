use std::fmt::Display;

use serde::Serialize;

/// Emit a command result as pretty-printed JSON to stdout.
pub fn report_json<T: Serialize + ?Sized>(label: &str, value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{label}:\n{json}"),
        Err(e) => println!("{label}: <unserializable: {e}>"),
    }
}

/// Emit each item as a single JSON line to stdout.
pub fn report_lines<T: Serialize>(items: &[T]) {
    for item in items {
        if let Ok(json) = serde_json::to_string(item) {
            println!("{json}");
        }
    }
}

/// Emit the hash of a submitted transaction.
pub fn report_tx(label: &str, tx_hash: impl Display) {
    println!("{label} tx hash: {tx_hash}");
}
