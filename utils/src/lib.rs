use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessGuardError {
    #[error("failed to execute pidof: {0}")]
    Pidof(#[from] std::io::Error),
    #[error("Cannot run {name} concurrently. Already running with PIDs: {}", join_pids(.pids))]
    AlreadyRunning { name: String, pids: Vec<u32> },
}

fn join_pids(pids: &[u32]) -> String {
    pids.iter()
        .map(|pid| pid.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn check_no_concurrent_processes(name: &str) -> Result<(), ProcessGuardError> {
    use std::collections::BTreeSet;
    use std::process::Command;

    // Get the PID of this process
    let my_pid = std::process::id();

    // Run pidof to get the PIDs of all processes with the given name.
    let pidof_output = Command::new("pidof").arg(name).output()?;

    // See if there are any matching PIDs other than this processe's PID.
    let mut pids: BTreeSet<u32> = String::from_utf8_lossy(&pidof_output.stdout)
        .split_whitespace()
        .filter_map(|s| s.parse::<u32>().ok())
        .collect();
    pids.remove(&my_pid);

    if !pids.is_empty() {
        return Err(ProcessGuardError::AlreadyRunning {
            name: name.to_owned(),
            pids: pids.into_iter().collect(),
        });
    }
    Ok(())
}

/// Borrowing field access on a JSON object, treating `null` the same as a missing key.
pub trait FieldAs {
    fn field(&self, key: &str) -> Option<&Value>;

    fn field_as<'a, T>(&'a self, key: &str) -> Option<Result<T, serde_json::Error>>
    where
        T: Deserialize<'a>,
    {
        self.field(key).map(|v| T::deserialize(v))
    }
}

impl FieldAs for Map<String, Value> {
    fn field(&self, key: &str) -> Option<&Value> {
        self.get(key).and_then(FilterJsonCases::non_null)
    }
}

pub trait FilterJsonCases {
    fn non_null(&self) -> Option<&Self>;
}

impl FilterJsonCases for Value {
    fn non_null(&self) -> Option<&Self> {
        match self {
            Value::Null => None,
            _ => Some(self),
        }
    }
}
