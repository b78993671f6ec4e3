use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("registry root has no update_seq field: {0}")]
    MissingUpdateSeq(Value),
    #[error("update_seq is not a sequence number: {0}")]
    BadUpdateSeq(Value),
}

/// Reads the numeric position out of a feed sequence value.
///
/// Older CouchDB feeds use plain integers; newer ones use opaque strings that start
/// with the integer (`"123-g1AAAA..."`).
pub fn sequence_number(seq: &Value) -> Option<u64> {
    match seq {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.split('-').next().and_then(|n| n.parse().ok()),
        _ => None,
    }
}

/// Fetches the feed's current last sequence. The run stops once it gets there.
pub async fn fetch_end_sequence(
    client: &reqwest::Client,
    root_url: &str,
) -> Result<u64, ResolveError> {
    let root: Value = client
        .get(root_url)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let update_seq = root
        .get("update_seq")
        .ok_or_else(|| ResolveError::MissingUpdateSeq(root.clone()))?;

    sequence_number(update_seq).ok_or_else(|| ResolveError::BadUpdateSeq(update_seq.clone()))
}
