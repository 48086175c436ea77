//! Splitting the scripted greeting into its three roles

/// One greeting line per role, in streaming order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Greeting {
    pub product_owner: String,
    pub qa: String,
    pub developer: String,
}

/// Split a reply of the form `1. ... 2. ... 3. ...`.
///
/// The leading `1.` marker is optional. Returns `None` unless all three parts
/// are present and non-empty.
pub fn split_greeting(text: &str) -> Option<Greeting> {
    let (first, rest) = text.split_once("2. ")?;
    let (second, third) = rest.split_once("3. ")?;

    let first = first.trim();
    let first = first.strip_prefix("1.").unwrap_or(first).trim();
    let second = second.trim();
    let third = third.trim();

    if first.is_empty() || second.is_empty() || third.is_empty() {
        return None;
    }

    Some(Greeting {
        product_owner: first.to_string(),
        qa: second.to_string(),
        developer: third.to_string(),
    })
}
