use uuid::Uuid;

const SPOT_ID_PREFIX: &str = "S-";

pub fn generate_spot_id<F>(mut exists: F) -> String
where
    F: FnMut(&str) -> bool,
{
    loop {
        let candidate = format!("{}{}", SPOT_ID_PREFIX, Uuid::now_v7().simple());
        if !exists(&candidate) {
            return candidate;
        }
    }
}

/// Short form used in terminal output: the last eight characters.
pub fn display_id(id: &str) -> &str {
    let body = id.strip_prefix(SPOT_ID_PREFIX).unwrap_or(id);
    match body.char_indices().rev().nth(7) {
        Some((start, _)) => &body[start..],
        None => body,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpotRefError {
    NotFound(String),
    Ambiguous { reference: String, matches: usize },
}

impl std::fmt::Display for SpotRefError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpotRefError::NotFound(reference) => write!(f, "spot '{}' not found", reference),
            SpotRefError::Ambiguous { reference, matches } => write!(
                f,
                "spot reference '{}' is ambiguous ({} matches)",
                reference, matches
            ),
        }
    }
}

impl std::error::Error for SpotRefError {}

/// Resolves a full id, or a unique suffix of one (as printed by
/// [`display_id`]), against the known ids.
pub fn resolve_spot_ref<'a, I>(ids: I, reference: &str) -> Result<String, SpotRefError>
where
    I: IntoIterator<Item = &'a str>,
{
    let reference = reference.trim();
    if reference.is_empty() {
        return Err(SpotRefError::NotFound(reference.to_string()));
    }
    let mut matches = Vec::new();
    for id in ids {
        if id == reference {
            return Ok(id.to_string());
        }
        if id.ends_with(reference) {
            matches.push(id);
        }
    }
    match matches.as_slice() {
        [only] => Ok((*only).to_string()),
        [] => Err(SpotRefError::NotFound(reference.to_string())),
        _ => Err(SpotRefError::Ambiguous {
            reference: reference.to_string(),
            matches: matches.len(),
        }),
    }
}
