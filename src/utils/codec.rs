//! Document codec: JSON bodies for stored document records.

use crate::error::Result;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Serialize a document to its stored byte form
pub fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

/// Deserialize a stored document body
pub fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Note {
        title: String,
        pages: u32,
    }

    #[test]
    fn test_codec() {
        let note = Note {
            title: "log".to_string(),
            pages: 3,
        };
        let bytes = serialize(&note).unwrap();
        assert_eq!(deserialize::<Note>(&bytes).unwrap(), note);
        assert!(deserialize::<Note>(b"{not json").is_err());
    }
}
