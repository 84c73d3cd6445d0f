//! Caller-supplied metadata attached to a stored object.

use serde_json::{Map, Value};

/// Open mapping of string keys to arbitrary JSON values (strings, numbers,
/// booleans, null, nested arrays and maps).
///
/// Stored verbatim alongside the manifest and returned unmodified on read.
pub type Metadata = Map<String, Value>;

/// Serialize metadata into the text form kept in the manifest table.
pub fn encode(metadata: &Metadata) -> serde_json::Result<String> {
    serde_json::to_string(metadata)
}

/// Parse the stored text form. Anything other than a JSON object is rejected.
pub fn decode(raw: &str) -> serde_json::Result<Metadata> {
    serde_json::from_str(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_values_survive_a_round_trip() {
        let value = json!({
            "name": "report.pdf",
            "pages": 12,
            "ratio": 0.75,
            "big": u64::MAX,
            "negative": -3,
            "draft": false,
            "tags": ["a", "b"],
            "owner": { "id": 7, "groups": [] },
            "none": null
        });
        let metadata = value.as_object().unwrap().clone();
        let decoded = decode(&encode(&metadata).unwrap()).unwrap();
        assert_eq!(decoded, metadata);
        assert_eq!(decoded["big"].as_u64(), Some(u64::MAX));
        assert_eq!(decoded["negative"].as_i64(), Some(-3));
    }

    #[test]
    fn floats_keep_their_exact_bits() {
        let hard = [1.0715660391465826e-75, 2.2250738585072014e-308, 0.1 + 0.2, f64::MAX];
        for f in hard {
            let metadata = json!({ "f": f }).as_object().unwrap().clone();
            let decoded = decode(&encode(&metadata).unwrap()).unwrap();
            assert_eq!(decoded["f"].as_f64().unwrap().to_bits(), f.to_bits(), "{:e}", f);
        }

        // xorshift64 over raw bit patterns, skipping NaN and infinities.
        let mut state = 0x9E37_79B9_7F4A_7C15u64;
        let mut checked = 0;
        while checked < 20_000 {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let f = f64::from_bits(state);
            if !f.is_finite() {
                continue;
            }
            let metadata = json!({ "f": f }).as_object().unwrap().clone();
            let decoded = decode(&encode(&metadata).unwrap()).unwrap();
            assert_eq!(decoded["f"].as_f64().unwrap().to_bits(), f.to_bits(), "{:e}", f);
            checked += 1;
        }
    }

    #[test]
    fn non_object_is_rejected() {
        assert!(decode("[1, 2]").is_err());
        assert!(decode("not json").is_err());
    }
}
