//! Relaxed payload decoding
//!
//! Push messages carry a loosely-structured text payload. Producers usually
//! send a JSON object, but operators triggering jobs by hand often publish a
//! quick unquoted form instead:
//!
//! ```text
//! {job: fetch-trends, vertical: home-services, dry_run: true, limit: 5}
//! ```
//!
//! [`decode_payload`] accepts both. It never fails: text that is neither a JSON
//! object nor the relaxed form comes back as a single `raw_payload` entry.
//!
//! The relaxed form has no nesting and no escaping. Values are split on every
//! comma, so a comma inside a value splits it into two segments.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value as JsonValue;

/// Key holding undecodable payload text.
pub const RAW_PAYLOAD_KEY: &str = "raw_payload";

/// Key holding message data whose transport encoding could not be decoded.
pub const RAW_DATA_B64_KEY: &str = "raw_data_b64";

#[allow(clippy::expect_used)]
static NUMERIC_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\d+(\.\d+)?$").expect("numeric token pattern is valid"));

/// A single decoded payload value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PayloadValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    /// Only produced by strict JSON input
    List(Vec<PayloadValue>),
    /// Only produced by strict JSON input
    Map(BTreeMap<String, PayloadValue>),
}

impl PayloadValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Textual form used when a value is needed as a plain string.
    ///
    /// Strings are returned without quotes; lists and maps as compact JSON.
    pub fn to_text(&self) -> String {
        match self {
            Self::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for PayloadValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(v) => write!(f, "{:?}", v),
            Self::String(s) => write!(f, "{}", s),
            Self::List(_) | Self::Map(_) => {
                let text = serde_json::to_string(self).map_err(|_| fmt::Error)?;
                f.write_str(&text)
            },
        }
    }
}

impl From<JsonValue> for PayloadValue {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Bool(b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Integer(i)
                } else if let Some(f) = n.as_f64() {
                    Self::Float(f)
                } else {
                    Self::String(n.to_string())
                }
            },
            JsonValue::String(s) => Self::String(s),
            JsonValue::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            JsonValue::Object(map) => {
                Self::Map(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            },
        }
    }
}

impl From<&str> for PayloadValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<i64> for PayloadValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for PayloadValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Decoded payload: string keys to [`PayloadValue`]s.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Payload(BTreeMap<String, PayloadValue>);

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-entry payload carrying text that could not be decoded.
    pub fn raw(text: impl Into<String>) -> Self {
        let mut payload = Self::new();
        payload.insert(RAW_PAYLOAD_KEY, PayloadValue::String(text.into()));
        payload
    }

    /// Single-entry payload carrying message data whose base64 layer was invalid.
    pub fn raw_data_b64(encoded: impl Into<String>) -> Self {
        let mut payload = Self::new();
        payload.insert(RAW_DATA_B64_KEY, PayloadValue::String(encoded.into()));
        payload
    }

    pub fn get(&self, key: &str) -> Option<&PayloadValue> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(PayloadValue::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: PayloadValue) -> Option<PayloadValue> {
        self.0.insert(key.into(), value)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PayloadValue)> {
        self.0.iter()
    }

    /// Compact JSON rendering, for log records.
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{:?}", self.0))
    }
}

impl FromIterator<(String, PayloadValue)> for Payload {
    fn from_iter<I: IntoIterator<Item = (String, PayloadValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Payload {
    type Item = (&'a String, &'a PayloadValue);
    type IntoIter = std::collections::btree_map::Iter<'a, String, PayloadValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Decode payload text into a [`Payload`].
///
/// Attempts, in order:
/// 1. empty (after trimming) gives an empty payload
/// 2. strict JSON; an object is returned as-is
/// 3. the relaxed `{key: value, ...}` form, when the text is brace-wrapped and
///    contains a colon
/// 4. otherwise `{"raw_payload": text}`
///
/// JSON that parses to something other than an object (an array, a bare
/// number) is not a mapping and also ends up under `raw_payload`.
pub fn decode_payload(text: &str) -> Payload {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Payload::new();
    }

    match serde_json::from_str::<JsonValue>(trimmed) {
        Ok(JsonValue::Object(map)) => {
            return map.into_iter().map(|(k, v)| (k, PayloadValue::from(v))).collect();
        },
        Ok(_) => return Payload::raw(text),
        Err(_) => {},
    }

    match relaxed_body(trimmed) {
        Some(body) => decode_relaxed(body),
        None => Payload::raw(text),
    }
}

/// Body of a relaxed payload: outer braces removed, at least one colon inside.
fn relaxed_body(trimmed: &str) -> Option<&str> {
    let body = trimmed.strip_prefix('{')?.strip_suffix('}')?;
    body.contains(':').then_some(body)
}

fn decode_relaxed(body: &str) -> Payload {
    let mut payload = Payload::new();

    for segment in body.split(',') {
        // Segments without a colon carry no key and are dropped
        let Some((key, value)) = segment.split_once(':') else {
            continue;
        };

        let key = unquote(key.trim());
        let value = unquote(value.trim());
        payload.insert(key, coerce_scalar(value));
    }

    payload
}

/// Strip one layer of matching single or double quotes.
fn unquote(token: &str) -> &str {
    for quote in ['"', '\''] {
        if token.len() >= 2 && token.starts_with(quote) && token.ends_with(quote) {
            return &token[1..token.len() - 1];
        }
    }
    token
}

fn coerce_scalar(token: &str) -> PayloadValue {
    if token.eq_ignore_ascii_case("true") {
        return PayloadValue::Bool(true);
    }
    if token.eq_ignore_ascii_case("false") {
        return PayloadValue::Bool(false);
    }
    if token.eq_ignore_ascii_case("null") {
        return PayloadValue::Null;
    }

    if NUMERIC_TOKEN.is_match(token) {
        if !token.contains('.') {
            if let Ok(i) = token.parse::<i64>() {
                return PayloadValue::Integer(i);
            }
        }
        // Integers beyond i64 fall back to a float
        if let Ok(f) = token.parse::<f64>() {
            return PayloadValue::Float(f);
        }
    }

    PayloadValue::String(token.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn entries(payload: &Payload) -> Vec<(String, PayloadValue)> {
        payload.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    #[test]
    fn test_empty_input_is_empty_payload() {
        assert!(decode_payload("").is_empty());
        assert!(decode_payload("   \n\t ").is_empty());
    }

    #[test]
    fn test_strict_json_object() {
        let payload =
            decode_payload(r#"{"job": "fetch-trends", "signals": ["a", "b"], "limit": 3}"#);

        assert_eq!(payload.get_str("job"), Some("fetch-trends"));
        assert_eq!(payload.get("limit"), Some(&PayloadValue::Integer(3)));
        assert_eq!(
            payload.get("signals"),
            Some(&PayloadValue::List(vec!["a".into(), "b".into()]))
        );
    }

    #[test]
    fn test_json_non_object_is_raw() {
        let payload = decode_payload("[1, 2, 3]");
        assert_eq!(payload.get_str(RAW_PAYLOAD_KEY), Some("[1, 2, 3]"));
        assert_eq!(payload.len(), 1);
    }

    #[test]
    fn test_relaxed_form_coerces_scalars() {
        let payload = decode_payload(
            "{job: fetch-trends, dry_run: TRUE, retry: false, limit: 5, ratio: -0.25, owner: null}",
        );

        assert_eq!(payload.get_str("job"), Some("fetch-trends"));
        assert_eq!(payload.get("dry_run"), Some(&PayloadValue::Bool(true)));
        assert_eq!(payload.get("retry"), Some(&PayloadValue::Bool(false)));
        assert_eq!(payload.get("limit"), Some(&PayloadValue::Integer(5)));
        assert_eq!(payload.get("ratio"), Some(&PayloadValue::Float(-0.25)));
        assert_eq!(payload.get("owner"), Some(&PayloadValue::Null));
    }

    #[test]
    fn test_relaxed_form_strips_one_layer_of_quotes() {
        let payload = decode_payload(r#"{ 'job' : "vertical-research", note: "'quoted'" }"#);

        assert_eq!(payload.get_str("job"), Some("vertical-research"));
        assert_eq!(payload.get_str("note"), Some("'quoted'"));
    }

    #[test]
    fn test_relaxed_form_splits_on_every_comma() {
        let payload = decode_payload("{job: daily-report, note: hello, world}");

        // "world" has no colon and is dropped; the note is cut at the comma
        assert_eq!(payload.get_str("note"), Some("hello"));
        assert_eq!(payload.len(), 2);
    }

    #[test]
    fn test_relaxed_value_keeps_later_colons() {
        let payload = decode_payload("{url: https://example.com/x}");
        assert_eq!(payload.get_str("url"), Some("https://example.com/x"));
    }

    #[test]
    fn test_numeric_edge_tokens_stay_strings() {
        let payload = decode_payload("{a: 1., b: .5, c: 1e3, d: --1, e: 12ab}");

        for key in ["a", "b", "c", "d", "e"] {
            assert!(
                matches!(payload.get(key), Some(PayloadValue::String(_))),
                "{key} should stay a string"
            );
        }
    }

    #[test]
    fn test_integer_overflow_becomes_float() {
        let payload = decode_payload("{big: 123456789012345678901234567890}");
        assert!(matches!(payload.get("big"), Some(PayloadValue::Float(_))));
    }

    #[test]
    fn test_braces_without_colon_are_raw() {
        let payload = decode_payload("{just some words}");
        assert_eq!(payload.get_str(RAW_PAYLOAD_KEY), Some("{just some words}"));
    }

    #[test]
    fn test_garbage_is_raw_with_original_text() {
        let text = "  fetch trends please ";
        let payload = decode_payload(text);
        assert_eq!(entries(&payload), vec![(RAW_PAYLOAD_KEY.to_string(), text.into())]);
    }

    #[test]
    fn test_value_display_and_text() {
        assert_eq!(PayloadValue::Float(1.0).to_text(), "1.0");
        assert_eq!(PayloadValue::Integer(-4).to_text(), "-4");
        assert_eq!(PayloadValue::String("x".into()).to_text(), "x");
        assert_eq!(PayloadValue::List(vec![PayloadValue::Integer(1)]).to_text(), "[1]");
        assert_eq!(PayloadValue::Null.to_text(), "null");
    }

    #[test]
    fn test_payload_serializes_as_plain_json() {
        let payload = decode_payload("{a: 1, b: null, c: x}");
        assert_eq!(payload.to_json_string(), r#"{"a":1,"b":null,"c":"x"}"#);
    }

    #[derive(Debug, Clone)]
    enum Token {
        Bool(bool),
        Null,
        Integer(i64),
        Float(i32, u16),
        Text(String),
    }

    impl Token {
        fn render(&self) -> String {
            match self {
                Token::Bool(b) => b.to_string(),
                Token::Null => "null".to_string(),
                Token::Integer(i) => i.to_string(),
                Token::Float(whole, frac) => format!("{}.{}", whole, frac),
                Token::Text(s) => s.clone(),
            }
        }

        fn expected(&self) -> PayloadValue {
            match self {
                Token::Bool(b) => PayloadValue::Bool(*b),
                Token::Null => PayloadValue::Null,
                Token::Integer(i) => PayloadValue::Integer(*i),
                Token::Float(..) => PayloadValue::Float(self.render().parse().unwrap()),
                Token::Text(s) => PayloadValue::String(s.clone()),
            }
        }
    }

    fn token_strategy() -> impl Strategy<Value = Token> {
        prop_oneof![
            any::<bool>().prop_map(Token::Bool),
            Just(Token::Null),
            any::<i64>().prop_map(Token::Integer),
            (any::<i32>(), any::<u16>()).prop_map(|(w, f)| Token::Float(w, f)),
            "[A-Za-z][A-Za-z -]{0,12}[A-Za-z]"
                .prop_filter("reserved literal", |s| {
                    !["true", "false", "null"].contains(&s.to_lowercase().as_str())
                })
                .prop_map(Token::Text),
        ]
    }

    proptest! {
        #[test]
        fn prop_relaxed_round_trip(
            fields in prop::collection::btree_map("[a-z][a-z0-9_]{0,8}", token_strategy(), 1..8)
        ) {
            let body: Vec<String> = fields
                .iter()
                .map(|(k, v)| format!("{}: {}", k, v.render()))
                .collect();
            let text = format!("{{{}}}", body.join(", "));

            let decoded = decode_payload(&text);
            let expected: Payload = fields
                .iter()
                .map(|(k, v)| (k.clone(), v.expected()))
                .collect();

            prop_assert_eq!(decoded, expected);
        }

        #[test]
        fn prop_decode_is_empty_raw_or_structured(text in ".{0,64}") {
            check_decode_contract(&text)?;
        }

        #[test]
        fn prop_brace_wrapped_text_is_relaxed_or_raw(text in "\\{[^{}]{0,40}\\}") {
            check_decode_contract(&text)?;
        }
    }

    /// Every input lands in exactly one of the decode outcomes.
    fn check_decode_contract(text: &str) -> Result<(), TestCaseError> {
        let payload = decode_payload(text);
        let trimmed = text.trim();

        if trimmed.is_empty() {
            prop_assert!(payload.is_empty());
            return Ok(());
        }

        match serde_json::from_str::<JsonValue>(trimmed) {
            Ok(JsonValue::Object(map)) => {
                prop_assert_eq!(payload.len(), map.len());
                prop_assert!(map.keys().all(|k| payload.get(k).is_some()));
            },
            Ok(_) => prop_assert_eq!(payload, Payload::raw(text)),
            Err(_) => match relaxed_body(trimmed) {
                Some(body) => {
                    let keyed_segments = body.split(',').filter(|s| s.contains(':')).count();
                    prop_assert!(!payload.is_empty());
                    prop_assert!(payload.len() <= keyed_segments);
                    prop_assert_ne!(
                        payload.get(RAW_PAYLOAD_KEY),
                        Some(&PayloadValue::String(text.to_string()))
                    );
                },
                None => prop_assert_eq!(payload, Payload::raw(text)),
            },
        }

        Ok(())
    }
}
