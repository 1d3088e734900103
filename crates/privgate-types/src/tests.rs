//! Unit tests for privgate-types

use std::str::FromStr;

use proptest::prelude::*;
use test_case::test_case;

use crate::{AttributeKind, AttributeValue, Source, SourceOrder, TypesError};

// ============================================================================
// Source Tests
// ============================================================================

#[test_case("argument", Source::Argument; "argument")]
#[test_case("arg", Source::Argument; "arg alias")]
#[test_case("Query", Source::Query; "mixed case")]
#[test_case(" path ", Source::Path; "padded")]
#[test_case("body", Source::Body; "body")]
#[test_case("HEADER", Source::Header; "upper case")]
fn source_parses(input: &str, expected: Source) {
    assert_eq!(Source::from_str(input).unwrap(), expected);
}

#[test]
fn unknown_source_is_rejected() {
    assert_eq!(
        Source::from_str("cookie"),
        Err(TypesError::UnknownSource("cookie".to_string()))
    );
}

#[test]
fn source_serializes_lowercase() {
    let json = serde_json::to_string(&Source::Header).unwrap();
    assert_eq!(json, "\"header\"");
}

// ============================================================================
// SourceOrder Tests
// ============================================================================

#[test]
fn default_order_is_argument_query_path_body_header() {
    let order = SourceOrder::default();
    assert_eq!(
        order.as_slice(),
        &[
            Source::Argument,
            Source::Query,
            Source::Path,
            Source::Body,
            Source::Header
        ]
    );
}

#[test]
fn empty_order_is_rejected() {
    assert_eq!(SourceOrder::new(vec![]), Err(TypesError::EmptySourceOrder));
}

#[test]
fn duplicate_source_is_rejected() {
    let result = SourceOrder::new(vec![Source::Header, Source::Query, Source::Header]);
    assert_eq!(result, Err(TypesError::DuplicateSource(Source::Header)));
}

#[test]
fn order_parses_from_comma_list() {
    let order: SourceOrder = "header, query".parse().unwrap();
    assert_eq!(order.as_slice(), &[Source::Header, Source::Query]);
    assert_eq!(order.to_string(), "header,query");
}

#[test]
fn order_deserialization_validates() {
    let ok: SourceOrder = serde_json::from_str(r#"["path","body"]"#).unwrap();
    assert_eq!(ok.as_slice(), &[Source::Path, Source::Body]);

    let err = serde_json::from_str::<SourceOrder>(r#"["path","path"]"#);
    assert!(err.is_err());
}

// ============================================================================
// AttributeValue Tests
// ============================================================================

#[test_case(AttributeValue::from("42"), AttributeKind::Integer, Some(AttributeValue::Integer(42)); "numeric text")]
#[test_case(AttributeValue::from(" 7 "), AttributeKind::Integer, Some(AttributeValue::Integer(7)); "padded text")]
#[test_case(AttributeValue::from("seven"), AttributeKind::Integer, None; "non numeric text")]
#[test_case(AttributeValue::Integer(5), AttributeKind::Text, Some(AttributeValue::from("5")); "integer to text")]
#[test_case(AttributeValue::from("abc"), AttributeKind::Text, Some(AttributeValue::from("abc")); "text stays text")]
fn attribute_coercion(value: AttributeValue, kind: AttributeKind, expected: Option<AttributeValue>) {
    assert_eq!(value.coerce(kind), expected);
}

#[test]
fn attribute_value_display_is_bare() {
    assert_eq!(AttributeValue::Integer(-3).to_string(), "-3");
    assert_eq!(AttributeValue::from("UNIT").to_string(), "UNIT");
}

proptest! {
    /// Integer coercion of a formatted integer always yields the same integer.
    #[test]
    fn integer_text_coerces_back(n: i64) {
        let coerced = AttributeValue::Text(n.to_string()).coerce(AttributeKind::Integer);
        prop_assert_eq!(coerced, Some(AttributeValue::Integer(n)));
    }

    /// Any permutation prefix of distinct sources is a valid order.
    #[test]
    fn distinct_prefixes_are_valid(len in 1usize..=5) {
        let order = SourceOrder::new(Source::ALL[..len].to_vec());
        prop_assert!(order.is_ok());
    }
}
