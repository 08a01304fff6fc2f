//! Built-in XSD type table
//!
//! A closed enumeration of the XML Schema primitive local names mapped to
//! value parsers. These are the only types that carry a parser directly;
//! user-defined simple types inherit theirs through the base chain.

use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::datetime::Timestamp;
use crate::error::{Error, Result};
use crate::value::Value;

/// A parser from lexical text to a decoded native value
pub type ValueParser = fn(&str) -> Result<Value>;

static HEX_BINARY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([0-9a-fA-F]{2})*$").unwrap());

/// Look up the parser for a built-in XSD type by its local name
pub fn builtin_parser(local: &str) -> Option<ValueParser> {
    match local {
        "string" | "normalizedString" | "token" | "language" | "NMTOKEN" | "Name" | "NCName"
        | "ID" | "IDREF" | "ENTITY" | "anyURI" => Some(parse_string),
        "NMTOKENS" | "IDREFS" | "ENTITIES" => Some(parse_tokens),
        "boolean" => Some(parse_boolean),
        "integer" => Some(parse_integer),
        "long" => Some(parse_integer),
        "int" => Some(parse_int),
        "short" => Some(parse_short),
        "byte" => Some(parse_byte),
        "nonNegativeInteger" => Some(parse_non_negative_integer),
        "positiveInteger" => Some(parse_positive_integer),
        "unsignedLong" => Some(parse_unsigned_long),
        "unsignedInt" => Some(parse_unsigned_int),
        "unsignedShort" => Some(parse_unsigned_short),
        "unsignedByte" => Some(parse_unsigned_byte),
        "nonPositiveInteger" => Some(parse_non_positive_integer),
        "negativeInteger" => Some(parse_negative_integer),
        "decimal" => Some(parse_decimal),
        "double" | "float" => Some(parse_double),
        "dateTime" => Some(parse_date_time),
        "date" => Some(parse_date),
        "hexBinary" => Some(parse_hex_binary),
        "base64Binary" => Some(parse_base64_binary),
        // Passthrough types: lexical checking beyond well-formedness is
        // out of scope, the string is the value.
        "duration" | "time" | "gYear" | "gYearMonth" | "gMonth" | "gMonthDay" | "gDay"
        | "QName" | "NOTATION" => Some(parse_string),
        _ => None,
    }
}

/// Whether a local name denotes a built-in XSD type.
///
/// Covers the special heads of the derivation hierarchy, which have no
/// parser of their own.
pub fn is_builtin(local: &str) -> bool {
    matches!(local, "anyType" | "anySimpleType") || builtin_parser(local).is_some()
}

fn parse_string(value: &str) -> Result<Value> {
    Ok(Value::String(value.to_string()))
}

fn parse_tokens(value: &str) -> Result<Value> {
    Ok(Value::Tokens(
        value.split_whitespace().map(|t| t.to_string()).collect(),
    ))
}

/// XSD boolean by value: `true`/`1` are true, `false`/`0` are false.
fn parse_boolean(value: &str) -> Result<Value> {
    match value.trim() {
        "true" | "1" => Ok(Value::Bool(true)),
        "false" | "0" => Ok(Value::Bool(false)),
        other => Err(Error::coercion(format!(
            "'{}' is not a valid boolean",
            other
        ))),
    }
}

fn decode_integer(value: &str) -> Result<i64> {
    value
        .trim()
        .parse::<i64>()
        .map_err(|_| Error::coercion(format!("'{}' is not a valid integer", value.trim())))
}

fn ranged_integer(value: &str, min: i64, max: i64, type_name: &str) -> Result<Value> {
    let n = decode_integer(value)?;
    if n < min || n > max {
        return Err(Error::coercion(format!(
            "{} is out of range for {}",
            n, type_name
        )));
    }
    Ok(Value::Int(n))
}

fn parse_integer(value: &str) -> Result<Value> {
    Ok(Value::Int(decode_integer(value)?))
}

fn parse_int(value: &str) -> Result<Value> {
    ranged_integer(value, i32::MIN as i64, i32::MAX as i64, "int")
}

fn parse_short(value: &str) -> Result<Value> {
    ranged_integer(value, i16::MIN as i64, i16::MAX as i64, "short")
}

fn parse_byte(value: &str) -> Result<Value> {
    ranged_integer(value, i8::MIN as i64, i8::MAX as i64, "byte")
}

fn parse_non_negative_integer(value: &str) -> Result<Value> {
    ranged_integer(value, 0, i64::MAX, "nonNegativeInteger")
}

fn parse_positive_integer(value: &str) -> Result<Value> {
    ranged_integer(value, 1, i64::MAX, "positiveInteger")
}

fn parse_non_positive_integer(value: &str) -> Result<Value> {
    ranged_integer(value, i64::MIN, 0, "nonPositiveInteger")
}

fn parse_negative_integer(value: &str) -> Result<Value> {
    ranged_integer(value, i64::MIN, -1, "negativeInteger")
}

fn parse_unsigned_long(value: &str) -> Result<Value> {
    let n = value
        .trim()
        .parse::<u64>()
        .map_err(|_| Error::coercion(format!("'{}' is not a valid unsignedLong", value.trim())))?;
    Ok(Value::Int(n as i64))
}

fn parse_unsigned_int(value: &str) -> Result<Value> {
    ranged_integer(value, 0, u32::MAX as i64, "unsignedInt")
}

fn parse_unsigned_short(value: &str) -> Result<Value> {
    ranged_integer(value, 0, u16::MAX as i64, "unsignedShort")
}

fn parse_unsigned_byte(value: &str) -> Result<Value> {
    ranged_integer(value, 0, u8::MAX as i64, "unsignedByte")
}

fn parse_decimal(value: &str) -> Result<Value> {
    let d = value
        .trim()
        .parse::<Decimal>()
        .map_err(|_| Error::coercion(format!("'{}' is not a valid decimal", value.trim())))?;
    d.to_f64()
        .map(Value::Double)
        .ok_or_else(|| Error::coercion(format!("'{}' does not fit a double", value.trim())))
}

fn parse_double(value: &str) -> Result<Value> {
    let trimmed = value.trim();
    match trimmed.to_ascii_lowercase().as_str() {
        "inf" | "+inf" => return Ok(Value::Double(f64::INFINITY)),
        "-inf" => return Ok(Value::Double(f64::NEG_INFINITY)),
        "nan" => return Ok(Value::Double(f64::NAN)),
        _ => {}
    }
    trimmed
        .parse::<f64>()
        .map(Value::Double)
        .map_err(|_| Error::coercion(format!("'{}' is not a valid double", trimmed)))
}

fn parse_date_time(value: &str) -> Result<Value> {
    Ok(Value::DateTime(Timestamp::parse_date_time(value)?))
}

fn parse_date(value: &str) -> Result<Value> {
    Ok(Value::DateTime(Timestamp::parse_date(value)?))
}

fn parse_hex_binary(value: &str) -> Result<Value> {
    let trimmed = value.trim();
    if !HEX_BINARY_RE.is_match(trimmed) {
        return Err(Error::coercion(format!(
            "'{}' is not a valid hexBinary encoding",
            trimmed
        )));
    }
    let bytes = (0..trimmed.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&trimmed[i..i + 2], 16).unwrap())
        .collect();
    Ok(Value::Bytes(bytes))
}

fn parse_base64_binary(value: &str) -> Result<Value> {
    let cleaned: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return Ok(Value::Bytes(Vec::new()));
    }
    base64::engine::general_purpose::STANDARD
        .decode(&cleaned)
        .map(Value::Bytes)
        .map_err(|_| Error::coercion("not a valid base64 encoding"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(local: &str, input: &str) -> Result<Value> {
        builtin_parser(local).unwrap()(input)
    }

    #[test]
    fn test_string_identity() {
        assert_eq!(run("string", " a b ").unwrap(), Value::String(" a b ".into()));
        assert_eq!(run("anyURI", "http://x").unwrap(), Value::String("http://x".into()));
    }

    #[test]
    fn test_token_lists() {
        assert_eq!(
            run("NMTOKENS", " a  b c ").unwrap(),
            Value::Tokens(vec!["a".into(), "b".into(), "c".into()])
        );
    }

    #[test]
    fn test_boolean_by_value() {
        // "1" must decode to true and "0"/"false" to false; a membership
        // test would make all four inputs truthy.
        assert_eq!(run("boolean", "true").unwrap(), Value::Bool(true));
        assert_eq!(run("boolean", "1").unwrap(), Value::Bool(true));
        assert_eq!(run("boolean", "false").unwrap(), Value::Bool(false));
        assert_eq!(run("boolean", "0").unwrap(), Value::Bool(false));
        assert!(run("boolean", "maybe").is_err());
        assert!(run("boolean", "TRUE").is_err());
    }

    #[test]
    fn test_integers() {
        assert_eq!(run("integer", "42").unwrap(), Value::Int(42));
        assert_eq!(run("integer", "-7").unwrap(), Value::Int(-7));
        assert!(run("integer", "4.5").is_err());
        assert!(run("byte", "128").is_err());
        assert_eq!(run("byte", "-128").unwrap(), Value::Int(-128));
        assert!(run("positiveInteger", "0").is_err());
        assert!(run("negativeInteger", "0").is_err());
        assert_eq!(run("unsignedShort", "65535").unwrap(), Value::Int(65535));
        assert!(run("unsignedShort", "65536").is_err());
    }

    #[test]
    fn test_decimal_to_double() {
        assert_eq!(run("decimal", "3.14").unwrap(), Value::Double(3.14));
        assert!(run("decimal", "abc").is_err());
    }

    #[test]
    fn test_double_special_values() {
        assert_eq!(run("double", "INF").unwrap(), Value::Double(f64::INFINITY));
        assert_eq!(run("double", "inf").unwrap(), Value::Double(f64::INFINITY));
        assert_eq!(run("float", "-Inf").unwrap(), Value::Double(f64::NEG_INFINITY));
        match run("double", "NaN").unwrap() {
            Value::Double(d) => assert!(d.is_nan()),
            _ => panic!("expected double"),
        }
        assert_eq!(run("double", "1.5e3").unwrap(), Value::Double(1500.0));
    }

    #[test]
    fn test_binary() {
        assert_eq!(
            run("hexBinary", "0A1b").unwrap(),
            Value::Bytes(vec![0x0A, 0x1B])
        );
        assert!(run("hexBinary", "0").is_err());
        assert_eq!(
            run("base64Binary", "SGVsbG8=").unwrap(),
            Value::Bytes(b"Hello".to_vec())
        );
        assert!(run("base64Binary", "!!!").is_err());
    }

    #[test]
    fn test_dates() {
        match run("dateTime", "2024-01-15T10:30:00Z").unwrap() {
            Value::DateTime(ts) => assert_eq!(ts.millis, 1_705_314_600_000),
            _ => panic!("expected instant"),
        }
        assert!(run("date", "2024-02-30").is_err());
    }

    #[test]
    fn test_passthrough_types() {
        assert_eq!(run("duration", "P1Y").unwrap(), Value::String("P1Y".into()));
        assert_eq!(run("gYear", "2024").unwrap(), Value::String("2024".into()));
        assert_eq!(run("QName", "xs:int").unwrap(), Value::String("xs:int".into()));
    }

    #[test]
    fn test_is_builtin() {
        assert!(is_builtin("string"));
        assert!(is_builtin("anyType"));
        assert!(is_builtin("anySimpleType"));
        assert!(!is_builtin("myType"));
    }
}
