use indexmap::IndexMap;
use serde::{
    Deserialize,
    Serialize,
};
use thiserror::Error;

/// An integer type for WAMP messages.
pub type Integer = i64;

/// A dictionary of key-value pairs.
///
/// Insertion order is kept so that encoded output is stable, but equality and lookups never depend
/// on it.
pub type Dictionary = IndexMap<String, Value>;

/// A sequence of values.
pub type List = Vec<Value>;

/// A value for WAMP messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Integer(Integer),
    String(String),
    Bool(bool),
    Double(f64),
    Dictionary(Dictionary),
    List(List),
}

impl Value {
    /// The value as an [`Integer`].
    pub fn integer(&self) -> Option<Integer> {
        match self {
            Self::Integer(val) => Some(*val),
            _ => None,
        }
    }

    /// The value as a [`str`].
    pub fn string(&self) -> Option<&str> {
        match self {
            Self::String(val) => Some(val),
            _ => None,
        }
    }

    /// The value as a [`bool`].
    pub fn bool(&self) -> Option<bool> {
        match self {
            Self::Bool(val) => Some(*val),
            _ => None,
        }
    }

    /// The value as an [`f64`].
    pub fn double(&self) -> Option<f64> {
        match self {
            Self::Double(val) => Some(*val),
            _ => None,
        }
    }

    /// The value as a [`Dictionary`].
    pub fn dictionary(&self) -> Option<&Dictionary> {
        match self {
            Self::Dictionary(val) => Some(val),
            _ => None,
        }
    }

    /// The value as a [`Dictionary`].
    pub fn dictionary_mut(&mut self) -> Option<&mut Dictionary> {
        match self {
            Self::Dictionary(val) => Some(val),
            _ => None,
        }
    }

    /// The value as a [`List`].
    pub fn list(&self) -> Option<&List> {
        match self {
            Self::List(val) => Some(val),
            _ => None,
        }
    }

    /// The value as a [`List`].
    pub fn list_mut(&mut self) -> Option<&mut List> {
        match self {
            Self::List(val) => Some(val),
            _ => None,
        }
    }

    /// The name of the value's type, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Integer(_) => "integer",
            Self::String(_) => "string",
            Self::Bool(_) => "bool",
            Self::Double(_) => "double",
            Self::Dictionary(_) => "dictionary",
            Self::List(_) => "list",
        }
    }
}

impl From<Integer> for Value {
    fn from(value: Integer) -> Self {
        Self::Integer(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<Dictionary> for Value {
    fn from(value: Dictionary) -> Self {
        Self::Dictionary(value)
    }
}

impl From<List> for Value {
    fn from(value: List) -> Self {
        Self::List(value)
    }
}

/// An error resulting from serializing a Rust object into a WAMP value using the [`WampSerialize`]
/// trait.
#[derive(Debug, Error)]
#[error("{msg}")]
pub struct WampSerializeError {
    msg: String,
}

impl WampSerializeError {
    pub fn new<S>(msg: S) -> Self
    where
        S: Into<String>,
    {
        Self { msg: msg.into() }
    }

    pub fn annotate(&self, msg: String) -> Self {
        Self::new(format!("{}; {msg}", self.msg))
    }
}

/// An error resulting from deserializing a Rust object from a WAMP value using the
/// [`WampDeserialize`] trait.
#[derive(Debug, Error)]
#[error("{msg}")]
pub struct WampDeserializeError {
    msg: String,
}

impl WampDeserializeError {
    pub fn new<S>(msg: S) -> Self
    where
        S: Into<String>,
    {
        Self { msg: msg.into() }
    }

    pub fn annotate(&self, msg: String) -> Self {
        Self::new(format!("{}; {msg}", self.msg))
    }
}

/// Trait for serializing a Rust object into a WAMP value.
pub trait WampSerialize {
    /// Serializes the object into a WAMP value.
    fn wamp_serialize(self) -> Result<Value, WampSerializeError>;
}

impl WampSerialize for Value {
    fn wamp_serialize(self) -> Result<Value, WampSerializeError> {
        Ok(self)
    }
}

impl WampSerialize for Integer {
    fn wamp_serialize(self) -> Result<Value, WampSerializeError> {
        Ok(Value::Integer(self))
    }
}

impl WampSerialize for u64 {
    fn wamp_serialize(self) -> Result<Value, WampSerializeError> {
        Integer::try_from(self)
            .map(Value::Integer)
            .map_err(|_| WampSerializeError::new(format!("{self} does not fit in an integer")))
    }
}

impl WampSerialize for u32 {
    fn wamp_serialize(self) -> Result<Value, WampSerializeError> {
        Ok(Value::Integer(self.into()))
    }
}

impl WampSerialize for f64 {
    fn wamp_serialize(self) -> Result<Value, WampSerializeError> {
        Ok(Value::Double(self))
    }
}

impl WampSerialize for String {
    fn wamp_serialize(self) -> Result<Value, WampSerializeError> {
        Ok(Value::String(self))
    }
}

impl WampSerialize for &str {
    fn wamp_serialize(self) -> Result<Value, WampSerializeError> {
        Ok(Value::String(self.to_owned()))
    }
}

impl WampSerialize for bool {
    fn wamp_serialize(self) -> Result<Value, WampSerializeError> {
        Ok(Value::Bool(self))
    }
}

impl<T> WampSerialize for Vec<T>
where
    T: WampSerialize,
{
    fn wamp_serialize(self) -> Result<Value, WampSerializeError> {
        self.into_iter()
            .enumerate()
            .map(|(i, val)| {
                val.wamp_serialize()
                    .map_err(|err| err.annotate(format!("list element {i}")))
            })
            .collect::<Result<List, _>>()
            .map(Value::List)
    }
}

impl<T> WampSerialize for IndexMap<String, T>
where
    T: WampSerialize,
{
    fn wamp_serialize(self) -> Result<Value, WampSerializeError> {
        self.into_iter()
            .map(|(key, val)| match val.wamp_serialize() {
                Ok(val) => Ok((key, val)),
                Err(err) => Err(err.annotate(format!("dictionary key {key}"))),
            })
            .collect::<Result<Dictionary, _>>()
            .map(Value::Dictionary)
    }
}

impl<T> WampSerialize for Option<T>
where
    T: WampSerialize,
{
    fn wamp_serialize(self) -> Result<Value, WampSerializeError> {
        match self {
            Some(val) => val.wamp_serialize(),
            None => Err(WampSerializeError::new(
                "empty optional cannot be serialized",
            )),
        }
    }
}

/// Trait for deserializing a Rust object from a WAMP value.
pub trait WampDeserialize: Sized {
    /// Deserializes the object from a WAMP value.
    fn wamp_deserialize(value: Value) -> Result<Self, WampDeserializeError>;
}

impl WampDeserialize for Value {
    fn wamp_deserialize(value: Value) -> Result<Self, WampDeserializeError> {
        Ok(value)
    }
}

impl WampDeserialize for Integer {
    fn wamp_deserialize(value: Value) -> Result<Self, WampDeserializeError> {
        match value {
            Value::Integer(val) => Ok(val),
            _ => Err(WampDeserializeError::new("value must be an integer")),
        }
    }
}

impl WampDeserialize for u64 {
    fn wamp_deserialize(value: Value) -> Result<Self, WampDeserializeError> {
        let val = Integer::wamp_deserialize(value)?;
        u64::try_from(val).map_err(|_| WampDeserializeError::new("value must be non-negative"))
    }
}

impl WampDeserialize for f64 {
    fn wamp_deserialize(value: Value) -> Result<Self, WampDeserializeError> {
        match value {
            Value::Double(val) => Ok(val),
            // Serializers drop the fractional part of whole doubles.
            Value::Integer(val) => Ok(val as f64),
            _ => Err(WampDeserializeError::new("value must be a double")),
        }
    }
}

impl WampDeserialize for String {
    fn wamp_deserialize(value: Value) -> Result<Self, WampDeserializeError> {
        match value {
            Value::String(val) => Ok(val),
            _ => Err(WampDeserializeError::new("value must be a string")),
        }
    }
}

impl WampDeserialize for bool {
    fn wamp_deserialize(value: Value) -> Result<Self, WampDeserializeError> {
        match value {
            Value::Bool(val) => Ok(val),
            _ => Err(WampDeserializeError::new("value must be a bool")),
        }
    }
}

impl<T> WampDeserialize for Vec<T>
where
    T: WampDeserialize,
{
    fn wamp_deserialize(value: Value) -> Result<Self, WampDeserializeError> {
        match value {
            Value::List(list) => list
                .into_iter()
                .enumerate()
                .map(|(i, val)| {
                    T::wamp_deserialize(val)
                        .map_err(|err| err.annotate(format!("list element {i}")))
                })
                .collect(),
            _ => Err(WampDeserializeError::new("value must be a list")),
        }
    }
}

impl<T> WampDeserialize for IndexMap<String, T>
where
    T: WampDeserialize,
{
    fn wamp_deserialize(value: Value) -> Result<Self, WampDeserializeError> {
        match value {
            Value::Dictionary(dictionary) => dictionary
                .into_iter()
                .map(|(key, val)| match T::wamp_deserialize(val) {
                    Ok(val) => Ok((key, val)),
                    Err(err) => Err(err.annotate(format!("dictionary key {key}"))),
                })
                .collect(),
            _ => Err(WampDeserializeError::new("value must be a dictionary")),
        }
    }
}

impl<T> WampDeserialize for Option<T>
where
    T: WampDeserialize,
{
    fn wamp_deserialize(value: Value) -> Result<Self, WampDeserializeError> {
        Ok(Some(T::wamp_deserialize(value)?))
    }
}

#[cfg(test)]
mod value_test {
    use crate::{
        Dictionary,
        List,
        Value,
        WampDeserialize,
        WampSerialize,
    };

    #[test]
    fn deserializes_every_value_kind_from_json() {
        let value = serde_json::from_str::<Value>(
            r#"[1, -2, "s", true, 1.5, { "a": [] }, 18446744073709551615]"#,
        )
        .unwrap();
        pretty_assertions::assert_eq!(
            value,
            Value::List(List::from_iter([
                Value::Integer(1),
                Value::Integer(-2),
                Value::String("s".to_owned()),
                Value::Bool(true),
                Value::Double(1.5),
                Value::Dictionary(Dictionary::from_iter([(
                    "a".to_owned(),
                    Value::List(List::default())
                )])),
                Value::Double(18446744073709551615f64),
            ]))
        );
    }

    #[test]
    fn dictionary_equality_ignores_order() {
        let a = Dictionary::from_iter([
            ("x".to_owned(), Value::Integer(1)),
            ("y".to_owned(), Value::Integer(2)),
        ]);
        let b = Dictionary::from_iter([
            ("y".to_owned(), Value::Integer(2)),
            ("x".to_owned(), Value::Integer(1)),
        ]);
        assert_eq!(Value::Dictionary(a), Value::Dictionary(b));
    }

    #[test]
    fn serializes_dictionary_in_insertion_order() {
        let dictionary = Dictionary::from_iter([
            ("z".to_owned(), Value::Integer(1)),
            ("a".to_owned(), Value::Bool(false)),
        ]);
        assert_eq!(
            serde_json::to_string(&dictionary).unwrap(),
            r#"{"z":1,"a":false}"#
        );
    }

    #[test]
    fn maps_native_types_to_values() {
        assert_matches::assert_matches!(vec![1i64, 2, 3].wamp_serialize(), Ok(Value::List(list)) => {
            assert_eq!(list, List::from_iter([Value::Integer(1), Value::Integer(2), Value::Integer(3)]));
        });
        assert_matches::assert_matches!(u64::MAX.wamp_serialize(), Err(err) => {
            assert!(err.to_string().contains("does not fit"));
        });
        assert_matches::assert_matches!(None::<bool>.wamp_serialize(), Err(_));
        assert_matches::assert_matches!("hi".wamp_serialize(), Ok(Value::String(s)) => {
            assert_eq!(s, "hi");
        });
    }

    #[test]
    fn maps_values_to_native_types() {
        assert_matches::assert_matches!(
            Vec::<String>::wamp_deserialize(Value::List(List::from_iter([
                Value::String("a".to_owned()),
                Value::String("b".to_owned()),
            ]))),
            Ok(list) => {
                assert_eq!(list, vec!["a".to_owned(), "b".to_owned()]);
            }
        );
        assert_matches::assert_matches!(
            Vec::<String>::wamp_deserialize(Value::List(List::from_iter([
                Value::String("a".to_owned()),
                Value::Integer(1),
            ]))),
            Err(err) => {
                assert_eq!(err.to_string(), "value must be a string; list element 1");
            }
        );
        assert_matches::assert_matches!(u64::wamp_deserialize(Value::Integer(-1)), Err(_));
        assert_matches::assert_matches!(f64::wamp_deserialize(Value::Integer(3)), Ok(val) => {
            assert_eq!(val, 3.0);
        });
        assert_matches::assert_matches!(bool::wamp_deserialize(Value::String("true".to_owned())), Err(_));
    }
}
