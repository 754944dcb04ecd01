//! Reference JSON encoding of the source type system.
//!
//! The schemas generated by this crate describe what the source language's
//! JSON encoder writes. This module reproduces that encoder (and its
//! decoder) for [`Type`] descriptors so that the generated schemas can be
//! checked against real payloads: nil collections become `null`, byte
//! slices become base64, `omitempty` drops empty fields, the `string` flag
//! quotes scalars and embedded structs are flattened into their parent.
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Map, Number, Value as Json};

use crate::error::{Error, Result};
use crate::tags::JsonTag;
use crate::types::{Bits, Capability, Field, Kind, Type};

/// A value of some [`Type`], as the source program would hold it.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A nil pointer, slice, map or interface.
    Nil,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Str(String),
    /// The text form of a value whose type marshals itself as text.
    Text(String),
    /// Elements of a slice or array.
    List(Vec<Value>),
    /// Entries of a map, in no particular order.
    Map(Vec<(Value, Value)>),
    /// Field values of a struct, in declaration order.
    Struct(Vec<Value>),
    /// A non-nil pointer.
    Ptr(Box<Value>),
}

impl Value {
    /// A byte slice.
    pub fn bytes(bytes: &[u8]) -> Value {
        Value::List(bytes.iter().map(|&b| Value::Uint(u64::from(b))).collect())
    }

    pub fn as_bytes(&self) -> Option<Vec<u8>> {
        match self {
            Value::List(items) => items
                .iter()
                .map(|item| match item {
                    Value::Uint(b) => u8::try_from(*b).ok(),
                    _ => None,
                })
                .collect(),
            _ => None,
        }
    }

    /// The zero value of `ty`.
    pub fn zero(ty: &Type) -> Value {
        if ty.implements(&Capability::TextMarshaler) && ty.kind() != Kind::Pointer {
            return Value::Text(String::new());
        }
        match ty.kind() {
            Kind::Bool => Value::Bool(false),
            Kind::Int(_) => Value::Int(0),
            Kind::Uint(_) | Kind::Uintptr => Value::Uint(0),
            Kind::Float32 | Kind::Float64 | Kind::Complex64 | Kind::Complex128 => Value::Float(0.0),
            Kind::String => Value::Str(String::new()),
            Kind::Array(len) => Value::List(vec![ty.elem().map_or(Value::Nil, Value::zero); len]),
            Kind::Struct => Value::Struct(ty.fields().iter().map(|f| Value::zero(&f.ty)).collect()),
            Kind::Slice | Kind::Map | Kind::Pointer | Kind::Interface | Kind::Chan | Kind::Func => Value::Nil,
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// ENCODING
// ————————————————————————————————————————————————————————————————————————————

pub fn encode(ty: &Type, value: &Value) -> Result<Json> {
    let fail = |reason: String| Error::Encode { ty: ty.to_string(), reason };
    if ty.implements(&Capability::TextMarshaler) {
        return match value {
            Value::Text(text) | Value::Str(text) => Ok(Json::String(text.clone())),
            other => Err(fail(format!("expected the text form, got {other:?}"))),
        };
    }
    match (ty.kind(), value) {
        (Kind::Bool, Value::Bool(b)) => Ok(Json::Bool(*b)),
        (Kind::Int(_), Value::Int(i)) => Ok(Json::from(*i)),
        (Kind::Uint(_) | Kind::Uintptr, Value::Uint(u)) => Ok(Json::from(*u)),
        (Kind::Float32 | Kind::Float64, Value::Float(f)) => {
            Number::from_f64(*f).map(Json::Number).ok_or_else(|| fail(format!("{f} has no JSON form")))
        }
        (Kind::String, Value::Str(s)) => Ok(Json::String(s.clone())),
        (Kind::Slice | Kind::Map | Kind::Pointer | Kind::Interface, Value::Nil) => Ok(Json::Null),
        (Kind::Slice, Value::List(items)) if is_base64_encoded(ty) => {
            let bytes = value.as_bytes().ok_or_else(|| fail(format!("{} items are not all bytes", items.len())))?;
            Ok(Json::String(STANDARD.encode(bytes)))
        }
        (Kind::Array(len), Value::List(items)) if items.len() != len => {
            Err(fail(format!("expected {len} elements, got {}", items.len())))
        }
        (Kind::Slice | Kind::Array(_), Value::List(items)) => {
            let elem = element(ty)?;
            items.iter().map(|item| encode(elem, item)).collect::<Result<Vec<_>>>().map(Json::Array)
        }
        (Kind::Map, Value::Map(entries)) => {
            let key_ty = ty.key_type().ok_or_else(|| fail("map without a key type".into()))?;
            let elem = element(ty)?;
            let mut encoded = entries
                .iter()
                .map(|(key, value)| Ok((map_key(key_ty, key)?, encode(elem, value)?)))
                .collect::<Result<Vec<_>>>()?;
            encoded.sort_by(|(a, _), (b, _)| a.cmp(b));
            Ok(Json::Object(encoded.into_iter().collect()))
        }
        (Kind::Pointer, Value::Ptr(inner)) => encode(element(ty)?, inner),
        (Kind::Interface, value) => encode_dynamic(value).ok_or_else(|| fail("dynamic struct values have no type".into())),
        (Kind::Struct, Value::Struct(values)) => {
            let mut object = Map::new();
            encode_struct(ty, values, &mut object)?;
            Ok(Json::Object(object))
        }
        (kind @ (Kind::Complex64 | Kind::Complex128 | Kind::Chan | Kind::Func), _) => {
            Err(fail(format!("kind {kind} has no JSON encoding")))
        }
        (_, other) => Err(fail(format!("unexpected value {other:?}"))),
    }
}

fn encode_struct(ty: &Type, values: &[Value], out: &mut Map<String, Json>) -> Result<()> {
    let fields = ty.fields();
    if fields.len() != values.len() {
        return Err(Error::Encode {
            ty: ty.to_string(),
            reason: format!("expected {} field values, got {}", fields.len(), values.len()),
        });
    }
    for (field, value) in fields.iter().zip(values) {
        let json = JsonTag::parse(field.json());
        if json.skip {
            continue;
        }
        if let Some(embedded) = embedded_struct(field, json) {
            match value {
                Value::Nil => {}
                Value::Ptr(inner) => encode_embedded(embedded, inner, out)?,
                value => encode_embedded(embedded, value, out)?,
            }
            continue;
        }
        if !field.exported {
            continue;
        }
        if json.omit_empty && is_empty(&field.ty, value) {
            continue;
        }
        let mut encoded = encode(&field.ty, value)?;
        if json.string && supports_string_encoding(&field.ty) && !encoded.is_null() {
            encoded = Json::String(encoded.to_string());
        }
        out.insert(key_of(field, json).to_string(), encoded);
    }
    Ok(())
}

/// Promoted fields never replace the embedding struct's own.
fn encode_embedded(ty: &Type, value: &Value, out: &mut Map<String, Json>) -> Result<()> {
    let Value::Struct(values) = value else {
        return Err(Error::Encode { ty: ty.to_string(), reason: format!("unexpected value {value:?}") });
    };
    let mut promoted = Map::new();
    encode_struct(ty, values, &mut promoted)?;
    for (name, value) in promoted {
        out.entry(name).or_insert(value);
    }
    Ok(())
}

fn encode_dynamic(value: &Value) -> Option<Json> {
    Some(match value {
        Value::Nil => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(i) => Json::from(*i),
        Value::Uint(u) => Json::from(*u),
        Value::Float(f) => Json::Number(Number::from_f64(*f)?),
        Value::Str(s) | Value::Text(s) => Json::String(s.clone()),
        Value::List(items) => Json::Array(items.iter().map(encode_dynamic).collect::<Option<_>>()?),
        Value::Map(entries) => {
            let mut encoded = entries
                .iter()
                .map(|(k, v)| Some((dynamic_key(k)?, encode_dynamic(v)?)))
                .collect::<Option<Vec<_>>>()?;
            encoded.sort_by(|(a, _), (b, _)| a.cmp(b));
            Json::Object(encoded.into_iter().collect())
        }
        Value::Ptr(inner) => encode_dynamic(inner)?,
        Value::Struct(_) => return None,
    })
}

fn dynamic_key(key: &Value) -> Option<String> {
    match key {
        Value::Str(s) | Value::Text(s) => Some(s.clone()),
        Value::Int(i) => Some(i.to_string()),
        Value::Uint(u) => Some(u.to_string()),
        _ => None,
    }
}

fn map_key(key_ty: &Type, key: &Value) -> Result<String> {
    let text = match (key_ty.kind(), key) {
        _ if key_ty.implements(&Capability::TextMarshaler) => match key {
            Value::Text(s) | Value::Str(s) => Some(s.clone()),
            _ => None,
        },
        (Kind::String, Value::Str(s)) => Some(s.clone()),
        (Kind::Int(_), Value::Int(i)) => Some(i.to_string()),
        (Kind::Uint(_) | Kind::Uintptr, Value::Uint(u)) => Some(u.to_string()),
        _ => None,
    };
    text.ok_or_else(|| Error::Encode { ty: key_ty.to_string(), reason: format!("unsupported map key {key:?}") })
}

fn is_empty(ty: &Type, value: &Value) -> bool {
    match value {
        Value::Nil => true,
        Value::Bool(b) => !b,
        Value::Int(i) => *i == 0,
        Value::Uint(u) => *u == 0,
        Value::Float(f) => *f == 0.0,
        Value::Str(s) => s.is_empty(),
        Value::Text(s) => ty.kind() == Kind::String && s.is_empty(),
        Value::List(items) => items.is_empty(),
        Value::Map(entries) => entries.is_empty(),
        Value::Struct(_) | Value::Ptr(_) => false,
    }
}

// ————————————————————————————————————————————————————————————————————————————
// DECODING
// ————————————————————————————————————————————————————————————————————————————

pub fn decode(ty: &Type, json: &Json) -> Result<Value> {
    let fail = |reason: String| Error::Decode { ty: ty.to_string(), reason };
    if json.is_null() {
        // Null leaves non-nilable values at their zero value.
        return Ok(Value::zero(ty));
    }
    if ty.implements(&Capability::TextMarshaler) && ty.kind() != Kind::Pointer {
        return match json {
            Json::String(s) => Ok(Value::Text(s.clone())),
            other => Err(fail(format!("expected a string, got {other}"))),
        };
    }
    match (ty.kind(), json) {
        (Kind::Bool, Json::Bool(b)) => Ok(Value::Bool(*b)),
        (Kind::Int(bits), Json::Number(n)) => {
            let i = n.as_i64().ok_or_else(|| fail(format!("{n} is not an integer")))?;
            if !fits_signed(i, bits) {
                return Err(fail(format!("{i} overflows")));
            }
            Ok(Value::Int(i))
        }
        (Kind::Uint(bits), Json::Number(n)) => {
            let u = n.as_u64().ok_or_else(|| fail(format!("{n} is not a non-negative integer")))?;
            if !fits_unsigned(u, bits) {
                return Err(fail(format!("{u} overflows")));
            }
            Ok(Value::Uint(u))
        }
        (Kind::Uintptr, Json::Number(n)) => {
            n.as_u64().map(Value::Uint).ok_or_else(|| fail(format!("{n} is not a non-negative integer")))
        }
        (Kind::Float32 | Kind::Float64, Json::Number(n)) => {
            n.as_f64().map(Value::Float).ok_or_else(|| fail(format!("{n} is not a number")))
        }
        (Kind::String, Json::String(s)) => Ok(Value::Str(s.clone())),
        (Kind::Slice, Json::String(s)) if is_base64_encoded(ty) => {
            let bytes = STANDARD.decode(s).map_err(|err| fail(err.to_string()))?;
            Ok(Value::bytes(&bytes))
        }
        (Kind::Slice, Json::Array(items)) => {
            let elem = element(ty)?;
            items.iter().map(|item| decode(elem, item)).collect::<Result<Vec<_>>>().map(Value::List)
        }
        (Kind::Array(len), Json::Array(items)) => {
            let elem = element(ty)?;
            let mut values = items.iter().take(len).map(|item| decode(elem, item)).collect::<Result<Vec<_>>>()?;
            values.resize(len, Value::zero(elem));
            Ok(Value::List(values))
        }
        (Kind::Map, Json::Object(object)) => {
            let key_ty = ty.key_type().ok_or_else(|| fail("map without a key type".into()))?;
            let elem = element(ty)?;
            object
                .iter()
                .map(|(key, value)| Ok((decode_key(key_ty, key)?, decode(elem, value)?)))
                .collect::<Result<Vec<_>>>()
                .map(Value::Map)
        }
        (Kind::Pointer, json) => Ok(Value::Ptr(Box::new(decode(element(ty)?, json)?))),
        (Kind::Interface, json) => Ok(decode_dynamic(json)),
        (Kind::Struct, Json::Object(object)) => decode_struct(ty, object),
        (_, other) => Err(fail(format!("unexpected JSON {other}"))),
    }
}

fn decode_struct(ty: &Type, object: &Map<String, Json>) -> Result<Value> {
    let own = own_keys(ty);
    // Promoted fields only see the keys the struct itself does not claim.
    let promoted: Map<String, Json> =
        object.iter().filter(|(k, _)| !own.contains(&k.as_str())).map(|(k, v)| (k.clone(), v.clone())).collect();
    let mut values = Vec::with_capacity(ty.fields().len());
    for field in ty.fields() {
        let json = JsonTag::parse(field.json());
        if json.skip {
            values.push(Value::zero(&field.ty));
            continue;
        }
        if let Some(embedded) = embedded_struct(field, json) {
            let value = decode_struct(embedded, &promoted)?;
            values.push(match field.ty.kind() {
                Kind::Pointer if !embedded_keys(embedded).iter().any(|k| promoted.contains_key(k)) => Value::Nil,
                Kind::Pointer => Value::Ptr(Box::new(value)),
                _ => value,
            });
            continue;
        }
        let name = key_of(field, json);
        let value = match object.get(name) {
            Some(found) if field.exported => {
                if json.string && supports_string_encoding(&field.ty) {
                    decode_quoted(&field.ty, found)?
                } else {
                    decode(&field.ty, found)?
                }
            }
            _ => Value::zero(&field.ty),
        };
        values.push(value);
    }
    Ok(Value::Struct(values))
}

fn decode_quoted(ty: &Type, json: &Json) -> Result<Value> {
    match json {
        Json::Null => Ok(Value::zero(ty)),
        Json::String(quoted) => {
            let inner: Json = serde_json::from_str(quoted)
                .map_err(|err| Error::Decode { ty: ty.to_string(), reason: format!("invalid quoted value: {err}") })?;
            decode(ty, &inner)
        }
        other => Err(Error::Decode { ty: ty.to_string(), reason: format!("expected a quoted value, got {other}") }),
    }
}

fn decode_key(key_ty: &Type, key: &str) -> Result<Value> {
    let fail = |reason: String| Error::Decode { ty: key_ty.to_string(), reason };
    if key_ty.implements(&Capability::TextMarshaler) {
        return Ok(Value::Text(key.to_string()));
    }
    match key_ty.kind() {
        Kind::String => Ok(Value::Str(key.to_string())),
        Kind::Int(_) => key.parse().map(Value::Int).map_err(|_| fail(format!("invalid key {key:?}"))),
        Kind::Uint(_) | Kind::Uintptr => key.parse().map(Value::Uint).map_err(|_| fail(format!("invalid key {key:?}"))),
        kind => Err(fail(format!("unsupported map key kind {kind}"))),
    }
}

fn decode_dynamic(json: &Json) -> Value {
    match json {
        Json::Null => Value::Nil,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => Value::Float(n.as_f64().unwrap_or_default()),
        Json::String(s) => Value::Str(s.clone()),
        Json::Array(items) => Value::List(items.iter().map(decode_dynamic).collect()),
        Json::Object(object) => {
            Value::Map(object.iter().map(|(k, v)| (Value::Str(k.clone()), decode_dynamic(v))).collect())
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn element(ty: &Type) -> Result<&Type> {
    ty.elem().ok_or_else(|| Error::Encode { ty: ty.to_string(), reason: "missing element type".into() })
}

fn is_base64_encoded(slice: &Type) -> bool {
    slice.elem().is_some_and(|elem| {
        elem.kind() == Kind::Uint(Bits::B8)
            && !elem.implements(&Capability::JsonMarshaler)
            && !elem.implements(&Capability::TextMarshaler)
    })
}

fn supports_string_encoding(ty: &Type) -> bool {
    match ty.kind() {
        Kind::Pointer => ty.elem().is_some_and(supports_string_encoding),
        Kind::Complex64 | Kind::Complex128 => false,
        kind => kind.is_scalar(),
    }
}

/// The struct promoted by an embedded field, if the field is one.
fn embedded_struct<'a>(field: &'a Field, json: JsonTag<'_>) -> Option<&'a Type> {
    if !field.anonymous || !json.name.is_empty() {
        return None;
    }
    let ty = match field.ty.kind() {
        Kind::Pointer => field.ty.elem()?,
        _ => &field.ty,
    };
    (ty.kind() == Kind::Struct).then_some(ty)
}

fn key_of<'a>(field: &'a Field, json: JsonTag<'a>) -> &'a str {
    if json.name.is_empty() { &field.name } else { json.name }
}

/// Keys of the struct's own, non-promoted fields.
fn own_keys(ty: &Type) -> Vec<&str> {
    ty.fields()
        .iter()
        .filter_map(|field| {
            let json = JsonTag::parse(field.json());
            let own = !json.skip && field.exported && embedded_struct(field, json).is_none();
            own.then(|| key_of(field, json))
        })
        .collect()
}

/// Every key the struct reads, promoted ones included.
fn embedded_keys(ty: &Type) -> Vec<String> {
    let mut keys: Vec<String> = own_keys(ty).into_iter().map(str::to_string).collect();
    for field in ty.fields() {
        let json = JsonTag::parse(field.json());
        if let Some(embedded) = embedded_struct(field, json).filter(|_| !json.skip) {
            keys.extend(embedded_keys(embedded));
        }
    }
    keys
}

fn fits_signed(i: i64, bits: Bits) -> bool {
    match bits {
        Bits::B8 => i8::try_from(i).is_ok(),
        Bits::B16 => i16::try_from(i).is_ok(),
        Bits::B32 => i32::try_from(i).is_ok(),
        Bits::Word | Bits::B64 => true,
    }
}

fn fits_unsigned(u: u64, bits: Bits) -> bool {
    match bits {
        Bits::B8 => u8::try_from(u).is_ok(),
        Bits::B16 => u16::try_from(u).is_ok(),
        Bits::B32 => u32::try_from(u).is_ok(),
        Bits::Word | Bits::B64 => true,
    }
}
