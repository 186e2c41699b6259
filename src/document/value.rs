//! Typed attribute values stored in documents.

use serde::{Deserialize, Serialize};

/// Declared type of an attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    #[serde(rename = "bool")]
    Bool,
    #[serde(rename = "int")]
    Int,
    #[serde(rename = "int64")]
    Int64,
    #[serde(rename = "float")]
    Float,
    #[serde(rename = "double")]
    Double,
    #[serde(rename = "string")]
    String,
    #[serde(rename = "token")]
    Token,
    #[serde(rename = "asset")]
    Asset,
    #[serde(rename = "float2")]
    Float2,
    #[serde(rename = "float3")]
    Float3,
    #[serde(rename = "float4")]
    Float4,
    #[serde(rename = "quatf")]
    Quat,
    #[serde(rename = "matrix4d")]
    Matrix4d,
    #[serde(rename = "bool[]")]
    BoolArray,
    #[serde(rename = "int[]")]
    IntArray,
    #[serde(rename = "int64[]")]
    Int64Array,
    #[serde(rename = "float[]")]
    FloatArray,
    #[serde(rename = "double[]")]
    DoubleArray,
    #[serde(rename = "float2[]")]
    Float2Array,
    #[serde(rename = "float3[]")]
    Float3Array,
    #[serde(rename = "double3[]")]
    Double3Array,
    #[serde(rename = "float4[]")]
    Float4Array,
    #[serde(rename = "quatf[]")]
    QuatArray,
    #[serde(rename = "token[]")]
    TokenArray,
    #[serde(rename = "asset[]")]
    AssetArray,
}

impl ValueType {
    /// Human readable type name, matching the serialized form.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Int64 => "int64",
            Self::Float => "float",
            Self::Double => "double",
            Self::String => "string",
            Self::Token => "token",
            Self::Asset => "asset",
            Self::Float2 => "float2",
            Self::Float3 => "float3",
            Self::Float4 => "float4",
            Self::Quat => "quatf",
            Self::Matrix4d => "matrix4d",
            Self::BoolArray => "bool[]",
            Self::IntArray => "int[]",
            Self::Int64Array => "int64[]",
            Self::FloatArray => "float[]",
            Self::DoubleArray => "double[]",
            Self::Float2Array => "float2[]",
            Self::Float3Array => "float3[]",
            Self::Double3Array => "double3[]",
            Self::Float4Array => "float4[]",
            Self::QuatArray => "quatf[]",
            Self::TokenArray => "token[]",
            Self::AssetArray => "asset[]",
        }
    }

    pub const fn is_array(self) -> bool {
        matches!(
            self,
            Self::BoolArray
                | Self::IntArray
                | Self::Int64Array
                | Self::FloatArray
                | Self::DoubleArray
                | Self::Float2Array
                | Self::Float3Array
                | Self::Double3Array
                | Self::Float4Array
                | Self::QuatArray
                | Self::TokenArray
                | Self::AssetArray
        )
    }
}

/// An attribute value, or the `Blocked` "no value" sentinel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "v", rename_all = "snake_case")]
pub enum Value {
    /// Explicit absence of a value at a time. Weaker samples stay intact.
    Blocked,
    Bool(bool),
    Int(i32),
    Int64(i64),
    Float(f32),
    Double(f64),
    String(String),
    Token(String),
    Asset(String),
    Float2([f32; 2]),
    Float3([f32; 3]),
    Float4([f32; 4]),
    Quat([f32; 4]),
    Matrix4d([f64; 16]),
    BoolArray(Vec<bool>),
    IntArray(Vec<i32>),
    Int64Array(Vec<i64>),
    FloatArray(Vec<f32>),
    DoubleArray(Vec<f64>),
    Float2Array(Vec<[f32; 2]>),
    Float3Array(Vec<[f32; 3]>),
    Double3Array(Vec<[f64; 3]>),
    Float4Array(Vec<[f32; 4]>),
    QuatArray(Vec<[f32; 4]>),
    TokenArray(Vec<String>),
    AssetArray(Vec<String>),
}

impl Value {
    /// Declared type of this value, `None` for [`Value::Blocked`].
    pub fn value_type(&self) -> Option<ValueType> {
        let t = match self {
            Value::Blocked => return None,
            Value::Bool(_) => ValueType::Bool,
            Value::Int(_) => ValueType::Int,
            Value::Int64(_) => ValueType::Int64,
            Value::Float(_) => ValueType::Float,
            Value::Double(_) => ValueType::Double,
            Value::String(_) => ValueType::String,
            Value::Token(_) => ValueType::Token,
            Value::Asset(_) => ValueType::Asset,
            Value::Float2(_) => ValueType::Float2,
            Value::Float3(_) => ValueType::Float3,
            Value::Float4(_) => ValueType::Float4,
            Value::Quat(_) => ValueType::Quat,
            Value::Matrix4d(_) => ValueType::Matrix4d,
            Value::BoolArray(_) => ValueType::BoolArray,
            Value::IntArray(_) => ValueType::IntArray,
            Value::Int64Array(_) => ValueType::Int64Array,
            Value::FloatArray(_) => ValueType::FloatArray,
            Value::DoubleArray(_) => ValueType::DoubleArray,
            Value::Float2Array(_) => ValueType::Float2Array,
            Value::Float3Array(_) => ValueType::Float3Array,
            Value::Double3Array(_) => ValueType::Double3Array,
            Value::Float4Array(_) => ValueType::Float4Array,
            Value::QuatArray(_) => ValueType::QuatArray,
            Value::TokenArray(_) => ValueType::TokenArray,
            Value::AssetArray(_) => ValueType::AssetArray,
        };
        Some(t)
    }

    #[inline]
    pub fn is_blocked(&self) -> bool {
        matches!(self, Value::Blocked)
    }

    /// Element count for arrays, 1 for scalars, 0 when blocked.
    pub fn len(&self) -> usize {
        match self {
            Value::Blocked => 0,
            Value::BoolArray(v) => v.len(),
            Value::IntArray(v) => v.len(),
            Value::Int64Array(v) => v.len(),
            Value::FloatArray(v) => v.len(),
            Value::DoubleArray(v) => v.len(),
            Value::Float2Array(v) => v.len(),
            Value::Float3Array(v) => v.len(),
            Value::Double3Array(v) => v.len(),
            Value::Float4Array(v) => v.len(),
            Value::QuatArray(v) => v.len(),
            Value::TokenArray(v) => v.len(),
            Value::AssetArray(v) => v.len(),
            _ => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_token(&self) -> Option<&str> {
        match self {
            Value::Token(s) | Value::String(s) | Value::Asset(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_float3_array(&self) -> Option<&[[f32; 3]]> {
        match self {
            Value::Float3Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_int_array(&self) -> Option<&[i32]> {
        match self {
            Value::IntArray(v) => Some(v),
            _ => None,
        }
    }
}

/// How array elements map onto geometry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Interpolation {
    /// One value for the whole primitive.
    Constant,
    /// One value per face / curve / group.
    Uniform,
    /// One value per point.
    Vertex,
    /// One value per face corner.
    FaceVarying,
}

impl Interpolation {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Constant => "constant",
            Self::Uniform => "uniform",
            Self::Vertex => "vertex",
            Self::FaceVarying => "faceVarying",
        }
    }
}
