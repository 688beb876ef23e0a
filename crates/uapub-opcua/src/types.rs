// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Address-space value types shared by every part of the engine.
//!
//! - **NodeId**: the four OPC UA identifier kinds with parsing and formatting
//! - **QualifiedName**: namespace-qualified browse names (`2:Machine`)
//! - **NodeClass / AttributeId / BrowseDirection**: protocol enumerations
//! - **BuiltInType**: the built-in data type table (`ns=0;i=1..=29`)
//! - **Variant**: attribute values returned by reads
//! - **StatusCode**: the status codes the engine produces or inspects
//!
//! # Examples
//!
//! ```
//! use uapub_opcua::types::{NodeId, QualifiedName};
//!
//! let node: NodeId = "ns=2;s=Line1.Temperature".parse().unwrap();
//! assert_eq!(node.namespace_index, 2);
//!
//! let name = QualifiedName::from("2:Temperature");
//! assert_eq!(name.to_string_with_ns(), "2:Temperature");
//! ```

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::client::DataTypeDefinition;
use crate::error::{ConfigurationError, OpcUaError, OperationError};

// =============================================================================
// NodeId
// =============================================================================

/// OPC UA Node Identifier.
///
/// A NodeId uniquely identifies a node within an OPC UA server.
/// It consists of a namespace index and an identifier which can be
/// numeric, string, GUID, or opaque (byte string).
///
/// # Examples
///
/// ```
/// use uapub_opcua::types::NodeId;
///
/// let numeric = NodeId::numeric(2, 1001);
/// let parsed: NodeId = "ns=2;i=1001".parse().unwrap();
/// assert_eq!(numeric, parsed);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId {
    /// Namespace index (0 = OPC UA standard namespace).
    pub namespace_index: u16,

    /// The node identifier.
    pub identifier: NodeIdentifier,
}

impl NodeId {
    // =========================================================================
    // Constructors
    // =========================================================================

    /// Creates a numeric node ID.
    #[inline]
    pub const fn numeric(namespace_index: u16, value: u32) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::Numeric(value),
        }
    }

    /// Creates a string node ID.
    #[inline]
    pub fn string(namespace_index: u16, value: impl Into<String>) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::String(value.into()),
        }
    }

    /// Creates a GUID node ID.
    #[inline]
    pub fn guid(namespace_index: u16, value: Uuid) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::Guid(value),
        }
    }

    /// Creates an opaque (byte string) node ID.
    #[inline]
    pub fn opaque(namespace_index: u16, value: Vec<u8>) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::Opaque(value),
        }
    }

    // =========================================================================
    // Standard Node IDs
    // =========================================================================

    /// Root folder node (ns=0, i=84).
    pub const ROOT_FOLDER: NodeId = NodeId::numeric(0, 84);

    /// Objects folder node (ns=0, i=85).
    pub const OBJECTS_FOLDER: NodeId = NodeId::numeric(0, 85);

    /// Server node (ns=0, i=2253).
    pub const SERVER: NodeId = NodeId::numeric(0, 2253);

    /// BaseEventType (ns=0, i=2041).
    pub const BASE_EVENT_TYPE: NodeId = NodeId::numeric(0, 2041);

    /// ConditionType (ns=0, i=2782).
    pub const CONDITION_TYPE: NodeId = NodeId::numeric(0, 2782);

    /// BaseDataType (ns=0, i=24).
    pub const BASE_DATA_TYPE: NodeId = NodeId::numeric(0, 24);

    /// Structure (ns=0, i=22).
    pub const STRUCTURE: NodeId = NodeId::numeric(0, 22);

    /// Enumeration (ns=0, i=29).
    pub const ENUMERATION: NodeId = NodeId::numeric(0, 29);

    // =========================================================================
    // Properties
    // =========================================================================

    /// Returns `true` if this is in the standard namespace (ns=0).
    #[inline]
    pub const fn is_standard(&self) -> bool {
        self.namespace_index == 0
    }

    /// Returns `true` if this is a null node ID.
    ///
    /// Null is `i=0`, an empty string, the nil GUID or an empty byte string
    /// in namespace 0.
    pub fn is_null(&self) -> bool {
        if self.namespace_index != 0 {
            return false;
        }
        match &self.identifier {
            NodeIdentifier::Numeric(v) => *v == 0,
            NodeIdentifier::String(v) => v.is_empty(),
            NodeIdentifier::Guid(v) => v.is_nil(),
            NodeIdentifier::Opaque(v) => v.is_empty(),
        }
    }

    /// Returns the null node ID (ns=0, i=0).
    #[inline]
    pub const fn null() -> Self {
        Self::numeric(0, 0)
    }

    /// Returns the numeric value if this is a numeric identifier.
    #[inline]
    pub fn as_numeric(&self) -> Option<u32> {
        match &self.identifier {
            NodeIdentifier::Numeric(v) => Some(*v),
            _ => None,
        }
    }

    /// Converts to the OPC UA string format.
    ///
    /// Format: `ns=<namespace>;{i|s|g|b}=<identifier>`, with the namespace
    /// omitted for namespace 0.
    ///
    /// ```
    /// use uapub_opcua::types::NodeId;
    ///
    /// assert_eq!(NodeId::numeric(0, 85).to_opc_string(), "i=85");
    /// assert_eq!(NodeId::string(2, "Pump").to_opc_string(), "ns=2;s=Pump");
    /// ```
    pub fn to_opc_string(&self) -> String {
        if self.namespace_index == 0 {
            self.identifier.to_string()
        } else {
            format!("ns={};{}", self.namespace_index, self.identifier)
        }
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::null()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_opc_string())
    }
}

impl FromStr for NodeId {
    type Err = OpcUaError;

    /// Parses a NodeId from OPC UA string format.
    ///
    /// Supported formats:
    /// - `ns=2;i=1001` (numeric)
    /// - `ns=2;s=MyNode` (string)
    /// - `ns=2;g=550e8400-e29b-41d4-a716-446655440000` (GUID)
    /// - `ns=2;b=SGVsbG8=` (opaque, base64 encoded)
    /// - `i=1001`, `s=MyNode` (namespace 0)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = |reason: String| {
            OpcUaError::configuration(ConfigurationError::invalid_node_id(s, reason))
        };

        let (namespace_index, identifier_part) = match s.strip_prefix("ns=") {
            Some(rest) => {
                let (ns_str, id) = rest
                    .split_once(';')
                    .ok_or_else(|| invalid("Missing identifier after namespace".to_string()))?;
                let ns: u16 = ns_str
                    .parse()
                    .map_err(|_| invalid("Invalid namespace index".to_string()))?;
                (ns, id)
            }
            None => (0, s),
        };

        let identifier = if let Some(id) = identifier_part.strip_prefix("i=") {
            NodeIdentifier::Numeric(
                id.parse()
                    .map_err(|_| invalid("Invalid numeric identifier".to_string()))?,
            )
        } else if let Some(id) = identifier_part.strip_prefix("s=") {
            NodeIdentifier::String(id.to_string())
        } else if let Some(id) = identifier_part.strip_prefix("g=") {
            NodeIdentifier::Guid(
                Uuid::parse_str(id).map_err(|e| invalid(format!("Invalid GUID: {}", e)))?,
            )
        } else if let Some(id) = identifier_part.strip_prefix("b=") {
            NodeIdentifier::Opaque(
                BASE64
                    .decode(id)
                    .map_err(|e| invalid(format!("Invalid base64: {}", e)))?,
            )
        } else {
            return Err(invalid(
                "Unknown identifier type. Expected i=, s=, g=, or b=".to_string(),
            ));
        };

        Ok(Self {
            namespace_index,
            identifier,
        })
    }
}

// =============================================================================
// NodeIdentifier
// =============================================================================

/// OPC UA node identifier kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum NodeIdentifier {
    /// Numeric identifier.
    Numeric(u32),

    /// String identifier.
    String(String),

    /// GUID identifier.
    Guid(Uuid),

    /// Opaque identifier.
    Opaque(Vec<u8>),
}

impl fmt::Display for NodeIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(v) => write!(f, "i={}", v),
            Self::String(v) => write!(f, "s={}", v),
            Self::Guid(v) => write!(f, "g={}", v),
            Self::Opaque(v) => write!(f, "b={}", BASE64.encode(v)),
        }
    }
}

// =============================================================================
// QualifiedName
// =============================================================================

/// A browse name qualified by namespace index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct QualifiedName {
    /// Namespace index.
    pub namespace_index: u16,
    /// Name part.
    pub name: String,
}

impl QualifiedName {
    /// Creates a qualified name.
    pub fn new(namespace_index: u16, name: impl Into<String>) -> Self {
        Self {
            namespace_index,
            name: name.into(),
        }
    }

    /// Returns `true` if the name part is empty.
    pub fn is_null(&self) -> bool {
        self.name.is_empty()
    }

    /// Formats as `ns:name`, omitting the prefix for namespace 0.
    pub fn to_string_with_ns(&self) -> String {
        if self.namespace_index == 0 {
            self.name.clone()
        } else {
            format!("{}:{}", self.namespace_index, self.name)
        }
    }
}

impl From<&str> for QualifiedName {
    /// Parses `"2:Name"`; anything without a numeric prefix lands in namespace 0.
    fn from(s: &str) -> Self {
        if let Some((ns, name)) = s.split_once(':') {
            if let Ok(ns) = ns.parse::<u16>() {
                return Self::new(ns, name);
            }
        }
        Self::new(0, s)
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string_with_ns())
    }
}

// =============================================================================
// BrowseDirection
// =============================================================================

/// OPC UA browse direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BrowseDirection {
    /// Browse forward references.
    #[default]
    Forward,

    /// Browse inverse references.
    Inverse,

    /// Browse both forward and inverse references.
    Both,
}

// =============================================================================
// NodeClass
// =============================================================================

/// OPC UA node class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NodeClass {
    /// Class could not be determined.
    #[default]
    Unspecified,
    /// Object node.
    Object,
    /// Variable node.
    Variable,
    /// Method node.
    Method,
    /// Object type node.
    ObjectType,
    /// Variable type node.
    VariableType,
    /// Reference type node.
    ReferenceType,
    /// Data type node.
    DataType,
    /// View node.
    View,
}

impl NodeClass {
    /// Returns the OPC UA bit mask value.
    pub const fn value(&self) -> u32 {
        match self {
            Self::Unspecified => 0,
            Self::Object => 1,
            Self::Variable => 2,
            Self::Method => 4,
            Self::ObjectType => 8,
            Self::VariableType => 16,
            Self::ReferenceType => 32,
            Self::DataType => 64,
            Self::View => 128,
        }
    }

    /// Creates from OPC UA value.
    pub fn from_value(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Unspecified),
            1 => Some(Self::Object),
            2 => Some(Self::Variable),
            4 => Some(Self::Method),
            8 => Some(Self::ObjectType),
            16 => Some(Self::VariableType),
            32 => Some(Self::ReferenceType),
            64 => Some(Self::DataType),
            128 => Some(Self::View),
            _ => None,
        }
    }

    /// Returns `true` if this class is selected by a node class mask.
    #[inline]
    pub const fn is_in(&self, mask: u32) -> bool {
        self.value() & mask != 0
    }
}

impl fmt::Display for NodeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// =============================================================================
// AttributeId
// =============================================================================

/// OPC UA attribute IDs read by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AttributeId {
    /// Node ID attribute.
    NodeId,
    /// Node class attribute.
    NodeClass,
    /// Browse name attribute.
    BrowseName,
    /// Display name attribute.
    DisplayName,
    /// Description attribute.
    Description,
    /// Event notifier attribute.
    EventNotifier,
    /// Value attribute.
    #[default]
    Value,
    /// Data type attribute.
    DataType,
    /// Value rank attribute.
    ValueRank,
    /// Array dimensions attribute.
    ArrayDimensions,
    /// Data type definition attribute.
    DataTypeDefinition,
}

impl AttributeId {
    /// Returns the OPC UA numeric value.
    pub const fn value(&self) -> u32 {
        match self {
            Self::NodeId => 1,
            Self::NodeClass => 2,
            Self::BrowseName => 3,
            Self::DisplayName => 4,
            Self::Description => 5,
            Self::EventNotifier => 12,
            Self::Value => 13,
            Self::DataType => 14,
            Self::ValueRank => 15,
            Self::ArrayDimensions => 16,
            Self::DataTypeDefinition => 23,
        }
    }
}

/// EventNotifier bit signalling that the node can be subscribed to for events.
pub const EVENT_NOTIFIER_SUBSCRIBE_TO_EVENTS: u8 = 0x01;

// =============================================================================
// BuiltInType
// =============================================================================

/// The OPC UA built-in types, identified by `ns=0;i=<value>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum BuiltInType {
    Null = 0,
    Boolean = 1,
    SByte = 2,
    Byte = 3,
    Int16 = 4,
    UInt16 = 5,
    Int32 = 6,
    UInt32 = 7,
    Int64 = 8,
    UInt64 = 9,
    Float = 10,
    Double = 11,
    String = 12,
    DateTime = 13,
    Guid = 14,
    ByteString = 15,
    XmlElement = 16,
    NodeId = 17,
    ExpandedNodeId = 18,
    StatusCode = 19,
    QualifiedName = 20,
    LocalizedText = 21,
    ExtensionObject = 22,
    DataValue = 23,
    #[default]
    Variant = 24,
    DiagnosticInfo = 25,
    Number = 26,
    Integer = 27,
    UInteger = 28,
    Enumeration = 29,
}

impl BuiltInType {
    /// Creates from the numeric type id.
    pub fn from_value(value: u32) -> Option<Self> {
        use BuiltInType::*;
        const TABLE: [BuiltInType; 30] = [
            Null, Boolean, SByte, Byte, Int16, UInt16, Int32, UInt32, Int64, UInt64, Float,
            Double, String, DateTime, Guid, ByteString, XmlElement, NodeId, ExpandedNodeId,
            StatusCode, QualifiedName, LocalizedText, ExtensionObject, DataValue, Variant,
            DiagnosticInfo, Number, Integer, UInteger, Enumeration,
        ];
        TABLE.get(value as usize).copied()
    }

    /// Returns the built-in type a data type node id names, if any.
    ///
    /// Only `ns=0` numeric ids up to `i=29` are built-in.
    pub fn from_node_id(node_id: &NodeId) -> Option<Self> {
        if node_id.namespace_index != 0 {
            return None;
        }
        node_id.as_numeric().and_then(Self::from_value)
    }

    /// Returns `true` if the data type node id is a built-in type.
    pub fn is_built_in(node_id: &NodeId) -> bool {
        Self::from_node_id(node_id).is_some()
    }

    /// Returns the data type node id of this built-in type.
    pub const fn node_id(&self) -> NodeId {
        NodeId::numeric(0, *self as u32)
    }

    /// Returns the numeric type id.
    pub const fn value(&self) -> u8 {
        *self as u8
    }
}

// =============================================================================
// Variant
// =============================================================================

/// Attribute value representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", content = "value")]
pub enum Variant {
    /// Null value.
    #[default]
    Null,
    /// Boolean value.
    Boolean(bool),
    /// Signed byte.
    SByte(i8),
    /// Unsigned byte.
    Byte(u8),
    /// 16-bit signed integer.
    Int16(i16),
    /// 16-bit unsigned integer.
    UInt16(u16),
    /// 32-bit signed integer.
    Int32(i32),
    /// 32-bit unsigned integer.
    UInt32(u32),
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit unsigned integer.
    UInt64(u64),
    /// 32-bit float.
    Float(f32),
    /// 64-bit double.
    Double(f64),
    /// String value.
    String(String),
    /// Date/time value.
    DateTime(chrono::DateTime<chrono::Utc>),
    /// GUID value.
    Guid(Uuid),
    /// Byte string.
    ByteString(Vec<u8>),
    /// Node id value.
    NodeId(NodeId),
    /// Qualified name value.
    QualifiedName(QualifiedName),
    /// Localized text (text part only).
    LocalizedText(String),
    /// Data type definition attribute value.
    DataTypeDefinition(Box<DataTypeDefinition>),
    /// Array of values.
    Array(Vec<Variant>),
}

impl Variant {
    /// Returns the built-in type of this value.
    pub fn built_in_type(&self) -> BuiltInType {
        match self {
            Self::Null => BuiltInType::Null,
            Self::Boolean(_) => BuiltInType::Boolean,
            Self::SByte(_) => BuiltInType::SByte,
            Self::Byte(_) => BuiltInType::Byte,
            Self::Int16(_) => BuiltInType::Int16,
            Self::UInt16(_) => BuiltInType::UInt16,
            Self::Int32(_) => BuiltInType::Int32,
            Self::UInt32(_) => BuiltInType::UInt32,
            Self::Int64(_) => BuiltInType::Int64,
            Self::UInt64(_) => BuiltInType::UInt64,
            Self::Float(_) => BuiltInType::Float,
            Self::Double(_) => BuiltInType::Double,
            Self::String(_) => BuiltInType::String,
            Self::DateTime(_) => BuiltInType::DateTime,
            Self::Guid(_) => BuiltInType::Guid,
            Self::ByteString(_) => BuiltInType::ByteString,
            Self::NodeId(_) => BuiltInType::NodeId,
            Self::QualifiedName(_) => BuiltInType::QualifiedName,
            Self::LocalizedText(_) => BuiltInType::LocalizedText,
            Self::DataTypeDefinition(_) => BuiltInType::ExtensionObject,
            Self::Array(_) => BuiltInType::Variant,
        }
    }

    /// Returns `true` if this is a null value.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Attempts to get the value as an i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::SByte(v) => Some(*v as i64),
            Self::Byte(v) => Some(*v as i64),
            Self::Int16(v) => Some(*v as i64),
            Self::UInt16(v) => Some(*v as i64),
            Self::Int32(v) => Some(*v as i64),
            Self::UInt32(v) => Some(*v as i64),
            Self::Int64(v) => Some(*v),
            Self::UInt64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Attempts to get the value as a string slice.
    ///
    /// Localized text yields its text part.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) | Self::LocalizedText(v) => Some(v),
            _ => None,
        }
    }

    /// Attempts to get the value as a node id.
    pub fn as_node_id(&self) -> Option<&NodeId> {
        match self {
            Self::NodeId(v) => Some(v),
            _ => None,
        }
    }

    /// Attempts to get the value as a qualified name.
    pub fn as_qualified_name(&self) -> Option<&QualifiedName> {
        match self {
            Self::QualifiedName(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Boolean(v) => write!(f, "{}", v),
            Self::SByte(v) => write!(f, "{}", v),
            Self::Byte(v) => write!(f, "{}", v),
            Self::Int16(v) => write!(f, "{}", v),
            Self::UInt16(v) => write!(f, "{}", v),
            Self::Int32(v) => write!(f, "{}", v),
            Self::UInt32(v) => write!(f, "{}", v),
            Self::Int64(v) => write!(f, "{}", v),
            Self::UInt64(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Double(v) => write!(f, "{}", v),
            Self::String(v) | Self::LocalizedText(v) => write!(f, "{}", v),
            Self::DateTime(v) => write!(f, "{}", v.to_rfc3339()),
            Self::Guid(v) => write!(f, "{}", v),
            Self::ByteString(v) => write!(f, "{}", BASE64.encode(v)),
            Self::NodeId(v) => write!(f, "{}", v),
            Self::QualifiedName(v) => write!(f, "{}", v),
            Self::DataTypeDefinition(_) => write!(f, "<definition>"),
            Self::Array(values) => {
                write!(f, "[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
        }
    }
}

// =============================================================================
// StatusCode
// =============================================================================

/// OPC UA status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct StatusCode(pub u32);

impl StatusCode {
    /// Good.
    pub const GOOD: StatusCode = StatusCode(0);
    /// BadUnexpectedError.
    pub const BAD_UNEXPECTED_ERROR: StatusCode = StatusCode(0x8001_0000);
    /// BadCommunicationError.
    pub const BAD_COMMUNICATION_ERROR: StatusCode = StatusCode(0x8005_0000);
    /// BadTimeout.
    pub const BAD_TIMEOUT: StatusCode = StatusCode(0x800A_0000);
    /// BadDataTypeIdUnknown.
    pub const BAD_DATA_TYPE_ID_UNKNOWN: StatusCode = StatusCode(0x8011_0000);
    /// BadRequestCancelledByClient.
    pub const BAD_REQUEST_CANCELLED_BY_CLIENT: StatusCode = StatusCode(0x802C_0000);
    /// BadNodeIdInvalid.
    pub const BAD_NODE_ID_INVALID: StatusCode = StatusCode(0x8033_0000);
    /// BadNodeIdUnknown.
    pub const BAD_NODE_ID_UNKNOWN: StatusCode = StatusCode(0x8034_0000);
    /// BadNotSupported.
    pub const BAD_NOT_SUPPORTED: StatusCode = StatusCode(0x803D_0000);
    /// BadNotFound.
    pub const BAD_NOT_FOUND: StatusCode = StatusCode(0x803E_0000);
    /// BadContinuationPointInvalid.
    pub const BAD_CONTINUATION_POINT_INVALID: StatusCode = StatusCode(0x804A_0000);
    /// BadBrowseNameInvalid.
    pub const BAD_BROWSE_NAME_INVALID: StatusCode = StatusCode(0x8060_0000);
    /// BadNoMatch.
    pub const BAD_NO_MATCH: StatusCode = StatusCode(0x806F_0000);
    /// BadConfigurationError.
    pub const BAD_CONFIGURATION_ERROR: StatusCode = StatusCode(0x8089_0000);
    /// BadInvalidArgument.
    pub const BAD_INVALID_ARGUMENT: StatusCode = StatusCode(0x80AB_0000);

    /// Returns `true` if the severity bits are good.
    #[inline]
    pub const fn is_good(&self) -> bool {
        self.0 & 0xC000_0000 == 0
    }

    /// Returns `true` if the status is bad.
    #[inline]
    pub const fn is_bad(&self) -> bool {
        self.0 & 0x8000_0000 != 0
    }

    /// Returns the symbolic name of the status code.
    pub fn name(&self) -> &'static str {
        OperationError::status_code_name(self.0)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:08X})", self.name(), self.0)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_parse() {
        let node: NodeId = "ns=2;i=1001".parse().unwrap();
        assert_eq!(node, NodeId::numeric(2, 1001));

        let node: NodeId = "s=Pump".parse().unwrap();
        assert_eq!(node, NodeId::string(0, "Pump"));

        let node: NodeId = "ns=3;b=SGVsbG8=".parse().unwrap();
        assert_eq!(node, NodeId::opaque(3, b"Hello".to_vec()));

        assert!("ns=x;i=1".parse::<NodeId>().is_err());
        assert!("ns=2".parse::<NodeId>().is_err());
        assert!("q=1".parse::<NodeId>().is_err());
    }

    #[test]
    fn test_node_id_format_roundtrip() {
        let node = NodeId::string(4, "Line1.Motor");
        assert_eq!(node.to_string(), "ns=4;s=Line1.Motor");
        assert_eq!(node.to_string().parse::<NodeId>().unwrap(), node);
        assert_eq!(NodeId::OBJECTS_FOLDER.to_string(), "i=85");
    }

    #[test]
    fn test_node_id_null() {
        assert!(NodeId::null().is_null());
        assert!(NodeId::string(0, "").is_null());
        assert!(!NodeId::string(1, "").is_null());
        assert!(!NodeId::OBJECTS_FOLDER.is_null());
    }

    #[test]
    fn test_qualified_name_parse() {
        let name = QualifiedName::from("2:Temperature");
        assert_eq!(name, QualifiedName::new(2, "Temperature"));
        assert_eq!(QualifiedName::from("Plain").namespace_index, 0);
        assert_eq!(QualifiedName::from("a:b").name, "a:b");
        assert_eq!(QualifiedName::new(0, "Objects").to_string_with_ns(), "Objects");
    }

    #[test]
    fn test_node_class_mask() {
        let mask = NodeClass::Object.value() | NodeClass::Variable.value();
        assert!(NodeClass::Object.is_in(mask));
        assert!(NodeClass::Variable.is_in(mask));
        assert!(!NodeClass::Method.is_in(mask));
        assert!(!NodeClass::Unspecified.is_in(mask));
        assert_eq!(NodeClass::from_value(16), Some(NodeClass::VariableType));
    }

    #[test]
    fn test_built_in_type() {
        assert_eq!(
            BuiltInType::from_node_id(&NodeId::numeric(0, 6)),
            Some(BuiltInType::Int32)
        );
        assert_eq!(
            BuiltInType::from_node_id(&NodeId::ENUMERATION),
            Some(BuiltInType::Enumeration)
        );
        assert!(!BuiltInType::is_built_in(&NodeId::numeric(0, 30)));
        assert!(!BuiltInType::is_built_in(&NodeId::numeric(2, 6)));
        assert_eq!(BuiltInType::Double.node_id(), NodeId::numeric(0, 11));
    }

    #[test]
    fn test_status_code() {
        assert!(StatusCode::GOOD.is_good());
        assert!(StatusCode::BAD_NOT_FOUND.is_bad());
        assert_eq!(StatusCode::BAD_NOT_FOUND.name(), "BadNotFound");
    }

    #[test]
    fn test_attribute_id() {
        assert_eq!(AttributeId::DisplayName.value(), 4);
        assert_eq!(AttributeId::EventNotifier.value(), 12);
        assert_eq!(AttributeId::DataTypeDefinition.value(), 23);
    }
}
