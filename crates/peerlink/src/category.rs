//! Runtime type categories
//!
//! The closed set of shapes a value may take when it crosses the boundary
//! without a static converter. The managed side reports a category through
//! `BridgeSupport.typeDiscriminator`, using the exact strings below.

use std::fmt;
use std::str::FromStr;

use crate::error::BridgeError;

/// Category of a value crossing without a static converter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeCategory {
    /// Boxed boolean
    Boolean,
    /// Boxed 8-bit integer
    Byte,
    /// Boxed UTF-16 code unit
    Char,
    /// Boxed 16-bit integer
    Short,
    /// Boxed 32-bit integer
    Int,
    /// Boxed 64-bit integer
    Long,
    /// Boxed 32-bit float
    Float,
    /// Boxed 64-bit float
    Double,
    /// String
    String,
    /// Raw byte array
    ByteArray,
    /// Idiomatic date
    Date,
    /// Idiomatic list
    List,
    /// Idiomatic map
    Map,
    /// Idiomatic result
    Result,
    /// Idiomatic set
    Set,
    /// Idiomatic UUID
    Uuid,
    /// Idiomatic URI
    Uri,
    /// Bridged array wrapper
    BridgedList,
    /// Bridged data wrapper
    BridgedData,
    /// Bridged date wrapper
    BridgedDate,
    /// Bridged dictionary wrapper
    BridgedMap,
    /// Bridged result wrapper
    BridgedResult,
    /// Bridged set wrapper
    BridgedSet,
    /// Bridged UUID wrapper
    BridgedUuid,
    /// Bridged URL wrapper
    BridgedUri,
    /// Anything else
    Other,
}

impl TypeCategory {
    /// Every category, in discriminator order
    pub const ALL: [TypeCategory; 26] = [
        TypeCategory::Boolean,
        TypeCategory::Byte,
        TypeCategory::Char,
        TypeCategory::Short,
        TypeCategory::Int,
        TypeCategory::Long,
        TypeCategory::Float,
        TypeCategory::Double,
        TypeCategory::String,
        TypeCategory::ByteArray,
        TypeCategory::Date,
        TypeCategory::List,
        TypeCategory::Map,
        TypeCategory::Result,
        TypeCategory::Set,
        TypeCategory::Uuid,
        TypeCategory::Uri,
        TypeCategory::BridgedList,
        TypeCategory::BridgedData,
        TypeCategory::BridgedDate,
        TypeCategory::BridgedMap,
        TypeCategory::BridgedResult,
        TypeCategory::BridgedSet,
        TypeCategory::BridgedUuid,
        TypeCategory::BridgedUri,
        TypeCategory::Other,
    ];

    /// Discriminator string
    pub const fn as_str(self) -> &'static str {
        match self {
            TypeCategory::Boolean => "boolean",
            TypeCategory::Byte => "byte",
            TypeCategory::Char => "char",
            TypeCategory::Short => "short",
            TypeCategory::Int => "int",
            TypeCategory::Long => "long",
            TypeCategory::Float => "float",
            TypeCategory::Double => "double",
            TypeCategory::String => "string",
            TypeCategory::ByteArray => "byteArray",
            TypeCategory::Date => "date",
            TypeCategory::List => "list",
            TypeCategory::Map => "map",
            TypeCategory::Result => "result",
            TypeCategory::Set => "set",
            TypeCategory::Uuid => "uuid",
            TypeCategory::Uri => "uri",
            TypeCategory::BridgedList => "bridgedList",
            TypeCategory::BridgedData => "bridgedData",
            TypeCategory::BridgedDate => "bridgedDate",
            TypeCategory::BridgedMap => "bridgedMap",
            TypeCategory::BridgedResult => "bridgedResult",
            TypeCategory::BridgedSet => "bridgedSet",
            TypeCategory::BridgedUuid => "bridgedUuid",
            TypeCategory::BridgedUri => "bridgedUri",
            TypeCategory::Other => "other",
        }
    }

    /// Category for a discriminator string. Unknown strings map to `Other`.
    pub fn from_discriminator(s: &str) -> Self {
        s.parse().unwrap_or(TypeCategory::Other)
    }

    /// Whether this is one of the bridged wrapper forms
    pub const fn is_bridged(self) -> bool {
        matches!(
            self,
            TypeCategory::BridgedList
                | TypeCategory::BridgedData
                | TypeCategory::BridgedDate
                | TypeCategory::BridgedMap
                | TypeCategory::BridgedResult
                | TypeCategory::BridgedSet
                | TypeCategory::BridgedUuid
                | TypeCategory::BridgedUri
        )
    }

    /// The bridged wrapper form of an idiomatic container category, and
    /// the reverse. Scalars, strings and `Other` map to themselves.
    pub const fn counterpart(self) -> Self {
        match self {
            TypeCategory::ByteArray => TypeCategory::BridgedData,
            TypeCategory::Date => TypeCategory::BridgedDate,
            TypeCategory::List => TypeCategory::BridgedList,
            TypeCategory::Map => TypeCategory::BridgedMap,
            TypeCategory::Result => TypeCategory::BridgedResult,
            TypeCategory::Set => TypeCategory::BridgedSet,
            TypeCategory::Uuid => TypeCategory::BridgedUuid,
            TypeCategory::Uri => TypeCategory::BridgedUri,
            TypeCategory::BridgedData => TypeCategory::ByteArray,
            TypeCategory::BridgedDate => TypeCategory::Date,
            TypeCategory::BridgedList => TypeCategory::List,
            TypeCategory::BridgedMap => TypeCategory::Map,
            TypeCategory::BridgedResult => TypeCategory::Result,
            TypeCategory::BridgedSet => TypeCategory::Set,
            TypeCategory::BridgedUuid => TypeCategory::Uuid,
            TypeCategory::BridgedUri => TypeCategory::Uri,
            other => other,
        }
    }
}

impl fmt::Display for TypeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TypeCategory {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TypeCategory::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| BridgeError::InvalidValue(format!("unknown type category `{}`", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strings_roundtrip() {
        for category in TypeCategory::ALL {
            assert_eq!(category.as_str().parse::<TypeCategory>().unwrap(), category);
        }
    }

    #[test]
    fn test_unknown_is_other() {
        assert_eq!(TypeCategory::from_discriminator("widget"), TypeCategory::Other);
        assert!("widget".parse::<TypeCategory>().is_err());
    }

    #[test]
    fn test_bridged_forms() {
        let bridged: Vec<_> = TypeCategory::ALL.iter().filter(|c| c.is_bridged()).collect();
        assert_eq!(bridged.len(), 8);
        for category in TypeCategory::ALL {
            assert_eq!(category.counterpart().counterpart(), category);
        }
        assert_eq!(TypeCategory::List.counterpart(), TypeCategory::BridgedList);
        assert_eq!(TypeCategory::Int.counterpart(), TypeCategory::Int);
    }
}
