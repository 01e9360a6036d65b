//! Serde adapters for curve types.
//!
//! Points and scalars travel as lowercase hex of their canonical 32-byte
//! compressed encoding. Decoding goes through the same validating parsers
//! as the binary codec.

use serde::{Deserialize, Deserializer, Serializer};

use crate::operation::{
    Point, Scalar, point_from_bytes, point_to_bytes, scalar_from_bytes, scalar_to_bytes,
};

fn decode_hex<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let s = String::deserialize(deserializer)?;
    hex::decode(s).map_err(|e| serde::de::Error::custom(format!("Invalid hex: {}", e)))
}

pub mod point {
    use super::*;

    pub fn serialize<S: Serializer>(p: &Point, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(point_to_bytes(p)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Point, D::Error> {
        let bytes = decode_hex(deserializer)?;
        point_from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

pub mod point_opt {
    use super::*;

    pub fn serialize<S: Serializer>(p: &Option<Point>, serializer: S) -> Result<S::Ok, S::Error> {
        match p {
            Some(p) => serializer.serialize_some(&hex::encode(point_to_bytes(p))),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Point>, D::Error> {
        let s: Option<String> = Option::deserialize(deserializer)?;
        s.map(|s| {
            let bytes = hex::decode(s).map_err(serde::de::Error::custom)?;
            point_from_bytes(&bytes).map_err(serde::de::Error::custom)
        })
        .transpose()
    }
}

pub mod scalar {
    use super::*;

    pub fn serialize<S: Serializer>(s: &Scalar, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(scalar_to_bytes(s)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Scalar, D::Error> {
        let bytes = decode_hex(deserializer)?;
        scalar_from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

pub mod scalar_opt {
    use super::*;

    pub fn serialize<S: Serializer>(s: &Option<Scalar>, serializer: S) -> Result<S::Ok, S::Error> {
        match s {
            Some(s) => serializer.serialize_some(&hex::encode(scalar_to_bytes(s))),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Scalar>, D::Error> {
        let s: Option<String> = Option::deserialize(deserializer)?;
        s.map(|s| {
            let bytes = hex::decode(s).map_err(serde::de::Error::custom)?;
            scalar_from_bytes(&bytes).map_err(serde::de::Error::custom)
        })
        .transpose()
    }
}
