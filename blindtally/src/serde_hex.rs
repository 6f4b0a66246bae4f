//! Hex (de)serialization of group elements and signatures inside serde
//! structs, for use with `#[serde(with = "...")]`.

/// Serialize a `BigUint` as a lowercase hex string of its big-endian bytes.
pub mod biguint_hex {
    use num_bigint_dig::BigUint;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(value.to_bytes_be()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigUint, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        Ok(BigUint::from_bytes_be(&bytes))
    }
}

/// Serialize a `Vec<BigUint>` as a sequence of hex strings.
pub mod biguint_hex_vec {
    use num_bigint_dig::BigUint;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(values: &[BigUint], serializer: S) -> Result<S::Ok, S::Error> {
        let strings: Vec<String> = values.iter().map(|v| hex::encode(v.to_bytes_be())).collect();
        serde::Serialize::serialize(&strings, serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<BigUint>, D::Error> {
        let strings: Vec<String> = Vec::deserialize(deserializer)?;
        strings
            .into_iter()
            .map(|s| {
                let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
                Ok(BigUint::from_bytes_be(&bytes))
            })
            .collect()
    }
}
