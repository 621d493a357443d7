use {
    crate::conversions::{big_decimal_from_f64, big_decimal_from_str},
    alloy::primitives::U256,
    bigdecimal::BigDecimal,
    serde::{
        Deserializer,
        Serializer,
        de::{self, Visitor},
    },
    serde_with::{DeserializeAs, SerializeAs},
    std::fmt,
};

/// Serializes a [`BigDecimal`] as a plain (non scientific) decimal string and
/// deserializes it from either a string or a JSON number. Subgraphs are not
/// consistent about which of the two they return for `BigDecimal` fields.
pub struct DecimalString;

impl SerializeAs<BigDecimal> for DecimalString {
    fn serialize_as<S: Serializer>(source: &BigDecimal, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&source.to_plain_string())
    }
}

impl<'de> DeserializeAs<'de, BigDecimal> for DecimalString {
    fn deserialize_as<D>(deserializer: D) -> Result<BigDecimal, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct DecimalVisitor;

        impl Visitor<'_> for DecimalVisitor {
            type Value = BigDecimal;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                write!(formatter, "a decimal encoded as a string or a number")
            }

            fn visit_str<E>(self, s: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                big_decimal_from_str(s).map_err(|err| E::custom(format!("{err:#}")))
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(BigDecimal::from(v))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(BigDecimal::from(v))
            }

            fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                big_decimal_from_f64(v).ok_or_else(|| E::custom(format!("non-finite decimal {v}")))
            }
        }

        deserializer.deserialize_any(DecimalVisitor)
    }
}

/// Serializes a [`U256`] as a decimal string and deserializes it from a
/// decimal or a `0x` prefixed hex string.
pub struct HexOrDecimalU256;

impl SerializeAs<U256> for HexOrDecimalU256 {
    fn serialize_as<S: Serializer>(source: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&source.to_string())
    }
}

impl<'de> DeserializeAs<'de, U256> for HexOrDecimalU256 {
    fn deserialize_as<D>(deserializer: D) -> Result<U256, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct U256Visitor;

        impl Visitor<'_> for U256Visitor {
            type Value = U256;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                write!(
                    formatter,
                    "a u256 encoded either as 0x hex prefixed or decimal encoded string"
                )
            }

            fn visit_str<E>(self, s: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                let s = s.trim();
                if let Some(hex) = s.strip_prefix("0x") {
                    U256::from_str_radix(hex, 16).map_err(|err| {
                        E::custom(format!("failed to decode {s:?} as hex u256: {err}"))
                    })
                } else {
                    U256::from_str_radix(s, 10).map_err(|err| {
                        E::custom(format!("failed to decode {s:?} as decimal u256: {err}"))
                    })
                }
            }
        }

        deserializer.deserialize_str(U256Visitor)
    }
}
