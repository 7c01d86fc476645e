//! Goods entries and store-boundary decoding
//!
//! Allocation rows written by older clients carry the `goods` column in one
//! of three shapes: a list of entries, a JSON string encoding that list, or an
//! object keyed by goods id. Everything is decoded here, once, into
//! `Vec<GoodsEntry>`; nothing past the store boundary looks at the raw shape.

use crate::error::StoreError;
use crate::types::GoodsTypeId;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;

/// One line of an allocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoodsEntry {
    /// Goods type handed out
    pub goods_id: GoodsTypeId,
    /// Display name at allocation time
    pub name: String,
    /// Units handed out
    pub quantity: u32,
}

impl GoodsEntry {
    /// Single-unit entry, the only quantity the workflow produces
    #[inline]
    #[must_use]
    pub fn single(goods_id: GoodsTypeId, name: impl Into<String>) -> Self {
        Self {
            goods_id,
            name: name.into(),
            quantity: 1,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawGoods {
    List(Vec<RawEntry>),
    Encoded(String),
    Keyed(BTreeMap<String, RawKeyed>),
}

#[derive(Deserialize)]
struct RawEntry {
    #[serde(alias = "id", alias = "goodsId")]
    goods_id: GoodsTypeId,
    #[serde(alias = "goodsName")]
    name: String,
    quantity: Option<u32>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawKeyed {
    Name(String),
    Entry {
        name: String,
        quantity: Option<u32>,
    },
}

impl From<RawEntry> for GoodsEntry {
    fn from(raw: RawEntry) -> Self {
        Self {
            goods_id: raw.goods_id,
            name: raw.name,
            quantity: raw.quantity.unwrap_or(1),
        }
    }
}

/// Decode a raw `goods` column value into normalized entries
///
/// `null` decodes to an empty list. Any shape other than the three known
/// ones is a [`StoreError::Decode`].
pub fn decode_goods(value: Value) -> Result<Vec<GoodsEntry>, StoreError> {
    if value.is_null() {
        return Ok(Vec::new());
    }
    let raw: RawGoods = serde_json::from_value(value)
        .map_err(|e| StoreError::Decode(format!("unrecognised goods shape: {e}")))?;
    normalize(raw, true)
}

fn normalize(raw: RawGoods, allow_encoded: bool) -> Result<Vec<GoodsEntry>, StoreError> {
    match raw {
        RawGoods::List(entries) => Ok(entries.into_iter().map(GoodsEntry::from).collect()),
        RawGoods::Encoded(text) if allow_encoded => {
            let inner: RawGoods = serde_json::from_str(&text)
                .map_err(|e| StoreError::Decode(format!("goods string is not JSON: {e}")))?;
            normalize(inner, false)
        }
        RawGoods::Encoded(_) => Err(StoreError::Decode(
            "goods string encodes another string".to_string(),
        )),
        RawGoods::Keyed(map) => map
            .into_iter()
            .map(|(key, keyed)| {
                let goods_id = GoodsTypeId::from_str(&key)
                    .map_err(|e| StoreError::Decode(format!("goods key {key:?}: {e}")))?;
                Ok(match keyed {
                    RawKeyed::Name(name) => GoodsEntry::single(goods_id, name),
                    RawKeyed::Entry { name, quantity } => GoodsEntry {
                        goods_id,
                        name,
                        quantity: quantity.unwrap_or(1),
                    },
                })
            })
            .collect(),
    }
}

/// `deserialize_with` adapter for record types carrying a goods column
pub fn deserialize_goods<'de, D>(deserializer: D) -> Result<Vec<GoodsEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    decode_goods(value).map_err(serde::de::Error::custom)
}

/// Comma-joined display names, in entry order
#[must_use]
pub fn summarize<S: AsRef<str>>(names: &[S]) -> String {
    names
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(", ")
}
