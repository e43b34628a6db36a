//! Filter chain - ordered application of stream filters

use super::{
    DecodeParams, FilterKind, decode_ascii85, decode_ascii_hex, decode_flate, decode_lzw,
    decode_run_length, encode_ascii85, encode_ascii_hex, encode_flate, encode_lzw,
    encode_run_length,
};
use crate::base::error::{Error, Result};
use crate::pdf::object::{Dict, ObjRef, Object};

/// A chain of filters with their per-filter parameters
#[derive(Debug, Clone, Default)]
pub struct FilterChain {
    filters: Vec<(FilterKind, DecodeParams)>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
        }
    }

    pub fn push(&mut self, kind: FilterKind, params: DecodeParams) {
        self.filters.push((kind, params));
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Build a chain from `/Filter` and `/DecodeParms` values.
    ///
    /// `filter` is a single name or an array of names; `parms` is a single
    /// dictionary or a parallel array. A missing parameter slot means the
    /// filter defaults. An unknown filter name is `Error::Unsupported`.
    pub fn from_spec(filter: &Object, parms: Option<&Object>) -> Result<Self> {
        let names: Vec<&str> = match filter {
            Object::Null => Vec::new(),
            Object::Name(name) => vec![name.as_str()],
            Object::Array(items) => items
                .iter()
                .filter_map(|o| o.as_name().map(|n| n.as_str()))
                .collect(),
            other => {
                return Err(Error::syntax(format!(
                    "/Filter must be a name or array, got {:?}",
                    other
                )));
            }
        };

        let param_at = |index: usize| -> DecodeParams {
            let entry = match parms {
                Some(Object::Dict(d)) if index == 0 => Some(d),
                Some(Object::Array(items)) => items.get(index).and_then(Object::as_dict),
                _ => None,
            };
            entry.map(DecodeParams::from_dict).unwrap_or_default()
        };

        let mut chain = FilterChain::new();
        for (index, name) in names.iter().enumerate() {
            let kind = FilterKind::from_name(name)
                .ok_or_else(|| Error::unsupported(format!("filter {}", name)))?;
            chain.push(kind, param_at(index));
        }
        Ok(chain)
    }

    /// Decode data through the chain (file order)
    pub fn decode(&self, mut data: Vec<u8>) -> Result<Vec<u8>> {
        for (kind, params) in &self.filters {
            data = match kind {
                FilterKind::Flate => decode_flate(&data, Some(params))?,
                FilterKind::Lzw => decode_lzw(&data, Some(params))?,
                FilterKind::Ascii85 => decode_ascii85(&data)?,
                FilterKind::AsciiHex => decode_ascii_hex(&data)?,
                FilterKind::RunLength => decode_run_length(&data)?,
            };
        }
        Ok(data)
    }

    /// Encode data through the chain (reverse order: the last filter applied
    /// on decode is the first applied on encode)
    pub fn encode(&self, mut data: Vec<u8>) -> Result<Vec<u8>> {
        for (kind, _) in self.filters.iter().rev() {
            data = match kind {
                FilterKind::Flate => encode_flate(&data, 6)?,
                FilterKind::Lzw => encode_lzw(&data)?,
                FilterKind::Ascii85 => encode_ascii85(&data)?,
                FilterKind::AsciiHex => encode_ascii_hex(&data)?,
                FilterKind::RunLength => encode_run_length(&data)?,
            };
        }
        Ok(data)
    }
}

/// Decode a stream object's payload using its own dictionary.
///
/// `/Filter` and `/DecodeParms` entries may themselves be indirect; the
/// resolver callback supplies their values.
pub fn decode_stream_payload(
    dict: &Dict,
    data: &[u8],
    resolve: &dyn Fn(ObjRef) -> Object,
) -> Result<Vec<u8>> {
    let deref = |obj: Option<&Object>| -> Object {
        match obj {
            Some(Object::Ref(r)) => resolve(*r),
            Some(other) => other.clone(),
            None => Object::Null,
        }
    };

    let filter = deref(dict.get("Filter"));
    if filter.is_null() {
        return Ok(data.to_vec());
    }
    let parms = deref(dict.get("DecodeParms"));
    let parms = if parms.is_null() { None } else { Some(&parms) };

    FilterChain::from_spec(&filter, parms)?.decode(data.to_vec())
}
