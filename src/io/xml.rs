//! Small helpers shared by the PhyloXML and NeXML readers/writers.

use super::TreeFormat;
use crate::error::{MapperError, Result};
use quick_xml::events::BytesStart;
use std::fmt::Display;

pub(crate) fn xml_error(format: TreeFormat, err: impl Display) -> MapperError {
    MapperError::parse(format, format!("malformed XML: {err}"))
}

/// Unescaped value of the attribute whose local name is `name`.
pub(crate) fn attribute(format: TreeFormat, element: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>> {
    for attr in element.attributes() {
        let attr = attr.map_err(|e| xml_error(format, e))?;
        if attr.key.local_name().as_ref() == name {
            let value = attr.unescape_value().map_err(|e| xml_error(format, e))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// Parse a length-like number, reporting which element held it.
pub(crate) fn parse_number(format: TreeFormat, what: &str, text: &str) -> Result<f64> {
    text.trim()
        .parse::<f64>()
        .map_err(|_| MapperError::parse(format, format!("invalid {what} '{}'", text.trim())))
}

pub(crate) fn escape(text: &str) -> String {
    quick_xml::escape::escape(text).into_owned()
}
