//! Small helpers over `quick_xml` element attributes.

use crate::error::{Error, Result};
use quick_xml::events::BytesStart;

/// Gets the unescaped value of an attribute, if present.
pub(crate) fn attribute(elem: &BytesStart, name: &str) -> Result<Option<String>> {
    for attr in elem.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.as_ref() == name.as_bytes() {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// Gets an attribute which must be present.
pub(crate) fn required(elem: &BytesStart, name: &str) -> Result<String> {
    attribute(elem, name)?.ok_or_else(|| {
        Error::malformed(
            format!("<{}>", String::from_utf8_lossy(elem.name().as_ref())),
            format!("missing attribute `{name}`"),
        )
    })
}

/// Gets a numeric attribute. Absent attributes yield `None`.
pub(crate) fn number(elem: &BytesStart, name: &str) -> Result<Option<f64>> {
    match attribute(elem, name)? {
        Some(value) => value.trim().parse().map(Some).map_err(|_| {
            Error::malformed(
                format!("attribute `{name}`"),
                format!("`{value}` is not a number"),
            )
        }),
        None => Ok(None),
    }
}
