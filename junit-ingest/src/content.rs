use std::str::Utf8Error;

use memchr::memmem::find;
use quick_xml::escape::{unescape, EscapeError};
use thiserror::Error;

const CDATA_START: &[u8] = b"<![CDATA[";
const CDATA_END: &[u8] = b"]]>";

#[derive(Error, Debug)]
pub enum ContentError {
    #[error("unmatched CDATA start tag")]
    UnmatchedCdataStart,
    #[error("unmatched CDATA end tag")]
    UnmatchedCdataEnd,
    #[error("could not decode entity: {0}")]
    Escape(#[from] EscapeError),
    #[error("content is not valid utf-8: {0}")]
    Encoding(#[from] Utf8Error),
}

/// Decodes the raw inner content of an element.
///
/// Runs outside of CDATA sections are entity-decoded; CDATA sections are
/// copied verbatim. Runs are concatenated in document order.
pub fn extract_content<T: AsRef<[u8]>>(raw: T) -> Result<String, ContentError> {
    let mut rest = raw.as_ref();
    let mut content = String::with_capacity(rest.len());

    while !rest.is_empty() {
        let (plain, cdata) = match find(rest, CDATA_START) {
            Some(start) => (&rest[..start], Some(&rest[start + CDATA_START.len()..])),
            None => (rest, None),
        };

        if find(plain, CDATA_END).is_some() {
            return Err(ContentError::UnmatchedCdataEnd);
        }
        content.push_str(&unescape(std::str::from_utf8(plain)?)?);

        rest = match cdata {
            Some(cdata) => {
                let end = find(cdata, CDATA_END).ok_or(ContentError::UnmatchedCdataStart)?;
                content.push_str(std::str::from_utf8(&cdata[..end])?);
                &cdata[end + CDATA_END.len()..]
            }
            None => &[],
        };
    }

    Ok(content)
}
