use std::io::Read;

use thiserror::Error;

pub mod content;
pub mod mapper;
pub mod node;
pub mod report;

pub use content::{extract_content, ContentError};
pub use mapper::map_suites;
pub use node::{parse, ParseError, XmlNode};
pub use report::{NonSuccessKind, Properties, Suite, Test, TestError, TestStatus, Totals};

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("could not parse junit xml: {0}")]
    Parse(#[from] ParseError),
    #[error("could not extract element content: {0}")]
    Content(#[from] ContentError),
    #[error("could not read junit xml: {0}")]
    Io(#[from] std::io::Error),
}

/// Parses a JUnit-dialect document into aggregated suites.
///
/// The document may be blank or have several top-level elements.
pub fn ingest<T: AsRef<[u8]>>(data: T) -> Result<Vec<Suite>, IngestError> {
    let nodes = parse(data)?;
    let node_count = nodes.len();

    let mut suites = map_suites(nodes)?;
    for suite in suites.iter_mut() {
        suite.aggregate();
    }

    tracing::debug!(
        nodes = node_count,
        suites = suites.len(),
        "ingested junit document"
    );
    Ok(suites)
}

pub fn ingest_reader<R: Read>(mut reader: R) -> Result<Vec<Suite>, IngestError> {
    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;
    ingest(data)
}
