use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use junit_mock::JunitMock;

#[derive(Debug, Parser)]
pub struct Cli {
    /// Directory to output JUnit XML files
    #[arg(required = true)]
    pub directory: PathBuf,

    #[command(flatten)]
    pub options: junit_mock::Options,
}

fn main() -> Result<()> {
    let Cli { directory, options } = Cli::try_parse()?;

    let mut jm = JunitMock::new(options);
    println!("Using seed `{}` to generate random data.", jm.get_seed());

    let documents = jm.generate_documents()?;
    for (path, document) in jm
        .write_documents_to_file(directory, &documents)?
        .iter()
        .zip(documents.iter())
    {
        let tests: usize = document.suite_totals.iter().map(|t| t.tests).sum();
        println!("Wrote {} tests to {}", tests, path.display());
    }

    Ok(())
}
