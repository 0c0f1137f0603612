use anyhow::Result;
use clap::Parser;
use prettytable::{cell, row, Table};
use std::path::PathBuf;
use wider_face::{verify, DatasetIndex};

/// Show the contents of a WIDER FACE index file
#[derive(Debug, Clone, Parser)]
#[clap(version)]
struct Args {
    /// index file written by the converter
    index_file: PathBuf,
    /// re-read every record file and check the record counts
    #[clap(long)]
    verify: bool,
}

fn main() -> Result<()> {
    wider_face::logging::init();

    let Args { index_file, verify } = Args::parse();
    let index = DatasetIndex::load(&index_file)?;

    {
        let mut table = Table::new();
        table.add_row(row!["key", "value"]);
        index.entries().iter().for_each(|(key, value)| {
            table.add_row(row![key, value]);
        });
        table.printstd();
    }

    if verify {
        verify_index(&index)?;
    }

    Ok(())
}

fn verify_index(index: &DatasetIndex) -> Result<()> {
    let counts = verify::count_splits(index)?;

    let mut table = Table::new();
    table.add_row(row!["split", "expected", "found", "faces"]);
    counts.iter().for_each(|count| {
        table.add_row(row![count.split, count.expected, count.records, count.faces]);
    });
    table.printstd();

    verify::check_counts(&counts)
}
