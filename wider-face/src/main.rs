use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use wider_face::Config;

/// Convert the WIDER FACE dataset into TFRecord files
#[derive(Debug, Clone, Parser)]
#[clap(version)]
struct Args {
    /// dataset directory containing WIDER_{train,val,test} and wider_face_split
    root: PathBuf,
    /// output index file
    output_file: PathBuf,
}

fn main() -> Result<()> {
    wider_face::logging::init();

    let Args { root, output_file } = Args::parse();
    let config = Config::new(root, output_file)?;
    wider_face::convert(&config)?;

    Ok(())
}
