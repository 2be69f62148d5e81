//! Build automation tasks for ferry
//!
//! - Generating the CLI reference from the clap definitions

use clap::Parser;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation tasks for ferry", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Generate the CLI reference in Markdown
    GenerateCliDocs {
        /// Output directory for generated documentation
        #[arg(short, long, default_value = "docs")]
        output_dir: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::GenerateCliDocs { output_dir } => generate_cli_docs(&output_dir)?,
    }

    Ok(())
}

fn generate_cli_docs(output_dir: &str) -> anyhow::Result<()> {
    println!("Generating CLI documentation...");

    let markdown = clap_markdown::help_markdown::<ferry_migrate::cli::Cli>();

    let content = format!(
        r#"# ferry CLI Reference

Generated from the CLI source code on {}.

## Overview

`ferry` exports Postgres tables into chunk files, stages them in an object
store, and bulk-loads them into a MySQL or Postgres destination with a fixed
number of concurrent workers.

## Quick Start

```bash
# Export, upload, download and load in one go
ferry --config ferry.toml migrate

# Or run the stages separately, possibly on different hosts
ferry --config ferry.toml export
ferry --config ferry.toml load --workers 8
```

## Commands

{}

## Environment Variables

- `FERRY_CONFIG` - Path to the configuration file
- `FERRY__<SECTION>__<KEY>` - Override any configuration key, e.g. `FERRY__LOAD__WORKERS=8`
- `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` - S3 credentials when not set in the file
- `LOG_LEVEL`, `LOG_OUTPUT`, `LOG_FORMAT`, `LOG_DIR` - Logging setup
- `RUST_LOG` - Per-module filter directives

---

*To update, run `cargo run -p xtask -- generate-cli-docs`.*
"#,
        chrono::Utc::now().format("%Y-%m-%d"),
        markdown
    );

    let output_path = PathBuf::from(output_dir);
    fs::create_dir_all(&output_path)?;

    let file_path = output_path.join("cli-reference.md");
    fs::write(&file_path, content)?;

    println!("Generated CLI documentation at: {}", file_path.display());

    Ok(())
}
