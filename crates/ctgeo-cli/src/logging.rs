use std::io::{self, Write};
use std::path::Path;

use anyhow::Result;
use env_logger::{Env, Target};

const DEFAULT_FILTER: &str = "warn,ctgeo=info";
const QUIET_FILTER: &str = "warn";

/// Writes log lines to stderr and appends them to a file.
struct Tee {
    file: fs_err::File,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

/// Sets up `env_logger`; `RUST_LOG` takes precedence over the defaults.
pub fn init(quiet: bool, log_file: Option<&Path>) -> Result<()> {
    let filter = if quiet { QUIET_FILTER } else { DEFAULT_FILTER };
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or(filter));

    if let Some(path) = log_file {
        let file = fs_err::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        builder.target(Target::Pipe(Box::new(Tee { file })));
    }

    builder.try_init()?;
    Ok(())
}
