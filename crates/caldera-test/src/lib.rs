//! caldera - integration test support.
//!
//! Re-exports the workspace crates under one root and gives tests access
//! to the shared `.ics` fixtures.

pub mod component {
    pub use caldera_cache as cache;
    pub use caldera_core::{config, constants};
    pub use caldera_service::{caldav, storage};

    pub mod error {
        pub use caldera_core::error::*;
        pub use caldera_service::error::*;
    }
}

pub use caldera_rfc as rfc;

pub mod fixtures {
    use std::path::{Path, PathBuf};

    use anyhow::Context;

    /// Directory holding the `.ics` fixtures.
    #[must_use]
    pub fn dir() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures")
    }

    /// ## Summary
    /// Reads fixture `name` (without extension).
    ///
    /// ## Errors
    /// Returns an error if the fixture does not exist.
    pub fn load(name: &str) -> anyhow::Result<String> {
        let path = dir().join(format!("{name}.ics"));
        std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))
    }

    /// ## Summary
    /// Copies the named fixtures into `collection` as `<name>.ics`.
    ///
    /// ## Errors
    /// Returns an error if a fixture is missing or cannot be written.
    pub fn install(collection: &Path, names: &[&str]) -> anyhow::Result<()> {
        std::fs::create_dir_all(collection)
            .with_context(|| format!("creating {}", collection.display()))?;
        for name in names {
            let target = collection.join(format!("{name}.ics"));
            std::fs::write(&target, load(name)?)
                .with_context(|| format!("writing {}", target.display()))?;
        }
        Ok(())
    }
}
