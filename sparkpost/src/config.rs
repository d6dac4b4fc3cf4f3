//! Configuration loaded from environment variables.

use serde::de::DeserializeOwned;

pub use config::ConfigError;

/// Deserialize a configuration struct from the process environment.
///
/// Keys are matched case-insensitively against field names, so
/// `SPARKPOST_PLUGIN_VERSION` fills `plugin_version` when loaded with the
/// `SPARKPOST` prefix.
pub trait EnvConfig: Sized {
    fn from_env() -> Result<Self, ConfigError>;
    fn from_env_with_prefix(prefix: &str) -> Result<Self, ConfigError>;
}

impl<D> EnvConfig for D
where
    D: DeserializeOwned,
{
    fn from_env() -> Result<Self, ConfigError> {
        load(config::Environment::default())
    }

    fn from_env_with_prefix(prefix: &str) -> Result<Self, ConfigError> {
        load(config::Environment::with_prefix(prefix))
    }
}

fn load<D: DeserializeOwned>(source: config::Environment) -> Result<D, ConfigError> {
    config::Config::builder()
        .add_source(source)
        .build()?
        .try_deserialize()
}
