//! Per dependency handling of failed collaborator calls. The resolver's pool
//! fetch, token metadata, on-chain and linear pool calls propagate their
//! errors; the gauge list degrades to no gauges.

use {anyhow::Result, std::fmt::Debug};

/// What to do when a dependency of a query fails.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum OnFailure {
    /// Fail the whole query with the dependency's error.
    #[default]
    Propagate,
    /// Log the error and continue with an empty value.
    DegradeToEmpty,
}

impl OnFailure {
    pub fn apply<T>(self, dependency: &str, result: Result<T>) -> Result<T>
    where
        T: Default + Debug,
    {
        match (self, result) {
            (_, Ok(value)) => Ok(value),
            (Self::Propagate, Err(err)) => Err(err.context(format!("{dependency} failed"))),
            (Self::DegradeToEmpty, Err(err)) => {
                tracing::warn!(?err, dependency, "dependency failed, continuing without it");
                Ok(T::default())
            }
        }
    }
}
