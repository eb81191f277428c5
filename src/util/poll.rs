use std::{future::Future, io};

use tokio::runtime::{Builder, Handle, Runtime};

use crate::model::fs::FSError;

/// Drives SDK futures to completion so callers get a blocking API.
///
/// The runtime is created once and released together with the poller.
/// Blocking only: a poller cannot be built from inside another tokio
/// runtime, where blocking on a nested runtime would panic.
pub struct Poller {
    runtime: Runtime,
}

impl Poller {
    pub fn new() -> Result<Self, FSError> {
        if Handle::try_current().is_ok() {
            return Err(FSError::io(
                "runtime",
                io::Error::other("blocking client created inside an async runtime"),
            ));
        }

        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| FSError::io("runtime", err))?;

        Ok(Self { runtime })
    }

    pub fn poll_until_ready<Fut>(&self, future: Fut) -> Fut::Output
    where
        Fut: Future,
    {
        self.runtime.block_on(future)
    }

    pub fn poll_until_ready_error<Fut, T, E>(
        &self,
        future: Fut,
        operation: &'static str,
        key: &str,
    ) -> Result<T, FSError>
    where
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        self.runtime
            .block_on(future)
            .map_err(|err| FSError::transport(operation, key, err))
    }
}
