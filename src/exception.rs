use crate::control::ControlVector;
use crate::error::Error;
use crate::output::OutputHandler;

/// Policy for errors raised while an algorithm runs.
///
/// Handlers receive the output handler of the algorithm so they can report
/// through the same channel.
pub trait ExceptionHandler<V: ControlVector> {
    /// Report a recoverable error; the algorithm continues.
    fn handle_exception(&mut self, err: &Error, origin: &str, out: &mut dyn OutputHandler<V>);

    /// Report a critical error.
    ///
    /// Returning `Err` aborts the algorithm with that error; returning
    /// `Ok(())` lets it continue with whatever values it has.
    fn handle_critical_exception(
        &mut self,
        err: Error,
        origin: &str,
        out: &mut dyn OutputHandler<V>,
    ) -> Result<(), Error>;
}

/// Default [`ExceptionHandler`]: writes every error and re-raises critical ones.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogExceptionHandler;

impl<V: ControlVector> ExceptionHandler<V> for LogExceptionHandler {
    fn handle_exception(&mut self, err: &Error, origin: &str, out: &mut dyn OutputHandler<V>) {
        out.write_error(&format!(
            "Warning: During execution of `{origin}` the following problem occurred: {err}"
        ));
    }

    fn handle_critical_exception(
        &mut self,
        err: Error,
        origin: &str,
        out: &mut dyn OutputHandler<V>,
    ) -> Result<(), Error> {
        out.write_error(&format!(
            "Error: During execution of `{origin}` the following critical problem occurred: {err}"
        ));
        Err(err)
    }
}
