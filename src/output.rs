//! Output handling for algorithms.
//!
//! Algorithms never print directly. They hand text, priorities and control
//! snapshots to an [`OutputHandler`], which decides what to keep. The default
//! [`LogOutput`] forwards through the `log` facade.

use std::collections::HashMap;

use crate::control::ControlVector;
use crate::error::Error;

/// Parameters of [`LogOutput`].
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct OutputParams {
    /// Messages with a priority above this are dropped (default: 3).
    pub print_level: u32,
    /// Relative magnitude below which [`OutputHandler::zero_tolerance`]
    /// reports zero (default: 1e-12).
    pub zero_tol: f64,
    /// Significant digits used by the Newton number format (default: 10).
    pub newton_precision: usize,
    /// Significant digits used by the plain number format (default: 6).
    pub precision: usize,
}

impl Default for OutputParams {
    fn default() -> Self {
        OutputParams {
            print_level: 3,
            zero_tol: 1e-12,
            newton_precision: 10,
            precision: 6,
        }
    }
}

impl OutputParams {
    /// Check the parameters for consistency.
    pub fn validate(&self) -> Result<(), Error> {
        if self.zero_tol.is_nan() || self.zero_tol < 0.0 {
            return Err(Error::InvalidParameter {
                name: "zero_tol",
                reason: format!("must be non-negative, got {}", self.zero_tol),
            });
        }
        Ok(())
    }
}

/// Number formatting selected by [`OutputHandler::init_newton_out`] and
/// [`OutputHandler::init_out`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberFormat {
    /// Scientific notation with the given number of digits after the point.
    Scientific(usize),
    /// Fixed notation with the given number of digits after the point.
    Fixed(usize),
}

impl NumberFormat {
    /// Format `x`.
    pub fn format(self, x: f64) -> String {
        match self {
            NumberFormat::Scientific(p) => format!("{x:.p$e}"),
            NumberFormat::Fixed(p) => format!("{x:.p$}"),
        }
    }
}

/// Sink for everything an algorithm reports.
///
/// Priorities grow with verbosity: `1` are banners, `2` cost values, `3`
/// per-iteration summaries, `4` inner-loop details. Algorithms add their
/// base priority on top.
pub trait OutputHandler<V: ControlVector> {
    /// Reinitialize after the discretization changed.
    fn reinit(&mut self) {}

    /// Report `text` with the given priority, surrounded by blank lines.
    fn write(&mut self, text: &str, priority: u32, blank_before: u32, blank_after: u32);

    /// Report an error or warning; never filtered.
    fn write_error(&mut self, text: &str);

    /// Store a snapshot of a control-space vector under `name`.
    ///
    /// `kind` names the space the vector lives in, e.g. `"control"`.
    fn write_control(&mut self, v: &V, name: &str, kind: &str) {
        let _ = (v, name, kind);
    }

    /// Set the iteration counter for the loop identified by `tag`.
    fn set_iteration_number(&mut self, n: usize, tag: &str);

    /// Switch to the number format used for Newton iteration output.
    fn init_newton_out(&mut self) {}

    /// Switch to the plain number format.
    fn init_out(&mut self) {}

    /// Format a number according to the active number format.
    fn format_number(&self, x: f64) -> String {
        format!("{x:e}")
    }

    /// `value`, or zero when `|value|` is negligible relative to `reference`.
    fn zero_tolerance(&self, value: f64, reference: f64) -> f64 {
        if value.abs() < 1e-12 * reference.abs() {
            0.0
        } else {
            value
        }
    }
}

/// [`OutputHandler`] writing through the `log` facade.
///
/// Accepted messages go to `log::info!`, errors to `log::warn!` and control
/// snapshots to `log::trace!` (target `"reduced::control"`).
#[derive(Debug)]
pub struct LogOutput {
    params: OutputParams,
    format: NumberFormat,
    iterations: HashMap<String, usize>,
    current_tag: Option<String>,
}

impl LogOutput {
    /// Handler with the given parameters.
    pub fn new(params: OutputParams) -> Self {
        let format = NumberFormat::Fixed(params.precision);
        LogOutput {
            params,
            format,
            iterations: HashMap::new(),
            current_tag: None,
        }
    }

    /// Last iteration number set for `tag`.
    pub fn iteration_number(&self, tag: &str) -> Option<usize> {
        self.iterations.get(tag).copied()
    }

    /// The active number format.
    pub fn number_format(&self) -> NumberFormat {
        self.format
    }

    fn prefix(&self) -> String {
        match &self.current_tag {
            Some(tag) => format!("[{tag} {}] ", self.iterations.get(tag).copied().unwrap_or(0)),
            None => String::new(),
        }
    }
}

impl Default for LogOutput {
    fn default() -> Self {
        LogOutput::new(OutputParams::default())
    }
}

impl<V: ControlVector> OutputHandler<V> for LogOutput {
    fn reinit(&mut self) {
        self.iterations.clear();
        self.current_tag = None;
    }

    fn write(&mut self, text: &str, priority: u32, blank_before: u32, blank_after: u32) {
        if priority > self.params.print_level {
            return;
        }
        let mut msg = String::new();
        for _ in 0..blank_before {
            msg.push('\n');
        }
        msg.push_str(text);
        for _ in 0..blank_after {
            msg.push('\n');
        }
        log::info!("{}{}", self.prefix(), msg);
    }

    fn write_error(&mut self, text: &str) {
        log::warn!("{}{}", self.prefix(), text);
    }

    fn write_control(&mut self, v: &V, name: &str, kind: &str) {
        if log::log_enabled!(target: "reduced::control", log::Level::Trace) {
            let mut infos = String::new();
            if v.print_infos(&mut infos).is_ok() {
                log::trace!(target: "reduced::control", "{}{name} ({kind}): {}", self.prefix(), infos.trim_end());
            }
        }
    }

    fn set_iteration_number(&mut self, n: usize, tag: &str) {
        self.iterations.insert(tag.to_string(), n);
        self.current_tag = Some(tag.to_string());
    }

    fn init_newton_out(&mut self) {
        self.format = NumberFormat::Scientific(self.params.newton_precision);
    }

    fn init_out(&mut self) {
        self.format = NumberFormat::Fixed(self.params.precision);
    }

    fn format_number(&self, x: f64) -> String {
        self.format.format(x)
    }

    fn zero_tolerance(&self, value: f64, reference: f64) -> f64 {
        if value.abs() < self.params.zero_tol * reference.abs() {
            0.0
        } else {
            value
        }
    }
}
