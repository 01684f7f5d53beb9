//! Seams to the sequencer model. Any parser that can describe functions as
//! per-clock boolean traces plugs in here.
use crate::sequencer::LookupError;

pub trait SequencerFunction {
    fn name(&self) -> &str;
    /// Names of the clocks this function drives, in display order.
    fn clocks(&self) -> &[String];
    /// State of `channel` at every base tick of one function period.
    fn scope(&self, channel: usize) -> Vec<bool>;
}

pub trait SequencerModel {
    fn function(&self, name: &str) -> Option<&dyn SequencerFunction>;
    /// Hardware channel driven by the named clock.
    fn channel(&self, clock: &str) -> Option<usize>;
    /// First function reached from `program` in which `clock` is ever active.
    fn find_function_with_clock(&self, program: &str, clock: &str) -> Result<String, LookupError>;

    fn require_function(&self, name: &str) -> Result<&dyn SequencerFunction, LookupError> {
        self.function(name)
            .ok_or_else(|| LookupError::Function(name.to_owned()))
    }

    fn require_channel(&self, clock: &str) -> Result<usize, LookupError> {
        self.channel(clock)
            .ok_or_else(|| LookupError::Clock(clock.to_owned()))
    }
}
