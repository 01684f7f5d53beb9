use log::info;

use crate::sequencer::{AlignmentError, LookupError, SequencerError, SequencerModel};

/// How the readout name given by the caller mapped to a sequencer function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReadoutFunction {
    /// The name is itself a function.
    Direct(String),
    /// The name is a program; `function` is the first one it calls that
    /// exercises the trigger clock.
    ViaProgram { program: String, function: String },
}

impl ReadoutFunction {
    pub fn resolve(
        model: &dyn SequencerModel,
        readout: &str,
        trigger: &str,
    ) -> Result<Self, LookupError> {
        if model.function(readout).is_some() {
            return Ok(ReadoutFunction::Direct(readout.to_owned()));
        }
        let function = model.find_function_with_clock(readout, trigger)?;
        info!("program {readout} reads out through function {function}");
        Ok(ReadoutFunction::ViaProgram {
            program: readout.to_owned(),
            function,
        })
    }

    pub fn function(&self) -> &str {
        match self {
            ReadoutFunction::Direct(function) => function,
            ReadoutFunction::ViaProgram { function, .. } => function,
        }
    }
}

/// Locates where, inside a function's period, the ADC window opens.
pub struct AlignmentResolver<'a> {
    trigger: &'a str,
}

impl<'a> AlignmentResolver<'a> {
    pub fn new(trigger: &'a str) -> Self {
        Self { trigger }
    }

    /// Index of the first tick at which the trigger clock is high.
    pub fn offset(&self, model: &dyn SequencerModel, function: &str) -> Result<usize, SequencerError> {
        let channel = model.require_channel(self.trigger)?;
        let scope = model.require_function(function)?.scope(channel);
        let offset = scope.iter().position(|&high| high).ok_or_else(|| AlignmentError {
            function: function.to_owned(),
            clock: self.trigger.to_owned(),
        })?;
        info!("{} fires at tick {offset} of {function}", self.trigger);
        Ok(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::description::tests::READOUT;
    use crate::sequencer::JsonSequencer;

    #[test]
    fn offset_is_first_trigger_tick() {
        let seq = JsonSequencer::from_json_str(READOUT).unwrap();
        assert_eq!(AlignmentResolver::new("TRG").offset(&seq, "ReadPixel").unwrap(), 5);
    }

    #[test]
    fn silent_trigger_is_an_alignment_error() {
        let seq = JsonSequencer::from_json_str(READOUT).unwrap();
        let err = AlignmentResolver::new("TRG").offset(&seq, "Idle").unwrap_err();
        assert!(matches!(
            err,
            SequencerError::Alignment(AlignmentError { ref function, ref clock })
                if function == "Idle" && clock == "TRG"
        ));
        assert!(err.to_string().contains("Idle"));
    }

    #[test]
    fn unknown_names_are_lookup_errors() {
        let seq = JsonSequencer::from_json_str(READOUT).unwrap();
        assert!(matches!(
            AlignmentResolver::new("ADC").offset(&seq, "ReadPixel"),
            Err(SequencerError::Lookup(LookupError::Clock(_)))
        ));
        assert!(matches!(
            AlignmentResolver::new("TRG").offset(&seq, "ReadLine"),
            Err(SequencerError::Lookup(LookupError::Function(_)))
        ));
    }

    #[test]
    fn readout_resolves_directly_or_through_program() {
        let seq = JsonSequencer::from_json_str(READOUT).unwrap();
        assert_eq!(
            ReadoutFunction::resolve(&seq, "ReadPixel", "TRG").unwrap(),
            ReadoutFunction::Direct("ReadPixel".into())
        );
        let via = ReadoutFunction::resolve(&seq, "Acquisition", "TRG").unwrap();
        assert_eq!(
            via,
            ReadoutFunction::ViaProgram {
                program: "Acquisition".into(),
                function: "ReadPixel".into()
            }
        );
        assert_eq!(via.function(), "ReadPixel");
        assert!(ReadoutFunction::resolve(&seq, "Nothing", "TRG").is_err());
    }
}
