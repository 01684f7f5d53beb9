//! JSON sequencer descriptions.
//!
//! A description lists the channel table, each function as ordered time
//! slices (how many base ticks the slice lasts and which clocks are high),
//! and programs as ordered call lists that may name functions or other
//! programs:
//!
//! ```json
//! {
//!   "channels": { "RG": 0, "S1": 1, "TRG": 8 },
//!   "functions": {
//!     "ReadPixel": {
//!       "clocks": ["RG", "S1", "TRG"],
//!       "slices": [
//!         { "duration": 4, "high": ["RG"] },
//!         { "duration": 2, "high": ["S1", "TRG"] }
//!       ]
//!     }
//!   },
//!   "programs": { "Acquisition": ["Clear", "ReadFrame"], "ReadFrame": ["ReadPixel"] }
//! }
//! ```
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use log::debug;
use serde::Deserialize;

use crate::sequencer::{LookupError, SequencerError, SequencerFunction, SequencerModel};

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct TimeSlice {
    pub duration: usize,
    #[serde(default)]
    pub high: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawFunction {
    #[serde(default)]
    clocks: Option<Vec<String>>,
    slices: Vec<TimeSlice>,
}

#[derive(Debug, Deserialize)]
struct RawDescription {
    channels: BTreeMap<String, usize>,
    functions: BTreeMap<String, RawFunction>,
    #[serde(default)]
    programs: BTreeMap<String, Vec<String>>,
}

#[derive(Clone, Debug)]
pub struct DescribedFunction {
    name: String,
    clocks: Vec<String>,
    // (duration, channels held high)
    slices: Vec<(usize, BTreeSet<usize>)>,
}

impl SequencerFunction for DescribedFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn clocks(&self) -> &[String] {
        &self.clocks
    }

    fn scope(&self, channel: usize) -> Vec<bool> {
        self.slices
            .iter()
            .flat_map(|(duration, high)| std::iter::repeat(high.contains(&channel)).take(*duration))
            .collect()
    }
}

pub struct JsonSequencer {
    channels: BTreeMap<String, usize>,
    functions: BTreeMap<String, DescribedFunction>,
    programs: BTreeMap<String, Vec<String>>,
}

impl JsonSequencer {
    pub fn from_path(path: &Path) -> Result<Self, SequencerError> {
        let text = std::fs::read_to_string(path).map_err(|source| SequencerError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self, SequencerError> {
        let raw: RawDescription = serde_json::from_str(text)?;
        let channel_of = |clock: &str| {
            raw.channels
                .get(clock)
                .copied()
                .ok_or_else(|| LookupError::Clock(clock.to_owned()))
        };
        let mut functions = BTreeMap::new();
        for (name, function) in &raw.functions {
            let slices = function
                .slices
                .iter()
                .map(|slice| {
                    let high = slice
                        .high
                        .iter()
                        .map(|clock| channel_of(clock))
                        .collect::<Result<BTreeSet<usize>, _>>()?;
                    Ok((slice.duration, high))
                })
                .collect::<Result<Vec<_>, LookupError>>()?;
            let clocks = match &function.clocks {
                Some(clocks) => {
                    for clock in clocks {
                        channel_of(clock)?;
                    }
                    clocks.clone()
                }
                None => active_clocks(&raw.channels, &slices),
            };
            functions.insert(
                name.clone(),
                DescribedFunction {
                    name: name.clone(),
                    clocks,
                    slices,
                },
            );
        }
        debug!(
            "sequencer description: {} channels, {} functions, {} programs",
            raw.channels.len(),
            functions.len(),
            raw.programs.len()
        );
        Ok(Self {
            channels: raw.channels,
            functions,
            programs: raw.programs,
        })
    }

    fn search(
        &self,
        program: &str,
        channel: usize,
        visiting: &mut Vec<String>,
    ) -> Result<Option<String>, LookupError> {
        let calls = self
            .programs
            .get(program)
            .ok_or_else(|| LookupError::Program(program.to_owned()))?;
        visiting.push(program.to_owned());
        for call in calls {
            if let Some(function) = self.functions.get(call) {
                if function.scope(channel).contains(&true) {
                    return Ok(Some(call.clone()));
                }
            } else if self.programs.contains_key(call) {
                if visiting.contains(call) {
                    continue;
                }
                if let Some(found) = self.search(call, channel, visiting)? {
                    return Ok(Some(found));
                }
            } else {
                return Err(LookupError::Function(call.clone()));
            }
        }
        visiting.pop();
        Ok(None)
    }
}

/// Clocks that go high at least once, ordered by channel number.
fn active_clocks(channels: &BTreeMap<String, usize>, slices: &[(usize, BTreeSet<usize>)]) -> Vec<String> {
    let used: BTreeSet<usize> = slices.iter().flat_map(|(_, high)| high.iter().copied()).collect();
    let mut clocks: Vec<(usize, &String)> = channels
        .iter()
        .filter(|(_, channel)| used.contains(channel))
        .map(|(clock, &channel)| (channel, clock))
        .collect();
    clocks.sort();
    clocks.into_iter().map(|(_, clock)| clock.clone()).collect()
}

impl SequencerModel for JsonSequencer {
    fn function(&self, name: &str) -> Option<&dyn SequencerFunction> {
        self.functions
            .get(name)
            .map(|function| function as &dyn SequencerFunction)
    }

    fn channel(&self, clock: &str) -> Option<usize> {
        self.channels.get(clock).copied()
    }

    fn find_function_with_clock(&self, program: &str, clock: &str) -> Result<String, LookupError> {
        let channel = self.require_channel(clock)?;
        self.search(program, channel, &mut Vec::new())?
            .ok_or_else(|| LookupError::NoFunctionWithClock {
                program: program.to_owned(),
                clock: clock.to_owned(),
            })
    }
}
