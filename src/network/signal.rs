use crate::error::{Error, Result};

/// The state of a single signalized connection during a phase.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum LightState {
    Red,
    Amber,
    Green,
}

impl LightState {
    fn from_char(c: char) -> Option<Self> {
        match c {
            'G' | 'g' => Some(LightState::Green),
            'y' => Some(LightState::Amber),
            'r' | 's' | 'u' | 'o' | 'O' => Some(LightState::Red),
            _ => None,
        }
    }

    /// Whether vehicles may discharge through the connection.
    pub fn is_open(self) -> bool {
        matches!(self, LightState::Green | LightState::Amber)
    }
}

/// A single phase of a fixed-time signal program.
#[derive(Clone, Debug)]
pub struct Phase {
    /// The duration of the phase in s.
    pub duration: f64,
    /// The state of each connection, indexed by link index.
    pub states: Vec<LightState>,
}

/// The fixed-time program of a traffic light.
#[derive(Clone, Debug)]
pub struct SignalProgram {
    phases: Vec<Phase>,
}

impl SignalProgram {
    /// Parses a program from `(duration, state string)` pairs.
    /// `node_id` names the junction in any error.
    pub fn parse<'a>(
        node_id: &str,
        phases: impl IntoIterator<Item = (f64, &'a str)>,
    ) -> Result<Self> {
        let mut parsed: Vec<Phase> = vec![];
        for (idx, (duration, state)) in phases.into_iter().enumerate() {
            if !duration.is_finite() || duration < 0.0 {
                return Err(Error::config(
                    node_id,
                    format!("phase {idx} has invalid duration {duration}"),
                ));
            }
            let states = state
                .chars()
                .map(|c| {
                    LightState::from_char(c).ok_or_else(|| {
                        Error::config(node_id, format!("phase {idx} has unknown state `{c}`"))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            if let Some(first) = parsed.first() {
                if first.states.len() != states.len() {
                    return Err(Error::config(
                        node_id,
                        format!(
                            "phase {idx} controls {} connections, expected {}",
                            states.len(),
                            first.states.len()
                        ),
                    ));
                }
            }
            parsed.push(Phase { duration, states });
        }

        let program = Self { phases: parsed };
        if program.phases.is_empty() || program.cycle() <= 0.0 {
            return Err(Error::config(node_id, "signal program has an empty cycle"));
        }
        Ok(program)
    }

    /// The phases in order.
    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    /// The full cycle duration in s.
    pub fn cycle(&self) -> f64 {
        self.phases.iter().map(|p| p.duration).sum()
    }

    /// The number of connections the program controls.
    pub fn num_links(&self) -> usize {
        self.phases.first().map_or(0, |p| p.states.len())
    }

    /// The accumulated green and amber time of a connection in s,
    /// or `None` if the program does not control that link index.
    pub fn green_time(&self, link_index: usize) -> Option<f64> {
        if link_index >= self.num_links() {
            return None;
        }
        Some(
            self.phases
                .iter()
                .filter(|p| p.states[link_index].is_open())
                .map(|p| p.duration)
                .sum(),
        )
    }

    /// The fraction of the cycle a connection may discharge.
    pub fn green_share(&self, link_index: usize) -> Option<f64> {
        self.green_time(link_index).map(|t| t / self.cycle())
    }
}
