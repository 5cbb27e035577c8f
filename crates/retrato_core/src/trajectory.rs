use serde::Serialize;
use std::io::Write;

/// An ordered sequence of `(time, state)` samples produced by one
/// integration run.
///
/// States are stored row-major (`times.len() * dim` values). Produced
/// fresh per analysis call and never mutated afterwards; the plotting
/// layer reads it and discards it.
#[derive(Debug, Clone, Serialize)]
pub struct Trajectory {
    dim: usize,
    times: Vec<f64>,
    states: Vec<f64>,
    /// Time at which evaluation left the field's domain, if the run was
    /// cut short. The samples up to that point remain valid.
    pub truncated_at: Option<f64>,
}

impl Trajectory {
    pub(crate) fn with_capacity(dim: usize, samples: usize) -> Self {
        Self {
            dim,
            times: Vec::with_capacity(samples),
            states: Vec::with_capacity(samples * dim),
            truncated_at: None,
        }
    }

    pub(crate) fn push(&mut self, t: f64, state: &[f64]) {
        debug_assert_eq!(state.len(), self.dim);
        self.times.push(t);
        self.states.extend_from_slice(state);
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn time(&self, i: usize) -> f64 {
        self.times[i]
    }

    pub fn state(&self, i: usize) -> &[f64] {
        &self.states[i * self.dim..(i + 1) * self.dim]
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn last_state(&self) -> Option<&[f64]> {
        if self.is_empty() {
            None
        } else {
            Some(self.state(self.len() - 1))
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, &[f64])> + '_ {
        (0..self.len()).map(|i| (self.times[i], self.state(i)))
    }

    /// Writes the trajectory as CSV: a time column followed by one
    /// column per state component. `labels` overrides the default
    /// `x1..xn` column names.
    pub fn write_csv<W: Write>(&self, writer: W, labels: Option<&[&str]>) -> csv::Result<()> {
        let mut out = csv::Writer::from_writer(writer);

        let mut header = vec!["t".to_string()];
        match labels {
            Some(names) => header.extend(names.iter().map(|s| s.to_string())),
            None => header.extend((1..=self.dim).map(|i| format!("x{i}"))),
        }
        out.write_record(&header)?;

        let mut record = Vec::with_capacity(self.dim + 1);
        for (t, state) in self.iter() {
            record.clear();
            record.push(t.to_string());
            record.extend(state.iter().map(|v| v.to_string()));
            out.write_record(&record)?;
        }
        out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Trajectory;

    #[test]
    fn samples_round_trip_through_accessors() {
        let mut trajectory = Trajectory::with_capacity(2, 4);
        trajectory.push(0.0, &[1.0, 2.0]);
        trajectory.push(0.5, &[3.0, 4.0]);

        assert_eq!(trajectory.len(), 2);
        assert_eq!(trajectory.dim(), 2);
        assert_eq!(trajectory.state(1), &[3.0, 4.0]);
        assert_eq!(trajectory.last_state(), Some([3.0, 4.0].as_slice()));
        assert!(trajectory.truncated_at.is_none());

        let collected: Vec<f64> = trajectory.iter().map(|(t, _)| t).collect();
        assert_eq!(collected, vec![0.0, 0.5]);
    }

    #[test]
    fn csv_export_has_header_and_one_row_per_sample() {
        let mut trajectory = Trajectory::with_capacity(2, 2);
        trajectory.push(0.0, &[100.0, 80.0]);
        trajectory.push(1.0, &[99.0, 79.0]);

        let mut buffer = Vec::new();
        trajectory
            .write_csv(&mut buffer, Some(&["blue", "red"]))
            .expect("csv export should succeed");
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "t,blue,red");
        assert_eq!(lines[1], "0,100,80");
    }
}
