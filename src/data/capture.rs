use crate::error::CaptureError;

use super::model::Channel;

// ---------------------------------------------------------------------------
// CaptureBuffer – append-only time series for one run
// ---------------------------------------------------------------------------

/// Append-only three-channel time series with elapsed-time stamps.
///
/// The buffer reserves its whole capacity up front and never evicts: an
/// append past capacity or an allocation failure is an error, not a silent
/// drop. Columns are stored separately so [`CaptureBuffer::finalize`] can hand
/// them over without copying.
#[derive(Debug, Default)]
pub struct CaptureBuffer {
    elapsed: Vec<f64>,
    line: Vec<f64>,
    background: Vec<f64>,
    baseline: Vec<f64>,
    capacity: usize,
}

impl CaptureBuffer {
    /// Reserve room for exactly `capacity` samples.
    pub fn with_capacity(capacity: usize) -> Result<Self, CaptureError> {
        let mut buffer = Self {
            capacity,
            ..Self::default()
        };
        for column in [
            &mut buffer.elapsed,
            &mut buffer.line,
            &mut buffer.background,
            &mut buffer.baseline,
        ] {
            column
                .try_reserve_exact(capacity)
                .map_err(|source| CaptureError::Alloc {
                    samples: capacity,
                    source,
                })?;
        }
        Ok(buffer)
    }

    /// Append one sample. `elapsed` must be strictly greater than the last one.
    pub fn append(
        &mut self,
        elapsed: f64,
        line: f64,
        background: f64,
        baseline: f64,
    ) -> Result<(), CaptureError> {
        if self.elapsed.len() >= self.capacity {
            return Err(CaptureError::Full {
                capacity: self.capacity,
            });
        }
        if let Some(&previous) = self.elapsed.last() {
            if elapsed <= previous {
                return Err(CaptureError::NonMonotonic {
                    previous,
                    next: elapsed,
                });
            }
        }
        self.elapsed.push(elapsed);
        self.line.push(line);
        self.background.push(background);
        self.baseline.push(baseline);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.elapsed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elapsed.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Freeze the buffer into immutable parallel arrays.
    pub fn finalize(self) -> FinalizedCapture {
        FinalizedCapture {
            elapsed: self.elapsed.into_boxed_slice(),
            line: self.line.into_boxed_slice(),
            background: self.background.into_boxed_slice(),
            baseline: self.baseline.into_boxed_slice(),
        }
    }
}

// ---------------------------------------------------------------------------
// FinalizedCapture – what storage receives
// ---------------------------------------------------------------------------

/// Immutable result of a run: four parallel arrays of equal length.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalizedCapture {
    pub elapsed: Box<[f64]>,
    pub line: Box<[f64]>,
    pub background: Box<[f64]>,
    pub baseline: Box<[f64]>,
}

impl FinalizedCapture {
    pub fn len(&self) -> usize {
        self.elapsed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elapsed.is_empty()
    }

    /// Intensity column for one channel.
    pub fn channel(&self, channel: Channel) -> &[f64] {
        match channel {
            Channel::Line => &self.line,
            Channel::Background => &self.background,
            Channel::Baseline => &self.baseline,
        }
    }

    /// Elapsed time of the last sample, or 0 for an empty capture.
    pub fn span_seconds(&self) -> f64 {
        self.elapsed.last().copied().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finalize_keeps_parallel_arrays() {
        let budget = 202;
        let mut buf = CaptureBuffer::with_capacity(budget).unwrap();
        for i in 0..budget {
            let t = 0.025 * (i + 1) as f64;
            buf.append(t, i as f64, 2.0 * i as f64, 3.0).unwrap();
        }
        let cap = buf.finalize();
        assert_eq!(cap.len(), budget);
        assert_eq!(cap.line.len(), budget);
        assert_eq!(cap.background.len(), budget);
        assert_eq!(cap.baseline.len(), budget);
        assert!(cap.elapsed.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(cap.channel(Channel::Background)[10], 20.0);
    }

    #[test]
    fn append_past_capacity_fails_loudly() {
        let mut buf = CaptureBuffer::with_capacity(1).unwrap();
        buf.append(0.1, 1.0, 1.0, 1.0).unwrap();
        let err = buf.append(0.2, 1.0, 1.0, 1.0).unwrap_err();
        assert!(matches!(err, CaptureError::Full { capacity: 1 }));
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn timestamps_must_increase() {
        let mut buf = CaptureBuffer::with_capacity(4).unwrap();
        buf.append(0.5, 1.0, 1.0, 1.0).unwrap();
        let err = buf.append(0.5, 1.0, 1.0, 1.0).unwrap_err();
        assert!(matches!(err, CaptureError::NonMonotonic { .. }));
    }

    #[test]
    fn absurd_capacity_is_an_error() {
        let err = CaptureBuffer::with_capacity(usize::MAX / 4).unwrap_err();
        assert!(matches!(err, CaptureError::Alloc { .. }));
    }
}
