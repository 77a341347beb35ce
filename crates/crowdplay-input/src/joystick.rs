//! Long-run joystick averages.

/// Running, unweighted average of every move sample seen in one scope.
///
/// The average is never reset: it covers everything since the first sample.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct JoystickAverage {
    pub x: f64,
    pub y: f64,
    pub samples: u64,
}

impl JoystickAverage {
    /// Fold in one sample: `avg = avg * (n - 1) / n + sample / n` with `n`
    /// the sample count after this sample.
    pub fn add_sample(&mut self, x: f64, y: f64) {
        self.samples += 1;
        let n = self.samples as f64;
        self.x = self.x * (n - 1.0) / n + x / n;
        self.y = self.y * (n - 1.0) / n + y / n;
    }

    /// Magnitude of the averaged deflection.
    #[must_use]
    pub fn intensity(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_samples_average() {
        let mut avg = JoystickAverage::default();
        avg.add_sample(0.0, 0.0);
        avg.add_sample(1.0, 1.0);
        assert_eq!(avg.x, 0.5);
        assert_eq!(avg.y, 0.5);
        assert_eq!(avg.samples, 2);
    }

    #[test]
    fn test_average_trends_but_does_not_reset() {
        let mut avg = JoystickAverage::default();
        avg.add_sample(0.0, 0.0);
        avg.add_sample(1.0, 1.0);
        avg.add_sample(1.0, 1.0);
        assert!(avg.x > 0.5 && avg.x < 1.0);
        assert!((avg.x - 2.0 / 3.0).abs() < 1e-12);
        assert!((avg.y - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_intensity() {
        let avg = JoystickAverage {
            x: 3.0,
            y: 4.0,
            samples: 1,
        };
        assert_eq!(avg.intensity(), 5.0);
    }
}
