use crate::{Error, Result, types::AudioFeatures, utils};

/// How far a bound is pushed away from the mean.
const BOUND_MODIFIER: f64 = 0.3;

/// Which side of the window a bound describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundKind {
    Max,
    Min,
}

/// Turns the mean of an audio feature into one bound of a window around it.
///
/// Upper bounds sit 0.3 above the mean and are kept within `[0.3, 1.0]`;
/// lower bounds sit 0.3 below it and are kept within `[0.0, 0.8]`. The clamp
/// that applies depends on which half of the scale the mean falls in.
///
/// # Example
///
/// ```
/// assert!((as_attribute(BoundKind::Max, 0.4) - 0.7).abs() < 1e-9);
/// assert!((as_attribute(BoundKind::Min, 0.9) - 0.6).abs() < 1e-9);
/// ```
pub fn as_attribute(kind: BoundKind, mean: f64) -> f64 {
    let (floor, ceiling, modifier) = match kind {
        BoundKind::Max => (0.3, 1.0, BOUND_MODIFIER),
        BoundKind::Min => (0.0, 0.8, -BOUND_MODIFIER),
    };

    if mean < 0.5 {
        (mean + modifier).max(floor)
    } else {
        (mean + modifier).min(ceiling)
    }
}

/// `[min, max]` window for a single audio feature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttributeRange {
    pub min: f64,
    pub max: f64,
}

impl AttributeRange {
    pub fn around(mean: f64) -> Self {
        Self {
            min: as_attribute(BoundKind::Min, mean),
            max: as_attribute(BoundKind::Max, mean),
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }
}

/// Averaged, loosened audio-feature windows of a track set.
///
/// Derived per request and never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackAttributeProfile {
    pub acousticness: AttributeRange,
    pub instrumentalness: AttributeRange,
    pub liveness: AttributeRange,
    pub energy: AttributeRange,
    pub valence: AttributeRange,
}

impl TrackAttributeProfile {
    /// Averages the five tracked features over `features` and widens each
    /// mean into a window.
    ///
    /// # Errors
    ///
    /// [`Error::EmptyTrackSet`] when `features` is empty; a mean over nothing
    /// is undefined and is never reported as zero.
    pub fn from_features(features: &[AudioFeatures]) -> Result<Self> {
        let mean = |pick: fn(&AudioFeatures) -> f64| -> Result<f64> {
            let values: Vec<f64> = features.iter().map(pick).collect();
            utils::average(&values).ok_or(Error::EmptyTrackSet)
        };

        Ok(Self {
            acousticness: AttributeRange::around(mean(|f| f.acousticness)?),
            instrumentalness: AttributeRange::around(mean(|f| f.instrumentalness)?),
            liveness: AttributeRange::around(mean(|f| f.liveness)?),
            energy: AttributeRange::around(mean(|f| f.energy)?),
            valence: AttributeRange::around(mean(|f| f.valence)?),
        })
    }

    /// Feature names (as the service spells them) paired with their windows.
    pub fn ranges(&self) -> [(&'static str, AttributeRange); 5] {
        [
            ("acousticness", self.acousticness),
            ("energy", self.energy),
            ("instrumentalness", self.instrumentalness),
            ("liveness", self.liveness),
            ("valence", self.valence),
        ]
    }
}
