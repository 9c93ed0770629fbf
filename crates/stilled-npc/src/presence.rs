//! Presence cues for the rendering and audio layers.
//!
//! The core never draws or plays anything. It only decides the numbers a host
//! needs to dress the entity: a facial mood, the face opacity, and the volume
//! of the looping whisper.

use fastrand::Rng;
use serde::{Deserialize, Serialize};
use stilled_common::uniform;

use crate::behavior::BehaviorState;
use crate::config::NpcConfig;

/// Observed level above which being watched always reads as fear.
const WATCHED_SCARED_LEVEL: f32 = 0.7;

/// Face opacity when the target is close.
const OPACITY_NEAR: f32 = 0.95;
/// Face opacity at mid range.
const OPACITY_MID: f32 = 0.85;
/// Face opacity beyond detection range.
const OPACITY_FAR: f32 = 0.7;
/// Per-tick smoothing weight of the current opacity.
const OPACITY_KEEP: f32 = 0.95;

/// Facial expression of the entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Mood {
    /// Resting face
    #[default]
    Neutral,
    /// Watching with interest
    Curious,
    /// Hostile
    Angry,
    /// Frightened
    Scared,
}

impl Mood {
    /// Mood set immediately when entering a state.
    #[must_use]
    pub const fn on_enter(state: BehaviorState) -> Self {
        match state {
            BehaviorState::Wander => Self::Neutral,
            BehaviorState::Stalk => Self::Curious,
            BehaviorState::Flee => Self::Scared,
        }
    }
}

/// Whisper volume for a behavior state.
#[must_use]
pub const fn whisper_volume(state: BehaviorState) -> f32 {
    match state {
        BehaviorState::Wander => 0.85,
        BehaviorState::Stalk => 1.0,
        BehaviorState::Flee => 0.6,
    }
}

/// Mood, expression timer and face opacity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceCues {
    mood: Mood,
    expression_timer: f32,
    face_opacity: f32,
}

impl Default for PresenceCues {
    fn default() -> Self {
        Self::new()
    }
}

impl PresenceCues {
    /// Creates neutral cues; the first update picks a mood.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            mood: Mood::Neutral,
            expression_timer: 0.0,
            face_opacity: OPACITY_MID,
        }
    }

    /// Current mood.
    #[must_use]
    pub const fn mood(&self) -> Mood {
        self.mood
    }

    /// Current face opacity.
    #[must_use]
    pub const fn face_opacity(&self) -> f32 {
        self.face_opacity
    }

    /// Sets the mood. Returns it when it actually changed.
    pub fn set_mood(&mut self, mood: Mood) -> Option<Mood> {
        if self.mood == mood {
            return None;
        }
        self.mood = mood;
        Some(mood)
    }

    /// Advances expression and opacity by one tick. Returns the new mood if it changed.
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        state: BehaviorState,
        distance: f32,
        observed_level: f32,
        watched: bool,
        dt: f32,
        config: &NpcConfig,
        rng: &mut Rng,
    ) -> Option<Mood> {
        let mut changed = None;

        if watched && observed_level > WATCHED_SCARED_LEVEL {
            changed = self.set_mood(Mood::Scared);
        }

        self.expression_timer -= dt;
        if self.expression_timer <= 0.0 {
            let (mood, duration) = match state {
                BehaviorState::Flee => (Mood::Scared, uniform(rng, 1.5, 3.0)),
                BehaviorState::Stalk => {
                    let mood = if rng.f32() < 0.7 { Mood::Curious } else { Mood::Angry };
                    (mood, uniform(rng, 2.0, 4.0))
                },
                BehaviorState::Wander if distance < config.detection_radius => {
                    let choices = [Mood::Neutral, Mood::Curious, Mood::Curious];
                    (choices[rng.usize(..choices.len())], uniform(rng, 2.0, 5.0))
                },
                BehaviorState::Wander => (Mood::Neutral, uniform(rng, 4.0, 8.0)),
            };
            changed = self.set_mood(mood).or(changed);
            self.expression_timer = duration;
        }

        let target = if distance < config.safe_distance * 2.0 {
            OPACITY_NEAR
        } else if distance > config.detection_radius {
            OPACITY_FAR
        } else {
            OPACITY_MID
        };
        self.face_opacity = self.face_opacity * OPACITY_KEEP + target * (1.0 - OPACITY_KEEP);

        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flee_is_scared() {
        let config = NpcConfig::default();
        let mut rng = Rng::with_seed(1);
        let mut cues = PresenceCues::new();
        let changed = cues.update(BehaviorState::Flee, 5.0, 0.0, false, 0.1, &config, &mut rng);
        assert_eq!(changed, Some(Mood::Scared));
        assert_eq!(cues.mood(), Mood::Scared);
    }

    #[test]
    fn test_far_wander_stays_neutral() {
        let config = NpcConfig::default();
        let mut rng = Rng::with_seed(2);
        let mut cues = PresenceCues::new();
        for _ in 0..200 {
            cues.update(BehaviorState::Wander, 30.0, 0.0, false, 0.1, &config, &mut rng);
            assert_eq!(cues.mood(), Mood::Neutral);
        }
        assert!(cues.face_opacity() < OPACITY_MID);
    }

    #[test]
    fn test_watched_forces_scared() {
        let config = NpcConfig::default();
        let mut rng = Rng::with_seed(3);
        let mut cues = PresenceCues::new();
        cues.update(BehaviorState::Wander, 30.0, 0.0, false, 0.1, &config, &mut rng);
        assert_eq!(cues.mood(), Mood::Neutral);

        let changed = cues.update(BehaviorState::Wander, 30.0, 0.8, true, 0.1, &config, &mut rng);
        assert_eq!(changed, Some(Mood::Scared));
    }

    #[test]
    fn test_opacity_approaches_near_value() {
        let config = NpcConfig::default();
        let mut rng = Rng::with_seed(4);
        let mut cues = PresenceCues::new();
        for _ in 0..300 {
            cues.update(BehaviorState::Stalk, 3.0, 0.0, false, 0.016, &config, &mut rng);
        }
        assert!((cues.face_opacity() - OPACITY_NEAR).abs() < 1e-3);
    }

    #[test]
    fn test_whisper_volume_by_state() {
        assert_eq!(whisper_volume(BehaviorState::Stalk), 1.0);
        assert!(whisper_volume(BehaviorState::Flee) < whisper_volume(BehaviorState::Wander));
    }
}
