//! Keyboard state as seen by the simulation
//!
//! The host owns the window and its events; each frame it hands the simulation
//! something that answers "is this key down right now".

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A logical key, identified by the character printed on it (lowercase)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Key(pub char);

impl Key {
    /// Every key the player's controls may be rebound to
    pub fn bindable() -> impl Iterator<Item = Key> {
        ('0'..='9').chain('a'..='z').map(Key)
    }

    /// Uppercase label for on-screen hints
    pub fn label(self) -> char {
        self.0.to_ascii_uppercase()
    }
}

impl From<char> for Key {
    fn from(c: char) -> Self {
        Key(c.to_ascii_lowercase())
    }
}

/// Current key-down state supplied by the input collaborator
pub trait KeyboardState {
    fn is_down(&self, key: Key) -> bool;
}

/// Simple set of pressed keys, good enough for hosts and tests
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySet {
    pressed: BTreeSet<Key>,
}

impl KeySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&mut self, key: impl Into<Key>) {
        self.pressed.insert(key.into());
    }

    pub fn release(&mut self, key: impl Into<Key>) {
        self.pressed.remove(&key.into());
    }
}

impl<K: Into<Key>> FromIterator<K> for KeySet {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        Self {
            pressed: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl KeyboardState for KeySet {
    fn is_down(&self, key: Key) -> bool {
        self.pressed.contains(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_press_and_release() {
        let mut keys = KeySet::new();
        keys.press('W');
        assert!(keys.is_down(Key('w')));
        keys.release('w');
        assert!(!keys.is_down(Key('w')));
    }

    #[test]
    fn test_bindable_keys_are_digits_and_letters() {
        let keys: Vec<Key> = Key::bindable().collect();
        assert_eq!(keys.len(), 36);
        assert!(keys.contains(&Key('0')));
        assert!(keys.contains(&Key('z')));
    }
}
