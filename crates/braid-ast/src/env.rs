//! Persistent lexical environments.
//!
//! Extending an environment creates an overlay frame pointing at its parent;
//! the parent is shared, never copied or mutated. Lookups check the newest
//! frame first and fall back through the chain.

use std::sync::Arc;

use braid_core::Identifier;

#[derive(Debug, PartialEq)]
pub struct Env<T> {
    frame: Option<Arc<Frame<T>>>,
}

#[derive(Debug, PartialEq)]
struct Frame<T> {
    bindings: Vec<(Identifier, T)>,
    parent: Env<T>,
}

impl<T> Clone for Env<T> {
    fn clone(&self) -> Self {
        Self {
            frame: self.frame.clone(),
        }
    }
}

impl<T> Default for Env<T> {
    fn default() -> Self {
        Self { frame: None }
    }
}

impl<T> Env<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new environment where `name` is bound to `value`.
    pub fn extend(&self, name: impl Into<Identifier>, value: T) -> Self {
        self.extend_all([(name.into(), value)])
    }

    /// A new environment with all of `bindings` in a single overlay frame.
    /// Later bindings shadow earlier ones.
    pub fn extend_all(&self, bindings: impl IntoIterator<Item = (Identifier, T)>) -> Self {
        Self {
            frame: Some(Arc::new(Frame {
                bindings: bindings.into_iter().collect(),
                parent: self.clone(),
            })),
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&T> {
        let frame = self.frame.as_ref()?;
        frame
            .bindings
            .iter()
            .rev()
            .find(|(bound, _)| bound == name)
            .map(|(_, value)| value)
            .or_else(|| frame.parent.lookup(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Every visible binding, innermost first, with shadowed ones omitted.
    pub fn bindings(&self) -> Vec<(&str, &T)> {
        let mut out: Vec<(&str, &T)> = Vec::new();
        let mut env = self;
        while let Some(frame) = &env.frame {
            for (name, value) in frame.bindings.iter().rev() {
                if !out.iter().any(|(seen, _)| *seen == name.as_str()) {
                    out.push((name.as_str(), value));
                }
            }
            env = &frame.parent;
        }
        out
    }

    /// Apply `f` to every binding, keeping the frame structure.
    pub fn map(&self, f: &impl Fn(&T) -> T) -> Self {
        match &self.frame {
            None => Self::new(),
            Some(frame) => Self {
                frame: Some(Arc::new(Frame {
                    bindings: frame
                        .bindings
                        .iter()
                        .map(|(name, value)| (name.clone(), f(value)))
                        .collect(),
                    parent: frame.parent.map(f),
                })),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlay_shadows_without_touching_parent() {
        let parent = Env::new().extend("x", 1).extend("y", 2);
        let child = parent.extend("x", 10);

        assert_eq!(child.lookup("x"), Some(&10));
        assert_eq!(child.lookup("y"), Some(&2));
        assert_eq!(parent.lookup("x"), Some(&1));
        assert_eq!(child.lookup("z"), None);
    }

    #[test]
    fn test_siblings_share_parent() {
        let parent = Env::new().extend("a", 'a');
        let left = parent.extend("b", 'l');
        let right = parent.extend("b", 'r');
        assert_eq!(left.lookup("b"), Some(&'l'));
        assert_eq!(right.lookup("b"), Some(&'r'));
        assert_eq!(left.lookup("a"), right.lookup("a"));
    }

    #[test]
    fn test_bindings_hides_shadowed_names() {
        let env = Env::new().extend("x", 1).extend("y", 2).extend("x", 3);
        assert_eq!(env.bindings(), vec![("x", &3), ("y", &2)]);
    }

    #[test]
    fn test_map_applies_to_whole_chain() {
        let env = Env::new().extend("x", 1).extend("y", 2);
        let doubled = env.map(&|v| v * 2);
        assert_eq!(doubled.lookup("x"), Some(&2));
        assert_eq!(doubled.lookup("y"), Some(&4));
        assert_eq!(env.lookup("x"), Some(&1));
    }
}
