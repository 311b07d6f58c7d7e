use std::ops::{Index, IndexMut};

/// One of the two views of a stereo display
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Eye {
    Left,
    Right,
}

impl Eye {
    /// Both eyes, in ordinal order
    pub const ALL: [Eye; 2] = [Eye::Left, Eye::Right];

    /// Ordinal index; 0 for the left eye, 1 for the right
    pub fn index(self) -> usize {
        match self {
            Eye::Left => 0,
            Eye::Right => 1,
        }
    }
}

/// Fixed two-element table holding one value per eye
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct PerEye<T>(pub [T; 2]);

impl<T> PerEye<T> {
    pub fn new(left: T, right: T) -> Self {
        Self([left, right])
    }

    /// Build a table by evaluating `f` for each eye
    pub fn from_fn(mut f: impl FnMut(Eye) -> T) -> Self {
        Self([f(Eye::Left), f(Eye::Right)])
    }

    pub fn map<U>(self, mut f: impl FnMut(Eye, T) -> U) -> PerEye<U> {
        let [left, right] = self.0;
        PerEye([f(Eye::Left, left), f(Eye::Right, right)])
    }

    pub fn iter(&self) -> impl Iterator<Item = (Eye, &T)> {
        Eye::ALL.iter().copied().zip(self.0.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Eye, &mut T)> {
        Eye::ALL.iter().copied().zip(self.0.iter_mut())
    }

    pub fn as_ref(&self) -> PerEye<&T> {
        let [left, right] = &self.0;
        PerEye([left, right])
    }

    /// Fallible version of `from_fn`; stops at the first error
    pub fn try_from_fn<E>(mut f: impl FnMut(Eye) -> Result<T, E>) -> Result<Self, E> {
        let left = f(Eye::Left)?;
        let right = f(Eye::Right)?;
        Ok(Self([left, right]))
    }
}

impl<T> Index<Eye> for PerEye<T> {
    type Output = T;
    fn index(&self, eye: Eye) -> &T {
        &self.0[eye.index()]
    }
}

impl<T> IndexMut<Eye> for PerEye<T> {
    fn index_mut(&mut self, eye: Eye) -> &mut T {
        &mut self.0[eye.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinals() {
        assert_eq!(Eye::Left.index(), 0);
        assert_eq!(Eye::Right.index(), 1);
    }

    #[test]
    fn indexing_by_eye() {
        let mut table = PerEye::new("l", "r");
        assert_eq!(table[Eye::Right], "r");
        table[Eye::Left] = "x";
        assert_eq!(table.0, ["x", "r"]);
    }

    #[test]
    fn try_from_fn_stops_on_error() {
        let mut calls = 0;
        let result: Result<PerEye<u32>, &str> = PerEye::try_from_fn(|eye| {
            calls += 1;
            match eye {
                Eye::Left => Err("nope"),
                Eye::Right => Ok(1),
            }
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}
