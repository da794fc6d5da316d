use std::fmt;

/// One selected rotamer (local index) per position, indexed by position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Assignment {
    rotamers: Vec<usize>,
}

impl Assignment {
    pub fn new(rotamers: Vec<usize>) -> Self {
        Self { rotamers }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rotamers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rotamers.is_empty()
    }

    /// Local rotamer index at `pos`.
    ///
    /// Panics if `pos` is not a position of this assignment.
    #[inline]
    pub fn rotamer_at(&self, pos: usize) -> usize {
        self.rotamers[pos]
    }

    #[inline]
    pub fn get(&self, pos: usize) -> Option<usize> {
        self.rotamers.get(pos).copied()
    }

    /// Replaces the rotamer at `pos` and returns the previous one.
    #[inline]
    pub fn substitute(&mut self, pos: usize, rotamer: usize) -> usize {
        std::mem::replace(&mut self.rotamers[pos], rotamer)
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.rotamers
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.rotamers.iter().copied().enumerate()
    }

    /// A stable 64-bit fingerprint of the assignment (FNV-1a over the indices).
    ///
    /// Identical assignments produced by different runs hash identically, which
    /// makes the fingerprint usable as a result token for de-duplication.
    pub fn fingerprint(&self) -> u64 {
        const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
        const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;
        let mut hash = FNV_OFFSET;
        for &rot in &self.rotamers {
            for byte in (rot as u64).to_le_bytes() {
                hash ^= u64::from(byte);
                hash = hash.wrapping_mul(FNV_PRIME);
            }
        }
        hash
    }
}

impl From<Vec<usize>> for Assignment {
    fn from(rotamers: Vec<usize>) -> Self {
        Self::new(rotamers)
    }
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, rot) in self.rotamers.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", rot)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitute_returns_previous_rotamer() {
        let mut assignment = Assignment::new(vec![0, 2, 1]);
        let previous = assignment.substitute(1, 0);
        assert_eq!(previous, 2);
        assert_eq!(assignment.as_slice(), &[0, 0, 1]);
    }

    #[test]
    fn get_returns_none_for_unknown_position() {
        let assignment = Assignment::new(vec![3]);
        assert_eq!(assignment.get(0), Some(3));
        assert_eq!(assignment.get(1), None);
    }

    #[test]
    fn fingerprint_distinguishes_assignments_and_is_stable() {
        let a = Assignment::new(vec![0, 1, 2]);
        let b = Assignment::new(vec![0, 1, 2]);
        let c = Assignment::new(vec![2, 1, 0]);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn display_lists_rotamer_indices() {
        let assignment = Assignment::new(vec![4, 0, 1]);
        assert_eq!(assignment.to_string(), "[4, 0, 1]");
    }
}
