//! Compiler options.

/// Settings for one compilation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
    /// Render unbound consts by bare name instead of failing
    /// (`-m` / `--allow-missing-const`).
    pub lenient: bool,
    /// Round numeric literals to this many fractional digits.  `None` prints
    /// the shortest text that reads back as the same value.
    pub precision: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let opts = Options::default();
        assert!(!opts.lenient);
        assert_eq!(opts.precision, None);
    }
}
