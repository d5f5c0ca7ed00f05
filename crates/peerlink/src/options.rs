//! Marshaling options

bitflags::bitflags! {
    /// Options passed explicitly on every conversion.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MarshalOptions: u32 {
        /// Convert to and from the managed runtime's idiomatic containers
        /// with eager copies, instead of the bridged wrapper classes that
        /// share the underlying container.
        const KOTLINCOMPAT = 1 << 0;
    }
}

impl MarshalOptions {
    /// Whether eager, idiomatic-container conversion is selected
    #[inline]
    pub fn is_compat(self) -> bool {
        self.contains(MarshalOptions::KOTLINCOMPAT)
    }

    /// Same options with eager conversion switched on or off
    #[inline]
    pub fn with_compat(self, compat: bool) -> Self {
        let mut options = self;
        options.set(MarshalOptions::KOTLINCOMPAT, compat);
        options
    }

    /// Options as the `int` the managed side receives
    #[inline]
    pub fn to_managed_int(self) -> i32 {
        self.bits() as i32
    }

    /// Options from the `int` the managed side passes. Unknown bits are dropped.
    #[inline]
    pub fn from_managed_int(bits: i32) -> Self {
        Self::from_bits_truncate(bits as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_bridged() {
        assert!(!MarshalOptions::default().is_compat());
        assert!(MarshalOptions::KOTLINCOMPAT.is_compat());
    }

    #[test]
    fn test_with_compat() {
        let o = MarshalOptions::empty().with_compat(true);
        assert_eq!(o, MarshalOptions::KOTLINCOMPAT);
        assert!(!o.with_compat(false).is_compat());
    }

    #[test]
    fn test_managed_int_drops_unknown_bits() {
        assert_eq!(MarshalOptions::from_managed_int(0b101), MarshalOptions::KOTLINCOMPAT);
        assert_eq!(MarshalOptions::KOTLINCOMPAT.to_managed_int(), 1);
    }

    #[test]
    fn test_flag_by_name() {
        assert_eq!(
            MarshalOptions::from_name("KOTLINCOMPAT"),
            Some(MarshalOptions::KOTLINCOMPAT)
        );
        assert_eq!(MarshalOptions::from_name("nope"), None);
    }
}
