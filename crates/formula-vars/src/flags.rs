use bitflags::bitflags;

bitflags! {
    /// Per-variable state bits.
    ///
    /// `INSPECTED`, `MODIFIED`, `MODIFIED_CATS` and `COMPUTED` are pass-scoped: they are only
    /// meaningful between a pre-mark and the matching post-mark.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct VarFlags: u8 {
        /// Never assigned since creation.
        const NOT_SET = 1 << 0;
        /// Assigned since the change was last acknowledged.
        const CHANGED = 1 << 1;
        /// Change status was cached by a pre-mark this pass.
        const INSPECTED = 1 << 2;
        /// Cached change status, all variables considered.
        const MODIFIED = 1 << 3;
        /// Cached change status, category variables ignored.
        const MODIFIED_CATS = 1 << 4;
        /// Formula already evaluated this pass.
        const COMPUTED = 1 << 5;

        const PASS = Self::INSPECTED.bits()
            | Self::MODIFIED.bits()
            | Self::MODIFIED_CATS.bits()
            | Self::COMPUTED.bits();
    }
}
