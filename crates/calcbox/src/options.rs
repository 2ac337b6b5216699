//! Invocation mode flags and their mapping to engine options.
//!
//! The third argument of an evaluate invocation is a bitmask; this module
//! turns it (plus the numeric base) into the evaluation and rendering
//! option sets handed to the engine. Unknown bits are ignored.

/// Invocation mode bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeFlags(u32);

impl ModeFlags {
    /// Render with high precision.
    pub const PRECISION: u32 = 1 << 0;
    /// Force exact arithmetic; takes priority over `PRECISION`.
    pub const EXACT: u32 = 1 << 1;
    /// Suppress color markup in rendered output.
    pub const NOCOLOR: u32 = 1 << 2;

    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub fn contains(self, flag: u32) -> bool {
        self.0 & flag != 0
    }
}

/// Working precision when no mode flag raises it, in significant digits.
pub const PRECISION_DEFAULT: u32 = 16;
/// Working precision under `ModeFlags::PRECISION`.
pub const PRECISION_HIGH: u32 = 128;

/// How hard the engine tries to keep results symbolic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Approximation {
    /// Exact where possible, bounded approximation otherwise.
    #[default]
    TryExact,
    /// Never approximate; prefer symbolic forms.
    Exact,
}

/// How non-integer numbers are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FractionFormat {
    /// Decimal expansion, truncated to the working precision.
    #[default]
    Decimal,
    /// Decimal only when it terminates exactly, fraction otherwise.
    DecimalExact,
}

/// Options for parsing and evaluating expressions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalOptions {
    pub approximation: Approximation,
    /// Whether free identifiers become symbolic unknowns. Off: unknown
    /// names are diagnostics, matching a hardened engine.
    pub unknowns_enabled: bool,
    /// Unit synchronization during conversion. Stays off: it interacts
    /// badly with monetary conversion (e.g. `x usd > 1 eur`).
    pub sync_units: bool,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            approximation: Approximation::TryExact,
            unknowns_enabled: false,
            sync_units: false,
        }
    }
}

/// Options for rendering parsed forms and results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    /// Numeric base, 2–36; anything else falls back to 10.
    pub base: i32,
    pub fraction: FractionFormat,
    /// Fractional digits to expand before declaring the value approximate.
    pub precision: u32,
    /// Unicode minus and comparison signs instead of ASCII.
    pub unicode_signs: bool,
    /// ANSI color markup on rendered numbers.
    pub color: bool,
    /// Spell out logical operators (`and`/`or`) instead of `&&`/`||`.
    pub spell_out_logical: bool,
    /// Mark truncated repeating expansions with an ellipsis.
    pub indicate_repeating: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            base: 10,
            fraction: FractionFormat::Decimal,
            precision: PRECISION_DEFAULT,
            unicode_signs: true,
            color: true,
            spell_out_logical: true,
            indicate_repeating: true,
        }
    }
}

/// The full option profile derived from one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub eval: EvalOptions,
    pub render: RenderOptions,
    pub precision: u32,
}

/// Map mode flags and rendering base to an option profile.
///
/// `EXACT` wins over `PRECISION`: exact arithmetic with the default digit
/// count, fractions only where the decimal form would lie.
pub fn configure(mode: ModeFlags, base: i32) -> Profile {
    let mut eval = EvalOptions::default();
    let mut render = RenderOptions {
        base,
        ..RenderOptions::default()
    };
    let mut precision = PRECISION_DEFAULT;

    if mode.contains(ModeFlags::EXACT) {
        eval.approximation = Approximation::Exact;
        render.fraction = FractionFormat::DecimalExact;
    } else if mode.contains(ModeFlags::PRECISION) {
        precision = PRECISION_HIGH;
        render.indicate_repeating = false;
    }
    render.precision = precision;

    if mode.contains(ModeFlags::NOCOLOR) {
        render.color = false;
    }

    Profile {
        eval,
        render,
        precision,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_profile() {
        let p = configure(ModeFlags::from_bits(0), 10);
        assert_eq!(p.precision, PRECISION_DEFAULT);
        assert_eq!(p.eval.approximation, Approximation::TryExact);
        assert_eq!(p.render.fraction, FractionFormat::Decimal);
        assert!(p.render.color);
    }

    #[test]
    fn exact_flag_switches_arithmetic_and_fractions() {
        let p = configure(ModeFlags::from_bits(ModeFlags::EXACT), 10);
        assert_eq!(p.eval.approximation, Approximation::Exact);
        assert_eq!(p.render.fraction, FractionFormat::DecimalExact);
        assert_eq!(p.precision, PRECISION_DEFAULT);
    }

    #[test]
    fn precision_flag_raises_digits() {
        let p = configure(ModeFlags::from_bits(ModeFlags::PRECISION), 10);
        assert_eq!(p.precision, PRECISION_HIGH);
        assert!(!p.render.indicate_repeating);
    }

    #[test]
    fn exact_wins_over_precision() {
        let both = configure(
            ModeFlags::from_bits(ModeFlags::EXACT | ModeFlags::PRECISION),
            10,
        );
        let exact_only = configure(ModeFlags::from_bits(ModeFlags::EXACT), 10);
        assert_eq!(both, exact_only);
    }

    #[test]
    fn nocolor_strips_color_only() {
        let p = configure(ModeFlags::from_bits(ModeFlags::NOCOLOR), 16);
        assert!(!p.render.color);
        assert_eq!(p.render.base, 16);
        assert_eq!(p.precision, PRECISION_DEFAULT);
    }

    #[test]
    fn unknown_bits_are_ignored() {
        let p = configure(ModeFlags::from_bits(0xffff_fff8), 10);
        assert_eq!(p, configure(ModeFlags::from_bits(0), 10));
    }
}
