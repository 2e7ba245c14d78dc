// ── Heater constraint solver ──
//
// The two dew-heater slots constrain each other: only one of them may run a
// sensor-driven control loop, and a follower needs a leader on the other
// slot. The solver is pure; callers render its output and write the
// resolved modes back before a save.

use std::fmt;

use strum::IntoEnumIterator;
use sv241_api::models::{HEATER_SLOT_COUNT, HeaterMode, HeaterSetting};

// ── ModeSet ──────────────────────────────────────────────────────

/// Small bitset over [`HeaterMode`].
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ModeSet(u8);

impl ModeSet {
    pub const EMPTY: Self = Self(0);

    pub const fn of(modes: &[HeaterMode]) -> Self {
        let mut bits = 0u8;
        let mut i = 0;
        while i < modes.len() {
            bits |= 1 << modes[i].code();
            i += 1;
        }
        Self(bits)
    }

    pub const fn contains(self, mode: HeaterMode) -> bool {
        self.0 & (1 << mode.code()) != 0
    }

    pub const fn with(self, mode: HeaterMode) -> Self {
        Self(self.0 | (1 << mode.code()))
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = HeaterMode> {
        HeaterMode::iter().filter(move |mode| self.contains(*mode))
    }
}

impl fmt::Debug for ModeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Modes that drive the heater from the sensors. Only one slot may hold one.
pub const EXCLUSIVE_MODES: ModeSet =
    ModeSet::of(&[HeaterMode::PidLensSensor, HeaterMode::MinimumTemperature]);

/// Modes a `SyncFollower` on the other slot can follow.
pub const LEADER_MODES: ModeSet =
    ModeSet::of(&[HeaterMode::PidLensSensor, HeaterMode::MinimumTemperature]);

// ── HeaterSlot ───────────────────────────────────────────────────

/// One of the two PWM heater outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HeaterSlot {
    First,
    Second,
}

impl HeaterSlot {
    pub const ALL: [Self; HEATER_SLOT_COUNT] = [Self::First, Self::Second];

    pub const fn index(self) -> usize {
        match self {
            Self::First => 0,
            Self::Second => 1,
        }
    }

    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::First),
            1 => Some(Self::Second),
            _ => None,
        }
    }

    pub const fn other(self) -> Self {
        match self {
            Self::First => Self::Second,
            Self::Second => Self::First,
        }
    }

    /// Key of this slot in the proxy's `heaterAutoEnableLeader` map.
    pub const fn leader_key(self) -> &'static str {
        match self {
            Self::First => "pwm1",
            Self::Second => "pwm2",
        }
    }
}

impl fmt::Display for HeaterSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "heater {}", self.index())
    }
}

// ── Solution ─────────────────────────────────────────────────────

/// Resolved view of one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotOutcome {
    pub mode: HeaterMode,
    /// Options that must be shown disabled for this slot.
    pub disallowed: ModeSet,
    /// `false` while the slot is `Disabled`: enabled-on-startup is forced off.
    pub startup_interactive: bool,
}

impl SlotOutcome {
    pub fn allows(&self, mode: HeaterMode) -> bool {
        !self.disallowed.contains(mode)
    }

    pub fn allowed(&self) -> impl Iterator<Item = HeaterMode> + '_ {
        HeaterMode::iter().filter(|mode| self.allows(*mode))
    }
}

/// Output of one solver run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaterSolution {
    slots: [SlotOutcome; HEATER_SLOT_COUNT],
    reset: [bool; HEATER_SLOT_COUNT],
}

impl HeaterSolution {
    pub fn slot(&self, slot: HeaterSlot) -> &SlotOutcome {
        &self.slots[slot.index()]
    }

    pub fn slots(&self) -> &[SlotOutcome; HEATER_SLOT_COUNT] {
        &self.slots
    }

    pub fn modes(&self) -> [HeaterMode; HEATER_SLOT_COUNT] {
        self.slots.map(|s| s.mode)
    }

    /// Whether the slot's input mode was disallowed and forced to `Manual`.
    pub fn was_reset(&self, slot: HeaterSlot) -> bool {
        self.reset[slot.index()]
    }

    pub fn any_reset(&self) -> bool {
        self.reset.iter().any(|r| *r)
    }

    /// Write resolved modes into a heater array and clear enabled-on-startup
    /// for disabled slots. Entries past the slot count are left alone.
    pub fn apply_to(&self, heaters: &mut [HeaterSetting]) {
        for (heater, outcome) in heaters.iter_mut().zip(&self.slots) {
            heater.mode = outcome.mode;
            if !outcome.startup_interactive {
                heater.enabled_on_startup = false;
            }
        }
    }
}

impl Default for HeaterSolution {
    fn default() -> Self {
        HeaterConstraintSolver::solve([HeaterMode::Manual; HEATER_SLOT_COUNT])
    }
}

// ── Solver ───────────────────────────────────────────────────────

/// Options the other slot's mode rules out for this one.
pub fn disallowed_by(other: HeaterMode) -> ModeSet {
    let mut set = ModeSet::EMPTY;
    if EXCLUSIVE_MODES.contains(other) {
        set = set.union(EXCLUSIVE_MODES);
    }
    if !LEADER_MODES.contains(other) {
        set = set.with(HeaterMode::SyncFollower);
    }
    set
}

pub struct HeaterConstraintSolver;

impl HeaterConstraintSolver {
    /// Resolve a pair of modes as loaded from the device. Slot 0 wins conflicts.
    pub fn solve(modes: [HeaterMode; HEATER_SLOT_COUNT]) -> HeaterSolution {
        Self::solve_anchored(modes, HeaterSlot::First)
    }

    /// Resolve after the user picked `mode` for `slot`. The other slot is
    /// the anchor: a pick that collides with it is reset to `Manual`, while a
    /// leader change on `slot` cascades into a follower on the other slot.
    pub fn solve_edit(
        modes: [HeaterMode; HEATER_SLOT_COUNT],
        slot: HeaterSlot,
        mode: HeaterMode,
    ) -> HeaterSolution {
        let mut modes = modes;
        modes[slot.index()] = mode;
        Self::solve_anchored(modes, slot.other())
    }

    /// Resolve with `anchor` authoritative. The non-anchor slot is checked
    /// first, then the anchor, then both once more after any reset.
    pub fn solve_anchored(
        modes: [HeaterMode; HEATER_SLOT_COUNT],
        anchor: HeaterSlot,
    ) -> HeaterSolution {
        let mut modes = modes;
        let mut reset = [false; HEATER_SLOT_COUNT];

        for _pass in 0..2 {
            let mut changed = false;
            for slot in [anchor.other(), anchor] {
                let other = modes[slot.other().index()];
                if disallowed_by(other).contains(modes[slot.index()]) {
                    modes[slot.index()] = HeaterMode::Manual;
                    reset[slot.index()] = true;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        let slots = HeaterSlot::ALL.map(|slot| {
            let mode = modes[slot.index()];
            SlotOutcome {
                mode,
                disallowed: disallowed_by(modes[slot.other().index()]),
                startup_interactive: mode != HeaterMode::Disabled,
            }
        });

        HeaterSolution { slots, reset }
    }
}

// ── Tests ────────────────────────────────────────────────────────
