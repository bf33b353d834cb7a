// Hall code → six-step electrical state mapping
//
// The table is written once before commutation interrupts are enabled and
// only read afterwards, so the hot path does a plain indexed load.

use crate::hall::HallCode;

/// One of the six commutation sectors (always 0..=5)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Sector(u8);

impl Sector {
    pub const ALL: [Sector; 6] = [
        Sector(0),
        Sector(1),
        Sector(2),
        Sector(3),
        Sector(4),
        Sector(5),
    ];

    /// `None` unless `index < 6`
    #[inline(always)]
    pub const fn new(index: u8) -> Option<Self> {
        if index < 6 {
            Some(Self(index))
        } else {
            None
        }
    }

    /// Sector index (0-5)
    #[inline(always)]
    pub const fn index(self) -> u8 {
        self.0
    }

    /// The sector `steps` positions further round the electrical cycle.
    #[inline(always)]
    pub const fn advance(self, steps: u8) -> Self {
        Self(((self.0 as u16 + steps as u16) % 6) as u8)
    }
}

/// Electrical state commanded to the output stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ElectricalState {
    /// Drive the phase pair belonging to this sector
    Sector(Sector),
    /// All six transistors off
    Off,
}

impl ElectricalState {
    /// Encode for single-byte storage (telemetry atomics); Off is 255.
    #[inline(always)]
    pub const fn to_raw(self) -> u8 {
        match self {
            ElectricalState::Sector(s) => s.index(),
            ElectricalState::Off => 255,
        }
    }

    /// Inverse of [`to_raw`](Self::to_raw); any non-sector value is Off.
    #[inline(always)]
    pub const fn from_raw(raw: u8) -> Self {
        match Sector::new(raw) {
            Some(s) => ElectricalState::Sector(s),
            None => ElectricalState::Off,
        }
    }

    #[inline(always)]
    pub const fn is_energized(self) -> bool {
        matches!(self, ElectricalState::Sector(_))
    }
}

impl From<Sector> for ElectricalState {
    fn from(s: Sector) -> Self {
        ElectricalState::Sector(s)
    }
}

/// Hall code → electrical state lookup
///
/// Codes 0b000 and 0b111 map to [`ElectricalState::Off`] by construction;
/// [`set`](Self::set) ignores writes to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CommutationTable {
    entries: [ElectricalState; 8],
}

impl CommutationTable {
    /// A table with every entry Off
    pub const fn all_off() -> Self {
        Self {
            entries: [ElectricalState::Off; 8],
        }
    }

    /// Build from the configuration's raw form (0..=5 sector, else Off)
    pub fn from_static(raw: [u8; 8]) -> Self {
        let mut table = Self::all_off();
        for (code, value) in raw.iter().enumerate() {
            table.set(HallCode::new(code as u8), ElectricalState::from_raw(*value));
        }
        table
    }

    /// Look up the state for a hall code. Constant time, never fails.
    #[inline(always)]
    pub fn lookup(&self, code: HallCode) -> ElectricalState {
        self.entries[code.index()]
    }

    /// Overwrite one entry
    ///
    /// Only valid before the table is handed to the control cycle; the
    /// interrupt path reads the table without synchronization.
    pub fn set(&mut self, code: HallCode, state: ElectricalState) {
        if code.is_valid() {
            self.entries[code.index()] = state;
        }
    }

    /// Raw form of every entry (Off = 255), for diagnostics
    pub fn to_raw(&self) -> [u8; 8] {
        let mut raw = [0u8; 8];
        for (out, state) in raw.iter_mut().zip(self.entries.iter()) {
            *out = state.to_raw();
        }
        raw
    }

    /// `true` when every valid hall code maps to a distinct sector
    pub fn is_complete(&self) -> bool {
        let mut seen = [false; 6];
        for bits in 1..7u8 {
            match self.entries[bits as usize] {
                ElectricalState::Sector(s) => {
                    if seen[s.index() as usize] {
                        return false;
                    }
                    seen[s.index() as usize] = true;
                }
                ElectricalState::Off => return false,
            }
        }
        true
    }
}

impl Default for CommutationTable {
    fn default() -> Self {
        Self::all_off()
    }
}

/// Partially identified table
///
/// Entries stay `None` until observed, so "not identified yet" never
/// collides with a deliberate Off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TableBuilder {
    entries: [Option<Sector>; 8],
}

impl TableBuilder {
    pub const fn new() -> Self {
        Self { entries: [None; 8] }
    }

    /// Record a sector for a code. Invalid codes are dropped and stay
    /// permanently Off in the finished table.
    pub fn record(&mut self, code: HallCode, sector: Sector) {
        if code.is_valid() {
            self.entries[code.index()] = Some(sector);
        }
    }

    pub fn get(&self, code: HallCode) -> Option<Sector> {
        self.entries[code.index()]
    }

    /// Bitmask of valid hall codes that have no entry yet (bit n = code n)
    pub fn missing(&self) -> u8 {
        let mut mask = 0u8;
        for bits in 1..7u8 {
            if self.entries[bits as usize].is_none() {
                mask |= 1 << bits;
            }
        }
        mask
    }

    /// Table as far as identified, unset entries Off
    pub fn partial(&self) -> CommutationTable {
        let mut table = CommutationTable::all_off();
        for bits in 1..7u8 {
            if let Some(s) = self.entries[bits as usize] {
                table.set(HallCode::new(bits), ElectricalState::Sector(s));
            }
        }
        table
    }

    /// Complete table, or the mask of unset codes
    pub fn finish(&self) -> Result<CommutationTable, u8> {
        match self.missing() {
            0 => Ok(self.partial()),
            mask => Err(mask),
        }
    }
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sector_range() {
        assert!(Sector::new(5).is_some());
        assert!(Sector::new(6).is_none());
        assert!(Sector::new(255).is_none());
    }

    #[test]
    fn test_sector_advance_wraps() {
        let s = Sector::new(4).unwrap();
        assert_eq!(s.advance(2).index(), 0);
        assert_eq!(s.advance(5).index(), 3);
    }

    #[test]
    fn test_invalid_codes_always_off() {
        let mut table = CommutationTable::from_static([0, 1, 2, 3, 4, 5, 0, 1]);
        assert_eq!(table.lookup(HallCode::new(0)), ElectricalState::Off);
        assert_eq!(table.lookup(HallCode::new(7)), ElectricalState::Off);

        let s = ElectricalState::Sector(Sector::new(3).unwrap());
        table.set(HallCode::new(0), s);
        table.set(HallCode::new(7), s);
        assert_eq!(table.lookup(HallCode::new(0)), ElectricalState::Off);
        assert_eq!(table.lookup(HallCode::new(7)), ElectricalState::Off);
    }

    #[test]
    fn test_static_table_out_of_range_is_off() {
        let table = CommutationTable::from_static([255, 2, 0, 9, 4, 3, 5, 255]);
        assert_eq!(table.lookup(HallCode::new(3)), ElectricalState::Off);
        assert_eq!(
            table.lookup(HallCode::new(1)),
            ElectricalState::Sector(Sector::new(2).unwrap())
        );
        assert!(!table.is_complete());
    }

    #[test]
    fn test_raw_round_trip_of_state() {
        for raw in 0..=255u8 {
            let state = ElectricalState::from_raw(raw);
            if raw < 6 {
                assert_eq!(state.to_raw(), raw);
            } else {
                assert_eq!(state, ElectricalState::Off);
            }
        }
    }

    #[test]
    fn test_completeness_detects_duplicates() {
        let table = CommutationTable::from_static([255, 0, 1, 2, 3, 4, 5, 255]);
        assert!(table.is_complete());
        let dup = CommutationTable::from_static([255, 0, 1, 2, 3, 4, 4, 255]);
        assert!(!dup.is_complete());
    }

    #[test]
    fn test_builder_reports_missing_codes() {
        let mut builder = TableBuilder::new();
        for bits in 1..6u8 {
            builder.record(HallCode::new(bits), Sector::new(bits - 1).unwrap());
        }
        assert_eq!(builder.missing(), 1 << 6);
        assert_eq!(builder.finish(), Err(1 << 6));

        builder.record(HallCode::new(6), Sector::new(5).unwrap());
        let table = builder.finish().unwrap();
        assert!(table.is_complete());
    }

    #[test]
    fn test_builder_ignores_invalid_codes() {
        let mut builder = TableBuilder::new();
        builder.record(HallCode::new(7), Sector::new(1).unwrap());
        assert_eq!(builder.get(HallCode::new(7)), None);
        assert_eq!(builder.missing(), 0b0111_1110);
    }
}
